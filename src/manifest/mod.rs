//! Promotion Manifests
//!
//! A promotion manifest declares a set of registries (one source, any number
//! of destinations) and the image digests, with their tags, that are allowed
//! to exist in them. The auditor only ever reads manifests; loading them is
//! the job of a [`ManifestSource`].
//!
//! Declaration order matters: the child search walks registries, images and
//! digests exactly in the order the files list them.

mod index;
mod source;

pub use index::{Candidate, DirectMatch, ManifestIndex, ResolvedPath};
pub use source::{DirectoryManifestSource, ManifestSource, StaticManifestSource};

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use audit_protocol::is_canonical_digest;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One registry declared by a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryContext {
    /// Registry path, e.g. `us.gcr.io/k8s-artifacts-prod/kas-network-proxy`.
    pub name: String,

    /// True for the staging registry images are promoted from.
    #[serde(default, alias = "isSource")]
    pub src: bool,

    /// Identity used to write to the registry; informational here.
    #[serde(
        default,
        rename = "service-account",
        alias = "serviceAccount",
        skip_serializing_if = "Option::is_none"
    )]
    pub service_account: Option<String>,
}

impl RegistryContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            src: false,
            service_account: None,
        }
    }

    pub fn source(name: impl Into<String>) -> Self {
        Self {
            src: true,
            ..Self::new(name)
        }
    }
}

/// Digest to tags, in declaration order.
///
/// Serialised as a map; a plain `HashMap` would lose the order the search
/// relies on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestTags {
    entries: Vec<(String, Vec<String>)>,
}

impl DigestTags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a digest. A repeated digest merges its tags into the first entry.
    pub fn insert(&mut self, digest: impl Into<String>, tags: Vec<String>) {
        let digest = digest.into();
        match self.entries.iter_mut().find(|(d, _)| *d == digest) {
            Some((_, existing)) => {
                for tag in tags {
                    if !existing.contains(&tag) {
                        existing.push(tag);
                    }
                }
            }
            None => self.entries.push((digest, tags)),
        }
    }

    pub fn get(&self, digest: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(d, _)| d == digest)
            .map(|(_, tags)| tags.as_slice())
    }

    pub fn contains(&self, digest: &str) -> bool {
        self.get(digest).is_some()
    }

    /// Digests in declaration order.
    pub fn digests(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(d, _)| d.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(d, t)| (d.as_str(), t.as_slice()))
    }

    /// The first digest carrying `tag`.
    pub fn digest_for_tag(&self, tag: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, tags)| tags.iter().any(|t| t == tag))
            .map(|(d, _)| d.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<D: Into<String>> FromIterator<(D, Vec<String>)> for DigestTags {
    fn from_iter<I: IntoIterator<Item = (D, Vec<String>)>>(iter: I) -> Self {
        let mut dmap = DigestTags::new();
        for (digest, tags) in iter {
            dmap.insert(digest, tags);
        }
        dmap
    }
}

impl Serialize for DigestTags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (digest, tags) in &self.entries {
            map.serialize_entry(digest, tags)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DigestTags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = DigestTags;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of digest to tag list")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut dmap = DigestTags::new();
                while let Some((digest, tags)) = access.next_entry::<String, Option<Vec<String>>>()? {
                    dmap.insert(digest, tags.unwrap_or_default());
                }
                Ok(dmap)
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

/// One image and its authorised digests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    #[serde(alias = "imageName")]
    pub name: String,

    #[serde(default)]
    pub dmap: DigestTags,
}

/// A single promotion manifest record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub registries: Vec<RegistryContext>,

    #[serde(default)]
    pub images: Vec<Image>,

    /// File the manifest was read from, if any.
    #[serde(skip)]
    pub origin: Option<PathBuf>,
}

impl Manifest {
    /// The source registry, if one is marked.
    pub fn source_registry(&self) -> Option<&RegistryContext> {
        self.registries.iter().find(|r| r.src)
    }

    /// Check field-level rules. Cross-manifest rules (unique registry
    /// names) are enforced by [`ManifestIndex::build`].
    pub fn validate(&self) -> Result<(), ManifestError> {
        let origin = self.origin_label();

        for registry in &self.registries {
            if registry.name.is_empty() {
                return Err(ManifestError::MissingField {
                    origin: origin.clone(),
                    field: "registries[].name".to_string(),
                });
            }
            if registry.name.ends_with('/') {
                return Err(ManifestError::InvalidValue {
                    origin: origin.clone(),
                    field: "registries[].name".to_string(),
                    reason: format!("registry {:?} must not end with '/'", registry.name),
                });
            }
        }

        if self.registries.iter().filter(|r| r.src).count() > 1 {
            return Err(ManifestError::InvalidValue {
                origin: origin.clone(),
                field: "registries[].src".to_string(),
                reason: "more than one source registry".to_string(),
            });
        }

        let mut names = HashSet::new();
        for image in &self.images {
            if image.name.is_empty() {
                return Err(ManifestError::MissingField {
                    origin: origin.clone(),
                    field: "images[].name".to_string(),
                });
            }
            if !names.insert(image.name.as_str()) {
                return Err(ManifestError::DuplicateImage {
                    origin: origin.clone(),
                    image: image.name.clone(),
                });
            }
            for digest in image.dmap.digests() {
                if !is_canonical_digest(digest) {
                    return Err(ManifestError::InvalidDigest {
                        image: image.name.clone(),
                        digest: digest.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    fn origin_label(&self) -> String {
        self.origin
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(inline)".to_string())
    }
}

/// Errors raised while loading or indexing manifests.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("Manifest path not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk manifest directory: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Failed to parse YAML manifest {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to parse JSON manifest {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Duplicate registry name: '{0}'")]
    DuplicateRegistry(String),

    #[error("Manifest {origin}: image '{image}' is declared more than once")]
    DuplicateImage { origin: String, image: String },

    #[error("Manifest {origin}: missing required field '{field}'")]
    MissingField { origin: String, field: String },

    #[error("Manifest {origin}: invalid value for '{field}': {reason}")]
    InvalidValue {
        origin: String,
        field: String,
        reason: String,
    },

    #[error("Image '{image}': digest {digest:?} is not of the form sha256:<64 hex>")]
    InvalidDigest { image: String, digest: String },
}
