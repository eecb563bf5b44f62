//! Read-only lookup structure over a manifest snapshot.

use std::collections::{HashMap, HashSet};

use super::{DigestTags, Manifest, ManifestError, RegistryContext};

/// Registry and image a repository path belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath<'a> {
    pub registry: &'a RegistryContext,
    pub image: String,
}

/// An image of a registry's record declaring a digest at top level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectMatch<'a> {
    pub image: &'a str,
    pub tags: &'a [String],
}

/// A parent digest to probe during the child search, with the registry to
/// read its manifest list from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub registry: &'a RegistryContext,
    pub image: &'a str,
    pub digest: &'a str,
}

/// Index over a set of manifests.
///
/// Registry names are unique across the whole set, so every registry maps
/// to exactly one manifest record.
#[derive(Debug, Clone)]
pub struct ManifestIndex {
    manifests: Vec<Manifest>,
    /// Registry name to (manifest position, registry position).
    registries: HashMap<String, (usize, usize)>,
}

impl ManifestIndex {
    /// Validate and index the manifests. Fails on the first invalid record
    /// or on a registry name declared twice.
    pub fn build(manifests: Vec<Manifest>) -> Result<Self, ManifestError> {
        let mut registries = HashMap::new();

        for (mi, manifest) in manifests.iter().enumerate() {
            manifest.validate()?;
            for (ri, registry) in manifest.registries.iter().enumerate() {
                if registries.insert(registry.name.clone(), (mi, ri)).is_some() {
                    return Err(ManifestError::DuplicateRegistry(registry.name.clone()));
                }
            }
        }

        Ok(Self {
            manifests,
            registries,
        })
    }

    pub fn manifests(&self) -> &[Manifest] {
        &self.manifests
    }

    pub fn registry_count(&self) -> usize {
        self.registries.len()
    }

    pub fn find_registry(&self, name: &str) -> Option<&RegistryContext> {
        let &(mi, ri) = self.registries.get(name)?;
        self.manifests.get(mi)?.registries.get(ri)
    }

    /// The manifest record declaring `registry`.
    pub fn manifest_for(&self, registry: &str) -> Option<&Manifest> {
        let &(mi, _) = self.registries.get(registry)?;
        self.manifests.get(mi)
    }

    /// Source registry of the record declaring `registry`.
    pub fn source_registry(&self, registry: &str) -> Option<&RegistryContext> {
        self.manifest_for(registry)?.source_registry()
    }

    pub fn find_image(&self, registry: &str, image: &str) -> Option<&DigestTags> {
        self.manifest_for(registry)?
            .images
            .iter()
            .find(|i| i.name == image)
            .map(|i| &i.dmap)
    }

    pub fn is_known_digest(&self, registry: &str, image: &str, digest: &str) -> bool {
        self.find_image(registry, image)
            .map(|dmap| dmap.contains(digest))
            .unwrap_or(false)
    }

    pub fn tags_for(&self, registry: &str, image: &str, digest: &str) -> Option<&[String]> {
        self.find_image(registry, image)?.get(digest)
    }

    pub fn digest_for_tag(&self, registry: &str, image: &str, tag: &str) -> Option<&str> {
        self.find_image(registry, image)?.digest_for_tag(tag)
    }

    /// The first image of `registry`'s record, in declaration order, that
    /// lists `digest` at top level. Images of a record are promoted to every
    /// registry of that record, whatever the pushed path names.
    pub fn find_direct(&self, registry: &str, digest: &str) -> Option<DirectMatch<'_>> {
        self.manifest_for(registry)?.images.iter().find_map(|image| {
            image.dmap.get(digest).map(|tags| DirectMatch {
                image: image.name.as_str(),
                tags,
            })
        })
    }

    /// Split a repository path into a declared registry and an image name.
    ///
    /// The longest registry name that is a `/`-terminated prefix of `path`
    /// wins, so nested registries resolve to the most specific one.
    pub fn resolve_path(&self, path: &str) -> Option<ResolvedPath<'_>> {
        let mut best: Option<(&RegistryContext, &str)> = None;

        for name in self.registries.keys() {
            let Some(rest) = path.strip_prefix(name.as_str()).and_then(|r| r.strip_prefix('/')) else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }
            if best.map_or(true, |(b, _)| name.len() > b.name.len()) {
                if let Some(registry) = self.find_registry(name) {
                    best = Some((registry, rest));
                }
            }
        }

        best.map(|(registry, image)| ResolvedPath {
            registry,
            image: image.to_string(),
        })
    }

    /// Parent digests that could own a child pushed to `registry`, in
    /// declaration order: registries of the record as listed, images as
    /// listed, then each image's digests as listed. The same digest appears
    /// once per registry; callers dedupe.
    pub fn candidates(&self, registry: &str) -> Vec<Candidate<'_>> {
        let Some(manifest) = self.manifest_for(registry) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for registry in &manifest.registries {
            for entry in &manifest.images {
                for digest in entry.dmap.digests() {
                    out.push(Candidate {
                        registry,
                        image: entry.name.as_str(),
                        digest,
                    });
                }
            }
        }
        out
    }

    /// Number of distinct top-level digests across every manifest.
    pub fn distinct_digest_count(&self) -> usize {
        self.manifests
            .iter()
            .flat_map(|m| m.images.iter())
            .flat_map(|i| i.dmap.digests())
            .collect::<HashSet<_>>()
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Image;

    const D1: &str = "sha256:1111111111111111111111111111111111111111111111111111111111111111";
    const D2: &str = "sha256:2222222222222222222222222222222222222222222222222222222222222222";

    fn manifest(registries: Vec<RegistryContext>, images: Vec<(&str, Vec<&str>)>) -> Manifest {
        Manifest {
            registries,
            images: images
                .into_iter()
                .map(|(name, digests)| Image {
                    name: name.to_string(),
                    dmap: digests.into_iter().map(|d| (d, vec!["v1".to_string()])).collect(),
                })
                .collect(),
            origin: None,
        }
    }

    fn sample_index() -> ManifestIndex {
        ManifestIndex::build(vec![manifest(
            vec![
                RegistryContext::source("gcr.io/staging"),
                RegistryContext::new("us.gcr.io/prod"),
                RegistryContext::new("eu.gcr.io/prod"),
            ],
            vec![("app", vec![D1, D2]), ("other", vec![D2])],
        )])
        .unwrap()
    }

    #[test]
    fn test_duplicate_registry_is_rejected() {
        let a = manifest(vec![RegistryContext::new("gcr.io/x")], vec![]);
        let b = manifest(vec![RegistryContext::new("gcr.io/x")], vec![]);
        let err = ManifestIndex::build(vec![a, b]).unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateRegistry(name) if name == "gcr.io/x"));
    }

    #[test]
    fn test_lookups() {
        let index = sample_index();
        assert_eq!(index.registry_count(), 3);
        assert!(index.find_registry("us.gcr.io/prod").is_some());
        assert!(index.find_registry("us.gcr.io/nope").is_none());
        assert!(index.is_known_digest("eu.gcr.io/prod", "app", D1));
        assert!(!index.is_known_digest("eu.gcr.io/prod", "other", D1));
        assert!(!index.is_known_digest("eu.gcr.io/prod", "missing", D1));
        assert_eq!(index.source_registry("us.gcr.io/prod").unwrap().name, "gcr.io/staging");
        assert_eq!(index.digest_for_tag("us.gcr.io/prod", "app", "v1"), Some(D1));
        assert_eq!(index.distinct_digest_count(), 2);
    }

    #[test]
    fn test_resolve_path_prefers_longest_registry() {
        let index = ManifestIndex::build(vec![
            manifest(vec![RegistryContext::new("gcr.io/prod")], vec![]),
            manifest(vec![RegistryContext::new("gcr.io/prod/team")], vec![]),
        ])
        .unwrap();

        let resolved = index.resolve_path("gcr.io/prod/team/app").unwrap();
        assert_eq!(resolved.registry.name, "gcr.io/prod/team");
        assert_eq!(resolved.image, "app");

        let resolved = index.resolve_path("gcr.io/prod/app/sub").unwrap();
        assert_eq!(resolved.registry.name, "gcr.io/prod");
        assert_eq!(resolved.image, "app/sub");
    }

    #[test]
    fn test_resolve_path_requires_separator() {
        let index = sample_index();
        assert!(index.resolve_path("us.gcr.io/prodx/app").is_none());
        assert!(index.resolve_path("us.gcr.io/prod").is_none());
    }

    #[test]
    fn test_candidates_follow_declaration_order() {
        let index = sample_index();
        let got: Vec<(&str, &str, &str)> = index
            .candidates("us.gcr.io/prod")
            .iter()
            .map(|c| (c.registry.name.as_str(), c.image, c.digest))
            .collect();
        assert_eq!(
            got,
            vec![
                ("gcr.io/staging", "app", D1),
                ("gcr.io/staging", "app", D2),
                ("gcr.io/staging", "other", D2),
                ("us.gcr.io/prod", "app", D1),
                ("us.gcr.io/prod", "app", D2),
                ("us.gcr.io/prod", "other", D2),
                ("eu.gcr.io/prod", "app", D1),
                ("eu.gcr.io/prod", "app", D2),
                ("eu.gcr.io/prod", "other", D2),
            ]
        );
        assert!(index.candidates("unknown").is_empty());
    }

    #[test]
    fn test_find_direct_spans_every_image_of_the_record() {
        let index = sample_index();

        let hit = index.find_direct("eu.gcr.io/prod", D2).unwrap();
        assert_eq!(hit.image, "app", "first declared image wins");
        assert_eq!(hit.tags, &["v1".to_string()][..]);

        let index = ManifestIndex::build(vec![manifest(
            vec![RegistryContext::new("us.gcr.io/prod")],
            vec![("app", vec![D1]), ("other", vec![D2])],
        )])
        .unwrap();
        assert_eq!(index.find_direct("us.gcr.io/prod", D2).unwrap().image, "other");
        assert!(index.find_direct("us.gcr.io/prod", "sha256:none").is_none());
        assert!(index.find_direct("unknown", D1).is_none());
    }
}
