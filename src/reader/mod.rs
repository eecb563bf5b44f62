//! Registry Reader Facility
//!
//! The auditor reads two kinds of documents from registries: repository
//! listings (which digests exist, with media types and tags) and manifest
//! lists (the platform children of a multi-architecture parent). Both
//! reads go through [`RegistryReader`] so production and tests can supply
//! different implementations.

mod http;

pub use http::{HttpReaderConfig, HttpRegistryReader};

use std::fmt;

use audit_protocol::{ManifestList, RepoListing};

use crate::manifest::RegistryContext;

/// Reads registry documents. Every call is a blocking remote read and may
/// fail independently.
pub trait RegistryReader: Send + Sync {
    /// List the repository `registry/image`, or the registry root when
    /// `image` is `None`.
    fn read_repo(&self, registry: &RegistryContext, image: Option<&str>) -> Result<RepoListing, ReadError>;

    /// Fetch the manifest list stored under a parent digest.
    fn read_manifest_list(&self, target: &ManifestListContext) -> Result<ManifestList, ReadError>;
}

/// Address of a manifest list: `<registry>/<image>@<digest>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestListContext {
    pub registry: RegistryContext,
    pub image_name: String,
    pub digest: String,
}

impl ManifestListContext {
    pub fn new(registry: RegistryContext, image_name: impl Into<String>, digest: impl Into<String>) -> Self {
        Self {
            registry,
            image_name: image_name.into(),
            digest: digest.into(),
        }
    }

    /// `<registry>/<image>`
    pub fn repository(&self) -> String {
        format!("{}/{}", self.registry.name, self.image_name)
    }
}

impl fmt::Display for ManifestListContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}@{}", self.registry.name, self.image_name, self.digest)
    }
}

/// Failed registry read.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("Registry returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Invalid registry response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Registry name {0:?} has no host component")]
    InvalidRegistry(String),

    #[error("No such document: {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_list_context_display() {
        let ctx = ManifestListContext::new(
            RegistryContext::source("gcr.io/k8s-staging-kas-network-proxy"),
            "proxy-agent",
            "sha256:c419",
        );
        assert_eq!(
            ctx.to_string(),
            "gcr.io/k8s-staging-kas-network-proxy/proxy-agent@sha256:c419"
        );
        assert_eq!(ctx.repository(), "gcr.io/k8s-staging-kas-network-proxy/proxy-agent");
    }
}
