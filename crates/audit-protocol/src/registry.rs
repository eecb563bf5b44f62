//! Registry documents read back during an audit.
//!
//! Field names follow the registry's JSON (camelCase); sizes and timestamps
//! in repository listings arrive as decimal strings and are kept that way.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Docker manifest list media type.
pub const MEDIA_TYPE_DOCKER_MANIFEST_LIST: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";

/// OCI image index media type.
pub const MEDIA_TYPE_OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";

/// Docker single-platform image manifest media type.
pub const MEDIA_TYPE_DOCKER_MANIFEST: &str =
    "application/vnd.docker.distribution.manifest.v2+json";

/// True if the media type denotes a multi-platform parent document.
pub fn is_manifest_list_media_type(media_type: &str) -> bool {
    media_type == MEDIA_TYPE_DOCKER_MANIFEST_LIST || media_type == MEDIA_TYPE_OCI_INDEX
}

/// Per-digest metadata in a repository listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestInfo {
    #[serde(default)]
    pub image_size_bytes: String,
    #[serde(default)]
    pub layer_id: String,
    #[serde(default)]
    pub media_type: String,
    #[serde(default)]
    pub tag: Vec<String>,
    #[serde(default)]
    pub time_created_ms: String,
    #[serde(default)]
    pub time_uploaded_ms: String,
}

impl ManifestInfo {
    pub fn is_manifest_list(&self) -> bool {
        is_manifest_list_media_type(&self.media_type)
    }
}

/// Tag and manifest listing for one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoListing {
    /// Child repository names.
    #[serde(default)]
    pub child: Vec<String>,

    /// Digest to metadata.
    #[serde(default)]
    pub manifest: BTreeMap<String, ManifestInfo>,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub tags: Vec<String>,
}

impl RepoListing {
    /// Metadata for a digest, if the repository holds it.
    pub fn info(&self, digest: &str) -> Option<&ManifestInfo> {
        self.manifest.get(digest)
    }
}

/// Target platform of a manifest-list entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub architecture: String,
    pub os: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.variant {
            Some(variant) => write!(f, "{}/{}/{}", self.os, self.architecture, variant),
            None => write!(f, "{}/{}", self.os, self.architecture),
        }
    }
}

/// One platform-specific child of a manifest list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestListEntry {
    #[serde(default)]
    pub media_type: String,
    #[serde(default)]
    pub size: u64,
    pub digest: String,
    #[serde(default)]
    pub platform: Platform,
}

/// Multi-architecture parent document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestList {
    pub schema_version: u32,
    #[serde(default)]
    pub media_type: String,
    #[serde(default)]
    pub manifests: Vec<ManifestListEntry>,
}

impl ManifestList {
    /// Child digests in document order.
    pub fn child_digests(&self) -> impl Iterator<Item = &str> {
        self.manifests.iter().map(|m| m.digest.as_str())
    }

    /// The first entry whose digest equals `digest`.
    pub fn find_child(&self, digest: &str) -> Option<&ManifestListEntry> {
        self.manifests.iter().find(|m| m.digest == digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repo_listing() {
        let json = r#"{
            "child": [],
            "manifest": {
                "sha256:c419394f3fa40c32352be5a6ec5865270376d4351a3756bb1893be3f28fcba32": {
                    "imageSizeBytes": "0",
                    "layerId": "",
                    "mediaType": "application/vnd.docker.distribution.manifest.list.v2+json",
                    "tag": ["v0.0.8"],
                    "timeCreatedMs": "0",
                    "timeUploadedMs": "1583475321879"
                }
            },
            "name": "k8s-staging-kas-network-proxy/proxy-agent",
            "tags": ["v0.0.8"]
        }"#;

        let listing: RepoListing = serde_json::from_str(json).unwrap();
        let info = listing
            .info("sha256:c419394f3fa40c32352be5a6ec5865270376d4351a3756bb1893be3f28fcba32")
            .unwrap();
        assert!(info.is_manifest_list());
        assert_eq!(info.tag, vec!["v0.0.8"]);
        assert_eq!(listing.tags, vec!["v0.0.8"]);
    }

    #[test]
    fn test_parse_manifest_list() {
        let json = r#"{
            "schemaVersion": 2,
            "mediaType": "application/vnd.docker.distribution.manifest.list.v2+json",
            "manifests": [
                {
                    "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
                    "size": 528,
                    "digest": "sha256:aaaa",
                    "platform": {"architecture": "amd64", "os": "linux"}
                },
                {
                    "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
                    "size": 528,
                    "digest": "sha256:bbbb",
                    "platform": {"architecture": "arm", "os": "linux", "variant": "v7"}
                }
            ]
        }"#;

        let list: ManifestList = serde_json::from_str(json).unwrap();
        assert_eq!(list.child_digests().collect::<Vec<_>>(), vec!["sha256:aaaa", "sha256:bbbb"]);

        let entry = list.find_child("sha256:bbbb").unwrap();
        assert_eq!(entry.platform.to_string(), "linux/arm/v7");
        assert!(list.find_child("sha256:cccc").is_none());
    }

    #[test]
    fn test_media_types() {
        assert!(is_manifest_list_media_type(MEDIA_TYPE_OCI_INDEX));
        assert!(is_manifest_list_media_type(MEDIA_TYPE_DOCKER_MANIFEST_LIST));
        assert!(!is_manifest_list_media_type(MEDIA_TYPE_DOCKER_MANIFEST));
    }
}
