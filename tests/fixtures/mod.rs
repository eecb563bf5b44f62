//! Shared test fixtures
//!
//! The kas-network-proxy data is a real promotion: `proxy-agent` v0.0.8 was
//! promoted as one manifest list whose five platform children were then
//! pushed to production individually, without tags.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use audit_protocol::{GcrPayload, ManifestList, PushEnvelope, RepoListing};
use promo_audit::manifest::{Manifest, StaticManifestSource};
use promo_audit::mock::{FakeRegistryReader, RecordingLogger, RecordingReporter};
use promo_audit::{AuditService, DirectoryManifestSource, ManifestSource, Reconciler};

pub const STAGING: &str = "gcr.io/k8s-staging-kas-network-proxy";
pub const PROD: &str = "us.gcr.io/k8s-artifacts-prod/kas-network-proxy";
pub const IMAGE: &str = "proxy-agent";

/// Manifest-list digest of proxy-agent:v0.0.8.
pub const PARENT: &str = "sha256:c419394f3fa40c32352be5a6ec5865270376d4351a3756bb1893be3f28fcba32";
pub const CHILD_AMD64: &str = "sha256:7bcbdf4cb26400ac576b33718000f0b630290dcf6380be3f60e33e5ba0461d31";
pub const CHILD_S390X: &str = "sha256:8735603bbd7153b8bfc8d2460481282bb44e2e830e5b237738e5c3e2a58c8f45";

/// Declared nowhere and listed by no manifest list.
pub const STRANGER: &str = "sha256:ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff";

pub fn fixture_path(rel: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(rel)
}

pub fn manifests_dir() -> PathBuf {
    fixture_path("manifests")
}

/// The promoter manifest for kas-network-proxy, loaded from disk.
pub fn kas_manifests() -> Vec<Manifest> {
    DirectoryManifestSource::new(manifests_dir())
        .fetch()
        .expect("fixture manifests load")
}

pub fn proxy_agent_listing() -> RepoListing {
    let raw = std::fs::read(fixture_path("registry/proxy-agent-listing.json")).expect("listing fixture");
    serde_json::from_slice(&raw).expect("listing fixture parses")
}

pub fn proxy_agent_list() -> ManifestList {
    let raw = std::fs::read(fixture_path("registry/proxy-agent-v0.0.8-list.json")).expect("list fixture");
    serde_json::from_slice(&raw).expect("list fixture parses")
}

/// `<registry>/<image>@<digest>`, the key the fake reader uses.
pub fn list_key(registry: &str, digest: &str) -> String {
    format!("{}/{}@{}", registry, IMAGE, digest)
}

pub fn prod_ref(digest: &str) -> String {
    format!("{}/{}@{}", PROD, IMAGE, digest)
}

/// A registry serving the staging listing and the v0.0.8 manifest list.
pub fn kas_reader() -> FakeRegistryReader {
    FakeRegistryReader::new()
        .with_repo(&format!("{}/{}", STAGING, IMAGE), proxy_agent_listing())
        .with_manifest_list(&list_key(STAGING, PARENT), proxy_agent_list())
}

/// Wire body for a payload, as the push transport would send it.
pub fn envelope_body(payload: &GcrPayload) -> Vec<u8> {
    let envelope = PushEnvelope::wrap(payload, "1", "2").expect("envelope encodes");
    serde_json::to_vec(&envelope).expect("envelope serializes")
}

pub fn insert(digest: &str) -> GcrPayload {
    GcrPayload::new("INSERT", digest, "")
}

/// A service wired to fakes, with handles to inspect them.
pub struct Harness {
    pub service: AuditService,
    pub reader: FakeRegistryReader,
    pub logger: Arc<RecordingLogger>,
    pub reporter: Arc<RecordingReporter>,
}

impl Harness {
    pub fn new(manifests: Vec<Manifest>, reader: FakeRegistryReader) -> Self {
        Self::with_source(Box::new(StaticManifestSource::new(manifests)), reader)
    }

    pub fn with_source(source: Box<dyn ManifestSource>, reader: FakeRegistryReader) -> Self {
        let logger = Arc::new(RecordingLogger::new());
        let reporter = Arc::new(RecordingReporter::new());
        let reconciler = Reconciler::new(Arc::new(reader.clone()), logger.clone(), reporter.clone());
        Self {
            service: AuditService::new(source, reconciler).expect("fixture manifests index"),
            reader,
            logger,
            reporter,
        }
    }

    pub fn kas() -> Self {
        Self::new(kas_manifests(), kas_reader())
    }
}
