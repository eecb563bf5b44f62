//! In-memory registry.
//!
//! Repository listings are keyed by `<registry>/<image>` (or the bare
//! registry name for root listings), manifest lists by
//! `<registry>/<image>@<digest>`. Unknown keys read as not found.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use std::collections::HashMap;

use audit_protocol::{ManifestList, RepoListing};

use super::failure::{FailureConfig, FailureInjector};
use crate::manifest::RegistryContext;
use crate::reader::{ManifestListContext, ReadError, RegistryReader};

#[derive(Debug, Default)]
struct Inner {
    repos: HashMap<String, RepoListing>,
    lists: HashMap<String, ManifestList>,
    failures: FailureInjector,
    repo_reads: Vec<String>,
    list_reads: Vec<String>,
}

/// Fake [`RegistryReader`]. Clones share state, so a test can keep a
/// handle for inspecting reads after moving one into the reconciler.
#[derive(Debug, Clone, Default)]
pub struct FakeRegistryReader {
    inner: Arc<Mutex<Inner>>,
}

impl FakeRegistryReader {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_repo(self, key: &str, listing: RepoListing) -> Self {
        self.inner().repos.insert(key.to_string(), listing);
        self
    }

    pub fn with_manifest_list(self, key: &str, list: ManifestList) -> Self {
        self.inner().lists.insert(key.to_string(), list);
        self
    }

    /// Make reads of `key` fail.
    pub fn with_failure(self, key: &str, config: FailureConfig) -> Self {
        self.inner().failures.inject(key, config);
        self
    }

    /// Keys of manifest-list reads, in call order.
    pub fn manifest_list_requests(&self) -> Vec<String> {
        self.inner().list_reads.clone()
    }

    pub fn manifest_list_reads(&self) -> usize {
        self.inner().list_reads.len()
    }

    /// Keys of repository reads, in call order.
    pub fn repo_requests(&self) -> Vec<String> {
        self.inner().repo_reads.clone()
    }

    fn injected(inner: &mut Inner, key: &str) -> Result<(), ReadError> {
        let Some(config) = inner.failures.check(key) else {
            return Ok(());
        };
        match config.status {
            Some(status) => Err(ReadError::Status {
                url: key.to_string(),
                status,
            }),
            None => Err(ReadError::Transport {
                url: key.to_string(),
                message: config.message.clone(),
            }),
        }
    }
}

impl RegistryReader for FakeRegistryReader {
    fn read_repo(&self, registry: &RegistryContext, image: Option<&str>) -> Result<RepoListing, ReadError> {
        let key = match image {
            Some(image) => format!("{}/{}", registry.name, image),
            None => registry.name.clone(),
        };

        let mut inner = self.inner();
        inner.repo_reads.push(key.clone());
        Self::injected(&mut inner, &key)?;
        inner.repos.get(&key).cloned().ok_or(ReadError::NotFound(key))
    }

    fn read_manifest_list(&self, target: &ManifestListContext) -> Result<ManifestList, ReadError> {
        let key = target.to_string();

        let mut inner = self.inner();
        inner.list_reads.push(key.clone());
        Self::injected(&mut inner, &key)?;
        inner.lists.get(&key).cloned().ok_or(ReadError::NotFound(key))
    }
}
