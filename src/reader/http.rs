//! Registry reads over the Docker Registry HTTP API v2.
//!
//! Registry names are `<host>/<repo prefix>`; the reader maps them onto
//! `/v2/<repo prefix>/<image>/tags/list` and
//! `/v2/<repo prefix>/<image>/manifests/<digest>`.

use std::io::Read;
use std::time::Duration;

use audit_protocol::registry::{MEDIA_TYPE_DOCKER_MANIFEST_LIST, MEDIA_TYPE_OCI_INDEX};
use audit_protocol::{ManifestList, RepoListing};
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use super::{ManifestListContext, ReadError, RegistryReader};
use crate::manifest::RegistryContext;

/// Settings for [`HttpRegistryReader`].
#[derive(Debug, Clone)]
pub struct HttpReaderConfig {
    /// `https` in production; `http` for local registries.
    pub scheme: String,
    /// Whole-request timeout.
    pub timeout_ms: u64,
    /// Static bearer token sent with every request.
    pub token: Option<String>,
    /// Responses larger than this are rejected.
    pub max_response_bytes: usize,
}

impl Default for HttpReaderConfig {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            timeout_ms: 10_000,
            token: None,
            max_response_bytes: 8 * 1024 * 1024,
        }
    }
}

/// Blocking registry client.
pub struct HttpRegistryReader {
    client: Client,
    config: HttpReaderConfig,
}

impl HttpRegistryReader {
    pub fn new(config: HttpReaderConfig) -> Result<Self, ReadError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ReadError::Transport {
                url: String::new(),
                message: e.to_string(),
            })?;
        Ok(Self { client, config })
    }

    /// Build `<scheme>://<host>/v2/<repo>/<suffix>` for a registry name.
    fn endpoint(&self, registry: &str, image: Option<&str>, suffix: &str) -> Result<String, ReadError> {
        let (host, prefix) = match registry.split_once('/') {
            Some((host, prefix)) => (host, Some(prefix)),
            None => (registry, None),
        };
        if host.is_empty() {
            return Err(ReadError::InvalidRegistry(registry.to_string()));
        }

        let repo: Vec<&str> = [prefix, image].into_iter().flatten().filter(|s| !s.is_empty()).collect();
        if repo.is_empty() {
            return Ok(format!("{}://{}/v2/{}", self.config.scheme, host, suffix));
        }
        Ok(format!("{}://{}/v2/{}/{}", self.config.scheme, host, repo.join("/"), suffix))
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str, accept: &str) -> Result<T, ReadError> {
        let mut request = self.client.get(url).header(ACCEPT, accept);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|e| ReadError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ReadError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(ReadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let limit = self.config.max_response_bytes;
        if let Some(len) = response.content_length() {
            if len > limit as u64 {
                return Err(oversized(url, len, limit));
            }
        }

        let mut body = Vec::new();
        response
            .take(limit as u64 + 1)
            .read_to_end(&mut body)
            .map_err(|e| ReadError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        if body.len() > limit {
            return Err(oversized(url, body.len() as u64, limit));
        }

        serde_json::from_slice(&body).map_err(|source| ReadError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

fn oversized(url: &str, len: u64, limit: usize) -> ReadError {
    ReadError::Transport {
        url: url.to_string(),
        message: format!("response of {} bytes exceeds limit of {}", len, limit),
    }
}

impl RegistryReader for HttpRegistryReader {
    fn read_repo(&self, registry: &RegistryContext, image: Option<&str>) -> Result<RepoListing, ReadError> {
        let url = self.endpoint(&registry.name, image, "tags/list")?;
        tracing::debug!(%url, "reading repository listing");
        self.get_json(&url, "application/json")
    }

    fn read_manifest_list(&self, target: &ManifestListContext) -> Result<ManifestList, ReadError> {
        let suffix = format!("manifests/{}", target.digest);
        let url = self.endpoint(&target.registry.name, Some(&target.image_name), &suffix)?;
        tracing::debug!(%url, "reading manifest list");
        let accept = format!("{}, {}", MEDIA_TYPE_DOCKER_MANIFEST_LIST, MEDIA_TYPE_OCI_INDEX);
        self.get_json(&url, &accept)
    }
}
