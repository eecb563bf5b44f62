//! Image references carried in push payloads.
//!
//! Digest references look like `us.gcr.io/prod/app@sha256:<64 hex>`,
//! tag references like `us.gcr.io/prod/app:v1.2.3`.

use std::fmt;
use std::sync::OnceLock;

use regex_lite::Regex;

use crate::error::ReferenceError;

fn digest_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^sha256:[0-9a-f]{64}$").expect("valid digest pattern"))
}

/// True if `digest` is `sha256:` followed by exactly 64 lowercase hex digits.
pub fn is_canonical_digest(digest: &str) -> bool {
    digest_pattern().is_match(digest)
}

/// `<path>@<digest>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DigestReference {
    /// Repository path, e.g. `us.gcr.io/prod/app`.
    pub path: String,
    /// `sha256:<hex>`
    pub digest: String,
}

impl DigestReference {
    pub fn parse(reference: &str) -> Result<Self, ReferenceError> {
        let (path, digest) = reference
            .split_once('@')
            .ok_or_else(|| ReferenceError::MissingDigestSeparator(reference.to_string()))?;

        if path.is_empty() {
            return Err(ReferenceError::EmptyPath(reference.to_string()));
        }
        if !is_canonical_digest(digest) {
            return Err(ReferenceError::InvalidDigest(digest.to_string()));
        }

        Ok(Self {
            path: path.to_string(),
            digest: digest.to_string(),
        })
    }
}

impl fmt::Display for DigestReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.path, self.digest)
    }
}

/// `<path>:<tag>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagReference {
    pub path: String,
    pub tag: String,
}

impl TagReference {
    /// Parse a tag reference. The tag separator is the last `:` after the
    /// last `/`, so a registry host with a port is not mistaken for a tag.
    pub fn parse(reference: &str) -> Result<Self, ReferenceError> {
        let name_start = reference.rfind('/').map(|i| i + 1).unwrap_or(0);
        let colon = reference[name_start..]
            .rfind(':')
            .map(|i| name_start + i)
            .ok_or_else(|| ReferenceError::MissingTagSeparator(reference.to_string()))?;

        let (path, tag) = (&reference[..colon], &reference[colon + 1..]);
        if path.is_empty() {
            return Err(ReferenceError::EmptyPath(reference.to_string()));
        }
        if tag.is_empty() {
            return Err(ReferenceError::EmptyTag(reference.to_string()));
        }

        Ok(Self {
            path: path.to_string(),
            tag: tag.to_string(),
        })
    }
}

impl fmt::Display for TagReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path, self.tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEX: &str = "8735603bbd7153b8bfc8d2460481282bb44e2e830e5b237738e5c3e2a58c8f45";

    #[test]
    fn test_canonical_digest() {
        assert!(is_canonical_digest(&format!("sha256:{}", HEX)));
        assert!(!is_canonical_digest(&format!("sha256:{}", &HEX[1..])));
        assert!(!is_canonical_digest(&format!("sha512:{}", HEX)));
        assert!(!is_canonical_digest(&format!("sha256:{}", HEX.to_uppercase())));
    }

    #[test]
    fn test_parse_digest_reference() {
        let raw = format!("us.gcr.io/k8s-artifacts-prod/kas-network-proxy/proxy-agent@sha256:{}", HEX);
        let parsed = DigestReference::parse(&raw).unwrap();
        assert_eq!(parsed.path, "us.gcr.io/k8s-artifacts-prod/kas-network-proxy/proxy-agent");
        assert_eq!(parsed.digest, format!("sha256:{}", HEX));
        assert_eq!(parsed.to_string(), raw);
    }

    #[test]
    fn test_digest_reference_errors() {
        assert!(matches!(
            DigestReference::parse("gcr.io/foo/bar"),
            Err(ReferenceError::MissingDigestSeparator(_))
        ));
        assert!(matches!(
            DigestReference::parse(&format!("@sha256:{}", HEX)),
            Err(ReferenceError::EmptyPath(_))
        ));
        assert!(matches!(
            DigestReference::parse("gcr.io/foo/bar@sha256:abc"),
            Err(ReferenceError::InvalidDigest(_))
        ));
    }

    #[test]
    fn test_parse_tag_reference() {
        let parsed = TagReference::parse("gcr.io/foo/bar:1.0").unwrap();
        assert_eq!(parsed.path, "gcr.io/foo/bar");
        assert_eq!(parsed.tag, "1.0");
    }

    #[test]
    fn test_tag_reference_with_registry_port() {
        let parsed = TagReference::parse("localhost:5000/foo/bar:v2").unwrap();
        assert_eq!(parsed.path, "localhost:5000/foo/bar");
        assert_eq!(parsed.tag, "v2");

        assert!(matches!(
            TagReference::parse("localhost:5000/foo/bar"),
            Err(ReferenceError::MissingTagSeparator(_))
        ));
    }

    #[test]
    fn test_tag_reference_empty_tag() {
        assert!(matches!(
            TagReference::parse("gcr.io/foo/bar:"),
            Err(ReferenceError::EmptyTag(_))
        ));
    }
}
