//! Audit Reconciler
//!
//! Decides whether a validated push event is explained by the promotion
//! manifest. A digest is authorised when the pushed registry's manifest
//! record declares it for any of its images (direct match), or when it is a
//! platform child of a manifest list that record declares (child match).
//! The child search walks candidate parents in declaration order, reads
//! each parent's manifest list through the [`RegistryReader`], and stops at
//! the first parent listing the digest. A failed read only costs that
//! candidate.

mod context;
mod error;
mod verdict;

pub use context::ReconciliationContext;
pub use error::AuditError;
pub use verdict::{MatchReason, SearchStats, Verdict, VerdictStatus};

use std::collections::HashMap;
use std::sync::Arc;

use audit_protocol::{AuditEvent, DigestReference, RepoListing, TagReference};

use crate::manifest::{ManifestIndex, ResolvedPath};
use crate::reader::{ManifestListContext, RegistryReader};
use crate::sink::{EventContext, LogRecord, LoggingFacility, ReportingFacility};

/// Literal token downstream consumers match verified records on.
pub const VERIFIED_TOKEN: &str = "TRANSACTION VERIFIED";

/// Reconciles push events against a manifest snapshot.
pub struct Reconciler {
    reader: Arc<dyn RegistryReader>,
    logger: Arc<dyn LoggingFacility>,
    reporter: Arc<dyn ReportingFacility>,
    max_candidates: Option<usize>,
}

impl Reconciler {
    pub fn new(
        reader: Arc<dyn RegistryReader>,
        logger: Arc<dyn LoggingFacility>,
        reporter: Arc<dyn ReportingFacility>,
    ) -> Self {
        Self {
            reader,
            logger,
            reporter,
            max_candidates: None,
        }
    }

    /// Lower the number of manifest lists read per event. The search is
    /// always bounded by the number of distinct declared digests.
    pub fn with_max_candidates(mut self, max: Option<usize>) -> Self {
        self.max_candidates = max;
        self
    }

    pub fn logger(&self) -> &Arc<dyn LoggingFacility> {
        &self.logger
    }

    pub fn reporter(&self) -> &Arc<dyn ReportingFacility> {
        &self.reporter
    }

    /// Reconcile and record the disposition: a verified record on the
    /// logger, or exactly one report for an unverified event.
    pub fn audit(&self, index: &ManifestIndex, event: &AuditEvent, context: &EventContext) -> Verdict {
        let verdict = self.reconcile(index, event);

        if verdict.is_verified() {
            self.logger.log(
                LogRecord::info(format!(
                    "{}: {} ({})",
                    VERIFIED_TOKEN,
                    event.subject(),
                    verdict.reason.code()
                ))
                .field("request_id", &context.request_id)
                .field("detail", &verdict.reason)
                .field("probed", verdict.stats.probed),
            );
        } else {
            let err = AuditError::Unverified {
                subject: event.subject().to_string(),
                reason: verdict.reason.to_string(),
            };
            self.reporter.report(&err, context);
        }

        verdict
    }

    /// Decide the verdict for one event. Only candidate failures and cap
    /// hits are logged here; the disposition is left to [`Self::audit`].
    pub fn reconcile(&self, index: &ManifestIndex, event: &AuditEvent) -> Verdict {
        if !event.has_digest() {
            return self.reconcile_tag(index, event);
        }

        let reference = match DigestReference::parse(&event.digest) {
            Ok(reference) => reference,
            Err(e) => {
                return Verdict::unverified(
                    event,
                    MatchReason::MalformedReference { detail: e.to_string() },
                    SearchStats::default(),
                )
            }
        };

        let Some(resolved) = index.resolve_path(&reference.path) else {
            return Verdict::unverified(
                event,
                MatchReason::UnknownRegistry {
                    path: reference.path.clone(),
                },
                SearchStats::default(),
            );
        };

        if let Some(hit) = index.find_direct(&resolved.registry.name, &reference.digest) {
            return Verdict::verified(
                event,
                MatchReason::Direct {
                    registry: resolved.registry.name.clone(),
                    image: hit.image.to_string(),
                    tags: hit.tags.to_vec(),
                },
                SearchStats::default(),
            );
        }

        self.search_children(index, &resolved, &reference.digest, event)
    }

    /// Look for a declared manifest list that has `digest` as a child.
    fn search_children(
        &self,
        index: &ManifestIndex,
        resolved: &ResolvedPath<'_>,
        digest: &str,
        event: &AuditEvent,
    ) -> Verdict {
        let registry = &resolved.registry.name;
        let candidates = index.candidates(registry);

        let mut budget = index.distinct_digest_count();
        if let Some(max) = self.max_candidates {
            budget = budget.min(max);
        }
        let mut ctx = ReconciliationContext::new(registry.as_str(), budget);

        // Source listings per image, read on first use.
        let mut listings: HashMap<&str, Option<RepoListing>> = HashMap::new();

        for candidate in &candidates {
            if ctx.is_visited(candidate.digest) {
                continue;
            }

            let listing = listings
                .entry(candidate.image)
                .or_insert_with(|| self.source_listing(index, registry, candidate.image));
            if let Some(info) = listing.as_ref().and_then(|l| l.info(candidate.digest)) {
                if !info.is_manifest_list() {
                    ctx.visit(candidate.digest);
                    ctx.record_skip();
                    continue;
                }
            }

            if ctx.exhausted() {
                self.logger.log(
                    LogRecord::warn("child search stopped at candidate limit")
                        .field("registry", ctx.target_registry())
                        .field("digest", digest)
                        .field("limit", budget),
                );
                break;
            }

            let target = ManifestListContext::new(candidate.registry.clone(), candidate.image, candidate.digest);
            ctx.visit(candidate.digest);
            ctx.record_probe();

            let list = match self.reader.read_manifest_list(&target) {
                Ok(list) => list,
                Err(e) => {
                    ctx.record_failure();
                    self.logger.log(
                        LogRecord::error("manifest list read failed")
                            .field("candidate", &target)
                            .field("error", e),
                    );
                    continue;
                }
            };

            if let Some(entry) = list.find_child(digest) {
                return Verdict::verified(
                    event,
                    MatchReason::ChildOfPromotedParent {
                        registry: candidate.registry.name.clone(),
                        image: candidate.image.to_string(),
                        parent: candidate.digest.to_string(),
                        platform: entry.platform.clone(),
                    },
                    ctx.stats(),
                );
            }
        }

        Verdict::unverified(
            event,
            MatchReason::NoMatch {
                registry: registry.clone(),
                image: resolved.image.clone(),
            },
            ctx.stats(),
        )
    }

    /// Listing of `image` in the record's source registry, used to skip
    /// candidates that are plain manifests. `None` when unavailable.
    fn source_listing(&self, index: &ManifestIndex, registry: &str, image: &str) -> Option<RepoListing> {
        let source = index.source_registry(registry)?;
        match self.reader.read_repo(source, Some(image)) {
            Ok(listing) => Some(listing),
            Err(e) => {
                self.logger.log(
                    LogRecord::warn("repository listing unavailable")
                        .field("registry", &source.name)
                        .field("image", image)
                        .field("error", e),
                );
                None
            }
        }
    }

    fn reconcile_tag(&self, index: &ManifestIndex, event: &AuditEvent) -> Verdict {
        let raw = event.tag.as_deref().unwrap_or_default();
        let reference = match TagReference::parse(raw) {
            Ok(reference) => reference,
            Err(e) => {
                return Verdict::unverified(
                    event,
                    MatchReason::MalformedReference { detail: e.to_string() },
                    SearchStats::default(),
                )
            }
        };

        let Some(resolved) = index.resolve_path(&reference.path) else {
            return Verdict::unverified(
                event,
                MatchReason::UnknownRegistry {
                    path: reference.path.clone(),
                },
                SearchStats::default(),
            );
        };

        let registry = resolved.registry.name.clone();
        match index.digest_for_tag(&registry, &resolved.image, &reference.tag) {
            Some(digest) => Verdict::verified(
                event,
                MatchReason::Tag {
                    registry,
                    image: resolved.image,
                    digest: digest.to_string(),
                },
                SearchStats::default(),
            ),
            None => Verdict::unverified(
                event,
                MatchReason::UndeclaredTag {
                    registry,
                    image: resolved.image,
                    tag: reference.tag,
                },
                SearchStats::default(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{Image, Manifest, RegistryContext};
    use crate::mock::{FakeRegistryReader, RecordingLogger, RecordingReporter};
    use crate::sink::LogLevel;
    use audit_protocol::{Action, ManifestList, ManifestListEntry, Platform};

    const PARENT: &str = "sha256:1111111111111111111111111111111111111111111111111111111111111111";
    const OTHER: &str = "sha256:2222222222222222222222222222222222222222222222222222222222222222";
    const CHILD: &str = "sha256:3333333333333333333333333333333333333333333333333333333333333333";

    fn index(digests: &[&str]) -> ManifestIndex {
        ManifestIndex::build(vec![Manifest {
            registries: vec![
                RegistryContext::source("gcr.io/staging"),
                RegistryContext::new("us.gcr.io/prod"),
            ],
            images: vec![Image {
                name: "app".to_string(),
                dmap: digests.iter().map(|d| (*d, vec!["v1".to_string()])).collect(),
            }],
            origin: None,
        }])
        .unwrap()
    }

    fn list_with(child: &str) -> ManifestList {
        ManifestList {
            schema_version: 2,
            media_type: audit_protocol::registry::MEDIA_TYPE_DOCKER_MANIFEST_LIST.to_string(),
            manifests: vec![ManifestListEntry {
                media_type: audit_protocol::registry::MEDIA_TYPE_DOCKER_MANIFEST.to_string(),
                size: 528,
                digest: child.to_string(),
                platform: Platform {
                    architecture: "amd64".to_string(),
                    os: "linux".to_string(),
                    variant: None,
                },
            }],
        }
    }

    fn event(digest: &str) -> AuditEvent {
        AuditEvent {
            action: Action::Insert,
            digest: format!("us.gcr.io/prod/app@{}", digest),
            tag: None,
        }
    }

    fn reconciler(reader: FakeRegistryReader) -> (Reconciler, Arc<RecordingLogger>, Arc<RecordingReporter>) {
        let logger = Arc::new(RecordingLogger::new());
        let reporter = Arc::new(RecordingReporter::new());
        let r = Reconciler::new(Arc::new(reader), logger.clone(), reporter.clone());
        (r, logger, reporter)
    }

    #[test]
    fn test_direct_match_reads_nothing() {
        let reader = FakeRegistryReader::new();
        let (r, _, _) = reconciler(reader.clone());
        let verdict = r.reconcile(&index(&[PARENT]), &event(PARENT));
        assert!(verdict.is_verified());
        assert_eq!(verdict.reason.code(), "direct");
        assert_eq!(reader.manifest_list_reads(), 0);
    }

    #[test]
    fn test_direct_and_child_match_under_a_sibling_image() {
        let idx = ManifestIndex::build(vec![Manifest {
            registries: vec![
                RegistryContext::source("gcr.io/staging"),
                RegistryContext::new("us.gcr.io/prod"),
            ],
            images: vec![
                Image {
                    name: "app".to_string(),
                    dmap: [(PARENT, vec!["v1".to_string()])].into_iter().collect(),
                },
                Image {
                    name: "sidecar".to_string(),
                    dmap: [(OTHER, vec![])].into_iter().collect(),
                },
            ],
            origin: None,
        }])
        .unwrap();
        let reader = FakeRegistryReader::new()
            .with_manifest_list(&format!("gcr.io/staging/app@{}", PARENT), list_with(CHILD));
        let (r, _, _) = reconciler(reader.clone());

        let mut ev = event(PARENT);
        ev.digest = format!("us.gcr.io/prod/sidecar@{}", PARENT);
        let verdict = r.reconcile(&idx, &ev);
        assert!(matches!(
            verdict.reason,
            MatchReason::Direct { ref image, .. } if image == "app"
        ));

        ev.digest = format!("us.gcr.io/prod/sidecar@{}", CHILD);
        let verdict = r.reconcile(&idx, &ev);
        assert!(verdict.is_verified());
        assert_eq!(
            reader.manifest_list_requests(),
            vec![format!("gcr.io/staging/app@{}", PARENT)],
            "the parent is read under the image that declares it"
        );
    }

    #[test]
    fn test_child_match() {
        let reader = FakeRegistryReader::new()
            .with_manifest_list(&format!("gcr.io/staging/app@{}", PARENT), list_with(CHILD));
        let (r, _, _) = reconciler(reader);
        let verdict = r.reconcile(&index(&[PARENT]), &event(CHILD));
        assert!(verdict.is_verified());
        assert!(matches!(
            verdict.reason,
            MatchReason::ChildOfPromotedParent { ref parent, .. } if parent == PARENT
        ));
        assert_eq!(verdict.stats.probed, 1);
    }

    #[test]
    fn test_visited_set_bounds_reads() {
        // Both registries declare the same parent; it is read once.
        let reader = FakeRegistryReader::new();
        let (r, _, _) = reconciler(reader.clone());
        let verdict = r.reconcile(&index(&[PARENT]), &event(CHILD));
        assert!(!verdict.is_verified());
        assert_eq!(reader.manifest_list_reads(), 1);
        assert_eq!(verdict.stats.failed, 1);
    }

    #[test]
    fn test_max_candidates_caps_reads() {
        let reader = FakeRegistryReader::new()
            .with_manifest_list(&format!("gcr.io/staging/app@{}", OTHER), list_with(CHILD));
        let (r, logger, _) = reconciler(reader.clone());
        let r = r.with_max_candidates(Some(1));
        let verdict = r.reconcile(&index(&[PARENT, OTHER]), &event(CHILD));
        assert!(!verdict.is_verified());
        assert_eq!(reader.manifest_list_reads(), 1);
        assert!(logger
            .records()
            .iter()
            .any(|rec| rec.level == LogLevel::Warn && rec.message.contains("candidate limit")));
    }

    #[test]
    fn test_unknown_registry_and_malformed_reference() {
        let (r, _, _) = reconciler(FakeRegistryReader::new());
        let idx = index(&[PARENT]);

        let mut ev = event(PARENT);
        ev.digest = format!("eu.gcr.io/other/app@{}", PARENT);
        assert_eq!(r.reconcile(&idx, &ev).reason.code(), "unknown-registry");

        ev.digest = "us.gcr.io/prod/app@sha256:short".to_string();
        assert_eq!(r.reconcile(&idx, &ev).reason.code(), "malformed-reference");
    }

    #[test]
    fn test_tag_only_events() {
        let (r, _, _) = reconciler(FakeRegistryReader::new());
        let idx = index(&[PARENT]);
        let mut ev = AuditEvent {
            action: Action::Insert,
            digest: String::new(),
            tag: Some("us.gcr.io/prod/app:v1".to_string()),
        };
        let verdict = r.reconcile(&idx, &ev);
        assert!(verdict.is_verified());
        assert!(matches!(verdict.reason, MatchReason::Tag { ref digest, .. } if digest == PARENT));

        ev.tag = Some("us.gcr.io/prod/app:v2".to_string());
        assert_eq!(r.reconcile(&idx, &ev).reason.code(), "undeclared-tag");
    }

    #[test]
    fn test_audit_records_one_disposition() {
        let (r, logger, reporter) = reconciler(FakeRegistryReader::new());
        let idx = index(&[PARENT]);
        let ctx = EventContext::new("req-1");

        r.audit(&idx, &event(PARENT), &ctx);
        assert!(logger.info_buffer().contains("TRANSACTION VERIFIED: us.gcr.io/prod/app@"));
        assert!(reporter.reports().is_empty());

        r.audit(&idx, &event(CHILD), &ctx);
        assert_eq!(reporter.reports().len(), 1);
        assert_eq!(reporter.reports()[0].kind, "unverified");
    }
}
