//! Per-event search state.

use std::collections::HashSet;

use super::verdict::SearchStats;

/// State of one child search: which parent digests have been looked at,
/// how many remote reads were spent, and when to stop.
#[derive(Debug)]
pub struct ReconciliationContext {
    target_registry: String,
    visited: HashSet<String>,
    order: Vec<String>,
    budget: usize,
    stats: SearchStats,
}

impl ReconciliationContext {
    /// `budget` caps the number of manifest-list reads.
    pub fn new(target_registry: impl Into<String>, budget: usize) -> Self {
        Self {
            target_registry: target_registry.into(),
            visited: HashSet::new(),
            order: Vec::new(),
            budget,
            stats: SearchStats::default(),
        }
    }

    pub fn target_registry(&self) -> &str {
        &self.target_registry
    }

    /// Mark a digest as visited. Returns false if it already was.
    pub fn visit(&mut self, digest: &str) -> bool {
        if !self.visited.insert(digest.to_string()) {
            return false;
        }
        self.order.push(digest.to_string());
        true
    }

    pub fn is_visited(&self, digest: &str) -> bool {
        self.visited.contains(digest)
    }

    /// Digests in the order they were visited.
    pub fn visit_order(&self) -> &[String] {
        &self.order
    }

    pub fn exhausted(&self) -> bool {
        self.stats.probed >= self.budget
    }

    pub fn record_probe(&mut self) {
        self.stats.probed += 1;
    }

    pub fn record_failure(&mut self) {
        self.stats.failed += 1;
    }

    pub fn record_skip(&mut self) {
        self.stats.skipped += 1;
    }

    pub fn stats(&self) -> SearchStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visit_dedupes_and_keeps_order() {
        let mut ctx = ReconciliationContext::new("us.gcr.io/prod", 10);
        assert!(ctx.visit("sha256:b"));
        assert!(ctx.visit("sha256:a"));
        assert!(!ctx.visit("sha256:b"));
        assert!(ctx.is_visited("sha256:a"));
        assert_eq!(ctx.visit_order(), &["sha256:b".to_string(), "sha256:a".to_string()]);
        assert_eq!(ctx.target_registry(), "us.gcr.io/prod");
    }

    #[test]
    fn test_budget() {
        let mut ctx = ReconciliationContext::new("r", 2);
        assert!(!ctx.exhausted());
        ctx.record_probe();
        ctx.record_probe();
        assert!(ctx.exhausted());
        ctx.record_failure();
        ctx.record_skip();
        assert_eq!(
            ctx.stats(),
            SearchStats {
                probed: 2,
                failed: 1,
                skipped: 1
            }
        );
    }
}
