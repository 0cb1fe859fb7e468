//! Summary of a finished rewrite.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::rewrite::error::{RewriteError, RewriteResult};

/// What a [`RewriteSession::run`](crate::rewrite::RewriteSession::run) did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewriteReport {
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub dry_run: bool,
    pub concurrent: bool,
    /// commits rebuilt in phase 1
    pub commits_rewritten: usize,
    /// refs created or moved
    pub refs_updated: usize,
    /// refs removed (dropped by the policy)
    pub refs_deleted: usize,
    /// refs whose rewrite was identical to the original
    pub refs_unchanged: usize,
    /// distinct entries run through the policy (cache misses)
    pub entries_computed: usize,
    pub entry_cache_hits: usize,
    /// distinct root trees rewritten by the pre-pass
    pub prepass_trees_warmed: usize,
    /// store handles opened over the whole session
    pub handles_opened: usize,
}

impl RewriteReport {
    pub(crate) fn new(started_at: DateTime<Utc>, dry_run: bool, concurrent: bool) -> Self {
        Self {
            started_at,
            elapsed_ms: 0,
            dry_run,
            concurrent,
            commits_rewritten: 0,
            refs_updated: 0,
            refs_deleted: 0,
            refs_unchanged: 0,
            entries_computed: 0,
            entry_cache_hits: 0,
            prepass_trees_warmed: 0,
            handles_opened: 0,
        }
    }

    /// Fraction of entry lookups answered from the cache.
    pub fn cache_hit_ratio(&self) -> f64 {
        let lookups = self.entries_computed + self.entry_cache_hits;
        if lookups == 0 {
            return 0.0;
        }
        self.entry_cache_hits as f64 / lookups as f64
    }

    pub fn to_json(&self) -> RewriteResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| RewriteError::InvalidConfig(e.to_string()))
    }
}

/// Ref counters for phase 2.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefUpdateSummary {
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
}
