//! Rewrite sessions: the two sequential phases and the entry point.
//!
//! ```text
//!   run()
//!    ├── pre-pass (concurrent only)   warm the entry cache on a thread pool
//!    ├── phase 1: rewrite_commits     walk ancestors first, rebuild commits
//!    └── phase 2: update_refs         rewrite HEAD, branches and tags
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::Ordering;
use std::time::Instant;

use chrono::Utc;

use crate::model::{Entry, EntrySet, RefEntry, RefKind};
use crate::rewrite::config::RewriteConfig;
use crate::rewrite::engine::Engine;
use crate::rewrite::error::{RewriteError, RewriteResult};
use crate::rewrite::policy::RewritePolicy;
use crate::rewrite::prepass;
use crate::rewrite::report::{RefUpdateSummary, RewriteReport};
use crate::storage::{CommitId, StoreHandle, TreeId};

/// One rewrite of one repository.
///
/// All caches live and die with the session.
pub struct RewriteSession {
    config: RewriteConfig,
    engine: Engine,
}

impl RewriteSession {
    /// Create a session bound to the stores `config` names.
    pub fn new(config: RewriteConfig, policy: impl RewritePolicy + 'static) -> RewriteResult<Self> {
        Self::with_policy(config, Box::new(policy))
    }

    /// Create a session with an already boxed policy.
    pub fn with_policy(config: RewriteConfig, policy: Box<dyn RewritePolicy>) -> RewriteResult<Self> {
        config.validate()?;
        let store = config.open_store()?;
        let engine = Engine::new(store, policy, config.path_context, config.concurrent);
        Ok(Self { config, engine })
    }

    pub fn config(&self) -> &RewriteConfig {
        &self.config
    }

    /// Run the whole rewrite.
    pub fn run(&self) -> RewriteResult<RewriteReport> {
        let clock = Instant::now();
        let mut report = RewriteReport::new(Utc::now(), self.config.dry_run, self.config.concurrent);

        tracing::info!(
            source = %self.config.source.display(),
            in_place = self.engine.store().is_in_place(),
            dry_run = self.config.dry_run,
            concurrent = self.config.concurrent,
            "starting rewrite"
        );

        if self.config.concurrent {
            report.prepass_trees_warmed = prepass::warm_tree_cache(&self.engine, self.config.threads)?;
        }

        report.commits_rewritten = self.rewrite_commits()?;

        let refs = self.update_refs()?;
        report.refs_updated = refs.updated;
        report.refs_deleted = refs.deleted;
        report.refs_unchanged = refs.unchanged;

        let stats = self.engine.stats();
        report.entries_computed = stats.entries_computed.load(Ordering::Relaxed);
        report.entry_cache_hits = stats.entry_cache_hits.load(Ordering::Relaxed);
        report.handles_opened = self.engine.store().handles_opened();
        report.elapsed_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);

        tracing::info!(
            commits = report.commits_rewritten,
            refs_updated = report.refs_updated,
            refs_deleted = report.refs_deleted,
            elapsed_ms = report.elapsed_ms,
            "rewrite finished"
        );

        Ok(report)
    }

    // ==================== Phase 1 ====================

    /// Rebuild every commit reachable from the start refs, ancestors first.
    ///
    /// Returns the number of commits visited.
    pub fn rewrite_commits(&self) -> RewriteResult<usize> {
        self.engine.store().with_handle(|handle| {
            let (start, hide) = self.engine.walk_bounds(handle)?;
            let order = handle.walk_commits(&start, &hide)?;
            let walked: HashSet<CommitId> = order.iter().copied().collect();

            tracing::info!(commits = order.len(), start = start.len(), hidden = hide.len(), "phase 1: rewriting commits");

            for commit in &order {
                self.engine.rewrite_commit(handle, *commit, &walked)?;
            }
            Ok(order.len())
        })
    }

    // ==================== Phase 2 ====================

    /// Rewrite every start ref and apply the changes to the destination.
    ///
    /// All rewritten refs are computed before any is changed, so symbolic
    /// refs see their targets as they were before the run. In place, every
    /// stale name is removed before any new ref is written, so one rename can
    /// never delete the result of another.
    pub fn update_refs(&self) -> RewriteResult<RefUpdateSummary> {
        self.engine.store().with_handle(|handle| {
            let mut plan = Vec::new();
            for old in handle.list_refs()? {
                let Some(name) = old.name() else { continue };
                if !self.engine.policy().is_start_ref(name) {
                    tracing::debug!(name, "ref left alone");
                    continue;
                }
                let new = self.engine.get_ref(handle, &old)?;
                plan.push((old, new));
            }

            check_plan(&plan)?;
            tracing::info!(refs = plan.len(), "phase 2: updating refs");

            let mut summary = RefUpdateSummary::default();
            if handle.is_in_place() {
                apply_in_place(handle, &plan, &mut summary)?;
            } else {
                apply_export(handle, &plan, &mut summary)?;
            }
            Ok(summary)
        })
    }

    // ==================== Inspection ====================

    /// The rewritten id of `original`, once phase 1 has reached it.
    pub fn mapped_commit(&self, original: CommitId) -> Option<CommitId> {
        self.engine.mapped_commit(original)
    }

    /// A snapshot of the whole old-to-new commit mapping.
    pub fn commit_mapping(&self) -> HashMap<CommitId, CommitId> {
        self.engine.commit_mapping()
    }

    /// Rewrite a single root tree outside of any commit.
    pub fn rewrite_root_tree(&self, tree_id: TreeId) -> RewriteResult<TreeId> {
        self.engine
            .store()
            .with_handle(|handle| self.engine.rewrite_root_tree(handle, tree_id))
    }

    /// The memoized rewrite of one entry.
    pub fn get_entry(&self, entry: &Entry) -> RewriteResult<EntrySet> {
        self.engine
            .store()
            .with_handle(|handle| self.engine.get_entry(handle, entry))
    }

    /// Number of distinct entries run through the policy so far.
    pub fn entries_computed(&self) -> usize {
        self.engine.stats().entries_computed.load(Ordering::Relaxed)
    }
}

/// Two start refs must not be rewritten to the same name.
fn check_plan(plan: &[(RefEntry, RefEntry)]) -> RewriteResult<()> {
    let mut claimed: HashMap<&str, &str> = HashMap::new();
    for (old, new) in plan {
        let (Some(old_name), Some(new_name)) = (old.name(), new.name()) else {
            continue;
        };
        if let Some(first) = claimed.insert(new_name, old_name) {
            return Err(RewriteError::policy(format!(
                "refs {} and {} would both be rewritten to {}",
                first, old_name, new_name
            )));
        }
    }
    Ok(())
}

fn apply_export(handle: &StoreHandle<'_>, plan: &[(RefEntry, RefEntry)], summary: &mut RefUpdateSummary) -> RewriteResult<()> {
    for (old, new) in plan {
        if new.is_empty() {
            tracing::debug!(%old, "ref dropped from export");
            summary.deleted += 1;
        } else {
            tracing::debug!(%new, "exporting ref");
            handle.apply_ref_update(new)?;
            summary.updated += 1;
        }
    }
    Ok(())
}

/// Apply the plan to the source repository itself.
///
/// The first pass deletes or renames every old name no rewritten ref reuses;
/// the second writes the remaining rewritten refs.
fn apply_in_place(handle: &StoreHandle<'_>, plan: &[(RefEntry, RefEntry)], summary: &mut RefUpdateSummary) -> RewriteResult<()> {
    let new_names: HashSet<&str> = plan.iter().filter_map(|(_, new)| new.name()).collect();
    let old_names: HashSet<&str> = plan.iter().filter_map(|(old, _)| old.name()).collect();
    let mut written = vec![false; plan.len()];

    for (index, (old, new)) in plan.iter().enumerate() {
        let Some(old_name) = old.name() else { continue };
        if new == old || new_names.contains(old_name) {
            continue;
        }

        match new.name() {
            None if old_name == RefKind::HEAD => {
                tracing::warn!(%old, "HEAD would be removed, leaving it in place");
                summary.unchanged += 1;
            }
            None => {
                tracing::debug!(name = old_name, "deleting ref");
                handle.apply_ref_delete(old_name)?;
                summary.deleted += 1;
            }
            Some(new_name) if new.same_target(old) && !old_names.contains(new_name) => {
                tracing::debug!(old_name, new_name, "renaming ref");
                handle.apply_ref_rename(old_name, new_name)?;
                summary.updated += 1;
                written[index] = true;
            }
            Some(_) => {
                tracing::debug!(name = old_name, "removing stale ref");
                handle.apply_ref_delete(old_name)?;
            }
        }
    }

    for (index, (old, new)) in plan.iter().enumerate() {
        if written[index] || new.is_empty() {
            continue;
        }
        if new == old {
            tracing::debug!(%old, "ref unchanged");
            summary.unchanged += 1;
            continue;
        }
        tracing::debug!(%old, %new, "writing ref");
        handle.apply_ref_update(new)?;
        summary.updated += 1;
    }
    Ok(())
}

impl std::fmt::Debug for RewriteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewriteSession")
            .field("config", &self.config)
            .field("commits_rewritten", &self.engine.commits_rewritten())
            .finish()
    }
}
