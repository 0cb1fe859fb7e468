//! Concurrent tree-cache warm-up.
//!
//! Tree rewriting only depends on tree content, so the root tree of every
//! commit in the walk can be rewritten in any order before commits are
//! rebuilt. The pre-pass does exactly that on a rayon pool, filling the
//! engine's (concurrent) entry cache; phase 1 then mostly hits the cache.
//!
//! Every rayon task gets its own [`StoreHandle`](crate::storage::StoreHandle),
//! opened on first use and dropped when the task's split of the work ends.

use std::collections::HashSet;
use std::sync::atomic::Ordering;

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::rewrite::engine::Engine;
use crate::rewrite::error::{RewriteError, RewriteResult};
use crate::storage::{StoreHandle, TreeId};

/// Rewrite the root tree of every commit in the walk, discarding results.
///
/// Returns the number of distinct root trees warmed.
pub(crate) fn warm_tree_cache(engine: &Engine, threads: Option<usize>) -> RewriteResult<usize> {
    if !engine.is_concurrent() {
        return Err(RewriteError::InvalidConfig(
            "the pre-pass needs a concurrent entry cache".to_string(),
        ));
    }

    let trees = engine.store().with_handle(|handle| {
        let (start, hide) = engine.walk_bounds(handle)?;
        let commits = handle.walk_commits(&start, &hide)?;

        let mut seen = HashSet::with_capacity(commits.len());
        let mut trees = Vec::with_capacity(commits.len());
        for commit in commits {
            let tree = handle.read_commit(commit)?.tree_id;
            if seen.insert(tree) {
                trees.push(tree);
            }
        }
        Ok::<_, RewriteError>(trees)
    })?;

    if trees.is_empty() {
        return Ok(0);
    }

    let pool = ThreadPoolBuilder::new()
        .num_threads(threads.unwrap_or(0))
        .thread_name(|index| format!("treeshift-prepass-{}", index))
        .build()?;

    tracing::info!(trees = trees.len(), threads = pool.current_num_threads(), "warming tree cache");

    pool.install(|| {
        trees.par_iter().try_for_each_init(
            || None::<StoreHandle<'_>>,
            |slot, tree: &TreeId| {
                let handle = match slot {
                    Some(handle) => handle,
                    None => slot.insert(engine.store().open_handle()?),
                };
                engine.rewrite_root_tree(handle, *tree)?;
                engine.stats().trees_warmed.fetch_add(1, Ordering::Relaxed);
                Ok::<_, RewriteError>(())
            },
        )
    })?;

    Ok(trees.len())
}
