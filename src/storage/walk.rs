//! commit graph traversal.
//!
//! The walk visits every commit reachable from the start set but not from
//! the hidden set, parents strictly before children.

use git2::{Repository, Sort};

use crate::storage::error::StorageResult;
use crate::storage::types::CommitId;

/// Walk the commit graph in dependency order (ancestors first).
pub fn walk_commits(repo: &Repository, start: &[CommitId], hide: &[CommitId]) -> StorageResult<Vec<CommitId>> {
    if start.is_empty() {
        return Ok(Vec::new());
    }

    let mut revwalk = repo.revwalk()?;
    revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;
    for id in start {
        revwalk.push(id.raw())?;
    }
    for id in hide {
        revwalk.hide(id.raw())?;
    }

    let mut order = Vec::new();
    for oid in revwalk {
        order.push(CommitId::new(oid?));
    }
    Ok(order)
}
