//! tree reading and canonical tree writing.
//!
//! in Git, a tree is a directory listing: `(mode, name, id)` triples sorted by
//! name, where a directory sorts as if its name ended in `/`. Because the id
//! of a tree is the hash of that exact encoding, this module owns the sort
//! order and the byte layout instead of delegating to libgit2's tree builder:
//! the same bytes are then hashed in dry-run mode and written in a real run.

use std::cmp::Ordering;
use std::collections::HashMap;

use bstr::BString;
use git2::{ObjectType, Oid, Repository};
use serde::{Deserialize, Serialize};

use crate::model::{Entry, EntryMode};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::inserter::Inserter;
use crate::storage::types::TreeId;

/// What to do when two entries of one tree end up with the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// keep the entry that came later, log a warning
    #[default]
    LastWins,
    /// keep the entry that came first, log a warning
    FirstWins,
    /// abort with [`StorageError::DuplicateEntry`]
    Error,
}

/// List the direct children of a tree, tagged with the given path context.
pub fn list_children(repo: &Repository, tree_id: Oid, path: Option<&BString>) -> StorageResult<Vec<Entry>> {
    let tree = repo.find_tree(tree_id).map_err(|e| {
        if e.code() == git2::ErrorCode::NotFound {
            StorageError::ObjectNotFound(tree_id)
        } else {
            StorageError::Git(e)
        }
    })?;

    let mut children = Vec::with_capacity(tree.len());
    for entry in tree.iter() {
        let mode = EntryMode::from_raw(entry.filemode()).ok_or_else(|| StorageError::CorruptedData {
            path: format!("{}/{}", tree_id, String::from_utf8_lossy(entry.name_bytes())),
            reason: format!("unknown tree entry mode {:o}", entry.filemode()),
        })?;

        children.push(Entry::new(
            mode,
            BString::from(entry.name_bytes()),
            entry.id(),
            path.cloned(),
        ));
    }

    Ok(children)
}

/// git's tree ordering: byte-wise by name, directories compared as if
/// suffixed with `/`
pub fn canonical_cmp(a: &Entry, b: &Entry) -> Ordering {
    let (an, bn) = (a.name.as_slice(), b.name.as_slice());
    let common = an.len().min(bn.len());

    match an[..common].cmp(&bn[..common]) {
        Ordering::Equal => {}
        other => return other,
    }

    let next = |name: &[u8], entry: &Entry| name.get(common).copied().or(entry.mode.is_tree().then_some(b'/'));
    next(an, a).cmp(&next(bn, b))
}

/// Resolve duplicate names and sort into canonical order.
pub fn canonicalize(entries: Vec<Entry>, collision: CollisionPolicy) -> StorageResult<Vec<Entry>> {
    let mut seen: HashMap<BString, usize> = HashMap::with_capacity(entries.len());
    let mut out: Vec<Entry> = Vec::with_capacity(entries.len());

    for entry in entries {
        let Some(&index) = seen.get(&entry.name) else {
            seen.insert(entry.name.clone(), out.len());
            out.push(entry);
            continue;
        };

        let directory = entry.path.clone().unwrap_or_default();
        match collision {
            CollisionPolicy::LastWins => {
                tracing::warn!(name = %entry.name, dir = %directory, "duplicate tree entry, keeping the later one");
                out[index] = entry;
            }
            CollisionPolicy::FirstWins => {
                tracing::warn!(name = %entry.name, dir = %directory, "duplicate tree entry, keeping the earlier one");
            }
            CollisionPolicy::Error => {
                return Err(StorageError::DuplicateEntry {
                    path: directory,
                    name: entry.name,
                });
            }
        }
    }

    out.sort_by(canonical_cmp);
    Ok(out)
}

/// Encode already-canonical entries as tree object content.
pub fn encode_tree(entries: &[Entry]) -> Vec<u8> {
    let mut out = Vec::with_capacity(entries.len() * 40);
    for entry in entries {
        out.extend_from_slice(entry.mode.as_octal().as_bytes());
        out.push(b' ');
        out.extend_from_slice(&entry.name);
        out.push(0);
        out.extend_from_slice(entry.id.as_bytes());
    }
    out
}

/// Sort, deduplicate and write a tree object.
pub fn write_tree(inserter: &Inserter<'_>, entries: Vec<Entry>, collision: CollisionPolicy) -> StorageResult<TreeId> {
    let entries = canonicalize(entries, collision)?;
    let id = inserter.insert(ObjectType::Tree, &encode_tree(&entries))?;
    Ok(TreeId::new(id))
}
