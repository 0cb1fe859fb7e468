//!  Reference listing, resolution and mutation.
//!
//!  Git refs are pointers to commits (or tags, or other refs). This module
//!  handles:
//! - listing `HEAD` and everything under `refs/`
//! - resolving a ref down to the commit it ultimately names
//! - forced updates, deletes and renames of refs in the destination

use git2::{ObjectType, Reference, ReferenceType, Repository};

use crate::model::{RefEntry, RefKind};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::CommitId;

/// Manages Git references.
pub struct RefManager;

impl RefManager {
    /// Read a single ref without following it.
    pub fn find_ref(repo: &Repository, name: &str) -> StorageResult<Option<RefEntry>> {
        match repo.find_reference(name) {
            Ok(reference) => Self::to_entry(&reference),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(StorageError::Git(e)),
        }
    }

    /// List `HEAD` followed by every ref under `refs/`.
    pub fn list_refs(repo: &Repository) -> StorageResult<Vec<RefEntry>> {
        let mut refs = Vec::new();

        if let Some(head) = Self::find_ref(repo, RefKind::HEAD)? {
            refs.push(head);
        }

        for reference in repo.references()? {
            let reference = reference?;
            match Self::to_entry(&reference)? {
                Some(entry) => refs.push(entry),
                None => {
                    tracing::warn!(
                        name = %String::from_utf8_lossy(reference.name_bytes()),
                        "skipping ref with a non UTF-8 name"
                    );
                }
            }
        }

        Ok(refs)
    }

    fn to_entry(reference: &Reference<'_>) -> StorageResult<Option<RefEntry>> {
        let Some(name) = reference.name() else {
            return Ok(None);
        };

        let entry = match reference.kind() {
            Some(ReferenceType::Direct) => {
                let id = reference
                    .target()
                    .ok_or_else(|| StorageError::Internal(format!("direct ref {} has no target", name)))?;
                RefEntry::direct(name, id)
            }
            Some(ReferenceType::Symbolic) => {
                let Some(target) = reference.symbolic_target() else {
                    return Ok(None);
                };
                RefEntry::symbolic(name, target)
            }
            None => return Ok(None),
        };

        Ok(Some(entry))
    }

    /// Dereference a ref to the commit it names, unwrapping one level of
    /// annotated tag.
    ///
    /// Returns `None` for unborn refs (e.g. `HEAD` in an empty repository)
    /// and for refs that name something other than a commit.
    pub fn resolve_ref_target(repo: &Repository, name: &str) -> StorageResult<Option<CommitId>> {
        let reference = match repo.find_reference(name) {
            Ok(reference) => reference,
            Err(e) if e.code() == git2::ErrorCode::NotFound => {
                return Err(StorageError::RefNotFound(name.to_string()));
            }
            Err(e) => return Err(StorageError::Git(e)),
        };

        let resolved = match reference.resolve() {
            Ok(resolved) => resolved,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Git(e)),
        };

        let Some(id) = resolved.target() else {
            return Ok(None);
        };

        let object = repo.find_object(id, None)?;
        match object.kind() {
            Some(ObjectType::Commit) => Ok(Some(CommitId::new(id))),
            Some(ObjectType::Tag) => {
                let tag = object.peel_to_tag()?;
                match tag.target_type() {
                    Some(ObjectType::Commit) => Ok(Some(CommitId::new(tag.target_id()))),
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    /// Create or force-update a ref.
    pub fn update(repo: &Repository, entry: &RefEntry, log_message: &str) -> StorageResult<()> {
        match entry {
            RefEntry::Direct { name, id } => {
                repo.reference(name, *id, true, log_message)
                    .map_err(|e| StorageError::from_ref_update(name, e))?;
            }
            RefEntry::Symbolic { name, target } => {
                repo.reference_symbolic(name, target, true, log_message)
                    .map_err(|e| StorageError::from_ref_update(name, e))?;
            }
            RefEntry::Empty => {
                return Err(StorageError::Internal("cannot write the empty ref".to_string()));
            }
        }
        Ok(())
    }

    /// Delete a ref.
    pub fn delete(repo: &Repository, name: &str) -> StorageResult<()> {
        let mut reference = repo
            .find_reference(name)
            .map_err(|e| StorageError::from_ref_update(name, e))?;

        reference
            .delete()
            .map_err(|e| StorageError::from_ref_update(name, e))?;

        Ok(())
    }

    /// Rename a ref, replacing whatever `new_name` pointed at.
    pub fn rename(repo: &Repository, old_name: &str, new_name: &str, log_message: &str) -> StorageResult<()> {
        let mut reference = repo
            .find_reference(old_name)
            .map_err(|e| StorageError::from_ref_update(old_name, e))?;

        reference
            .rename(new_name, true, log_message)
            .map_err(|e| StorageError::from_ref_update(old_name, e))?;

        Ok(())
    }
}
