//! Scoped write access to the destination object database.
//!
//! An [`Inserter`] is only ever obtained through
//! [`StoreHandle::with_inserter`](crate::storage::StoreHandle::with_inserter),
//! which releases it on every exit path. In dry-run mode the inserter never
//! touches the database: object ids are pure hashes of the encoded bytes, so
//! hashing alone yields the id a real write would return.

use git2::{ObjectType, Odb, Oid};

use crate::storage::error::StorageResult;

/// A write handle on the destination object database.
pub struct Inserter<'repo> {
    /// `None` in dry-run mode
    odb: Option<Odb<'repo>>,
}

impl<'repo> Inserter<'repo> {
    pub(crate) fn writing(odb: Odb<'repo>) -> Self {
        Self { odb: Some(odb) }
    }

    pub(crate) fn dry_run() -> Self {
        Self { odb: None }
    }

    pub fn is_dry_run(&self) -> bool {
        self.odb.is_none()
    }

    /// Store `data` as an object of type `kind` and return its id.
    pub fn insert(&self, kind: ObjectType, data: &[u8]) -> StorageResult<Oid> {
        match &self.odb {
            Some(odb) => Ok(odb.write(kind, data)?),
            None => Ok(Oid::hash_object(kind, data)?),
        }
    }

    /// Whether the destination already holds `id`. Always false in dry-run.
    pub fn contains(&self, id: Oid) -> bool {
        self.odb.as_ref().is_some_and(|odb| odb.exists(id))
    }
}
