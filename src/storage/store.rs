//!   Source/destination object store access.
//!
//!  [`ObjectStore`] describes a rewrite's two stores (which may be the same
//!  repository) and hands out [`StoreHandle`]s. A handle owns its own
//!  `git2::Repository` objects, which libgit2 does not allow to be driven from
//!  several threads at once, so every thread or task opens its own handle and
//!  nothing but the `ObjectStore` itself is shared.
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!                 │         ObjectStore          │
//!                 │ (paths, dry-run, collisions) │
//!                 └──────────────────────────────┘
//!                     │ open_handle / with_handle
//!          ┌──────────┼──────────┐
//!          ▼          ▼          ▼
//!    StoreHandle  StoreHandle  StoreHandle     (one per thread/task)
//!          │
//!          ├── source: Repository       reads
//!          └── destination: Repository  writes via Inserter
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use bstr::BString;
use git2::{ObjectType, Oid, Repository};

use crate::model::{Entry, RefEntry};
use crate::storage::commit::{self, CommitBuilder, CommitInfo, Peeled, TagBuilder, TagInfo};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::inserter::Inserter;
use crate::storage::refs::RefManager;
use crate::storage::tree::{self, CollisionPolicy};
use crate::storage::types::{CommitId, TagId, TreeId};
use crate::storage::walk;

/// The pair of stores a rewrite reads from and writes to.
#[derive(Debug)]
pub struct ObjectStore {
    source: PathBuf,
    /// `None` when rewriting in place
    destination: Option<PathBuf>,
    dry_run: bool,
    collision: CollisionPolicy,
    reflog_message: String,
    handles_opened: AtomicUsize,
    handles_live: AtomicUsize,
}

impl ObjectStore {
    /// Open a store that rewrites the repository at `source` in place.
    pub fn open(source: impl AsRef<Path>) -> StorageResult<Self> {
        let source = source.as_ref();
        Repository::open(source).map_err(|_| StorageError::NotInitialized(source.to_path_buf()))?;

        Ok(Self {
            source: source.to_path_buf(),
            destination: None,
            dry_run: false,
            collision: CollisionPolicy::default(),
            reflog_message: "treeshift: rewrite".to_string(),
            handles_opened: AtomicUsize::new(0),
            handles_live: AtomicUsize::new(0),
        })
    }

    /// Write into a separate, already initialised repository.
    pub fn export_to(mut self, destination: impl AsRef<Path>) -> StorageResult<Self> {
        let destination = destination.as_ref();
        let dst = Repository::open(destination).map_err(|_| StorageError::NotInitialized(destination.to_path_buf()))?;
        let src = Repository::open(&self.source)?;

        // both paths may name the same repository
        self.destination = if dst.path() == src.path() {
            None
        } else {
            Some(destination.to_path_buf())
        };
        Ok(self)
    }

    /// Compute ids without persisting objects or ref changes.
    pub fn dry_run(mut self, value: bool) -> Self {
        self.dry_run = value;
        self
    }

    pub fn collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision = policy;
        self
    }

    pub fn reflog_message(mut self, message: impl Into<String>) -> Self {
        self.reflog_message = message.into();
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn is_in_place(&self) -> bool {
        self.destination.is_none()
    }

    pub fn source_path(&self) -> &Path {
        &self.source
    }

    /// number of handles opened so far over the life of this store
    pub fn handles_opened(&self) -> usize {
        self.handles_opened.load(Ordering::Relaxed)
    }

    /// number of handles currently open
    pub fn handles_live(&self) -> usize {
        self.handles_live.load(Ordering::Relaxed)
    }

    /// Open a fresh handle owned by the caller. It is released on drop.
    pub fn open_handle(&self) -> StorageResult<StoreHandle<'_>> {
        let source = Repository::open(&self.source)?;
        let destination = match &self.destination {
            Some(path) => Some(Repository::open(path)?),
            None => None,
        };

        let serial = self.handles_opened.fetch_add(1, Ordering::Relaxed);
        self.handles_live.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(handle = serial, "opened store handle");

        Ok(StoreHandle {
            store: self,
            source,
            destination,
            serial,
        })
    }

    /// Run `f` with a handle that is released however `f` returns.
    pub fn with_handle<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&StoreHandle<'_>) -> Result<T, E>,
        E: From<StorageError>,
    {
        let handle = self.open_handle()?;
        f(&handle)
    }
}

/// One thread's access to the source and destination stores.
pub struct StoreHandle<'s> {
    store: &'s ObjectStore,
    source: Repository,
    destination: Option<Repository>,
    serial: usize,
}

impl<'s> StoreHandle<'s> {
    pub fn store(&self) -> &'s ObjectStore {
        self.store
    }

    pub fn is_dry_run(&self) -> bool {
        self.store.dry_run
    }

    pub fn is_in_place(&self) -> bool {
        self.destination.is_none()
    }

    /// the repository objects are read from
    pub fn source(&self) -> &Repository {
        &self.source
    }

    /// the repository objects and refs are written to
    pub fn destination(&self) -> &Repository {
        self.destination.as_ref().unwrap_or(&self.source)
    }

    /// Run `f` with an insertion handle on the destination. The handle is
    /// released on every exit path; in dry-run mode it only hashes.
    pub fn with_inserter<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Inserter<'_>) -> Result<T, E>,
        E: From<StorageError>,
    {
        let inserter = if self.store.dry_run {
            Inserter::dry_run()
        } else {
            Inserter::writing(self.destination().odb().map_err(StorageError::from)?)
        };
        f(&inserter)
    }

    // ==================== Objects ====================

    /// List the direct children of a tree, tagged with `path`.
    pub fn list_children(&self, tree_id: Oid, path: Option<&BString>) -> StorageResult<Vec<Entry>> {
        tree::list_children(&self.source, tree_id, path)
    }

    /// Canonically sort `entries` and write them as a tree.
    pub fn write_tree(&self, entries: Vec<Entry>) -> StorageResult<TreeId> {
        let collision = self.store.collision;
        self.with_inserter(|ins| tree::write_tree(ins, entries, collision))
    }

    pub fn read_blob(&self, id: Oid) -> StorageResult<Vec<u8>> {
        let blob = self.source.find_blob(id).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                StorageError::ObjectNotFound(id)
            } else {
                StorageError::Git(e)
            }
        })?;
        Ok(blob.content().to_vec())
    }

    pub fn write_blob(&self, content: &[u8]) -> StorageResult<Oid> {
        self.with_inserter(|ins| ins.insert(ObjectType::Blob, content))
    }

    /// Make sure an unchanged source object also exists in the destination.
    ///
    /// A no-op when rewriting in place or in dry-run mode.
    pub fn ensure_in_destination(&self, id: Oid) -> StorageResult<()> {
        if self.is_in_place() || self.is_dry_run() {
            return Ok(());
        }

        self.with_inserter(|ins| {
            if ins.contains(id) {
                return Ok(());
            }
            let odb = self.source.odb()?;
            let object = odb.read(id).map_err(|_| StorageError::ObjectNotFound(id))?;
            let copied = ins.insert(object.kind(), object.data())?;
            if copied != id {
                return Err(StorageError::CorruptedData {
                    path: id.to_string(),
                    reason: format!("object re-hashed to {}", copied),
                });
            }
            Ok(())
        })
    }

    /// Like [`ensure_in_destination`](Self::ensure_in_destination), but also
    /// copies everything reachable from `id`: a commit's ancestors with their
    /// trees and blobs, a tree's contents, a tag's target.
    ///
    /// Children are always written before the object naming them, so an
    /// object already present in the destination is taken to be complete.
    pub fn ensure_closure_in_destination(&self, id: Oid) -> StorageResult<()> {
        if self.is_in_place() || self.is_dry_run() || self.destination_has(id)? {
            return Ok(());
        }

        let object = self
            .source
            .find_object(id, None)
            .map_err(|_| StorageError::ObjectNotFound(id))?;
        match object.kind() {
            Some(ObjectType::Commit) => {
                let history = walk::walk_commits(&self.source, &[CommitId::new(id)], &[])?;
                tracing::debug!(%id, commits = history.len(), "copying history into destination");
                for commit in history {
                    if self.destination_has(commit.raw())? {
                        continue;
                    }
                    let tree = self.source.find_commit(commit.raw())?.tree_id();
                    self.copy_tree(tree)?;
                    self.ensure_in_destination(commit.raw())?;
                }
                Ok(())
            }
            Some(ObjectType::Tree) => self.copy_tree(id),
            Some(ObjectType::Tag) => {
                let target = self.source.find_tag(id)?.target_id();
                self.ensure_closure_in_destination(target)?;
                self.ensure_in_destination(id)
            }
            _ => self.ensure_in_destination(id),
        }
    }

    fn copy_tree(&self, id: Oid) -> StorageResult<()> {
        if self.destination_has(id)? {
            return Ok(());
        }
        let tree = self.source.find_tree(id)?;
        for child in tree.iter() {
            match child.kind() {
                Some(ObjectType::Tree) => self.copy_tree(child.id())?,
                Some(ObjectType::Blob) => self.ensure_in_destination(child.id())?,
                // gitlinks name commits of another repository
                _ => {}
            }
        }
        self.ensure_in_destination(id)
    }

    fn destination_has(&self, id: Oid) -> StorageResult<bool> {
        self.with_inserter(|ins| Ok(ins.contains(id)))
    }

    pub fn read_commit(&self, id: CommitId) -> StorageResult<CommitInfo> {
        commit::read_commit(&self.source, id)
    }

    pub fn write_commit(&self, builder: &CommitBuilder) -> StorageResult<CommitId> {
        self.with_inserter(|ins| builder.write(ins))
    }

    pub fn read_tag(&self, id: TagId) -> StorageResult<TagInfo> {
        commit::read_tag(&self.source, id)
    }

    pub fn write_tag(&self, builder: &TagBuilder) -> StorageResult<TagId> {
        self.with_inserter(|ins| builder.write(ins))
    }

    /// Unwrap one level of annotated tag.
    pub fn peel(&self, id: Oid) -> StorageResult<Peeled> {
        commit::peel(&self.source, id)
    }

    /// Every commit reachable from `start` and not from `hide`, ancestors first.
    pub fn walk_commits(&self, start: &[CommitId], hide: &[CommitId]) -> StorageResult<Vec<CommitId>> {
        walk::walk_commits(&self.source, start, hide)
    }

    // ==================== Refs ====================

    pub fn list_refs(&self) -> StorageResult<Vec<RefEntry>> {
        RefManager::list_refs(&self.source)
    }

    pub fn find_ref(&self, name: &str) -> StorageResult<Option<RefEntry>> {
        RefManager::find_ref(&self.source, name)
    }

    pub fn resolve_ref_target(&self, name: &str) -> StorageResult<Option<CommitId>> {
        RefManager::resolve_ref_target(&self.source, name)
    }

    pub fn apply_ref_update(&self, entry: &RefEntry) -> StorageResult<()> {
        if self.is_dry_run() {
            tracing::debug!(%entry, "dry run: skipping ref update");
            return Ok(());
        }
        RefManager::update(self.destination(), entry, &self.store.reflog_message)
    }

    pub fn apply_ref_delete(&self, name: &str) -> StorageResult<()> {
        if self.is_dry_run() {
            tracing::debug!(name, "dry run: skipping ref delete");
            return Ok(());
        }
        RefManager::delete(self.destination(), name)
    }

    pub fn apply_ref_rename(&self, old_name: &str, new_name: &str) -> StorageResult<()> {
        if self.is_dry_run() {
            tracing::debug!(old_name, new_name, "dry run: skipping ref rename");
            return Ok(());
        }
        RefManager::rename(self.destination(), old_name, new_name, &self.store.reflog_message)
    }
}

impl Drop for StoreHandle<'_> {
    fn drop(&mut self) {
        self.store.handles_live.fetch_sub(1, Ordering::Relaxed);
        tracing::trace!(handle = self.serial, "closed store handle");
    }
}
