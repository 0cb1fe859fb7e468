//! What a policy hook can reach while rewriting an entry.

use git2::Oid;

use crate::model::{Entry, EntrySet};
use crate::rewrite::engine::Engine;
use crate::rewrite::error::RewriteResult;
use crate::storage::{StoreHandle, TreeId};

/// Store access and engine callbacks for entry-level policy hooks.
///
/// A context is bound to the handle of the thread running the hook; it must
/// not be smuggled to another thread (and cannot be, since handles are not
/// `Sync`).
pub struct EntryContext<'a> {
    engine: &'a Engine,
    handle: &'a StoreHandle<'a>,
}

impl<'a> EntryContext<'a> {
    pub(crate) fn new(engine: &'a Engine, handle: &'a StoreHandle<'a>) -> Self {
        Self { engine, handle }
    }

    pub fn handle(&self) -> &'a StoreHandle<'a> {
        self.handle
    }

    /// Whether entries carry their directory path.
    pub fn path_context(&self) -> bool {
        self.engine.path_context()
    }

    /// The engine's default rewrite of `entry`, bypassing the policy's own
    /// `rewrite_entry` for this entry only.
    pub fn rewrite_default(&self, entry: &Entry) -> RewriteResult<EntrySet> {
        self.engine.rewrite_default(self.handle, entry)
    }

    /// The memoized rewrite of some other entry.
    pub fn get_entry(&self, entry: &Entry) -> RewriteResult<EntrySet> {
        self.engine.get_entry(self.handle, entry)
    }

    /// Rewrite a tree's children and write the result; `None` when every
    /// child was dropped.
    pub fn rewrite_tree(&self, entry: &Entry) -> RewriteResult<Option<TreeId>> {
        self.engine.rewrite_tree(self.handle, entry)
    }

    pub fn read_blob(&self, id: Oid) -> RewriteResult<Vec<u8>> {
        Ok(self.handle.read_blob(id)?)
    }

    /// Store new blob content in the destination (only hashed in dry-run).
    pub fn write_blob(&self, content: &[u8]) -> RewriteResult<Oid> {
        Ok(self.handle.write_blob(content)?)
    }

    /// Keep a source blob as-is, copying it when exporting.
    pub fn keep(&self, entry: &Entry) -> RewriteResult<EntrySet> {
        self.handle.ensure_in_destination(entry.id)?;
        Ok(EntrySet::One(entry.clone()))
    }
}
