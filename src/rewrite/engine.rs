//! Rewrite state shared by the pre-pass and both sequential phases.
//!
//! The [`Engine`] owns the object store, the policy and the three caches of
//! a session:
//!
//! ```text
//!   entries   Entry     -> EntrySet   plain, or concurrent with the pre-pass
//!   refs      RefEntry  -> RefEntry   always plain (phase 2 is sequential)
//!   commits   CommitId  -> CommitId   filled in ancestor-first order
//! ```
//!
//! Every method takes the caller's [`StoreHandle`] explicitly; the engine
//! itself holds no repository and can be shared by reference across threads.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use bstr::{BString, ByteSlice};
use parking_lot::Mutex;

use crate::model::{Entry, EntryMode, EntrySet, RefEntry, RefKind};
use crate::rewrite::context::EntryContext;
use crate::rewrite::error::{RewriteError, RewriteResult};
use crate::rewrite::memo::Memo;
use crate::rewrite::policy::RewritePolicy;
use crate::storage::{CommitBuilder, CommitId, ObjectStore, Peeled, StoreHandle, TagBuilder, TagId, TagInfo, TreeId};

/// Symbolic refs nesting deeper than this are rejected, as git does.
const MAX_SYMREF_DEPTH: usize = 5;

#[derive(Debug, Default)]
pub(crate) struct EngineStats {
    pub entries_computed: AtomicUsize,
    pub entry_cache_hits: AtomicUsize,
    pub trees_warmed: AtomicUsize,
}

pub(crate) struct Engine {
    store: ObjectStore,
    policy: Box<dyn RewritePolicy>,
    path_context: bool,
    entries: Memo<Entry, EntrySet>,
    refs: Memo<RefEntry, RefEntry>,
    commits: Mutex<HashMap<CommitId, CommitId>>,
    stats: EngineStats,
}

impl Engine {
    pub fn new(store: ObjectStore, policy: Box<dyn RewritePolicy>, path_context: bool, concurrent: bool) -> Self {
        Self {
            store,
            policy,
            path_context,
            entries: if concurrent { Memo::concurrent() } else { Memo::plain() },
            refs: Memo::plain(),
            commits: Mutex::new(HashMap::new()),
            stats: EngineStats::default(),
        }
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    pub fn policy(&self) -> &dyn RewritePolicy {
        self.policy.as_ref()
    }

    pub fn path_context(&self) -> bool {
        self.path_context
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn is_concurrent(&self) -> bool {
        self.entries.is_concurrent()
    }

    // ==================== Walk ====================

    /// The walk's start set (every start ref resolved to a commit) and the
    /// commits it must not cross.
    pub fn walk_bounds(&self, handle: &StoreHandle<'_>) -> RewriteResult<(Vec<CommitId>, Vec<CommitId>)> {
        let mut start = Vec::new();
        let mut seen = HashSet::new();

        for reference in handle.list_refs()? {
            let Some(name) = reference.name() else { continue };
            if !self.policy.is_start_ref(name) {
                continue;
            }
            match handle.resolve_ref_target(name)? {
                Some(commit) => {
                    if seen.insert(commit) {
                        start.push(commit);
                    }
                }
                None if matches!(reference, RefEntry::Symbolic { .. }) => {
                    tracing::debug!(name, "unborn ref, not walked")
                }
                None => tracing::warn!(name, "ref does not resolve to a commit, not walked"),
            }
        }

        let hide = self.policy.uninteresting(handle)?;
        Ok((start, hide))
    }

    // ==================== Trees ====================

    /// The memoized rewrite of `entry`.
    pub fn get_entry(&self, handle: &StoreHandle<'_>, entry: &Entry) -> RewriteResult<EntrySet> {
        let lookup = self.entries.get_or_try_insert_with(entry, || {
            let cx = EntryContext::new(self, handle);
            self.policy.rewrite_entry(&cx, entry)
        })?;

        let counter = if lookup.computed {
            &self.stats.entries_computed
        } else {
            &self.stats.entry_cache_hits
        };
        counter.fetch_add(1, Ordering::Relaxed);

        Ok(lookup.value)
    }

    /// What an entry becomes when the policy does not intervene.
    pub fn rewrite_default(&self, handle: &StoreHandle<'_>, entry: &Entry) -> RewriteResult<EntrySet> {
        match entry.mode {
            EntryMode::Tree => {
                let Some(tree) = self.rewrite_tree(handle, entry)? else {
                    return Ok(EntrySet::Empty);
                };
                let name = if entry.is_root() {
                    entry.name.clone()
                } else {
                    self.policy.rewrite_name(entry)?
                };
                Ok(Entry::new(EntryMode::Tree, name, tree.raw(), entry.path.clone()).into())
            }
            EntryMode::Commit => {
                // a gitlink names a commit in another repository, nothing to copy
                let name = self.policy.rewrite_name(entry)?;
                Ok(entry.renamed(name).into())
            }
            EntryMode::Blob | EntryMode::BlobExecutable | EntryMode::Link => {
                let cx = EntryContext::new(self, handle);
                let id = self.policy.rewrite_blob(&cx, entry)?;
                if id == entry.id {
                    handle.ensure_in_destination(id)?;
                }
                let name = self.policy.rewrite_name(entry)?;
                Ok(Entry::new(entry.mode, name, id, entry.path.clone()).into())
            }
        }
    }

    /// Rewrite every child of the tree `entry` names and write the result.
    ///
    /// Returns `None` (the tombstone) when no child survives, so the parent
    /// leaves the subtree out instead of storing an empty tree.
    pub fn rewrite_tree(&self, handle: &StoreHandle<'_>, entry: &Entry) -> RewriteResult<Option<TreeId>> {
        let child_path = entry.child_path();
        let children = handle.list_children(entry.id, child_path.as_ref())?;

        let mut rewritten = Vec::with_capacity(children.len());
        for child in &children {
            self.get_entry(handle, child)?.flatten_into(&mut rewritten);
        }

        if rewritten.is_empty() {
            return Ok(None);
        }
        for child in &rewritten {
            check_entry_name(entry, child)?;
        }

        Ok(Some(handle.write_tree(rewritten)?))
    }

    /// Rewrite a commit's root tree. An empty result is written as the empty
    /// tree since a commit always needs one.
    pub fn rewrite_root_tree(&self, handle: &StoreHandle<'_>, tree_id: TreeId) -> RewriteResult<TreeId> {
        let root = Entry::root(tree_id.raw(), self.path_context);

        match self.get_entry(handle, &root)? {
            EntrySet::Empty => Ok(handle.write_tree(Vec::new())?),
            EntrySet::One(entry) if entry.mode.is_tree() => Ok(TreeId::new(entry.id)),
            other => Err(RewriteError::policy(format!(
                "root tree {} must rewrite to a single tree, got {} entries",
                tree_id,
                other.len()
            ))),
        }
    }

    // ==================== Commits ====================

    pub fn mapped_commit(&self, original: CommitId) -> Option<CommitId> {
        self.commits.lock().get(&original).copied()
    }

    pub fn commit_mapping(&self) -> HashMap<CommitId, CommitId> {
        self.commits.lock().clone()
    }

    pub fn commits_rewritten(&self) -> usize {
        self.commits.lock().len()
    }

    /// Rebuild one commit on top of its already rewritten parents.
    ///
    /// `walked` is the set of commits this phase visits: a parent inside it
    /// that is not mapped yet means the walk order is broken, while a parent
    /// outside it was left out of the rewrite and is dropped.
    pub fn rewrite_commit(
        &self,
        handle: &StoreHandle<'_>,
        original: CommitId,
        walked: &HashSet<CommitId>,
    ) -> RewriteResult<CommitId> {
        if let Some(mapped) = self.mapped_commit(original) {
            return Ok(mapped);
        }

        let info = handle.read_commit(original)?;

        let mut parents = Vec::with_capacity(info.parent_ids.len());
        for parent in &info.parent_ids {
            match self.mapped_commit(*parent) {
                Some(mapped) => parents.push(mapped),
                None if walked.contains(parent) => {
                    return Err(RewriteError::OutOfOrder {
                        commit: original,
                        parent: *parent,
                    });
                }
                None => tracing::trace!(commit = %original, %parent, "parent outside the rewritten range, dropped"),
            }
        }

        let tree = self.rewrite_root_tree(handle, info.tree_id)?;
        let builder = CommitBuilder::new()
            .tree(tree)
            .parents(parents)
            .author(self.policy.rewrite_author(&info)?)
            .committer(self.policy.rewrite_committer(&info)?)
            .message(self.policy.rewrite_commit_message(&info)?)
            .encoding(info.encoding.clone());

        let rewritten = handle.write_commit(&builder)?;
        self.commits.lock().insert(original, rewritten);
        tracing::trace!(%original, %rewritten, "rewrote commit");

        Ok(rewritten)
    }

    // ==================== Refs ====================

    /// The memoized rewrite of `reference`.
    pub fn get_ref(&self, handle: &StoreHandle<'_>, reference: &RefEntry) -> RewriteResult<RefEntry> {
        self.get_ref_at(handle, reference, 0)
    }

    fn get_ref_at(&self, handle: &StoreHandle<'_>, reference: &RefEntry, depth: usize) -> RewriteResult<RefEntry> {
        if depth > MAX_SYMREF_DEPTH {
            return Err(RewriteError::RefChainTooDeep(
                reference.name().unwrap_or_default().to_string(),
            ));
        }

        let lookup = self
            .refs
            .get_or_try_insert_with(reference, || self.rewrite_ref(handle, reference, depth))?;
        Ok(lookup.value)
    }

    fn rewrite_ref(&self, handle: &StoreHandle<'_>, reference: &RefEntry, depth: usize) -> RewriteResult<RefEntry> {
        match reference {
            RefEntry::Empty => Ok(RefEntry::Empty),
            RefEntry::Direct { name, id } => {
                let Some(new_name) = self.rewrite_ref_name(name)? else {
                    return Ok(RefEntry::Empty);
                };

                let new_id = match handle.peel(*id)? {
                    Peeled::Commit(commit) => self.remap_commit(handle, commit)?.raw(),
                    Peeled::Tag(tag) => self.rewrite_tag(handle, &tag)?.raw(),
                    Peeled::Other(kind) => {
                        tracing::debug!(name = name.as_str(), %kind, "ref names a non-commit object, kept");
                        handle.ensure_closure_in_destination(*id)?;
                        *id
                    }
                };

                Ok(RefEntry::direct(new_name, new_id))
            }
            RefEntry::Symbolic { name, target } => {
                let Some(new_name) = self.rewrite_ref_name(name)? else {
                    return Ok(RefEntry::Empty);
                };

                let new_target = match handle.find_ref(target)? {
                    Some(target_ref) => self.get_ref_at(handle, &target_ref, depth + 1)?.name().map(str::to_string),
                    // unborn branch: only its name can change
                    None => self.rewrite_ref_name(target)?,
                };

                Ok(match new_target {
                    Some(target) => RefEntry::symbolic(new_name, target),
                    None => RefEntry::Empty,
                })
            }
        }
    }

    /// Run a full ref name through the branch or tag name hook.
    fn rewrite_ref_name(&self, name: &str) -> RewriteResult<Option<String>> {
        Ok(match RefKind::classify(name) {
            RefKind::Branch(short) => self
                .policy
                .rewrite_branch_name(short)?
                .map(|short| format!("{}{}", RefKind::HEADS_PREFIX, short)),
            RefKind::Tag(short) => self
                .policy
                .rewrite_tag_name(short)?
                .map(|short| format!("{}{}", RefKind::TAGS_PREFIX, short)),
            RefKind::Head | RefKind::Other => Some(name.to_string()),
        })
    }

    /// The rewritten id of a commit a ref or tag names. A commit outside the
    /// rewritten range keeps its id, and its history is copied when exporting.
    fn remap_commit(&self, handle: &StoreHandle<'_>, commit: CommitId) -> RewriteResult<CommitId> {
        if let Some(mapped) = self.mapped_commit(commit) {
            return Ok(mapped);
        }
        tracing::debug!(%commit, "commit outside the rewritten range, kept");
        handle.ensure_closure_in_destination(commit.raw())?;
        Ok(commit)
    }

    /// Rebuild an annotated tag over its rewritten target.
    fn rewrite_tag(&self, handle: &StoreHandle<'_>, tag: &TagInfo) -> RewriteResult<TagId> {
        let target = if tag.targets_commit() {
            self.remap_commit(handle, CommitId::new(tag.target))?.raw()
        } else {
            handle.ensure_closure_in_destination(tag.target)?;
            tag.target
        };

        let name = match self.policy.rewrite_tag_name(&tag.name.to_str_lossy())? {
            Some(name) => BString::from(name),
            None => tag.name.clone(),
        };

        let builder = TagBuilder::new(target, tag.target_kind, name)
            .tagger(self.policy.rewrite_tagger(tag)?)
            .message(self.policy.rewrite_tag_message(tag)?);

        Ok(handle.write_tag(&builder)?)
    }
}

/// Names a policy produced must still be valid tree entry names.
fn check_entry_name(parent: &Entry, child: &Entry) -> RewriteResult<()> {
    let name = child.name.as_slice();
    if name.is_empty() || name == b"." || name == b".." || name.contains(&b'/') || name.contains(&0) {
        return Err(RewriteError::policy(format!(
            "invalid entry name {:?} under {}",
            child.name, parent
        )));
    }
    Ok(())
}
