//! Rewrite policies: every override point the engine consults.
//!
//! A policy is handed to [`RewriteSession`](crate::rewrite::RewriteSession)
//! at construction. Every hook has a default, so a policy only implements
//! what it wants to change. Hooks may be called from several threads at once
//! when the concurrent pre-pass is enabled, and each entry hook runs at most
//! once per distinct input entry, so entry rewriting must be a pure function
//! of the entry (mode, name, id and path context).
//!
//! # Example
//!
//! ```
//! use treeshift::model::{Entry, EntrySet};
//! use treeshift::rewrite::{EntryContext, RewritePolicy, RewriteResult};
//!
//! /// Drop compiled artifacts everywhere in history.
//! struct DropBinaries;
//!
//! impl RewritePolicy for DropBinaries {
//!     fn rewrite_entry(&self, cx: &EntryContext<'_>, entry: &Entry) -> RewriteResult<EntrySet> {
//!         if entry.mode.is_blob() && entry.name.ends_with(b".bin") {
//!             return Ok(EntrySet::Empty);
//!         }
//!         cx.rewrite_default(entry)
//!     }
//! }
//! ```

use bstr::{BString, ByteSlice};
use git2::Oid;

use crate::model::{Entry, EntrySet, RefKind};
use crate::rewrite::context::EntryContext;
use crate::rewrite::error::RewriteResult;
use crate::storage::{stamp_provenance, CommitId, CommitInfo, Signature, StoreHandle, TagInfo};

/// The override points of a rewrite.
pub trait RewritePolicy: Send + Sync {
    /// Rewrite one tree entry into zero, one or many entries.
    ///
    /// The default recurses into trees, runs blobs through
    /// [`rewrite_blob`](Self::rewrite_blob) and renames everything but the
    /// root through [`rewrite_name`](Self::rewrite_name).
    fn rewrite_entry(&self, cx: &EntryContext<'_>, entry: &Entry) -> RewriteResult<EntrySet> {
        cx.rewrite_default(entry)
    }

    /// New name for an entry that is kept.
    fn rewrite_name(&self, entry: &Entry) -> RewriteResult<BString> {
        Ok(entry.name.clone())
    }

    /// New content for a kept blob, as the id of a blob in the destination.
    ///
    /// Write replacement content with [`EntryContext::write_blob`].
    fn rewrite_blob(&self, _cx: &EntryContext<'_>, entry: &Entry) -> RewriteResult<Oid> {
        Ok(entry.id)
    }

    fn rewrite_author(&self, commit: &CommitInfo) -> RewriteResult<Signature> {
        Ok(commit.author.clone())
    }

    fn rewrite_committer(&self, commit: &CommitInfo) -> RewriteResult<Signature> {
        Ok(commit.committer.clone())
    }

    /// `None` writes a tag without a tagger line.
    fn rewrite_tagger(&self, tag: &TagInfo) -> RewriteResult<Option<Signature>> {
        Ok(tag.tagger.clone())
    }

    /// Message for the rewritten commit.
    ///
    /// The default prefixes the original short id, `[1a2b3c4] message`, so
    /// rewritten history stays traceable. Use [`VerbatimPolicy`] (or override
    /// this) for a message-preserving rewrite.
    fn rewrite_commit_message(&self, commit: &CommitInfo) -> RewriteResult<BString> {
        Ok(stamp_provenance(commit.id, commit.message.as_bstr()))
    }

    fn rewrite_tag_message(&self, tag: &TagInfo) -> RewriteResult<BString> {
        Ok(tag.message.clone())
    }

    /// New short name for the branch `refs/heads/<name>`; `None` drops it.
    fn rewrite_branch_name(&self, name: &str) -> RewriteResult<Option<String>> {
        Ok(Some(name.to_string()))
    }

    /// New short name for the tag `refs/tags/<name>`; `None` drops it.
    ///
    /// Also renames the annotated tag object the ref points at.
    fn rewrite_tag_name(&self, name: &str) -> RewriteResult<Option<String>> {
        Ok(Some(name.to_string()))
    }

    /// Whether the ref named `name` seeds the walk and gets rewritten.
    fn is_start_ref(&self, name: &str) -> bool {
        RefKind::classify(name).is_rewritable()
    }

    /// Commits whose history is left alone: the walk stops at them.
    fn uninteresting(&self, _handle: &StoreHandle<'_>) -> RewriteResult<Vec<CommitId>> {
        Ok(Vec::new())
    }
}

/// Every hook at its default: content kept, messages provenance-stamped.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPolicy;

impl RewritePolicy for DefaultPolicy {}

/// Every hook is the identity: rewriting with it reproduces the input ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerbatimPolicy;

impl RewritePolicy for VerbatimPolicy {
    fn rewrite_commit_message(&self, commit: &CommitInfo) -> RewriteResult<BString> {
        Ok(commit.message.clone())
    }
}

impl<P: RewritePolicy + ?Sized> RewritePolicy for Box<P> {
    fn rewrite_entry(&self, cx: &EntryContext<'_>, entry: &Entry) -> RewriteResult<EntrySet> {
        (**self).rewrite_entry(cx, entry)
    }

    fn rewrite_name(&self, entry: &Entry) -> RewriteResult<BString> {
        (**self).rewrite_name(entry)
    }

    fn rewrite_blob(&self, cx: &EntryContext<'_>, entry: &Entry) -> RewriteResult<Oid> {
        (**self).rewrite_blob(cx, entry)
    }

    fn rewrite_author(&self, commit: &CommitInfo) -> RewriteResult<Signature> {
        (**self).rewrite_author(commit)
    }

    fn rewrite_committer(&self, commit: &CommitInfo) -> RewriteResult<Signature> {
        (**self).rewrite_committer(commit)
    }

    fn rewrite_tagger(&self, tag: &TagInfo) -> RewriteResult<Option<Signature>> {
        (**self).rewrite_tagger(tag)
    }

    fn rewrite_commit_message(&self, commit: &CommitInfo) -> RewriteResult<BString> {
        (**self).rewrite_commit_message(commit)
    }

    fn rewrite_tag_message(&self, tag: &TagInfo) -> RewriteResult<BString> {
        (**self).rewrite_tag_message(tag)
    }

    fn rewrite_branch_name(&self, name: &str) -> RewriteResult<Option<String>> {
        (**self).rewrite_branch_name(name)
    }

    fn rewrite_tag_name(&self, name: &str) -> RewriteResult<Option<String>> {
        (**self).rewrite_tag_name(name)
    }

    fn is_start_ref(&self, name: &str) -> bool {
        (**self).is_start_ref(name)
    }

    fn uninteresting(&self, handle: &StoreHandle<'_>) -> RewriteResult<Vec<CommitId>> {
        (**self).uninteresting(handle)
    }
}
