//! Value types the rewriter produces and memoizes.
//!
//! An [`Entry`] is one child of a tree, seen from a particular directory.
//! Rewriting an entry yields an [`EntrySet`]: the entry can pass through,
//! vanish, or fan out into several derived entries. Refs get the same
//! treatment through [`RefEntry`].

mod entry;
mod reference;

pub use entry::{Entry, EntryMode, EntrySet, ROOT_NAME};
pub use reference::{RefEntry, RefKind};
