//! storage layer for treeshift
//!
//! this module is the only place that talks to git2. The rewrite engine above
//! it works with [`ObjectStore`] / [`StoreHandle`] and the typed ids and
//! descriptions re-exported here.
//!
//!  # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │               ObjectStore  →  StoreHandle                   │
//! │   (source/destination, dry-run, one handle per thread)      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌───────────┬─────────┼──────────┬──────────┐
//!        ▼           ▼         ▼          ▼          ▼
//!  ┌──────────┐ ┌─────────┐ ┌────────┐ ┌────────┐ ┌────────┐
//!  │   tree   │ │ commit  │ │  refs  │ │  walk  │ │inserter│
//!  │ (sorting,│ │ (commit,│ │ (list, │ │ (topo  │ │(write /│
//!  │ encoding)│ │  tags)  │ │ update)│ │ order) │ │ hash)  │
//!  └──────────┘ └─────────┘ └────────┘ └────────┘ └────────┘
//!  ```
//!
//! # Usage
//!
//! ```ignore
//! use treeshift::storage::ObjectStore;
//!
//! let store = ObjectStore::open("./repo")?.dry_run(true);
//! store.with_handle(|handle| {
//!     let children = handle.list_children(tree_id, None)?;
//!     let rewritten = handle.write_tree(children)?;
//!     Ok::<_, treeshift::storage::StorageError>(rewritten)
//! })?;
//! ```

mod commit;
mod error;
mod inserter;
mod refs;
mod store;
mod tree;
mod types;
mod walk;

// Re-export public API
pub use commit::{stamp_provenance, CommitBuilder, CommitInfo, Peeled, TagBuilder, TagInfo};
pub use error::{StorageError, StorageResult};
pub use inserter::Inserter;
pub use store::{ObjectStore, StoreHandle};
pub use tree::{canonical_cmp, encode_tree, CollisionPolicy};
pub use types::{CommitId, Signature, TagId, TreeId};

// Re-export for internal use by other modules
pub(crate) use refs::RefManager;
