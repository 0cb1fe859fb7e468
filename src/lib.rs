//! treeshift - a policy-driven rewriter for whole Git object graphs
//!
//! This crate rewrites every commit, tree, blob, tag and ref of a repository
//! into a transformed graph with the same ancestry. A [`RewritePolicy`]
//! decides, per tree entry, whether to keep, rename, drop or fan it out into
//! several derived entries; the engine takes care of walking history in
//! dependency order, memoizing tree rewrites by content and rebuilding refs.
//!
//! # Example
//!
//! ```no_run
//! use treeshift::rewrite::{DefaultPolicy, RewriteConfig, RewriteSession};
//!
//! let config = RewriteConfig::new("./repo").concurrent(true);
//! let session = RewriteSession::new(config, DefaultPolicy).unwrap();
//! let report = session.run().unwrap();
//! println!("{} commits rewritten", report.commits_rewritten);
//! ```
//!
//! [`RewritePolicy`]: rewrite::RewritePolicy

pub mod model;
pub mod rewrite;
pub mod storage;
