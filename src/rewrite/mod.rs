//! The rewrite engine.
//!
//! A [`RewriteSession`] binds a source and destination store to a
//! [`RewritePolicy`] and rewrites history in two sequential phases, optionally
//! preceded by a concurrent warm-up of the tree cache.
//!
//! ```text
//!                        RewriteSession::run
//!                               │
//!         ┌─────────────────────┼──────────────────────┐
//!         ▼                     ▼                      ▼
//!   ┌───────────┐        ┌─────────────┐        ┌─────────────┐
//!   │  prepass  │        │   phase 1   │        │   phase 2   │
//!   │  (rayon)  │        │   commits   │        │    refs     │
//!   └───────────┘        └─────────────┘        └─────────────┘
//!         │                     │                      │
//!         └─────────────────────┼──────────────────────┘
//!                               ▼
//!                     Engine (caches + policy)
//!                               │
//!                               ▼
//!                     storage::ObjectStore
//! ```

mod config;
mod context;
mod engine;
mod error;
mod memo;
mod policy;
mod prepass;
mod report;
mod session;

pub use config::RewriteConfig;
pub use context::EntryContext;
pub use error::{RewriteError, RewriteResult};
pub use policy::{DefaultPolicy, RewritePolicy, VerbatimPolicy};
pub use report::{RefUpdateSummary, RewriteReport};
pub use session::RewriteSession;
