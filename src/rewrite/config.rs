//! Rewrite session configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::rewrite::error::{RewriteError, RewriteResult};
use crate::storage::{CollisionPolicy, ObjectStore};

/// Rewrite session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Repository to read history from.
    pub source: PathBuf,
    /// Repository to write into. `None` rewrites the source in place.
    pub destination: Option<PathBuf>,
    /// Compute every id without persisting objects or ref changes.
    pub dry_run: bool,
    /// Warm the tree cache on a thread pool before commits are rebuilt.
    pub concurrent: bool,
    /// Pre-pass worker count. `None` lets rayon decide.
    pub threads: Option<usize>,
    /// Tag entries with their directory so policies can depend on location.
    pub path_context: bool,
    /// What to do when a rewritten tree has two entries with one name.
    pub collision: CollisionPolicy,
    /// Reflog message recorded on every ref update.
    pub reflog_message: String,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("."),
            destination: None,
            dry_run: false,
            concurrent: false,
            threads: None,
            path_context: false,
            collision: CollisionPolicy::LastWins,
            reflog_message: "treeshift: rewrite".to_string(),
        }
    }
}

impl RewriteConfig {
    /// Create a new configuration rewriting `source` in place.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// Load a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> RewriteResult<Self> {
        serde_json::from_str(json).map_err(|e| RewriteError::InvalidConfig(e.to_string()))
    }

    pub fn to_json(&self) -> RewriteResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| RewriteError::InvalidConfig(e.to_string()))
    }

    /// Write into `destination` instead of rewriting in place.
    pub fn destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Set dry_run flag.
    pub fn dry_run(mut self, value: bool) -> Self {
        self.dry_run = value;
        self
    }

    /// Set concurrent flag.
    pub fn concurrent(mut self, value: bool) -> Self {
        self.concurrent = value;
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Set path_context flag.
    pub fn path_context(mut self, value: bool) -> Self {
        self.path_context = value;
        self
    }

    pub fn collision(mut self, policy: CollisionPolicy) -> Self {
        self.collision = policy;
        self
    }

    pub fn reflog_message(mut self, message: impl Into<String>) -> Self {
        self.reflog_message = message.into();
        self
    }

    /// Check the configuration before any repository is opened.
    pub fn validate(&self) -> RewriteResult<()> {
        if self.threads == Some(0) {
            return Err(RewriteError::InvalidConfig(
                "threads must be at least 1 (omit it to use the default)".to_string(),
            ));
        }
        if self.reflog_message.trim().is_empty() {
            return Err(RewriteError::InvalidConfig("reflog message must not be empty".to_string()));
        }
        if self.threads.is_some() && !self.concurrent {
            tracing::debug!("thread count set without concurrent mode, it will be ignored");
        }
        Ok(())
    }

    /// Open the object store this configuration describes.
    pub(crate) fn open_store(&self) -> RewriteResult<ObjectStore> {
        let mut store = ObjectStore::open(&self.source)?;
        if let Some(destination) = &self.destination {
            store = store.export_to(destination)?;
        }
        Ok(store
            .dry_run(self.dry_run)
            .collision_policy(self.collision)
            .reflog_message(self.reflog_message.clone()))
    }
}
