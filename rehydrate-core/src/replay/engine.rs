//! Replay engine and its navigation collaborator

use super::ReplayError;
use crate::capture::MutationLog;
use crate::config::ReplayConfig;
use crate::events::{HookRegistry, LifecycleEvent};
use crate::storage::{KeyValueStore, StorageKeys};
use crate::tree::{UiTree, WritePath};
use serde::{Deserialize, Serialize};

/// Navigation collaborator.
///
/// A pending navigation would rebuild the tree underneath the replay, so it is
/// cancelled before the first record is applied.
pub trait Navigator: Send {
    /// Cancel any pending navigation. Returns true if one was cancelled.
    fn cancel_pending(&mut self) -> bool;
}

/// Navigator for hosts without client-side navigation
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNavigation;

impl Navigator for NoNavigation {
    fn cancel_pending(&mut self) -> bool {
        false
    }
}

/// Outcome of a successful replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayReport {
    /// Cursor the replay started from
    pub from: usize,

    /// Number of records applied
    pub applied: usize,

    /// Persisted cursor after the replay
    pub cursor: usize,
}

/// Applies a mutation log to a tree from the persisted cursor onwards.
///
/// The engine keeps no cursor of its own. Every replay reads the persisted
/// value, so whichever component looks at the position first sees the same
/// number.
#[derive(Debug, Clone)]
pub struct ReplayEngine {
    config: ReplayConfig,
    keys: StorageKeys,
}

impl ReplayEngine {
    /// Create an engine reading and writing under `keys`
    pub fn new(config: ReplayConfig, keys: StorageKeys) -> Self {
        Self { config, keys }
    }

    /// Replay configuration
    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Storage keys
    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    /// Read the persisted cursor. A missing cursor is position 0.
    pub async fn load_cursor(
        &self,
        store: &dyn KeyValueStore,
    ) -> std::result::Result<usize, ReplayError> {
        match store.load(&self.keys.cursor).await? {
            None => Ok(0),
            Some(blob) => blob
                .trim()
                .parse::<usize>()
                .map_err(|_| ReplayError::CorruptCursor { blob }),
        }
    }

    /// Persist the cursor
    pub async fn store_cursor(
        &self,
        store: &dyn KeyValueStore,
        cursor: usize,
    ) -> std::result::Result<(), ReplayError> {
        store.store(&self.keys.cursor, &cursor.to_string()).await?;
        Ok(())
    }

    /// Read and decode the persisted log, if one exists
    pub async fn load_log(
        &self,
        store: &dyn KeyValueStore,
        limit: usize,
    ) -> std::result::Result<Option<MutationLog>, ReplayError> {
        match store.load(&self.keys.log).await? {
            None => Ok(None),
            Some(blob) => Ok(Some(MutationLog::from_json(&blob, limit)?)),
        }
    }

    /// Apply `log` to `tree` from the persisted cursor to the end.
    ///
    /// Stops at the first record whose target node is missing; the cursor then
    /// points at that record and nothing after it has been applied. The tree's
    /// flags are back to idle whether the replay succeeds or fails.
    pub async fn replay(
        &self,
        tree: &mut UiTree,
        log: &MutationLog,
        store: &dyn KeyValueStore,
        navigator: &mut dyn Navigator,
        hooks: &mut HookRegistry,
    ) -> std::result::Result<ReplayReport, ReplayError> {
        tree.ensure_live()?;

        if !self.config.enabled {
            tracing::debug!(root = tree.root(), "Replay disabled by configuration");
            return Ok(ReplayReport {
                from: 0,
                applied: 0,
                cursor: 0,
            });
        }

        let flags = tree.flags();
        if flags.capturing() {
            return Err(ReplayError::CaptureActive {
                root: tree.root().to_string(),
            });
        }
        if flags.replaying() {
            return Err(ReplayError::AlreadyReplaying {
                root: tree.root().to_string(),
            });
        }

        let from = self.load_cursor(store).await?;
        if from > log.len() {
            tracing::error!(
                root = tree.root(),
                cursor = from,
                len = log.len(),
                "Persisted cursor is past the end of the log"
            );
            return Err(ReplayError::MalformedLogEntry {
                index: from,
                reason: format!("cursor {} is beyond a log of {} records", from, log.len()),
            });
        }

        tree.set_replaying(true);
        if navigator.cancel_pending() {
            tracing::debug!(root = tree.root(), "Cancelled pending navigation before replay");
        }
        tracing::info!(root = tree.root(), from, total = log.len(), "Replay started");
        hooks.emit(&LifecycleEvent::replay_started(tree.root(), from));

        let result = self.apply_from(tree, log, store, from).await;
        tree.set_replaying(false);
        let cursor = result?;

        let applied = cursor - from;
        tracing::info!(root = tree.root(), applied, "Replay completed");
        hooks.emit(&LifecycleEvent::replay_completed(tree.root(), applied));

        Ok(ReplayReport {
            from,
            applied,
            cursor,
        })
    }

    async fn apply_from(
        &self,
        tree: &mut UiTree,
        log: &MutationLog,
        store: &dyn KeyValueStore,
        from: usize,
    ) -> std::result::Result<usize, ReplayError> {
        for (index, record) in log.iter().enumerate().skip(from) {
            if !tree.contains(&record.node_id) {
                tracing::warn!(
                    root = tree.root(),
                    index,
                    node_id = %record.node_id,
                    "Replay target missing"
                );
                return Err(ReplayError::MissingReplayTarget {
                    index,
                    node_id: record.node_id.clone(),
                });
            }

            let path = if record.sync {
                WritePath::Synced
            } else {
                WritePath::Direct
            };

            tree.set_node_replaying(&record.node_id, true);
            let written = tree.write(
                &record.node_id,
                &record.category,
                &record.property,
                record.value.clone(),
                path,
            );
            tree.set_node_replaying(&record.node_id, false);
            written?;

            self.store_cursor(store, index + 1).await?;
            tracing::debug!(
                index,
                node_id = %record.node_id,
                category = %record.category,
                property = %record.property,
                kind = record.value.kind(),
                "Applied record"
            );
        }
        Ok(log.len())
    }
}
