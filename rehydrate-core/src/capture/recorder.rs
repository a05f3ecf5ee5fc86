//! The mutation recorder
//!
//! Owns no tree and no log: both are passed in by the [`crate::root::Root`]
//! that associates them, so one recorder instance serves exactly one root.

use super::log::{AppendOutcome, MutationLog, MutationRecord};
use super::CaptureError;
use crate::config::CaptureConfig;
use crate::events::{HookRegistry, LifecycleEvent};
use crate::storage::{KeyValueStore, StorageKeys};
use crate::tree::UiTree;

/// What happened to an observed mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Appended at this index and written through
    Recorded(usize),

    /// The root is not capturing
    NotCapturing,

    /// The log is at its limit; the mutation was dropped
    Dropped,
}

/// Records property mutations of one root while capture is active
#[derive(Debug)]
pub struct MutationRecorder {
    config: CaptureConfig,
    keys: StorageKeys,
    limit_reported: bool,
}

impl MutationRecorder {
    /// Create a recorder writing under `keys`
    pub fn new(config: CaptureConfig, keys: StorageKeys) -> Self {
        Self {
            config,
            keys,
            limit_reported: false,
        }
    }

    /// Capture configuration
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Storage keys
    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    /// Put the root in capture mode.
    ///
    /// Disabled capture is a silent no-op. Capturing twice is a lifecycle bug:
    /// the tree is halted and the error returned. Capturing during replay is
    /// refused without touching the tree.
    pub fn capture(
        &self,
        tree: &mut UiTree,
        hooks: &mut HookRegistry,
    ) -> std::result::Result<(), CaptureError> {
        tree.ensure_live()?;

        if !self.config.enabled {
            tracing::debug!(root = tree.root(), "Capture disabled by configuration");
            return Ok(());
        }

        let flags = tree.flags();
        if flags.replaying() {
            tracing::warn!(root = tree.root(), "Capture requested during replay");
            return Err(CaptureError::ReplayInProgress {
                root: tree.root().to_string(),
            });
        }
        if flags.capturing() {
            let root = tree.root().to_string();
            tree.halt("capture enabled twice");
            return Err(CaptureError::DoubleCaptureAttempt { root });
        }

        tree.set_capturing(true);
        tracing::info!(root = tree.root(), "Capture started");
        hooks.emit(&LifecycleEvent::capture_started(tree.root()));
        Ok(())
    }

    /// Leave capture mode
    pub fn stop(&self, tree: &mut UiTree) {
        if tree.flags().capturing() {
            tree.set_capturing(false);
            tracing::info!(root = tree.root(), "Capture stopped");
        }
    }

    /// Append an observed mutation and write the log through to `store`.
    ///
    /// Mutations observed while the root is not capturing are not logged.
    /// At the limit the mutation is dropped and a single warning is emitted
    /// per recorder; capture state is unaffected. A failed write-through
    /// removes the record from `log` again.
    pub async fn record(
        &mut self,
        tree: &UiTree,
        log: &mut MutationLog,
        store: &dyn KeyValueStore,
        record: MutationRecord,
    ) -> std::result::Result<RecordOutcome, CaptureError> {
        tree.ensure_live()?;
        if !tree.flags().capturing() {
            return Ok(RecordOutcome::NotCapturing);
        }
        if !record.value.is_persistable() {
            return Err(CaptureError::UnpersistableValue {
                node_id: record.node_id,
                category: record.category,
                property: record.property,
            });
        }

        match log.push(record) {
            AppendOutcome::Appended(index) => {
                if let Err(err) = self.persist(log, store).await {
                    // Keep memory in step with what storage holds
                    log.truncate(index);
                    return Err(err);
                }
                Ok(RecordOutcome::Recorded(index))
            }
            AppendOutcome::Dropped => {
                if !self.limit_reported {
                    self.limit_reported = true;
                    tracing::warn!(
                        root = tree.root(),
                        limit = log.limit(),
                        "Capture limit reached; further mutations are dropped"
                    );
                }
                Ok(RecordOutcome::Dropped)
            }
        }
    }

    /// Write the full log to storage
    pub async fn persist(
        &self,
        log: &MutationLog,
        store: &dyn KeyValueStore,
    ) -> std::result::Result<(), CaptureError> {
        let blob = log.to_json()?;
        store.store(&self.keys.log, &blob).await?;
        Ok(())
    }

    /// Empty the log, persist the empty state, and reset the cursor to 0
    pub async fn clear(
        &mut self,
        log: &mut MutationLog,
        store: &dyn KeyValueStore,
    ) -> std::result::Result<(), CaptureError> {
        log.clear();
        self.limit_reported = false;
        self.persist(log, store).await?;
        store.store(&self.keys.cursor, "0").await?;
        tracing::info!(key = %self.keys.log, "Mutation log cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::IdGenerator;
    use crate::storage::MemoryStore;
    use crate::tree::TreeError;

    fn setup(limit: usize) -> (UiTree, MutationLog, MemoryStore, MutationRecorder) {
        let tree = UiTree::new("app", IdGenerator::reproducible(3));
        let config = CaptureConfig {
            enabled: true,
            limit,
        };
        (
            tree,
            MutationLog::with_limit(limit),
            MemoryStore::new(),
            MutationRecorder::new(config, StorageKeys::for_root("app")),
        )
    }

    #[tokio::test]
    async fn test_record_writes_through() {
        let (mut tree, mut log, store, mut recorder) = setup(10);
        let mut hooks = HookRegistry::new();
        recorder.capture(&mut tree, &mut hooks).unwrap();

        let outcome = recorder
            .record(
                &tree,
                &mut log,
                &store,
                MutationRecord::new("e1", "ui", "text", "A"),
            )
            .await
            .unwrap();
        assert_eq!(outcome, RecordOutcome::Recorded(0));

        let persisted = store
            .load("app/mutation-recorder/mutationlist")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(MutationLog::from_json(&persisted, 10).unwrap(), log);
    }

    #[tokio::test]
    async fn test_not_capturing_is_not_logged() {
        let (tree, mut log, store, mut recorder) = setup(10);
        let outcome = recorder
            .record(
                &tree,
                &mut log,
                &store,
                MutationRecord::new("e1", "ui", "text", "A"),
            )
            .await
            .unwrap();
        assert_eq!(outcome, RecordOutcome::NotCapturing);
        assert!(log.is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_disabled_capture_is_silent() {
        let (mut tree, _, _, _) = setup(10);
        let recorder = MutationRecorder::new(
            CaptureConfig {
                enabled: false,
                limit: 10,
            },
            StorageKeys::for_root("app"),
        );
        let mut hooks = HookRegistry::new();

        recorder.capture(&mut tree, &mut hooks).unwrap();
        recorder.capture(&mut tree, &mut hooks).unwrap();
        assert!(tree.flags().is_idle());
        assert!(tree.halted().is_none());
    }

    #[tokio::test]
    async fn test_double_capture_halts_tree() {
        let (mut tree, mut log, store, mut recorder) = setup(10);
        let mut hooks = HookRegistry::new();
        recorder.capture(&mut tree, &mut hooks).unwrap();

        let err = recorder.capture(&mut tree, &mut hooks).unwrap_err();
        assert!(matches!(err, CaptureError::DoubleCaptureAttempt { .. }));
        assert!(err.is_fatal());
        assert!(tree.halted().is_some());

        let err = recorder
            .record(
                &tree,
                &mut log,
                &store,
                MutationRecord::new("e1", "ui", "text", "A"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Tree(TreeError::TreeHalted { .. })));
    }

    #[tokio::test]
    async fn test_capture_refused_during_replay() {
        let (mut tree, _, _, recorder) = setup(10);
        let mut hooks = HookRegistry::new();
        tree.set_replaying(true);

        let err = recorder.capture(&mut tree, &mut hooks).unwrap_err();
        assert!(matches!(err, CaptureError::ReplayInProgress { .. }));
        assert!(tree.flags().replaying());
        assert!(!tree.flags().capturing());
        assert!(tree.halted().is_none());
    }

    #[tokio::test]
    async fn test_limit_drops_excess_and_keeps_prefix() {
        let (mut tree, mut log, store, mut recorder) = setup(3);
        let mut hooks = HookRegistry::new();
        recorder.capture(&mut tree, &mut hooks).unwrap();

        for i in 0..4i64 {
            recorder
                .record(
                    &tree,
                    &mut log,
                    &store,
                    MutationRecord::new("counter", "ui", "value", i),
                )
                .await
                .unwrap();
        }
        let prefix = log.to_json().unwrap();

        let outcome = recorder
            .record(
                &tree,
                &mut log,
                &store,
                MutationRecord::new("counter", "ui", "value", 99i64),
            )
            .await
            .unwrap();

        assert_eq!(outcome, RecordOutcome::Dropped);
        assert_eq!(log.len(), 3);
        assert_eq!(log.to_json().unwrap(), prefix);
        assert!(tree.flags().capturing());
    }

    #[tokio::test]
    async fn test_unpersistable_value_rejected() {
        let (mut tree, mut log, store, mut recorder) = setup(10);
        let mut hooks = HookRegistry::new();
        recorder.capture(&mut tree, &mut hooks).unwrap();

        let err = recorder
            .record(
                &tree,
                &mut log,
                &store,
                MutationRecord::new("gauge", "ui", "ratio", f64::NAN),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::UnpersistableValue { .. }));
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_clear_resets_log_and_cursor() {
        let (mut tree, mut log, store, mut recorder) = setup(10);
        let mut hooks = HookRegistry::new();
        recorder.capture(&mut tree, &mut hooks).unwrap();
        recorder
            .record(
                &tree,
                &mut log,
                &store,
                MutationRecord::new("e1", "ui", "text", "A"),
            )
            .await
            .unwrap();
        store
            .store("app/mutation-recorder/cursor", "1")
            .await
            .unwrap();

        recorder.clear(&mut log, &store).await.unwrap();

        assert!(log.is_empty());
        assert_eq!(
            store
                .load("app/mutation-recorder/mutationlist")
                .await
                .unwrap()
                .as_deref(),
            Some("[]")
        );
        assert_eq!(
            store
                .load("app/mutation-recorder/cursor")
                .await
                .unwrap()
                .as_deref(),
            Some("0")
        );
    }
}
