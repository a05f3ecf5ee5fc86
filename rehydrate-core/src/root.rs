//! A tree root and the capture/replay machinery associated with it
//!
//! Each [`Root`] owns exactly one tree, one log, one recorder, and one replay
//! engine. Roots are looked up through an explicit
//! [`RootRegistry`](crate::registry::RootRegistry), never through a global.

use crate::capture::{CaptureError, MutationLog, MutationRecord, MutationRecorder, RecordOutcome};
use crate::config::RuntimeConfig;
use crate::events::HookRegistry;
use crate::ids::IdGenerator;
use crate::replay::{Navigator, NoNavigation, ReplayEngine, ReplayError, ReplayReport};
use crate::storage::{KeyValueStore, ScopedStorage, StorageKeys, StorageScope};
use crate::tree::{NativeBridge, TreeError, UiTree, WritePath};
use crate::value::Value;
use std::sync::Arc;

/// One UI tree root with its recorder, engine, hooks, and persistence
pub struct Root {
    tree: UiTree,
    log: MutationLog,
    recorder: MutationRecorder,
    engine: ReplayEngine,
    hooks: HookRegistry,
    storage: ScopedStorage,
    scope: StorageScope,
    navigator: Box<dyn Navigator>,
    config: RuntimeConfig,
}

impl Root {
    /// Create a root named `name`.
    ///
    /// Unnamed nodes get identifiers from a reproducible generator: the
    /// configured seed if set, otherwise a seed derived from `name`.
    pub fn new(name: impl Into<String>, config: RuntimeConfig, storage: ScopedStorage) -> Self {
        let name = name.into();
        let ids = match config.ids.seed {
            Some(seed) => IdGenerator::reproducible(seed),
            None => IdGenerator::from_content(name.as_bytes()),
        }
        .with_length(config.ids.length);
        let keys = StorageKeys::for_root(&name);

        Self {
            tree: UiTree::new(name, ids),
            log: MutationLog::with_limit(config.capture.limit),
            recorder: MutationRecorder::new(config.capture.clone(), keys.clone()),
            engine: ReplayEngine::new(config.replay.clone(), keys),
            hooks: HookRegistry::new(),
            storage,
            scope: config.storage.scope,
            navigator: Box::new(NoNavigation),
            config,
        }
    }

    /// Replace the identifier generator.
    ///
    /// Fails with [`TreeError::GeneratorInUse`] once the tree holds nodes.
    pub fn with_ids(mut self, ids: IdGenerator) -> std::result::Result<Self, TreeError> {
        self.tree.set_ids(ids)?;
        Ok(self)
    }

    /// Attach the native-layer collaborator
    pub fn with_bridge(mut self, bridge: Box<dyn NativeBridge>) -> Self {
        self.tree = self.tree.with_bridge(bridge);
        self
    }

    /// Attach the navigation collaborator
    pub fn with_navigator(mut self, navigator: Box<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    /// Root identity
    pub fn name(&self) -> &str {
        self.tree.root()
    }

    /// The UI tree
    pub fn tree(&self) -> &UiTree {
        &self.tree
    }

    /// The UI tree, mutably.
    ///
    /// Writes made here bypass the recorder; use [`Root::set`] for observed mutations.
    pub fn tree_mut(&mut self) -> &mut UiTree {
        &mut self.tree
    }

    /// In-memory mutation log
    pub fn log(&self) -> &MutationLog {
        &self.log
    }

    /// Lifecycle hooks
    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    /// Persistence scope in use
    pub fn scope(&self) -> StorageScope {
        self.scope
    }

    /// Backend for the scope in use
    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        self.storage.scope(self.scope)
    }

    /// Runtime configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Replay engine
    pub fn engine(&self) -> &ReplayEngine {
        &self.engine
    }

    /// Reseed unnamed-node identifiers from the tree built so far.
    ///
    /// Both sides of a hand-off call this after creating the same named
    /// skeleton, so the unnamed nodes that follow get matching identifiers.
    pub fn reseed_from_content(&mut self) {
        self.tree.reseed_from_content();
    }

    /// Start capturing mutations
    pub fn capture(&mut self) -> std::result::Result<(), CaptureError> {
        self.recorder.capture(&mut self.tree, &mut self.hooks)
    }

    /// Stop capturing mutations
    pub fn stop_capture(&mut self) {
        self.recorder.stop(&mut self.tree);
    }

    /// Set a property and record the mutation if capture is active.
    ///
    /// If the log cannot be written through, the record is dropped from the
    /// in-memory log as well and [`CaptureError::Storage`] is returned. The tree
    /// keeps the new value.
    pub async fn set(
        &mut self,
        id: &str,
        category: &str,
        property: &str,
        value: impl Into<Value>,
    ) -> std::result::Result<RecordOutcome, CaptureError> {
        self.apply(id, category, property, value.into(), WritePath::Direct)
            .await
    }

    /// Like [`Root::set`], but the value is also pushed to the native layer
    pub async fn set_synced(
        &mut self,
        id: &str,
        category: &str,
        property: &str,
        value: impl Into<Value>,
    ) -> std::result::Result<RecordOutcome, CaptureError> {
        self.apply(id, category, property, value.into(), WritePath::Synced)
            .await
    }

    async fn apply(
        &mut self,
        id: &str,
        category: &str,
        property: &str,
        value: Value,
        path: WritePath,
    ) -> std::result::Result<RecordOutcome, CaptureError> {
        self.tree.ensure_live()?;
        if self.tree.flags().capturing() && !value.is_persistable() {
            return Err(CaptureError::UnpersistableValue {
                node_id: id.to_string(),
                category: category.to_string(),
                property: property.to_string(),
            });
        }

        self.tree.write(id, category, property, value.clone(), path)?;

        let mut record = MutationRecord::new(id, category, property, value);
        if path == WritePath::Synced {
            record = record.synced();
        }
        let store = self.store();
        self.recorder
            .record(&self.tree, &mut self.log, store.as_ref(), record)
            .await
    }

    /// Replay the in-memory log from the persisted cursor
    pub async fn replay(&mut self) -> std::result::Result<ReplayReport, ReplayError> {
        let store = self.store();
        self.engine
            .replay(
                &mut self.tree,
                &self.log,
                store.as_ref(),
                self.navigator.as_mut(),
                &mut self.hooks,
            )
            .await
    }

    /// Load the persisted log into memory. Returns false if none is stored.
    pub async fn load_persisted(&mut self) -> std::result::Result<bool, ReplayError> {
        let store = self.store();
        match self
            .engine
            .load_log(store.as_ref(), self.config.capture.limit)
            .await?
        {
            Some(log) => {
                self.log = log;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Adopt a log handed over in server-rendered markup.
    ///
    /// The log is validated, persisted, and the cursor reset to 0.
    pub async fn adopt_embedded(&mut self, blob: &str) -> std::result::Result<(), ReplayError> {
        let log = MutationLog::from_json(blob, self.config.capture.limit)?;
        let store = self.store();
        let encoded = log
            .to_json()
            .map_err(|e| ReplayError::MalformedLog {
                reason: e.to_string(),
            })?;
        store.store(&self.engine.keys().log, &encoded).await?;
        self.engine.store_cursor(store.as_ref(), 0).await?;
        self.log = log;
        Ok(())
    }

    /// Empty the log and reset the persisted cursor
    pub async fn clear(&mut self) -> std::result::Result<(), CaptureError> {
        let store = self.store();
        self.recorder.clear(&mut self.log, store.as_ref()).await
    }
}

impl std::fmt::Debug for Root {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Root")
            .field("tree", &self.tree)
            .field("log", &self.log.len())
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct CountingBridge {
        calls: Arc<Mutex<usize>>,
    }

    impl NativeBridge for CountingBridge {
        fn sync_property(&mut self, _: &str, _: &str, _: &str, _: &Value) {
            *self.calls.lock().unwrap() += 1;
        }
    }

    fn root() -> Root {
        let mut root = Root::new("app", RuntimeConfig::default(), ScopedStorage::in_memory());
        root.tree_mut().create_node("input", Some("name")).unwrap();
        root
    }

    #[tokio::test]
    async fn test_set_records_only_while_capturing() {
        let mut root = root();
        let outcome = root.set("name", "ui", "value", "before").await.unwrap();
        assert_eq!(outcome, RecordOutcome::NotCapturing);

        root.capture().unwrap();
        let outcome = root.set_synced("name", "ui", "value", "after").await.unwrap();
        assert_eq!(outcome, RecordOutcome::Recorded(0));

        assert_eq!(root.log().len(), 1);
        assert!(root.log().get(0).unwrap().sync);
        assert_eq!(
            root.tree().get("name", "ui", "value"),
            Some(&Value::from("after"))
        );
    }

    #[tokio::test]
    async fn test_unknown_node_is_not_recorded() {
        let mut root = root();
        root.capture().unwrap();
        let err = root.set("ghost", "ui", "value", "x").await.unwrap_err();
        assert!(matches!(err, CaptureError::Tree(_)));
        assert!(root.log().is_empty());
    }

    #[tokio::test]
    async fn test_unpersistable_value_leaves_tree_untouched() {
        let mut root = root();
        root.capture().unwrap();
        let err = root.set("name", "ui", "width", f64::INFINITY).await.unwrap_err();
        assert!(matches!(err, CaptureError::UnpersistableValue { .. }));
        assert_eq!(root.tree().get("name", "ui", "width"), None);
    }

    #[tokio::test]
    async fn test_adopt_embedded_persists_and_resets_cursor() {
        let mut root = root();
        let store = root.store();
        store
            .store("app/mutation-recorder/cursor", "4")
            .await
            .unwrap();

        root.adopt_embedded(r#"[{"id":"name","cat":"ui","prop":"value","val":"Ada"}]"#)
            .await
            .unwrap();

        assert_eq!(root.log().len(), 1);
        assert_eq!(root.engine().load_cursor(store.as_ref()).await.unwrap(), 0);
        let report = root.replay().await.unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(
            root.tree().get("name", "ui", "value"),
            Some(&Value::from("Ada"))
        );
    }

    #[test]
    fn test_configured_seed_drives_ids() {
        let mut config = RuntimeConfig::default();
        config.ids.seed = Some(9);
        config.ids.length = 8;
        let mut a = Root::new("a", config.clone(), ScopedStorage::in_memory());
        let mut b = Root::new("b", config, ScopedStorage::in_memory());

        let id = a.tree_mut().create_node("div", None).unwrap();
        assert_eq!(id.len(), 8);
        assert_eq!(id, b.tree_mut().create_node("div", None).unwrap());
    }

    #[tokio::test]
    async fn test_with_ids_keeps_bridge() {
        let bridge = CountingBridge::default();
        let calls = bridge.calls.clone();
        let mut root = Root::new("app", RuntimeConfig::default(), ScopedStorage::in_memory())
            .with_bridge(Box::new(bridge))
            .with_ids(IdGenerator::reproducible(1))
            .unwrap();
        let id = root.tree_mut().create_node("input", None).unwrap();

        root.set_synced(&id, "ui", "value", "x").await.unwrap();
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn test_with_ids_refused_once_nodes_exist() {
        let err = root().with_ids(IdGenerator::reproducible(1)).unwrap_err();
        assert!(matches!(err, TreeError::GeneratorInUse { nodes: 1, .. }));
    }

    #[test]
    fn test_reseed_matches_roots_with_same_skeleton() {
        let mut server = root();
        let mut client = Root::new("app", RuntimeConfig::default(), ScopedStorage::in_memory())
            .with_ids(IdGenerator::reproducible(77))
            .unwrap();
        client.tree_mut().create_node("input", Some("name")).unwrap();

        assert_ne!(
            server.tree().ids().state().seed,
            client.tree().ids().state().seed
        );

        server.reseed_from_content();
        client.reseed_from_content();
        assert_eq!(
            server.tree_mut().create_node("span", None).unwrap(),
            client.tree_mut().create_node("span", None).unwrap()
        );
    }
}
