//! The live UI tree that mutations are captured from and replayed onto
//!
//! A [`UiTree`] is a registry of named [`Node`]s under one root identity. It
//! holds the root's [`ModeFlags`], dispatches property watchers, and forwards
//! synced writes to the native layer through a [`NativeBridge`].

mod node;

pub use node::{Node, NodeId};

use crate::events::HookControl;
use crate::ids::IdGenerator;
use crate::value::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Errors raised by tree operations
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// A node with this ID is already registered
    #[error("Duplicate node id: {id}")]
    DuplicateNode { id: String },

    /// No node with this ID is registered
    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    /// The identifier generator was swapped after nodes were created
    #[error("Tree '{root}' already holds {nodes} nodes; its generator cannot be replaced")]
    GeneratorInUse { root: String, nodes: usize },

    /// The tree stopped after a fatal error and accepts no further work
    #[error("Tree '{root}' is halted: {reason}")]
    TreeHalted { root: String, reason: String },
}

/// Capture/replay mode of a tree root.
///
/// `capturing` and `replaying` are never both set; both clear means idle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeFlags {
    capturing: bool,
    replaying: bool,
}

impl ModeFlags {
    /// Mutations are being logged
    pub fn capturing(&self) -> bool {
        self.capturing
    }

    /// A log is being applied
    pub fn replaying(&self) -> bool {
        self.replaying
    }

    /// Neither capturing nor replaying
    pub fn is_idle(&self) -> bool {
        !self.capturing && !self.replaying
    }
}

/// Route a write takes into the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePath {
    /// Update the stored value and notify watchers
    Direct,

    /// Also push the value to the native layer
    Synced,
}

/// Native-layer collaborator (e.g. the DOM connection).
///
/// Only synced writes reach it.
pub trait NativeBridge: Send {
    /// Mirror a property value onto the native node
    fn sync_property(&mut self, node_id: &str, category: &str, property: &str, value: &Value);
}

/// Notification delivered to property watchers
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyChange {
    /// Node that changed
    pub node_id: NodeId,

    /// Property category
    pub category: String,

    /// Property name
    pub property: String,

    /// Value before the write, if any
    pub previous: Option<Value>,

    /// Value after the write
    pub value: Value,

    /// Write path taken
    pub path: WritePath,

    /// Whether the write comes from replay rather than live interaction
    pub replaying: bool,
}

/// Handle returned by [`UiTree::watch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchHandle(u64);

type WatchHandler = Box<dyn FnMut(&PropertyChange) -> HookControl + Send>;

struct Watcher {
    handle: WatchHandle,
    node_id: NodeId,
    category: String,
    property: String,
    handler: WatchHandler,
}

/// A tree of named UI nodes under one root
pub struct UiTree {
    root: String,
    nodes: BTreeMap<NodeId, Node>,
    ids: IdGenerator,
    flags: ModeFlags,
    halted: Option<String>,
    watchers: Vec<Watcher>,
    next_watch: u64,
    bridge: Option<Box<dyn NativeBridge>>,
}

impl UiTree {
    /// Create an empty tree. `ids` names nodes created without an explicit name.
    pub fn new(root: impl Into<String>, ids: IdGenerator) -> Self {
        Self {
            root: root.into(),
            nodes: BTreeMap::new(),
            ids,
            flags: ModeFlags::default(),
            halted: None,
            watchers: Vec::new(),
            next_watch: 0,
            bridge: None,
        }
    }

    /// Attach the native-layer collaborator
    pub fn with_bridge(mut self, bridge: Box<dyn NativeBridge>) -> Self {
        self.bridge = Some(bridge);
        self
    }

    /// Root identity
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Current mode flags
    pub fn flags(&self) -> ModeFlags {
        self.flags
    }

    /// Identifier generator backing unnamed nodes
    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    /// Replace the identifier generator. Fails once any node exists; the bridge
    /// and watchers are kept.
    pub fn set_ids(&mut self, ids: IdGenerator) -> std::result::Result<(), TreeError> {
        if !self.nodes.is_empty() {
            return Err(TreeError::GeneratorInUse {
                root: self.root.clone(),
                nodes: self.nodes.len(),
            });
        }
        self.ids = ids;
        Ok(())
    }

    /// Reseed the generator from [`UiTree::content_hash`], keeping its length.
    ///
    /// Call after the explicitly named skeleton is built: two trees with the
    /// same skeleton then generate the same identifiers for the nodes that follow.
    pub fn reseed_from_content(&mut self) {
        let length = self.ids.length();
        self.ids = IdGenerator::from_content(self.content_hash()).with_length(length);
        tracing::debug!(root = %self.root, nodes = self.nodes.len(), "Generator reseeded from content");
    }

    /// Register a node. Without `name`, the next generated identifier is used.
    pub fn create_node(
        &mut self,
        tag: impl Into<String>,
        name: Option<&str>,
    ) -> std::result::Result<NodeId, TreeError> {
        let id = match name {
            Some(name) => name.to_string(),
            None => self.ids.next_id(),
        };
        if self.nodes.contains_key(&id) {
            return Err(TreeError::DuplicateNode { id });
        }
        self.nodes.insert(id.clone(), Node::new(id.clone(), tag));
        Ok(id)
    }

    /// Unregister a node and its watchers
    pub fn remove_node(&mut self, id: &str) -> Option<Node> {
        self.watchers.retain(|w| w.node_id != id);
        self.nodes.remove(id)
    }

    /// Whether `id` is registered
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Look up a node
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Registered nodes in ID order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Number of registered nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no nodes are registered
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Current value of a node property
    pub fn get(&self, id: &str, category: &str, property: &str) -> Option<&Value> {
        self.nodes.get(id)?.get(category, property)
    }

    /// Set a property and notify watchers. Returns the previous value.
    pub fn write(
        &mut self,
        id: &str,
        category: &str,
        property: &str,
        value: Value,
        path: WritePath,
    ) -> std::result::Result<Option<Value>, TreeError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| TreeError::NodeNotFound { id: id.to_string() })?;

        let replaying = node.is_replaying() || self.flags.replaying;
        let previous = node.put(category, property, value.clone());

        if path == WritePath::Synced
            && let Some(bridge) = self.bridge.as_mut()
        {
            bridge.sync_property(id, category, property, &value);
        }

        let change = PropertyChange {
            node_id: id.to_string(),
            category: category.to_string(),
            property: property.to_string(),
            previous: previous.clone(),
            value,
            path,
            replaying,
        };
        self.notify(&change);

        Ok(previous)
    }

    fn notify(&mut self, change: &PropertyChange) {
        self.watchers.retain_mut(|w| {
            if w.node_id != change.node_id
                || w.category != change.category
                || w.property != change.property
            {
                return true;
            }
            (w.handler)(change) == HookControl::Continue
        });
    }

    /// Watch one property of one node. Handlers run in registration order.
    pub fn watch<F>(
        &mut self,
        id: &str,
        category: &str,
        property: &str,
        handler: F,
    ) -> std::result::Result<WatchHandle, TreeError>
    where
        F: FnMut(&PropertyChange) -> HookControl + Send + 'static,
    {
        if !self.nodes.contains_key(id) {
            return Err(TreeError::NodeNotFound { id: id.to_string() });
        }
        let handle = WatchHandle(self.next_watch);
        self.next_watch += 1;
        self.watchers.push(Watcher {
            handle,
            node_id: id.to_string(),
            category: category.to_string(),
            property: property.to_string(),
            handler: Box::new(handler),
        });
        Ok(handle)
    }

    /// Remove a watcher. Returns false if it was already gone.
    pub fn unwatch(&mut self, handle: WatchHandle) -> bool {
        let before = self.watchers.len();
        self.watchers.retain(|w| w.handle != handle);
        self.watchers.len() != before
    }

    /// Hex SHA-256 over node IDs and tags in ID order.
    ///
    /// Structurally identical trees hash identically. [`UiTree::reseed_from_content`]
    /// seeds the generator from it.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.root.as_bytes());
        for node in self.nodes.values() {
            hasher.update([0u8]);
            hasher.update(node.id().as_bytes());
            hasher.update([0u8]);
            hasher.update(node.tag().as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Reason the tree was halted, if it was
    pub fn halted(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    /// Fail if the tree is halted
    pub fn ensure_live(&self) -> std::result::Result<(), TreeError> {
        match &self.halted {
            Some(reason) => Err(TreeError::TreeHalted {
                root: self.root.clone(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    pub(crate) fn halt(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::error!(root = %self.root, reason = %reason, "Tree halted");
        self.flags = ModeFlags::default();
        self.halted = Some(reason);
    }

    pub(crate) fn set_capturing(&mut self, capturing: bool) {
        debug_assert!(!(capturing && self.flags.replaying));
        self.flags.capturing = capturing;
    }

    pub(crate) fn set_replaying(&mut self, replaying: bool) {
        if replaying {
            self.flags.capturing = false;
        }
        self.flags.replaying = replaying;
    }

    pub(crate) fn set_node_replaying(&mut self, id: &str, replaying: bool) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.set_replaying(replaying);
        }
    }
}

impl std::fmt::Debug for UiTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiTree")
            .field("root", &self.root)
            .field("nodes", &self.nodes.len())
            .field("flags", &self.flags)
            .field("halted", &self.halted)
            .field("watchers", &self.watchers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn tree() -> UiTree {
        UiTree::new("app", IdGenerator::reproducible(1))
    }

    #[derive(Clone, Default)]
    struct RecordingBridge {
        synced: Arc<Mutex<Vec<(String, String, String, Value)>>>,
    }

    impl NativeBridge for RecordingBridge {
        fn sync_property(&mut self, node_id: &str, category: &str, property: &str, value: &Value) {
            self.synced.lock().unwrap().push((
                node_id.to_string(),
                category.to_string(),
                property.to_string(),
                value.clone(),
            ));
        }
    }

    #[test]
    fn test_unnamed_nodes_follow_generator() {
        let mut a = tree();
        let mut b = tree();
        let first = a.create_node("div", None).unwrap();
        let second = a.create_node("div", None).unwrap();
        assert_eq!(first, b.create_node("div", None).unwrap());
        assert_eq!(second, b.create_node("div", None).unwrap());
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn test_set_ids_keeps_bridge_and_refuses_after_nodes() {
        let bridge = RecordingBridge::default();
        let synced = bridge.synced.clone();
        let mut tree = tree().with_bridge(Box::new(bridge));
        tree.set_ids(IdGenerator::reproducible(5).with_length(6))
            .unwrap();

        let id = tree.create_node("input", None).unwrap();
        assert_eq!(id.len(), 6);
        tree.write(&id, "ui", "value", Value::from("a"), WritePath::Synced)
            .unwrap();
        assert_eq!(synced.lock().unwrap().len(), 1);

        let err = tree.set_ids(IdGenerator::reproducible(6)).unwrap_err();
        assert!(matches!(err, TreeError::GeneratorInUse { nodes: 1, .. }));
        assert!(tree.contains(&id));
    }

    #[test]
    fn test_reseed_from_content_follows_skeleton() {
        let skeleton = |seed: u64, extra: Option<&str>| {
            let mut tree = UiTree::new("app", IdGenerator::reproducible(seed).with_length(12));
            tree.create_node("header", Some("top")).unwrap();
            if let Some(name) = extra {
                tree.create_node("footer", Some(name)).unwrap();
            }
            tree.reseed_from_content();
            tree
        };

        let mut server = skeleton(1, None);
        let mut client = skeleton(2, None);
        let mut drifted = skeleton(1, Some("bottom"));

        let id = server.create_node("div", None).unwrap();
        assert_eq!(id.len(), 12);
        assert_eq!(id, client.create_node("div", None).unwrap());
        assert_ne!(id, drifted.create_node("div", None).unwrap());

        let mut unseeded = UiTree::new("app", IdGenerator::reproducible(1).with_length(12));
        unseeded.create_node("header", Some("top")).unwrap();
        assert_ne!(id, unseeded.create_node("div", None).unwrap());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut tree = tree();
        tree.create_node("button", Some("save")).unwrap();
        let err = tree.create_node("button", Some("save")).unwrap_err();
        assert!(matches!(err, TreeError::DuplicateNode { .. }));
    }

    #[test]
    fn test_write_requires_registered_node() {
        let mut tree = tree();
        let err = tree
            .write("ghost", "ui", "text", Value::from("x"), WritePath::Direct)
            .unwrap_err();
        assert!(matches!(err, TreeError::NodeNotFound { .. }));
    }

    #[test]
    fn test_synced_writes_reach_bridge() {
        let bridge = RecordingBridge::default();
        let synced = bridge.synced.clone();
        let mut tree = tree().with_bridge(Box::new(bridge));
        tree.create_node("input", Some("name")).unwrap();

        tree.write("name", "ui", "value", Value::from("a"), WritePath::Direct)
            .unwrap();
        tree.write("name", "ui", "value", Value::from("b"), WritePath::Synced)
            .unwrap();

        let synced = synced.lock().unwrap();
        assert_eq!(synced.len(), 1);
        assert_eq!(synced[0].3, Value::from("b"));
    }

    #[test]
    fn test_watchers_fire_in_order_and_unsubscribe() {
        let mut tree = tree();
        tree.create_node("span", Some("label")).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = seen.clone();
        tree.watch("label", "ui", "text", move |change| {
            first.lock().unwrap().push(format!("first:{}", change.value));
            HookControl::Unsubscribe
        })
        .unwrap();
        let second = seen.clone();
        let handle = tree
            .watch("label", "ui", "text", move |change| {
                second.lock().unwrap().push(format!("second:{}", change.value));
                HookControl::Continue
            })
            .unwrap();

        tree.write("label", "ui", "text", Value::from("A"), WritePath::Direct)
            .unwrap();
        tree.write("label", "ui", "text", Value::from("B"), WritePath::Direct)
            .unwrap();
        assert!(tree.unwatch(handle));
        tree.write("label", "ui", "text", Value::from("C"), WritePath::Direct)
            .unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["first:\"A\"", "second:\"A\"", "second:\"B\""]
        );
    }

    #[test]
    fn test_replaying_node_is_visible_to_watchers() {
        let mut tree = tree();
        tree.create_node("select", Some("country")).unwrap();
        let fetches = Arc::new(Mutex::new(0));

        let counter = fetches.clone();
        tree.watch("country", "data", "selected", move |change| {
            if !change.replaying {
                *counter.lock().unwrap() += 1;
            }
            HookControl::Continue
        })
        .unwrap();

        tree.set_node_replaying("country", true);
        tree.write("country", "data", "selected", Value::from("fr"), WritePath::Direct)
            .unwrap();
        tree.set_node_replaying("country", false);
        tree.write("country", "data", "selected", Value::from("de"), WritePath::Direct)
            .unwrap();

        assert_eq!(*fetches.lock().unwrap(), 1);
    }

    #[test]
    fn test_flags_stay_exclusive() {
        let mut tree = tree();
        tree.set_capturing(true);
        tree.set_replaying(true);
        assert!(tree.flags().replaying());
        assert!(!tree.flags().capturing());
        tree.set_replaying(false);
        assert!(tree.flags().is_idle());
    }

    #[test]
    fn test_halt_blocks_further_work() {
        let mut tree = tree();
        tree.set_capturing(true);
        tree.halt("double capture");
        assert!(tree.flags().is_idle());
        assert!(matches!(
            tree.ensure_live(),
            Err(TreeError::TreeHalted { .. })
        ));
    }
}
