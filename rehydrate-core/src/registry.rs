//! Explicit association from root identity to its [`Root`]

use crate::root::Root;
use std::collections::HashMap;

/// Roots keyed by name
#[derive(Debug, Default)]
pub struct RootRegistry {
    roots: HashMap<String, Root>,
}

impl RootRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `root` under its name, returning any root it replaces
    pub fn insert(&mut self, root: Root) -> Option<Root> {
        let name = root.name().to_string();
        let previous = self.roots.insert(name.clone(), root);
        if previous.is_some() {
            tracing::warn!(root = %name, "Replaced registered root");
        }
        previous
    }

    /// Look up a root
    pub fn get(&self, name: &str) -> Option<&Root> {
        self.roots.get(name)
    }

    /// Look up a root mutably
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Root> {
        self.roots.get_mut(name)
    }

    /// Unregister a root
    pub fn remove(&mut self, name: &str) -> Option<Root> {
        self.roots.remove(name)
    }

    /// Whether a root is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.roots.contains_key(name)
    }

    /// Registered root names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.roots.keys().map(String::as_str)
    }

    /// Number of registered roots
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Whether no roots are registered
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}
