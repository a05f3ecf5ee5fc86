//! UI nodes and their property storage

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Node identifier; either an explicit name or a generated identifier
pub type NodeId = String;

/// A named node in the UI tree.
///
/// Properties are grouped by category (`"ui"`, `"data"`, ...), each category
/// mapping property names to their current value. Writes are last-write-wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    id: NodeId,
    tag: String,
    properties: BTreeMap<String, BTreeMap<String, Value>>,
    #[serde(skip)]
    replaying: bool,
}

impl Node {
    pub(crate) fn new(id: NodeId, tag: impl Into<String>) -> Self {
        Self {
            id,
            tag: tag.into(),
            properties: BTreeMap::new(),
            replaying: false,
        }
    }

    /// Node identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Element tag or component kind
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Current value of `(category, property)`
    pub fn get(&self, category: &str, property: &str) -> Option<&Value> {
        self.properties.get(category)?.get(property)
    }

    /// Categories with at least one property
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    /// All properties of one category
    pub fn category(&self, category: &str) -> Option<&BTreeMap<String, Value>> {
        self.properties.get(category)
    }

    /// Whether a replayed record is currently being applied to this node.
    ///
    /// Watchers with side effects (network fetches, focus changes) check this
    /// and stay quiet while it is set.
    pub fn is_replaying(&self) -> bool {
        self.replaying
    }

    pub(crate) fn set_replaying(&mut self, replaying: bool) {
        self.replaying = replaying;
    }

    pub(crate) fn put(&mut self, category: &str, property: &str, value: Value) -> Option<Value> {
        self.properties
            .entry(category.to_string())
            .or_default()
            .insert(property.to_string(), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_write_wins() {
        let mut node = Node::new("e1".to_string(), "span");
        assert_eq!(node.put("ui", "text", Value::from("A")), None);
        assert_eq!(
            node.put("ui", "text", Value::from("B")),
            Some(Value::from("A"))
        );
        assert_eq!(node.get("ui", "text"), Some(&Value::from("B")));
        assert_eq!(node.categories().collect::<Vec<_>>(), vec!["ui"]);
    }
}
