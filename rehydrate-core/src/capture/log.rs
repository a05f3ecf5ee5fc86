//! Mutation records and the bounded log that holds them
//!
//! Wire format: a JSON array of `{"id", "cat", "prop", "val", "sync"?}` objects
//! in observation order.

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Default maximum number of records a log accepts
pub const DEFAULT_CAPTURE_LIMIT: usize = 1_000_000;

/// One observed property change on one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    /// Target node
    #[serde(rename = "id")]
    pub node_id: String,

    /// Property category
    #[serde(rename = "cat")]
    pub category: String,

    /// Property name
    #[serde(rename = "prop")]
    pub property: String,

    /// New value
    #[serde(rename = "val")]
    pub value: Value,

    /// Whether the write went through the synced path
    #[serde(default, skip_serializing_if = "is_false")]
    pub sync: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl MutationRecord {
    /// Record for a direct write
    pub fn new(
        node_id: impl Into<String>,
        category: impl Into<String>,
        property: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            category: category.into(),
            property: property.into(),
            value: value.into(),
            sync: false,
        }
    }

    /// Mark the record as a synced write
    pub fn synced(mut self) -> Self {
        self.sync = true;
        self
    }
}

/// Why a log could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogDecodeError {
    /// The blob is not a JSON array
    #[error("mutation log is not a JSON array: {0}")]
    NotAnArray(String),

    /// One entry is malformed
    #[error("entry {index}: {reason}")]
    Entry { index: usize, reason: String },

    /// The blob holds more entries than the log accepts
    #[error("log holds {len} entries, limit is {limit}")]
    OverLimit { len: usize, limit: usize },
}

/// Result of an append attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Stored at this index
    Appended(usize),

    /// Refused because the log is full
    Dropped,
}

/// Ordered, append-only, bounded sequence of mutation records.
///
/// Once full, appends are refused rather than rotating out old entries.
/// Two logs are equal when they hold the same records; the limit is a
/// capacity setting and takes no part in equality.
#[derive(Debug, Clone)]
pub struct MutationLog {
    records: Vec<MutationRecord>,
    limit: usize,
}

impl PartialEq for MutationLog {
    fn eq(&self, other: &Self) -> bool {
        self.records == other.records
    }
}

impl Default for MutationLog {
    fn default() -> Self {
        Self::with_limit(DEFAULT_CAPTURE_LIMIT)
    }
}

impl MutationLog {
    /// Empty log with the default limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty log with a custom limit
    pub fn with_limit(limit: usize) -> Self {
        Self {
            records: Vec::new(),
            limit,
        }
    }

    /// Maximum number of records
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether further appends will be dropped
    pub fn is_full(&self) -> bool {
        self.records.len() >= self.limit
    }

    /// Record at `index`
    pub fn get(&self, index: usize) -> Option<&MutationRecord> {
        self.records.get(index)
    }

    /// Records in observation order
    pub fn records(&self) -> &[MutationRecord] {
        &self.records
    }

    /// Iterate records in observation order
    pub fn iter(&self) -> impl Iterator<Item = &MutationRecord> {
        self.records.iter()
    }

    /// Append a record unless the log is full
    pub fn push(&mut self, record: MutationRecord) -> AppendOutcome {
        if self.is_full() {
            return AppendOutcome::Dropped;
        }
        self.records.push(record);
        AppendOutcome::Appended(self.records.len() - 1)
    }

    /// Drop records from `len` onward
    pub(crate) fn truncate(&mut self, len: usize) {
        self.records.truncate(len);
    }

    /// Remove every record
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Serialize to the JSON wire format
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.records)
    }

    /// Decode the JSON wire format. Each entry is validated on its own so the
    /// error names the first bad index.
    pub fn from_json(blob: &str, limit: usize) -> std::result::Result<Self, LogDecodeError> {
        let entries: Vec<serde_json::Value> =
            serde_json::from_str(blob).map_err(|e| LogDecodeError::NotAnArray(e.to_string()))?;
        if entries.len() > limit {
            return Err(LogDecodeError::OverLimit {
                len: entries.len(),
                limit,
            });
        }

        let records = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                serde_json::from_value::<MutationRecord>(entry).map_err(|e| {
                    LogDecodeError::Entry {
                        index,
                        reason: e.to_string(),
                    }
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Self { records, limit })
    }
}

impl<'a> IntoIterator for &'a MutationLog {
    type Item = &'a MutationRecord;
    type IntoIter = std::slice::Iter<'a, MutationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
