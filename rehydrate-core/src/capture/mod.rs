//! Mutation capture: the bounded log and the recorder that fills it
//!
//! The recorder observes property writes on a tree while the root is in
//! capture mode and appends them to a [`MutationLog`], writing the whole log
//! through to storage after every append so an unexpected reload keeps what
//! was already captured.

mod log;
mod recorder;

pub use log::{AppendOutcome, DEFAULT_CAPTURE_LIMIT, LogDecodeError, MutationLog, MutationRecord};
pub use recorder::{MutationRecorder, RecordOutcome};

use crate::storage::StorageError;
use crate::tree::TreeError;

/// Errors raised by the recorder
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// Capture was enabled twice on the same root; a lifecycle bug
    #[error("Capture already active on root '{root}'")]
    DoubleCaptureAttempt { root: String },

    /// Capture was requested while a replay is running
    #[error("Cannot capture on root '{root}' while replay is in progress")]
    ReplayInProgress { root: String },

    /// The value cannot be represented in the persisted log
    #[error("Value for {node_id}.{category}.{property} cannot be persisted")]
    UnpersistableValue {
        node_id: String,
        category: String,
        property: String,
    },

    /// Tree rejected the operation
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Write-through failed
    #[error("Capture persistence failed: {0}")]
    Storage(#[from] StorageError),

    /// The log could not be serialized
    #[error("Capture serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CaptureError {
    /// Whether the error is a programming defect that halts the tree
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CaptureError::DoubleCaptureAttempt { .. }
                | CaptureError::Tree(TreeError::TreeHalted { .. })
        )
    }
}
