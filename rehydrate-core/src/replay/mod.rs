//! Deterministic replay of a persisted mutation log
//!
//! The replay engine re-applies [`MutationRecord`](crate::capture::MutationRecord)s
//! to a freshly constructed tree, strictly in log order, starting from the
//! persisted cursor. The cursor is advanced and persisted after each record, so
//! a crash mid-replay resumes where it stopped. Re-applying a record is always
//! safe because property writes are last-write-wins on a single key.
//!
//! # Example
//!
//! ```rust,no_run
//! use rehydrate_core::capture::MutationLog;
//! use rehydrate_core::config::ReplayConfig;
//! use rehydrate_core::events::HookRegistry;
//! use rehydrate_core::ids::IdGenerator;
//! use rehydrate_core::replay::{NoNavigation, ReplayEngine};
//! use rehydrate_core::storage::{MemoryStore, StorageKeys};
//! use rehydrate_core::tree::UiTree;
//!
//! # async fn example(log: MutationLog) -> rehydrate_core::Result<()> {
//! let store = MemoryStore::new();
//! let mut tree = UiTree::new("app", IdGenerator::reproducible(7));
//! let mut hooks = HookRegistry::new();
//!
//! let engine = ReplayEngine::new(ReplayConfig::default(), StorageKeys::for_root("app"));
//! let report = engine
//!     .replay(&mut tree, &log, &store, &mut NoNavigation, &mut hooks)
//!     .await?;
//! println!("applied {} records", report.applied);
//! # Ok(())
//! # }
//! ```

mod engine;

pub use engine::{Navigator, NoNavigation, ReplayEngine, ReplayReport};

use crate::capture::LogDecodeError;
use crate::storage::StorageError;
use crate::tree::TreeError;

/// Errors raised while replaying a mutation log
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// A record names a node the tree does not contain. The cursor stays at `index`.
    #[error("Replay target '{node_id}' of record {index} not found")]
    MissingReplayTarget { index: usize, node_id: String },

    /// A persisted record cannot be applied
    #[error("Malformed log entry {index}: {reason}")]
    MalformedLogEntry { index: usize, reason: String },

    /// The persisted log as a whole is unreadable
    #[error("Malformed mutation log: {reason}")]
    MalformedLog { reason: String },

    /// The persisted cursor is not a record index
    #[error("Corrupt replay cursor: {blob:?}")]
    CorruptCursor { blob: String },

    /// The root is capturing; replay would interleave with logging
    #[error("Cannot replay '{root}' while capture is active")]
    CaptureActive { root: String },

    /// A replay of this root is already running
    #[error("Replay of '{root}' is already in progress")]
    AlreadyReplaying { root: String },

    /// Tree operation failed
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Persistence collaborator failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ReplayError {
    /// Whether the error indicates corrupt persisted state or a halted tree.
    ///
    /// `MissingReplayTarget` is recoverable by the caller.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ReplayError::MalformedLogEntry { .. }
                | ReplayError::MalformedLog { .. }
                | ReplayError::CorruptCursor { .. }
                | ReplayError::Tree(TreeError::TreeHalted { .. })
        )
    }
}

impl From<LogDecodeError> for ReplayError {
    fn from(err: LogDecodeError) -> Self {
        match err {
            LogDecodeError::Entry { index, reason } => {
                ReplayError::MalformedLogEntry { index, reason }
            }
            other => ReplayError::MalformedLog {
                reason: other.to_string(),
            },
        }
    }
}
