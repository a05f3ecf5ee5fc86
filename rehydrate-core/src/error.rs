//! Error types for Rehydrate operations
//!
//! Each subsystem owns a focused error enum (see [`crate::capture::CaptureError`],
//! [`crate::replay::ReplayError`] and friends). [`RehydrateError`] folds them into
//! one type for callers that do not care which component failed.

use crate::capture::CaptureError;
use crate::ids::GeneratorError;
use crate::lifecycle::LifecycleError;
use crate::replay::ReplayError;
use crate::storage::StorageError;
use crate::tree::TreeError;

/// Result type for Rehydrate operations
pub type Result<T> = std::result::Result<T, RehydrateError>;

/// Error types for the Rehydrate runtime
#[derive(Debug, thiserror::Error)]
pub enum RehydrateError {
    /// Identifier generator construction failed
    #[error(transparent)]
    Generator(#[from] GeneratorError),

    /// UI tree operation failed
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Mutation capture failed
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Replay failed
    #[error(transparent)]
    Replay(#[from] ReplayError),

    /// Persistence collaborator failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Lifecycle transition failed
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl RehydrateError {
    /// Whether this error leaves the tree in a state that cannot continue.
    ///
    /// Fatal errors are programming defects or persisted-state corruption.
    /// `MissingReplayTarget` is deliberately not fatal: the embedding application
    /// may discard the log and boot fresh.
    pub fn is_fatal(&self) -> bool {
        match self {
            RehydrateError::Generator(_) => true,
            RehydrateError::Tree(err) => matches!(err, TreeError::TreeHalted { .. }),
            RehydrateError::Capture(err) => err.is_fatal(),
            RehydrateError::Replay(err) => err.is_fatal(),
            RehydrateError::Lifecycle(LifecycleError::Capture(err)) => err.is_fatal(),
            RehydrateError::Lifecycle(LifecycleError::Replay(err)) => err.is_fatal(),
            _ => false,
        }
    }
}

impl From<String> for RehydrateError {
    fn from(s: String) -> Self {
        RehydrateError::Other(s)
    }
}

impl From<&str> for RehydrateError {
    fn from(s: &str) -> Self {
        RehydrateError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for RehydrateError {
    fn from(err: anyhow::Error) -> Self {
        RehydrateError::Other(err.to_string())
    }
}
