//! Persistence collaborator for mutation logs and replay cursors
//!
//! The engine only needs Load/Store/Clear on string blobs. Two scopes exist:
//! session-scoped data disappears with the session, durable-scoped data
//! survives it. The engine treats both the same; the caller picks one.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Logical namespace shared by the log and cursor keys
pub const RECORDER_NAMESPACE: &str = "mutation-recorder";

/// Leaf key holding the serialized log
pub const LOG_KEY: &str = "mutationlist";

/// Leaf key holding the replay cursor
pub const CURSOR_KEY: &str = "cursor";

/// Errors raised by a storage backend
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Underlying I/O failed
    #[error("Storage I/O error for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Backend-specific failure
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Key/value persistence contract
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Load the blob stored under `key`, if any
    async fn load(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store `blob` under `key`, replacing any previous value
    async fn store(&self, key: &str, blob: &str) -> StorageResult<()>;

    /// Remove `key`. Clearing a missing key succeeds.
    async fn clear(&self, key: &str) -> StorageResult<()>;
}

/// Which persistence scope a root uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageScope {
    /// Cleared at the end of the session
    #[default]
    Session,

    /// Survives across sessions
    Durable,
}

/// One backend per scope
#[derive(Clone)]
pub struct ScopedStorage {
    session: Arc<dyn KeyValueStore>,
    durable: Arc<dyn KeyValueStore>,
}

impl ScopedStorage {
    /// Combine explicit backends
    pub fn new(session: Arc<dyn KeyValueStore>, durable: Arc<dyn KeyValueStore>) -> Self {
        Self { session, durable }
    }

    /// Both scopes in memory (tests, server-side rendering)
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    /// In-memory session scope, file-backed durable scope under `dir`
    pub fn with_durable_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(FileStore::new(dir)))
    }

    /// Backend serving `scope`
    pub fn scope(&self, scope: StorageScope) -> Arc<dyn KeyValueStore> {
        match scope {
            StorageScope::Session => self.session.clone(),
            StorageScope::Durable => self.durable.clone(),
        }
    }
}

impl std::fmt::Debug for ScopedStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedStorage").finish_non_exhaustive()
    }
}

/// Storage keys for one tree root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    /// Key of the serialized mutation log
    pub log: String,

    /// Key of the replay cursor
    pub cursor: String,
}

impl StorageKeys {
    /// Keys for the root named `root`
    pub fn for_root(root: &str) -> Self {
        Self {
            log: format!("{root}/{RECORDER_NAMESPACE}/{LOG_KEY}"),
            cursor: format!("{root}/{RECORDER_NAMESPACE}/{CURSOR_KEY}"),
        }
    }
}
