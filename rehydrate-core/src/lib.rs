//! # Rehydrate - mutation capture and replay for reactive UI trees
//!
//! Rehydrate records property mutations made to a live UI tree and replays
//! them, in order, onto a freshly constructed tree. A server renders and
//! captures; the client rebuilds the same tree and replays the log before any
//! user interaction, so it resumes exactly where the server stopped.
//!
//! - Reproducible node identifiers so both construction passes agree
//! - A bounded, append-only mutation log written through to storage
//! - A replay engine with a persisted cursor for resume-after-crash
//! - A lifecycle coordinator choosing between replay and fresh capture
//! - Lifecycle hooks for subsystems that must not overlap with replay
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rehydrate_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = RuntimeConfig::load()?;
//!     let mut root = Root::new("app", config, ScopedStorage::in_memory());
//!     root.tree_mut().create_node("input", Some("name"))?;
//!
//!     let mut lifecycle = LifecycleCoordinator::new();
//!     if lifecycle.boot(&mut root, BootSignals::default()).await? == LifecycleState::ReplayPending {
//!         lifecycle.begin_transition(&mut root).await?;
//!     }
//!
//!     root.set("name", "ui", "value", "Ada").await?;
//!     Ok(())
//! }
//! ```

pub mod capture;
pub mod config;
pub mod embed;
pub mod error;
pub mod events;
pub mod ids;
pub mod lifecycle;
pub mod registry;
pub mod replay;
pub mod root;
pub mod storage;
pub mod tree;
pub mod value;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use error::{RehydrateError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::capture::{
        CaptureError, MutationLog, MutationRecord, MutationRecorder, RecordOutcome,
    };
    pub use crate::config::{CaptureConfig, IdConfig, ReplayConfig, RuntimeConfig, StorageConfig};
    pub use crate::error::{RehydrateError, Result};
    pub use crate::events::{HookControl, HookRegistry, LifecycleEvent, SubscriptionHandle};
    pub use crate::ids::{GeneratorError, IdGenerator};
    pub use crate::lifecycle::{BootSignals, LifecycleCoordinator, LifecycleError, LifecycleState};
    pub use crate::registry::RootRegistry;
    pub use crate::replay::{Navigator, NoNavigation, ReplayEngine, ReplayError, ReplayReport};
    pub use crate::root::Root;
    pub use crate::storage::{
        FileStore, KeyValueStore, MemoryStore, ScopedStorage, StorageError, StorageScope,
    };
    pub use crate::tree::{NativeBridge, NodeId, UiTree, WritePath};
    pub use crate::value::Value;
}
