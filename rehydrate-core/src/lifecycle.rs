//! Boot-time state machine deciding between replay and fresh capture
//!
//! ```text
//! Booting ──log found──▶ ReplayPending ──begin_transition──▶ Replaying ──ok──▶ Live
//!    │                                                           │
//!    └──no log──▶ Live                                            └──err──▶ ReplayFailed
//! ```
//!
//! `ReplayFailed` is terminal unless the application calls
//! [`LifecycleCoordinator::restart_fresh`].

use crate::capture::CaptureError;
use crate::replay::ReplayError;
use crate::root::Root;
use crate::storage::StorageError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of one root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Constructed, boot not yet run
    Booting,

    /// A log was found and awaits the state-transition hook
    ReplayPending,

    /// The log is being applied
    Replaying,

    /// Capturing live interaction
    Live,

    /// Replay failed; waiting for the application to decide
    ReplayFailed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Booting => "booting",
            LifecycleState::ReplayPending => "replay_pending",
            LifecycleState::Replaying => "replaying",
            LifecycleState::Live => "live",
            LifecycleState::ReplayFailed => "replay_failed",
        };
        f.write_str(name)
    }
}

/// Errors raised by lifecycle transitions
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The requested action is not valid in the current state
    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        state: LifecycleState,
        action: &'static str,
    },

    /// Starting capture failed
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Replay failed
    #[error(transparent)]
    Replay(#[from] ReplayError),

    /// Persistence collaborator failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What the host observed at startup
#[derive(Debug, Clone, Default)]
pub struct BootSignals {
    /// Log payload extracted from server-rendered markup
    pub embedded_log: Option<String>,
}

impl BootSignals {
    /// Boot with a log handed over in markup
    pub fn embedded(blob: impl Into<String>) -> Self {
        Self {
            embedded_log: Some(blob.into()),
        }
    }
}

/// Drives one root through boot, replay, and live capture
#[derive(Debug)]
pub struct LifecycleCoordinator {
    state: LifecycleState,
}

impl Default for LifecycleCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleCoordinator {
    /// Coordinator in the `Booting` state
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Booting,
        }
    }

    /// Current state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    fn transition(&mut self, root: &Root, next: LifecycleState) {
        tracing::info!(root = root.name(), from = %self.state, to = %next, "Lifecycle transition");
        self.state = next;
    }

    /// Decide between replay and fresh capture.
    ///
    /// An embedded log wins over one in storage. An empty log counts as none.
    /// A log that fails to decode moves the root to `ReplayFailed`.
    pub async fn boot(
        &mut self,
        root: &mut Root,
        signals: BootSignals,
    ) -> std::result::Result<LifecycleState, LifecycleError> {
        if self.state != LifecycleState::Booting {
            return Err(LifecycleError::InvalidTransition {
                state: self.state,
                action: "boot",
            });
        }

        let found = match signals.embedded_log {
            Some(blob) => {
                tracing::debug!(root = root.name(), "Adopting embedded mutation log");
                root.adopt_embedded(&blob).await.map(|()| true)
            }
            None => root.load_persisted().await,
        };
        let found = match found {
            Ok(found) => found,
            Err(err) => {
                tracing::error!(root = root.name(), error = %err, "Persisted log unreadable");
                self.transition(root, LifecycleState::ReplayFailed);
                return Err(err.into());
            }
        };

        if found && !root.log().is_empty() {
            self.transition(root, LifecycleState::ReplayPending);
        } else {
            root.capture()?;
            self.transition(root, LifecycleState::Live);
        }
        Ok(self.state)
    }

    /// The "begin state transition" hook: replay the pending log, then go live.
    pub async fn begin_transition(
        &mut self,
        root: &mut Root,
    ) -> std::result::Result<LifecycleState, LifecycleError> {
        if self.state != LifecycleState::ReplayPending {
            return Err(LifecycleError::InvalidTransition {
                state: self.state,
                action: "begin transition",
            });
        }

        self.transition(root, LifecycleState::Replaying);
        match root.replay().await {
            Ok(report) => {
                tracing::debug!(root = root.name(), applied = report.applied, "Replay finished");
                root.capture()?;
                self.transition(root, LifecycleState::Live);
                Ok(self.state)
            }
            Err(err) => {
                tracing::error!(root = root.name(), error = %err, fatal = err.is_fatal(), "Replay failed");
                self.transition(root, LifecycleState::ReplayFailed);
                Err(err.into())
            }
        }
    }

    /// Discard the log and start capturing from scratch after a failed replay
    pub async fn restart_fresh(
        &mut self,
        root: &mut Root,
    ) -> std::result::Result<LifecycleState, LifecycleError> {
        if self.state != LifecycleState::ReplayFailed {
            return Err(LifecycleError::InvalidTransition {
                state: self.state,
                action: "restart fresh",
            });
        }

        root.clear().await?;
        root.capture()?;
        self.transition(root, LifecycleState::Live);
        Ok(self.state)
    }
}
