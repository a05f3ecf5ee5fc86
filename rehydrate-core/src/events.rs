//! Lifecycle hooks for collaborators that must not overlap with replay
//!
//! Subsystems such as data-fetch suppression or scroll/focus restoration
//! subscribe to [`LifecycleEvent`]s. Handlers run synchronously, in registration
//! order, and decide for themselves whether to stay subscribed.
//!
//! # Example
//!
//! ```rust
//! use rehydrate_core::events::{HookControl, HookRegistry, LifecycleEvent};
//!
//! let mut hooks = HookRegistry::new();
//! let handle = hooks.subscribe(|event| {
//!     if let LifecycleEvent::ReplayCompleted { applied, .. } = event {
//!         println!("replayed {applied} mutations");
//!         return HookControl::Unsubscribe;
//!     }
//!     HookControl::Continue
//! });
//! assert!(hooks.is_subscribed(&handle));
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Signal emitted by the capture/replay lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// Replay is about to apply records starting at `from`
    ReplayStarted {
        root: String,
        from: usize,
        timestamp: DateTime<Utc>,
    },

    /// Replay reached the end of the log
    ReplayCompleted {
        root: String,
        applied: usize,
        timestamp: DateTime<Utc>,
    },

    /// Capture is active; subsequent mutations are logged
    CaptureStarted {
        root: String,
        timestamp: DateTime<Utc>,
    },
}

impl LifecycleEvent {
    /// Replay-started signal stamped with the current time
    pub fn replay_started(root: impl Into<String>, from: usize) -> Self {
        LifecycleEvent::ReplayStarted {
            root: root.into(),
            from,
            timestamp: Utc::now(),
        }
    }

    /// Replay-completed signal stamped with the current time
    pub fn replay_completed(root: impl Into<String>, applied: usize) -> Self {
        LifecycleEvent::ReplayCompleted {
            root: root.into(),
            applied,
            timestamp: Utc::now(),
        }
    }

    /// Capture-started signal stamped with the current time
    pub fn capture_started(root: impl Into<String>) -> Self {
        LifecycleEvent::CaptureStarted {
            root: root.into(),
            timestamp: Utc::now(),
        }
    }

    /// Root the event belongs to
    pub fn root(&self) -> &str {
        match self {
            LifecycleEvent::ReplayStarted { root, .. }
            | LifecycleEvent::ReplayCompleted { root, .. }
            | LifecycleEvent::CaptureStarted { root, .. } => root,
        }
    }

    /// Stable event name, used for logging
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::ReplayStarted { .. } => "replay_started",
            LifecycleEvent::ReplayCompleted { .. } => "replay_completed",
            LifecycleEvent::CaptureStarted { .. } => "capture_started",
        }
    }
}

/// What a handler wants after it ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookControl {
    /// Keep receiving events
    Continue,

    /// Remove this handler
    Unsubscribe,
}

/// Handle to a subscription (can be used to unsubscribe)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: Uuid,
}

impl SubscriptionHandle {
    fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }

    /// Get the subscription ID
    pub fn id(&self) -> &Uuid {
        &self.id
    }
}

type LifecycleHandler = Box<dyn FnMut(&LifecycleEvent) -> HookControl + Send>;

/// Registry for lifecycle hooks
#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<(SubscriptionHandle, LifecycleHandler)>,
}

impl HookRegistry {
    /// Create a new hook registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; it runs after every handler registered before it
    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionHandle
    where
        F: FnMut(&LifecycleEvent) -> HookControl + Send + 'static,
    {
        let handle = SubscriptionHandle::new();
        self.hooks.push((handle.clone(), Box::new(handler)));
        handle
    }

    /// Remove a handler. Returns false if it was already gone.
    pub fn unsubscribe(&mut self, handle: &SubscriptionHandle) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|(h, _)| h != handle);
        self.hooks.len() != before
    }

    /// Whether `handle` is still registered
    pub fn is_subscribed(&self, handle: &SubscriptionHandle) -> bool {
        self.hooks.iter().any(|(h, _)| h == handle)
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether no handlers are registered
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Deliver `event` to every handler in registration order
    pub fn emit(&mut self, event: &LifecycleEvent) {
        tracing::debug!(event = event.name(), root = event.root(), "Lifecycle event");
        self.hooks
            .retain_mut(|(_, handler)| handler(event) == HookControl::Continue);
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

/// Handler that logs every lifecycle event at info level
pub fn logging_hook(event: &LifecycleEvent) -> HookControl {
    match event {
        LifecycleEvent::ReplayStarted { root, from, .. } => {
            tracing::info!(root = %root, from, "Replay started");
        }
        LifecycleEvent::ReplayCompleted { root, applied, .. } => {
            tracing::info!(root = %root, applied, "Replay completed");
        }
        LifecycleEvent::CaptureStarted { root, .. } => {
            tracing::info!(root = %root, "Capture started");
        }
    }
    HookControl::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_handlers_run_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut hooks = HookRegistry::new();

        for name in ["first", "second", "third"] {
            let order = order.clone();
            hooks.subscribe(move |_| {
                order.lock().unwrap().push(name);
                HookControl::Continue
            });
        }

        hooks.emit(&LifecycleEvent::capture_started("app"));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_handler_can_unsubscribe_itself() {
        let calls = Arc::new(Mutex::new(0));
        let mut hooks = HookRegistry::new();

        let counter = calls.clone();
        let handle = hooks.subscribe(move |event| {
            *counter.lock().unwrap() += 1;
            if matches!(event, LifecycleEvent::ReplayCompleted { .. }) {
                HookControl::Unsubscribe
            } else {
                HookControl::Continue
            }
        });

        hooks.emit(&LifecycleEvent::replay_started("app", 0));
        hooks.emit(&LifecycleEvent::replay_completed("app", 3));
        hooks.emit(&LifecycleEvent::capture_started("app"));

        assert_eq!(*calls.lock().unwrap(), 2);
        assert!(!hooks.is_subscribed(&handle));
    }

    #[test]
    fn test_explicit_unsubscribe() {
        let mut hooks = HookRegistry::new();
        let keep = hooks.subscribe(logging_hook);
        let drop = hooks.subscribe(|_| HookControl::Continue);

        assert!(hooks.unsubscribe(&drop));
        assert!(!hooks.unsubscribe(&drop));
        assert!(hooks.is_subscribed(&keep));
        assert_eq!(hooks.len(), 1);
    }

    #[test]
    fn test_event_serialization() {
        let event = LifecycleEvent::replay_completed("app", 2);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "replay_completed");
        assert_eq!(json["applied"], 2);
    }
}
