//! Application-wide notification bus.
//!
//! A typed publish/subscribe registry connecting the event bridge to
//! interested consumers (UI layers, loggers, tests). Listeners attach and
//! detach independently of the session lifecycle.
//!
//! Delivery is synchronous and best-effort: every listener sees every
//! notification, and a panicking listener cannot stop the others.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::warn;
use uuid::Uuid;

use crate::protocol::{ChatMessage, OnlineCountUpdate};

// ============================================================================
// Types
// ============================================================================

/// Listener callback type.
type Listener = Arc<dyn Fn(&Notification) + Send + Sync>;

// ============================================================================
// Notification
// ============================================================================

/// An application-level notification fanned out by the bus.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Room online-count changed.
    OnlineCount(OnlineCountUpdate),

    /// A chat/join/leave message arrived on the room topic.
    Message(ChatMessage),
}

// ============================================================================
// ListenerId
// ============================================================================

/// Identifier of an attached listener, used to detach it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// EventBus
// ============================================================================

/// Typed fan-out notification bus.
///
/// Cheaply cloneable; clones share the same listener registry.
#[derive(Clone, Default)]
pub struct EventBus {
    /// Listener registry (shared across clones).
    listeners: Arc<Mutex<FxHashMap<ListenerId, Listener>>>,
}

impl EventBus {
    /// Creates an empty bus.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a listener and returns its id.
    pub fn attach(&self, listener: impl Fn(&Notification) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId::generate();
        self.listeners.lock().insert(id, Arc::new(listener));
        id
    }

    /// Detaches a listener.
    ///
    /// Returns `false` if the id was not attached.
    pub fn detach(&self, id: ListenerId) -> bool {
        self.listeners.lock().remove(&id).is_some()
    }

    /// Returns the number of attached listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Emits a notification to every attached listener.
    ///
    /// Listeners are invoked outside the registry lock, each isolated so
    /// one failure cannot stop the rest of the fan-out.
    pub fn emit(&self, notification: &Notification) {
        let snapshot: Vec<(ListenerId, Listener)> = self
            .listeners
            .lock()
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();

        for (id, listener) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(notification))).is_err() {
                warn!(listener = %id, "Notification listener panicked");
            }
        }
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
