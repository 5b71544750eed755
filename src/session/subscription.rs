//! Subscription registry.
//!
//! Tracks topic → handler bindings for the session. At most one binding
//! exists per topic at a time; re-subscribing a topic replaces the
//! previous binding.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use uuid::Uuid;

use crate::protocol::Frame;

// ============================================================================
// Types
// ============================================================================

/// Handler invoked for each inbound frame on a subscribed topic.
///
/// Called synchronously from the session event loop, in arrival order.
pub type FrameHandler = Arc<dyn Fn(Frame) + Send + Sync>;

// ============================================================================
// SubscriptionId
// ============================================================================

/// Identifier carried in the STOMP `id` header of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Generates a fresh id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

// ============================================================================
// SubscriptionHandle
// ============================================================================

/// Handle to an active subscription.
///
/// Returned by [`Session::subscribe`](crate::Session::subscribe); pass it
/// to [`Session::unsubscribe`](crate::Session::unsubscribe) to remove the
/// binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    topic: String,
}

impl SubscriptionHandle {
    pub(crate) fn new(id: SubscriptionId, topic: impl Into<String>) -> Self {
        Self {
            id,
            topic: topic.into(),
        }
    }

    /// Returns the subscription id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns the subscribed topic.
    #[inline]
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

// ============================================================================
// SubscriptionRegistry
// ============================================================================

/// Entry stored per topic.
struct Entry {
    id: SubscriptionId,
    handler: FrameHandler,
}

/// Topic → handler binding table, shared between the session facade and
/// its event loop.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    entries: Mutex<FxHashMap<String, Entry>>,
}

impl SubscriptionRegistry {
    /// Binds a handler to a topic, replacing any previous binding.
    ///
    /// Returns the new subscription id and the replaced id, if any.
    pub fn insert(
        &self,
        topic: &str,
        handler: FrameHandler,
    ) -> (SubscriptionId, Option<SubscriptionId>) {
        let id = SubscriptionId::generate();
        let replaced = self
            .entries
            .lock()
            .insert(topic.to_string(), Entry { id, handler })
            .map(|entry| entry.id);
        (id, replaced)
    }

    /// Removes a binding if the id still matches.
    ///
    /// A stale handle (the topic was re-subscribed since) removes nothing.
    pub fn remove(&self, topic: &str, id: SubscriptionId) -> bool {
        let mut entries = self.entries.lock();
        match entries.get(topic) {
            Some(entry) if entry.id == id => {
                entries.remove(topic);
                true
            }
            _ => false,
        }
    }

    /// Returns the handler bound to a destination, if any.
    ///
    /// The handler is cloned out so callbacks run without holding the
    /// registry lock.
    pub fn handler_for(&self, destination: &str) -> Option<FrameHandler> {
        self.entries
            .lock()
            .get(destination)
            .map(|entry| Arc::clone(&entry.handler))
    }

    /// Returns all bindings, for re-subscription after reconnect.
    pub fn bindings(&self) -> Vec<(String, SubscriptionId)> {
        self.entries
            .lock()
            .iter()
            .map(|(topic, entry)| (topic.clone(), entry.id))
            .collect()
    }

    /// Removes all bindings.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Returns the number of active bindings.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

// ============================================================================
// Tests
// ============================================================================
