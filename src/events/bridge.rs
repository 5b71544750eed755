//! Event bridge: inbound frames → application notifications.
//!
//! For every frame arriving on the subscribed room topic, the bridge
//! deserializes the body, interprets recognized message shapes, and emits
//! notifications on the [`EventBus`].
//!
//! Decode failures are logged and absorbed: a malformed frame must never
//! tear down the subscription. Unrecognized discriminators are ignored to
//! stay forward-compatible with future message shapes.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::protocol::{ChatMessage, Frame, MessageKind, OnlineCountUpdate};

use super::bus::{EventBus, Notification};

// ============================================================================
// Bridge
// ============================================================================

/// Returns a frame handler that bridges a room topic onto the bus.
///
/// Suitable for [`Session::subscribe`](crate::Session::subscribe); the
/// session attaches it automatically when connecting with a room id.
pub fn room_handler(bus: EventBus) -> impl Fn(Frame) + Send + Sync + 'static {
    move |frame| handle_frame(&bus, &frame)
}

/// Decodes one inbound frame and emits any resulting notifications.
pub fn handle_frame(bus: &EventBus, frame: &Frame) {
    let payload: Value = match serde_json::from_str(&frame.body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(
                error = %e,
                destination = ?frame.destination(),
                "Dropping frame with malformed body"
            );
            return;
        }
    };

    dispatch_payload(bus, &payload);
}

/// Routes a decoded payload by its discriminator.
fn dispatch_payload(bus: &EventBus, payload: &Value) {
    let Some(discriminator) = payload.get("type").and_then(Value::as_str) else {
        trace!("Payload without type discriminator ignored");
        return;
    };

    match MessageKind::from_wire(discriminator) {
        Some(MessageKind::OnlineCount) => {
            let update = OnlineCountUpdate::from_payload(payload);
            debug!(
                chat_code = %update.chat_code,
                count = update.count,
                "Online count update"
            );
            bus.emit(&Notification::OnlineCount(update));
        }

        Some(_) => match serde_json::from_value::<ChatMessage>(payload.clone()) {
            Ok(message) => bus.emit(&Notification::Message(message)),
            Err(e) => warn!(error = %e, "Dropping unreadable chat message"),
        },

        None => {
            trace!(discriminator, "Unrecognized message type ignored");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
