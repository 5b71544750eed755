//! Application message payloads.
//!
//! Defines the JSON shapes carried in frame bodies on room topics, and
//! the topic naming helpers.
//!
//! # Recognized inbound shape
//!
//! ```json
//! {
//!   "type": "ONLINE_COUNT",
//!   "chatCode": "room-42",
//!   "content": "7",
//!   "timestamp": 1712345678901
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Topics
// ============================================================================

/// Returns the broadcast topic for a room.
///
/// Format: `/chat/{room}`
#[inline]
#[must_use]
pub fn room_topic(room: &str) -> String {
    format!("/chat/{room}")
}

/// Returns the application destination outbound messages are sent to.
///
/// Format: `/app/chat/{room}`
#[inline]
#[must_use]
pub fn room_send_destination(room: &str) -> String {
    format!("/app/chat/{room}")
}

// ============================================================================
// MessageKind
// ============================================================================

/// Discriminator of an application message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// Regular chat message.
    Chat,
    /// A user joined the room.
    Join,
    /// A user left the room.
    Leave,
    /// Room online-count broadcast.
    OnlineCount,
    /// Room creation notice.
    Create,
}

impl MessageKind {
    /// Parses a wire discriminator.
    ///
    /// Returns `None` for unrecognized values so future message shapes
    /// can be ignored rather than rejected.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "CHAT" => Some(Self::Chat),
            "JOIN" => Some(Self::Join),
            "LEAVE" => Some(Self::Leave),
            "ONLINE_COUNT" => Some(Self::OnlineCount),
            "CREATE" => Some(Self::Create),
            _ => None,
        }
    }
}

// ============================================================================
// ChatMessage
// ============================================================================

/// A chat room message.
///
/// Mirrors the backend model; `timestamp` is passed through opaquely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Room code the message belongs to.
    #[serde(rename = "chatCode", default)]
    pub chat_code: String,

    /// Sender display name.
    #[serde(default)]
    pub sender: String,

    /// Message content (numeric string for online-count broadcasts).
    #[serde(default)]
    pub content: String,

    /// Message discriminator.
    #[serde(rename = "type")]
    pub kind: MessageKind,

    /// Opaque timestamp, forwarded unmodified.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub timestamp: Value,

    /// Set when the content refers to an uploaded image.
    #[serde(rename = "imageFlag", default, skip_serializing_if = "Option::is_none")]
    pub image_flag: Option<bool>,
}

impl ChatMessage {
    /// Creates an outbound chat message.
    #[must_use]
    pub fn chat(chat_code: &str, sender: &str, content: &str) -> Self {
        Self {
            chat_code: chat_code.to_string(),
            sender: sender.to_string(),
            content: content.to_string(),
            kind: MessageKind::Chat,
            timestamp: Value::Null,
            image_flag: None,
        }
    }
}

// ============================================================================
// OnlineCountUpdate
// ============================================================================

/// Decoded online-count broadcast.
///
/// Carried by the application notification emitted for each recognized
/// `ONLINE_COUNT` frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OnlineCountUpdate {
    /// Room code.
    pub chat_code: String,
    /// Number of users in the room; 0 when `content` does not parse.
    pub count: u64,
    /// Opaque timestamp, forwarded unmodified.
    pub timestamp: Value,
}

impl OnlineCountUpdate {
    /// Builds an update from a decoded payload.
    ///
    /// Missing fields default: empty room code, count 0, null timestamp.
    #[must_use]
    pub fn from_payload(payload: &Value) -> Self {
        let chat_code = payload
            .get("chatCode")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let count = parse_count(payload.get("content").and_then(Value::as_str));
        let timestamp = payload.get("timestamp").cloned().unwrap_or(Value::Null);

        Self {
            chat_code,
            count,
            timestamp,
        }
    }
}

/// Parses a numeric-string count, falling back to zero.
#[must_use]
pub fn parse_count(content: Option<&str>) -> u64 {
    content
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_room_topics() {
        assert_eq!(room_topic("abc"), "/chat/abc");
        assert_eq!(room_send_destination("abc"), "/app/chat/abc");
    }

    #[test]
    fn test_message_kind_from_wire() {
        assert_eq!(MessageKind::from_wire("CHAT"), Some(MessageKind::Chat));
        assert_eq!(
            MessageKind::from_wire("ONLINE_COUNT"),
            Some(MessageKind::OnlineCount)
        );
        assert_eq!(MessageKind::from_wire("TYPING"), None);
        assert_eq!(MessageKind::from_wire(""), None);
    }

    #[test]
    fn test_chat_message_wire_names() {
        let message = ChatMessage::chat("room-42", "alice", "hello");
        let json = serde_json::to_value(&message).expect("serialize");

        assert_eq!(json["chatCode"], "room-42");
        assert_eq!(json["sender"], "alice");
        assert_eq!(json["content"], "hello");
        assert_eq!(json["type"], "CHAT");
        assert!(json.get("imageFlag").is_none());
    }

    #[test]
    fn test_chat_message_deserialize() {
        let message: ChatMessage = serde_json::from_value(json!({
            "chatCode": "room-42",
            "sender": "bob",
            "content": "hi",
            "type": "JOIN",
            "timestamp": 1712345678901u64,
            "imageFlag": false
        }))
        .expect("deserialize");

        assert_eq!(message.kind, MessageKind::Join);
        assert_eq!(message.timestamp, json!(1712345678901u64));
        assert_eq!(message.image_flag, Some(false));
    }

    #[test]
    fn test_online_count_from_payload() {
        let update = OnlineCountUpdate::from_payload(&json!({
            "type": "ONLINE_COUNT",
            "chatCode": "abc",
            "content": "7",
            "timestamp": 123
        }));

        assert_eq!(update.chat_code, "abc");
        assert_eq!(update.count, 7);
        assert_eq!(update.timestamp, json!(123));
    }

    #[test]
    fn test_online_count_invalid_content() {
        let update = OnlineCountUpdate::from_payload(&json!({
            "chatCode": "abc",
            "content": "notanumber"
        }));
        assert_eq!(update.count, 0);
    }

    #[test]
    fn test_online_count_missing_content() {
        let update = OnlineCountUpdate::from_payload(&json!({ "chatCode": "abc" }));
        assert_eq!(update.count, 0);
        assert_eq!(update.timestamp, Value::Null);
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count(Some("42")), 42);
        assert_eq!(parse_count(Some(" 42 ")), 42);
        assert_eq!(parse_count(Some("-1")), 0);
        assert_eq!(parse_count(Some("")), 0);
        assert_eq!(parse_count(None), 0);
    }
}
