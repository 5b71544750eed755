//! STOMP wire protocol.
//!
//! This module defines the framed sub-protocol spoken with the chat
//! broker and the application payload shapes carried in frame bodies.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame` | STOMP frame codec and heartbeat negotiation |
//! | `message` | Application payloads and topic naming |

// ============================================================================
// Submodules
// ============================================================================

/// STOMP frame codec.
pub mod frame;

/// Application message payloads.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use frame::{Frame, FrameCommand, HEARTBEAT, HeartBeat};
pub use message::{ChatMessage, MessageKind, OnlineCountUpdate, room_send_destination, room_topic};
