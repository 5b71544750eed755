//! WebSocket transport layer.
//!
//! This module owns the raw connection to the chat broker.
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Session (Rust) │                              │  Chat Broker    │
//! │                 │         WebSocket            │                 │
//! │  Socket         │◄────────────────────────────►│  /ws endpoint   │
//! │  → event loop   │       STOMP sub-protocol     │                 │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! The adapter only opens and splits the socket; framing, heartbeats,
//! and reconnection live in the session layer.

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection establishment.
pub mod socket;

// ============================================================================
// Re-exports
// ============================================================================

pub use socket::{Socket, SocketSink, SocketSource, WsStream};
