//! QuickChat client - STOMP-over-WebSocket chat session library.
//!
//! This library manages the client side of a QuickChat backend: one
//! logical session per process speaking STOMP over a WebSocket, with
//! room subscriptions, application-level notifications, and isolated
//! file uploads.
//!
//! # Architecture
//!
//! The session follows a facade/event-loop model:
//!
//! - **[`Session`]**: State machine gating all operations; reusable
//!   across connect/disconnect cycles
//! - **Event loop (tokio task)**: Owns the socket; drives frames,
//!   heartbeats, subscription dispatch, and reconnection
//! - **[`EventBus`]**: Fans decoded room messages out to listeners
//!   unrelated to the session
//!
//! # Quick Start
//!
//! ```no_run
//! use quickchat_client::{Notification, Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> quickchat_client::Result<()> {
//!     let config = SessionConfig::new("ws://localhost:8080");
//!     let session = Session::with_config(config);
//!
//!     // React to room activity
//!     session.bus().attach(|notification| {
//!         if let Notification::OnlineCount(update) = notification {
//!             println!("{} users online in {}", update.count, update.chat_code);
//!         }
//!     });
//!
//!     // Connect and join a room
//!     session.connect(Some("room-1")).await?;
//!
//!     // Say hello
//!     let message = quickchat_client::ChatMessage::chat("room-1", "alice", "hello");
//!     session.publish_message(&message)?;
//!
//!     session.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Session configuration and defaults |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`events`] | Notification bus and frame-to-event bridge |
//! | [`protocol`] | STOMP frames and chat message types |
//! | [`session`] | [`Session`] state machine and subscriptions |
//! | [`transport`] | WebSocket transport layer (internal) |
//! | [`upload`] | Isolated multipart file uploads |
//!
//! # Features
//!
//! - **Single-connection discipline**: One transport per session; extra
//!   `connect()` calls are no-ops
//! - **Resilient**: Automatic reconnection with subscription restore
//! - **Isolated uploads**: File transfers never touch session state

// ============================================================================
// Modules
// ============================================================================

/// Session configuration and defaults.
///
/// Use [`SessionConfig::new`] or [`SessionConfig::from_env`] to build a
/// configuration, then hand it to [`Session`].
pub mod config;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Notification bus and event bridge.
///
/// Decoded room traffic becomes [`Notification`] values fanned out by
/// the [`EventBus`].
pub mod events;

/// STOMP protocol frames and chat message types.
///
/// Wire-level [`Frame`] encoding/decoding plus the JSON message shapes
/// exchanged with the backend.
pub mod protocol;

/// Session state machine and subscriptions.
///
/// The [`Session`] facade and its topic subscription registry.
pub mod session;

/// WebSocket transport layer.
///
/// Internal module handling socket establishment and sub-protocol
/// negotiation.
pub mod transport;

/// Isolated multipart file uploads.
///
/// Plain-HTTP uploads that run independently of the chat session.
pub mod upload;

// ============================================================================
// Re-exports
// ============================================================================

// Configuration
pub use config::SessionConfig;

// Error types
pub use error::{Error, Result};

// Events
pub use events::{EventBus, ListenerId, Notification};

// Protocol types
pub use protocol::{ChatMessage, Frame, MessageKind, OnlineCountUpdate};

// Session types
pub use session::{Session, SessionState, SubscriptionHandle, SubscriptionId};

// Upload types
pub use upload::{UploadOutcome, UploadRequest};
