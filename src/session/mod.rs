//! Chat session management.
//!
//! The session layer owns the connection lifecycle on top of the
//! transport: STOMP handshake, state tracking, topic subscriptions, and
//! automatic reconnection.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | [`Session`] state machine and event loop |
//! | `subscription` | Topic → handler binding registry |

// ============================================================================
// Submodules
// ============================================================================

/// Session state machine and event loop.
pub mod core;

/// Topic → handler binding registry.
pub mod subscription;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{Session, SessionState};
pub use subscription::{FrameHandler, SubscriptionHandle, SubscriptionId};
