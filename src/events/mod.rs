//! Application notifications.
//!
//! Bridges low-level transport frames into process-wide notifications
//! consumable by code unrelated to the session.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `bus` | Typed fan-out notification bus |
//! | `bridge` | Frame decoding and notification emission |

// ============================================================================
// Submodules
// ============================================================================

/// Typed fan-out notification bus.
pub mod bus;

/// Frame decoding and notification emission.
pub mod bridge;

// ============================================================================
// Re-exports
// ============================================================================

pub use bridge::room_handler;
pub use bus::{EventBus, ListenerId, Notification};
