//! Session configuration.
//!
//! Provides a type-safe interface for configuring the chat session:
//! endpoint resolution, heartbeat intervals, reconnect delay, handshake
//! timeout, and verbose frame logging.
//!
//! # Example
//!
//! ```ignore
//! use quickchat_client::SessionConfig;
//!
//! let config = SessionConfig::new("ws://localhost:8080")
//!     .with_handshake_timeout(Duration::from_secs(10))
//!     .with_debug();
//!
//! assert_eq!(config.endpoint(), "ws://localhost:8080/ws");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::env;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Environment variable that overrides the WebSocket base URL.
pub const WS_URL_ENV: &str = "QUICKCHAT_WS_URL";

/// Default incoming heartbeat interval (4000ms).
pub const DEFAULT_HEARTBEAT_INCOMING: Duration = Duration::from_millis(4000);

/// Default outgoing heartbeat interval (4000ms).
pub const DEFAULT_HEARTBEAT_OUTGOING: Duration = Duration::from_millis(4000);

/// Default delay between reconnect attempts (5000ms).
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);

/// Default transport handshake timeout (20000ms).
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(20000);

/// STOMP sub-protocol versions offered during the WebSocket upgrade,
/// in preference order.
pub const DEFAULT_SUBPROTOCOLS: [&str; 3] = ["v12.stomp", "v11.stomp", "v10.stomp"];

// ============================================================================
// SessionConfig
// ============================================================================

/// Chat session configuration.
///
/// Controls how the session connects: endpoint, sub-protocol preference,
/// heartbeat intervals, reconnect policy, and handshake timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// WebSocket base URL, without the `/ws` suffix.
    pub base_url: String,

    /// Preferred STOMP sub-protocols, in order.
    pub subprotocols: Vec<String>,

    /// Interval at which broker heartbeats are expected. Zero disables.
    pub heartbeat_incoming: Duration,

    /// Interval at which client heartbeats are sent. Zero disables.
    pub heartbeat_outgoing: Duration,

    /// Delay between reconnect attempts after an unsolicited close.
    /// Zero disables automatic reconnection.
    pub reconnect_delay: Duration,

    /// Maximum time for the transport and STOMP handshakes to complete.
    pub handshake_timeout: Duration,

    /// Enables raw frame tracing.
    pub debug: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new("ws://localhost:8080")
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl SessionConfig {
    /// Creates a configuration with default intervals for the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            subprotocols: DEFAULT_SUBPROTOCOLS.iter().map(ToString::to_string).collect(),
            heartbeat_incoming: DEFAULT_HEARTBEAT_INCOMING,
            heartbeat_outgoing: DEFAULT_HEARTBEAT_OUTGOING,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            debug: false,
        }
    }

    /// Creates a configuration resolving the base URL from the environment.
    ///
    /// Reads [`WS_URL_ENV`], falling back to `fallback` when unset.
    #[must_use]
    pub fn from_env(fallback: impl Into<String>) -> Self {
        let base_url = env::var(WS_URL_ENV).unwrap_or_else(|_| fallback.into());
        Self::new(base_url)
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl SessionConfig {
    /// Sets the preferred sub-protocols.
    #[inline]
    #[must_use]
    pub fn with_subprotocols(
        mut self,
        protocols: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.subprotocols = protocols.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the incoming heartbeat interval.
    #[inline]
    #[must_use]
    pub fn with_heartbeat_incoming(mut self, interval: Duration) -> Self {
        self.heartbeat_incoming = interval;
        self
    }

    /// Sets the outgoing heartbeat interval.
    #[inline]
    #[must_use]
    pub fn with_heartbeat_outgoing(mut self, interval: Duration) -> Self {
        self.heartbeat_outgoing = interval;
        self
    }

    /// Sets the reconnect delay. Zero disables automatic reconnection.
    #[inline]
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the handshake timeout.
    #[inline]
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Enables raw frame tracing.
    #[inline]
    #[must_use]
    pub fn with_debug(mut self) -> Self {
        self.debug = true;
        self
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl SessionConfig {
    /// Returns the full WebSocket endpoint URL.
    ///
    /// Format: `{base_url}/ws`
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}/ws", self.base_url.trim_end_matches('/'))
    }

    /// Returns the STOMP virtual host, derived from the base URL.
    ///
    /// Falls back to `localhost` when the URL has no host component.
    #[must_use]
    pub fn host(&self) -> String {
        Url::parse(&self.base_url)
            .ok()
            .and_then(|url| url.host_str().map(ToString::to_string))
            .unwrap_or_else(|| "localhost".to_string())
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the base URL does not parse or uses a
    /// scheme other than `ws`/`wss`, or if the handshake timeout is zero.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| Error::config(format!("invalid base URL: {e}")))?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(Error::config(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }

        if self.handshake_timeout.is_zero() {
            return Err(Error::config("handshake timeout must be non-zero"));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::new("ws://localhost:8080");
        assert_eq!(config.heartbeat_incoming, Duration::from_millis(4000));
        assert_eq!(config.heartbeat_outgoing, Duration::from_millis(4000));
        assert_eq!(config.reconnect_delay, Duration::from_millis(5000));
        assert_eq!(config.handshake_timeout, Duration::from_millis(20000));
        assert!(!config.debug);
        assert_eq!(config.subprotocols.len(), 3);
    }

    #[test]
    fn test_endpoint_format() {
        let config = SessionConfig::new("ws://localhost:8080");
        assert_eq!(config.endpoint(), "ws://localhost:8080/ws");
    }

    #[test]
    fn test_endpoint_trailing_slash() {
        let config = SessionConfig::new("ws://localhost:8080/");
        assert_eq!(config.endpoint(), "ws://localhost:8080/ws");
    }

    #[test]
    fn test_host() {
        let config = SessionConfig::new("ws://chat.example.com:8080");
        assert_eq!(config.host(), "chat.example.com");
    }

    #[test]
    fn test_host_fallback() {
        let config = SessionConfig::new("not a url");
        assert_eq!(config.host(), "localhost");
    }

    #[test]
    fn test_builder_chain() {
        let config = SessionConfig::new("wss://chat.example.com")
            .with_heartbeat_incoming(Duration::from_secs(10))
            .with_heartbeat_outgoing(Duration::ZERO)
            .with_reconnect_delay(Duration::ZERO)
            .with_handshake_timeout(Duration::from_secs(5))
            .with_debug();

        assert_eq!(config.heartbeat_incoming, Duration::from_secs(10));
        assert!(config.heartbeat_outgoing.is_zero());
        assert!(config.reconnect_delay.is_zero());
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
        assert!(config.debug);
    }

    #[test]
    fn test_with_subprotocols() {
        let config = SessionConfig::new("ws://localhost:8080").with_subprotocols(["v12.stomp"]);
        assert_eq!(config.subprotocols, vec!["v12.stomp".to_string()]);
    }

    #[test]
    fn test_validate_valid() {
        assert!(SessionConfig::new("ws://localhost:8080").validate().is_ok());
        assert!(SessionConfig::new("wss://chat.example.com").validate().is_ok());
    }

    #[test]
    fn test_validate_bad_scheme() {
        let config = SessionConfig::new("http://localhost:8080");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_url() {
        let config = SessionConfig::new("not a url");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let config =
            SessionConfig::new("ws://localhost:8080").with_handshake_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
