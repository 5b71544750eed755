//! WebSocket transport adapter.
//!
//! Opens the WebSocket connection to the chat broker, offering the
//! preferred STOMP sub-protocols during the upgrade and bounding the
//! handshake with the configured timeout.
//!
//! Construction is fully asynchronous; the only side effect is the
//! network resource itself.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::{SplitSink, SplitStream};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// The underlying WebSocket stream type.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of a split socket.
pub type SocketSink = SplitSink<WsStream, Message>;

/// Read half of a split socket.
pub type SocketSource = SplitStream<WsStream>;

// ============================================================================
// Socket
// ============================================================================

/// An established WebSocket connection to the broker.
///
/// Produced by [`Socket::connect`]; consumed by the session event loop
/// via [`Socket::split`].
pub struct Socket {
    /// The upgraded stream.
    stream: WsStream,
    /// Sub-protocol accepted by the broker, if any.
    protocol: Option<String>,
}

impl Socket {
    /// Opens a WebSocket connection to `endpoint`.
    ///
    /// Offers `protocols` in order via `Sec-WebSocket-Protocol` and bounds
    /// the whole upgrade with `handshake_timeout`.
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] if the request cannot be built
    /// - [`Error::ConnectionTimeout`] if the upgrade exceeds the timeout
    /// - [`Error::WebSocket`] if the socket or upgrade fails
    pub async fn connect(
        endpoint: &str,
        protocols: &[String],
        handshake_timeout: Duration,
    ) -> Result<Self> {
        let mut request = endpoint
            .into_client_request()
            .map_err(|e| Error::transport(format!("invalid endpoint {endpoint}: {e}")))?;

        if !protocols.is_empty() {
            let offered = protocols.join(", ");
            let value = HeaderValue::from_str(&offered)
                .map_err(|e| Error::transport(format!("invalid sub-protocol list: {e}")))?;
            request
                .headers_mut()
                .insert("Sec-WebSocket-Protocol", value);
        }

        let (stream, response) = timeout(handshake_timeout, connect_async(request))
            .await
            .map_err(|_| Error::connection_timeout(handshake_timeout.as_millis() as u64))??;

        let protocol = response
            .headers()
            .get("Sec-WebSocket-Protocol")
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);

        debug!(endpoint, ?protocol, "WebSocket connection established");

        Ok(Self { stream, protocol })
    }

    /// Returns the sub-protocol accepted by the broker, if any.
    #[inline]
    #[must_use]
    pub fn negotiated_protocol(&self) -> Option<&str> {
        self.protocol.as_deref()
    }

    /// Splits the socket into write and read halves for the event loop.
    #[must_use]
    pub fn split(self) -> (SocketSink, SocketSource) {
        self.stream.split()
    }
}

// ============================================================================
// Tests
// ============================================================================
