//! STOMP frame codec.
//!
//! Defines the wire format exchanged with the chat broker: a text command
//! line, header lines, a blank separator, the body, and a NUL terminator.
//!
//! # Format
//!
//! ```text
//! SEND\n
//! destination:/app/chat/room-42\n
//! content-type:application/json\n
//! \n
//! {"content":"hello"}\0
//! ```
//!
//! A heartbeat is a bare `\n` outside of any frame.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Wire representation of a heartbeat.
pub const HEARTBEAT: &str = "\n";

/// STOMP versions accepted by this client.
const ACCEPT_VERSION: &str = "1.2,1.1,1.0";

// ============================================================================
// FrameCommand
// ============================================================================

/// STOMP frame command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCommand {
    /// Client handshake request.
    Connect,
    /// Broker handshake acknowledgment.
    Connected,
    /// Client topic subscription.
    Subscribe,
    /// Client topic unsubscription.
    Unsubscribe,
    /// Client outbound message.
    Send,
    /// Broker inbound message.
    Message,
    /// Broker delivery receipt.
    Receipt,
    /// Client teardown request.
    Disconnect,
    /// Broker error report.
    Error,
}

impl FrameCommand {
    /// Returns the wire name of the command.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Connected => "CONNECTED",
            Self::Subscribe => "SUBSCRIBE",
            Self::Unsubscribe => "UNSUBSCRIBE",
            Self::Send => "SEND",
            Self::Message => "MESSAGE",
            Self::Receipt => "RECEIPT",
            Self::Disconnect => "DISCONNECT",
            Self::Error => "ERROR",
        }
    }

    /// Parses a wire command name.
    fn parse(name: &str) -> Result<Self> {
        match name {
            "CONNECT" => Ok(Self::Connect),
            "CONNECTED" => Ok(Self::Connected),
            "SUBSCRIBE" => Ok(Self::Subscribe),
            "UNSUBSCRIBE" => Ok(Self::Unsubscribe),
            "SEND" => Ok(Self::Send),
            "MESSAGE" => Ok(Self::Message),
            "RECEIPT" => Ok(Self::Receipt),
            "DISCONNECT" => Ok(Self::Disconnect),
            "ERROR" => Ok(Self::Error),
            other => Err(Error::decode(format!("unknown frame command: {other}"))),
        }
    }
}

impl fmt::Display for FrameCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Frame
// ============================================================================

/// One discrete STOMP message unit.
///
/// Headers preserve insertion order; lookups match the first occurrence,
/// as required by the STOMP repeated-header rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame command.
    pub command: FrameCommand,
    /// Ordered header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Frame body (empty for most control frames).
    pub body: String,
}

// ============================================================================
// Constructors
// ============================================================================

impl Frame {
    /// Creates a bare frame with no headers and no body.
    #[inline]
    #[must_use]
    pub fn new(command: FrameCommand) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Creates a `CONNECT` handshake frame.
    ///
    /// `outgoing`/`incoming` are the client's offered heartbeat intervals,
    /// carried in the `heart-beat` header as milliseconds.
    #[must_use]
    pub fn connect(host: &str, outgoing: Duration, incoming: Duration) -> Self {
        Self::new(FrameCommand::Connect)
            .with_header("accept-version", ACCEPT_VERSION)
            .with_header("host", host)
            .with_header(
                "heart-beat",
                format!("{},{}", outgoing.as_millis(), incoming.as_millis()),
            )
    }

    /// Creates a `SUBSCRIBE` frame for a topic.
    #[must_use]
    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(FrameCommand::Subscribe)
            .with_header("id", id)
            .with_header("destination", destination)
    }

    /// Creates an `UNSUBSCRIBE` frame.
    #[must_use]
    pub fn unsubscribe(id: &str) -> Self {
        Self::new(FrameCommand::Unsubscribe).with_header("id", id)
    }

    /// Creates a `SEND` frame carrying a JSON body.
    #[must_use]
    pub fn send(destination: &str, body: impl Into<String>) -> Self {
        let body = body.into();
        Self {
            command: FrameCommand::Send,
            headers: vec![
                ("destination".to_string(), destination.to_string()),
                ("content-type".to_string(), "application/json".to_string()),
                ("content-length".to_string(), body.len().to_string()),
            ],
            body,
        }
    }

    /// Creates a `DISCONNECT` frame.
    #[inline]
    #[must_use]
    pub fn disconnect() -> Self {
        Self::new(FrameCommand::Disconnect)
    }

    /// Adds a header, preserving order.
    #[inline]
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

// ============================================================================
// Accessors
// ============================================================================

impl Frame {
    /// Returns the first header value with the given name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns the `destination` header, if present.
    #[inline]
    #[must_use]
    pub fn destination(&self) -> Option<&str> {
        self.header("destination")
    }

    /// Returns the error description of an `ERROR` frame.
    ///
    /// Prefers the `message` header, falls back to the body.
    #[must_use]
    pub fn error_message(&self) -> String {
        self.header("message")
            .map(ToString::to_string)
            .unwrap_or_else(|| self.body.trim_end().to_string())
    }
}

// ============================================================================
// Codec
// ============================================================================

impl Frame {
    /// Encodes the frame into its wire form.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (name, value) in &self.headers {
            out.push_str(name);
            out.push(':');
            out.push_str(value);
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parses a frame from its wire form.
    ///
    /// Tolerates `\r\n` line endings and a missing NUL terminator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] on an empty input, an unknown command, or
    /// a malformed header line.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim_end_matches('\0');

        // The earliest blank line ends the headers, whichever line ending
        // the broker uses.
        let lf = raw.find("\n\n");
        let crlf = raw.find("\r\n\r\n");
        let (head, body) = match (crlf, lf) {
            (Some(c), Some(l)) if c < l => (&raw[..c], &raw[c + 4..]),
            (_, Some(l)) => (&raw[..l], &raw[l + 2..]),
            (Some(c), None) => (&raw[..c], &raw[c + 4..]),
            (None, None) => (raw, ""),
        };

        let mut lines = head.lines().map(|line| line.trim_end_matches('\r'));

        let command_line = lines
            .next()
            .filter(|line| !line.is_empty())
            .ok_or_else(|| Error::decode("empty frame"))?;
        let command = FrameCommand::parse(command_line)?;

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::decode(format!("malformed header line: {line}")))?;
            headers.push((name.to_string(), value.to_string()));
        }

        Ok(Self {
            command,
            headers,
            body: body.to_string(),
        })
    }

    /// Returns `true` if the raw text is a heartbeat rather than a frame.
    #[inline]
    #[must_use]
    pub fn is_heartbeat(raw: &str) -> bool {
        raw.trim_matches(['\r', '\n']).is_empty()
    }
}

// ============================================================================
// HeartBeat
// ============================================================================

/// Effective heartbeat intervals after handshake negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartBeat {
    /// Interval at which the client must send beats. Zero disables.
    pub outgoing: Duration,
    /// Interval at which broker beats are expected. Zero disables.
    pub incoming: Duration,
}

impl HeartBeat {
    /// Disabled heartbeats in both directions.
    #[inline]
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            outgoing: Duration::ZERO,
            incoming: Duration::ZERO,
        }
    }

    /// Negotiates effective intervals from the client offer and the
    /// broker's `heart-beat` header.
    ///
    /// Per the STOMP rule: each direction is active only when both sides
    /// support it, at the larger of the two intervals. A missing or
    /// malformed header disables both directions.
    #[must_use]
    pub fn negotiate(
        client_outgoing: Duration,
        client_incoming: Duration,
        server_header: Option<&str>,
    ) -> Self {
        let (server_send, server_expect) = match server_header.and_then(parse_heart_beat_header) {
            Some(pair) => pair,
            None => return Self::disabled(),
        };

        let outgoing = combine(client_outgoing, server_expect);
        let incoming = combine(client_incoming, server_send);

        Self { outgoing, incoming }
    }
}

/// Parses a `heart-beat` header value of the form `"sx,sy"` (milliseconds).
fn parse_heart_beat_header(value: &str) -> Option<(Duration, Duration)> {
    let (sx, sy) = value.split_once(',')?;
    let sx: u64 = sx.trim().parse().ok()?;
    let sy: u64 = sy.trim().parse().ok()?;
    Some((Duration::from_millis(sx), Duration::from_millis(sy)))
}

/// Combines the two sides of one heartbeat direction.
fn combine(ours: Duration, theirs: Duration) -> Duration {
    if ours.is_zero() || theirs.is_zero() {
        Duration::ZERO
    } else {
        ours.max(theirs)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_send_frame() {
        let frame = Frame::send("/app/chat/abc", r#"{"content":"hi"}"#);
        let wire = frame.encode();

        assert!(wire.starts_with("SEND\n"));
        assert!(wire.contains("destination:/app/chat/abc\n"));
        assert!(wire.contains("content-type:application/json\n"));
        assert!(wire.contains("\n\n{\"content\":\"hi\"}"));
        assert!(wire.ends_with('\0'));
    }

    #[test]
    fn test_encode_connect_frame() {
        let frame = Frame::connect(
            "localhost",
            Duration::from_millis(4000),
            Duration::from_millis(4000),
        );
        let wire = frame.encode();

        assert!(wire.starts_with("CONNECT\n"));
        assert!(wire.contains("accept-version:1.2,1.1,1.0\n"));
        assert!(wire.contains("host:localhost\n"));
        assert!(wire.contains("heart-beat:4000,4000\n"));
    }

    #[test]
    fn test_parse_message_frame() {
        let wire = "MESSAGE\ndestination:/chat/abc\nmessage-id:7\nsubscription:sub-1\n\n{\"type\":\"CHAT\"}\0";
        let frame = Frame::parse(wire).expect("parse frame");

        assert_eq!(frame.command, FrameCommand::Message);
        assert_eq!(frame.destination(), Some("/chat/abc"));
        assert_eq!(frame.header("message-id"), Some("7"));
        assert_eq!(frame.body, "{\"type\":\"CHAT\"}");
    }

    #[test]
    fn test_parse_crlf_headers() {
        let wire = "CONNECTED\r\nversion:1.2\r\nheart-beat:4000,4000\r\n\r\n\0";
        let frame = Frame::parse(wire).expect("parse frame");
        assert_eq!(frame.command, FrameCommand::Connected);
        assert_eq!(frame.header("version"), Some("1.2"));
    }

    #[test]
    fn test_parse_crlf_with_body() {
        let wire = "MESSAGE\r\ndestination:/chat/abc\r\n\r\n{\"type\":\"CHAT\"}\0";
        let frame = Frame::parse(wire).expect("parse frame");

        assert_eq!(frame.command, FrameCommand::Message);
        assert_eq!(frame.destination(), Some("/chat/abc"));
        assert_eq!(frame.body, "{\"type\":\"CHAT\"}");
    }

    #[test]
    fn test_parse_body_containing_crlf_blank_line() {
        // LF-delimited headers; the CRLF pair inside the body must not be
        // mistaken for the header separator.
        let wire = "MESSAGE\ndestination:/chat/abc\n\nline1\r\n\r\nline2\0";
        let frame = Frame::parse(wire).expect("parse frame");
        assert_eq!(frame.body, "line1\r\n\r\nline2");
    }

    #[test]
    fn test_parse_missing_terminator() {
        let frame = Frame::parse("RECEIPT\nreceipt-id:42\n\n").expect("parse frame");
        assert_eq!(frame.command, FrameCommand::Receipt);
        assert_eq!(frame.header("receipt-id"), Some("42"));
        assert!(frame.body.is_empty());
    }

    #[test]
    fn test_parse_unknown_command() {
        let result = Frame::parse("BOGUS\n\n\0");
        assert!(matches!(result, Err(Error::Decode { .. })));
    }

    #[test]
    fn test_parse_empty() {
        assert!(Frame::parse("").is_err());
        assert!(Frame::parse("\0").is_err());
    }

    #[test]
    fn test_parse_malformed_header() {
        let result = Frame::parse("MESSAGE\nno-colon-here\n\nbody\0");
        assert!(matches!(result, Err(Error::Decode { .. })));
    }

    #[test]
    fn test_roundtrip() {
        let frame = Frame::subscribe("sub-1", "/chat/room-42");
        let parsed = Frame::parse(&frame.encode()).expect("parse frame");
        assert_eq!(parsed, frame);
    }

    #[test]
    fn test_is_heartbeat() {
        assert!(Frame::is_heartbeat("\n"));
        assert!(Frame::is_heartbeat("\r\n"));
        assert!(Frame::is_heartbeat(""));
        assert!(!Frame::is_heartbeat("MESSAGE\n\n\0"));
    }

    #[test]
    fn test_error_message_prefers_header() {
        let frame = Frame::new(FrameCommand::Error).with_header("message", "bad credentials");
        assert_eq!(frame.error_message(), "bad credentials");
    }

    #[test]
    fn test_error_message_falls_back_to_body() {
        let mut frame = Frame::new(FrameCommand::Error);
        frame.body = "broker unavailable\n".to_string();
        assert_eq!(frame.error_message(), "broker unavailable");
    }

    #[test]
    fn test_heartbeat_negotiation_both_active() {
        let beat = HeartBeat::negotiate(
            Duration::from_millis(4000),
            Duration::from_millis(4000),
            Some("10000,2000"),
        );
        // Outgoing: max(client 4000, server wants 2000) = 4000.
        // Incoming: max(client 4000, server sends 10000) = 10000.
        assert_eq!(beat.outgoing, Duration::from_millis(4000));
        assert_eq!(beat.incoming, Duration::from_millis(10000));
    }

    #[test]
    fn test_heartbeat_negotiation_server_disables() {
        let beat = HeartBeat::negotiate(
            Duration::from_millis(4000),
            Duration::from_millis(4000),
            Some("0,0"),
        );
        assert_eq!(beat, HeartBeat::disabled());
    }

    #[test]
    fn test_heartbeat_negotiation_client_disables() {
        let beat = HeartBeat::negotiate(Duration::ZERO, Duration::ZERO, Some("4000,4000"));
        assert_eq!(beat, HeartBeat::disabled());
    }

    #[test]
    fn test_heartbeat_negotiation_missing_header() {
        let beat = HeartBeat::negotiate(
            Duration::from_millis(4000),
            Duration::from_millis(4000),
            None,
        );
        assert_eq!(beat, HeartBeat::disabled());
    }

    #[test]
    fn test_heartbeat_negotiation_malformed_header() {
        let beat = HeartBeat::negotiate(
            Duration::from_millis(4000),
            Duration::from_millis(4000),
            Some("garbage"),
        );
        assert_eq!(beat, HeartBeat::disabled());
    }
}
