//! Session state machine and event loop.
//!
//! The [`Session`] owns one transport connection at a time and drives the
//! STOMP lifecycle: connect handshake, heartbeats, subscription dispatch,
//! reconnection, and teardown.
//!
//! # Event Loop
//!
//! Each activation spawns a tokio task that handles:
//!
//! - Incoming frames from the broker (messages, errors, heartbeats)
//! - Outgoing frames from the session API (send, subscribe, disconnect)
//! - Heartbeat emission and dead-connection detection
//! - Reconnection with a fixed delay until explicitly deactivated
//!
//! # States
//!
//! ```text
//! Disconnected --connect()--> Connecting --handshake--> Connected
//!      ▲                          │                        │
//!      └───── handshake error ────┘      disconnect() / unsolicited close
//!      ◄──────────────────────────────────────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval, sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::events::{EventBus, room_handler};
use crate::protocol::{Frame, FrameCommand, HEARTBEAT, HeartBeat, room_topic};
use crate::transport::{Socket, SocketSink, SocketSource};

use super::subscription::{FrameHandler, SubscriptionHandle, SubscriptionRegistry};

// ============================================================================
// Constants
// ============================================================================

/// Maximum time `disconnect()` waits for the event loop to acknowledge
/// teardown before giving up (teardown never fails outward).
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Tick period used for a disabled heartbeat direction.
const IDLE_TICK: Duration = Duration::from_secs(3600);

// ============================================================================
// SessionState
// ============================================================================

/// Connection state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport active. Initial state; reachable from every other.
    Disconnected,
    /// Transport activation or handshake in progress.
    Connecting,
    /// Handshake completed; subscribe/publish available.
    Connected,
    /// Explicit teardown in progress.
    Disconnecting,
}

// ============================================================================
// LinkCommand
// ============================================================================

/// Commands from the session API to the event loop.
enum LinkCommand {
    /// Encode and send a frame (fire-and-forget).
    Send(Frame),
    /// Tear the connection down; `done` is signalled when complete.
    Shutdown { done: oneshot::Sender<()> },
}

// ============================================================================
// Shared
// ============================================================================

/// State shared between the session facade and its event loop.
struct Shared {
    state: Mutex<SessionState>,
    subscriptions: SubscriptionRegistry,
    /// Bumped by every `disconnect()`; a pending activation that observes
    /// a bump after its handshake must tear itself down.
    epoch: AtomicU64,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: Mutex::new(SessionState::Disconnected),
            subscriptions: SubscriptionRegistry::default(),
            epoch: AtomicU64::new(0),
        }
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn bump_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    fn state(&self) -> SessionState {
        *self.state.lock()
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock() = state;
    }
}

// ============================================================================
// Session
// ============================================================================

/// The logical, reusable connection to the chat backend.
///
/// One `Session` holds at most one live transport; it survives repeated
/// connect/disconnect cycles. All operations are gated on the current
/// state: `subscribe`/`publish` require [`SessionState::Connected`].
///
/// # Thread Safety
///
/// `Session` is `Send + Sync`; operations never block the caller beyond
/// their documented suspension points.
pub struct Session {
    config: SessionConfig,
    bus: EventBus,
    shared: Arc<Shared>,
    link: Mutex<Option<mpsc::UnboundedSender<LinkCommand>>>,
}

impl Session {
    /// Creates a session with an injected notification bus.
    #[must_use]
    pub fn new(config: SessionConfig, bus: EventBus) -> Self {
        Self {
            config,
            bus,
            shared: Arc::new(Shared::new()),
            link: Mutex::new(None),
        }
    }

    /// Creates a session with its own notification bus.
    #[inline]
    #[must_use]
    pub fn with_config(config: SessionConfig) -> Self {
        Self::new(config, EventBus::new())
    }

    /// Returns the notification bus fed by this session's event bridge.
    #[inline]
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Returns the session configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns `true` if the session is in the `Connected` state.
    ///
    /// Pure read; never blocks, never fails.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.state() == SessionState::Connected
    }

    /// Returns the current connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Returns the number of active topic subscriptions.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.shared.subscriptions.len()
    }

    /// Connects to the chat backend.
    ///
    /// No-op when already connected. When `room_id` is given, the room
    /// topic `/chat/{room_id}` is subscribed with the event bridge before
    /// this method returns.
    ///
    /// At most one activation runs at a time: a `connect()` racing another
    /// fails with [`Error::Transport`], and a `disconnect()` arriving
    /// mid-handshake aborts the attempt with [`Error::ConnectionClosed`].
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] / [`Error::ConnectionTimeout`] if the socket
    ///   cannot be established
    /// - [`Error::Protocol`] if the broker rejects the STOMP handshake
    /// - [`Error::Config`] if the configuration is invalid
    pub async fn connect(&self, room_id: Option<&str>) -> Result<()> {
        // Win the activation exclusively before the first await point:
        // only the call that swings Disconnected -> Connecting under the
        // state lock may open a transport.
        let epoch = {
            let link = self.link.lock();
            let mut state = self.shared.state.lock();
            let loop_alive = link.as_ref().is_some_and(|l| !l.is_closed());

            match *state {
                SessionState::Connected => {
                    debug!("connect() while connected is a no-op");
                    return Ok(());
                }
                SessionState::Disconnected if !loop_alive => {
                    *state = SessionState::Connecting;
                    self.shared.epoch()
                }
                _ => return Err(Error::transport("connection attempt already in progress")),
            }
        };

        if let Err(e) = self.config.validate() {
            self.settle_failed_activation(epoch);
            return Err(e);
        }

        let socket = match Socket::connect(
            &self.config.endpoint(),
            &self.config.subprotocols,
            self.config.handshake_timeout,
        )
        .await
        {
            Ok(socket) => socket,
            Err(e) => {
                self.settle_failed_activation(epoch);
                return Err(e);
            }
        };

        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        tokio::spawn(run_session_loop(
            Arc::clone(&self.shared),
            self.config.clone(),
            socket,
            link_rx,
            ready_tx,
        ));

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.settle_failed_activation(epoch);
                return Err(e);
            }
            Err(_) => {
                self.settle_failed_activation(epoch);
                return Err(Error::ConnectionClosed);
            }
        }

        *self.link.lock() = Some(link_tx);

        if self.shared.epoch() != epoch {
            // disconnect() arrived while the handshake was in flight; the
            // finished activation loses and tears its transport down.
            self.disconnect().await;
            return Err(Error::ConnectionClosed);
        }

        if let Some(room) = room_id {
            let topic = room_topic(room);
            self.subscribe(&topic, room_handler(self.bus.clone()))?;
            debug!(%topic, "Room topic subscribed");
        }

        Ok(())
    }

    /// Disconnects from the chat backend.
    ///
    /// Always succeeds and is idempotent: teardown errors are logged,
    /// never propagated. Clears all subscriptions. A `connect()` still in
    /// its handshake is aborted rather than left to complete.
    pub async fn disconnect(&self) {
        self.shared.bump_epoch();
        let link = self.link.lock().take();

        if let Some(link) = link {
            self.shared.set_state(SessionState::Disconnecting);

            let (done_tx, done_rx) = oneshot::channel();
            if link
                .send(LinkCommand::Shutdown { done: done_tx })
                .is_ok()
                && timeout(TEARDOWN_TIMEOUT, done_rx).await.is_err()
            {
                warn!("Timed out waiting for event loop teardown");
            }
        }

        self.shared.subscriptions.clear();
        self.shared.set_state(SessionState::Disconnected);
        debug!("Session disconnected");
    }

    /// Subscribes a handler to a topic.
    ///
    /// The handler runs once per inbound frame matching the topic, in
    /// arrival order, synchronously in the event loop. At most one
    /// binding exists per topic; re-subscribing replaces it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] outside the `Connected` state.
    pub fn subscribe(
        &self,
        topic: &str,
        handler: impl Fn(Frame) + Send + Sync + 'static,
    ) -> Result<SubscriptionHandle> {
        if self.shared.state() != SessionState::Connected {
            return Err(Error::not_connected("subscribe"));
        }

        let handler: FrameHandler = Arc::new(handler);
        let (id, replaced) = self.shared.subscriptions.insert(topic, handler);

        if let Some(old) = replaced {
            debug!(%topic, previous = %old, "Replacing existing subscription");
            self.send_frame(Frame::unsubscribe(&old.to_string()))?;
        }

        self.send_frame(Frame::subscribe(&id.to_string(), topic))?;
        Ok(SubscriptionHandle::new(id, topic))
    }

    /// Removes a subscription.
    ///
    /// Best-effort: a stale handle (its topic was re-subscribed since) is
    /// ignored, and a failed `UNSUBSCRIBE` frame is only logged.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        if !self
            .shared
            .subscriptions
            .remove(handle.topic(), handle.id())
        {
            debug!(topic = handle.topic(), "Unsubscribe for unknown binding ignored");
            return;
        }

        if let Err(e) = self.send_frame(Frame::unsubscribe(&handle.id().to_string())) {
            debug!(error = %e, "UNSUBSCRIBE frame not sent");
        }
    }

    /// Publishes a JSON payload to a destination (fire-and-forget).
    ///
    /// Does not wait for delivery acknowledgment.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] outside the `Connected` state
    /// - [`Error::Json`] if the payload does not serialize
    pub fn publish<T>(&self, destination: &str, payload: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        if self.shared.state() != SessionState::Connected {
            return Err(Error::not_connected("publish"));
        }

        let body = serde_json::to_string(payload)?;
        self.send_frame(Frame::send(destination, body))
    }

    /// Publishes a chat message to its room's application destination.
    ///
    /// # Errors
    ///
    /// Same as [`Session::publish`].
    pub fn publish_message(&self, message: &crate::protocol::ChatMessage) -> Result<()> {
        let destination = crate::protocol::room_send_destination(&message.chat_code);
        self.publish(&destination, message)
    }

    /// Marks a failed activation as settled.
    ///
    /// Leaves the state alone when a `disconnect()` (and possibly a newer
    /// activation) superseded this attempt.
    fn settle_failed_activation(&self, epoch: u64) {
        if self.shared.epoch() == epoch {
            self.shared.set_state(SessionState::Disconnected);
        }
    }

    /// Hands a frame to the event loop.
    fn send_frame(&self, frame: Frame) -> Result<()> {
        let link = self.link.lock();
        match link.as_ref() {
            Some(link) => link
                .send(LinkCommand::Send(frame))
                .map_err(|_| Error::ConnectionClosed),
            None => Err(Error::not_connected("send")),
        }
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Why `drive_connection` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopExit {
    /// Explicit deactivation via `disconnect()`.
    Shutdown,
    /// Unsolicited close, transport error, or dead heartbeat.
    Remote,
}

/// Outer loop: one iteration per established socket, with reconnection
/// between iterations until deactivated.
async fn run_session_loop(
    shared: Arc<Shared>,
    config: SessionConfig,
    socket: Socket,
    mut link_rx: mpsc::UnboundedReceiver<LinkCommand>,
    ready_tx: oneshot::Sender<Result<()>>,
) {
    let mut ready = Some(ready_tx);
    let mut next_socket = Some(socket);

    'outer: while let Some(socket) = next_socket.take() {
        let (mut sink, mut source) = socket.split();

        let beat = match stomp_handshake(&mut sink, &mut source, &config).await {
            Ok(beat) => beat,
            Err(e) => {
                shared.set_state(SessionState::Disconnected);
                if let Some(tx) = ready.take() {
                    // Initial connect: the failure belongs to the caller.
                    let _ = tx.send(Err(e));
                    return;
                }
                warn!(error = %e, "Handshake failed during reconnect");
                match await_reconnect(&shared, &config, &mut link_rx).await {
                    Some(socket) => {
                        next_socket = Some(socket);
                        continue 'outer;
                    }
                    None => break 'outer,
                }
            }
        };

        shared.set_state(SessionState::Connected);

        if let Some(tx) = ready.take() {
            let _ = tx.send(Ok(()));
        } else if let Err(e) = resubscribe(&shared, &mut sink).await {
            warn!(error = %e, "Failed to restore subscriptions");
        } else {
            debug!("Session re-established");
        }

        let exit =
            drive_connection(&shared, &config, beat, &mut sink, &mut source, &mut link_rx).await;

        if let Err(e) = sink.close().await {
            debug!(error = %e, "Error closing socket");
        }
        shared.set_state(SessionState::Disconnected);

        match exit {
            LoopExit::Shutdown => break 'outer,
            LoopExit::Remote => match await_reconnect(&shared, &config, &mut link_rx).await {
                Some(socket) => next_socket = Some(socket),
                None => break 'outer,
            },
        }
    }

    debug!("Session event loop terminated");
}

/// Performs the STOMP `CONNECT`/`CONNECTED` handshake.
async fn stomp_handshake(
    sink: &mut SocketSink,
    source: &mut SocketSource,
    config: &SessionConfig,
) -> Result<HeartBeat> {
    let connect = Frame::connect(
        &config.host(),
        config.heartbeat_outgoing,
        config.heartbeat_incoming,
    );
    sink.send(Message::Text(connect.encode().into()))
        .await
        .map_err(|e| Error::transport(format!("failed to send CONNECT: {e}")))?;

    let deadline = config.handshake_timeout;
    timeout(deadline, async {
        loop {
            let message = source.next().await.ok_or(Error::ConnectionClosed)??;
            let Message::Text(text) = message else {
                continue;
            };
            if Frame::is_heartbeat(&text) {
                continue;
            }

            let frame = match Frame::parse(&text) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!(error = %e, "Undecodable frame during handshake");
                    continue;
                }
            };

            match frame.command {
                FrameCommand::Connected => {
                    let beat = HeartBeat::negotiate(
                        config.heartbeat_outgoing,
                        config.heartbeat_incoming,
                        frame.header("heart-beat"),
                    );
                    debug!(
                        version = ?frame.header("version"),
                        ?beat,
                        "STOMP handshake completed"
                    );
                    return Ok(beat);
                }
                FrameCommand::Error => return Err(Error::protocol(frame.error_message())),
                other => trace!(command = %other, "Frame before CONNECTED ignored"),
            }
        }
    })
    .await
    .map_err(|_| Error::connection_timeout(deadline.as_millis() as u64))?
}

/// Drives one established connection until teardown or failure.
async fn drive_connection(
    shared: &Shared,
    config: &SessionConfig,
    beat: HeartBeat,
    sink: &mut SocketSink,
    source: &mut SocketSource,
    link_rx: &mut mpsc::UnboundedReceiver<LinkCommand>,
) -> LoopExit {
    let outgoing_enabled = !beat.outgoing.is_zero();
    let incoming_enabled = !beat.incoming.is_zero();

    let mut send_beat = interval(if outgoing_enabled { beat.outgoing } else { IDLE_TICK });
    send_beat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut check_beat = interval(if incoming_enabled { beat.incoming } else { IDLE_TICK });
    check_beat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut last_received = Instant::now();

    loop {
        tokio::select! {
            // Inbound traffic from the broker
            message = source.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        last_received = Instant::now();
                        if Frame::is_heartbeat(&text) {
                            trace!("Heartbeat received");
                            continue;
                        }
                        if config.debug {
                            trace!(frame = %text, "Inbound frame");
                        }
                        match Frame::parse(&text) {
                            Ok(frame) => dispatch_frame(shared, frame),
                            Err(e) => warn!(error = %e, "Dropping undecodable frame"),
                        }
                    }

                    Some(Ok(Message::Close(_))) => {
                        debug!("WebSocket closed by remote");
                        return LoopExit::Remote;
                    }

                    // Binary, Ping, Pong still prove liveness
                    Some(Ok(_)) => {
                        last_received = Instant::now();
                    }

                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        return LoopExit::Remote;
                    }

                    None => {
                        debug!("WebSocket stream ended");
                        return LoopExit::Remote;
                    }
                }
            }

            // Outbound commands from the session API
            command = link_rx.recv() => {
                match command {
                    Some(LinkCommand::Send(frame)) => {
                        if config.debug {
                            trace!(command = %frame.command, "Outbound frame");
                        }
                        if let Err(e) = sink.send(Message::Text(frame.encode().into())).await {
                            warn!(error = %e, "Failed to send frame");
                            return LoopExit::Remote;
                        }
                    }

                    Some(LinkCommand::Shutdown { done }) => {
                        debug!("Shutdown command received");
                        if let Err(e) = sink
                            .send(Message::Text(Frame::disconnect().encode().into()))
                            .await
                        {
                            debug!(error = %e, "DISCONNECT frame not sent");
                        }
                        let _ = done.send(());
                        return LoopExit::Shutdown;
                    }

                    None => {
                        debug!("Command channel closed");
                        return LoopExit::Shutdown;
                    }
                }
            }

            // Outgoing heartbeat
            _ = send_beat.tick(), if outgoing_enabled => {
                if let Err(e) = sink.send(Message::Text(HEARTBEAT.into())).await {
                    warn!(error = %e, "Failed to send heartbeat");
                    return LoopExit::Remote;
                }
                trace!("Heartbeat sent");
            }

            // Incoming heartbeat watchdog
            _ = check_beat.tick(), if incoming_enabled => {
                if last_received.elapsed() > beat.incoming * 2 {
                    warn!("No broker traffic within two heartbeat intervals, closing");
                    return LoopExit::Remote;
                }
            }
        }
    }
}

/// Routes one inbound frame to its subscription handler.
fn dispatch_frame(shared: &Shared, frame: Frame) {
    match frame.command {
        FrameCommand::Message => {
            let Some(destination) = frame.destination().map(ToString::to_string) else {
                warn!("MESSAGE frame without destination dropped");
                return;
            };
            match shared.subscriptions.handler_for(&destination) {
                Some(handler) => handler(frame),
                None => debug!(%destination, "No subscription for destination"),
            }
        }

        FrameCommand::Error => {
            warn!(message = %frame.error_message(), "Broker reported an error");
        }

        FrameCommand::Receipt => {
            trace!(receipt = ?frame.header("receipt-id"), "Receipt received");
        }

        other => trace!(command = %other, "Unexpected frame ignored"),
    }
}

/// Restores subscriptions after a reconnect.
async fn resubscribe(shared: &Shared, sink: &mut SocketSink) -> Result<()> {
    for (topic, id) in shared.subscriptions.bindings() {
        let frame = Frame::subscribe(&id.to_string(), &topic);
        sink.send(Message::Text(frame.encode().into()))
            .await
            .map_err(|e| Error::transport(format!("failed to re-subscribe {topic}: {e}")))?;
        debug!(%topic, "Subscription restored");
    }
    Ok(())
}

/// Waits out the reconnect delay, then opens a new socket.
///
/// Returns `None` when reconnection is disabled or a shutdown arrives
/// while waiting. Attempts are unlimited until deactivated.
async fn await_reconnect(
    shared: &Shared,
    config: &SessionConfig,
    link_rx: &mut mpsc::UnboundedReceiver<LinkCommand>,
) -> Option<Socket> {
    if config.reconnect_delay.is_zero() {
        debug!("Automatic reconnection disabled");
        return None;
    }

    loop {
        tokio::select! {
            _ = sleep(config.reconnect_delay) => {}
            command = link_rx.recv() => {
                match command {
                    Some(LinkCommand::Shutdown { done }) => {
                        debug!("Shutdown received while waiting to reconnect");
                        let _ = done.send(());
                        return None;
                    }
                    Some(LinkCommand::Send(frame)) => {
                        debug!(command = %frame.command, "Frame dropped while disconnected");
                        continue;
                    }
                    None => return None,
                }
            }
        }

        shared.set_state(SessionState::Connecting);
        debug!("Attempting reconnect");

        match Socket::connect(
            &config.endpoint(),
            &config.subprotocols,
            config.handshake_timeout,
        )
        .await
        {
            Ok(socket) => return Some(socket),
            Err(e) => {
                warn!(error = %e, "Reconnect attempt failed");
                shared.set_state(SessionState::Disconnected);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
