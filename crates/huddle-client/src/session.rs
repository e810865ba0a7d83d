//! Transport session.
//!
//! A [`Session`] owns at most one bus connection and walks it through the
//! STOMP lifecycle:
//!
//! ```text
//! Disconnected ──connect()──▶ Connecting ──CONNECTED──▶ Connected
//!      ▲                          │                        │
//!      │                          └──error──▶ Terminating ◀┘ error / close
//!      └────────────disconnect()─────────────────┘
//! ```
//!
//! `connect` only arms the handshake. The owner drives everything with
//! [`Session::next_event`], which is safe to cancel: the pending handshake
//! lives in the session, not in the caller's future.

use bytes::Bytes;
use huddle_protocol::frames::headers;
use huddle_protocol::version::{self, Version};
use huddle_protocol::{Command, Frame, HeartBeat, ProtocolError};
use huddle_transport::{Connection, Transport, TransportError};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::metrics;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Terminating,
}

impl SessionState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Terminating => "terminating",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a connection could not be established or was lost.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The handshake did not finish in time.
    #[error("handshake timed out after {0:?}")]
    Timeout(Duration),

    /// The transport failed.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The bus answered with an `ERROR` frame.
    #[error("bus error: {0}")]
    Rejected(String),

    /// The broker chose a protocol version we do not speak.
    #[error("version negotiation failed: {0}")]
    Version(#[from] ProtocolError),

    /// The bus sent something other than `CONNECTED` during the handshake.
    #[error("unexpected {0} frame during handshake")]
    UnexpectedFrame(Command),

    /// The bus closed the connection.
    #[error("connection closed by the bus")]
    Closed,
}

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The operation needs a connected session.
    #[error("session is {0}, not connected")]
    NotConnected(SessionState),

    /// The transport refused the frame.
    #[error("send failed: {0}")]
    Transport(#[from] TransportError),
}

impl From<SessionError> for ConnectionError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Transport(err) => ConnectionError::Transport(err),
            SessionError::NotConnected(_) => ConnectionError::Closed,
        }
    }
}

/// Something the owner of a session must react to.
#[derive(Debug)]
pub enum SessionEvent {
    /// The handshake finished; the session is usable.
    Connected { version: Version },
    /// A `MESSAGE` frame arrived.
    Message(Frame),
    /// The session failed and is now `Terminating`.
    Error(ConnectionError),
    /// The bus closed the connection; the session is now `Terminating`.
    Closed,
}

/// Session settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Value of the `host` header sent with `CONNECT`.
    pub host: String,
    /// Upper bound on open + `CONNECT` + `CONNECTED`.
    pub connect_timeout: Duration,
    /// Heart-beat settings the client offers.
    pub heart_beat: HeartBeat,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "/".to_string(),
            connect_timeout: Duration::from_secs(10),
            heart_beat: HeartBeat::new(10_000, 10_000),
        }
    }
}

/// A live subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub destination: String,
}

struct Established {
    connection: Box<dyn Connection>,
    version: Version,
    heartbeat: Option<Duration>,
}

type Handshake = Pin<Box<dyn Future<Output = Result<Established, ConnectionError>> + Send>>;

/// A single bus session.
pub struct Session {
    transport: Arc<dyn Transport>,
    config: SessionConfig,
    state: SessionState,
    handshake: Option<Handshake>,
    connection: Option<Box<dyn Connection>>,
    subscription: Option<Subscription>,
    next_subscription: u64,
    heartbeat: Option<Interval>,
    version: Option<Version>,
    reached_connected: bool,
}

impl Session {
    /// Create a disconnected session over `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            state: SessionState::Disconnected,
            handshake: None,
            connection: None,
            subscription: None,
            next_subscription: 0,
            heartbeat: None,
            version: None,
            reached_connected: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Negotiated protocol version while connected.
    #[must_use]
    pub fn version(&self) -> Option<Version> {
        self.version
    }

    #[must_use]
    pub fn subscription(&self) -> Option<&Subscription> {
        self.subscription.as_ref()
    }

    /// Name of the underlying transport.
    #[must_use]
    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "Session state change");
            self.state = state;
            metrics::record_transition(state);
        }
    }

    /// Start connecting.
    ///
    /// Arms the handshake and returns `true`; it runs as the owner awaits
    /// [`Session::next_event`]. A no-op returning `false` unless the session
    /// is `Disconnected`.
    pub fn connect(&mut self) -> bool {
        if self.state != SessionState::Disconnected {
            debug!(state = %self.state, "connect() ignored");
            return false;
        }

        let transport = Arc::clone(&self.transport);
        let config = self.config.clone();
        self.handshake = Some(Box::pin(handshake(transport, config)));
        self.reached_connected = false;
        self.set_state(SessionState::Connecting);
        true
    }

    /// Wait for the next session event.
    ///
    /// Only resolves while the session is `Connecting` or `Connected`; in any
    /// other state it waits forever, which keeps it usable as a `select!`
    /// branch. Heart-beats are sent from here.
    pub async fn next_event(&mut self) -> SessionEvent {
        if let Some(handshake) = self.handshake.as_mut() {
            let result = handshake.await;
            self.handshake = None;
            return match result {
                Ok(established) => self.established(established),
                Err(err) => {
                    error!(error = %err, transport = self.transport.name(), "Handshake failed");
                    self.set_state(SessionState::Terminating);
                    SessionEvent::Error(err)
                }
            };
        }

        loop {
            let Some(connection) = self.connection.as_mut() else {
                return std::future::pending().await;
            };
            if self.state != SessionState::Connected {
                return std::future::pending().await;
            }

            let step = tokio::select! {
                received = connection.recv() => Step::Received(received),
                () = tick(self.heartbeat.as_mut()) => Step::Heartbeat,
            };

            match step {
                Step::Heartbeat => {
                    if let Err(err) = connection.send_heartbeat().await {
                        warn!(error = %err, "Heart-beat failed");
                    }
                }
                Step::Received(Ok(Some(frame))) => match frame.command {
                    Command::Message => {
                        metrics::record_frame_in(frame.destination().unwrap_or_default());
                        return SessionEvent::Message(frame);
                    }
                    Command::Error => {
                        let message = error_message(&frame);
                        error!(error = %message, "Bus sent ERROR");
                        self.set_state(SessionState::Terminating);
                        return SessionEvent::Error(ConnectionError::Rejected(message));
                    }
                    Command::Receipt => {
                        debug!(receipt = ?frame.header(headers::RECEIPT_ID), "Receipt");
                    }
                    other => {
                        warn!(command = %other, "Ignoring unexpected frame");
                        metrics::record_dropped("unexpected");
                    }
                },
                Step::Received(Ok(None)) => {
                    info!("Bus closed the connection");
                    self.set_state(SessionState::Terminating);
                    return SessionEvent::Closed;
                }
                Step::Received(Err(TransportError::Protocol(err))) => {
                    warn!(error = %err, "Dropping undecodable frame");
                    metrics::record_dropped("malformed");
                }
                Step::Received(Err(err)) => {
                    error!(error = %err, "Connection lost");
                    self.set_state(SessionState::Terminating);
                    return SessionEvent::Error(ConnectionError::Transport(err));
                }
            }
        }
    }

    fn established(&mut self, established: Established) -> SessionEvent {
        let Established {
            connection,
            version,
            heartbeat,
        } = established;

        info!(
            connection = %connection.id(),
            transport = self.transport.name(),
            version = %version,
            "Connected to bus"
        );

        self.heartbeat = heartbeat.map(|period| {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        self.connection = Some(connection);
        self.version = Some(version);
        self.reached_connected = true;
        self.set_state(SessionState::Connected);
        SessionEvent::Connected { version }
    }

    /// Publish `body` to `destination`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not connected or the transport
    /// refuses the frame. Either way the session state is unchanged.
    pub async fn send(&mut self, destination: &str, body: Bytes) -> Result<(), SessionError> {
        let connection = match (self.state, self.connection.as_mut()) {
            (SessionState::Connected, Some(connection)) => connection,
            (state, _) => {
                warn!(destination = %destination, state = %state, "Send while not connected");
                metrics::record_send_failure(destination);
                return Err(SessionError::NotConnected(state));
            }
        };

        if let Err(err) = connection.send(Frame::send(destination, body)).await {
            warn!(destination = %destination, error = %err, "Send failed");
            metrics::record_send_failure(destination);
            return Err(err.into());
        }

        metrics::record_frame_out(destination);
        Ok(())
    }

    /// Subscribe to `destination`, replacing any previous subscription.
    ///
    /// # Errors
    ///
    /// Returns an error if the session is not connected or a frame cannot be
    /// sent.
    pub async fn subscribe(&mut self, destination: &str) -> Result<&Subscription, SessionError> {
        let state = self.state;
        let Some(connection) = self.connection.as_mut().filter(|_| state == SessionState::Connected)
        else {
            return Err(SessionError::NotConnected(state));
        };

        if let Some(previous) = self.subscription.take() {
            debug!(id = %previous.id, "Replacing subscription");
            connection.send(Frame::unsubscribe(previous.id.as_str())).await?;
        }

        let id = format!("sub-{}", self.next_subscription);
        self.next_subscription += 1;
        connection
            .send(Frame::subscribe(id.as_str(), destination))
            .await?;

        debug!(id = %id, destination = %destination, "Subscribed");
        let subscription = self.subscription.insert(Subscription {
            id,
            destination: destination.to_string(),
        });
        Ok(&*subscription)
    }

    /// Whether `frame` was delivered on the live subscription.
    #[must_use]
    pub fn is_live_delivery(&self, frame: &Frame) -> bool {
        match &self.subscription {
            Some(sub) => {
                frame.header(headers::SUBSCRIPTION) == Some(sub.id.as_str())
                    && frame.destination() == Some(sub.destination.as_str())
            }
            None => false,
        }
    }

    /// Tear the session down and settle in `Disconnected`.
    ///
    /// Runs unsubscribe, then `farewell` (only if the session reached
    /// `Connected`), then `DISCONNECT` and close. Every step is best-effort:
    /// failures are logged and the remaining steps still run. An abandoned
    /// handshake is dropped together with its connection. Safe to call in any
    /// state, any number of times.
    pub async fn disconnect(&mut self, farewell: Option<(&str, Bytes)>) {
        if self.state == SessionState::Disconnected && self.connection.is_none() {
            return;
        }
        self.set_state(SessionState::Terminating);

        if self.handshake.take().is_some() {
            debug!("Abandoning pending handshake");
        }

        let subscription = self.subscription.take();
        if let Some(mut connection) = self.connection.take() {
            if let Some(sub) = subscription {
                if let Err(err) = connection.send(Frame::unsubscribe(sub.id.as_str())).await {
                    warn!(id = %sub.id, error = %err, "Unsubscribe failed");
                }
            }

            if self.reached_connected {
                if let Some((destination, body)) = farewell {
                    match connection.send(Frame::send(destination, body)).await {
                        Ok(()) => metrics::record_frame_out(destination),
                        Err(err) => {
                            warn!(destination = %destination, error = %err, "Farewell not delivered");
                            metrics::record_send_failure(destination);
                        }
                    }
                }
            }

            if let Err(err) = connection.send(Frame::disconnect()).await {
                debug!(error = %err, "DISCONNECT not delivered");
            }
            if let Err(err) = connection.close().await {
                warn!(error = %err, "Close failed");
            }
            debug!(connection = %connection.id(), "Connection released");
        }

        self.heartbeat = None;
        self.version = None;
        self.reached_connected = false;
        self.set_state(SessionState::Disconnected);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("transport", &self.transport.name())
            .field("state", &self.state)
            .field("subscription", &self.subscription)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

enum Step {
    Received(Result<Option<Frame>, TransportError>),
    Heartbeat,
}

async fn tick(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn error_message(frame: &Frame) -> String {
    frame
        .header(headers::MESSAGE)
        .map(str::to_string)
        .unwrap_or_else(|| String::from_utf8_lossy(&frame.body).into_owned())
}

async fn handshake(
    transport: Arc<dyn Transport>,
    config: SessionConfig,
) -> Result<Established, ConnectionError> {
    let limit = config.connect_timeout;
    tokio::time::timeout(limit, establish(transport, config))
        .await
        .map_err(|_| ConnectionError::Timeout(limit))?
}

async fn establish(
    transport: Arc<dyn Transport>,
    config: SessionConfig,
) -> Result<Established, ConnectionError> {
    let mut connection = transport.open().await?;
    debug!(
        connection = %connection.id(),
        transport = transport.name(),
        endpoint = connection.endpoint().unwrap_or("-"),
        "Transport open"
    );

    match exchange(connection.as_mut(), &config).await {
        Ok((version, heartbeat)) => Ok(Established {
            connection,
            version,
            heartbeat,
        }),
        Err(err) => {
            if let Err(close_err) = connection.close().await {
                debug!(error = %close_err, "Close after failed handshake");
            }
            Err(err)
        }
    }
}

async fn exchange(
    connection: &mut dyn Connection,
    config: &SessionConfig,
) -> Result<(Version, Option<Duration>), ConnectionError> {
    connection
        .send(Frame::connect(
            config.host.as_str(),
            &version::accept_version_header(),
            config.heart_beat,
        ))
        .await?;

    let reply = connection.recv().await?.ok_or(ConnectionError::Closed)?;
    match reply.command {
        Command::Connected => {
            let version = version::negotiate(reply.header(headers::VERSION))?;
            let server = match reply.header(headers::HEART_BEAT) {
                Some(value) => HeartBeat::parse(value)?,
                None => HeartBeat::default(),
            };
            let heartbeat = config
                .heart_beat
                .negotiate_outgoing(&server)
                .map(|ms| Duration::from_millis(u64::from(ms)));
            Ok((version, heartbeat))
        }
        Command::Error => Err(ConnectionError::Rejected(error_message(&reply))),
        other => Err(ConnectionError::UnexpectedFrame(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_protocol::destinations;
    use huddle_transport::{BusEvent, MemoryBus};

    fn session(bus: &MemoryBus) -> Session {
        Session::new(Arc::new(bus.transport()), SessionConfig::default())
    }

    async fn connected(bus: &MemoryBus) -> Session {
        let mut session = session(bus);
        assert!(session.connect());
        assert!(matches!(session.next_event().await, SessionEvent::Connected { .. }));
        session
    }

    #[tokio::test]
    async fn test_connect_handshake() {
        let bus = MemoryBus::new();
        let mut session = session(&bus);
        assert_eq!(session.state(), SessionState::Disconnected);

        session.connect();
        assert_eq!(session.state(), SessionState::Connecting);
        // Armed, not polled.
        assert_eq!(bus.opens(), 0);

        match session.next_event().await {
            SessionEvent::Connected { version } => assert_eq!(version, Version::new(1, 2)),
            other => panic!("expected Connected, got {other:?}"),
        }
        assert!(session.is_connected());

        let sent = bus.sent_frames();
        assert_eq!(sent[0].command, Command::Connect);
        assert_eq!(sent[0].header(headers::ACCEPT_VERSION), Some("1.0,1.1,1.2"));
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let bus = MemoryBus::new();
        let mut session = session(&bus);

        assert!(session.connect());
        assert!(!session.connect());
        session.next_event().await;
        assert!(!session.connect());

        assert_eq!(bus.opens(), 1);
        assert_eq!(
            bus.events()
                .iter()
                .filter(|e| matches!(e, BusEvent::Opened(_)))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_handshake_survives_cancellation() {
        let bus = MemoryBus::manual();
        let mut session = session(&bus);
        session.connect();

        tokio::select! {
            _ = session.next_event() => panic!("handshake should be held"),
            () = tokio::task::yield_now() => {}
        }
        assert_eq!(bus.opens(), 1);
        assert_eq!(bus.accept_pending(), 1);

        assert!(matches!(session.next_event().await, SessionEvent::Connected { .. }));
        assert_eq!(bus.opens(), 1);
    }

    #[tokio::test]
    async fn test_rejected_handshake() {
        let bus = MemoryBus::manual();
        let mut session = session(&bus);
        session.connect();

        tokio::select! {
            _ = session.next_event() => panic!("handshake should be held"),
            () = tokio::task::yield_now() => {}
        }
        bus.reject_pending("access denied");

        match session.next_event().await {
            SessionEvent::Error(ConnectionError::Rejected(msg)) => assert_eq!(msg, "access denied"),
            other => panic!("expected Rejected, got {other:?}"),
        }
        assert_eq!(session.state(), SessionState::Terminating);
        // The failed handshake closed its own connection.
        assert!(bus
            .events()
            .iter()
            .any(|e| matches!(e, BusEvent::Closed(_))));

        session.disconnect(None).await;
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(bus.live_connections(), 0);
    }

    #[tokio::test]
    async fn test_refused_transport() {
        let bus = MemoryBus::new();
        bus.refuse_connections(Some("unreachable"));
        let mut session = session(&bus);
        session.connect();

        assert!(matches!(
            session.next_event().await,
            SessionEvent::Error(ConnectionError::Transport(TransportError::ConnectFailed(_)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handshake_timeout() {
        let bus = MemoryBus::manual();
        let mut session = Session::new(
            Arc::new(bus.transport()),
            SessionConfig {
                connect_timeout: Duration::from_secs(2),
                ..SessionConfig::default()
            },
        );
        session.connect();

        assert!(matches!(
            session.next_event().await,
            SessionEvent::Error(ConnectionError::Timeout(_))
        ));
        assert_eq!(bus.live_connections(), 0);
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let bus = MemoryBus::new();
        let mut session = session(&bus);

        let result = session.send(destinations::CHAT, Bytes::from_static(b"{}")).await;
        assert!(matches!(
            result,
            Err(SessionError::NotConnected(SessionState::Disconnected))
        ));
        assert!(bus.sent_frames().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_keeps_state() {
        let bus = MemoryBus::new();
        let mut session = connected(&bus).await;
        bus.fail_sends(true);

        let result = session.send(destinations::CHAT, Bytes::from_static(b"{}")).await;
        assert!(matches!(result, Err(SessionError::Transport(_))));
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_resubscribe_replaces_handle() {
        let bus = MemoryBus::new();
        let mut session = connected(&bus).await;

        let first = session.subscribe(destinations::CHAT_TOPIC).await.unwrap().clone();
        let second = session.subscribe(destinations::CHAT_TOPIC).await.unwrap().clone();
        assert_ne!(first.id, second.id);
        assert_eq!(bus.subscription_count(), 1);

        let stale = Frame::message(destinations::CHAT_TOPIC, first.id.as_str(), "m-1", "{}");
        let live = Frame::message(destinations::CHAT_TOPIC, second.id.as_str(), "m-2", "{}");
        assert!(!session.is_live_delivery(&stale));
        assert!(session.is_live_delivery(&live));
    }

    #[tokio::test]
    async fn test_messages_are_delivered() {
        let bus = MemoryBus::new();
        let mut session = connected(&bus).await;
        session.subscribe(destinations::CHAT_TOPIC).await.unwrap();

        assert_eq!(bus.publish(destinations::CHAT_TOPIC, &b"{\"a\":1}"[..]), 1);
        match session.next_event().await {
            SessionEvent::Message(frame) => {
                assert!(session.is_live_delivery(&frame));
                assert_eq!(&frame.body[..], b"{\"a\":1}");
            }
            other => panic!("expected Message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_undecodable_frame_is_skipped() {
        let bus = MemoryBus::new();
        let mut session = connected(&bus).await;
        session.subscribe(destinations::CHAT_TOPIC).await.unwrap();

        bus.push_raw(&b"MESSAGE\nnote:a\\tb\n\n\0"[..]);
        bus.publish(destinations::CHAT_TOPIC, &b"{\"a\":2}"[..]);

        match session.next_event().await {
            SessionEvent::Message(frame) => assert_eq!(&frame.body[..], b"{\"a\":2}"),
            other => panic!("expected Message, got {other:?}"),
        }
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_error_frame_terminates() {
        let bus = MemoryBus::new();
        let mut session = connected(&bus).await;

        bus.push_frame(Frame::error("broker shutting down"));
        assert!(matches!(
            session.next_event().await,
            SessionEvent::Error(ConnectionError::Rejected(_))
        ));
        assert_eq!(session.state(), SessionState::Terminating);
    }

    #[tokio::test]
    async fn test_remote_close() {
        let bus = MemoryBus::new();
        let mut session = connected(&bus).await;

        bus.close_connections();
        assert!(matches!(session.next_event().await, SessionEvent::Closed));
        assert_eq!(session.state(), SessionState::Terminating);
    }

    #[tokio::test]
    async fn test_disconnect_order() {
        let bus = MemoryBus::new();
        let mut session = connected(&bus).await;
        session.subscribe(destinations::CHAT_TOPIC).await.unwrap();

        session
            .disconnect(Some((destinations::LEAVE, Bytes::from_static(b"{}"))))
            .await;
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(session.subscription().is_none());

        let commands: Vec<Command> = bus.sent_frames().iter().map(|f| f.command).collect();
        assert_eq!(
            commands,
            [
                Command::Connect,
                Command::Subscribe,
                Command::Unsubscribe,
                Command::Send,
                Command::Disconnect,
            ]
        );
        assert!(matches!(bus.events().last(), Some(BusEvent::Closed(_))));

        // Idempotent.
        session.disconnect(None).await;
        assert_eq!(bus.sent_frames().len(), 5);
    }

    #[tokio::test]
    async fn test_disconnect_before_connected_skips_farewell() {
        let bus = MemoryBus::manual();
        let mut session = session(&bus);
        session.connect();

        tokio::select! {
            _ = session.next_event() => panic!("handshake should be held"),
            () = tokio::task::yield_now() => {}
        }
        session
            .disconnect(Some((destinations::LEAVE, Bytes::from_static(b"{}"))))
            .await;

        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(bus.sent_to(destinations::LEAVE).is_empty());
        assert_eq!(bus.live_connections(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_session_stays_connected() {
        let bus = MemoryBus::new();
        let mut session = connected(&bus).await;
        // The memory broker advertises no heart-beats.
        assert!(session.heartbeat.is_none());

        let result = tokio::time::timeout(Duration::from_secs(60), session.next_event()).await;
        assert!(result.is_err());
        assert!(session.is_connected());
    }
}
