//! In-memory loopback transport.
//!
//! [`MemoryBus`] plays the broker side of the bus inside the process: it
//! answers `CONNECT`, tracks subscriptions, optionally routes `SEND` frames
//! back out on a topic, and records everything clients do in order. Tests use
//! it to observe the exact frame sequence a session produces, and the client
//! binary uses it for offline mode.

use async_trait::async_trait;
use bytes::Bytes;
use huddle_protocol::frames::headers;
use huddle_protocol::{Command, Frame, HeartBeat};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::traits::{Connection, ConnectionId, Transport, TransportError};

/// Something that happened on the bus, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// A client opened a connection.
    Opened(ConnectionId),
    /// A client sent a frame.
    Sent(ConnectionId, Frame),
    /// A client closed its connection gracefully.
    Closed(ConnectionId),
    /// A client connection was dropped without `close`.
    Dropped(ConnectionId),
}

enum Delivery {
    Frame(Frame),
    Raw(Bytes),
    Fail(String),
    Close,
}

struct Client {
    tx: mpsc::UnboundedSender<Delivery>,
    awaiting_connected: bool,
    subscriptions: Vec<(String, String)>,
}

struct BusState {
    auto_accept: bool,
    refuse: Option<String>,
    fail_sends: bool,
    routes: HashMap<String, String>,
    clients: HashMap<ConnectionId, Client>,
    events: Vec<BusEvent>,
    opens: usize,
    next_message_id: u64,
}

impl BusState {
    fn deliver_to_subscribers(&mut self, destination: &str, body: &Bytes) -> usize {
        let mut delivered = 0;
        for client in self.clients.values() {
            for (sub_id, dest) in &client.subscriptions {
                if dest == destination {
                    self.next_message_id += 1;
                    let frame = Frame::message(
                        destination,
                        sub_id.as_str(),
                        format!("mem-{}", self.next_message_id),
                        body.clone(),
                    );
                    if client.tx.send(Delivery::Frame(frame)).is_ok() {
                        delivered += 1;
                    }
                }
            }
        }
        delivered
    }

    fn handle_client_frame(&mut self, id: &ConnectionId, frame: &Frame) {
        match frame.command {
            Command::Connect | Command::Stomp => {
                let auto_accept = self.auto_accept;
                if let Some(client) = self.clients.get_mut(id) {
                    if auto_accept {
                        let _ = client
                            .tx
                            .send(Delivery::Frame(Frame::connected("1.2", HeartBeat::default())));
                    } else {
                        client.awaiting_connected = true;
                    }
                }
            }
            Command::Subscribe => {
                if let (Some(sub_id), Some(dest)) =
                    (frame.header(headers::ID), frame.destination())
                {
                    if let Some(client) = self.clients.get_mut(id) {
                        client
                            .subscriptions
                            .push((sub_id.to_string(), dest.to_string()));
                    }
                }
            }
            Command::Unsubscribe => {
                if let Some(sub_id) = frame.header(headers::ID) {
                    if let Some(client) = self.clients.get_mut(id) {
                        client.subscriptions.retain(|(s, _)| s != sub_id);
                    }
                }
            }
            Command::Send => {
                let topic = frame
                    .destination()
                    .and_then(|dest| self.routes.get(dest))
                    .cloned();
                if let Some(topic) = topic {
                    let body = frame.body.clone();
                    let count = self.deliver_to_subscribers(&topic, &body);
                    trace!(topic = %topic, recipients = count, "Routed SEND");
                }
            }
            Command::Disconnect => {
                if let Some(client) = self.clients.get_mut(id) {
                    client.subscriptions.clear();
                }
            }
            _ => {}
        }
    }

    fn detach(&mut self, id: &ConnectionId, event: BusEvent) {
        self.clients.remove(id);
        self.events.push(event);
    }
}

/// Broker side of an in-memory bus.
///
/// Cloning the bus yields another handle to the same broker.
#[derive(Clone)]
pub struct MemoryBus {
    state: Arc<Mutex<BusState>>,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBus {
    /// Create a bus that accepts every `CONNECT` immediately.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                auto_accept: true,
                refuse: None,
                fail_sends: false,
                routes: HashMap::new(),
                clients: HashMap::new(),
                events: Vec::new(),
                opens: 0,
                next_message_id: 0,
            })),
        }
    }

    /// Create a bus that holds `CONNECT` until [`MemoryBus::accept_pending`].
    #[must_use]
    pub fn manual() -> Self {
        let bus = Self::new();
        bus.lock().auto_accept = false;
        bus
    }

    /// Route frames sent to `destination` out to subscribers of `topic`.
    #[must_use]
    pub fn with_route(self, destination: impl Into<String>, topic: impl Into<String>) -> Self {
        self.lock().routes.insert(destination.into(), topic.into());
        self
    }

    /// A transport whose connections attach to this bus.
    #[must_use]
    pub fn transport(&self) -> MemoryTransport {
        MemoryTransport { bus: self.clone() }
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answer every held `CONNECT` with `CONNECTED`.
    pub fn accept_pending(&self) -> usize {
        let mut state = self.lock();
        let mut accepted = 0;
        for client in state.clients.values_mut() {
            if client.awaiting_connected {
                client.awaiting_connected = false;
                let connected = Frame::connected("1.2", HeartBeat::default());
                if client.tx.send(Delivery::Frame(connected)).is_ok() {
                    accepted += 1;
                }
            }
        }
        accepted
    }

    /// Answer every held `CONNECT` with an `ERROR` frame.
    pub fn reject_pending(&self, message: &str) -> usize {
        let mut state = self.lock();
        let mut rejected = 0;
        for client in state.clients.values_mut() {
            if client.awaiting_connected {
                client.awaiting_connected = false;
                if client.tx.send(Delivery::Frame(Frame::error(message))).is_ok() {
                    rejected += 1;
                }
            }
        }
        rejected
    }

    /// Make future `open` calls fail with the given reason (or succeed again).
    pub fn refuse_connections(&self, reason: Option<&str>) {
        self.lock().refuse = reason.map(str::to_string);
    }

    /// Make client sends fail with `SendFailed`.
    pub fn fail_sends(&self, fail: bool) {
        self.lock().fail_sends = fail;
    }

    /// Publish a body to every subscriber of `destination`.
    ///
    /// Returns the number of subscriptions that received it.
    pub fn publish(&self, destination: &str, body: impl Into<Bytes>) -> usize {
        let body = body.into();
        self.lock().deliver_to_subscribers(destination, &body)
    }

    /// Push an arbitrary frame to every live client.
    pub fn push_frame(&self, frame: Frame) -> usize {
        self.lock()
            .clients
            .values()
            .filter(|c| c.tx.send(Delivery::Frame(frame.clone())).is_ok())
            .count()
    }

    /// Push raw wire bytes to every live client, decoded on their side.
    pub fn push_raw(&self, data: impl Into<Bytes>) -> usize {
        let data = data.into();
        self.lock()
            .clients
            .values()
            .filter(|c| c.tx.send(Delivery::Raw(data.clone())).is_ok())
            .count()
    }

    /// Break every live connection with a receive error.
    pub fn fail_connections(&self, reason: &str) {
        let state = self.lock();
        for client in state.clients.values() {
            let _ = client.tx.send(Delivery::Fail(reason.to_string()));
        }
    }

    /// Close every live connection from the broker side.
    pub fn close_connections(&self) {
        let state = self.lock();
        for client in state.clients.values() {
            let _ = client.tx.send(Delivery::Close);
        }
    }

    /// Number of times a connection was opened.
    #[must_use]
    pub fn opens(&self) -> usize {
        self.lock().opens
    }

    /// Number of connections currently attached.
    #[must_use]
    pub fn live_connections(&self) -> usize {
        self.lock().clients.len()
    }

    /// Total subscriptions across live connections.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.lock()
            .clients
            .values()
            .map(|c| c.subscriptions.len())
            .sum()
    }

    /// Every event so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<BusEvent> {
        self.lock().events.clone()
    }

    /// Every frame clients sent, in order.
    #[must_use]
    pub fn sent_frames(&self) -> Vec<Frame> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                BusEvent::Sent(_, frame) => Some(frame.clone()),
                _ => None,
            })
            .collect()
    }

    /// Frames clients sent with `SEND` to `destination`, in order.
    #[must_use]
    pub fn sent_to(&self, destination: &str) -> Vec<Frame> {
        self.sent_frames()
            .into_iter()
            .filter(|f| f.command == Command::Send && f.destination() == Some(destination))
            .collect()
    }
}

/// Transport attaching connections to a [`MemoryBus`].
#[derive(Clone)]
pub struct MemoryTransport {
    bus: MemoryBus,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn open(&self) -> Result<Box<dyn Connection>, TransportError> {
        let mut state = self.bus.lock();
        state.opens += 1;

        if let Some(reason) = &state.refuse {
            return Err(TransportError::ConnectFailed(reason.clone()));
        }

        let id = ConnectionId::next("memory");
        let (tx, rx) = mpsc::unbounded_channel();
        let open = Arc::new(AtomicBool::new(true));

        state.clients.insert(
            id.clone(),
            Client {
                tx,
                awaiting_connected: false,
                subscriptions: Vec::new(),
            },
        );
        state.events.push(BusEvent::Opened(id.clone()));
        debug!(connection = %id, "Memory connection opened");

        Ok(Box::new(MemoryConnection {
            id,
            rx,
            open,
            bus: self.bus.clone(),
        }))
    }

    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_healthy(&self) -> bool {
        self.bus.lock().refuse.is_none()
    }
}

/// Client side of a memory bus connection.
pub struct MemoryConnection {
    id: ConnectionId,
    rx: mpsc::UnboundedReceiver<Delivery>,
    open: Arc<AtomicBool>,
    bus: MemoryBus,
}

#[async_trait]
impl Connection for MemoryConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    async fn recv(&mut self) -> Result<Option<Frame>, TransportError> {
        match self.rx.recv().await {
            Some(Delivery::Frame(frame)) => Ok(Some(frame)),
            // Undecodable bytes fail this read only; the connection stays up.
            Some(Delivery::Raw(data)) => Ok(Some(huddle_protocol::decode(&data)?)),
            Some(Delivery::Fail(reason)) => {
                self.open.store(false, Ordering::SeqCst);
                Err(TransportError::ReceiveFailed(reason))
            }
            Some(Delivery::Close) | None => {
                self.open.store(false, Ordering::SeqCst);
                Ok(None)
            }
        }
    }

    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }

        let mut state = self.bus.lock();
        if state.fail_sends {
            return Err(TransportError::SendFailed("bus rejected frame".into()));
        }

        state.events.push(BusEvent::Sent(self.id.clone(), frame.clone()));
        state.handle_client_frame(&self.id, &frame);
        Ok(())
    }

    async fn send_raw(&mut self, data: Bytes) -> Result<(), TransportError> {
        if !self.open.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }
        // Heart-beats carry no frame.
        if data.iter().all(|b| *b == b'\n' || *b == b'\r') {
            return Ok(());
        }
        let frame = huddle_protocol::decode(&data)?;
        self.send(frame).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.open.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.bus.lock().detach(&self.id, BusEvent::Closed(self.id.clone()));
        debug!(connection = %self.id, "Memory connection closed");
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        let mut state = self.bus.lock();
        if state.clients.contains_key(&self.id) {
            state.detach(&self.id, BusEvent::Dropped(self.id.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_protocol::destinations;

    #[tokio::test]
    async fn test_auto_accept_handshake() {
        let bus = MemoryBus::new();
        let mut conn = bus.transport().open().await.unwrap();

        conn.send(Frame::connect("bus", "1.2", HeartBeat::default()))
            .await
            .unwrap();
        let reply = conn.recv().await.unwrap().unwrap();
        assert_eq!(reply.command, Command::Connected);
        assert_eq!(bus.opens(), 1);
    }

    #[tokio::test]
    async fn test_manual_accept() {
        let bus = MemoryBus::manual();
        let mut conn = bus.transport().open().await.unwrap();
        conn.send(Frame::connect("bus", "1.2", HeartBeat::default()))
            .await
            .unwrap();

        assert_eq!(bus.accept_pending(), 1);
        assert_eq!(bus.accept_pending(), 0);
        let reply = conn.recv().await.unwrap().unwrap();
        assert_eq!(reply.command, Command::Connected);
    }

    #[tokio::test]
    async fn test_route_reaches_subscribers() {
        let bus = MemoryBus::new().with_route(destinations::CHAT, destinations::CHAT_TOPIC);
        let mut conn = bus.transport().open().await.unwrap();
        conn.send(Frame::subscribe("sub-0", destinations::CHAT_TOPIC))
            .await
            .unwrap();
        conn.send(Frame::send(destinations::CHAT, &b"{}"[..]))
            .await
            .unwrap();

        let delivered = conn.recv().await.unwrap().unwrap();
        assert_eq!(delivered.command, Command::Message);
        assert_eq!(delivered.header("subscription"), Some("sub-0"));
        assert_eq!(bus.sent_to(destinations::CHAT).len(), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let bus = MemoryBus::new();
        let mut conn = bus.transport().open().await.unwrap();
        conn.send(Frame::subscribe("sub-0", "/topic/chat")).await.unwrap();
        assert_eq!(bus.subscription_count(), 1);
        conn.send(Frame::unsubscribe("sub-0")).await.unwrap();
        assert_eq!(bus.publish("/topic/chat", &b"{}"[..]), 0);
    }

    #[tokio::test]
    async fn test_close_and_drop_are_recorded() {
        let bus = MemoryBus::new();
        let mut first = bus.transport().open().await.unwrap();
        let second = bus.transport().open().await.unwrap();
        let first_id = first.id().clone();
        let second_id = second.id().clone();

        first.close().await.unwrap();
        assert!(first.send(Frame::disconnect()).await.is_err());
        drop(second);

        let events = bus.events();
        assert!(events.contains(&BusEvent::Closed(first_id)));
        assert!(events.contains(&BusEvent::Dropped(second_id)));
        assert_eq!(bus.live_connections(), 0);
    }

    #[tokio::test]
    async fn test_refused_and_failing_bus() {
        let bus = MemoryBus::new();
        bus.refuse_connections(Some("down"));
        assert!(!bus.transport().is_healthy());
        assert!(bus.transport().open().await.is_err());

        bus.refuse_connections(None);
        let mut conn = bus.transport().open().await.unwrap();
        bus.fail_sends(true);
        assert!(matches!(
            conn.send(Frame::disconnect()).await,
            Err(TransportError::SendFailed(_))
        ));

        bus.fail_connections("reset");
        assert!(matches!(
            conn.recv().await,
            Err(TransportError::ReceiveFailed(_))
        ));
        assert!(!conn.is_open());
    }
}
