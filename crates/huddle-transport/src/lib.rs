//! # huddle-transport
//!
//! Transport abstraction layer for the Huddle chat client.
//!
//! This crate provides a unified interface over the ways a client can reach
//! the chat bus:
//!
//! - **WebSocket** - STOMP over WebSocket text frames
//! - **Fallback** - ordered list of endpoints, first reachable wins
//! - **Memory** - in-process loopback broker for tests and offline mode
//!
//! ## Transport Abstraction
//!
//! All transports implement the `Transport` and `Connection` traits,
//! so the chat session is transport-agnostic.
//!
//! ```rust,ignore
//! use huddle_transport::{Transport, Connection};
//!
//! async fn drain(transport: &dyn Transport) {
//!     let mut conn = transport.open().await.unwrap();
//!     while let Ok(Some(frame)) = conn.recv().await {
//!         // Process frame
//!     }
//! }
//! ```

pub mod fallback;
pub mod memory;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use fallback::FallbackTransport;
pub use memory::{BusEvent, MemoryBus, MemoryTransport};
pub use traits::{Connection, ConnectionId, Transport, TransportError};

#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConfig, WebSocketTransport};
