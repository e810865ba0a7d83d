//! # huddle-protocol
//!
//! Wire protocol definitions for the Huddle chat client.
//!
//! The chat bus speaks STOMP over WebSocket text frames. This crate holds the
//! frame model, the text codec, version negotiation and the JSON payloads the
//! client exchanges on each destination.
//!
//! ## Destinations
//!
//! - `/app/join` / `/app/leave` - Presence announcements
//! - `/app/chat` - Outbound chat messages
//! - `/topic/chat` - Broadcast chat topic
//!
//! ## Example
//!
//! ```rust
//! use huddle_protocol::{codec, Frame};
//!
//! let frame = Frame::send("/app/chat", &br#"{"message":"hi"}"#[..]);
//!
//! let encoded = codec::encode(&frame).unwrap();
//! let decoded = codec::decode(&encoded).unwrap();
//! assert_eq!(decoded.destination(), Some("/app/chat"));
//! ```

pub mod codec;
pub mod frames;
pub mod payload;
pub mod version;

pub use codec::{decode, encode, FrameCodec, ProtocolError};
pub use frames::{Command, Frame, HeartBeat};
pub use payload::{destinations, ChatPayload, InboundPayload, JoinPayload, LeavePayload};
pub use version::{Version, PROTOCOL_VERSION};
