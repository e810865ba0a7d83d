//! # huddle-core
//!
//! Chat-domain logic for the Huddle client, free of any I/O.
//!
//! - **Message** - A single transcript entry
//! - **Transcript** - Append-only, arrival-ordered message store
//! - **Grouping** - Sender runs and per-entry layout rules
//! - **Presence** - Identity, avatar placement and join/leave frames
//! - **Inbound** - Decoding of broadcast topic bodies
//! - **Composer** - Input buffer and outbound validation
//!
//! ## Data flow
//!
//! ```text
//! /topic/chat ──▶ inbound ──▶ Transcript ──▶ grouping ──▶ render
//!                                 ▲
//! input ──▶ Composer ──▶ /app/chat┘ (echoed back by the bus)
//! ```

pub mod composer;
pub mod grouping;
pub mod inbound;
pub mod message;
pub mod presence;
pub mod profile;
pub mod time;
pub mod transcript;

pub use composer::{Composer, ValidationError};
pub use grouping::{
    compute_groups, is_first_in_group, is_last_in_group, layout, EntryLayout, MessageGroup, Side,
};
pub use inbound::{decode_chat, InboundError};
pub use message::{now_millis, ChatMessage};
pub use presence::{Identity, Placement, Presence, PresenceFrame, PresenceKind, ADMIN_NICKNAME};
pub use profile::{avatar_for, ADMIN_CHARACTER_ID};
pub use time::TimeLabels;
pub use transcript::Transcript;
