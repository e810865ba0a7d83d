//! Decoding of frames received on the broadcast chat topic.
//!
//! The topic may carry more than one kind of frame. Only bodies with a
//! non-empty `message` become transcript entries; everything else is either
//! ignored (a different frame class) or reported as malformed.

use huddle_protocol::{payload, InboundPayload, ProtocolError};
use thiserror::Error;

use crate::message::ChatMessage;

/// Why an inbound body could not be used.
#[derive(Debug, Error)]
pub enum InboundError {
    /// Body is not JSON of the expected shape.
    #[error("malformed frame body: {0}")]
    Malformed(#[from] ProtocolError),

    /// Chat body without a required field.
    #[error("chat frame missing field `{0}`")]
    MissingField(&'static str),
}

/// Decode a topic body into a chat message.
///
/// Returns `Ok(None)` for bodies that are not chat messages (no `message`
/// field, or an empty one).
///
/// # Errors
///
/// Returns an error if the body is not valid JSON, or is a chat message
/// without a sender or timestamp.
pub fn decode_chat(body: &[u8]) -> Result<Option<ChatMessage>, InboundError> {
    let inbound: InboundPayload = payload::from_body(body)?;

    let text = match inbound.message {
        Some(text) if !text.is_empty() => text,
        _ => return Ok(None),
    };

    let sender = inbound
        .nickname
        .ok_or(InboundError::MissingField("nickname"))?;
    let timestamp = inbound
        .timestamp
        .ok_or(InboundError::MissingField("timestamp"))?;

    Ok(Some(ChatMessage {
        sender,
        text,
        character_id: inbound.character_id.unwrap_or_default(),
        timestamp_millis: timestamp,
    }))
}
