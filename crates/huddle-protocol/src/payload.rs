//! JSON bodies carried inside `SEND` and `MESSAGE` frames.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::codec::ProtocolError;

/// Bus destinations.
pub mod destinations {
    /// Presence announcement on session start.
    pub const JOIN: &str = "/app/join";
    /// Presence announcement on session end.
    pub const LEAVE: &str = "/app/leave";
    /// Outbound chat messages.
    pub const CHAT: &str = "/app/chat";
    /// Broadcast topic carrying everyone's chat messages.
    pub const CHAT_TOPIC: &str = "/topic/chat";
}

/// Body of a `/app/join` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub nickname: String,
    pub character_id: i64,
    pub position: [f64; 3],
    pub rotation: f64,
    pub current_animation: String,
    pub model_path: String,
    pub timestamp: i64,
}

/// Body of a `/app/leave` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeavePayload {
    pub nickname: String,
    pub character_id: i64,
    pub timestamp: i64,
}

/// Body of a `/app/chat` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    pub nickname: String,
    pub message: String,
    pub character_id: i64,
    pub timestamp: i64,
}

/// Any frame body arriving on the broadcast topic.
///
/// Every field is optional because the topic may fan in several frame kinds;
/// deciding which ones are chat messages is up to the consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundPayload {
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub character_id: Option<i64>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Serialize a payload to a UTF-8 JSON body.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_body<T: Serialize>(payload: &T) -> Result<Bytes, ProtocolError> {
    Ok(Bytes::from(serde_json::to_vec(payload)?))
}

/// Deserialize a JSON body.
///
/// # Errors
///
/// Returns an error if the body is not valid JSON for `T`.
pub fn from_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(body)?)
}
