//! Chat message type.

use chrono::Utc;
use huddle_protocol::ChatPayload;

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// A single chat line in the transcript.
///
/// Messages are immutable once received. Their position in the transcript is
/// arrival order; `timestamp_millis` is for display only and may go backwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Nickname of the author.
    pub sender: String,
    /// Message text.
    pub text: String,
    /// Author's character, used for the avatar.
    pub character_id: i64,
    /// Author-side send time.
    pub timestamp_millis: i64,
}

impl ChatMessage {
    /// Create a new message.
    #[must_use]
    pub fn new(
        sender: impl Into<String>,
        text: impl Into<String>,
        character_id: i64,
        timestamp_millis: i64,
    ) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
            character_id,
            timestamp_millis,
        }
    }

    /// Whether this message was written by `identity`.
    #[must_use]
    pub fn is_from(&self, identity: &str) -> bool {
        self.sender == identity
    }

    /// Wire payload for `/app/chat`.
    #[must_use]
    pub fn to_payload(&self) -> ChatPayload {
        ChatPayload {
            nickname: self.sender.clone(),
            message: self.text.clone(),
            character_id: self.character_id,
            timestamp: self.timestamp_millis,
        }
    }
}

impl From<ChatPayload> for ChatMessage {
    fn from(payload: ChatPayload) -> Self {
        Self {
            sender: payload.nickname,
            text: payload.message,
            character_id: payload.character_id,
            timestamp_millis: payload.timestamp,
        }
    }
}
