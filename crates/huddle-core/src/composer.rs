//! Outbound message composer.

use thiserror::Error;

use crate::message::ChatMessage;
use crate::presence::Identity;

/// Rejected outbound text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message is empty")]
    Empty,
}

/// Holds the pending input and frames it into chat messages.
///
/// The composer never talks to the bus itself. The caller hands the framed
/// message to the session and calls [`Composer::clear`] only once the send
/// went through, so a failed send keeps what the user typed.
#[derive(Debug, Clone, Default)]
pub struct Composer {
    buffer: String,
}

impl Composer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, text: impl Into<String>) {
        self.buffer = text.into();
    }

    #[must_use]
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Trim `text` and reject it if nothing is left.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Empty`] for empty or whitespace-only text.
    pub fn validate(text: &str) -> Result<&str, ValidationError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty);
        }
        Ok(trimmed)
    }

    /// Frame `text` as a message from `identity` at `now`.
    ///
    /// Blank text is rejected, but accepted text is sent as typed.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Empty`] for empty or whitespace-only text.
    pub fn frame(identity: &Identity, text: &str, now: i64) -> Result<ChatMessage, ValidationError> {
        Self::validate(text)?;
        Ok(ChatMessage::new(
            identity.nickname.clone(),
            text,
            identity.character_id,
            now,
        ))
    }
}
