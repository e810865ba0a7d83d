//! Ordered, append-only chat transcript.

use crate::grouping::{compute_groups, MessageGroup};
use crate::message::ChatMessage;

/// The messages received during one session, in arrival order.
///
/// Appending is the only way to add entries. There is no deduplication:
/// the protocol carries no message ids, so a duplicate delivery shows up as
/// two entries.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message at the end.
    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Drop every entry. Used when a session starts or ends.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    #[must_use]
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChatMessage> {
        self.messages.iter()
    }

    /// Sender runs over the current contents.
    #[must_use]
    pub fn groups(&self) -> Vec<MessageGroup<'_>> {
        compute_groups(&self.messages)
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a ChatMessage;
    type IntoIter = std::slice::Iter<'a, ChatMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
