//! Grouping engine.
//!
//! Consecutive messages from the same sender form a group. Groups are never
//! stored; they are recomputed from the transcript every time it is rendered.
//!
//! Layout rules per entry:
//! - avatar and nickname only on the first entry of a group, and never for
//!   the local identity
//! - timestamp only on the last entry of a group, on the side opposite the
//!   bubble's alignment
//! - local messages align right, everyone else aligns left

use crate::message::ChatMessage;
use crate::profile::avatar_for;

/// A maximal run of consecutive messages sharing a sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageGroup<'a> {
    /// Sender shared by every message in the run.
    pub sender: &'a str,
    /// Transcript index of the first message.
    pub start: usize,
    /// The messages, in transcript order.
    pub messages: &'a [ChatMessage],
}

impl<'a> MessageGroup<'a> {
    /// Transcript index one past the last message.
    #[must_use]
    pub fn end(&self) -> usize {
        self.start + self.messages.len()
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
    pub fn first(&self) -> Option<&'a ChatMessage> {
        self.messages.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&'a ChatMessage> {
        self.messages.last()
    }
}

/// Split a transcript into sender runs.
#[must_use]
pub fn compute_groups(transcript: &[ChatMessage]) -> Vec<MessageGroup<'_>> {
    let mut groups = Vec::new();
    let mut start = 0;

    for i in 1..=transcript.len() {
        if i == transcript.len() || transcript[i].sender != transcript[start].sender {
            groups.push(MessageGroup {
                sender: &transcript[start].sender,
                start,
                messages: &transcript[start..i],
            });
            start = i;
        }
    }

    groups
}

/// Whether entry `i` opens a group.
#[must_use]
pub fn is_first_in_group(transcript: &[ChatMessage], i: usize) -> bool {
    i == 0 || transcript[i - 1].sender != transcript[i].sender
}

/// Whether entry `i` closes a group.
#[must_use]
pub fn is_last_in_group(transcript: &[ChatMessage], i: usize) -> bool {
    i + 1 == transcript.len() || transcript[i + 1].sender != transcript[i].sender
}

/// Horizontal side of the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Rendering decisions for a single transcript entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryLayout<'a> {
    pub index: usize,
    pub message: &'a ChatMessage,
    pub is_first_in_group: bool,
    pub is_last_in_group: bool,
    /// Which side the bubble hugs.
    pub alignment: Side,
    /// Show avatar and nickname above the bubble.
    pub show_profile: bool,
    /// Avatar asset when the profile is shown and the character has one.
    pub avatar: Option<&'static str>,
    /// Side of the bubble the timestamp sits on, when shown.
    pub timestamp: Option<Side>,
}

impl EntryLayout<'_> {
    #[must_use]
    pub fn is_local(&self) -> bool {
        self.alignment == Side::Right
    }
}

/// Compute the layout of every entry as seen by `local_identity`.
#[must_use]
pub fn layout<'a>(transcript: &'a [ChatMessage], local_identity: &str) -> Vec<EntryLayout<'a>> {
    transcript
        .iter()
        .enumerate()
        .map(|(index, message)| {
            let first = is_first_in_group(transcript, index);
            let last = is_last_in_group(transcript, index);
            let local = message.is_from(local_identity);
            let show_profile = first && !local;

            EntryLayout {
                index,
                message,
                is_first_in_group: first,
                is_last_in_group: last,
                alignment: if local { Side::Right } else { Side::Left },
                show_profile,
                avatar: if show_profile {
                    avatar_for(message.character_id)
                } else {
                    None
                },
                timestamp: match (last, local) {
                    (false, _) => None,
                    (true, true) => Some(Side::Left),
                    (true, false) => Some(Side::Right),
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn msg(sender: &str, text: &str, t: i64) -> ChatMessage {
        ChatMessage::new(sender, text, 1, t)
    }

    #[test]
    fn test_empty_transcript() {
        assert!(compute_groups(&[]).is_empty());
        assert!(layout(&[], "me").is_empty());
    }

    #[test]
    fn test_two_senders_scenario() {
        let transcript = vec![msg("A", "hi", 1000), msg("A", "yo", 1002), msg("B", "hey", 1005)];
        let groups = compute_groups(&transcript);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].sender, "A");
        assert_eq!((groups[0].start, groups[0].end()), (0, 2));
        assert_eq!(groups[1].sender, "B");
        assert_eq!((groups[1].start, groups[1].end()), (2, 3));

        assert!(is_first_in_group(&transcript, 0));
        assert!(!is_last_in_group(&transcript, 0));
        assert!(!is_first_in_group(&transcript, 1));
        assert!(is_last_in_group(&transcript, 1));
        assert!(is_first_in_group(&transcript, 2));
        assert!(is_last_in_group(&transcript, 2));
    }

    #[test]
    fn test_returning_sender_starts_new_group() {
        let transcript = vec![msg("A", "1", 1), msg("B", "2", 2), msg("A", "3", 3)];
        let senders: Vec<_> = compute_groups(&transcript).iter().map(|g| g.sender).collect();
        assert_eq!(senders, ["A", "B", "A"]);
    }

    #[test]
    fn test_layout_for_remote_run() {
        let transcript = vec![
            ChatMessage::new("A", "hi", 2, 1000),
            ChatMessage::new("A", "yo", 2, 1002),
        ];
        let entries = layout(&transcript, "me");

        assert_eq!(entries[0].alignment, Side::Left);
        assert!(entries[0].show_profile);
        assert_eq!(entries[0].avatar, Some("assets/characterProfile/character2.png"));
        assert_eq!(entries[0].timestamp, None);

        assert!(!entries[1].show_profile);
        assert_eq!(entries[1].avatar, None);
        assert_eq!(entries[1].timestamp, Some(Side::Right));
    }

    #[test]
    fn test_layout_for_local_messages() {
        let transcript = vec![
            ChatMessage::new("me", "one", 99, 1000),
            ChatMessage::new("me", "two", 99, 1001),
        ];
        let entries = layout(&transcript, "me");

        assert!(entries.iter().all(|e| e.is_local() && !e.show_profile));
        assert_eq!(entries[0].timestamp, None);
        assert_eq!(entries[1].timestamp, Some(Side::Left));
    }

    #[test]
    fn test_unmapped_avatar_still_shows_nickname() {
        let transcript = vec![ChatMessage::new("guest", "hi", 42, 1000)];
        let entries = layout(&transcript, "me");
        assert!(entries[0].show_profile);
        assert_eq!(entries[0].avatar, None);
    }

    proptest! {
        #[test]
        fn prop_groups_partition_transcript(senders in prop::collection::vec(0u8..3, 0..40)) {
            let transcript: Vec<ChatMessage> = senders
                .iter()
                .enumerate()
                .map(|(i, s)| ChatMessage::new(format!("user{s}"), format!("m{i}"), 1, i as i64))
                .collect();
            let groups = compute_groups(&transcript);

            // Concatenation reproduces the transcript without gaps or overlaps.
            let flattened: Vec<&ChatMessage> = groups.iter().flat_map(|g| g.messages.iter()).collect();
            prop_assert_eq!(flattened.len(), transcript.len());
            for (a, b) in flattened.iter().zip(transcript.iter()) {
                prop_assert!(std::ptr::eq(*a, b));
            }

            let mut expected_start = 0;
            for group in &groups {
                prop_assert_eq!(group.start, expected_start);
                prop_assert!(!group.is_empty());
                prop_assert!(group.messages.iter().all(|m| m.sender == group.sender));
                expected_start = group.end();
            }

            // Runs are maximal: neighbours never share a sender.
            for pair in groups.windows(2) {
                prop_assert_ne!(pair[0].sender, pair[1].sender);
            }

            // The per-entry flags agree with group boundaries.
            for group in &groups {
                prop_assert!(is_first_in_group(&transcript, group.start));
                prop_assert!(is_last_in_group(&transcript, group.end() - 1));
                for i in group.start + 1..group.end() {
                    prop_assert!(!is_first_in_group(&transcript, i));
                }
            }
        }
    }
}
