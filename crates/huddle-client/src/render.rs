//! Plain-text rendering of the transcript.

use huddle_core::{EntryLayout, Side};
use unicode_width::UnicodeWidthStr;

use crate::view::ChatView;

/// Renders a chat view into terminal lines of a fixed width.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    width: usize,
}

impl Default for Renderer {
    fn default() -> Self {
        Self { width: 72 }
    }
}

impl Renderer {
    #[must_use]
    pub fn new(width: usize) -> Self {
        Self { width }
    }

    /// Status line followed by the transcript.
    #[must_use]
    pub fn render(&self, view: &ChatView) -> Vec<String> {
        let mut lines = vec![self.status(view)];
        for entry in view.layout() {
            let label = entry
                .timestamp
                .and_then(|_| view.time_label(entry.message));
            self.entry(&entry, label.as_deref(), &mut lines);
        }
        lines
    }

    fn status(&self, view: &ChatView) -> String {
        let identity = view.presence().identity();
        let title = format!(
            " {} · {} · {} ",
            identity.nickname,
            view.state(),
            view.session().transport_name()
        );
        let fill = self.width.saturating_sub(title.width()) / 2;
        format!("{}{}{}", "─".repeat(fill), title, "─".repeat(fill))
    }

    fn entry(&self, entry: &EntryLayout<'_>, label: Option<&str>, lines: &mut Vec<String>) {
        if entry.is_first_in_group && entry.index > 0 {
            lines.push(String::new());
        }
        if entry.show_profile {
            let marker = if entry.avatar.is_some() { "◉" } else { "○" };
            lines.push(format!("{marker} {}", entry.message.sender));
        }

        let text: Vec<&str> = entry.message.text.lines().collect();
        let last = text.len().saturating_sub(1);
        for (i, line) in text.iter().enumerate() {
            let label = if i == last { label } else { None };
            lines.push(match (entry.alignment, label) {
                (Side::Left, Some(label)) => format!("  {line}  {label}"),
                (Side::Left, None) => format!("  {line}"),
                (Side::Right, Some(label)) => self.right(&format!("{label}  {line}")),
                (Side::Right, None) => self.right(line),
            });
        }
    }

    fn right(&self, content: &str) -> String {
        let pad = self.width.saturating_sub(content.width() + 2);
        format!("{}{content}  ", " ".repeat(pad))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Session, SessionConfig};
    use huddle_core::{ChatMessage, Presence, TimeLabels, Transcript};
    use huddle_transport::MemoryBus;
    use std::sync::Arc;

    fn render(messages: Vec<ChatMessage>) -> Vec<String> {
        let bus = MemoryBus::new();
        let session = Session::new(Arc::new(bus.transport()), SessionConfig::default());
        let mut view = ChatView::new(session, Presence::default())
            .with_time_labels(TimeLabels::default().with_utc_offset_minutes(0));
        let mut transcript = Transcript::new();
        for message in messages {
            transcript.append(message);
        }
        view.replace_transcript(transcript);
        Renderer::new(40).render(&view)
    }

    #[test]
    fn test_remote_group() {
        // 15:05 and 15:06 UTC
        let lines = render(vec![
            ChatMessage::new("A", "hi", 2, 1_714_575_900_000),
            ChatMessage::new("A", "yo", 2, 1_714_575_960_000),
        ]);
        assert!(lines[0].contains("disconnected"));
        assert_eq!(lines[1], "◉ A");
        assert_eq!(lines[2], "  hi");
        assert_eq!(lines[3], "  yo  오후 3:06");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_local_message_is_right_aligned() {
        let lines = render(vec![ChatMessage::new("관리자", "공지", 99, 1_714_575_900_000)]);
        let line = &lines[1];
        assert!(line.ends_with("오후 3:05  공지  "));
        assert_eq!(line.width(), 40);
    }

    #[test]
    fn test_groups_are_separated() {
        let lines = render(vec![
            ChatMessage::new("A", "one", 9, 0),
            ChatMessage::new("B", "two", 1, 0),
        ]);
        assert_eq!(lines[1], "○ A");
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "◉ B");
    }
}
