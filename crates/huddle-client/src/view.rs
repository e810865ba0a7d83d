//! The chat view.
//!
//! [`ChatView`] is the lifecycle owner: it holds the session, the transcript
//! and the composer for as long as it is mounted, announces presence, keeps
//! exactly one topic subscription, and tears everything down in order.

use huddle_core::{
    decode_chat, layout, now_millis, ChatMessage, Composer, EntryLayout, Presence, TimeLabels,
    Transcript,
};
use huddle_protocol::{destinations, payload, Frame};
use tracing::{debug, error, trace, warn};

use crate::metrics;
use crate::session::{ConnectionError, Session, SessionEvent, SessionState};

/// What a handled session event changed.
#[derive(Debug)]
pub enum ViewUpdate {
    /// Connected, joined and subscribed.
    Joined,
    /// A message was appended to the transcript.
    Appended,
    /// Nothing visible changed.
    Ignored,
    /// The session ended and the view was cleaned up. `None` for a clean
    /// remote close.
    Ended(Option<ConnectionError>),
}

/// A mounted chat screen.
#[derive(Debug)]
pub struct ChatView {
    session: Session,
    presence: Presence,
    transcript: Transcript,
    composer: Composer,
    labels: TimeLabels,
    /// Set once the join announcement went out on the current session.
    joined: bool,
}

impl ChatView {
    #[must_use]
    pub fn new(session: Session, presence: Presence) -> Self {
        Self {
            session,
            presence,
            transcript: Transcript::new(),
            composer: Composer::new(),
            labels: TimeLabels::default(),
            joined: false,
        }
    }

    #[must_use]
    pub fn with_time_labels(mut self, labels: TimeLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Start a session.
    ///
    /// Returns `false` without touching anything if one is already running.
    pub fn mount(&mut self) -> bool {
        if !self.session.connect() {
            return false;
        }
        self.joined = false;
        self.transcript.clear();
        self.composer.clear();
        true
    }

    /// Run full cleanup and settle `Disconnected`.
    pub async fn unmount(&mut self) {
        debug!(state = %self.session.state(), "Unmounting chat view");
        self.teardown().await;
    }

    /// Wait for the next session event. Cancel-safe.
    pub async fn next_event(&mut self) -> SessionEvent {
        self.session.next_event().await
    }

    /// Wait for and handle one session event.
    pub async fn step(&mut self) -> ViewUpdate {
        let event = self.next_event().await;
        self.handle(event).await
    }

    /// React to a session event.
    pub async fn handle(&mut self, event: SessionEvent) -> ViewUpdate {
        match event {
            SessionEvent::Connected { .. } => self.on_connected().await,
            SessionEvent::Message(frame) => self.on_message(&frame),
            SessionEvent::Error(err) => {
                error!(error = %err, "Chat session failed");
                self.teardown().await;
                ViewUpdate::Ended(Some(err))
            }
            SessionEvent::Closed => {
                self.teardown().await;
                ViewUpdate::Ended(None)
            }
        }
    }

    async fn on_connected(&mut self) -> ViewUpdate {
        let join = self.presence.join_frame(now_millis());
        match join.to_body() {
            Ok(body) => {
                if let Err(err) = self.session.send(join.destination(), body).await {
                    warn!(error = %err, "Join announcement not delivered");
                }
            }
            Err(err) => warn!(error = %err, "Join announcement not encoded"),
        }
        self.joined = true;

        if let Err(err) = self.session.subscribe(destinations::CHAT_TOPIC).await {
            error!(error = %err, "Subscribe failed");
            self.teardown().await;
            return ViewUpdate::Ended(Some(err.into()));
        }

        ViewUpdate::Joined
    }

    fn on_message(&mut self, frame: &Frame) -> ViewUpdate {
        if !self.session.is_live_delivery(frame) {
            debug!(
                destination = ?frame.destination(),
                subscription = ?frame.header("subscription"),
                "Dropping stale delivery"
            );
            metrics::record_dropped("stale");
            return ViewUpdate::Ignored;
        }

        match decode_chat(&frame.body) {
            Ok(Some(message)) => {
                trace!(sender = %message.sender, "Chat message");
                self.transcript.append(message);
                metrics::set_transcript_length(self.transcript.len());
                ViewUpdate::Appended
            }
            Ok(None) => {
                trace!("Non-chat frame on topic");
                ViewUpdate::Ignored
            }
            Err(err) => {
                warn!(error = %err, "Dropping malformed frame");
                metrics::record_dropped("malformed");
                ViewUpdate::Ignored
            }
        }
    }

    async fn teardown(&mut self) {
        let leave = self.presence.leave_frame(now_millis());
        let farewell = match leave.to_body() {
            Ok(body) => Some((leave.destination(), body)),
            Err(err) => {
                warn!(error = %err, "Leave announcement not encoded");
                None
            }
        };

        self.joined = false;
        self.session.disconnect(farewell).await;
        self.transcript.clear();
        self.composer.clear();
        metrics::set_transcript_length(0);
    }

    /// Send `text` as a chat message.
    ///
    /// Returns `None`, with no send and no state change, when the trimmed
    /// text is empty or the session has not connected and joined. The input buffer is
    /// cleared only when the send went through.
    pub async fn compose(&mut self, text: &str) -> Option<ChatMessage> {
        let message = match Composer::frame(self.presence.identity(), text, now_millis()) {
            Ok(message) => message,
            Err(err) => {
                debug!(error = %err, "Nothing to send");
                return None;
            }
        };

        if !self.joined || !self.session.is_connected() {
            debug!(state = %self.session.state(), joined = self.joined, "Compose before join");
            return None;
        }

        let body = match payload::to_body(&message.to_payload()) {
            Ok(body) => body,
            Err(err) => {
                warn!(error = %err, "Chat message not encoded");
                return None;
            }
        };

        // The session logs and counts failures.
        self.session.send(destinations::CHAT, body).await.ok()?;
        self.composer.clear();
        Some(message)
    }

    /// Send whatever is in the input buffer.
    pub async fn submit(&mut self) -> Option<ChatMessage> {
        let text = self.composer.buffer().to_string();
        self.compose(&text).await
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.composer.set(text);
    }

    #[must_use]
    pub fn input(&self) -> &str {
        self.composer.buffer()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    #[cfg(test)]
    pub(crate) fn replace_transcript(&mut self, transcript: Transcript) {
        self.transcript = transcript;
    }

    /// Layout of the transcript as seen by the local identity.
    #[must_use]
    pub fn layout(&self) -> Vec<EntryLayout<'_>> {
        layout(self.transcript.messages(), &self.presence.identity().nickname)
    }

    /// Time label for `message`, if its timestamp is representable.
    #[must_use]
    pub fn time_label(&self, message: &ChatMessage) -> Option<String> {
        self.labels.label(message.timestamp_millis)
    }
}
