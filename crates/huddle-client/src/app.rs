//! The terminal event loop.
//!
//! [`run`] mounts the view, multiplexes session events, operator input and
//! Ctrl-C, and always unmounts before returning, whether the loop ended
//! cleanly or on an I/O error.

use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufRead, Lines};
use tracing::{error, info, warn};

use crate::input::{Input, HELP};
use crate::services::{HttpServices, UpdateFeed, UserRoster};
use crate::{ChatView, Renderer, ViewUpdate};

/// Drive `view` until the operator quits or the session ends.
///
/// # Errors
///
/// Returns the first stdin or stdout error, after cleanup has run.
pub async fn run<R, W>(
    view: &mut ChatView,
    renderer: &Renderer,
    services: Option<&HttpServices>,
    lines: Lines<R>,
    out: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    view.mount();
    let result = event_loop(view, renderer, services, lines, out).await;
    if let Err(e) = &result {
        error!(error = %e, "Terminal I/O failed");
    }
    view.unmount().await;
    result
}

async fn event_loop<R, W>(
    view: &mut ChatView,
    renderer: &Renderer,
    services: Option<&HttpServices>,
    mut lines: Lines<R>,
    out: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    redraw(renderer, view, out)?;

    loop {
        tokio::select! {
            event = view.next_event() => match view.handle(event).await {
                ViewUpdate::Ignored => {}
                ViewUpdate::Ended(reason) => {
                    redraw(renderer, view, out)?;
                    match reason {
                        Some(e) => error!("Chat session ended: {}", e),
                        None => info!("Chat session closed by the bus"),
                    }
                    return Ok(());
                }
                ViewUpdate::Joined | ViewUpdate::Appended => redraw(renderer, view, out)?,
            },

            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(());
                };
                match Input::parse(&line) {
                    Input::Quit => return Ok(()),
                    Input::Help => eprintln!("{HELP}"),
                    Input::Message(text) => {
                        view.set_input(text);
                        if view.submit().await.is_none() {
                            warn!(state = %view.state(), "Message not sent");
                        }
                    }
                    command => run_command(services, command).await,
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                return Ok(());
            }
        }
    }
}

fn redraw<W: Write>(renderer: &Renderer, view: &ChatView, out: &mut W) -> Result<()> {
    write!(out, "\x1b[2J\x1b[H")?;
    for line in renderer.render(view) {
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(())
}

async fn run_command(services: Option<&HttpServices>, command: Input) {
    let Some(services) = services else {
        warn!("REST services are not available offline");
        return;
    };

    match command {
        Input::Users => match services.connected().await {
            Ok(users) => {
                for user in users {
                    eprintln!("{} (character {})", user.nickname, user.character_id);
                }
            }
            Err(e) => error!("Failed to list users: {}", e),
        },
        Input::Kick(nickname) => match services.remove(&nickname).await {
            Ok(()) => info!(nickname = %nickname, "User removed"),
            Err(e) => error!("Failed to remove {}: {}", nickname, e),
        },
        Input::Updates => match services.list().await {
            Ok(updates) => {
                for update in updates {
                    let date = update.date.as_deref().unwrap_or("-");
                    eprintln!("#{} [{}] {}", update.id, date, update.title);
                }
            }
            Err(e) => error!("Failed to list updates: {}", e),
        },
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Session, SessionConfig, SessionState};
    use huddle_core::Presence;
    use huddle_protocol::{destinations, Command};
    use huddle_transport::MemoryBus;
    use std::io;
    use std::sync::Arc;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    /// Accepts `flushes` redraws, then fails like a closed pipe.
    struct BrokenAfter {
        flushes: usize,
    }

    impl Write for BrokenAfter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            if self.flushes == 0 {
                return Err(io::ErrorKind::BrokenPipe.into());
            }
            self.flushes -= 1;
            Ok(())
        }
    }

    fn view(bus: &MemoryBus) -> ChatView {
        let session = Session::new(Arc::new(bus.transport()), SessionConfig::default());
        ChatView::new(session, Presence::default())
    }

    #[tokio::test]
    async fn test_output_error_still_leaves_and_disconnects() {
        let bus = MemoryBus::new();
        let mut view = view(&bus);
        // Held open so stdin never reaches end of input.
        let (_stdin, reader) = tokio::io::duplex(64);
        let mut out = BrokenAfter { flushes: 1 };

        let result = run(
            &mut view,
            &Renderer::default(),
            None,
            BufReader::new(reader).lines(),
            &mut out,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(view.state(), SessionState::Disconnected);
        assert_eq!(bus.sent_to(destinations::LEAVE).len(), 1);
        let last = bus.sent_frames().pop().map(|f| f.command);
        assert_eq!(last, Some(Command::Disconnect));
        assert_eq!(bus.live_connections(), 0);
    }

    #[tokio::test]
    async fn test_quit_sends_typed_message_then_cleans_up() {
        let bus = MemoryBus::new().with_route(destinations::CHAT, destinations::CHAT_TOPIC);
        let mut view = view(&bus);
        let (mut stdin, reader) = tokio::io::duplex(64);
        let mut out = Vec::new();
        let renderer = Renderer::default();

        let driver = run(
            &mut view,
            &renderer,
            None,
            BufReader::new(reader).lines(),
            &mut out,
        );
        let typist = async {
            // Let the handshake and join complete first.
            while bus.sent_to(destinations::JOIN).is_empty() {
                tokio::task::yield_now().await;
            }
            stdin.write_all(b"hello\n/quit\n").await.unwrap();
        };
        let (result, ()) = tokio::join!(driver, typist);

        assert!(result.is_ok());
        assert_eq!(bus.sent_to(destinations::CHAT).len(), 1);
        assert_eq!(bus.sent_to(destinations::LEAVE).len(), 1);
        assert_eq!(view.state(), SessionState::Disconnected);
        assert!(!out.is_empty());
    }
}
