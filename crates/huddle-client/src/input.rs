//! Terminal input commands.

/// One line typed by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Leave the chat and exit.
    Quit,
    /// List connected users.
    Users,
    /// Force a user out.
    Kick(String),
    /// List the update feed.
    Updates,
    /// Print the command list.
    Help,
    /// Anything else is chat text, sent as typed.
    Message(String),
}

impl Input {
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        let Some(command) = trimmed.strip_prefix('/') else {
            return Input::Message(line.to_string());
        };

        let (name, arg) = command
            .split_once(char::is_whitespace)
            .map_or((command, ""), |(name, arg)| (name, arg.trim()));

        match (name, arg) {
            ("quit" | "exit", _) => Input::Quit,
            ("users", _) => Input::Users,
            ("kick", nickname) if !nickname.is_empty() => Input::Kick(nickname.to_string()),
            ("updates", _) => Input::Updates,
            ("help", _) => Input::Help,
            // Unknown commands go out as chat.
            _ => Input::Message(line.to_string()),
        }
    }
}

pub const HELP: &str = "/users  list connected users\n\
/kick <nickname>  remove a user\n\
/updates  list the update feed\n\
/quit  leave the chat";
