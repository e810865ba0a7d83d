//! Frame types for the STOMP bus protocol.
//!
//! A frame is a command line, a block of `name:value` headers and an optional
//! body. Huddle only speaks the client side of the protocol, but the server
//! commands are modelled too so the codec can decode everything the bus sends.

use bytes::Bytes;
use std::fmt;
use std::str::FromStr;

use crate::codec::ProtocolError;

/// Header names used by the client.
pub mod headers {
    pub const ACCEPT_VERSION: &str = "accept-version";
    pub const HOST: &str = "host";
    pub const HEART_BEAT: &str = "heart-beat";
    pub const VERSION: &str = "version";
    pub const SESSION: &str = "session";
    pub const SERVER: &str = "server";
    pub const DESTINATION: &str = "destination";
    pub const ID: &str = "id";
    pub const SUBSCRIPTION: &str = "subscription";
    pub const MESSAGE_ID: &str = "message-id";
    pub const RECEIPT: &str = "receipt";
    pub const RECEIPT_ID: &str = "receipt-id";
    pub const CONTENT_TYPE: &str = "content-type";
    pub const CONTENT_LENGTH: &str = "content-length";
    pub const MESSAGE: &str = "message";
}

/// JSON content type attached to every outbound `SEND`.
pub const JSON_CONTENT_TYPE: &str = "application/json;charset=UTF-8";

/// STOMP commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    // Client commands
    Connect,
    Stomp,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Disconnect,
    // Server commands
    Connected,
    Message,
    Receipt,
    Error,
}

impl Command {
    /// Wire spelling of the command.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Ack => "ACK",
            Command::Nack => "NACK",
            Command::Disconnect => "DISCONNECT",
            Command::Connected => "CONNECTED",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    /// Whether header values of this command are exempt from escaping.
    ///
    /// STOMP 1.2 leaves `CONNECT` and `CONNECTED` headers unescaped for
    /// backwards compatibility with 1.0 peers.
    #[must_use]
    pub fn escapes_headers(self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

impl FromStr for Command {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECT" => Ok(Command::Connect),
            "STOMP" => Ok(Command::Stomp),
            "SEND" => Ok(Command::Send),
            "SUBSCRIBE" => Ok(Command::Subscribe),
            "UNSUBSCRIBE" => Ok(Command::Unsubscribe),
            "ACK" => Ok(Command::Ack),
            "NACK" => Ok(Command::Nack),
            "DISCONNECT" => Ok(Command::Disconnect),
            "CONNECTED" => Ok(Command::Connected),
            "MESSAGE" => Ok(Command::Message),
            "RECEIPT" => Ok(Command::Receipt),
            "ERROR" => Ok(Command::Error),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Heart-beat settings in milliseconds, as carried by the `heart-beat` header.
///
/// `outgoing` is how often the sender can emit heart-beats, `incoming` is how
/// often it wants to receive them. Zero means "never".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeartBeat {
    pub outgoing: u32,
    pub incoming: u32,
}

impl HeartBeat {
    #[must_use]
    pub const fn new(outgoing: u32, incoming: u32) -> Self {
        Self { outgoing, incoming }
    }

    /// Parse a `cx,cy` header value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not two comma-separated integers.
    pub fn parse(value: &str) -> Result<Self, ProtocolError> {
        let invalid = || ProtocolError::InvalidHeader(format!("heart-beat:{value}"));
        let (out, inc) = value.split_once(',').ok_or_else(invalid)?;
        Ok(Self {
            outgoing: out.trim().parse().map_err(|_| invalid())?,
            incoming: inc.trim().parse().map_err(|_| invalid())?,
        })
    }

    /// Interval at which the client must send heart-beats, given the server's
    /// advertised settings. `None` when heart-beating is disabled either side.
    #[must_use]
    pub fn negotiate_outgoing(&self, server: &HeartBeat) -> Option<u32> {
        if self.outgoing == 0 || server.incoming == 0 {
            None
        } else {
            Some(self.outgoing.max(server.incoming))
        }
    }
}

impl fmt::Display for HeartBeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.outgoing, self.incoming)
    }
}

/// A protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame command.
    pub command: Command,
    /// Headers in wire order. Repeated names are allowed; the first one wins.
    pub headers: Vec<(String, String)>,
    /// Frame body (may be empty).
    pub body: Bytes,
}

impl Frame {
    /// Create an empty frame for the given command.
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Append a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Look up a header value. Only the first occurrence is significant.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// The `destination` header, if any.
    #[must_use]
    pub fn destination(&self) -> Option<&str> {
        self.header(headers::DESTINATION)
    }

    /// Create a `CONNECT` frame.
    #[must_use]
    pub fn connect(host: impl Into<String>, accept_version: &str, heart_beat: HeartBeat) -> Self {
        Frame::new(Command::Connect)
            .with_header(headers::ACCEPT_VERSION, accept_version)
            .with_header(headers::HOST, host)
            .with_header(headers::HEART_BEAT, heart_beat.to_string())
    }

    /// Create a `CONNECTED` frame.
    #[must_use]
    pub fn connected(version: &str, heart_beat: HeartBeat) -> Self {
        Frame::new(Command::Connected)
            .with_header(headers::VERSION, version)
            .with_header(headers::HEART_BEAT, heart_beat.to_string())
    }

    /// Create a `SEND` frame carrying a JSON body.
    #[must_use]
    pub fn send(destination: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Frame::new(Command::Send)
            .with_header(headers::DESTINATION, destination)
            .with_header(headers::CONTENT_TYPE, JSON_CONTENT_TYPE)
            .with_body(body)
    }

    /// Create a `SUBSCRIBE` frame.
    #[must_use]
    pub fn subscribe(id: impl Into<String>, destination: impl Into<String>) -> Self {
        Frame::new(Command::Subscribe)
            .with_header(headers::ID, id)
            .with_header(headers::DESTINATION, destination)
    }

    /// Create an `UNSUBSCRIBE` frame.
    #[must_use]
    pub fn unsubscribe(id: impl Into<String>) -> Self {
        Frame::new(Command::Unsubscribe).with_header(headers::ID, id)
    }

    /// Create a `DISCONNECT` frame.
    #[must_use]
    pub fn disconnect() -> Self {
        Frame::new(Command::Disconnect)
    }

    /// Create a `MESSAGE` frame as a broker would deliver it.
    #[must_use]
    pub fn message(
        destination: impl Into<String>,
        subscription: impl Into<String>,
        message_id: impl Into<String>,
        body: impl Into<Bytes>,
    ) -> Self {
        Frame::new(Command::Message)
            .with_header(headers::DESTINATION, destination)
            .with_header(headers::SUBSCRIPTION, subscription)
            .with_header(headers::MESSAGE_ID, message_id)
            .with_header(headers::CONTENT_TYPE, JSON_CONTENT_TYPE)
            .with_body(body)
    }

    /// Create an `ERROR` frame.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Frame::new(Command::Error).with_header(headers::MESSAGE, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_parse() {
        assert_eq!("MESSAGE".parse::<Command>().unwrap(), Command::Message);
        assert_eq!("CONNECTED".parse::<Command>().unwrap(), Command::Connected);
        assert!(matches!(
            "message".parse::<Command>(),
            Err(ProtocolError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_first_header_wins() {
        let frame = Frame::new(Command::Message)
            .with_header("destination", "/topic/chat")
            .with_header("destination", "/topic/other");
        assert_eq!(frame.destination(), Some("/topic/chat"));
        assert_eq!(frame.header("subscription"), None);
    }

    #[test]
    fn test_heart_beat_negotiation() {
        let client = HeartBeat::new(10_000, 10_000);
        assert_eq!(
            client.negotiate_outgoing(&HeartBeat::new(0, 20_000)),
            Some(20_000)
        );
        assert_eq!(client.negotiate_outgoing(&HeartBeat::new(5_000, 0)), None);
        assert_eq!(HeartBeat::new(0, 0).negotiate_outgoing(&client), None);
    }

    #[test]
    fn test_heart_beat_parse() {
        assert_eq!(HeartBeat::parse("0, 25").unwrap(), HeartBeat::new(0, 25));
        assert!(HeartBeat::parse("10").is_err());
        assert!(HeartBeat::parse("a,b").is_err());
    }

    #[test]
    fn test_connect_headers_not_escaped() {
        assert!(!Command::Connect.escapes_headers());
        assert!(!Command::Connected.escapes_headers());
        assert!(Command::Send.escapes_headers());
    }
}
