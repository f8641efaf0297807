use std::fmt;

use crate::headers::Headers;

/// A simple representation of a STOMP frame.
///
/// `Frame` contains the command (e.g. "CONNECTED", "MESSAGE"), an ordered
/// list of headers and the text body. Frames received from the server are
/// built by [`crate::codec::decode`] and handed to handlers by reference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    /// STOMP command, or whatever the first line held when it is not one.
    pub command: String,
    /// Ordered headers; duplicates are preserved.
    pub headers: Headers,
    /// Text body, possibly empty.
    pub body: String,
}

impl Frame {
    /// Create a new frame with the given command and empty headers/body.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            headers: Headers::new(),
            body: String::new(),
        }
    }

    /// Add a header (builder style).
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(key, value);
        self
    }

    /// Set the frame body (builder style).
    pub fn set_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of header `key`, or `""` when absent.
    pub fn get_header(&self, key: &str) -> &str {
        self.headers.get(key)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Command: {}", self.command)?;
        write!(f, "{}", self.headers)?;
        writeln!(f, "Body ({} bytes)", self.body.len())
    }
}

/// Commands a STOMP server may send that this client acts on.
///
/// Anything else on the first line of an inbound frame is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerCommand {
    Connected,
    Message,
    Receipt,
    Error,
}

impl ServerCommand {
    /// Match a command line case-sensitively against the known verbs.
    pub fn parse(command: &str) -> Option<Self> {
        match command {
            "CONNECTED" => Some(ServerCommand::Connected),
            "MESSAGE" => Some(ServerCommand::Message),
            "RECEIPT" => Some(ServerCommand::Receipt),
            "ERROR" => Some(ServerCommand::Error),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServerCommand::Connected => "CONNECTED",
            ServerCommand::Message => "MESSAGE",
            ServerCommand::Receipt => "RECEIPT",
            ServerCommand::Error => "ERROR",
        }
    }
}
