//! Message and line protocol definitions
//!
//! Newline-terminated text protocol. The server prompts, the client answers
//! with a role token, and from then on every line a producer sends becomes a
//! `Message` for the broadcaster.

/// Prompt written whenever a session (re)enters role selection
pub const ROLE_PROMPT: &str = "Type `c` for `consumer`, `p` for producer or `chat` for chat mode\n";
/// Reply to `p`
pub const PRODUCER_ACK: &str = "Entering `producer` mode\n";
/// Reply to `c`
pub const CONSUMER_ACK: &str = "Entering `consumer` mode\n";
/// Reply to `chat`
pub const NAME_PROMPT: &str = "Entering `chat` mode, enter your name:\n";
/// Reply to an unknown role token
pub const UNCLEAR_CHOICE: &str = "Unclear consumer/producer choice\n";
/// Reply to a blank chat name
pub const EMPTY_NAME: &str = "Name cannot be empty\n";

/// A single relayed message
///
/// `name` is empty for anonymous producers and holds the sender's display
/// name for chat participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub name: String,
    pub content: String,
}

impl Message {
    /// Create a new message
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Whether the message came from an anonymous producer
    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }

    /// Format the message as delivered to consumers
    pub fn output_string(&self) -> String {
        if self.is_anonymous() {
            format!("{}\n", self.content)
        } else {
            format!("{}: {}\n", self.name, self.content)
        }
    }

    /// Whether a pool entry with `name` must not receive this message
    ///
    /// Only named senders are excluded, and only from their own entry.
    pub fn excludes(&self, name: &str) -> bool {
        !self.is_anonymous() && self.name == name
    }
}

/// Role token sent by the client during classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// `p`
    Producer,
    /// `c`
    Consumer,
    /// `chat`
    Chat,
    /// Anything else
    Unclear,
}

impl Choice {
    /// Parse a raw input line (surrounding whitespace ignored)
    pub fn parse(line: &str) -> Self {
        match line.trim() {
            "p" => Choice::Producer,
            "c" => Choice::Consumer,
            "chat" => Choice::Chat,
            _ => Choice::Unclear,
        }
    }
}
