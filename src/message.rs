//! Line protocol definitions
//!
//! `Input` classifies one client line in the chat phase; `ServerMessage`
//! is everything that travels down a session's outbound queue and knows
//! how to render itself as a single line of terminal text.

use crate::error::UsageError;
use crate::types::MessageId;

const RESET: &str = "\x1b[0m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";

/// Client → Server line, after authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// `/msg <receiver> <text>`
    Private { receiver: String, text: String },
    /// `/format <text>`
    Format { text: String },
    /// `/edit <id> <text>`
    Edit { id: MessageId, text: String },
    /// `/delete <id> [ignored...]`
    Delete { id: MessageId },
    /// Any other non-blank line
    Chat { text: String },
    /// Whitespace only
    Blank,
}

impl Input {
    /// Classify a raw input line
    ///
    /// Commands are recognized by their first token only; anything else,
    /// including unknown `/words`, is plain chat.
    pub fn parse(line: &str) -> Result<Self, UsageError> {
        if line.trim().is_empty() {
            return Ok(Input::Blank);
        }

        let trimmed = line.trim_start();
        let command = trimmed.split_whitespace().next().unwrap_or_default();
        let args = &trimmed[command.len()..];
        match command {
            "/msg" => {
                let (receiver, text) = split_word(args);
                if receiver.is_empty() || text.trim().is_empty() {
                    return Err(UsageError::PrivateMessage);
                }
                Ok(Input::Private {
                    receiver: receiver.to_string(),
                    text: text.to_string(),
                })
            }
            "/format" => {
                let text = args.trim_start();
                if text.is_empty() {
                    return Err(UsageError::Format);
                }
                Ok(Input::Format {
                    text: text.to_string(),
                })
            }
            "/edit" => {
                let (id, text) = split_word(args);
                if id.is_empty() || text.trim().is_empty() {
                    return Err(UsageError::Amend);
                }
                Ok(Input::Edit {
                    id: parse_id(id)?,
                    text: text.to_string(),
                })
            }
            "/delete" => match split_word(args) {
                ("", _) => Err(UsageError::Amend),
                (id, _) => Ok(Input::Delete { id: parse_id(id)? }),
            },
            _ => Ok(Input::Chat {
                text: line.to_string(),
            }),
        }
    }
}

/// Split off the first word; any whitespace separates it from the rest
fn split_word(args: &str) -> (&str, &str) {
    let args = args.trim_start();
    match args.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (args, ""),
    }
}

fn parse_id(raw: &str) -> Result<MessageId, UsageError> {
    raw.parse().map_err(|_| UsageError::MessageId)
}

/// Server → Client line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Prompts, replies and errors meant for one client only
    Notice(String),
    /// Plain room-wide announcement (joins, leaves, edits, deletes)
    Announcement(String),
    /// Ordinary chat line, presence-marked by the sender's online flag
    Chat {
        id: MessageId,
        sender: String,
        text: String,
        sender_online: bool,
    },
    /// `/format` output; `text` already carries its control sequences
    Formatted { sender: String, text: String },
    /// Private line, delivered to sender and receiver only
    Private { sender: String, text: String },
}

impl ServerMessage {
    pub fn notice(text: impl Into<String>) -> Self {
        ServerMessage::Notice(text.into())
    }

    pub fn announcement(text: impl Into<String>) -> Self {
        ServerMessage::Announcement(text.into())
    }

    /// Render as one line of terminal text (without the newline)
    pub fn render(&self) -> String {
        match self {
            ServerMessage::Notice(text) | ServerMessage::Announcement(text) => text.clone(),
            ServerMessage::Chat {
                id,
                sender,
                text,
                sender_online,
            } => {
                let color = if *sender_online { GREEN } else { RED };
                format!("{color}●{RESET} #{id} {sender}: {text}")
            }
            ServerMessage::Formatted { sender, text } => format!("{sender}: {text}"),
            ServerMessage::Private { sender, text } => {
                format!("{YELLOW}{sender} (private): {text}{RESET}")
            }
        }
    }
}

impl From<crate::error::AccountError> for ServerMessage {
    fn from(err: crate::error::AccountError) -> Self {
        ServerMessage::Notice(err.to_string())
    }
}

impl From<UsageError> for ServerMessage {
    fn from(err: UsageError) -> Self {
        ServerMessage::Notice(err.to_string())
    }
}
