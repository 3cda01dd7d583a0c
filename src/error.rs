//! Error types for the chat server
//!
//! Defines connection-level errors, account store signals, command
//! usage errors and delivery errors. Uses thiserror for ergonomic
//! error definitions.

use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Application-level errors
///
/// All of these end the affected connection; none of them is fatal
/// to the server process.
#[derive(Debug, Error)]
pub enum AppError {
    /// Line framing error (fatal for the connection)
    #[error("Line codec error: {0}")]
    Line(#[from] LinesCodecError),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (fatal - dispatcher or writer is gone)
    #[error("Channel send error")]
    ChannelSend,
}

/// Account store signals
///
/// The `Display` text of each variant is what the client is shown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    /// Registration of a username that is already taken
    #[error("Username already exists. Please try again.")]
    AlreadyExists,

    /// Unknown username or wrong credential (deliberately not distinguished)
    #[error("Invalid username or password. Please try again.")]
    InvalidCredentials,

    /// The account is already bound to another live session
    #[error("That account is already logged in elsewhere.")]
    AlreadyOnline,

    /// Empty username or one containing whitespace
    #[error("Usernames must be a single word. Please try again.")]
    InvalidUsername,

    /// Edit/delete target does not exist or is owned by someone else
    #[error("Invalid message ID or permission denied.")]
    MessageNotFound,
}

/// Protocol misuse detected while classifying an input line
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("Invalid usage. Use /msg <receiver> <message>")]
    PrivateMessage,

    #[error("Invalid usage. Use /format <message>")]
    Format,

    #[error("Invalid usage. Use /edit <message_id> <new_content> or /delete <message_id>")]
    Amend,

    #[error("Invalid message ID. Please provide a valid integer.")]
    MessageId,
}

/// Message send errors
///
/// Occurs when a non-blocking delivery to a session queue fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    /// The session's outbound queue is at capacity
    #[error("Channel full")]
    Full,

    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}
