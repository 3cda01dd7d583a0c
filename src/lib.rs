//! Line-oriented Chat Room Server Library
//!
//! A multi-user chat room over plain newline-delimited TCP, built on tokio
//! using the Actor pattern for state management.
//!
//! # Features
//! - Login and registration against an in-memory account registry
//! - Public chat lines with a presence marker and a server-assigned id
//! - Private messages (`/msg`)
//! - Inline markup (`/format`)
//! - Editing and deleting one's own earlier lines (`/edit`, `/delete`)
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` is the central actor owning accounts and the room
//! - Each connection runs a session task plus a writer task
//! - No locks needed - all state access goes through message passing
//! - Per-session outbound queues are bounded; a full queue drops the
//!   newest message for that session only
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use tokio::sync::mpsc;
//! use chat_room::{handle_connection, ChatServer, SessionSettings};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     let (envelope_tx, envelope_rx) = mpsc::channel(256);
//!
//!     tokio::spawn(ChatServer::new(envelope_rx).run());
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         let envelope_tx = envelope_tx.clone();
//!         tokio::spawn(handle_connection(stream, envelope_tx, SessionSettings::default()));
//!     }
//! }
//! ```

pub mod account;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod markup;
pub mod message;
pub mod room;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use account::{Account, AccountStore, AuthoredMessage, Credential};
pub use client::Client;
pub use config::{ServerConfig, SessionSettings};
pub use error::{AccountError, AppError, SendError, UsageError};
pub use handler::{handle_connection, run_session, SessionState};
pub use markup::format_message;
pub use message::{Input, ServerMessage};
pub use room::Room;
pub use server::{AuthKind, ChatServer, Envelope, Lifecycle};
pub use types::{MessageId, SessionId};
