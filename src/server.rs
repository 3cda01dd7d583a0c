//! ChatServer Actor implementation
//!
//! The dispatcher: the one task that owns the account store and the
//! live-session registry. Sessions talk to it only through `Envelope`s
//! on a single mpsc channel, so every mutation of shared chat state is
//! applied in one global order and no locks are needed.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::account::{AccountStore, Credential};
use crate::client::Client;
use crate::error::AccountError;
use crate::markup::format_message;
use crate::message::ServerMessage;
use crate::room::Room;
use crate::types::{MessageId, SessionId};

/// Which authentication flow a session is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    Login,
    Register,
}

/// Session presence changes
#[derive(Debug)]
pub enum Lifecycle {
    /// An authenticated session enters the room
    Join {
        session_id: SessionId,
        who: String,
        username: String,
        sender: mpsc::Sender<ServerMessage>,
    },
    /// A session is gone; sent exactly once per session
    Leave { session_id: SessionId },
}

/// Units of work sent from sessions to the ChatServer actor
#[derive(Debug)]
pub enum Envelope {
    /// Login or registration; the outcome comes back on `reply`
    Auth {
        session_id: SessionId,
        kind: AuthKind,
        username: String,
        credential: Credential,
        reply: oneshot::Sender<Result<(), AccountError>>,
    },
    Lifecycle(Lifecycle),
    /// Room-wide message; `formatted` selects `/format` markup
    Broadcast {
        session_id: SessionId,
        text: String,
        formatted: bool,
    },
    /// `/msg <receiver> <text>`
    Private {
        session_id: SessionId,
        receiver: String,
        text: String,
    },
    Edit {
        session_id: SessionId,
        message_id: MessageId,
        text: String,
    },
    Delete {
        session_id: SessionId,
        message_id: MessageId,
    },
}

/// The main ChatServer actor
///
/// Processes envelopes one at a time. Delivery to sessions never
/// waits: see `Client::deliver`.
pub struct ChatServer {
    /// Registered accounts
    accounts: AccountStore,
    /// Joined sessions
    room: Room,
    /// Username -> session that authenticated as it (joined or not yet)
    bindings: HashMap<String, SessionId>,
    /// Envelope receiver channel
    receiver: mpsc::Receiver<Envelope>,
}

impl ChatServer {
    /// Create a new ChatServer with the given envelope receiver
    pub fn new(receiver: mpsc::Receiver<Envelope>) -> Self {
        Self {
            accounts: AccountStore::new(),
            room: Room::new(),
            bindings: HashMap::new(),
            receiver,
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Continuously receives and processes envelopes until all senders are dropped.
    pub async fn run(mut self) {
        info!("ChatServer started");

        while let Some(envelope) = self.receiver.recv().await {
            self.handle_envelope(envelope);
        }

        info!("ChatServer shutting down");
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    /// Process a single envelope
    pub fn handle_envelope(&mut self, envelope: Envelope) {
        match envelope {
            Envelope::Auth {
                session_id,
                kind,
                username,
                credential,
                reply,
            } => {
                let result = self.handle_auth(session_id, kind, username, credential);
                let _ = reply.send(result);
            }
            Envelope::Lifecycle(Lifecycle::Join {
                session_id,
                who,
                username,
                sender,
            }) => {
                self.handle_join(session_id, who, username, sender);
            }
            Envelope::Lifecycle(Lifecycle::Leave { session_id }) => {
                self.handle_leave(session_id);
            }
            Envelope::Broadcast {
                session_id,
                text,
                formatted,
            } => {
                self.handle_broadcast(session_id, text, formatted);
            }
            Envelope::Private {
                session_id,
                receiver,
                text,
            } => {
                self.handle_private(session_id, receiver, text);
            }
            Envelope::Edit {
                session_id,
                message_id,
                text,
            } => {
                self.handle_edit(session_id, message_id, text);
            }
            Envelope::Delete {
                session_id,
                message_id,
            } => {
                self.handle_delete(session_id, message_id);
            }
        }
    }

    /// Authenticate or register, and bind the account to the session
    ///
    /// An account can be bound to one session at a time; a second login
    /// is rejected until the first session leaves.
    fn handle_auth(
        &mut self,
        session_id: SessionId,
        kind: AuthKind,
        username: String,
        credential: Credential,
    ) -> Result<(), AccountError> {
        match kind {
            AuthKind::Login => {
                self.accounts.authenticate(&username, &credential)?;
                if self.bindings.contains_key(&username) {
                    info!("Session {} rejected: '{}' already online", session_id, username);
                    return Err(AccountError::AlreadyOnline);
                }
            }
            AuthKind::Register => {
                self.accounts.register(&username, credential)?;
                info!("Registered account '{}'", username);
            }
        }

        info!("Session {} authenticated as '{}'", session_id, username);
        self.bindings.insert(username, session_id);
        Ok(())
    }

    /// Handle a session entering the room
    fn handle_join(
        &mut self,
        session_id: SessionId,
        who: String,
        username: String,
        sender: mpsc::Sender<ServerMessage>,
    ) {
        if self.bindings.get(&username) != Some(&session_id) {
            warn!(
                "Session {} tried to join as '{}' without authenticating",
                session_id, username
            );
            return;
        }

        let client = Client::new(session_id, who, username.clone(), sender);
        if !self.room.join(client) {
            warn!("Session {} is already in the room", session_id);
            return;
        }
        self.accounts.set_online(&username, true);

        let announcement = ServerMessage::announcement(format!("{username} joined the room"));
        self.room.broadcast(&announcement, Some(session_id));

        if let Some(client) = self.room.get(session_id) {
            info!("'{}' joined from {} ({})", username, client.who, session_id);
        }
        debug!("Total sessions in room: {}", self.room.len());
    }

    /// Handle a session's departure
    ///
    /// Unknown sessions are ignored, so a repeated Leave is harmless.
    fn handle_leave(&mut self, session_id: SessionId) {
        self.bindings.retain(|_, bound| *bound != session_id);

        let Some(client) = self.room.leave(session_id) else {
            debug!("Session {} left without joining", session_id);
            return;
        };
        self.accounts.set_online(&client.username, false);

        info!(
            "'{}' left from {} ({}), {} messages dropped",
            client.username,
            client.who,
            session_id,
            client.dropped()
        );

        let announcement =
            ServerMessage::announcement(format!("{} has left the room", client.username));
        // Dropping the handle releases this side of the session's queue
        drop(client);
        self.room.broadcast(&announcement, None);

        debug!("Total sessions in room: {}", self.room.len());
    }

    /// Handle a chat line or `/format` message
    fn handle_broadcast(&mut self, session_id: SessionId, text: String, formatted: bool) {
        let Some(username) = self.username_of(session_id) else {
            debug!("Dropping broadcast from session {} outside the room", session_id);
            return;
        };

        let msg = if formatted {
            ServerMessage::Formatted {
                sender: username,
                text: format_message(&text),
            }
        } else {
            let Some(id) = self.accounts.append_message(&username, &text) else {
                return;
            };
            ServerMessage::Chat {
                id,
                sender_online: self.accounts.is_online(&username),
                sender: username,
                text,
            }
        };

        self.room.broadcast(&msg, None);
    }

    /// Handle a private message
    ///
    /// Goes to the sender's own session and the receiver's, if joined.
    /// An absent receiver is not an error.
    fn handle_private(&mut self, session_id: SessionId, receiver: String, text: String) {
        let Some(sender) = self.username_of(session_id) else {
            return;
        };

        let msg = ServerMessage::Private {
            sender: sender.clone(),
            text,
        };

        self.room.send_to(session_id, msg.clone());
        if receiver != sender && !self.room.send_to_username(&receiver, msg) {
            debug!("Private message from '{}' to absent '{}' dropped", sender, receiver);
        }
    }

    /// Handle `/edit`
    fn handle_edit(&mut self, session_id: SessionId, message_id: MessageId, text: String) {
        let Some(username) = self.username_of(session_id) else {
            return;
        };

        match self.accounts.edit_message(&username, message_id, &text) {
            Ok(()) => {
                let announcement = ServerMessage::announcement(format!(
                    "{username} edited message with ID {message_id}"
                ));
                self.room.broadcast(&announcement, None);
            }
            Err(e) => {
                self.room.send_to(session_id, e.into());
            }
        }
    }

    /// Handle `/delete`
    fn handle_delete(&mut self, session_id: SessionId, message_id: MessageId) {
        let Some(username) = self.username_of(session_id) else {
            return;
        };

        match self.accounts.delete_message(&username, message_id) {
            Ok(_) => {
                let announcement = ServerMessage::announcement(format!(
                    "{username} deleted message with ID {message_id}"
                ));
                self.room.broadcast(&announcement, None);
            }
            Err(e) => {
                self.room.send_to(session_id, e.into());
            }
        }
    }

    /// Helper: bound username of a joined session
    fn username_of(&self, session_id: SessionId) -> Option<String> {
        self.room.get(session_id).map(|c| c.username.clone())
    }
}
