//! Room struct definition
//!
//! The live-session registry: every session that has authenticated and
//! announced its join, keyed by session and indexed by username.

use std::collections::HashMap;

use crate::client::Client;
use crate::message::ServerMessage;
use crate::types::SessionId;

/// The single chat room
#[derive(Debug, Default)]
pub struct Room {
    /// Joined sessions: SessionId -> Client
    members: HashMap<SessionId, Client>,
    /// Bound username -> SessionId, for private delivery
    by_username: HashMap<String, SessionId>,
}

impl Room {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session to the room
    ///
    /// Returns false if the session or its username is already present.
    pub fn join(&mut self, client: Client) -> bool {
        if self.members.contains_key(&client.id) || self.by_username.contains_key(&client.username)
        {
            return false;
        }
        self.by_username.insert(client.username.clone(), client.id);
        self.members.insert(client.id, client);
        true
    }

    /// Remove a session, handing back its handle
    pub fn leave(&mut self, session_id: SessionId) -> Option<Client> {
        let client = self.members.remove(&session_id)?;
        self.by_username.remove(&client.username);
        Some(client)
    }

    pub fn contains(&self, session_id: SessionId) -> bool {
        self.members.contains_key(&session_id)
    }

    pub fn get(&self, session_id: SessionId) -> Option<&Client> {
        self.members.get(&session_id)
    }

    /// Queue `msg` for every member except `except`
    ///
    /// Per-client delivery failures are contained to that client.
    pub fn broadcast(&mut self, msg: &ServerMessage, except: Option<SessionId>) {
        for client in self.members.values_mut() {
            if Some(client.id) == except {
                continue;
            }
            let _ = client.deliver(msg.clone());
        }
    }

    /// Queue `msg` for the session bound to `username`, if it is here
    ///
    /// Returns whether anything was queued.
    pub fn send_to_username(&mut self, username: &str, msg: ServerMessage) -> bool {
        let Some(id) = self.by_username.get(username) else {
            return false;
        };
        match self.members.get_mut(id) {
            Some(client) => client.deliver(msg).is_ok(),
            None => false,
        }
    }

    /// Queue `msg` for one session
    pub fn send_to(&mut self, session_id: SessionId, msg: ServerMessage) -> bool {
        match self.members.get_mut(&session_id) {
            Some(client) => client.deliver(msg).is_ok(),
            None => false,
        }
    }

    pub fn session_ids(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.members.keys().copied()
    }

    /// Get the number of joined sessions
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
