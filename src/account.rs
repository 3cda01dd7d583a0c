//! In-memory account registry
//!
//! Maps username -> credential, online flag and authored-message history.
//! The store is not synchronized: it is owned by the `ChatServer` actor
//! and only ever touched from its event loop.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::AccountError;
use crate::types::MessageId;

/// Login secret
///
/// Compared in plaintext. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// A chat line its author may later edit or delete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthoredMessage {
    pub id: MessageId,
    pub sender: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A registered identity
#[derive(Debug)]
pub struct Account {
    pub username: String,
    credential: Credential,
    pub online: bool,
    messages: Vec<AuthoredMessage>,
    last_id: MessageId,
}

impl Account {
    fn new(username: String, credential: Credential) -> Self {
        Self {
            username,
            credential,
            online: false,
            messages: Vec::new(),
            last_id: MessageId(0),
        }
    }

    /// Authored messages, oldest first
    pub fn messages(&self) -> &[AuthoredMessage] {
        &self.messages
    }

    fn position(&self, id: MessageId) -> Option<usize> {
        self.messages
            .iter()
            .position(|m| m.id == id && m.sender == self.username)
    }
}

/// Check that a username can be addressed by `/msg`
pub fn validate_username(username: &str) -> Result<(), AccountError> {
    if username.is_empty() || username.chars().any(char::is_whitespace) {
        return Err(AccountError::InvalidUsername);
    }
    Ok(())
}

/// Username -> Account registry
#[derive(Debug, Default)]
pub struct AccountStore {
    accounts: HashMap<String, Account>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an account with empty history, offline
    pub fn register(
        &mut self,
        username: &str,
        credential: Credential,
    ) -> Result<&Account, AccountError> {
        validate_username(username)?;
        if self.accounts.contains_key(username) {
            return Err(AccountError::AlreadyExists);
        }

        let account = self
            .accounts
            .entry(username.to_string())
            .or_insert_with(|| Account::new(username.to_string(), credential));
        Ok(account)
    }

    /// Check a username/credential pair
    ///
    /// Unknown users and wrong credentials produce the same error.
    pub fn authenticate(
        &self,
        username: &str,
        credential: &Credential,
    ) -> Result<&Account, AccountError> {
        match self.accounts.get(username) {
            Some(account) if account.credential == *credential => Ok(account),
            _ => Err(AccountError::InvalidCredentials),
        }
    }

    pub fn get(&self, username: &str) -> Option<&Account> {
        self.accounts.get(username)
    }

    pub fn is_online(&self, username: &str) -> bool {
        self.accounts.get(username).is_some_and(|a| a.online)
    }

    /// Idempotent; unknown usernames are ignored
    pub fn set_online(&mut self, username: &str, online: bool) {
        if let Some(account) = self.accounts.get_mut(username) {
            account.online = online;
        }
    }

    /// Record a chat line and return its newly assigned id
    ///
    /// Returns `None` for an unknown username.
    pub fn append_message(&mut self, username: &str, content: &str) -> Option<MessageId> {
        let account = self.accounts.get_mut(username)?;
        let id = account.last_id.next();
        account.last_id = id;
        account.messages.push(AuthoredMessage {
            id,
            sender: username.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
        });
        Some(id)
    }

    pub fn find_owned_message(
        &self,
        username: &str,
        id: MessageId,
    ) -> Result<&AuthoredMessage, AccountError> {
        let account = self
            .accounts
            .get(username)
            .ok_or(AccountError::MessageNotFound)?;
        account
            .position(id)
            .map(|i| &account.messages[i])
            .ok_or(AccountError::MessageNotFound)
    }

    /// Replace the content of an owned message and refresh its timestamp
    pub fn edit_message(
        &mut self,
        username: &str,
        id: MessageId,
        content: &str,
    ) -> Result<(), AccountError> {
        let account = self
            .accounts
            .get_mut(username)
            .ok_or(AccountError::MessageNotFound)?;
        let index = account.position(id).ok_or(AccountError::MessageNotFound)?;

        let message = &mut account.messages[index];
        message.content = content.to_string();
        message.timestamp = Utc::now();
        Ok(())
    }

    /// Remove an owned message, returning it
    pub fn delete_message(
        &mut self,
        username: &str,
        id: MessageId,
    ) -> Result<AuthoredMessage, AccountError> {
        let account = self
            .accounts
            .get_mut(username)
            .ok_or(AccountError::MessageNotFound)?;
        let index = account.position(id).ok_or(AccountError::MessageNotFound)?;
        Ok(account.messages.remove(index))
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}
