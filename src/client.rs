//! Client struct definition
//!
//! The dispatcher's handle on a live session: who it is, which account
//! it is bound to, and the bounded channel its writer task drains.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::SessionId;

/// A joined session, as seen from the dispatcher
#[derive(Debug)]
pub struct Client {
    /// Unique identifier for the session
    pub id: SessionId,
    /// Peer address captured at accept time
    pub who: String,
    /// Bound account
    pub username: String,
    /// Server → Client message channel
    sender: mpsc::Sender<ServerMessage>,
    /// Messages discarded because the queue was full
    dropped: u64,
}

impl Client {
    /// Create a new client with the given identity and sender channel
    pub fn new(
        id: SessionId,
        who: String,
        username: String,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Self {
        Self {
            id,
            who,
            username,
            sender,
            dropped: 0,
        }
    }

    /// Queue a message for this client without waiting
    ///
    /// A full queue drops `msg`, the newest message, and counts it, so a
    /// slow reader never holds up the dispatcher.
    pub fn deliver(&mut self, msg: ServerMessage) -> Result<(), SendError> {
        match self.sender.try_send(msg) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                warn!(
                    "Outbound queue full for {} ({}), dropped {} so far",
                    self.username, self.id, self.dropped
                );
                Err(SendError::Full)
            }
            Err(TrySendError::Closed(_)) => Err(SendError::ChannelClosed),
        }
    }

    /// Number of messages dropped for this client so far
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(capacity: usize) -> (Client, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        let client = Client::new(
            SessionId::new(),
            "127.0.0.1:5000".to_string(),
            "alice".to_string(),
            tx,
        );
        (client, rx)
    }

    #[test]
    fn test_deliver() {
        let (mut client, mut rx) = client(4);

        client.deliver(ServerMessage::notice("hi")).unwrap();

        assert_eq!(rx.try_recv().unwrap(), ServerMessage::notice("hi"));
        assert_eq!(client.dropped(), 0);
    }

    #[test]
    fn test_full_queue_drops_newest() {
        let (mut client, mut rx) = client(1);

        client.deliver(ServerMessage::notice("first")).unwrap();
        assert_eq!(
            client.deliver(ServerMessage::notice("second")),
            Err(SendError::Full)
        );
        assert_eq!(client.dropped(), 1);

        assert_eq!(rx.try_recv().unwrap(), ServerMessage::notice("first"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_queue() {
        let (mut client, rx) = client(1);
        drop(rx);

        assert_eq!(
            client.deliver(ServerMessage::notice("anyone?")),
            Err(SendError::ChannelClosed)
        );
        assert_eq!(client.dropped(), 0);
    }
}
