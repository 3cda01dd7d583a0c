//! Connection handler
//!
//! Runs one session per connection: greets the peer, walks it through
//! login or registration, then turns each input line into an `Envelope`
//! for the ChatServer. A separate writer task drains the session's
//! outbound queue to the socket.
//!
//! Session states: `Connected -> Authenticating -> Authenticated ->
//! Leaving -> Closed`. Every path out of the read loop goes through
//! `Leaving`, which sends exactly one `Lifecycle::Leave`.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

use crate::account::Credential;
use crate::config::SessionSettings;
use crate::error::{AccountError, AppError};
use crate::message::{Input, ServerMessage};
use crate::server::{AuthKind, Envelope, Lifecycle};
use crate::types::SessionId;

/// How long a finished session waits for its writer to flush
const WRITER_GRACE: Duration = Duration::from_secs(5);

const LOGIN_OR_REGISTER: &str = "Enter 'login' to log in or 'register' to register.";

/// Protocol state of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Authenticating,
    Authenticated { username: String },
    Leaving,
    Closed,
}

/// Handle a new TCP connection
///
/// The peer address becomes the session's display identity until it
/// authenticates.
pub async fn handle_connection(
    stream: TcpStream,
    envelopes: mpsc::Sender<Envelope>,
    settings: SessionSettings,
) -> Result<(), AppError> {
    let who = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", who);

    let (reader, writer) = stream.into_split();
    run_session(reader, writer, who, envelopes, settings).await
}

/// Run a session over any byte stream pair
pub async fn run_session<R, W>(
    reader: R,
    writer: W,
    who: String,
    envelopes: mpsc::Sender<Envelope>,
    settings: SessionSettings,
) -> Result<(), AppError>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let session_id = SessionId::new();
    info!("Session {} opened for {}", session_id, who);

    // Create channel for server -> client messages
    let (outbound, outbound_rx) = mpsc::channel::<ServerMessage>(settings.outbound_capacity);

    // Spawn write task (ServerMessage -> socket)
    let mut write_task = tokio::spawn(async move {
        if let Err(e) = write_lines(writer, outbound_rx).await {
            debug!("Write task for {} ended with error: {}", session_id, e);
        }
    });

    let mut session = Session {
        id: session_id,
        who,
        state: SessionState::Connected,
        lines: FramedRead::new(
            reader,
            LinesCodec::new_with_max_length(settings.max_line_length),
        ),
        outbound,
        envelopes,
    };

    let result = session.drive().await;
    session.leave().await;

    // Releases our sender; the writer finishes once the dispatcher has
    // processed the Leave and dropped its own.
    drop(session);
    if tokio::time::timeout(WRITER_GRACE, &mut write_task).await.is_err() {
        warn!("Writer for session {} did not finish, aborting", session_id);
        write_task.abort();
    }

    info!("Session {} closed", session_id);
    result
}

/// Drain the outbound queue to the wire, one line per message
async fn write_lines<W>(
    writer: W,
    mut outbound_rx: mpsc::Receiver<ServerMessage>,
) -> Result<(), AppError>
where
    W: AsyncWrite + Unpin,
{
    let mut sink = FramedWrite::new(writer, LinesCodec::new());
    while let Some(msg) = outbound_rx.recv().await {
        sink.send(msg.render()).await?;
    }
    SinkExt::<String>::close(&mut sink).await?;
    Ok(())
}

struct Session<R> {
    id: SessionId,
    who: String,
    state: SessionState,
    lines: FramedRead<R, LinesCodec>,
    outbound: mpsc::Sender<ServerMessage>,
    envelopes: mpsc::Sender<Envelope>,
}

impl<R> Session<R>
where
    R: AsyncRead + Unpin,
{
    /// Everything between accept and departure
    async fn drive(&mut self) -> Result<(), AppError> {
        self.greet().await?;

        let Some(username) = self.authenticate().await? else {
            debug!("Session {} ended before authenticating", self.id);
            return Ok(());
        };

        self.join(username).await?;
        self.chat().await
    }

    async fn greet(&mut self) -> Result<(), AppError> {
        self.notify(format!("Welcome to the room {}", self.who)).await?;
        self.notify("Please login or register.").await?;
        self.notify(LOGIN_OR_REGISTER).await?;
        self.state = SessionState::Authenticating;
        Ok(())
    }

    /// Loop until a login or registration succeeds
    ///
    /// Returns `None` if the stream ends first.
    async fn authenticate(&mut self) -> Result<Option<String>, AppError> {
        while let Some(line) = self.next_line().await? {
            let (kind, user_prompt, password_prompt) = match line.trim() {
                "login" => (AuthKind::Login, "Enter username: ", "Enter password: "),
                "register" => (
                    AuthKind::Register,
                    "Enter new username: ",
                    "Enter new password: ",
                ),
                _ => {
                    self.notify("Invalid command. Please enter 'login' or 'register'.")
                        .await?;
                    continue;
                }
            };

            self.notify(user_prompt).await?;
            let Some(username) = self.next_line().await? else {
                return Ok(None);
            };
            self.notify(password_prompt).await?;
            let Some(password) = self.next_line().await? else {
                return Ok(None);
            };

            let username = username.trim().to_string();
            match self
                .request_auth(kind, username.clone(), Credential::new(password))
                .await?
            {
                Ok(()) => {
                    let greeting = match kind {
                        AuthKind::Login => format!("Login successful. Welcome back, {username}!"),
                        AuthKind::Register => {
                            format!("Registration successful. Welcome, {username}!")
                        }
                    };
                    self.notify(greeting).await?;
                    return Ok(Some(username));
                }
                Err(e) => {
                    info!("Session {} {:?} as '{}' failed: {}", self.id, kind, username, e);
                    self.send(e.into()).await?;
                    self.notify(LOGIN_OR_REGISTER).await?;
                }
            }
        }
        Ok(None)
    }

    /// Ask the dispatcher to authenticate and wait for its verdict
    async fn request_auth(
        &mut self,
        kind: AuthKind,
        username: String,
        credential: Credential,
    ) -> Result<Result<(), AccountError>, AppError> {
        let (reply, verdict) = oneshot::channel();
        self.submit(Envelope::Auth {
            session_id: self.id,
            kind,
            username,
            credential,
            reply,
        })
        .await?;
        verdict.await.map_err(|_| AppError::ChannelSend)
    }

    async fn join(&mut self, username: String) -> Result<(), AppError> {
        self.submit(Envelope::Lifecycle(Lifecycle::Join {
            session_id: self.id,
            who: self.who.clone(),
            username: username.clone(),
            sender: self.outbound.clone(),
        }))
        .await?;

        info!("Session {} ({}) is chatting as '{}'", self.id, self.who, username);
        self.state = SessionState::Authenticated { username };

        self.notify(
            "Commands: /msg <user> <message>, /format <message>, \
             /edit <message_id> <new_content>, /delete <message_id>",
        )
        .await
    }

    /// The chat phase: classify each line and route it
    async fn chat(&mut self) -> Result<(), AppError> {
        while let Some(line) = self.next_line().await? {
            let session_id = self.id;
            let envelope = match Input::parse(&line) {
                Ok(Input::Blank) => continue,
                Ok(Input::Chat { text }) => Envelope::Broadcast {
                    session_id,
                    text,
                    formatted: false,
                },
                Ok(Input::Format { text }) => Envelope::Broadcast {
                    session_id,
                    text,
                    formatted: true,
                },
                Ok(Input::Private { receiver, text }) => Envelope::Private {
                    session_id,
                    receiver,
                    text,
                },
                Ok(Input::Edit { id, text }) => Envelope::Edit {
                    session_id,
                    message_id: id,
                    text,
                },
                Ok(Input::Delete { id }) => Envelope::Delete {
                    session_id,
                    message_id: id,
                },
                Err(e) => {
                    self.send(e.into()).await?;
                    continue;
                }
            };
            self.submit(envelope).await?;
        }
        Ok(())
    }

    /// Announce departure exactly once
    async fn leave(&mut self) {
        if matches!(self.state, SessionState::Leaving | SessionState::Closed) {
            return;
        }
        self.state = SessionState::Leaving;

        let leave = Envelope::Lifecycle(Lifecycle::Leave {
            session_id: self.id,
        });
        if self.envelopes.send(leave).await.is_err() {
            debug!("Server closed before session {} could leave", self.id);
        }

        self.state = SessionState::Closed;
    }

    /// Next input line; `None` at end of stream
    ///
    /// Oversized lines are reported to the client and skipped.
    async fn next_line(&mut self) -> Result<Option<String>, AppError> {
        let mut after_error = false;
        loop {
            match self.lines.next().await {
                // FramedRead yields a single None after a decode error and
                // then resumes reading, so that one is not end of stream.
                None if after_error => after_error = false,
                None => return Ok(None),
                Some(Ok(line)) => return Ok(Some(line)),
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    warn!("Session {} sent an oversized line, skipping it", self.id);
                    self.notify(format!(
                        "Line too long (limit {} bytes); ignored.",
                        self.lines.decoder().max_length()
                    ))
                    .await?;
                    after_error = true;
                }
                Some(Err(LinesCodecError::Io(e))) => return Err(e.into()),
            }
        }
    }

    async fn submit(&mut self, envelope: Envelope) -> Result<(), AppError> {
        self.envelopes
            .send(envelope)
            .await
            .map_err(|_| AppError::ChannelSend)
    }

    async fn notify(&mut self, text: impl Into<String>) -> Result<(), AppError> {
        self.send(ServerMessage::notice(text)).await
    }

    /// Queue a message for this session only
    async fn send(&mut self, msg: ServerMessage) -> Result<(), AppError> {
        self.outbound
            .send(msg)
            .await
            .map_err(|_| AppError::ChannelSend)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    use super::*;
    use crate::server::ChatServer;

    #[tokio::test]
    async fn test_greeting_and_invalid_command() {
        let (client, server_side) = tokio::io::duplex(4096);
        let (reader, writer) = tokio::io::split(server_side);
        let (envelopes, _rx) = mpsc::channel(16);

        let session = tokio::spawn(run_session(
            reader,
            writer,
            "peer:1".to_string(),
            envelopes,
            SessionSettings::default(),
        ));

        let (client_read, mut client_write) = tokio::io::split(client);
        let mut lines = BufReader::new(client_read).lines();

        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "Welcome to the room peer:1"
        );
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "Please login or register."
        );
        assert_eq!(lines.next_line().await.unwrap().unwrap(), LOGIN_OR_REGISTER);

        client_write.write_all(b"hello\n").await.unwrap();
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "Invalid command. Please enter 'login' or 'register'."
        );

        drop(client_write);
        drop(lines);
        session.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_unauthenticated_departure_sends_single_leave() {
        let (client, server_side) = tokio::io::duplex(4096);
        let (reader, writer) = tokio::io::split(server_side);
        let (envelopes, mut rx) = mpsc::channel(16);

        let session = tokio::spawn(run_session(
            reader,
            writer,
            "peer:2".to_string(),
            envelopes,
            SessionSettings::default(),
        ));
        drop(client);
        // The writer may already have failed against the closed peer
        let _ = session.await.unwrap();

        let mut leaves = 0;
        while let Ok(envelope) = rx.try_recv() {
            if matches!(envelope, Envelope::Lifecycle(Lifecycle::Leave { .. })) {
                leaves += 1;
            }
        }
        assert_eq!(leaves, 1);
    }

    #[tokio::test]
    async fn test_oversized_line_is_skipped() {
        let (client, server_side) = tokio::io::duplex(4096);
        let (reader, writer) = tokio::io::split(server_side);
        let (envelopes, envelope_rx) = mpsc::channel(16);
        tokio::spawn(ChatServer::new(envelope_rx).run());
        let settings = SessionSettings {
            outbound_capacity: 8,
            max_line_length: 16,
        };

        let session = tokio::spawn(run_session(
            reader,
            writer,
            "peer:3".to_string(),
            envelopes,
            settings,
        ));

        let (client_read, mut client_write) = tokio::io::split(client);
        let mut lines = BufReader::new(client_read).lines();
        client_write
            .write_all(b"this line is far too long for the limit\nregister\nalice\nsecret\n")
            .await
            .unwrap();

        let mut seen = Vec::new();
        loop {
            let line = tokio::time::timeout(Duration::from_secs(2), lines.next_line())
                .await
                .expect("session stalled")
                .unwrap()
                .expect("session closed early");
            let done = line.starts_with("Registration successful");
            seen.push(line);
            if done {
                break;
            }
        }
        assert!(seen.contains(&"Line too long (limit 16 bytes); ignored.".to_string()));
        assert_eq!(
            seen.last().unwrap(),
            "Registration successful. Welcome, alice!"
        );

        drop(client_write);
        drop(lines);
        // The writer may already have failed against the closed peer
        let _ = session.await.unwrap();
    }
}
