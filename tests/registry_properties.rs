//! Property tests for the dispatcher registry and the formatter

use std::collections::HashSet;

use chat_room::{
    format_message, AccountError, AuthKind, ChatServer, Credential, Envelope, Input, Lifecycle,
    ServerMessage, SessionId,
};
use proptest::prelude::*;
use tokio::sync::{mpsc, oneshot};

const SLOTS: usize = 5;

#[derive(Debug, Clone)]
enum Op {
    Join(usize),
    Leave(usize),
    LeaveStranger,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..SLOTS).prop_map(Op::Join),
        (0..SLOTS).prop_map(Op::Leave),
        Just(Op::LeaveStranger),
    ]
}

fn username(slot: usize) -> String {
    format!("user{slot}")
}

fn auth(
    server: &mut ChatServer,
    session_id: SessionId,
    kind: AuthKind,
    username: String,
) -> Result<(), AccountError> {
    let (reply, mut verdict) = oneshot::channel();
    server.handle_envelope(Envelope::Auth {
        session_id,
        kind,
        username,
        credential: Credential::new("secret"),
        reply,
    });
    verdict.try_recv().unwrap()
}

fn join(server: &mut ChatServer, session_id: SessionId, username: String) -> mpsc::Receiver<ServerMessage> {
    let (sender, rx) = mpsc::channel(4);
    server.handle_envelope(Envelope::Lifecycle(Lifecycle::Join {
        session_id,
        who: "proptest".to_string(),
        username,
        sender,
    }));
    rx
}

proptest! {
    /// After any join/leave order the room holds exactly the sessions
    /// that joined and have not left, and online flags agree.
    #[test]
    fn registry_tracks_joins_minus_leaves(ops in prop::collection::vec(op_strategy(), 0..64)) {
        let (_tx, rx) = mpsc::channel(1);
        let mut server = ChatServer::new(rx);
        let mut registered = [false; SLOTS];
        let mut live: Vec<Option<(SessionId, mpsc::Receiver<ServerMessage>)>> =
            (0..SLOTS).map(|_| None).collect();

        for op in ops {
            match op {
                Op::Join(slot) => {
                    let id = SessionId::new();
                    if live[slot].is_some() {
                        // A second session for a bound account is turned away
                        prop_assert_eq!(
                            auth(&mut server, id, AuthKind::Login, username(slot)),
                            Err(AccountError::AlreadyOnline)
                        );
                        let _rx = join(&mut server, id, username(slot));
                        prop_assert!(!server.room().contains(id));
                        continue;
                    }
                    let kind = if registered[slot] { AuthKind::Login } else { AuthKind::Register };
                    prop_assert_eq!(auth(&mut server, id, kind, username(slot)), Ok(()));
                    registered[slot] = true;
                    let rx = join(&mut server, id, username(slot));
                    live[slot] = Some((id, rx));
                }
                Op::Leave(slot) => {
                    if let Some((id, _rx)) = live[slot].take() {
                        server.handle_envelope(Envelope::Lifecycle(Lifecycle::Leave { session_id: id }));
                    }
                }
                Op::LeaveStranger => {
                    server.handle_envelope(Envelope::Lifecycle(Lifecycle::Leave {
                        session_id: SessionId::new(),
                    }));
                }
            }
        }

        let expected: HashSet<SessionId> = live.iter().flatten().map(|(id, _)| *id).collect();
        let actual: HashSet<SessionId> = server.room().session_ids().collect();
        prop_assert_eq!(actual, expected);

        for (slot, entry) in live.iter().enumerate() {
            prop_assert_eq!(server.accounts().is_online(&username(slot)), entry.is_some());
        }
    }

    /// Text without any delimiter character passes through untouched
    #[test]
    fn format_is_identity_without_markup(text in "[^*_~`]*") {
        prop_assert_eq!(format_message(&text), text);
    }

    /// Line classification never panics
    #[test]
    fn parse_does_not_panic(line in "\\PC*") {
        let _ = Input::parse(&line);
    }
}
