//! Session classifier
//!
//! Decides the role of a freshly accepted connection. The transition table
//! lives in `SessionState::on_line` and has no I/O, the async `classify`
//! driver performs the prompts, reads and registration around it.

use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::info;

use crate::connection::{read_line, write_str, Outbound, OutboundReceiver};
use crate::error::RelayError;
use crate::message::{
    Choice, CONSUMER_ACK, EMPTY_NAME, NAME_PROMPT, PRODUCER_ACK, ROLE_PROMPT, UNCLEAR_CHOICE,
};
use crate::registry::Registry;
use crate::types::ConnectionId;

/// States in which the classifier waits for a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Role prompt written, waiting for `p`, `c` or `chat`
    AwaitingRoleChoice,
    /// `chat` chosen, waiting for the display name
    ChatAwaitingName,
}

/// Role a session ends up in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Producer,
    Consumer,
    /// Candidate name, not yet registered
    Chat(String),
}

/// Result of feeding one line to a state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Write `text` and wait for the next line in `next`
    Reply {
        text: &'static str,
        next: SessionState,
    },
    /// Role decided, hand over to registration
    Assign(Role),
}

impl SessionState {
    /// Transition table
    pub fn on_line(self, line: &str) -> Transition {
        match self {
            SessionState::AwaitingRoleChoice => match Choice::parse(line) {
                Choice::Producer => Transition::Assign(Role::Producer),
                Choice::Consumer => Transition::Assign(Role::Consumer),
                Choice::Chat => Transition::Reply {
                    text: NAME_PROMPT,
                    next: SessionState::ChatAwaitingName,
                },
                Choice::Unclear => Transition::Reply {
                    text: UNCLEAR_CHOICE,
                    next: SessionState::AwaitingRoleChoice,
                },
            },
            SessionState::ChatAwaitingName => {
                let name = line.trim_end();
                if name.is_empty() {
                    Transition::Reply {
                        text: EMPTY_NAME,
                        next: SessionState::AwaitingRoleChoice,
                    }
                } else {
                    Transition::Assign(Role::Chat(name.to_string()))
                }
            }
        }
    }
}

/// What the connection task does after classification
#[derive(Debug)]
pub enum Assignment {
    /// Anonymous producer, not in the pool
    Producer,
    /// Registered consumer; the queue feeds its writer task
    Consumer(OutboundReceiver),
    /// Registered chat participant
    Chat {
        name: String,
        queue: OutboundReceiver,
    },
}

/// Run the classifier until the connection has a role
///
/// A taken name is reported to the client and the session starts over at
/// role selection. Any I/O error ends the session; the connection may
/// already be registered at that point, so callers remove `id` on error.
pub async fn classify<R, W>(
    reader: &mut R,
    writer: &mut W,
    id: ConnectionId,
    peer: &str,
    registry: &Registry,
) -> Result<Assignment, RelayError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut state = SessionState::AwaitingRoleChoice;

    loop {
        if state == SessionState::AwaitingRoleChoice {
            write_str(writer, ROLE_PROMPT).await?;
        }

        let line = read_line(reader).await?;

        match state.on_line(&line) {
            Transition::Reply { text, next } => {
                write_str(writer, text).await?;
                state = next;
            }
            Transition::Assign(Role::Producer) => {
                write_str(writer, PRODUCER_ACK).await?;
                info!(peer = %peer, "registered new producer");
                return Ok(Assignment::Producer);
            }
            Transition::Assign(Role::Consumer) => {
                // Registered before the ack, so an acked consumer is in the pool.
                let (outbound, queue) = Outbound::channel();
                registry
                    .register(id, peer.to_string(), String::new(), outbound)
                    .await?;
                write_str(writer, CONSUMER_ACK).await?;
                info!(peer = %peer, "registered new consumer");
                return Ok(Assignment::Consumer(queue));
            }
            Transition::Assign(Role::Chat(name)) => {
                let (outbound, queue) = Outbound::channel();
                match registry
                    .register(id, peer.to_string(), name.clone(), outbound)
                    .await
                {
                    Ok(()) => {
                        info!(peer = %peer, name = %name, "registered new chat member");
                        return Ok(Assignment::Chat { name, queue });
                    }
                    Err(e @ RelayError::NameTaken(_)) => {
                        write_str(writer, &format!("{}\n", e)).await?;
                        state = SessionState::AwaitingRoleChoice;
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};

    /// Feed `input` to a fresh session and collect everything it wrote
    async fn run_session(
        input: &str,
        registry: &Registry,
    ) -> (Result<Assignment, RelayError>, String) {
        let (mut input_tx, input_rx) = tokio::io::duplex(1024);
        let (mut output_tx, mut output_rx) = tokio::io::duplex(4096);
        input_tx.write_all(input.as_bytes()).await.unwrap();
        drop(input_tx);

        let mut reader = BufReader::new(input_rx);
        let result = classify(&mut reader, &mut output_tx, ConnectionId::new(), "test", registry).await;
        drop(output_tx);

        let mut output = String::new();
        output_rx.read_to_string(&mut output).await.unwrap();
        (result, output)
    }

    #[test]
    fn test_role_choice_transitions() {
        let state = SessionState::AwaitingRoleChoice;
        assert_eq!(state.on_line("p\n"), Transition::Assign(Role::Producer));
        assert_eq!(state.on_line("c\n"), Transition::Assign(Role::Consumer));
        assert_eq!(
            state.on_line("chat\n"),
            Transition::Reply {
                text: NAME_PROMPT,
                next: SessionState::ChatAwaitingName
            }
        );
        assert_eq!(
            state.on_line("x\n"),
            Transition::Reply {
                text: UNCLEAR_CHOICE,
                next: SessionState::AwaitingRoleChoice
            }
        );
    }

    #[test]
    fn test_chat_name_keeps_inner_spaces() {
        let state = SessionState::ChatAwaitingName;
        assert_eq!(
            state.on_line("gen. grievious\r\n"),
            Transition::Assign(Role::Chat("gen. grievious".to_string()))
        );
    }

    #[test]
    fn test_empty_chat_name_reprompts() {
        assert_eq!(
            SessionState::ChatAwaitingName.on_line("  \n"),
            Transition::Reply {
                text: EMPTY_NAME,
                next: SessionState::AwaitingRoleChoice
            }
        );
    }

    #[tokio::test]
    async fn test_consumer_is_registered() {
        let registry = Registry::new();
        let (result, output) = run_session("c\n", &registry).await;

        assert!(matches!(result, Ok(Assignment::Consumer(_))));
        assert_eq!(output, format!("{ROLE_PROMPT}{CONSUMER_ACK}"));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_producer_is_not_registered() {
        let registry = Registry::new();
        let (result, output) = run_session("p\n", &registry).await;

        assert!(matches!(result, Ok(Assignment::Producer)));
        assert_eq!(output, format!("{ROLE_PROMPT}{PRODUCER_ACK}"));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_unclear_choice_reprompts() {
        let registry = Registry::new();
        let (result, output) = run_session("consumer\np\n", &registry).await;

        assert!(matches!(result, Ok(Assignment::Producer)));
        assert_eq!(
            output,
            format!("{ROLE_PROMPT}{UNCLEAR_CHOICE}{ROLE_PROMPT}{PRODUCER_ACK}")
        );
    }

    #[tokio::test]
    async fn test_taken_name_retries_with_another() {
        let registry = Registry::new();
        let (holder, _queue) = Outbound::channel();
        registry
            .register(ConnectionId::new(), "other".into(), "alice".into(), holder)
            .await
            .unwrap();

        let (result, output) = run_session("chat\nalice\nchat\nbob\n", &registry).await;

        match result {
            Ok(Assignment::Chat { name, .. }) => assert_eq!(name, "bob"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(
            output,
            format!("{ROLE_PROMPT}{NAME_PROMPT}alice is already taken\n{ROLE_PROMPT}{NAME_PROMPT}")
        );
        assert!(registry.is_name_taken("bob").await);
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_eof_ends_session() {
        let registry = Registry::new();
        let (result, output) = run_session("chat\n", &registry).await;

        assert!(matches!(result, Err(RelayError::ConnectionClosed)));
        assert_eq!(output, format!("{ROLE_PROMPT}{NAME_PROMPT}"));
        assert!(registry.is_empty().await);
    }
}
