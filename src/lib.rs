//! Line-based TCP Message Relay Library
//!
//! An in-memory relay: clients connect over TCP, pick a role, and every line
//! sent by a producer or chat participant is fanned out to every connected
//! consumer and chat participant.
//!
//! # Roles
//! - `p`: anonymous producer, lines are relayed as `<content>`
//! - `c`: anonymous consumer, receives everything
//! - `chat`: named participant, both producer and consumer; lines are
//!   relayed as `<name>: <content>` and never echoed back to the sender
//!
//! # Architecture
//! - Each connection runs the session classifier, then stays on as the
//!   producer reader (producer/chat) or an idle reader (consumer)
//! - A single `mpsc` pipeline carries messages to the `Broadcaster` task
//! - The `Registry` holds the consumer pool and the chat names behind two
//!   separate locks
//! - Every registered connection has one writer task, so the broadcaster
//!   never blocks on a socket
//!
//! # Example
//! ```ignore
//! use tcp_relay::{Config, Relay};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tcp_relay::RelayError> {
//!     let relay = Relay::bind(&Config::default()).await?;
//!     relay.run().await;
//!     Ok(())
//! }
//! ```

pub mod broadcaster;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod pipeline;
pub mod producer;
pub mod registry;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use broadcaster::Broadcaster;
pub use config::Config;
pub use error::{RelayError, SendError};
pub use message::{Choice, Message};
pub use registry::Registry;
pub use server::Relay;
pub use session::{Assignment, SessionState};
pub use types::ConnectionId;
