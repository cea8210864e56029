//! Error types for the relay
//!
//! Defines relay-level errors and outbound queue send errors.
//! Uses thiserror for ergonomic error definitions.

use std::net::SocketAddr;

use thiserror::Error;

/// Relay errors
///
/// `NameTaken` is recoverable and is written back to the client as a
/// protocol reply. Every other variant is fatal to the connection it
/// happened on, except `Listen`, which aborts startup.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Chat name already claimed by another participant (recoverable)
    #[error("{0} is already taken")]
    NameTaken(String),

    /// Read or write failure on a connection (fatal to that connection)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Peer closed the stream
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// Input line exceeded the per-line byte limit
    #[error("Line longer than {0} bytes")]
    LineTooLong(usize),

    /// Unable to bind the listening socket (fatal to the process)
    #[error("unable to listen on {addr}: {source}")]
    Listen {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The broadcaster is no longer draining the pipeline
    #[error("Message pipeline closed")]
    PipelineClosed,
}

/// Outbound queue send errors
///
/// Occurs when the writer task of a connection has already stopped.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the queue has been closed
    #[error("Channel closed")]
    ChannelClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_taken_reply_text() {
        let err = RelayError::NameTaken("alice".to_string());
        assert_eq!(err.to_string(), "alice is already taken");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err: RelayError = io.into();
        assert!(matches!(err, RelayError::Io(_)));
    }
}
