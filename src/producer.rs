//! Producer reader
//!
//! Turns every inbound line of a producer or chat connection into a
//! `Message` on the pipeline. Nothing is written back to the client.

use std::future::Future;

use tokio::io::AsyncBufRead;
use tracing::debug;

use crate::connection::read_line;
use crate::error::RelayError;
use crate::message::Message;
use crate::pipeline::PipelineSender;

/// Read lines until the connection fails or `closed` resolves
///
/// Each line is trimmed and tagged with `name` (empty for anonymous
/// producers). Sending waits on the pipeline, so a busy broadcaster slows
/// the reader down. Returns `Ok(())` only when `closed` fired.
pub async fn run<R, F>(
    reader: &mut R,
    peer: &str,
    name: &str,
    pipeline: &PipelineSender,
    closed: F,
) -> Result<(), RelayError>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    tokio::pin!(closed);

    loop {
        let line = tokio::select! {
            _ = &mut closed => return Ok(()),
            line = read_line(reader) => line?,
        };

        let content = line.trim();
        debug!(producer = %peer, content = %content, name = %name, "message received");

        let msg = Message::new(name, content);
        tokio::select! {
            _ = &mut closed => return Ok(()),
            sent = pipeline.send(msg) => sent?,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::pending;

    use super::*;
    use crate::pipeline;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_lines_become_messages() {
        let (tx, mut rx) = pipeline::channel(8);
        let mut reader = BufReader::new(&b"  hello \nworld\r\n"[..]);

        let result = run(&mut reader, "test", "alice", &tx, pending()).await;
        assert!(matches!(result, Err(RelayError::ConnectionClosed)));

        assert_eq!(rx.recv().await, Some(Message::new("alice", "hello")));
        assert_eq!(rx.recv().await, Some(Message::new("alice", "world")));
    }

    #[tokio::test]
    async fn test_stops_when_closed() {
        let (tx, _rx) = pipeline::channel(1);
        let (_client, server) = tokio::io::duplex(64);
        let mut reader = BufReader::new(server);

        let result = run(&mut reader, "test", "", &tx, async {}).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_fails_when_pipeline_closed() {
        let (tx, rx) = pipeline::channel(1);
        drop(rx);
        let mut reader = BufReader::new(&b"orphan\n"[..]);

        let result = run(&mut reader, "test", "", &tx, pending()).await;
        assert!(matches!(result, Err(RelayError::PipelineClosed)));
    }
}
