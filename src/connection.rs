//! Per-connection plumbing
//!
//! Line reading, the outbound queue and writer task that serialize every
//! write to a registered connection, and the error/lifecycle handler.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, Level};

use crate::error::{RelayError, SendError};
use crate::types::ConnectionId;

/// Longest accepted input line, newline included
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Sender half of the failure channel drained by the broadcaster
pub type FailureSender = mpsc::UnboundedSender<ConnectionId>;

/// Receiver half of the failure channel
pub type FailureReceiver = mpsc::UnboundedReceiver<ConnectionId>;

/// Receiving end of an outbound queue, consumed by the writer task
pub type OutboundReceiver = mpsc::UnboundedReceiver<String>;

/// Outbound queue of a consumer-equivalent connection
///
/// Stored in the registry. Sending never blocks, so one slow peer cannot
/// stall the broadcaster. Dropping every clone stops the writer task.
#[derive(Debug, Clone)]
pub struct Outbound {
    sender: mpsc::UnboundedSender<String>,
}

impl Outbound {
    /// Create a queue; the receiver goes to `spawn_writer`
    pub fn channel() -> (Self, OutboundReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Queue a formatted line for delivery
    pub fn send(&self, line: String) -> Result<(), SendError> {
        self.sender.send(line).map_err(|_| SendError::ChannelClosed)
    }

    /// Whether the writer task has already stopped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Resolves once the writer task of a connection has stopped
#[derive(Debug)]
pub struct Closed(oneshot::Receiver<()>);

impl Future for Closed {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        Pin::new(&mut self.0).poll(cx).map(|_| ())
    }
}

/// Read one newline-terminated line
///
/// Bytes are decoded lossily. EOF, including a trailing fragment without a
/// newline, is reported as `ConnectionClosed`. A line reaching
/// `MAX_LINE_BYTES` without a newline fails with `LineTooLong`.
pub async fn read_line<R>(reader: &mut R) -> Result<String, RelayError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let n = (&mut *reader)
        .take(MAX_LINE_BYTES as u64)
        .read_until(b'\n', &mut buf)
        .await?;
    if buf.last() != Some(&b'\n') {
        if n == MAX_LINE_BYTES {
            return Err(RelayError::LineTooLong(MAX_LINE_BYTES));
        }
        return Err(RelayError::ConnectionClosed);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Write a full reply and flush it
pub async fn write_str<W>(writer: &mut W, text: &str) -> Result<(), RelayError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(text.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Spawn the writer task owning the write half of a registered connection
///
/// Lines are written in queue order. On the first write failure the error
/// is logged and `id` is reported on `failures` so the broadcaster can drop
/// the connection from the pool. The write half is shut down when the task
/// ends, whatever the reason.
pub fn spawn_writer<W>(
    id: ConnectionId,
    peer: String,
    mut writer: W,
    mut queue: OutboundReceiver,
    failures: FailureSender,
) -> Closed
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (closed_tx, closed_rx) = oneshot::channel();

    tokio::spawn(async move {
        while let Some(line) = queue.recv().await {
            if let Err(e) = write_str(&mut writer, &line).await {
                handle_connection_error(&peer, &e);
                let _ = failures.send(id);
                break;
            }
        }
        drop(queue);
        let _ = writer.shutdown().await;
        debug!(peer = %peer, connection = %id, "writer task ended");
        let _ = closed_tx.send(());
    });

    Closed(closed_rx)
}

/// Read and discard consumer input until the writer stops
///
/// A consumer only listens, so EOF on its read side (a half-close) is not a
/// reason to drop it: reading stops and the connection stays registered
/// until a write fails. A read error ends the connection right away.
pub async fn discard_until_closed<R>(reader: &mut R, closed: &mut Closed) -> Result<(), RelayError>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        tokio::select! {
            _ = &mut *closed => return Ok(()),
            read = discard_available(reader) => {
                if read? == 0 {
                    break;
                }
            }
        }
    }

    closed.await;
    Ok(())
}

/// Drop whatever is buffered; returns the byte count, 0 on EOF
async fn discard_available<R>(reader: &mut R) -> Result<usize, RelayError>
where
    R: AsyncBufRead + Unpin,
{
    let n = reader.fill_buf().await?.len();
    reader.consume(n);
    Ok(n)
}

/// Level at which a connection termination is logged
pub fn severity(err: &RelayError) -> Level {
    match err {
        RelayError::ConnectionClosed => Level::INFO,
        _ => Level::ERROR,
    }
}

/// Log a fatal connection error with the remote address
///
/// The caller closes the connection by dropping its halves.
pub fn handle_connection_error(peer: &str, err: &RelayError) {
    if severity(err) == Level::ERROR {
        error!(peer = %peer, "connection error: {}", err);
    } else {
        info!(peer = %peer, "connection closed by peer");
    }
}
