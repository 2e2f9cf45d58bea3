//! Outbound delivery: bounded per-client mailboxes and the loops draining them.
//!
//! The registry never waits on a client. Lines are offered to a mailbox with
//! a non-blocking push; a full mailbox drops the line. A dedicated
//! [`OutboundWriter`] per client drains its mailbox onto the transport, so a
//! stalled socket only ever stalls its own writer.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the crate panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Write failures end the loop; they are logged, never propagated

use std::time::Duration;

use futures::SinkExt;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::timeout;
use tokio_util::codec::{FramedWrite, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::ClientId;

/// Default number of lines a mailbox holds before dropping.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 32;

/// Default bound on a single line write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Creates a bounded mailbox and its receiving end.
///
/// A capacity of zero is raised to one.
pub fn mailbox(capacity: usize) -> (Mailbox, MailboxReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let closed = CancellationToken::new();
    (
        Mailbox {
            tx,
            closed: closed.clone(),
        },
        MailboxReceiver { rx, closed },
    )
}

/// Why a line was not queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    #[error("mailbox full, line dropped")]
    Full,

    #[error("mailbox closed")]
    Closed,
}

/// Sending side of a client's outbound queue.
#[derive(Debug, Clone)]
pub struct Mailbox {
    tx: mpsc::Sender<String>,
    closed: CancellationToken,
}

impl Mailbox {
    /// Queues a line without waiting.
    ///
    /// # Errors
    ///
    /// - `PushError::Full` if the queue is at capacity; the line is discarded
    /// - `PushError::Closed` if the mailbox was closed or its writer is gone
    pub fn push(&self, line: impl Into<String>) -> Result<(), PushError> {
        if self.closed.is_cancelled() {
            return Err(PushError::Closed);
        }
        self.tx.try_send(line.into()).map_err(|e| match e {
            TrySendError::Full(_) => PushError::Full,
            TrySendError::Closed(_) => PushError::Closed,
        })
    }

    /// Closes the mailbox. Lines already queued are still delivered.
    ///
    /// Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled() || self.tx.is_closed()
    }
}

/// Receiving side of a client's outbound queue.
#[derive(Debug)]
pub struct MailboxReceiver {
    rx: mpsc::Receiver<String>,
    closed: CancellationToken,
}

impl MailboxReceiver {
    /// Returns the next queued line in FIFO order.
    ///
    /// Returns `None` once the mailbox is closed and drained, or once every
    /// [`Mailbox`] has been dropped.
    pub async fn recv(&mut self) -> Option<String> {
        tokio::select! {
            biased;

            line = self.rx.recv() => line,

            _ = self.closed.cancelled() => self.rx.try_recv().ok(),
        }
    }

    /// Returns the next queued line if one is ready, without waiting.
    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }
}

/// How a delivery loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Mailbox closed and every queued line written.
    Drained,

    /// A write failed or timed out; remaining lines were abandoned.
    WriteFailed,
}

/// Drains one client's mailbox onto its transport.
pub struct OutboundWriter<W> {
    mailbox: MailboxReceiver,
    sink: FramedWrite<W, LinesCodec>,
    client_id: ClientId,
    write_timeout: Duration,
}

impl<W> OutboundWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(
        mailbox: MailboxReceiver,
        writer: W,
        client_id: ClientId,
        write_timeout: Duration,
    ) -> Self {
        Self {
            mailbox,
            sink: FramedWrite::new(writer, LinesCodec::new()),
            client_id,
            write_timeout,
        }
    }

    /// Writes queued lines until the mailbox closes or a write fails.
    ///
    /// Each line is followed by `\n` and flushed. There are no retries.
    pub async fn run(mut self) -> DeliveryOutcome {
        while let Some(line) = self.mailbox.recv().await {
            match timeout(self.write_timeout, self.sink.send(line)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!(
                        client_id = %self.client_id,
                        error = %e,
                        "Write failed, stopping delivery"
                    );
                    return DeliveryOutcome::WriteFailed;
                }
                Err(_) => {
                    warn!(
                        client_id = %self.client_id,
                        timeout = ?self.write_timeout,
                        "Write timed out, stopping delivery"
                    );
                    return DeliveryOutcome::WriteFailed;
                }
            }
        }

        // Mailbox drained; shut down our half of the transport. Every line
        // was already flushed, so a failed close does not change the outcome.
        match timeout(self.write_timeout, SinkExt::<String>::close(&mut self.sink)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(client_id = %self.client_id, error = %e, "Transport close failed");
            }
            Err(_) => {
                debug!(
                    client_id = %self.client_id,
                    timeout = ?self.write_timeout,
                    "Transport close timed out"
                );
            }
        }
        debug!(client_id = %self.client_id, "Delivery finished");
        DeliveryOutcome::Drained
    }
}
