//! Connection handler for individual client connections.
//!
//! Each accepted TCP connection gets its own `ConnectionHandler` that:
//! - Splits the stream into read and write halves
//! - Spawns an `OutboundWriter` draining the client's mailbox
//! - Runs the line-protocol `Session` on the read half
//! - Waits for delivery to finish before the connection is dropped
//!
//! # Panic-Free Guarantees
//!
//! This module follows the crate panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Connection errors are logged and result in graceful disconnect

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::client::{ClientHandle, ClientId};
use crate::outbound::{mailbox, OutboundWriter, DEFAULT_MAILBOX_CAPACITY, DEFAULT_WRITE_TIMEOUT};
use crate::registry::RegistryHandle;
use crate::session::{Session, SessionEnd, DEFAULT_MAX_LINE_LENGTH};

/// Per-connection tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Lines queued per client before new lines are dropped
    pub mailbox_capacity: usize,

    /// Bound on a single line write
    pub write_timeout: Duration,

    /// Longest accepted incoming line, in bytes
    pub max_line_length: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

/// Connection handler for a single client.
pub struct ConnectionHandler {
    stream: TcpStream,
    peer: SocketAddr,
    client_id: ClientId,
    registry: RegistryHandle,
    settings: ConnectionSettings,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The accepted TCP stream
    /// * `peer` - Remote address, for logging
    /// * `client_id` - Identifier unique to this connection
    /// * `registry` - Handle to the session registry
    /// * `settings` - Mailbox, timeout and line-length limits
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        client_id: ClientId,
        registry: RegistryHandle,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            stream,
            peer,
            client_id,
            registry,
            settings,
        }
    }

    /// Runs the connection until the session ends and delivery stops.
    pub async fn run(self) -> SessionEnd {
        let Self {
            stream,
            peer,
            client_id,
            registry,
            settings,
        } = self;

        info!(client_id = %client_id, peer = %peer, "Client connected");

        let (reader, writer) = stream.into_split();
        let (mb, rx) = mailbox(settings.mailbox_capacity);
        let client = ClientHandle::new(client_id, mb);

        let delivery = tokio::spawn(
            OutboundWriter::new(rx, writer, client_id, settings.write_timeout).run(),
        );

        // The session owns the last local copy of the client handle, so
        // once it returns only the registry can keep the mailbox open.
        let end = Session::new(reader, client, registry, settings.max_line_length)
            .run()
            .await;

        match delivery.await {
            Ok(outcome) => {
                debug!(client_id = %client_id, outcome = ?outcome, "Delivery task finished");
            }
            Err(e) => {
                warn!(client_id = %client_id, error = %e, "Delivery task failed");
            }
        }

        info!(client_id = %client_id, peer = %peer, end = ?end, "Client disconnected");
        end
    }
}
