//! TCP server for the chat daemon.
//!
//! The server:
//! - Listens on a TCP address for client connections
//! - Assigns each connection a `ClientId` and spawns a `ConnectionHandler`
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   ChatServer    │
//! │                 │
//! │  TcpListener    │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│  RegistryHandle │
//! │   (per client)  │     │                 │
//! └─────────────────┘     └─────────────────┘
//!         │
//!         │ mailbox
//!         ▼
//! ┌─────────────────┐
//! │ OutboundWriter  │
//! │   (per client)  │
//! └─────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! This module follows the crate panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Accept errors are logged and allow continued operation

mod connection;

pub use connection::{ConnectionHandler, ConnectionSettings};

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::client::ClientId;
use crate::registry::RegistryHandle;

/// TCP chat server.
pub struct ChatServer {
    /// Bound listener
    listener: TcpListener,

    /// Address actually bound (resolves port 0)
    local_addr: SocketAddr,

    /// Handle to the session registry
    registry: RegistryHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Limits handed to every connection
    settings: ConnectionSettings,

    /// Connection counter for generating client IDs
    connection_counter: AtomicU64,
}

impl ChatServer {
    /// Binds the listener.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::Bind` if the address cannot be bound.
    pub async fn bind(
        addr: &str,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
        settings: ConnectionSettings,
    ) -> Result<Self, ServerError> {
        let bind_error = |source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        };

        let listener = TcpListener::bind(addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        Ok(Self {
            listener,
            local_addr,
            registry,
            cancel_token,
            settings,
            connection_counter: AtomicU64::new(0),
        })
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Runs the accept loop.
    ///
    /// Accepts connections until the cancellation token is triggered.
    /// Connections already accepted keep running on their own tasks.
    pub async fn run(&self) {
        info!(addr = %self.local_addr, "Chat server listening");

        loop {
            tokio::select! {
                biased;

                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let id = self.connection_counter.fetch_add(1, Ordering::Relaxed) + 1;
                            self.handle_connection(stream, peer, ClientId::new(id));
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            // Continue accepting other connections
                        }
                    }
                }
            }
        }

        info!("Server stopped accepting connections");
    }

    /// Handles a new client connection by spawning a handler task.
    fn handle_connection(&self, stream: TcpStream, peer: SocketAddr, client_id: ClientId) {
        let handler = ConnectionHandler::new(
            stream,
            peer,
            client_id,
            self.registry.clone(),
            self.settings,
        );

        tokio::spawn(handler.run());
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::spawn_registry;

    #[test]
    fn test_server_error_display() {
        let err = ServerError::Bind {
            addr: "0.0.0.0:5000".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
        };
        assert!(err.to_string().contains("0.0.0.0:5000"));
        assert!(err.to_string().contains("address in use"));
    }

    #[tokio::test]
    async fn test_bind_port_zero_reports_real_port() {
        let server = ChatServer::bind(
            "127.0.0.1:0",
            spawn_registry(),
            CancellationToken::new(),
            ConnectionSettings::default(),
        )
        .await
        .unwrap();

        assert_ne!(server.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_conflict_is_an_error() {
        let first = ChatServer::bind(
            "127.0.0.1:0",
            spawn_registry(),
            CancellationToken::new(),
            ConnectionSettings::default(),
        )
        .await
        .unwrap();

        let taken = first.local_addr().to_string();
        let second = ChatServer::bind(
            &taken,
            spawn_registry(),
            CancellationToken::new(),
            ConnectionSettings::default(),
        )
        .await;

        assert!(matches!(second, Err(ServerError::Bind { .. })));
    }

    #[tokio::test]
    async fn test_run_returns_on_cancel() {
        let cancel = CancellationToken::new();
        let server = ChatServer::bind(
            "127.0.0.1:0",
            spawn_registry(),
            cancel.clone(),
            ConnectionSettings::default(),
        )
        .await
        .unwrap();

        cancel.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), server.run())
            .await
            .expect("run should return once cancelled");
    }
}
