//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending
//! events to the registry actor and for stopping it.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the crate panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel errors are mapped to `RegistryError::ChannelClosed`

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use linechat_core::Username;

use super::events::{RegistryError, RegistryEvent};
use crate::client::ClientHandle;

// ============================================================================
// Registry Handle
// ============================================================================

/// Handle for interacting with the registry actor.
///
/// This is a cheap-to-clone handle that can be shared across tasks.
/// Only `register` waits for the actor to answer; every other event is
/// fire-and-forget and its outcome reaches the client through its mailbox.
///
/// # Usage
///
/// ```ignore
/// let name = registry.register(&client, "alice").await?;
/// registry.broadcast(&client, "hello").await?;
///
/// // Shutdown
/// registry.stop();
/// registry.stopped().await;
/// ```
#[derive(Clone)]
pub struct RegistryHandle {
    /// Event sender to the actor
    sender: mpsc::Sender<RegistryEvent>,

    /// Tells the actor to exit
    stop: CancellationToken,

    /// Cancelled by the actor once it has exited
    done: CancellationToken,
}

impl RegistryHandle {
    /// Create a new registry handle.
    ///
    /// # Arguments
    ///
    /// * `sender` - The event channel sender for communicating with the actor
    /// * `stop` - Token observed by the actor as its stop signal
    /// * `done` - Token the actor cancels when its loop has exited
    pub fn new(
        sender: mpsc::Sender<RegistryEvent>,
        stop: CancellationToken,
        done: CancellationToken,
    ) -> Self {
        Self { sender, stop, done }
    }

    /// Claim a username for `client` and wait for the verdict.
    ///
    /// On success the client is a member, has been sent `OK`, and the
    /// trimmed username is returned.
    ///
    /// # Errors
    ///
    /// - `RegistryError::Rejected(UsernameInvalid)` if the name is empty or too long
    /// - `RegistryError::Rejected(UsernameTaken)` if another client holds the name
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn register(
        &self,
        client: &ClientHandle,
        username: impl Into<String>,
    ) -> Result<Username, RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.send(RegistryEvent::Register {
            client: client.clone(),
            username: username.into(),
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|_| RegistryError::ChannelClosed)?
            .map_err(RegistryError::from)
    }

    /// Remove `client` from the registry. A no-op for unknown clients.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn unregister(&self, client: &ClientHandle) -> Result<(), RegistryError> {
        self.send(RegistryEvent::Unregister {
            client: client.clone(),
        })
        .await
    }

    /// Send `text` to every registered client.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn broadcast(
        &self,
        client: &ClientHandle,
        text: impl Into<String>,
    ) -> Result<(), RegistryError> {
        self.send(RegistryEvent::Broadcast {
            client: client.clone(),
            text: text.into(),
        })
        .await
    }

    /// Ask for the sorted user list, delivered to `client`'s mailbox.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn list_users(&self, client: &ClientHandle) -> Result<(), RegistryError> {
        self.send(RegistryEvent::ListUsers {
            client: client.clone(),
        })
        .await
    }

    /// Send `text` privately to `target`.
    ///
    /// Delivery errors (`user_not_found`, `cannot_whisper_self`) arrive in
    /// the sender's mailbox, not as a return value.
    ///
    /// # Errors
    ///
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn whisper(
        &self,
        client: &ClientHandle,
        target: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<(), RegistryError> {
        self.send(RegistryEvent::Whisper {
            client: client.clone(),
            target: target.into(),
            text: text.into(),
        })
        .await
    }

    /// Signal the actor to stop. Queued events are abandoned.
    ///
    /// Stop accepting new connections before calling this.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Wait until the actor loop has fully exited.
    pub async fn stopped(&self) {
        self.done.cancelled().await;
    }

    /// Check if the actor is still running.
    pub fn is_running(&self) -> bool {
        !self.done.is_cancelled() && !self.sender.is_closed()
    }

    async fn send(&self, event: RegistryEvent) -> Result<(), RegistryError> {
        self.sender
            .send(event)
            .await
            .map_err(|_| RegistryError::ChannelClosed)
    }
}
