//! Registry events and errors.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryEvent`: Intents sent to the actor by sessions
//! - `EventKind`: Payload-free discriminant used for logs and observer hooks
//! - `RegistryError`: Errors returned through the `RegistryHandle`
//!
//! All types are designed for async message passing and follow the panic-free policy.

use std::fmt;

use linechat_core::{ChatError, Username};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::client::ClientHandle;

// ============================================================================
// Registry Events
// ============================================================================

/// Intents sent to the registry actor.
///
/// Events are consumed exactly once, in the order they arrive on the
/// channel. Only `Register` carries a reply channel; the oneshot sender is
/// moved into the handler, so it can be resolved at most once.
#[derive(Debug)]
pub enum RegistryEvent {
    /// Claim a username for a client.
    ///
    /// # Errors
    /// - `ChatError::UsernameInvalid` if the trimmed name is empty or too long
    /// - `ChatError::UsernameTaken` if another client holds the name
    Register {
        /// Client asking to join
        client: ClientHandle,
        /// Raw candidate name (trimmed by the actor)
        username: String,
        /// Channel to send the accepted name or the rejection
        respond_to: oneshot::Sender<Result<Username, ChatError>>,
    },

    /// Remove a client. No-op if it is not registered.
    Unregister {
        /// Client leaving
        client: ClientHandle,
    },

    /// Send text to every registered client, sender included.
    Broadcast {
        /// Sending client
        client: ClientHandle,
        /// Message body (terminators stripped and truncated by the actor)
        text: String,
    },

    /// Send the sorted list of usernames back to the requester.
    ListUsers {
        /// Requesting client
        client: ClientHandle,
    },

    /// Send text to a single registered client.
    Whisper {
        /// Sending client
        client: ClientHandle,
        /// Recipient username
        target: String,
        /// Message body
        text: String,
    },
}

impl RegistryEvent {
    /// Returns the discriminant of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Register { .. } => EventKind::Register,
            Self::Unregister { .. } => EventKind::Unregister,
            Self::Broadcast { .. } => EventKind::Broadcast,
            Self::ListUsers { .. } => EventKind::ListUsers,
            Self::Whisper { .. } => EventKind::Whisper,
        }
    }
}

/// Event discriminant, used as a label by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Register,
    Unregister,
    Broadcast,
    ListUsers,
    Whisper,
}

impl EventKind {
    /// All kinds, in declaration order.
    pub const ALL: [EventKind; 5] = [
        Self::Register,
        Self::Unregister,
        Self::Broadcast,
        Self::ListUsers,
        Self::Whisper,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Unregister => "unregister",
            Self::Broadcast => "broadcast",
            Self::ListUsers => "users",
            Self::Whisper => "whisper",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors returned by `RegistryHandle` operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The registry refused the request.
    #[error(transparent)]
    Rejected(#[from] ChatError),

    /// The registry has stopped, or dropped the reply without answering.
    #[error("registry unavailable")]
    ChannelClosed,
}

impl RegistryError {
    /// Returns the domain error, if the registry answered with one.
    pub fn as_chat_error(&self) -> Option<&ChatError> {
        match self {
            Self::Rejected(e) => Some(e),
            Self::ChannelClosed => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientId;
    use crate::outbound::mailbox;

    fn test_client() -> ClientHandle {
        let (mb, _rx) = mailbox(4);
        ClientHandle::new(ClientId::new(7), mb)
    }

    #[test]
    fn test_event_kind_labels() {
        let labels: Vec<&str> = EventKind::ALL.iter().map(EventKind::as_str).collect();
        assert_eq!(
            labels,
            vec!["register", "unregister", "broadcast", "users", "whisper"]
        );
        assert_eq!(EventKind::ListUsers.to_string(), "users");
    }

    #[test]
    fn test_event_kind_matches_variant() {
        let (tx, _rx) = oneshot::channel();
        let register = RegistryEvent::Register {
            client: test_client(),
            username: "alice".to_string(),
            respond_to: tx,
        };
        assert_eq!(register.kind(), EventKind::Register);

        let whisper = RegistryEvent::Whisper {
            client: test_client(),
            target: "bob".to_string(),
            text: "hi".to_string(),
        };
        assert_eq!(whisper.kind(), EventKind::Whisper);

        let users = RegistryEvent::ListUsers {
            client: test_client(),
        };
        assert_eq!(users.kind(), EventKind::ListUsers);
    }

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::from(ChatError::UsernameTaken("alice".to_string()));
        assert_eq!(err.to_string(), "username already taken: alice");
        assert!(matches!(
            err.as_chat_error(),
            Some(ChatError::UsernameTaken(_))
        ));

        let err = RegistryError::ChannelClosed;
        assert_eq!(err.to_string(), "registry unavailable");
        assert!(err.as_chat_error().is_none());
    }

    #[tokio::test]
    async fn test_reply_channel_closed_without_answer() {
        // A dropped responder is how an abandoned Register looks to the caller
        let (tx, rx) = oneshot::channel::<Result<Username, ChatError>>();
        drop(tx);
        assert!(rx.await.is_err());
    }
}
