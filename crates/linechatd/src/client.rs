//! Per-connection client handle.

use std::fmt;

use linechat_protocol::Reply;

use crate::outbound::{Mailbox, PushError};

/// Identifier assigned to each accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Handle to one connected client.
///
/// Cheap to clone. The session, the registry, and any event in flight each
/// hold a copy; the username bound at registration lives in the registry,
/// which is the only writer of membership state.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: ClientId,
    mailbox: Mailbox,
}

impl ClientHandle {
    pub fn new(id: ClientId, mailbox: Mailbox) -> Self {
        Self { id, mailbox }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Queues a line for this client without waiting.
    ///
    /// # Errors
    ///
    /// Returns `PushError::Full` if the mailbox is at capacity (the line is
    /// dropped) or `PushError::Closed` once the mailbox has been closed.
    pub fn send(&self, reply: Reply) -> Result<(), PushError> {
        self.mailbox.push(reply)
    }

    /// Signals the delivery loop to flush what is queued and stop.
    pub fn close_mailbox(&self) {
        self.mailbox.close();
    }

    pub fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }
}
