//! Per-connection session protocol.
//!
//! A session turns the lines one client sends into registry events. It has
//! two phases:
//!
//! ```text
//!            ┌──────────────┐  register ok   ┌──────────┐
//!   start ──▶│ Handshaking  │───────────────▶│  Active  │──┐
//!            └──────┬───────┘                └────┬─────┘  │ command
//!              ▲    │ register failed             │    ▲   │
//!              └────┘ (re-prompt)                 │    └───┘
//!                   │ EOF                         │ /exit or EOF
//!                   ▼                             ▼
//!            ┌──────────────────────────────────────────┐
//!            │                 Finished                 │
//!            └──────────────────────────────────────────┘
//! ```
//!
//! The handshake waits for the registry's verdict before reading any
//! command, so the registry never sees a broadcast, whisper, or user-list
//! request from a client that is not yet a member.

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

use linechat_core::Username;
use linechat_protocol::{Command, Reply};

use crate::client::ClientHandle;
use crate::registry::{RegistryError, RegistryHandle};

/// Default cap on an incoming line, in bytes.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Connection closed before a username was accepted.
    HandshakeAborted,

    /// Client sent `/exit`.
    Exited,

    /// Connection closed or failed while active.
    Disconnected,
}

#[derive(Debug)]
enum SessionState {
    Handshaking,
    Active(Username),
    Finished(SessionEnd),
}

/// Line-protocol session for one client.
pub struct Session<R> {
    lines: FramedRead<R, LinesCodec>,
    client: ClientHandle,
    registry: RegistryHandle,
}

impl<R> Session<R>
where
    R: AsyncRead + Unpin,
{
    /// Creates a session reading from `reader`.
    ///
    /// Lines longer than `max_line_length` bytes are discarded.
    pub fn new(
        reader: R,
        client: ClientHandle,
        registry: RegistryHandle,
        max_line_length: usize,
    ) -> Self {
        Self {
            lines: FramedRead::new(reader, LinesCodec::new_with_max_length(max_line_length)),
            client,
            registry,
        }
    }

    /// Runs the session to completion.
    pub async fn run(mut self) -> SessionEnd {
        let mut state = SessionState::Handshaking;

        loop {
            state = match state {
                SessionState::Handshaking => self.handshake().await,
                SessionState::Active(username) => self.step(username).await,
                SessionState::Finished(end) => {
                    debug!(client_id = %self.client.id(), end = ?end, "Session finished");
                    return end;
                }
            };
        }
    }

    /// One registration attempt: prompt, read a name, wait for the registry.
    async fn handshake(&mut self) -> SessionState {
        self.reply(Reply::Prompt);

        let Some(line) = self.next_line().await else {
            // Never registered, so nobody else will close the mailbox
            self.client.close_mailbox();
            return SessionState::Finished(SessionEnd::HandshakeAborted);
        };

        match self.registry.register(&self.client, line.trim()).await {
            Ok(username) => {
                info!(
                    client_id = %self.client.id(),
                    username = %username,
                    "Session active"
                );
                SessionState::Active(username)
            }
            Err(e) => {
                debug!(
                    client_id = %self.client.id(),
                    error = %e,
                    "Registration failed"
                );
                self.reply(Reply::register_failure(e.as_chat_error()));
                SessionState::Handshaking
            }
        }
    }

    /// Reads and dispatches one line while active.
    async fn step(&mut self, username: Username) -> SessionState {
        let Some(line) = self.next_line().await else {
            debug!(username = %username, "Client disconnected");
            self.leave().await;
            return SessionState::Finished(SessionEnd::Disconnected);
        };

        let result = match Command::parse(&line) {
            Ok(None) => Ok(()),
            Ok(Some(Command::Exit)) => {
                self.reply(Reply::Bye);
                self.leave().await;
                return SessionState::Finished(SessionEnd::Exited);
            }
            Ok(Some(Command::Users)) => self.registry.list_users(&self.client).await,
            Ok(Some(Command::Whisper { target, text })) => {
                self.registry.whisper(&self.client, target, text).await
            }
            Ok(Some(Command::Say(text))) => self.registry.broadcast(&self.client, text).await,
            Err(e) => {
                self.reply(Reply::error(&e));
                Ok(())
            }
        };

        if let Err(e) = result {
            debug!(username = %username, error = %e, "Event not delivered to registry");
        }

        SessionState::Active(username)
    }

    /// Unregisters the client.
    ///
    /// The registry closes the mailbox once it has processed the event. If
    /// the registry is gone, the session closes it instead.
    async fn leave(&mut self) {
        if let Err(RegistryError::ChannelClosed) = self.registry.unregister(&self.client).await {
            self.client.close_mailbox();
        }
    }

    /// Reads the next line, skipping any that exceed the length cap.
    ///
    /// Returns `None` on EOF or read failure.
    async fn next_line(&mut self) -> Option<String> {
        loop {
            match self.lines.next().await {
                Some(Ok(line)) => return Some(line),
                Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
                    warn!(client_id = %self.client.id(), "Discarding over-long line");
                }
                Some(Err(LinesCodecError::Io(e))) => {
                    debug!(client_id = %self.client.id(), error = %e, "Read failed");
                    return None;
                }
                None => return None,
            }
        }
    }

    /// Queues a line for this client; a full mailbox drops it.
    fn reply(&self, reply: Reply) {
        if let Err(e) = self.client.send(reply) {
            debug!(client_id = %self.client.id(), error = %e, "Reply not queued");
        }
    }
}
