//! Registry actor - owns all membership state and processes events.
//!
//! The RegistryActor is the single owner of membership state in the system.
//! It receives events via an mpsc channel and writes replies straight into
//! client mailboxes.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the crate panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Channel send failures are logged but don't panic

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use linechat_core::{clean_message, ChatError, Username};
use linechat_protocol::Reply;

use super::events::RegistryEvent;
use crate::client::{ClientHandle, ClientId};
use crate::observer::EventObserver;
use crate::outbound::PushError;

// ============================================================================
// Registry Actor
// ============================================================================

/// The registry actor - owns all membership state.
///
/// Implements the actor pattern: receives events via mpsc channel and
/// processes them one at a time, in arrival order.
///
/// # Ownership
///
/// The actor owns:
/// - `members`: username → client handle, one entry per registered client
/// - `names_by_client`: index for client → username lookups
///
/// A username is a key of `members` if and only if its client registered
/// and has not been unregistered since. Neither map ever leaves this task.
pub struct RegistryActor {
    /// Event receiver
    receiver: mpsc::Receiver<RegistryEvent>,

    /// Registered clients keyed by username
    members: HashMap<Username, ClientHandle>,

    /// Username bound to each registered client
    names_by_client: HashMap<ClientId, Username>,

    /// Processing hooks
    observer: Arc<dyn EventObserver>,

    /// Stop signal, checked before every event
    stop: CancellationToken,

    /// Cancelled when the run loop has exited
    done: CancellationToken,
}

impl RegistryActor {
    /// Creates a new registry actor.
    ///
    /// # Arguments
    ///
    /// * `receiver` - Channel for receiving events
    /// * `observer` - Hooks called after every event
    /// * `stop` - Token that makes `run` return
    /// * `done` - Token cancelled once `run` has returned
    pub fn new(
        receiver: mpsc::Receiver<RegistryEvent>,
        observer: Arc<dyn EventObserver>,
        stop: CancellationToken,
        done: CancellationToken,
    ) -> Self {
        Self {
            receiver,
            members: HashMap::new(),
            names_by_client: HashMap::new(),
            observer,
            stop,
            done,
        }
    }

    /// Runs the actor event loop.
    ///
    /// Processes events until the stop token fires or every sender has been
    /// dropped. Events still queued when the stop token fires are abandoned.
    pub async fn run(mut self) {
        let _done = self.done.clone().drop_guard();
        info!("Registry starting");

        loop {
            tokio::select! {
                biased;

                _ = self.stop.cancelled() => {
                    debug!("Registry stop requested");
                    break;
                }

                event = self.receiver.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        debug!("Registry channel closed");
                        break;
                    }
                },
            }
        }

        info!(members = self.members.len(), "Registry stopped");
        self.release();
    }

    /// Refuses further events and drops every client handle, so `done`
    /// only fires once nothing can reach the registry.
    fn release(&mut self) {
        self.receiver.close();

        // Abandoned without side effects; pending register callers see
        // their reply conduit dropped
        let mut abandoned = 0usize;
        while self.receiver.try_recv().is_ok() {
            abandoned += 1;
        }
        if abandoned > 0 {
            debug!(abandoned, "Dropped unprocessed events");
        }

        self.names_by_client.clear();
        self.members.clear();
    }

    /// Dispatches an event to the appropriate handler and reports it.
    fn handle_event(&mut self, event: RegistryEvent) {
        let kind = event.kind();
        let started = Instant::now();

        match event {
            RegistryEvent::Register {
                client,
                username,
                respond_to,
            } => self.handle_register(client, &username, respond_to),
            RegistryEvent::Unregister { client } => self.handle_unregister(&client),
            RegistryEvent::Broadcast { client, text } => self.handle_broadcast(&client, &text),
            RegistryEvent::ListUsers { client } => self.handle_list_users(&client),
            RegistryEvent::Whisper {
                client,
                target,
                text,
            } => self.handle_whisper(&client, &target, &text),
        }

        self.observer
            .event_processed(kind, started.elapsed(), self.members.len());
    }

    // ========================================================================
    // Event Handlers
    // ========================================================================

    /// Handles a registration attempt. Always answers `respond_to`.
    fn handle_register(
        &mut self,
        client: ClientHandle,
        candidate: &str,
        respond_to: oneshot::Sender<Result<Username, ChatError>>,
    ) {
        let result = self.try_register(client, candidate);
        // Ignore send error - the session may have gone away
        let _ = respond_to.send(result);
    }

    /// Validates and records a registration.
    fn try_register(
        &mut self,
        client: ClientHandle,
        candidate: &str,
    ) -> Result<Username, ChatError> {
        let username = Username::parse(candidate)?;

        if self.members.contains_key(&username) {
            debug!(username = %username, "Username taken, rejecting registration");
            return Err(ChatError::UsernameTaken(username.to_string()));
        }

        // One name per client
        if let Some(existing) = self.names_by_client.get(&client.id()) {
            debug!(
                client_id = %client.id(),
                username = %existing,
                "Client already registered, rejecting second name"
            );
            return Err(ChatError::UsernameTaken(existing.to_string()));
        }

        self.names_by_client.insert(client.id(), username.clone());
        self.members.insert(username.clone(), client.clone());

        info!(
            client_id = %client.id(),
            username = %username,
            members = self.members.len(),
            "User registered"
        );

        self.deliver(&client, Reply::Ok);
        self.broadcast_except(client.id(), &Reply::joined(&username));

        Ok(username)
    }

    /// Handles a client leaving. No-op if it is not registered.
    fn handle_unregister(&mut self, client: &ClientHandle) {
        let Some(username) = self.names_by_client.remove(&client.id()) else {
            debug!(client_id = %client.id(), "Unregister for unknown client ignored");
            return;
        };

        if let Some(member) = self.members.remove(&username) {
            member.close_mailbox();
        }

        info!(
            client_id = %client.id(),
            username = %username,
            members = self.members.len(),
            "User left"
        );

        self.broadcast_except(client.id(), &Reply::left(&username));
    }

    /// Handles a public message from a registered client.
    fn handle_broadcast(&self, client: &ClientHandle, text: &str) {
        let Some(from) = self.names_by_client.get(&client.id()).cloned() else {
            debug!(client_id = %client.id(), "Broadcast from unregistered client ignored");
            return;
        };
        let Some(text) = clean_message(text) else {
            return;
        };

        let reply = Reply::Chat {
            from,
            text: text.to_string(),
        };
        self.broadcast_all(&reply);
    }

    /// Handles a request for the user list. Answered for any client.
    fn handle_list_users(&self, client: &ClientHandle) {
        let mut names: Vec<Username> = self.members.keys().cloned().collect();
        names.sort();
        self.deliver(client, Reply::Users(names));
    }

    /// Handles a private message.
    fn handle_whisper(&self, client: &ClientHandle, target: &str, text: &str) {
        let Some(from) = self.names_by_client.get(&client.id()).cloned() else {
            debug!(client_id = %client.id(), "Whisper from unregistered client ignored");
            return;
        };

        let target = target.trim();
        if target.is_empty() {
            self.deliver(client, Reply::error(&ChatError::UserNotFound(String::new())));
            return;
        }
        if from == target {
            self.deliver(client, Reply::error(&ChatError::CannotWhisperSelf));
            return;
        }
        let Some(receiver) = self.members.get(target).cloned() else {
            let err = ChatError::UserNotFound(target.to_string());
            debug!(from = %from, error = %err, "Whisper target missing");
            self.deliver(client, Reply::error(&err));
            return;
        };
        let Some(text) = clean_message(text) else {
            return;
        };

        self.deliver(
            &receiver,
            Reply::Whisper {
                from,
                text: text.to_string(),
            },
        );
    }

    // ========================================================================
    // Delivery Helpers
    // ========================================================================

    /// Offers a line to one client without waiting.
    fn deliver(&self, client: &ClientHandle, reply: Reply) {
        match client.send(reply) {
            Ok(()) => {}
            Err(PushError::Full) => self.observer.line_dropped(client.id()),
            Err(PushError::Closed) => {
                debug!(client_id = %client.id(), "Mailbox closed, line discarded");
            }
        }
    }

    /// Sends a line to every registered client.
    fn broadcast_all(&self, reply: &Reply) {
        for member in self.members.values() {
            self.deliver(member, reply.clone());
        }
    }

    /// Sends a line to every registered client except `skip`.
    fn broadcast_except(&self, skip: ClientId, reply: &Reply) {
        for member in self.members.values().filter(|m| m.id() != skip) {
            self.deliver(member, reply.clone());
        }
    }

    /// Returns the number of registered clients (for testing).
    #[cfg(test)]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}
