//! Session registry using Actor pattern.
//!
//! The registry is the single owner of chat membership. It receives events
//! from every session over one tokio mpsc channel and applies them one at a
//! time, so membership state needs no locks.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ Session (× N)   │────▶│  RegistryActor  │────▶│ Mailbox (× N)   │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//!         │                       │                       │
//!         │   RegistryEvent       │   HashMap<Username,   │   try_send,
//!         │   (mpsc channel)      │   ClientHandle>       │   drop on full
//!         ▼                       ▼                       ▼
//!    Register/Broadcast/     membership map          OutboundWriter
//!    Whisper/ListUsers       (actor task only)       per client
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

mod actor;
mod events;
mod handle;

pub use actor::RegistryActor;
pub use events::{EventKind, RegistryError, RegistryEvent};
pub use handle::RegistryHandle;

use crate::observer::{EventObserver, TracingObserver};

/// Default event channel size
pub const DEFAULT_EVENT_BUFFER: usize = 128;

/// Channel size used when a buffer of zero is requested
const FALLBACK_EVENT_BUFFER: usize = 64;

/// Spawn the registry actor with default settings and return a handle.
///
/// # Example
///
/// ```no_run
/// use linechatd::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let registry = spawn_registry();
///
///     // ... hand clones of `registry` to sessions ...
///
///     registry.stop();
///     registry.stopped().await;
/// }
/// ```
pub fn spawn_registry() -> RegistryHandle {
    spawn_registry_with(DEFAULT_EVENT_BUFFER, Arc::new(TracingObserver))
}

/// Spawn the registry actor with an explicit channel size and observer.
///
/// This function:
/// 1. Creates the event channel and the stop/done tokens
/// 2. Spawns the RegistryActor on a tokio task
/// 3. Returns a RegistryHandle for client use
///
/// A `buffer` of zero falls back to 64.
pub fn spawn_registry_with(buffer: usize, observer: Arc<dyn EventObserver>) -> RegistryHandle {
    let buffer = if buffer == 0 {
        FALLBACK_EVENT_BUFFER
    } else {
        buffer
    };

    let (event_tx, event_rx) = mpsc::channel(buffer);
    let stop = CancellationToken::new();
    let done = CancellationToken::new();

    let actor = RegistryActor::new(event_rx, observer, stop.clone(), done.clone());
    tokio::spawn(actor.run());

    RegistryHandle::new(event_tx, stop, done)
}
