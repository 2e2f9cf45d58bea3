//! Hooks for observing registry activity.
//!
//! The registry reports every processed event and every dropped line to an
//! [`EventObserver`]. [`TracingObserver`] only logs; the daemon runs with
//! [`MetricsObserver`](crate::metrics::MetricsObserver), which also records
//! OpenTelemetry instruments.

use std::time::Duration;

use tracing::{debug, warn};

use crate::client::ClientId;
use crate::registry::EventKind;

/// Receives registry processing hooks.
///
/// Called from the registry task itself, so implementations must be quick
/// and must not block.
pub trait EventObserver: Send + Sync {
    /// An event finished processing.
    ///
    /// `members` is the number of registered clients after the event.
    fn event_processed(&self, kind: EventKind, elapsed: Duration, members: usize);

    /// A line for `client` was discarded because its mailbox was full.
    fn line_dropped(&self, _client: ClientId) {}
}

/// Observer that writes hooks to the `tracing` log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl EventObserver for TracingObserver {
    fn event_processed(&self, kind: EventKind, elapsed: Duration, members: usize) {
        debug!(
            event = %kind,
            elapsed = ?elapsed,
            members,
            "Event processed"
        );
    }

    fn line_dropped(&self, client: ClientId) {
        warn!(client_id = %client, "Mailbox full, dropped outbound line");
    }
}
