//! Registry metrics.
//!
//! [`MetricsObserver`] records OpenTelemetry instruments from the registry
//! hooks:
//!
//! | Instrument                    | Kind      | Attributes |
//! |-------------------------------|-----------|------------|
//! | `chat.clients.connected`      | gauge     |            |
//! | `chat.messages`               | counter   | `type`     |
//! | `chat.event.processing`       | histogram | `type`     |
//! | `chat.lines.dropped`          | counter   |            |
//!
//! Instruments come from the global meter provider, which the host binary
//! may install. Without one the instruments are no-ops, but the observer
//! still keeps a local [`MetricsSnapshot`] of the same counts.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use opentelemetry::KeyValue;

use crate::client::ClientId;
use crate::observer::{EventObserver, TracingObserver};
use crate::registry::EventKind;

/// Instrumentation scope name.
pub const METER_NAME: &str = "linechatd";

/// Point-in-time copy of the locally kept counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Registered clients after the last processed event
    pub connected_clients: i64,
    /// Processed events, indexed like [`EventKind::ALL`]
    pub messages: [u64; EventKind::ALL.len()],
    /// Lines discarded because a mailbox was full
    pub lines_dropped: u64,
}

impl MetricsSnapshot {
    /// Processed events of one kind.
    pub fn messages(&self, kind: EventKind) -> u64 {
        self.messages[kind as usize]
    }

    /// Processed events of every kind.
    pub fn total_messages(&self) -> u64 {
        self.messages.iter().sum()
    }
}

/// Observer that records OpenTelemetry metrics and logs through
/// [`TracingObserver`].
pub struct MetricsObserver {
    connected_clients: Gauge<i64>,
    messages: Counter<u64>,
    processing: Histogram<f64>,
    lines_dropped: Counter<u64>,

    local_clients: AtomicI64,
    local_messages: [AtomicU64; EventKind::ALL.len()],
    local_dropped: AtomicU64,

    log: TracingObserver,
}

impl MetricsObserver {
    /// Builds the instruments from `meter`.
    pub fn new(meter: &Meter) -> Self {
        Self {
            connected_clients: meter
                .i64_gauge("chat.clients.connected")
                .with_description("Current number of registered chat clients")
                .with_unit("client")
                .build(),
            messages: meter
                .u64_counter("chat.messages")
                .with_description("Total registry events processed, by type")
                .with_unit("event")
                .build(),
            processing: meter
                .f64_histogram("chat.event.processing")
                .with_description("Time the registry spent on one event")
                .with_unit("s")
                .build(),
            lines_dropped: meter
                .u64_counter("chat.lines.dropped")
                .with_description("Outbound lines dropped on a full mailbox")
                .with_unit("line")
                .build(),
            local_clients: AtomicI64::new(0),
            local_messages: Default::default(),
            local_dropped: AtomicU64::new(0),
            log: TracingObserver,
        }
    }

    /// Builds the instruments from the global meter provider.
    pub fn global() -> Self {
        Self::new(&opentelemetry::global::meter(METER_NAME))
    }

    /// Returns the locally kept counts.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut messages = [0; EventKind::ALL.len()];
        for (slot, count) in messages.iter_mut().zip(&self.local_messages) {
            *slot = count.load(Ordering::Relaxed);
        }

        MetricsSnapshot {
            connected_clients: self.local_clients.load(Ordering::Relaxed),
            messages,
            lines_dropped: self.local_dropped.load(Ordering::Relaxed),
        }
    }
}

impl EventObserver for MetricsObserver {
    fn event_processed(&self, kind: EventKind, elapsed: Duration, members: usize) {
        let clients = i64::try_from(members).unwrap_or(i64::MAX);
        let attrs = [KeyValue::new("type", kind.as_str())];

        self.connected_clients.record(clients, &[]);
        self.messages.add(1, &attrs);
        self.processing.record(elapsed.as_secs_f64(), &attrs);

        self.local_clients.store(clients, Ordering::Relaxed);
        self.local_messages[kind as usize].fetch_add(1, Ordering::Relaxed);

        self.log.event_processed(kind, elapsed, members);
    }

    fn line_dropped(&self, client: ClientId) {
        self.lines_dropped.add(1, &[]);
        self.local_dropped.fetch_add(1, Ordering::Relaxed);

        self.log.line_dropped(client);
    }
}

impl std::fmt::Debug for MetricsObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsObserver")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observer() -> MetricsObserver {
        MetricsObserver::new(&opentelemetry::global::meter("linechatd-test"))
    }

    #[test]
    fn test_snapshot_starts_empty() {
        assert_eq!(observer().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_counts_follow_events() {
        let metrics = observer();

        metrics.event_processed(EventKind::Register, Duration::from_micros(20), 1);
        metrics.event_processed(EventKind::Register, Duration::from_micros(15), 2);
        metrics.event_processed(EventKind::Broadcast, Duration::from_micros(40), 2);
        metrics.event_processed(EventKind::Unregister, Duration::from_micros(10), 1);
        metrics.line_dropped(ClientId::new(9));

        let snap = metrics.snapshot();
        assert_eq!(snap.connected_clients, 1);
        assert_eq!(snap.messages(EventKind::Register), 2);
        assert_eq!(snap.messages(EventKind::Broadcast), 1);
        assert_eq!(snap.messages(EventKind::Unregister), 1);
        assert_eq!(snap.messages(EventKind::Whisper), 0);
        assert_eq!(snap.total_messages(), 4);
        assert_eq!(snap.lines_dropped, 1);
    }

    #[test]
    fn test_huge_member_count_saturates() {
        let metrics = observer();
        metrics.event_processed(EventKind::ListUsers, Duration::MAX, usize::MAX);
        assert_eq!(metrics.snapshot().connected_clients, i64::MAX);
    }
}
