//! Collection of committed events awaiting publication.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use atelier_core::AggregateId;

use crate::{Event, EventEnvelope};

#[derive(Debug, Clone, PartialEq)]
struct PendingChange {
    record_id: AggregateId,
    record_type: &'static str,
    event_type: &'static str,
    event_version: u32,
    occurred_at: DateTime<Utc>,
    payload: JsonValue,
}

/// Events committed inside one write critical section, in commit order.
///
/// Sequence numbers are assigned only when the set is sealed, so a command
/// that fails halfway never consumes any.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pending: Vec<PendingChange>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record already-applied events for one record type.
    ///
    /// Serialization failures are logged and skipped: the in-memory commit
    /// has already happened and must not be unwound by a persistence concern.
    pub fn record<E>(&mut self, record_type: &'static str, events: &[E])
    where
        E: Event + Serialize,
    {
        for ev in events {
            match serde_json::to_value(ev) {
                Ok(payload) => self.pending.push(PendingChange {
                    record_id: ev.record_id(),
                    record_type,
                    event_type: ev.event_type(),
                    event_version: ev.version(),
                    occurred_at: ev.occurred_at(),
                    payload,
                }),
                Err(err) => tracing::error!(
                    record_type,
                    event_type = ev.event_type(),
                    error = %err,
                    "failed to serialize committed event; it will not be persisted"
                ),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Stamp sequence numbers after `last_sequence` and produce envelopes.
    pub fn seal(self, last_sequence: &mut u64) -> Vec<EventEnvelope<JsonValue>> {
        self.pending
            .into_iter()
            .map(|c| {
                *last_sequence += 1;
                EventEnvelope::new(
                    Uuid::now_v7(),
                    c.record_id,
                    c.record_type,
                    *last_sequence,
                    c.event_type,
                    c.event_version,
                    c.occurred_at,
                    c.payload,
                )
            })
            .collect()
    }
}
