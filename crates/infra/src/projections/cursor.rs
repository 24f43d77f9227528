//! Per-stream projection cursors.
//!
//! A cursor tracks the last sequence number a projection folded for each
//! stream, which makes projections idempotent under at-least-once delivery
//! (replays at or below the cursor are ignored) and detects gaps.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use fieldstock_core::AggregateId;
use fieldstock_events::{EventEnvelope, ProjectionError};

#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: RwLock<HashMap<AggregateId, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `envelope` is the next event of its stream.
    ///
    /// `Ok(false)` means a duplicate that must be skipped. The first event
    /// seen for a stream may have any positive sequence number; after that
    /// increments must be exactly one.
    pub fn is_next(&self, envelope: &EventEnvelope<JsonValue>) -> Result<bool, ProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();
        let last = self.last(aggregate_id);

        if seq == 0 || (seq > last + 1 && last != 0) {
            return Err(ProjectionError::NonMonotonicSequence {
                aggregate_id,
                last,
                found: seq,
            });
        }
        Ok(seq > last)
    }

    pub fn advance(&self, aggregate_id: AggregateId, seq: u64) {
        self.write().insert(aggregate_id, seq);
    }

    pub fn last(&self, aggregate_id: AggregateId) -> u64 {
        self.read().get(&aggregate_id).copied().unwrap_or(0)
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<AggregateId, u64>> {
        self.inner.read().unwrap_or_else(|poisoned| {
            tracing::warn!("projection cursor lock poisoned, continuing with last recorded positions");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<AggregateId, u64>> {
        self.inner.write().unwrap_or_else(|poisoned| {
            tracing::warn!("projection cursor lock poisoned, continuing with last recorded positions");
            poisoned.into_inner()
        })
    }
}

/// Decode an envelope payload into a typed domain event.
pub(crate) fn decode<E: DeserializeOwned>(envelope: &EventEnvelope<JsonValue>) -> Result<E, ProjectionError> {
    serde_json::from_value(envelope.payload().clone()).map_err(|e| ProjectionError::Deserialize {
        aggregate_type: envelope.aggregate_type().to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn envelope(aggregate_id: AggregateId, seq: u64) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            aggregate_id,
            "test.stream",
            seq,
            seq,
            "test.event",
            Utc::now(),
            JsonValue::Null,
        )
    }

    #[test]
    fn skips_duplicates_and_rejects_gaps() {
        let cursors = StreamCursors::new();
        let id = AggregateId::new();

        assert!(cursors.is_next(&envelope(id, 1)).unwrap());
        cursors.advance(id, 1);
        assert!(!cursors.is_next(&envelope(id, 1)).unwrap());
        assert!(cursors.is_next(&envelope(id, 2)).unwrap());
        assert!(matches!(
            cursors.is_next(&envelope(id, 4)),
            Err(ProjectionError::NonMonotonicSequence { last: 1, found: 4, .. })
        ));
        assert!(cursors.is_next(&envelope(id, 0)).is_err());

        cursors.clear();
        assert_eq!(cursors.last(id), 0);
    }

    #[test]
    fn positions_survive_a_poisoned_lock() {
        let cursors = std::sync::Arc::new(StreamCursors::new());
        let id = AggregateId::new();
        cursors.advance(id, 3);

        let holder = std::sync::Arc::clone(&cursors);
        let panicked = std::thread::spawn(move || {
            let _guard = holder.inner.write().unwrap();
            panic!("fold failed mid-update");
        })
        .join();
        assert!(panicked.is_err());

        assert_eq!(cursors.last(id), 3);
        assert!(!cursors.is_next(&envelope(id, 3)).unwrap());
        cursors.advance(id, 4);
        assert_eq!(cursors.last(id), 4);
    }
}
