use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use fieldstock_core::AggregateId;
use fieldstock_events::Projection;

use super::r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend};

#[derive(Debug, Default)]
struct StoreState {
    streams: HashMap<AggregateId, Vec<StoredEvent>>,
    log: Vec<StoredEvent>,
}

/// In-memory append-only event store.
///
/// Registered projections are fed synchronously while the write lock is
/// held, so a read model never lags behind a returned `append`.
#[derive(Default)]
pub struct InMemoryEventStore {
    state: RwLock<StoreState>,
    projections: Vec<Arc<dyn Projection>>,
}

impl core::fmt::Debug for InMemoryEventStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InMemoryEventStore")
            .field(
                "projections",
                &self.projections.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a projection to be updated inside every append.
    pub fn with_projection(mut self, projection: Arc<dyn Projection>) -> Self {
        self.projections.push(projection);
        self
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }

    fn validate_batch(batch: &[StreamAppend]) -> Result<(), EventStoreError> {
        let mut seen = HashSet::with_capacity(batch.len());
        for append in batch {
            if !seen.insert(append.aggregate_id) {
                return Err(EventStoreError::InvalidAppend(format!(
                    "stream {} appears twice in one batch",
                    append.aggregate_id
                )));
            }
            for (idx, e) in append.events.iter().enumerate() {
                if e.aggregate_id != append.aggregate_id {
                    return Err(EventStoreError::InvalidAppend(format!(
                        "event {idx} targets {} inside append for {}",
                        e.aggregate_id, append.aggregate_id
                    )));
                }
                if e.aggregate_type != append.aggregate_type {
                    return Err(EventStoreError::AggregateTypeMismatch(format!(
                        "event {idx} has aggregate_type '{}', append is for '{}'",
                        e.aggregate_type, append.aggregate_type
                    )));
                }
            }
        }
        Ok(())
    }
}

impl EventStore for InMemoryEventStore {
    fn append(&self, batch: Vec<StreamAppend>) -> Result<Vec<StoredEvent>, EventStoreError> {
        let batch: Vec<StreamAppend> = batch.into_iter().filter(|a| !a.events.is_empty()).collect();
        if batch.is_empty() {
            return Ok(vec![]);
        }
        Self::validate_batch(&batch)?;

        let mut state = self
            .state
            .write()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        // Check every stream before touching any of them.
        for append in &batch {
            let stream = state
                .streams
                .get(&append.aggregate_id)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let current = Self::current_version(stream);

            if !append.expected_version.matches(current) {
                return Err(EventStoreError::Concurrency {
                    aggregate_id: append.aggregate_id,
                    expected: append.expected_version,
                    actual: current,
                });
            }

            if let Some(existing) = stream.first() {
                if existing.aggregate_type != append.aggregate_type {
                    return Err(EventStoreError::AggregateTypeMismatch(format!(
                        "stream aggregate_type is '{}', attempted append with '{}'",
                        existing.aggregate_type, append.aggregate_type
                    )));
                }
            }
        }

        let mut global = state.log.len() as u64;
        let mut committed = Vec::new();
        for append in batch {
            let stream = state.streams.entry(append.aggregate_id).or_default();
            let mut next = Self::current_version(stream) + 1;
            for e in append.events {
                global += 1;
                let stored = StoredEvent {
                    event_id: e.event_id,
                    aggregate_id: e.aggregate_id,
                    aggregate_type: e.aggregate_type,
                    sequence_number: next,
                    global_position: global,
                    event_type: e.event_type,
                    event_version: e.event_version,
                    occurred_at: e.occurred_at,
                    payload: e.payload,
                };
                next += 1;
                stream.push(stored.clone());
                committed.push(stored);
            }
        }
        state.log.extend(committed.iter().cloned());

        for stored in &committed {
            let envelope = stored.to_envelope();
            for projection in &self.projections {
                if let Err(err) = projection.apply(&envelope) {
                    tracing::warn!(
                        projection = projection.name(),
                        aggregate_id = %stored.aggregate_id,
                        sequence_number = stored.sequence_number,
                        error = %err,
                        "projection failed to apply committed event"
                    );
                }
            }
        }

        Ok(committed)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        Ok(state.streams.get(&aggregate_id).cloned().unwrap_or_default())
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        Ok(state.log.clone())
    }
}
