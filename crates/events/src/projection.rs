use serde_json::Value as JsonValue;
use thiserror::Error;

use fieldstock_core::AggregateId;

use crate::EventEnvelope;

/// Failure while folding an envelope into a read model.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("failed to deserialize {aggregate_type} event: {message}")]
    Deserialize {
        aggregate_type: String,
        message: String,
    },

    #[error("non-monotonic sequence on stream {aggregate_id} (last={last}, found={found})")]
    NonMonotonicSequence {
        aggregate_id: AggregateId,
        last: u64,
        found: u64,
    },

    #[error("event for unknown {entity} {aggregate_id}")]
    UnknownEntity {
        entity: &'static str,
        aggregate_id: AggregateId,
    },
}

/// A projection builds a queryable read model from committed envelopes.
///
/// Read models are disposable: they can be cleared and rebuilt by replaying
/// the store. Projections ignore envelopes of aggregate types they do not
/// track, and must tolerate duplicates (at-least-once delivery).
///
/// Projections take `&self` and guard their own state, so one instance can be
/// shared between the store that feeds it and the services that query it.
pub trait Projection: Send + Sync {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    /// Fold one committed envelope into the read model.
    fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError>;

    /// Drop all read-model state (rebuild support).
    fn reset(&self);
}
