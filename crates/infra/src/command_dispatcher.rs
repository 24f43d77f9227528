//! Command execution pipeline (application-level orchestration).
//!
//! ```text
//! UnitOfWork (one attempt)
//!   ↓
//! 1. Load events for each touched aggregate and rehydrate it
//!   ↓
//! 2. Handle commands (pure decisions), apply and stage the decided events
//!   ↓
//! 3. Append every staged stream in one atomic batch, each guarded by the
//!    version it was loaded at
//!   ↓
//! 4. On a version conflict, throw the attempt away and run it again
//!   ↓
//! 5. Publish committed events to the bus
//! ```
//!
//! A unit of work can touch several aggregates (an order and its lot, a
//! harvest and its crop and lot). Either all of their events are committed
//! or none are.
//!
//! This module contains no IO itself; it composes infrastructure traits.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use fieldstock_core::{Aggregate, AggregateId, AggregateRoot, DomainError, ExpectedVersion};
use fieldstock_events::{EventBus, EventEnvelope};

use crate::config::FulfillmentConfig;
use crate::event_store::{EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// A command was rejected by the aggregate (deterministic).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The aggregate stream is empty or tombstoned.
    #[error("{aggregate_type} {aggregate_id} not found")]
    NotFound {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
    },

    /// Optimistic concurrency failure that survived every retry.
    #[error("concurrent modification: {0}")]
    Concurrency(String),

    /// Failed to deserialize historical event payloads into the aggregate event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    /// Persisting to or loading from the event store failed.
    #[error("event store error: {0}")]
    Store(EventStoreError),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency { .. } => DispatchError::Concurrency(value.to_string()),
            other => DispatchError::Store(other),
        }
    }
}

/// Events staged by one attempt of a unit of work.
///
/// Aggregates loaded through the unit of work see the events already staged
/// for their stream, so a closure may load the same aggregate twice.
pub struct UnitOfWork<'s, S> {
    store: &'s S,
    staged: Vec<StreamAppend>,
}

impl<'s, S> UnitOfWork<'s, S>
where
    S: EventStore,
{
    fn new(store: &'s S) -> Self {
        Self {
            store,
            staged: Vec::new(),
        }
    }

    /// Load and rehydrate an aggregate, whether or not it exists yet.
    pub fn load<A>(&mut self, id: A::Id, make: impl FnOnce(A::Id) -> A) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Id: Copy + Into<AggregateId>,
        A::Event: DeserializeOwned,
    {
        let aggregate_id: AggregateId = id.into();
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;

        let mut aggregate = make(id);
        apply_history(&mut aggregate, &history)?;

        if let Some(pending) = self.staged.iter().find(|s| s.aggregate_id == aggregate_id) {
            for e in &pending.events {
                let ev: A::Event = serde_json::from_value(e.payload.clone())
                    .map_err(|err| DispatchError::Deserialize(err.to_string()))?;
                aggregate.apply(&ev);
            }
        }

        Ok(aggregate)
    }

    /// Load an aggregate that must exist (not empty, not tombstoned).
    pub fn load_existing<A>(
        &mut self,
        id: A::Id,
        make: impl FnOnce(A::Id) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Id: Copy + Into<AggregateId>,
        A::Event: DeserializeOwned,
    {
        let aggregate = self.load(id, make)?;
        if !aggregate.exists() {
            return Err(DispatchError::NotFound {
                aggregate_type: A::AGGREGATE_TYPE,
                aggregate_id: id.into(),
            });
        }
        Ok(aggregate)
    }

    /// Handle `command` on `aggregate`, apply the decided events to it and
    /// stage them for commit.
    ///
    /// The first staging for a stream records the version the aggregate was
    /// loaded at; the commit fails if the stream has moved since.
    pub fn execute<A>(&mut self, aggregate: &mut A, command: A::Command) -> Result<(), DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Id: Copy + Into<AggregateId>,
        A::Event: fieldstock_events::Event + Serialize,
    {
        let decided = aggregate.handle(&command)?;
        if decided.is_empty() {
            return Ok(());
        }

        let aggregate_id: AggregateId = (*aggregate.id()).into();
        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(aggregate_id, A::AGGREGATE_TYPE, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        let loaded_at = aggregate.version();
        for ev in &decided {
            aggregate.apply(ev);
        }

        match self.staged.iter_mut().find(|s| s.aggregate_id == aggregate_id) {
            Some(pending) => pending.events.extend(uncommitted),
            None => self.staged.push(StreamAppend {
                aggregate_id,
                aggregate_type: A::AGGREGATE_TYPE.to_string(),
                expected_version: ExpectedVersion::Exact(loaded_at),
                events: uncommitted,
            }),
        }

        Ok(())
    }

    /// Number of events staged so far in this attempt.
    pub fn staged_len(&self) -> usize {
        self.staged.iter().map(|s| s.events.len()).sum()
    }

    fn into_staged(self) -> Vec<StreamAppend> {
        self.staged
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// ## Execution Guarantees
///
/// - **Atomicity**: every stream touched by a unit of work commits together
/// - **Isolation**: each stream append is guarded by `ExpectedVersion::Exact`
/// - **Retries**: version conflicts re-run the whole unit of work from a fresh
///   load, up to `max_commit_attempts`
/// - **Publication**: committed events are published after the append;
///   publication failures are logged and never undo a commit
///
/// Generic over the store `S` and bus `B`, so tests and the demo use the
/// in-memory implementations.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
    max_attempts: u32,
    publish: bool,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self::from_config(store, bus, &FulfillmentConfig::default())
    }

    pub fn from_config(store: S, bus: B, config: &FulfillmentConfig) -> Self {
        Self {
            store,
            bus,
            max_attempts: config.max_commit_attempts.max(1),
            publish: config.event_bus_enabled,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Load and rehydrate an aggregate outside of any unit of work.
    pub fn load<A>(&self, id: A::Id, make: impl FnOnce(A::Id) -> A) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Id: Copy + Into<AggregateId>,
        A::Event: DeserializeOwned,
    {
        UnitOfWork::new(&self.store).load(id, make)
    }

    /// Load an aggregate that must exist.
    pub fn load_existing<A>(&self, id: A::Id, make: impl FnOnce(A::Id) -> A) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Id: Copy + Into<AggregateId>,
        A::Event: DeserializeOwned,
    {
        UnitOfWork::new(&self.store).load_existing(id, make)
    }

    /// Dispatch a single command against a single aggregate.
    pub fn dispatch<A>(
        &self,
        id: A::Id,
        command: A::Command,
        make: impl Fn(A::Id) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Id: Copy + Into<AggregateId>,
        A::Event: fieldstock_events::Event + Serialize + DeserializeOwned,
    {
        let ((), committed) = self.run(|tx| {
            let mut aggregate = tx.load(id, &make)?;
            tx.execute(&mut aggregate, command.clone())
        })?;
        Ok(committed)
    }

    /// Run `work` as one atomic unit, retrying on version conflicts.
    ///
    /// `work` may be called several times and must derive everything it
    /// stages from what it loads through the unit of work. An `Err` from
    /// `work` aborts without writing anything.
    pub fn transact<T>(
        &self,
        work: impl FnMut(&mut UnitOfWork<'_, S>) -> Result<T, DispatchError>,
    ) -> Result<T, DispatchError> {
        self.run(work).map(|(value, _)| value)
    }

    fn run<T>(
        &self,
        mut work: impl FnMut(&mut UnitOfWork<'_, S>) -> Result<T, DispatchError>,
    ) -> Result<(T, Vec<StoredEvent>), DispatchError> {
        let mut attempt = 1u32;
        loop {
            let mut tx = UnitOfWork::new(&self.store);
            let value = work(&mut tx)?;
            let staged = tx.into_staged();
            if staged.is_empty() {
                return Ok((value, Vec::new()));
            }

            match self.store.append(staged) {
                Ok(committed) => {
                    self.publish_committed(&committed);
                    return Ok((value, committed));
                }
                Err(err @ EventStoreError::Concurrency { .. }) if attempt < self.max_attempts => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "version conflict, retrying unit of work"
                    );
                    attempt += 1;
                }
                Err(err) => {
                    if matches!(err, EventStoreError::Concurrency { .. }) {
                        tracing::warn!(
                            attempts = attempt,
                            error = %err,
                            "giving up on unit of work after repeated version conflicts"
                        );
                    }
                    return Err(err.into());
                }
            }
        }
    }

    fn publish_committed(&self, committed: &[StoredEvent]) {
        if !self.publish {
            return;
        }
        for stored in committed {
            if let Err(err) = self.bus.publish(stored.to_envelope()) {
                tracing::warn!(
                    aggregate_id = %stored.aggregate_id,
                    event_type = %stored.event_type,
                    error = ?err,
                    "failed to publish committed event"
                );
            }
        }
    }
}

fn validate_loaded_stream(aggregate_id: AggregateId, stream: &[StoredEvent]) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            ))));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}
