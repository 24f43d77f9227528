//! Append-only event store boundary.
//!
//! Defines an infrastructure-facing abstraction for storing and loading event
//! streams without making any storage assumptions.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, StreamAppend, UncommittedEvent};
