//! Domain building blocks shared by every fieldstock crate.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, aggregate contracts, produce quantities and the domain error model.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod quantity;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::AggregateId;
pub use quantity::Quantity;
pub use value_object::ValueObject;
