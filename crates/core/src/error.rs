//! Domain error model.

use thiserror::Error;

use crate::id::AggregateId;
use crate::quantity::Quantity;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Deterministic business failures only (validation, invariants, state
/// machine rules). Storage and transport failures belong to infra.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A non-positive quantity, yield or rating, or a malformed field.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A domain invariant or state-machine rule was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The targeted aggregate does not exist (or was deleted).
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A reservation would drive a lot's available quantity below zero.
    #[error("insufficient stock in lot {lot}: requested {requested}, available {available}")]
    InsufficientStock {
        lot: AggregateId,
        requested: Quantity,
        available: Quantity,
    },

    /// Delivered orders can no longer be cancelled.
    #[error("order has already been delivered")]
    AlreadyDelivered,

    /// A crop is missing the farm or inventory lot link needed to record harvests.
    #[error("incomplete setup: {0}")]
    IncompleteSetup(String),

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound(entity)
    }

    pub fn insufficient_stock(lot: AggregateId, requested: Quantity, available: Quantity) -> Self {
        Self::InsufficientStock {
            lot,
            requested,
            available,
        }
    }

    pub fn incomplete_setup(msg: impl Into<String>) -> Self {
        Self::IncompleteSetup(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
