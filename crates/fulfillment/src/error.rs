use thiserror::Error;

use fieldstock_core::{DomainError, Quantity};
use fieldstock_infra::command_dispatcher::DispatchError;
use fieldstock_inventory::LotId;

pub type FulfillmentResult<T> = Result<T, FulfillmentError>;

/// Typed failures reported by the fulfillment services.
///
/// Every variant is recoverable. A failed operation never leaves a partial
/// write behind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FulfillmentError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("insufficient stock in lot {lot}: requested {requested}, available {available}")]
    InsufficientStock {
        lot: LotId,
        requested: Quantity,
        available: Quantity,
    },

    #[error("order has already been delivered")]
    AlreadyDelivered,

    #[error("incomplete crop setup: {0}")]
    IncompleteCropSetup(String),

    /// A state-machine rule other than cancelling a delivered order.
    #[error("illegal transition: {0}")]
    IllegalTransition(String),

    /// Version conflicts outlasted every retry, or a create collided.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("infrastructure failure: {0}")]
    Infrastructure(String),
}

impl From<DomainError> for FulfillmentError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InvalidArgument(msg) | DomainError::InvalidId(msg) => Self::InvalidArgument(msg),
            DomainError::InvariantViolation(msg) => Self::IllegalTransition(msg),
            DomainError::NotFound(entity) => Self::NotFound(entity.to_string()),
            DomainError::InsufficientStock {
                lot,
                requested,
                available,
            } => Self::InsufficientStock {
                lot: LotId::from(lot),
                requested,
                available,
            },
            DomainError::AlreadyDelivered => Self::AlreadyDelivered,
            DomainError::IncompleteSetup(msg) => Self::IncompleteCropSetup(msg),
            DomainError::Conflict(msg) => Self::Conflict(msg),
        }
    }
}

impl From<DispatchError> for FulfillmentError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::Domain(err) => err.into(),
            DispatchError::NotFound {
                aggregate_type,
                aggregate_id,
            } => Self::NotFound(format!("{aggregate_type} {aggregate_id}")),
            DispatchError::Concurrency(msg) => Self::Conflict(msg),
            DispatchError::Deserialize(msg) => Self::Infrastructure(msg),
            DispatchError::Store(err) => Self::Infrastructure(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldstock_core::AggregateId;
    use fieldstock_infra::event_store::EventStoreError;

    #[test]
    fn domain_errors_keep_their_category() {
        let lot = AggregateId::new();
        let err: FulfillmentError =
            DomainError::insufficient_stock(lot, Quantity::ZERO, Quantity::ZERO).into();
        assert!(matches!(err, FulfillmentError::InsufficientStock { lot: l, .. } if l.aggregate_id() == lot));

        let err: FulfillmentError = DomainError::invariant("terminal").into();
        assert_eq!(err, FulfillmentError::IllegalTransition("terminal".to_string()));

        let err: FulfillmentError = DomainError::incomplete_setup("no lot").into();
        assert_eq!(err, FulfillmentError::IncompleteCropSetup("no lot".to_string()));
    }

    #[test]
    fn dispatch_errors_map_to_conflict_or_infrastructure() {
        let err: FulfillmentError = DispatchError::Concurrency("stale".to_string()).into();
        assert_eq!(err, FulfillmentError::Conflict("stale".to_string()));

        let err: FulfillmentError =
            DispatchError::Store(EventStoreError::Unavailable("down".to_string())).into();
        assert!(matches!(err, FulfillmentError::Infrastructure(_)));

        let id = AggregateId::new();
        let err: FulfillmentError = DispatchError::NotFound {
            aggregate_type: "orders.order",
            aggregate_id: id,
        }
        .into();
        assert_eq!(err, FulfillmentError::NotFound(format!("orders.order {id}")));
    }
}
