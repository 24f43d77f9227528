//! Produce orders domain module (event-sourced).
//!
//! The order aggregate is the delivery state machine. It records the
//! reservation it holds against its lot but never touches the lot itself;
//! coordinating the two streams is the job of the fulfillment services.

pub mod order;

pub use order::{
    CancelOrder, CreateOrder, DeleteOrder, DeliveryStatus, MarkDelivered, Order, OrderCancelled,
    OrderCommand, OrderCreated, OrderDeleted, OrderDelivered, OrderEvent, OrderId, OrderPlaced,
    OverrideStatus, PlaceOrder, ReservationHeld, StatusOverridden,
};
