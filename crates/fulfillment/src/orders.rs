//! OrderLifecycle: the delivery state machine wired to lot reservations.
//!
//! ```text
//! Pending ──place──▶ Processing ──markDelivered──▶ Delivered
//!    │                   │
//!    └──────cancel───────┴──▶ Cancelled
//! ```
//!
//! `place` reserves on the lot and moves the order in one unit of work;
//! `cancel` releases exactly what the order holds. `update_status` is the
//! administrative escape hatch and never touches inventory.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::instrument;

use fieldstock_core::{AggregateRoot, DomainError, Quantity};
use fieldstock_infra::command_dispatcher::{DispatchError, UnitOfWork};
use fieldstock_infra::event_store::EventStore;
use fieldstock_infra::projections::OrderView;
use fieldstock_inventory::{InventoryLot, LotId};
use fieldstock_orders::{
    CancelOrder, CreateOrder, DeleteOrder, DeliveryStatus, MarkDelivered, Order, OrderCommand,
    OrderId, OverrideStatus, PlaceOrder,
};

use crate::context::FulfillmentContext;
use crate::error::{FulfillmentError, FulfillmentResult};
use crate::inventory::{release_in, reserve_in};

pub struct OrderLifecycle<'a> {
    ctx: &'a FulfillmentContext,
}

impl<'a> OrderLifecycle<'a> {
    pub(crate) fn new(ctx: &'a FulfillmentContext) -> Self {
        Self { ctx }
    }

    /// Create a `Pending` order against an existing lot.
    ///
    /// Availability is checked but nothing is reserved; a later `place` can
    /// still fail with `InsufficientStock`.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn create(&self, lot_id: LotId, quantity: Decimal) -> FulfillmentResult<OrderView> {
        let quantity = Quantity::positive(quantity)?;
        let order_id = OrderId::generate();
        self.ctx
            .dispatcher()
            .transact(|tx| create_in(tx, order_id, lot_id, quantity, false))?;

        tracing::info!(%order_id, %lot_id, %quantity, "order created");
        self.get(order_id)
    }

    /// Reserve the ordered quantity and move the order to `Processing`.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn place(&self, order_id: OrderId) -> FulfillmentResult<OrderView> {
        self.ctx.dispatcher().transact(|tx| {
            let now = Utc::now();
            let mut order = tx.load_existing(order_id, Order::empty)?;
            let held_before = order.reservation();
            tx.execute(
                &mut order,
                OrderCommand::PlaceOrder(PlaceOrder {
                    order_id,
                    occurred_at: now,
                }),
            )?;
            if held_before.is_none() {
                if let Some(quantity) = order.reservation() {
                    reserve_in(tx, order.lot_id(), quantity, now)?;
                }
            }
            Ok(())
        })?;

        tracing::info!(%order_id, "order placed");
        self.get(order_id)
    }

    /// Cancel a pending or processing order, releasing whatever it holds.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn cancel(&self, order_id: OrderId) -> FulfillmentResult<OrderView> {
        let released = self.ctx.dispatcher().transact(|tx| {
            let now = Utc::now();
            let mut order = tx.load_existing(order_id, Order::empty)?;
            let held = order.reservation();
            tx.execute(
                &mut order,
                OrderCommand::CancelOrder(CancelOrder {
                    order_id,
                    occurred_at: now,
                }),
            )?;
            if let Some(quantity) = held {
                release_in(tx, order.lot_id(), quantity, now)?;
            }
            Ok(held)
        })?;

        tracing::info!(%order_id, released = ?released, "order cancelled");
        self.get(order_id)
    }

    /// Mark an order delivered. No inventory effect.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn mark_delivered(&self, order_id: OrderId) -> FulfillmentResult<OrderView> {
        self.ctx.dispatcher().dispatch(
            order_id,
            OrderCommand::MarkDelivered(MarkDelivered {
                order_id,
                occurred_at: Utc::now(),
            }),
            Order::empty,
        )?;

        tracing::info!(%order_id, "order delivered");
        self.get(order_id)
    }

    /// Administrative status override. Bypasses reservations entirely and
    /// cannot leave a terminal status.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn update_status(&self, order_id: OrderId, status: DeliveryStatus) -> FulfillmentResult<OrderView> {
        self.ctx.dispatcher().dispatch(
            order_id,
            OrderCommand::OverrideStatus(OverrideStatus {
                order_id,
                status,
                occurred_at: Utc::now(),
            }),
            Order::empty,
        )?;

        tracing::info!(%order_id, %status, "order status overridden");
        self.get(order_id)
    }

    /// Delete an order. A reservation it still holds is released unless the
    /// order was delivered.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn delete(&self, order_id: OrderId) -> FulfillmentResult<()> {
        let released = self
            .ctx
            .dispatcher()
            .transact(|tx| delete_in(tx, order_id))?;

        tracing::info!(%order_id, released = ?released, "order deleted");
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    pub fn get(&self, order_id: OrderId) -> FulfillmentResult<OrderView> {
        self.ctx
            .read_models()
            .orders
            .get(&order_id)
            .ok_or_else(|| FulfillmentError::NotFound(format!("order {order_id}")))
    }

    pub fn list(&self) -> Vec<OrderView> {
        self.ctx.read_models().orders.list()
    }

    pub fn orders_by_status(&self, status: DeliveryStatus) -> Vec<OrderView> {
        self.ctx.read_models().orders.by_status(status)
    }

    pub fn orders_for_lot(&self, lot_id: LotId) -> Vec<OrderView> {
        self.ctx.read_models().orders.for_lot(lot_id)
    }
}

/// Stage a new order against an existing lot.
///
/// With `reserve` the quantity is deducted from the lot in the same unit of
/// work and the order starts out holding it; otherwise availability is only
/// checked.
pub(crate) fn create_in<S: EventStore>(
    tx: &mut UnitOfWork<'_, S>,
    order_id: OrderId,
    lot_id: LotId,
    quantity: Quantity,
    reserve: bool,
) -> Result<Order, DispatchError> {
    let now = Utc::now();
    let lot = tx.load(lot_id, InventoryLot::empty)?;
    if !lot.exists() {
        return Err(DomainError::not_found("inventory lot").into());
    }
    if !lot.can_supply(quantity) {
        return Err(DomainError::insufficient_stock(lot_id.aggregate_id(), quantity, lot.quantity()).into());
    }

    let mut order = tx.load(order_id, Order::empty)?;
    tx.execute(
        &mut order,
        OrderCommand::CreateOrder(CreateOrder {
            order_id,
            lot_id,
            quantity,
            reserve_on_create: reserve,
            occurred_at: now,
        }),
    )?;
    if reserve {
        reserve_in(tx, lot_id, quantity, now)?;
    }
    Ok(order)
}

pub(crate) fn delete_in<S: EventStore>(
    tx: &mut UnitOfWork<'_, S>,
    order_id: OrderId,
) -> Result<Option<Quantity>, DispatchError> {
    let now = Utc::now();
    let mut order = tx.load_existing(order_id, Order::empty)?;
    let released = match order.status() {
        DeliveryStatus::Delivered => None,
        _ => order.reservation(),
    };
    tx.execute(
        &mut order,
        OrderCommand::DeleteOrder(DeleteOrder {
            order_id,
            occurred_at: now,
        }),
    )?;
    if let Some(quantity) = released {
        release_in(tx, order.lot_id(), quantity, now)?;
    }
    Ok(released)
}
