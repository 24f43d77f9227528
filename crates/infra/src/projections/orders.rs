use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use fieldstock_core::{AggregateRoot, Entity, Quantity};
use fieldstock_events::{EventEnvelope, Projection, ProjectionError};
use fieldstock_inventory::LotId;
use fieldstock_orders::{DeliveryStatus, Order, OrderEvent, OrderId};

use crate::projections::cursor::{StreamCursors, decode};
use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderView {
    pub order_id: OrderId,
    pub lot_id: LotId,
    pub quantity_ordered: Quantity,
    pub order_date: DateTime<Utc>,
    pub status: DeliveryStatus,
    pub reservation: Option<Quantity>,
}

impl Entity for OrderView {
    type Id = OrderId;

    fn id(&self) -> &OrderId {
        &self.order_id
    }
}

/// Order book projection (`findByStatus`, orders per lot). Deleted orders
/// drop out of the book.
#[derive(Debug, Default)]
pub struct OrderBookProjection {
    rows: InMemoryReadStore<OrderView>,
    cursors: StreamCursors,
}

impl OrderBookProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, order_id: &OrderId) -> Option<OrderView> {
        self.rows.get(order_id)
    }

    pub fn list(&self) -> Vec<OrderView> {
        self.rows.list()
    }

    pub fn by_status(&self, status: DeliveryStatus) -> Vec<OrderView> {
        self.rows.filter(&|o: &OrderView| o.status == status)
    }

    pub fn for_lot(&self, lot_id: LotId) -> Vec<OrderView> {
        self.rows.filter(&|o: &OrderView| o.lot_id == lot_id)
    }

    fn row(&self, order_id: OrderId) -> Result<OrderView, ProjectionError> {
        self.rows.get(&order_id).ok_or(ProjectionError::UnknownEntity {
            entity: "order",
            aggregate_id: order_id.aggregate_id(),
        })
    }

    fn fold(&self, ev: OrderEvent) -> Result<(), ProjectionError> {
        match ev {
            OrderEvent::OrderCreated(e) => self.rows.upsert(OrderView {
                order_id: e.order_id,
                lot_id: e.lot_id,
                quantity_ordered: e.quantity,
                order_date: e.occurred_at,
                status: DeliveryStatus::Pending,
                reservation: None,
            }),
            OrderEvent::ReservationHeld(e) => {
                let mut row = self.row(e.order_id)?;
                row.reservation = Some(e.quantity);
                self.rows.upsert(row);
            }
            OrderEvent::OrderPlaced(e) => {
                let mut row = self.row(e.order_id)?;
                row.status = DeliveryStatus::Processing;
                self.rows.upsert(row);
            }
            OrderEvent::OrderCancelled(e) => {
                let mut row = self.row(e.order_id)?;
                row.status = DeliveryStatus::Cancelled;
                row.reservation = None;
                self.rows.upsert(row);
            }
            OrderEvent::OrderDelivered(e) => {
                let mut row = self.row(e.order_id)?;
                row.status = DeliveryStatus::Delivered;
                self.rows.upsert(row);
            }
            OrderEvent::StatusOverridden(e) => {
                let mut row = self.row(e.order_id)?;
                row.status = e.to;
                self.rows.upsert(row);
            }
            OrderEvent::OrderDeleted(e) => {
                self.rows.remove(&e.order_id);
            }
        }
        Ok(())
    }
}

impl Projection for OrderBookProjection {
    fn name(&self) -> &'static str {
        "orders.book"
    }

    fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != Order::AGGREGATE_TYPE {
            return Ok(());
        }
        if !self.cursors.is_next(envelope)? {
            return Ok(());
        }

        self.fold(decode(envelope)?)?;
        self.cursors.advance(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }

    fn reset(&self) {
        self.rows.clear();
        self.cursors.clear();
    }
}
