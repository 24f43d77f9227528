use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fieldstock_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Quantity, typed_id};
use fieldstock_events::Event;
use fieldstock_inventory::LotId;

typed_id!(
    /// Order identifier.
    OrderId
);

/// Delivery status lifecycle.
///
/// `Pending -> Processing -> Delivered`, with `Pending`/`Processing -> Cancelled`.
/// `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Processing,
    Delivered,
    Cancelled,
}

impl DeliveryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Delivered | DeliveryStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Processing => "processing",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for DeliveryStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(DeliveryStatus::Pending),
            "processing" => Ok(DeliveryStatus::Processing),
            "delivered" => Ok(DeliveryStatus::Delivered),
            "cancelled" | "canceled" => Ok(DeliveryStatus::Cancelled),
            other => Err(DomainError::invalid_argument(format!(
                "unknown delivery status '{other}'"
            ))),
        }
    }
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    lot_id: LotId,
    quantity_ordered: Quantity,
    order_date: Option<DateTime<Utc>>,
    status: DeliveryStatus,
    reservation: Option<Quantity>,
    version: u64,
    created: bool,
    deleted: bool,
}

impl Order {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            lot_id: LotId::new(AggregateId::nil()),
            quantity_ordered: Quantity::ZERO,
            order_date: None,
            status: DeliveryStatus::Pending,
            reservation: None,
            version: 0,
            created: false,
            deleted: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn lot_id(&self) -> LotId {
        self.lot_id
    }

    pub fn quantity_ordered(&self) -> Quantity {
        self.quantity_ordered
    }

    pub fn order_date(&self) -> Option<DateTime<Utc>> {
        self.order_date
    }

    pub fn status(&self) -> DeliveryStatus {
        self.status
    }

    /// Quantity this order currently holds against its lot, if any.
    pub fn reservation(&self) -> Option<Quantity> {
        self.reservation
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    const AGGREGATE_TYPE: &'static str = "orders.order";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn exists(&self) -> bool {
        self.created && !self.deleted
    }
}

/// Command: CreateOrder.
///
/// With `reserve_on_create` the order is born already holding its
/// reservation; the caller is responsible for reserving the lot in the same
/// unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub order_id: OrderId,
    pub lot_id: LotId,
    pub quantity: Quantity,
    pub reserve_on_create: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PlaceOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkDelivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkDelivered {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: OverrideStatus (administrative, no reservation effect).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideStatus {
    pub order_id: OrderId,
    pub status: DeliveryStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOrder {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    CreateOrder(CreateOrder),
    PlaceOrder(PlaceOrder),
    CancelOrder(CancelOrder),
    MarkDelivered(MarkDelivered),
    OverrideStatus(OverrideStatus),
    DeleteOrder(DeleteOrder),
}

/// Event: OrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: OrderId,
    pub lot_id: LotId,
    pub quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReservationHeld. The order now holds `quantity` of its lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationHeld {
    pub order_id: OrderId,
    pub lot_id: LotId,
    pub quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCancelled. `released` is the reservation handed back, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: OrderId,
    pub previous: DeliveryStatus,
    pub released: Option<Quantity>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderDelivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDelivered {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StatusOverridden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusOverridden {
    pub order_id: OrderId,
    pub from: DeliveryStatus,
    pub to: DeliveryStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderDeleted (tombstone).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDeleted {
    pub order_id: OrderId,
    pub lot_id: LotId,
    pub released: Option<Quantity>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderCreated(OrderCreated),
    ReservationHeld(ReservationHeld),
    OrderPlaced(OrderPlaced),
    OrderCancelled(OrderCancelled),
    OrderDelivered(OrderDelivered),
    StatusOverridden(StatusOverridden),
    OrderDeleted(OrderDeleted),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated(_) => "orders.order.created",
            OrderEvent::ReservationHeld(_) => "orders.order.reservation_held",
            OrderEvent::OrderPlaced(_) => "orders.order.placed",
            OrderEvent::OrderCancelled(_) => "orders.order.cancelled",
            OrderEvent::OrderDelivered(_) => "orders.order.delivered",
            OrderEvent::StatusOverridden(_) => "orders.order.status_overridden",
            OrderEvent::OrderDeleted(_) => "orders.order.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderCreated(e) => e.occurred_at,
            OrderEvent::ReservationHeld(e) => e.occurred_at,
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::OrderCancelled(e) => e.occurred_at,
            OrderEvent::OrderDelivered(e) => e.occurred_at,
            OrderEvent::StatusOverridden(e) => e.occurred_at,
            OrderEvent::OrderDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderCreated(e) => {
                self.id = e.order_id;
                self.lot_id = e.lot_id;
                self.quantity_ordered = e.quantity;
                self.order_date = Some(e.occurred_at);
                self.status = DeliveryStatus::Pending;
                self.reservation = None;
                self.created = true;
            }
            OrderEvent::ReservationHeld(e) => {
                self.reservation = Some(e.quantity);
            }
            OrderEvent::OrderPlaced(_) => {
                self.status = DeliveryStatus::Processing;
            }
            OrderEvent::OrderCancelled(_) => {
                self.status = DeliveryStatus::Cancelled;
                self.reservation = None;
            }
            OrderEvent::OrderDelivered(_) => {
                self.status = DeliveryStatus::Delivered;
            }
            OrderEvent::StatusOverridden(e) => {
                self.status = e.to;
            }
            OrderEvent::OrderDeleted(_) => {
                self.reservation = None;
                self.deleted = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::CreateOrder(cmd) => self.handle_create(cmd),
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::CancelOrder(cmd) => self.handle_cancel(cmd),
            OrderCommand::MarkDelivered(cmd) => self.handle_mark_delivered(cmd),
            OrderCommand::OverrideStatus(cmd) => self.handle_override(cmd),
            OrderCommand::DeleteOrder(cmd) => self.handle_delete(cmd),
        }
    }
}

impl Order {
    fn ensure_live(&self, order_id: OrderId) -> Result<(), DomainError> {
        if !self.exists() {
            return Err(DomainError::not_found("order"));
        }
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }
        if cmd.quantity.is_zero() {
            return Err(DomainError::invalid_argument("quantity ordered must be positive"));
        }
        if cmd.lot_id.aggregate_id() == AggregateId::nil() {
            return Err(DomainError::invalid_argument("order must reference a lot"));
        }

        let mut events = vec![OrderEvent::OrderCreated(OrderCreated {
            order_id: cmd.order_id,
            lot_id: cmd.lot_id,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })];

        if cmd.reserve_on_create {
            events.push(OrderEvent::ReservationHeld(ReservationHeld {
                order_id: cmd.order_id,
                lot_id: cmd.lot_id,
                quantity: cmd.quantity,
                occurred_at: cmd.occurred_at,
            }));
        }

        Ok(events)
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_live(cmd.order_id)?;

        if self.status != DeliveryStatus::Pending {
            return Err(DomainError::invariant(format!(
                "only pending orders can be placed (status: {})",
                self.status
            )));
        }

        let mut events = Vec::with_capacity(2);
        if self.reservation.is_none() {
            events.push(OrderEvent::ReservationHeld(ReservationHeld {
                order_id: cmd.order_id,
                lot_id: self.lot_id,
                quantity: self.quantity_ordered,
                occurred_at: cmd.occurred_at,
            }));
        }
        events.push(OrderEvent::OrderPlaced(OrderPlaced {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        }));

        Ok(events)
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_live(cmd.order_id)?;

        match self.status {
            DeliveryStatus::Delivered => return Err(DomainError::AlreadyDelivered),
            DeliveryStatus::Cancelled => {
                return Err(DomainError::invariant("order is already cancelled"));
            }
            DeliveryStatus::Pending | DeliveryStatus::Processing => {}
        }

        Ok(vec![OrderEvent::OrderCancelled(OrderCancelled {
            order_id: cmd.order_id,
            previous: self.status,
            released: self.reservation,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_delivered(&self, cmd: &MarkDelivered) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_live(cmd.order_id)?;

        let deliverable = match self.status {
            DeliveryStatus::Processing => true,
            DeliveryStatus::Pending => self.reservation.is_some(),
            DeliveryStatus::Delivered | DeliveryStatus::Cancelled => false,
        };
        if !deliverable {
            return Err(DomainError::invariant(format!(
                "order cannot be delivered from status {}{}",
                self.status,
                if self.reservation.is_none() && self.status == DeliveryStatus::Pending {
                    " without a reservation"
                } else {
                    ""
                }
            )));
        }

        Ok(vec![OrderEvent::OrderDelivered(OrderDelivered {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_override(&self, cmd: &OverrideStatus) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_live(cmd.order_id)?;

        if self.status == cmd.status {
            return Ok(Vec::new());
        }
        if self.status.is_terminal() {
            return Err(DomainError::invariant(format!(
                "order status {} is terminal",
                self.status
            )));
        }

        Ok(vec![OrderEvent::StatusOverridden(StatusOverridden {
            order_id: cmd.order_id,
            from: self.status,
            to: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeleteOrder) -> Result<Vec<OrderEvent>, DomainError> {
        self.ensure_live(cmd.order_id)?;

        // A delivered order's reservation left with the produce.
        let released = match self.status {
            DeliveryStatus::Delivered => None,
            _ => self.reservation,
        };

        Ok(vec![OrderEvent::OrderDeleted(OrderDeleted {
            order_id: cmd.order_id,
            lot_id: self.lot_id,
            released,
            occurred_at: cmd.occurred_at,
        })])
    }
}
