use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fieldstock_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Quantity, typed_id};
use fieldstock_events::Event;

typed_id!(
    /// Inventory lot identifier.
    LotId
);

/// Aggregate root: InventoryLot.
///
/// `quantity` is what can still be promised to orders; `stock` is everything
/// ever received into the lot. Reservations and releases move `quantity`
/// only, harvest deliveries move both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryLot {
    id: LotId,
    produce_type: String,
    storage_location: String,
    quantity: Quantity,
    stock: Quantity,
    fresh: bool,
    version: u64,
    created: bool,
}

impl InventoryLot {
    /// Create an empty, not-yet-registered aggregate instance for rehydration.
    pub fn empty(id: LotId) -> Self {
        Self {
            id,
            produce_type: String::new(),
            storage_location: String::new(),
            quantity: Quantity::ZERO,
            stock: Quantity::ZERO,
            fresh: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> LotId {
        self.id
    }

    pub fn produce_type(&self) -> &str {
        &self.produce_type
    }

    pub fn storage_location(&self) -> &str {
        &self.storage_location
    }

    /// Units still available for reservation.
    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    /// Cumulative units received into the lot.
    pub fn stock(&self) -> Quantity {
        self.stock
    }

    pub fn is_fresh(&self) -> bool {
        self.fresh
    }

    /// True iff the lot exists and can cover `required` right now.
    pub fn can_supply(&self, required: Quantity) -> bool {
        self.created && self.quantity >= required
    }
}

impl AggregateRoot for InventoryLot {
    type Id = LotId;

    const AGGREGATE_TYPE: &'static str = "inventory.lot";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn exists(&self) -> bool {
        self.created
    }
}

/// Command: RegisterLot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterLot {
    pub lot_id: LotId,
    pub produce_type: String,
    pub storage_location: String,
    pub initial_quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReserveQuantity (check-and-decrement in one decision).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveQuantity {
    pub lot_id: LotId,
    pub quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleaseQuantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseQuantity {
    pub lot_id: LotId,
    pub quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReceiveStock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveStock {
    pub lot_id: LotId,
    pub amount: Quantity,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotCommand {
    RegisterLot(RegisterLot),
    ReserveQuantity(ReserveQuantity),
    ReleaseQuantity(ReleaseQuantity),
    ReceiveStock(ReceiveStock),
}

/// Event: LotRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotRegistered {
    pub lot_id: LotId,
    pub produce_type: String,
    pub storage_location: String,
    pub initial_quantity: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Event: QuantityReserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityReserved {
    pub lot_id: LotId,
    pub quantity: Quantity,
    /// Available quantity after the reservation.
    pub remaining: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Event: QuantityReleased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityReleased {
    pub lot_id: LotId,
    pub quantity: Quantity,
    /// Available quantity after the release.
    pub available: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockReceived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReceived {
    pub lot_id: LotId,
    pub amount: Quantity,
    /// Available quantity after the receipt.
    pub available: Quantity,
    /// Cumulative stock after the receipt.
    pub stock: Quantity,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotEvent {
    LotRegistered(LotRegistered),
    QuantityReserved(QuantityReserved),
    QuantityReleased(QuantityReleased),
    StockReceived(StockReceived),
}

impl LotEvent {
    pub fn lot_id(&self) -> LotId {
        match self {
            LotEvent::LotRegistered(e) => e.lot_id,
            LotEvent::QuantityReserved(e) => e.lot_id,
            LotEvent::QuantityReleased(e) => e.lot_id,
            LotEvent::StockReceived(e) => e.lot_id,
        }
    }
}

impl Event for LotEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LotEvent::LotRegistered(_) => "inventory.lot.registered",
            LotEvent::QuantityReserved(_) => "inventory.lot.quantity_reserved",
            LotEvent::QuantityReleased(_) => "inventory.lot.quantity_released",
            LotEvent::StockReceived(_) => "inventory.lot.stock_received",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LotEvent::LotRegistered(e) => e.occurred_at,
            LotEvent::QuantityReserved(e) => e.occurred_at,
            LotEvent::QuantityReleased(e) => e.occurred_at,
            LotEvent::StockReceived(e) => e.occurred_at,
        }
    }
}

impl Aggregate for InventoryLot {
    type Command = LotCommand;
    type Event = LotEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LotEvent::LotRegistered(e) => {
                self.id = e.lot_id;
                self.produce_type = e.produce_type.clone();
                self.storage_location = e.storage_location.clone();
                self.quantity = e.initial_quantity;
                self.stock = e.initial_quantity;
                self.fresh = true;
                self.created = true;
            }
            LotEvent::QuantityReserved(e) => {
                self.quantity = e.remaining;
            }
            LotEvent::QuantityReleased(e) => {
                self.quantity = e.available;
            }
            LotEvent::StockReceived(e) => {
                self.stock = e.stock;
                self.quantity = e.available;
                self.fresh = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LotCommand::RegisterLot(cmd) => self.handle_register(cmd),
            LotCommand::ReserveQuantity(cmd) => self.handle_reserve(cmd),
            LotCommand::ReleaseQuantity(cmd) => self.handle_release(cmd),
            LotCommand::ReceiveStock(cmd) => self.handle_receive(cmd),
        }
    }
}

impl InventoryLot {
    fn ensure_live(&self, lot_id: LotId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found("inventory lot"));
        }
        if self.id != lot_id {
            return Err(DomainError::invariant("lot_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterLot) -> Result<Vec<LotEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("inventory lot already exists"));
        }
        if cmd.produce_type.trim().is_empty() {
            return Err(DomainError::invalid_argument("produce_type cannot be empty"));
        }

        Ok(vec![LotEvent::LotRegistered(LotRegistered {
            lot_id: cmd.lot_id,
            produce_type: cmd.produce_type.trim().to_string(),
            storage_location: cmd.storage_location.trim().to_string(),
            initial_quantity: cmd.initial_quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reserve(&self, cmd: &ReserveQuantity) -> Result<Vec<LotEvent>, DomainError> {
        self.ensure_live(cmd.lot_id)?;

        if cmd.quantity.is_zero() {
            return Err(DomainError::invalid_argument("reserved quantity must be positive"));
        }

        let remaining = self.quantity.checked_sub(cmd.quantity).ok_or_else(|| {
            DomainError::insufficient_stock(AggregateId::from(self.id), cmd.quantity, self.quantity)
        })?;

        Ok(vec![LotEvent::QuantityReserved(QuantityReserved {
            lot_id: cmd.lot_id,
            quantity: cmd.quantity,
            remaining,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_release(&self, cmd: &ReleaseQuantity) -> Result<Vec<LotEvent>, DomainError> {
        self.ensure_live(cmd.lot_id)?;

        if cmd.quantity.is_zero() {
            return Err(DomainError::invalid_argument("released quantity must be positive"));
        }
        let available = self.quantity.checked_add(cmd.quantity).ok_or_else(|| {
            DomainError::invalid_argument(format!(
                "releasing {} would overflow the lot's available quantity",
                cmd.quantity
            ))
        })?;

        Ok(vec![LotEvent::QuantityReleased(QuantityReleased {
            lot_id: cmd.lot_id,
            quantity: cmd.quantity,
            available,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_receive(&self, cmd: &ReceiveStock) -> Result<Vec<LotEvent>, DomainError> {
        self.ensure_live(cmd.lot_id)?;

        if cmd.amount.is_zero() {
            return Err(DomainError::invalid_argument("received amount must be positive"));
        }
        let overflow = || {
            DomainError::invalid_argument(format!(
                "receiving {} would overflow the lot's stock",
                cmd.amount
            ))
        };
        let available = self.quantity.checked_add(cmd.amount).ok_or_else(overflow)?;
        let stock = self.stock.checked_add(cmd.amount).ok_or_else(overflow)?;

        Ok(vec![LotEvent::StockReceived(StockReceived {
            lot_id: cmd.lot_id,
            amount: cmd.amount,
            available,
            stock,
            occurred_at: cmd.occurred_at,
        })])
    }
}
