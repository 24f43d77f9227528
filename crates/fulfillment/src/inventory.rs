//! InventoryLedger: the only writer of lot quantity and stock.
//!
//! Check-and-decrement is one decision on the lot aggregate committed with
//! the lot's exact version, so two reservations racing on the same lot
//! cannot both succeed from the same starting quantity.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::instrument;

use fieldstock_core::Quantity;
use fieldstock_infra::command_dispatcher::{DispatchError, UnitOfWork};
use fieldstock_infra::event_store::EventStore;
use fieldstock_infra::projections::LotView;
use fieldstock_inventory::{
    InventoryLot, LotCommand, LotId, ReceiveStock, RegisterLot, ReleaseQuantity, ReserveQuantity,
};

use crate::context::FulfillmentContext;
use crate::error::{FulfillmentError, FulfillmentResult};

pub struct InventoryLedger<'a> {
    ctx: &'a FulfillmentContext,
}

impl<'a> InventoryLedger<'a> {
    pub(crate) fn new(ctx: &'a FulfillmentContext) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self), err(level = "warn"))]
    pub fn register_lot(
        &self,
        produce_type: &str,
        storage_location: &str,
        initial_quantity: Decimal,
    ) -> FulfillmentResult<LotId> {
        let initial_quantity = Quantity::new(initial_quantity)?;
        let lot_id = LotId::generate();
        self.ctx.dispatcher().dispatch(
            lot_id,
            LotCommand::RegisterLot(RegisterLot {
                lot_id,
                produce_type: produce_type.to_string(),
                storage_location: storage_location.to_string(),
                initial_quantity,
                occurred_at: Utc::now(),
            }),
            InventoryLot::empty,
        )?;

        tracing::info!(%lot_id, %initial_quantity, "lot registered");
        Ok(lot_id)
    }

    /// `true` iff the lot exists and can supply `required`. No side effect.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn check_availability(&self, lot_id: LotId, required: Decimal) -> FulfillmentResult<bool> {
        let required = Quantity::positive(required)?;
        let lot = self.ctx.dispatcher().load(lot_id, InventoryLot::empty)?;
        let available = lot.can_supply(required);
        tracing::debug!(%lot_id, %required, available, "availability checked");
        Ok(available)
    }

    #[instrument(skip(self), err(level = "warn"))]
    pub fn reserve(&self, lot_id: LotId, quantity: Decimal) -> FulfillmentResult<()> {
        let quantity = Quantity::positive(quantity)?;
        let lot = self
            .ctx
            .dispatcher()
            .transact(|tx| reserve_in(tx, lot_id, quantity, Utc::now()))?;
        tracing::info!(%lot_id, %quantity, remaining = %lot.quantity(), "quantity reserved");
        Ok(())
    }

    /// Restores capacity without an availability check.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn release(&self, lot_id: LotId, quantity: Decimal) -> FulfillmentResult<()> {
        let quantity = Quantity::positive(quantity)?;
        let lot = self
            .ctx
            .dispatcher()
            .transact(|tx| release_in(tx, lot_id, quantity, Utc::now()))?;
        tracing::info!(%lot_id, %quantity, available = %lot.quantity(), "quantity released");
        Ok(())
    }

    /// Adds `amount` to both stock and available quantity and marks the lot fresh.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn receive_stock(&self, lot_id: LotId, amount: Decimal) -> FulfillmentResult<()> {
        let amount = Quantity::positive(amount)?;
        let lot = self
            .ctx
            .dispatcher()
            .transact(|tx| receive_in(tx, lot_id, amount, Utc::now()))?;
        tracing::info!(%lot_id, %amount, stock = %lot.stock(), "stock received");
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    pub fn get_lot(&self, lot_id: LotId) -> FulfillmentResult<LotView> {
        self.ctx
            .read_models()
            .lots
            .get(&lot_id)
            .ok_or_else(|| FulfillmentError::NotFound(format!("inventory lot {lot_id}")))
    }

    pub fn lots_by_produce_type(&self, produce_type: &str) -> Vec<LotView> {
        self.ctx.read_models().lots.by_produce_type(produce_type)
    }
}

pub(crate) fn reserve_in<S: EventStore>(
    tx: &mut UnitOfWork<'_, S>,
    lot_id: LotId,
    quantity: Quantity,
    occurred_at: DateTime<Utc>,
) -> Result<InventoryLot, DispatchError> {
    let mut lot = tx.load_existing(lot_id, InventoryLot::empty)?;
    tx.execute(
        &mut lot,
        LotCommand::ReserveQuantity(ReserveQuantity {
            lot_id,
            quantity,
            occurred_at,
        }),
    )?;
    Ok(lot)
}

pub(crate) fn release_in<S: EventStore>(
    tx: &mut UnitOfWork<'_, S>,
    lot_id: LotId,
    quantity: Quantity,
    occurred_at: DateTime<Utc>,
) -> Result<InventoryLot, DispatchError> {
    let mut lot = tx.load_existing(lot_id, InventoryLot::empty)?;
    tx.execute(
        &mut lot,
        LotCommand::ReleaseQuantity(ReleaseQuantity {
            lot_id,
            quantity,
            occurred_at,
        }),
    )?;
    Ok(lot)
}

pub(crate) fn receive_in<S: EventStore>(
    tx: &mut UnitOfWork<'_, S>,
    lot_id: LotId,
    amount: Quantity,
    occurred_at: DateTime<Utc>,
) -> Result<InventoryLot, DispatchError> {
    let mut lot = tx.load_existing(lot_id, InventoryLot::empty)?;
    tx.execute(
        &mut lot,
        LotCommand::ReceiveStock(ReceiveStock {
            lot_id,
            amount,
            occurred_at,
        }),
    )?;
    Ok(lot)
}
