use serde_json::Value as JsonValue;

use fieldstock_core::{AggregateRoot, Entity, Quantity};
use fieldstock_events::{EventEnvelope, Projection, ProjectionError};
use fieldstock_inventory::{InventoryLot, LotEvent, LotId};

use crate::projections::cursor::{StreamCursors, decode};
use crate::read_model::{InMemoryReadStore, ReadStore};

/// Queryable lot row: current availability per lot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotView {
    pub lot_id: LotId,
    pub produce_type: String,
    pub storage_location: String,
    pub quantity: Quantity,
    pub stock: Quantity,
    pub fresh: bool,
}

impl Entity for LotView {
    type Id = LotId;

    fn id(&self) -> &LotId {
        &self.lot_id
    }
}

/// Lot catalog projection (`findByProduceType`).
#[derive(Debug, Default)]
pub struct LotCatalogProjection {
    rows: InMemoryReadStore<LotView>,
    cursors: StreamCursors,
}

impl LotCatalogProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, lot_id: &LotId) -> Option<LotView> {
        self.rows.get(lot_id)
    }

    pub fn list(&self) -> Vec<LotView> {
        self.rows.list()
    }

    pub fn by_produce_type(&self, produce_type: &str) -> Vec<LotView> {
        let wanted = produce_type.trim();
        self.rows.filter(&|lot: &LotView| lot.produce_type == wanted)
    }

    fn fold(&self, ev: LotEvent) -> Result<(), ProjectionError> {
        let lot_id = ev.lot_id();
        if let LotEvent::LotRegistered(e) = &ev {
            self.rows.upsert(LotView {
                lot_id: e.lot_id,
                produce_type: e.produce_type.clone(),
                storage_location: e.storage_location.clone(),
                quantity: e.initial_quantity,
                stock: e.initial_quantity,
                fresh: true,
            });
            return Ok(());
        }

        let mut row = self.rows.get(&lot_id).ok_or(ProjectionError::UnknownEntity {
            entity: "inventory lot",
            aggregate_id: lot_id.aggregate_id(),
        })?;
        match ev {
            LotEvent::LotRegistered(_) => {}
            LotEvent::QuantityReserved(e) => row.quantity = e.remaining,
            LotEvent::QuantityReleased(e) => row.quantity = e.available,
            LotEvent::StockReceived(e) => {
                row.stock = e.stock;
                row.quantity = e.available;
                row.fresh = true;
            }
        }
        self.rows.upsert(row);
        Ok(())
    }
}

impl Projection for LotCatalogProjection {
    fn name(&self) -> &'static str {
        "inventory.lots"
    }

    fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != InventoryLot::AGGREGATE_TYPE {
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
