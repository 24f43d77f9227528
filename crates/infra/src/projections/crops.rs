use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use fieldstock_core::{AggregateRoot, Entity};
use fieldstock_crops::{Crop, CropEvent, CropId, FarmId};
use fieldstock_events::{EventEnvelope, Projection, ProjectionError};
use fieldstock_inventory::LotId;

use crate::projections::cursor::{StreamCursors, decode};
use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CropView {
    pub crop_id: CropId,
    pub crop_type: String,
    pub farm_id: Option<FarmId>,
    pub lot_id: Option<LotId>,
    pub average_yield: Option<Decimal>,
    pub harvest_count: usize,
}

impl Entity for CropView {
    type Id = CropId;

    fn id(&self) -> &CropId {
        &self.crop_id
    }
}

/// Crop directory (crops per farm, high-yield lookups).
#[derive(Debug, Default)]
pub struct CropDirectoryProjection {
    rows: InMemoryReadStore<CropView>,
    cursors: StreamCursors,
}

impl CropDirectoryProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, crop_id: &CropId) -> Option<CropView> {
        self.rows.get(crop_id)
    }

    pub fn list(&self) -> Vec<CropView> {
        self.rows.list()
    }

    pub fn by_farm(&self, farm_id: FarmId) -> Vec<CropView> {
        self.rows.filter(&|c: &CropView| c.farm_id == Some(farm_id))
    }

    /// Crops whose known average is strictly greater than `minimum`.
    pub fn average_above(&self, minimum: Decimal) -> Vec<CropView> {
        self.rows
            .filter(&|c: &CropView| c.average_yield.is_some_and(|avg| avg > minimum))
    }

    fn row(&self, crop_id: CropId) -> Result<CropView, ProjectionError> {
        self.rows.get(&crop_id).ok_or(ProjectionError::UnknownEntity {
            entity: "crop",
            aggregate_id: crop_id.aggregate_id(),
        })
    }

    fn fold(&self, ev: CropEvent) -> Result<(), ProjectionError> {
        match ev {
            CropEvent::CropRegistered(e) => self.rows.upsert(CropView {
                crop_id: e.crop_id,
                crop_type: e.crop_type,
                farm_id: e.farm_id,
                lot_id: e.lot_id,
                average_yield: None,
                harvest_count: 0,
            }),
            CropEvent::CropAssignedToFarm(e) => {
                let mut row = self.row(e.crop_id)?;
                row.farm_id = Some(e.farm_id);
                self.rows.upsert(row);
            }
            CropEvent::CropLinkedToLot(e) => {
                let mut row = self.row(e.crop_id)?;
                row.lot_id = Some(e.lot_id);
                self.rows.upsert(row);
            }
            CropEvent::AverageYieldRefreshed(e) => {
                let mut row = self.row(e.crop_id)?;
                if let Some(avg) = e.average_yield {
                    row.average_yield = Some(avg);
                }
                row.harvest_count = e.harvest_count;
                self.rows.upsert(row);
            }
            CropEvent::CropRemoved(e) => {
                self.rows.remove(&e.crop_id);
            }
        }
        Ok(())
    }
}

impl Projection for CropDirectoryProjection {
    fn name(&self) -> &'static str {
        "crops.directory"
    }

    fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != Crop::AGGREGATE_TYPE {
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
