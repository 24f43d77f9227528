use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;

use fieldstock_core::{AggregateRoot, Entity, Quantity};
use fieldstock_crops::{CropId, FarmId, Harvest, HarvestEvent, HarvestId};
use fieldstock_events::{EventEnvelope, Projection, ProjectionError};
use fieldstock_inventory::LotId;

use crate::projections::cursor::{StreamCursors, decode};
use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestView {
    pub harvest_id: HarvestId,
    pub crop_id: CropId,
    pub farm_id: FarmId,
    pub lot_id: LotId,
    pub date: DateTime<Utc>,
    pub yield_amount: Quantity,
    pub quality_rating: u32,
}

impl Entity for HarvestView {
    type Id = HarvestId;

    fn id(&self) -> &HarvestId {
        &self.harvest_id
    }
}

/// Harvest ledger: every live harvest, filterable by crop, farm, lot and date.
///
/// Only committed harvests are visible here. Code that recomputes a crop
/// average inside the same unit of work as a harvest change has to overlay
/// that change itself.
#[derive(Debug, Default)]
pub struct HarvestLedgerProjection {
    rows: InMemoryReadStore<HarvestView>,
    cursors: StreamCursors,
}

impl HarvestLedgerProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, harvest_id: &HarvestId) -> Option<HarvestView> {
        self.rows.get(harvest_id)
    }

    pub fn all(&self) -> Vec<HarvestView> {
        self.rows.list()
    }

    pub fn by_crop(&self, crop_id: CropId) -> Vec<HarvestView> {
        self.rows.filter(&|h: &HarvestView| h.crop_id == crop_id)
    }

    pub fn by_farm(&self, farm_id: FarmId) -> Vec<HarvestView> {
        self.rows.filter(&|h: &HarvestView| h.farm_id == farm_id)
    }

    pub fn by_lot(&self, lot_id: LotId) -> Vec<HarvestView> {
        self.rows.filter(&|h: &HarvestView| h.lot_id == lot_id)
    }

    /// Harvests dated within `[start, end]`, both ends inclusive.
    pub fn between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<HarvestView> {
        self.rows.filter(&|h: &HarvestView| h.date >= start && h.date <= end)
    }

    /// Harvests whose yield is strictly greater than `threshold`.
    pub fn above_yield(&self, threshold: Decimal) -> Vec<HarvestView> {
        self.rows.filter(&|h: &HarvestView| h.yield_amount.amount() > threshold)
    }

    pub fn with_quality_rating(&self, quality_rating: u32) -> Vec<HarvestView> {
        self.rows.filter(&|h: &HarvestView| h.quality_rating == quality_rating)
    }

    /// Newest first. Ties keep insertion order.
    pub fn most_recent(&self, limit: usize) -> Vec<HarvestView> {
        let mut rows = self.rows.list();
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        rows.truncate(limit);
        rows
    }

    fn row(&self, harvest_id: HarvestId) -> Result<HarvestView, ProjectionError> {
        self.rows.get(&harvest_id).ok_or(ProjectionError::UnknownEntity {
            entity: "harvest",
            aggregate_id: harvest_id.aggregate_id(),
        })
    }

    fn fold(&self, ev: HarvestEvent) -> Result<(), ProjectionError> {
        match ev {
            HarvestEvent::HarvestRecorded(e) => self.rows.upsert(HarvestView {
                harvest_id: e.harvest_id,
                crop_id: e.crop_id,
                farm_id: e.farm_id,
                lot_id: e.lot_id,
                date: e.occurred_at,
                yield_amount: e.yield_amount,
                quality_rating: e.quality_rating,
            }),
            HarvestEvent::HarvestYieldRevised(e) => {
                let mut row = self.row(e.harvest_id)?;
                row.yield_amount = e.yield_amount;
                self.rows.upsert(row);
            }
            HarvestEvent::HarvestQualityRevised(e) => {
                let mut row = self.row(e.harvest_id)?;
                row.quality_rating = e.quality_rating;
                self.rows.upsert(row);
            }
            HarvestEvent::HarvestTransferred(e) => {
                let mut row = self.row(e.harvest_id)?;
                row.lot_id = e.to;
                self.rows.upsert(row);
            }
            HarvestEvent::HarvestRemoved(e) => {
                self.rows.remove(&e.harvest_id);
            }
        }
        Ok(())
    }
}

impl Projection for HarvestLedgerProjection {
    fn name(&self) -> &'static str {
        "crops.harvests"
    }

    fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != Harvest::AGGREGATE_TYPE {
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use fieldstock_crops::{HarvestRecorded, HarvestRemoved, HarvestTransferred, HarvestYieldRevised};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn envelope(event: &HarvestEvent, harvest_id: HarvestId, seq: u64) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            harvest_id.aggregate_id(),
            Harvest::AGGREGATE_TYPE,
            seq,
            seq,
            "crops.harvest.test",
            Utc::now(),
            serde_json::to_value(event).unwrap(),
        )
    }

    fn recorded(crop_id: CropId, day: u32, amount: Quantity) -> (HarvestId, HarvestEvent) {
        let harvest_id = HarvestId::generate();
        let ev = HarvestEvent::HarvestRecorded(HarvestRecorded {
            harvest_id,
            crop_id,
            farm_id: FarmId::generate(),
            lot_id: LotId::generate(),
            yield_amount: amount,
            quality_rating: 3,
            occurred_at: Utc.with_ymd_and_hms(2024, 6, day, 8, 0, 0).unwrap(),
        });
        (harvest_id, ev)
    }

    #[test]
    fn tracks_revisions_and_removals() {
        let ledger = HarvestLedgerProjection::new();
        let crop_id = CropId::generate();
        let (id, ev) = recorded(crop_id, 1, Quantity::new(dec!(5)).unwrap());
        ledger.apply(&envelope(&ev, id, 1)).unwrap();

        let revised = HarvestEvent::HarvestYieldRevised(HarvestYieldRevised {
            harvest_id: id,
            crop_id,
            previous: Quantity::new(dec!(5)).unwrap(),
            yield_amount: Quantity::new(dec!(9)).unwrap(),
            occurred_at: Utc::now(),
        });
        ledger.apply(&envelope(&revised, id, 2)).unwrap();
        assert_eq!(ledger.by_crop(crop_id)[0].yield_amount.amount(), dec!(9));

        let removed = HarvestEvent::HarvestRemoved(HarvestRemoved {
            harvest_id: id,
            crop_id,
            occurred_at: Utc::now(),
        });
        ledger.apply(&envelope(&removed, id, 3)).unwrap();
        assert!(ledger.by_crop(crop_id).is_empty());
    }

    #[test]
    fn date_range_is_inclusive_and_most_recent_is_newest_first() {
        let ledger = HarvestLedgerProjection::new();
        let crop_id = CropId::generate();
        for day in [3, 1, 5] {
            let (id, ev) = recorded(crop_id, day, Quantity::new(dec!(1)).unwrap());
            ledger.apply(&envelope(&ev, id, 1)).unwrap();
        }

        let start = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        let end = start + Duration::days(2);
        assert_eq!(ledger.between(start, end).len(), 2);

        let recent = ledger.most_recent(2);
        assert_eq!(recent.len(), 2);
        assert!(recent[0].date > recent[1].date);
        assert_eq!(recent[0].date, Utc.with_ymd_and_hms(2024, 6, 5, 8, 0, 0).unwrap());
    }

    #[test]
    fn transfer_moves_the_harvest_between_lots() {
        let ledger = HarvestLedgerProjection::new();
        let crop_id = CropId::generate();
        let (id, ev) = recorded(crop_id, 2, Quantity::new(dec!(4)).unwrap());
        ledger.apply(&envelope(&ev, id, 1)).unwrap();
        let from = ledger.get(&id).unwrap().lot_id;
        let to = LotId::generate();

        let moved = HarvestEvent::HarvestTransferred(HarvestTransferred {
            harvest_id: id,
            from,
            to,
            occurred_at: Utc::now(),
        });
        ledger.apply(&envelope(&moved, id, 2)).unwrap();

        assert!(ledger.by_lot(from).is_empty());
        assert_eq!(ledger.by_lot(to)[0].harvest_id, id);
        assert_eq!(ledger.by_lot(to)[0].yield_amount.amount(), dec!(4));
    }

    #[test]
    fn yield_threshold_is_strict_and_rating_filter_is_exact() {
        let ledger = HarvestLedgerProjection::new();
        let crop_id = CropId::generate();
        for amount in [dec!(2), dec!(5), dec!(7.5)] {
            let (id, ev) = recorded(crop_id, 1, Quantity::new(amount).unwrap());
            ledger.apply(&envelope(&ev, id, 1)).unwrap();
        }

        assert_eq!(ledger.above_yield(dec!(5)).len(), 1);
        assert_eq!(ledger.above_yield(dec!(4.99)).len(), 2);
        assert_eq!(ledger.with_quality_rating(3).len(), 3);
        assert!(ledger.with_quality_rating(4).is_empty());
    }
}
