//! HarvestRecorder: books harvests into their lot and keeps crop averages
//! current.
//!
//! Recording, revising a yield and deleting a harvest each commit the
//! harvest change together with the crop refresh (and, for recording, the
//! lot's stock receipt) as one unit of work.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::instrument;

use fieldstock_core::{AggregateRoot, DomainError, Quantity};
use fieldstock_crops::{
    Crop, CropId, Farm, FarmId, Harvest, HarvestCommand, HarvestId, RecordHarvest, RemoveHarvest,
    ReviseQuality, ReviseYield, TransferToLot,
};
use fieldstock_infra::projections::HarvestView;
use fieldstock_inventory::{InventoryLot, LotId};

use crate::context::FulfillmentContext;
use crate::error::{FulfillmentError, FulfillmentResult};
use crate::inventory::receive_in;
use crate::yields::recompute_in;

pub struct HarvestRecorder<'a> {
    ctx: &'a FulfillmentContext,
}

impl<'a> HarvestRecorder<'a> {
    pub(crate) fn new(ctx: &'a FulfillmentContext) -> Self {
        Self { ctx }
    }

    /// Record a harvest of `crop_id` dated now, receive its yield into the
    /// crop's lot and refresh the crop's average.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn record(
        &self,
        crop_id: CropId,
        yield_amount: Decimal,
        quality_rating: u32,
    ) -> FulfillmentResult<HarvestView> {
        let yield_amount = Quantity::positive(yield_amount)?;
        ensure_rating(quality_rating)?;

        let harvest_id = HarvestId::generate();
        let ledger = &self.ctx.read_models().harvests;
        let lot_id = self.ctx.dispatcher().transact(|tx| {
            let now = Utc::now();
            let crop = tx.load_existing(crop_id, Crop::empty)?;
            let (farm_id, lot_id) = crop.harvest_target()?;
            if !tx.load(farm_id, Farm::empty)?.exists() {
                let reason = format!("farm {farm_id} of crop {crop_id} is retired");
                return Err(DomainError::incomplete_setup(reason).into());
            }

            let mut harvest = tx.load(harvest_id, Harvest::empty)?;
            tx.execute(
                &mut harvest,
                HarvestCommand::RecordHarvest(RecordHarvest {
                    harvest_id,
                    crop_id,
                    farm_id,
                    lot_id,
                    yield_amount,
                    quality_rating,
                    occurred_at: now,
                }),
            )?;
            receive_in(tx, lot_id, yield_amount, now)?;
            recompute_in(tx, ledger, crop_id, &[(harvest_id, Some(yield_amount))], now)?;
            Ok(lot_id)
        })?;

        tracing::info!(%harvest_id, %crop_id, %lot_id, %yield_amount, "harvest recorded");
        self.get(harvest_id)
    }

    /// Replace a harvest's yield. Received stock is not adjusted.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn revise_yield(&self, harvest_id: HarvestId, yield_amount: Decimal) -> FulfillmentResult<HarvestView> {
        let yield_amount = Quantity::positive(yield_amount)?;
        let ledger = &self.ctx.read_models().harvests;
        self.ctx.dispatcher().transact(|tx| {
            let now = Utc::now();
            let mut harvest = tx.load_existing(harvest_id, Harvest::empty)?;
            tx.execute(
                &mut harvest,
                HarvestCommand::ReviseYield(ReviseYield {
                    harvest_id,
                    yield_amount,
                    occurred_at: now,
                }),
            )?;
            recompute_in(tx, ledger, harvest.crop_id(), &[(harvest_id, Some(yield_amount))], now)?;
            Ok(())
        })?;

        tracing::info!(%harvest_id, %yield_amount, "harvest yield revised");
        self.get(harvest_id)
    }

    #[instrument(skip(self), err(level = "warn"))]
    pub fn revise_quality(&self, harvest_id: HarvestId, quality_rating: u32) -> FulfillmentResult<HarvestView> {
        ensure_rating(quality_rating)?;
        self.ctx.dispatcher().dispatch(
            harvest_id,
            HarvestCommand::ReviseQuality(ReviseQuality {
                harvest_id,
                quality_rating,
                occurred_at: Utc::now(),
            }),
            Harvest::empty,
        )?;

        tracing::info!(%harvest_id, quality_rating, "harvest quality revised");
        self.get(harvest_id)
    }

    /// Rebook a harvest against another existing lot. Stock already
    /// received stays in the original lot.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn transfer_to_lot(&self, harvest_id: HarvestId, lot_id: LotId) -> FulfillmentResult<HarvestView> {
        self.ctx.dispatcher().transact(|tx| {
            tx.load_existing(lot_id, InventoryLot::empty)?;
            let mut harvest = tx.load_existing(harvest_id, Harvest::empty)?;
            tx.execute(
                &mut harvest,
                HarvestCommand::TransferToLot(TransferToLot {
                    harvest_id,
                    lot_id,
                    occurred_at: Utc::now(),
                }),
            )?;
            Ok(())
        })?;

        tracing::info!(%harvest_id, %lot_id, "harvest transferred");
        self.get(harvest_id)
    }

    /// Delete a harvest and refresh its crop. Received stock is not adjusted.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn delete(&self, harvest_id: HarvestId) -> FulfillmentResult<()> {
        let ledger = &self.ctx.read_models().harvests;
        self.ctx.dispatcher().transact(|tx| {
            let now = Utc::now();
            let mut harvest = tx.load_existing(harvest_id, Harvest::empty)?;
            tx.execute(
                &mut harvest,
                HarvestCommand::RemoveHarvest(RemoveHarvest {
                    harvest_id,
                    occurred_at: now,
                }),
            )?;
            recompute_in(tx, ledger, harvest.crop_id(), &[(harvest_id, None)], now)?;
            Ok(())
        })?;

        tracing::info!(%harvest_id, "harvest deleted");
        Ok(())
    }

    pub fn get(&self, harvest_id: HarvestId) -> FulfillmentResult<HarvestView> {
        self.ctx
            .read_models()
            .harvests
            .get(&harvest_id)
            .ok_or_else(|| FulfillmentError::NotFound(format!("harvest {harvest_id}")))
    }

    pub fn all(&self) -> Vec<HarvestView> {
        self.ctx.read_models().harvests.all()
    }

    pub fn harvests_by_crop(&self, crop_id: CropId) -> Vec<HarvestView> {
        self.ctx.read_models().harvests.by_crop(crop_id)
    }

    pub fn harvests_by_farm(&self, farm_id: FarmId) -> Vec<HarvestView> {
        self.ctx.read_models().harvests.by_farm(farm_id)
    }

    pub fn harvests_by_lot(&self, lot_id: LotId) -> Vec<HarvestView> {
        self.ctx.read_models().harvests.by_lot(lot_id)
    }

    /// Harvests dated within `[start, end]`.
    #[instrument(level = "debug", skip(self))]
    pub fn harvests_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<HarvestView> {
        self.ctx.read_models().harvests.between(start, end)
    }

    pub fn most_recent(&self, limit: usize) -> Vec<HarvestView> {
        self.ctx.read_models().harvests.most_recent(limit)
    }

    /// Harvests whose yield is strictly greater than `threshold`.
    pub fn harvests_above_yield_threshold(&self, threshold: Decimal) -> Vec<HarvestView> {
        self.ctx.read_models().harvests.above_yield(threshold)
    }

    pub fn harvests_by_quality_rating(&self, quality_rating: u32) -> Vec<HarvestView> {
        self.ctx.read_models().harvests.with_quality_rating(quality_rating)
    }

    pub fn total_yield(&self) -> FulfillmentResult<Decimal> {
        total_yield(&self.all())
    }

    pub fn total_yield_by_crop(&self, crop_id: CropId) -> FulfillmentResult<Decimal> {
        total_yield(&self.harvests_by_crop(crop_id))
    }

    pub fn total_yield_by_farm(&self, farm_id: FarmId) -> FulfillmentResult<Decimal> {
        total_yield(&self.harvests_by_farm(farm_id))
    }

    /// Mean quality rating over every harvest, 0 when there are none.
    pub fn average_quality_rating(&self) -> Decimal {
        let harvests = self.all();
        if harvests.is_empty() {
            return Decimal::ZERO;
        }
        let total: Decimal = harvests.iter().map(|h| Decimal::from(h.quality_rating)).sum();
        (total / Decimal::from(harvests.len())).normalize()
    }
}

fn total_yield(harvests: &[HarvestView]) -> FulfillmentResult<Decimal> {
    Quantity::checked_total(harvests.iter().map(|h| h.yield_amount))
        .map(Quantity::amount)
        .ok_or_else(|| FulfillmentError::InvalidArgument("harvest yields overflow their total".to_string()))
}

fn ensure_rating(quality_rating: u32) -> FulfillmentResult<()> {
    if quality_rating == 0 {
        return Err(FulfillmentError::InvalidArgument(
            "quality rating must be positive".to_string(),
        ));
    }
    Ok(())
}
