//! YieldAggregator: keeps every crop's average yield equal to the mean of
//! its current harvests.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::instrument;

use fieldstock_core::{AggregateRoot, Quantity};
use fieldstock_crops::{Crop, CropCommand, CropId, Farm, FarmId, HarvestId, RefreshAverageYield, mean_yield};
use fieldstock_infra::command_dispatcher::{DispatchError, UnitOfWork};
use fieldstock_infra::event_store::EventStore;
use fieldstock_infra::projections::{CropView, HarvestLedgerProjection};

use crate::context::FulfillmentContext;
use crate::error::{FulfillmentError, FulfillmentResult};

/// A harvest change staged in the current unit of work but not yet visible
/// in the harvest ledger. `None` removes the harvest from the set.
pub(crate) type PendingYield = (HarvestId, Option<Quantity>);

pub struct YieldAggregator<'a> {
    ctx: &'a FulfillmentContext,
}

impl<'a> YieldAggregator<'a> {
    pub(crate) fn new(ctx: &'a FulfillmentContext) -> Self {
        Self { ctx }
    }

    /// Recompute from the committed harvest set. Returns the crop's average
    /// afterwards, which is unchanged when the crop has no harvests.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn recompute(&self, crop_id: CropId) -> FulfillmentResult<Option<Decimal>> {
        let ledger = &self.ctx.read_models().harvests;
        let crop = self
            .ctx
            .dispatcher()
            .transact(|tx| recompute_in(tx, ledger, crop_id, &[], Utc::now()))?;
        Ok(crop.average_yield())
    }

    /// Sum of the known averages of the farm's crops. Crops without an
    /// average contribute nothing.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn farm_total_yield(&self, farm_id: FarmId) -> FulfillmentResult<Decimal> {
        let farm = self.ctx.dispatcher().load(farm_id, Farm::empty)?;
        if !farm.exists() {
            return Err(FulfillmentError::NotFound(format!("farm {farm_id}")));
        }

        self.ctx
            .read_models()
            .crops
            .by_farm(farm_id)
            .iter()
            .filter_map(|c| c.average_yield)
            .try_fold(Decimal::ZERO, |total, avg| total.checked_add(avg))
            .ok_or_else(|| FulfillmentError::InvalidArgument(format!("yield total of farm {farm_id} overflows")))
    }

    /// Crops whose average yield is strictly greater than `minimum`.
    #[instrument(level = "debug", skip(self))]
    pub fn high_yielding_crops(&self, minimum: Decimal) -> Vec<CropView> {
        self.ctx.read_models().crops.average_above(minimum)
    }
}

/// Stage a refresh of `crop_id`'s average.
///
/// The crop is loaded before the ledger is read: any harvest change
/// committed after that load also refreshed the crop, so this commit then
/// fails its version check and the unit of work is re-run.
pub(crate) fn recompute_in<S: EventStore>(
    tx: &mut UnitOfWork<'_, S>,
    ledger: &HarvestLedgerProjection,
    crop_id: CropId,
    pending: &[PendingYield],
    occurred_at: DateTime<Utc>,
) -> Result<Crop, DispatchError> {
    let mut crop = tx.load_existing(crop_id, Crop::empty)?;

    let mut yields: Vec<(HarvestId, Quantity)> = ledger
        .by_crop(crop_id)
        .into_iter()
        .map(|h| (h.harvest_id, h.yield_amount))
        .collect();
    for (harvest_id, change) in pending {
        match change {
            Some(amount) => match yields.iter_mut().find(|(id, _)| id == harvest_id) {
                Some(slot) => slot.1 = *amount,
                None => yields.push((*harvest_id, *amount)),
            },
            None => yields.retain(|(id, _)| id != harvest_id),
        }
    }

    let average_yield = mean_yield(yields.iter().map(|(_, amount)| *amount))?;
    tx.execute(
        &mut crop,
        CropCommand::RefreshAverageYield(RefreshAverageYield {
            crop_id,
            average_yield,
            harvest_count: yields.len(),
            occurred_at,
        }),
    )?;

    tracing::debug!(%crop_id, harvests = yields.len(), ?average_yield, "average yield refreshed");
    Ok(crop)
}
