//! Farm and crop registry, including the explicit delete cascade.
//!
//! Deleting a farm removes every harvest booked against the farm or its
//! crops, then the crops, then the farm, in one unit of work. Inventory and
//! orders are never touched: received stock stays in its lot.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::instrument;

use fieldstock_core::AggregateRoot;
use fieldstock_crops::{
    AssignToFarm, AttachCrop, Crop, CropCommand, CropId, Farm, FarmCommand, FarmId, Harvest,
    HarvestCommand, HarvestId, LinkLot, RegisterCrop, RegisterFarm, RemoveCrop, RemoveHarvest,
    RetireFarm,
};
use fieldstock_infra::command_dispatcher::{DispatchError, UnitOfWork};
use fieldstock_infra::event_store::EventStore;
use fieldstock_infra::projections::{CropView, HarvestLedgerProjection};
use fieldstock_inventory::{InventoryLot, LotId};

use crate::context::FulfillmentContext;
use crate::error::{FulfillmentError, FulfillmentResult};
use crate::yields::{PendingYield, recompute_in};

/// What a cascade removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub harvests_removed: usize,
    pub crops_removed: usize,
}

pub struct FarmRegistry<'a> {
    ctx: &'a FulfillmentContext,
}

impl<'a> FarmRegistry<'a> {
    pub(crate) fn new(ctx: &'a FulfillmentContext) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self), err(level = "warn"))]
    pub fn register_farm(&self, name: &str, location: &str) -> FulfillmentResult<FarmId> {
        let farm_id = FarmId::generate();
        self.ctx.dispatcher().dispatch(
            farm_id,
            FarmCommand::RegisterFarm(RegisterFarm {
                farm_id,
                name: name.to_string(),
                location: location.to_string(),
                occurred_at: Utc::now(),
            }),
            Farm::empty,
        )?;

        tracing::info!(%farm_id, "farm registered");
        Ok(farm_id)
    }

    pub fn get_farm(&self, farm_id: FarmId) -> FulfillmentResult<Farm> {
        Ok(self.ctx.dispatcher().load_existing(farm_id, Farm::empty)?)
    }

    /// Register a crop, optionally already linked to a farm and a lot. Both
    /// links must reference existing records.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn register_crop(
        &self,
        crop_type: &str,
        farm_id: Option<FarmId>,
        lot_id: Option<LotId>,
    ) -> FulfillmentResult<CropView> {
        let crop_id = CropId::generate();
        self.ctx.dispatcher().transact(|tx| {
            let now = Utc::now();
            if let Some(lot_id) = lot_id {
                tx.load_existing(lot_id, InventoryLot::empty)?;
            }
            if let Some(farm_id) = farm_id {
                attach_in(tx, farm_id, crop_id, now)?;
            }
            let mut crop = tx.load(crop_id, Crop::empty)?;
            tx.execute(
                &mut crop,
                CropCommand::RegisterCrop(RegisterCrop {
                    crop_id,
                    crop_type: crop_type.to_string(),
                    farm_id,
                    lot_id,
                    occurred_at: now,
                }),
            )?;
            Ok(())
        })?;

        tracing::info!(%crop_id, "crop registered");
        self.get_crop(crop_id)
    }

    #[instrument(skip(self), err(level = "warn"))]
    pub fn assign_crop_to_farm(&self, crop_id: CropId, farm_id: FarmId) -> FulfillmentResult<CropView> {
        self.ctx.dispatcher().transact(|tx| {
            let now = Utc::now();
            let mut crop = tx.load_existing(crop_id, Crop::empty)?;
            attach_in(tx, farm_id, crop_id, now)?;
            tx.execute(
                &mut crop,
                CropCommand::AssignToFarm(AssignToFarm {
                    crop_id,
                    farm_id,
                    occurred_at: now,
                }),
            )?;
            Ok(())
        })?;

        tracing::info!(%crop_id, %farm_id, "crop assigned to farm");
        self.get_crop(crop_id)
    }

    #[instrument(skip(self), err(level = "warn"))]
    pub fn link_crop_to_lot(&self, crop_id: CropId, lot_id: LotId) -> FulfillmentResult<CropView> {
        self.ctx.dispatcher().transact(|tx| {
            tx.load_existing(lot_id, InventoryLot::empty)?;
            let mut crop = tx.load_existing(crop_id, Crop::empty)?;
            tx.execute(
                &mut crop,
                CropCommand::LinkLot(LinkLot {
                    crop_id,
                    lot_id,
                    occurred_at: Utc::now(),
                }),
            )?;
            Ok(())
        })?;

        tracing::info!(%crop_id, %lot_id, "crop linked to lot");
        self.get_crop(crop_id)
    }

    pub fn get_crop(&self, crop_id: CropId) -> FulfillmentResult<CropView> {
        self.ctx
            .read_models()
            .crops
            .get(&crop_id)
            .ok_or_else(|| FulfillmentError::NotFound(format!("crop {crop_id}")))
    }

    pub fn crops_by_farm(&self, farm_id: FarmId) -> Vec<CropView> {
        self.ctx.read_models().crops.by_farm(farm_id)
    }

    /// Delete a crop and every harvest recorded for it.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn delete_crop(&self, crop_id: CropId) -> FulfillmentResult<CascadeReport> {
        let ledger = &self.ctx.read_models().harvests;
        let report = self.ctx.dispatcher().transact(|tx| {
            let now = Utc::now();
            let mut crop = tx.load_existing(crop_id, Crop::empty)?;
            let harvest_ids: Vec<HarvestId> =
                ledger.by_crop(crop_id).into_iter().map(|h| h.harvest_id).collect();

            let mut report = CascadeReport::default();
            for harvest_id in harvest_ids {
                if remove_harvest_in(tx, harvest_id, now)?.is_some() {
                    report.harvests_removed += 1;
                }
            }
            tx.execute(
                &mut crop,
                CropCommand::RemoveCrop(RemoveCrop {
                    crop_id,
                    occurred_at: now,
                }),
            )?;
            report.crops_removed = 1;
            Ok(report)
        })?;

        tracing::info!(%crop_id, harvests = report.harvests_removed, "crop deleted");
        Ok(report)
    }

    /// Delete a farm with its crops and their harvests.
    ///
    /// A crop attached while this runs bumps the farm's version, so the
    /// cascade is re-run and picks it up.
    ///
    /// A harvest booked against this farm for a crop that has since moved to
    /// another farm is removed too, and that surviving crop's average is
    /// refreshed.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn delete_farm(&self, farm_id: FarmId) -> FulfillmentResult<CascadeReport> {
        let read_models = self.ctx.read_models();
        let report = self.ctx.dispatcher().transact(|tx| {
            let farm_crops = read_models.crops.by_farm(farm_id);
            delete_farm_in(tx, farm_id, &read_models.harvests, &farm_crops)
        })?;

        tracing::info!(
            %farm_id,
            crops = report.crops_removed,
            harvests = report.harvests_removed,
            "farm deleted"
        );
        Ok(report)
    }
}

fn delete_farm_in<S: EventStore>(
    tx: &mut UnitOfWork<'_, S>,
    farm_id: FarmId,
    ledger: &HarvestLedgerProjection,
    farm_crops: &[CropView],
) -> Result<CascadeReport, DispatchError> {
    let now = Utc::now();
    let mut farm = tx.load_existing(farm_id, Farm::empty)?;

    let candidates: BTreeSet<CropId> = farm_crops
        .iter()
        .map(|c| c.crop_id)
        .chain(farm.attached_crops())
        .collect();
    let mut doomed_crops: Vec<Crop> = Vec::with_capacity(candidates.len());
    for crop_id in candidates {
        let crop = tx.load(crop_id, Crop::empty)?;
        if crop.exists() && crop.farm_id() == Some(farm_id) {
            doomed_crops.push(crop);
        }
    }

    let mut harvests: BTreeMap<HarvestId, CropId> = ledger
        .by_farm(farm_id)
        .into_iter()
        .map(|h| (h.harvest_id, h.crop_id))
        .collect();
    for crop in &doomed_crops {
        for h in ledger.by_crop(crop.id_typed()) {
            harvests.insert(h.harvest_id, h.crop_id);
        }
    }

    let mut report = CascadeReport::default();
    let mut survivors: BTreeMap<CropId, Vec<PendingYield>> = BTreeMap::new();
    for (harvest_id, crop_id) in harvests {
        if remove_harvest_in(tx, harvest_id, now)?.is_none() {
            continue;
        }
        report.harvests_removed += 1;
        if !doomed_crops.iter().any(|c| c.id_typed() == crop_id) {
            survivors.entry(crop_id).or_default().push((harvest_id, None));
        }
    }

    for (crop_id, pending) in survivors {
        if tx.load(crop_id, Crop::empty)?.exists() {
            recompute_in(tx, ledger, crop_id, &pending, now)?;
        }
    }

    for mut crop in doomed_crops {
        let crop_id = crop.id_typed();
        tx.execute(
            &mut crop,
            CropCommand::RemoveCrop(RemoveCrop {
                crop_id,
                occurred_at: now,
            }),
        )?;
        report.crops_removed += 1;
    }

    tx.execute(
        &mut farm,
        FarmCommand::RetireFarm(RetireFarm {
            farm_id,
            occurred_at: now,
        }),
    )?;

    Ok(report)
}

/// Stage `crop_id`'s attachment on the farm's own stream. Fails with
/// `NotFound` once the farm is retired.
fn attach_in<S: EventStore>(
    tx: &mut UnitOfWork<'_, S>,
    farm_id: FarmId,
    crop_id: CropId,
    occurred_at: DateTime<Utc>,
) -> Result<(), DispatchError> {
    let mut farm = tx.load_existing(farm_id, Farm::empty)?;
    tx.execute(
        &mut farm,
        FarmCommand::AttachCrop(AttachCrop {
            farm_id,
            crop_id,
            occurred_at,
        }),
    )?;
    Ok(())
}

/// Tombstone a harvest if it is still live. Returns the removed harvest.
fn remove_harvest_in<S: EventStore>(
    tx: &mut UnitOfWork<'_, S>,
    harvest_id: HarvestId,
    occurred_at: DateTime<Utc>,
) -> Result<Option<Harvest>, DispatchError> {
    let mut harvest = tx.load(harvest_id, Harvest::empty)?;
    if !harvest.exists() {
        return Ok(None);
    }
    tx.execute(
        &mut harvest,
        HarvestCommand::RemoveHarvest(RemoveHarvest {
            harvest_id,
            occurred_at,
        }),
    )?;
    Ok(Some(harvest))
}
