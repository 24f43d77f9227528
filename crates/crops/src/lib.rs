//! Farms, crops and harvests (event-sourced).
//!
//! A crop's average yield is derived state: callers never set it directly,
//! the yield aggregator refreshes it from the crop's current harvest set.

pub mod crop;
pub mod farm;
pub mod harvest;
pub mod yields;

pub use crop::{
    AssignToFarm, AverageYieldRefreshed, Crop, CropAssignedToFarm, CropCommand, CropEvent, CropId,
    CropLinkedToLot, CropRegistered, CropRemoved, LinkLot, RefreshAverageYield, RegisterCrop,
    RemoveCrop,
};
pub use farm::{
    AttachCrop, CropAttached, Farm, FarmCommand, FarmEvent, FarmId, FarmRegistered, FarmRetired,
    RegisterFarm, RetireFarm,
};
pub use harvest::{
    Harvest, HarvestCommand, HarvestEvent, HarvestId, HarvestQualityRevised, HarvestRecorded,
    HarvestRemoved, HarvestTransferred, HarvestYieldRevised, RecordHarvest, RemoveHarvest,
    ReviseQuality, ReviseYield, TransferToLot,
};
pub use yields::mean_yield;
