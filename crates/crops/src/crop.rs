use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use fieldstock_core::{Aggregate, AggregateRoot, DomainError, typed_id};
use fieldstock_events::Event;
use fieldstock_inventory::LotId;

use crate::farm::FarmId;

typed_id!(
    /// Crop identifier.
    CropId
);

/// Aggregate root: Crop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crop {
    id: CropId,
    crop_type: String,
    farm_id: Option<FarmId>,
    lot_id: Option<LotId>,
    average_yield: Option<Decimal>,
    harvest_count: usize,
    version: u64,
    created: bool,
    removed: bool,
}

impl Crop {
    pub fn empty(id: CropId) -> Self {
        Self {
            id,
            crop_type: String::new(),
            farm_id: None,
            lot_id: None,
            average_yield: None,
            harvest_count: 0,
            version: 0,
            created: false,
            removed: false,
        }
    }

    pub fn id_typed(&self) -> CropId {
        self.id
    }

    pub fn crop_type(&self) -> &str {
        &self.crop_type
    }

    pub fn farm_id(&self) -> Option<FarmId> {
        self.farm_id
    }

    pub fn lot_id(&self) -> Option<LotId> {
        self.lot_id
    }

    /// Last computed mean yield; `None` until the first harvest is recorded.
    pub fn average_yield(&self) -> Option<Decimal> {
        self.average_yield
    }

    /// Number of harvests the current average was computed from.
    pub fn harvest_count(&self) -> usize {
        self.harvest_count
    }

    /// Farm and lot a harvest of this crop is booked against.
    ///
    /// Fails with `IncompleteSetup` when either link is missing.
    pub fn harvest_target(&self) -> Result<(FarmId, LotId), DomainError> {
        match (self.farm_id, self.lot_id) {
            (Some(farm), Some(lot)) => Ok((farm, lot)),
            (None, _) => Err(DomainError::incomplete_setup(format!(
                "crop {} is not associated with a farm",
                self.id
            ))),
            (_, None) => Err(DomainError::incomplete_setup(format!(
                "crop {} is not associated with an inventory lot",
                self.id
            ))),
        }
    }
}

impl AggregateRoot for Crop {
    type Id = CropId;

    const AGGREGATE_TYPE: &'static str = "crops.crop";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn exists(&self) -> bool {
        self.created && !self.removed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterCrop {
    pub crop_id: CropId,
    pub crop_type: String,
    pub farm_id: Option<FarmId>,
    pub lot_id: Option<LotId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignToFarm {
    pub crop_id: CropId,
    pub farm_id: FarmId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkLot {
    pub crop_id: CropId,
    pub lot_id: LotId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RefreshAverageYield. Issued by the yield aggregator only.
///
/// `average_yield` is `None` exactly when the crop has no harvests left; the
/// last known average is then kept. The refresh is still recorded so it
/// bumps the crop's version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshAverageYield {
    pub crop_id: CropId,
    pub average_yield: Option<Decimal>,
    pub harvest_count: usize,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveCrop {
    pub crop_id: CropId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CropCommand {
    RegisterCrop(RegisterCrop),
    AssignToFarm(AssignToFarm),
    LinkLot(LinkLot),
    RefreshAverageYield(RefreshAverageYield),
    RemoveCrop(RemoveCrop),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRegistered {
    pub crop_id: CropId,
    pub crop_type: String,
    pub farm_id: Option<FarmId>,
    pub lot_id: Option<LotId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropAssignedToFarm {
    pub crop_id: CropId,
    pub farm_id: FarmId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropLinkedToLot {
    pub crop_id: CropId,
    pub lot_id: LotId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AverageYieldRefreshed {
    pub crop_id: CropId,
    pub average_yield: Option<Decimal>,
    pub harvest_count: usize,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRemoved {
    pub crop_id: CropId,
    pub farm_id: Option<FarmId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CropEvent {
    CropRegistered(CropRegistered),
    CropAssignedToFarm(CropAssignedToFarm),
    CropLinkedToLot(CropLinkedToLot),
    AverageYieldRefreshed(AverageYieldRefreshed),
    CropRemoved(CropRemoved),
}

impl Event for CropEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CropEvent::CropRegistered(_) => "crops.crop.registered",
            CropEvent::CropAssignedToFarm(_) => "crops.crop.assigned_to_farm",
            CropEvent::CropLinkedToLot(_) => "crops.crop.linked_to_lot",
            CropEvent::AverageYieldRefreshed(_) => "crops.crop.average_yield_refreshed",
            CropEvent::CropRemoved(_) => "crops.crop.removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CropEvent::CropRegistered(e) => e.occurred_at,
            CropEvent::CropAssignedToFarm(e) => e.occurred_at,
            CropEvent::CropLinkedToLot(e) => e.occurred_at,
            CropEvent::AverageYieldRefreshed(e) => e.occurred_at,
            CropEvent::CropRemoved(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Crop {
    type Command = CropCommand;
    type Event = CropEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CropEvent::CropRegistered(e) => {
                self.id = e.crop_id;
                self.crop_type = e.crop_type.clone();
                self.farm_id = e.farm_id;
                self.lot_id = e.lot_id;
                self.created = true;
            }
            CropEvent::CropAssignedToFarm(e) => {
                self.farm_id = Some(e.farm_id);
            }
            CropEvent::CropLinkedToLot(e) => {
                self.lot_id = Some(e.lot_id);
            }
            CropEvent::AverageYieldRefreshed(e) => {
                if let Some(avg) = e.average_yield {
                    self.average_yield = Some(avg);
                }
                self.harvest_count = e.harvest_count;
            }
            CropEvent::CropRemoved(_) => {
                self.removed = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CropCommand::RegisterCrop(cmd) => self.handle_register(cmd),
            CropCommand::AssignToFarm(cmd) => {
                self.ensure_live(cmd.crop_id)?;
                Ok(vec![CropEvent::CropAssignedToFarm(CropAssignedToFarm {
                    crop_id: cmd.crop_id,
                    farm_id: cmd.farm_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            CropCommand::LinkLot(cmd) => {
                self.ensure_live(cmd.crop_id)?;
                Ok(vec![CropEvent::CropLinkedToLot(CropLinkedToLot {
                    crop_id: cmd.crop_id,
                    lot_id: cmd.lot_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            CropCommand::RefreshAverageYield(cmd) => self.handle_refresh(cmd),
            CropCommand::RemoveCrop(cmd) => {
                self.ensure_live(cmd.crop_id)?;
                Ok(vec![CropEvent::CropRemoved(CropRemoved {
                    crop_id: cmd.crop_id,
                    farm_id: self.farm_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl Crop {
    fn ensure_live(&self, crop_id: CropId) -> Result<(), DomainError> {
        if !self.exists() {
            return Err(DomainError::not_found("crop"));
        }
        if self.id != crop_id {
            return Err(DomainError::invariant("crop_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterCrop) -> Result<Vec<CropEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("crop already exists"));
        }
        if cmd.crop_type.trim().is_empty() {
            return Err(DomainError::invalid_argument("crop_type cannot be empty"));
        }

        Ok(vec![CropEvent::CropRegistered(CropRegistered {
            crop_id: cmd.crop_id,
            crop_type: cmd.crop_type.trim().to_string(),
            farm_id: cmd.farm_id,
            lot_id: cmd.lot_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    // Always emits, even for an unchanged value: the event is what makes a
    // recomputation commit against this crop's version.
    fn handle_refresh(&self, cmd: &RefreshAverageYield) -> Result<Vec<CropEvent>, DomainError> {
        self.ensure_live(cmd.crop_id)?;

        match (cmd.average_yield, cmd.harvest_count) {
            (None, 0) => {}
            (Some(avg), n) if n > 0 => {
                if avg.is_sign_negative() || avg.is_zero() {
                    return Err(DomainError::invariant("average yield must be positive"));
                }
            }
            _ => {
                return Err(DomainError::invariant(
                    "an average yield exists exactly when there are harvests",
                ));
            }
        }

        Ok(vec![CropEvent::AverageYieldRefreshed(AverageYieldRefreshed {
            crop_id: cmd.crop_id,
            average_yield: cmd.average_yield,
            harvest_count: cmd.harvest_count,
            occurred_at: cmd.occurred_at,
        })])
    }
}
