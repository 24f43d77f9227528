use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fieldstock_core::{Aggregate, AggregateRoot, DomainError, typed_id};
use fieldstock_events::Event;

use crate::crop::CropId;

typed_id!(
    /// Farm identifier.
    FarmId
);

/// Aggregate root: Farm.
///
/// Every crop attached to the farm goes through this stream, so an attach
/// racing a retirement fails its version check instead of leaving a crop on
/// a retired farm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Farm {
    id: FarmId,
    name: String,
    location: String,
    /// Crops ever attached. A crop may have moved on or been removed since.
    attached_crops: BTreeSet<CropId>,
    version: u64,
    created: bool,
    retired: bool,
}

impl Farm {
    pub fn empty(id: FarmId) -> Self {
        Self {
            id,
            name: String::new(),
            location: String::new(),
            attached_crops: BTreeSet::new(),
            version: 0,
            created: false,
            retired: false,
        }
    }

    pub fn id_typed(&self) -> FarmId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn attached_crops(&self) -> impl Iterator<Item = CropId> + '_ {
        self.attached_crops.iter().copied()
    }
}

impl AggregateRoot for Farm {
    type Id = FarmId;

    const AGGREGATE_TYPE: &'static str = "crops.farm";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn exists(&self) -> bool {
        self.created && !self.retired
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFarm {
    pub farm_id: FarmId,
    pub name: String,
    pub location: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AttachCrop. Records that `crop_id` now belongs to the farm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachCrop {
    pub farm_id: FarmId,
    pub crop_id: CropId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RetireFarm. Tombstones the farm; cascading is done by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetireFarm {
    pub farm_id: FarmId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FarmCommand {
    RegisterFarm(RegisterFarm),
    AttachCrop(AttachCrop),
    RetireFarm(RetireFarm),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmRegistered {
    pub farm_id: FarmId,
    pub name: String,
    pub location: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropAttached {
    pub farm_id: FarmId,
    pub crop_id: CropId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmRetired {
    pub farm_id: FarmId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FarmEvent {
    FarmRegistered(FarmRegistered),
    CropAttached(CropAttached),
    FarmRetired(FarmRetired),
}

impl Event for FarmEvent {
    fn event_type(&self) -> &'static str {
        match self {
            FarmEvent::FarmRegistered(_) => "crops.farm.registered",
            FarmEvent::CropAttached(_) => "crops.farm.crop_attached",
            FarmEvent::FarmRetired(_) => "crops.farm.retired",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            FarmEvent::FarmRegistered(e) => e.occurred_at,
            FarmEvent::CropAttached(e) => e.occurred_at,
            FarmEvent::FarmRetired(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Farm {
    type Command = FarmCommand;
    type Event = FarmEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            FarmEvent::FarmRegistered(e) => {
                self.id = e.farm_id;
                self.name = e.name.clone();
                self.location = e.location.clone();
                self.created = true;
            }
            FarmEvent::CropAttached(e) => {
                self.attached_crops.insert(e.crop_id);
            }
            FarmEvent::FarmRetired(_) => {
                self.retired = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            FarmCommand::RegisterFarm(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("farm already exists"));
                }
                if cmd.name.trim().is_empty() {
                    return Err(DomainError::invalid_argument("farm name cannot be empty"));
                }
                Ok(vec![FarmEvent::FarmRegistered(FarmRegistered {
                    farm_id: cmd.farm_id,
                    name: cmd.name.trim().to_string(),
                    location: cmd.location.trim().to_string(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            FarmCommand::AttachCrop(cmd) => {
                self.ensure_live(cmd.farm_id)?;
                Ok(vec![FarmEvent::CropAttached(CropAttached {
                    farm_id: cmd.farm_id,
                    crop_id: cmd.crop_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            FarmCommand::RetireFarm(cmd) => {
                self.ensure_live(cmd.farm_id)?;
                Ok(vec![FarmEvent::FarmRetired(FarmRetired {
                    farm_id: cmd.farm_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

impl Farm {
    fn ensure_live(&self, farm_id: FarmId) -> Result<(), DomainError> {
        if !self.exists() {
            return Err(DomainError::not_found("farm"));
        }
        if self.id != farm_id {
            return Err(DomainError::invariant("farm_id mismatch"));
        }
        Ok(())
    }
}
