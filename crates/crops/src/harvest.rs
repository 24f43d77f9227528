use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fieldstock_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Quantity, typed_id};
use fieldstock_events::Event;
use fieldstock_inventory::LotId;

use crate::crop::CropId;
use crate::farm::FarmId;

typed_id!(
    /// Harvest identifier.
    HarvestId
);

/// Aggregate root: Harvest.
///
/// Records one harvest event of a crop and the farm and lot it was booked
/// against at the time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Harvest {
    id: HarvestId,
    crop_id: CropId,
    farm_id: FarmId,
    lot_id: LotId,
    date: Option<DateTime<Utc>>,
    yield_amount: Quantity,
    quality_rating: u32,
    version: u64,
    created: bool,
    removed: bool,
}

impl Harvest {
    pub fn empty(id: HarvestId) -> Self {
        Self {
            id,
            crop_id: CropId::new(AggregateId::nil()),
            farm_id: FarmId::new(AggregateId::nil()),
            lot_id: LotId::new(AggregateId::nil()),
            date: None,
            yield_amount: Quantity::ZERO,
            quality_rating: 0,
            version: 0,
            created: false,
            removed: false,
        }
    }

    pub fn id_typed(&self) -> HarvestId {
        self.id
    }

    pub fn crop_id(&self) -> CropId {
        self.crop_id
    }

    pub fn farm_id(&self) -> FarmId {
        self.farm_id
    }

    pub fn lot_id(&self) -> LotId {
        self.lot_id
    }

    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.date
    }

    pub fn yield_amount(&self) -> Quantity {
        self.yield_amount
    }

    pub fn quality_rating(&self) -> u32 {
        self.quality_rating
    }
}

impl AggregateRoot for Harvest {
    type Id = HarvestId;

    const AGGREGATE_TYPE: &'static str = "crops.harvest";

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

/// Command: RecordHarvest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordHarvest {
    pub harvest_id: HarvestId,
    pub crop_id: CropId,
    pub farm_id: FarmId,
    pub lot_id: LotId,
    pub yield_amount: Quantity,
    pub quality_rating: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReviseYield.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviseYield {
    pub harvest_id: HarvestId,
    pub yield_amount: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReviseQuality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviseQuality {
    pub harvest_id: HarvestId,
    pub quality_rating: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Command: TransferToLot.
///
/// Rebooks the harvest against another lot. Stock already received stays
/// where it was.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferToLot {
    pub harvest_id: HarvestId,
    pub lot_id: LotId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveHarvest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveHarvest {
    pub harvest_id: HarvestId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarvestCommand {
    RecordHarvest(RecordHarvest),
    ReviseYield(ReviseYield),
    ReviseQuality(ReviseQuality),
    TransferToLot(TransferToLot),
    RemoveHarvest(RemoveHarvest),
}

/// Event: HarvestRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestRecorded {
    pub harvest_id: HarvestId,
    pub crop_id: CropId,
    pub farm_id: FarmId,
    pub lot_id: LotId,
    pub yield_amount: Quantity,
    pub quality_rating: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: HarvestYieldRevised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestYieldRevised {
    pub harvest_id: HarvestId,
    pub crop_id: CropId,
    pub previous: Quantity,
    pub yield_amount: Quantity,
    pub occurred_at: DateTime<Utc>,
}

/// Event: HarvestQualityRevised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestQualityRevised {
    pub harvest_id: HarvestId,
    pub quality_rating: u32,
    pub occurred_at: DateTime<Utc>,
}

/// Event: HarvestTransferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestTransferred {
    pub harvest_id: HarvestId,
    pub from: LotId,
    pub to: LotId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: HarvestRemoved (tombstone).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestRemoved {
    pub harvest_id: HarvestId,
    pub crop_id: CropId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarvestEvent {
    HarvestRecorded(HarvestRecorded),
    HarvestYieldRevised(HarvestYieldRevised),
    HarvestQualityRevised(HarvestQualityRevised),
    HarvestTransferred(HarvestTransferred),
    HarvestRemoved(HarvestRemoved),
}

impl Event for HarvestEvent {
    fn event_type(&self) -> &'static str {
        match self {
            HarvestEvent::HarvestRecorded(_) => "crops.harvest.recorded",
            HarvestEvent::HarvestYieldRevised(_) => "crops.harvest.yield_revised",
            HarvestEvent::HarvestQualityRevised(_) => "crops.harvest.quality_revised",
            HarvestEvent::HarvestTransferred(_) => "crops.harvest.transferred",
            HarvestEvent::HarvestRemoved(_) => "crops.harvest.removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            HarvestEvent::HarvestRecorded(e) => e.occurred_at,
            HarvestEvent::HarvestYieldRevised(e) => e.occurred_at,
            HarvestEvent::HarvestQualityRevised(e) => e.occurred_at,
            HarvestEvent::HarvestTransferred(e) => e.occurred_at,
            HarvestEvent::HarvestRemoved(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Harvest {
    type Command = HarvestCommand;
    type Event = HarvestEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            HarvestEvent::HarvestRecorded(e) => {
                self.id = e.harvest_id;
                self.crop_id = e.crop_id;
                self.farm_id = e.farm_id;
                self.lot_id = e.lot_id;
                self.date = Some(e.occurred_at);
                self.yield_amount = e.yield_amount;
                self.quality_rating = e.quality_rating;
                self.created = true;
            }
            HarvestEvent::HarvestYieldRevised(e) => {
                self.yield_amount = e.yield_amount;
            }
            HarvestEvent::HarvestQualityRevised(e) => {
                self.quality_rating = e.quality_rating;
            }
            HarvestEvent::HarvestTransferred(e) => {
                self.lot_id = e.to;
            }
            HarvestEvent::HarvestRemoved(_) => {
                self.removed = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            HarvestCommand::RecordHarvest(cmd) => self.handle_record(cmd),
            HarvestCommand::ReviseYield(cmd) => {
                self.ensure_live(cmd.harvest_id)?;
                ensure_positive_yield(cmd.yield_amount)?;
                Ok(vec![HarvestEvent::HarvestYieldRevised(HarvestYieldRevised {
                    harvest_id: cmd.harvest_id,
                    crop_id: self.crop_id,
                    previous: self.yield_amount,
                    yield_amount: cmd.yield_amount,
                    occurred_at: cmd.occurred_at,
                })])
            }
            HarvestCommand::ReviseQuality(cmd) => {
                self.ensure_live(cmd.harvest_id)?;
                ensure_positive_rating(cmd.quality_rating)?;
                Ok(vec![HarvestEvent::HarvestQualityRevised(HarvestQualityRevised {
                    harvest_id: cmd.harvest_id,
                    quality_rating: cmd.quality_rating,
                    occurred_at: cmd.occurred_at,
                })])
            }
            HarvestCommand::TransferToLot(cmd) => {
                self.ensure_live(cmd.harvest_id)?;
                if cmd.lot_id == self.lot_id {
                    return Ok(vec![]);
                }
                Ok(vec![HarvestEvent::HarvestTransferred(HarvestTransferred {
                    harvest_id: cmd.harvest_id,
                    from: self.lot_id,
                    to: cmd.lot_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
            HarvestCommand::RemoveHarvest(cmd) => {
                self.ensure_live(cmd.harvest_id)?;
                Ok(vec![HarvestEvent::HarvestRemoved(HarvestRemoved {
                    harvest_id: cmd.harvest_id,
                    crop_id: self.crop_id,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

fn ensure_positive_yield(amount: Quantity) -> Result<(), DomainError> {
    if amount.is_zero() {
        return Err(DomainError::invalid_argument("yield must be positive"));
    }
    Ok(())
}

fn ensure_positive_rating(rating: u32) -> Result<(), DomainError> {
    if rating == 0 {
        return Err(DomainError::invalid_argument("quality rating must be positive"));
    }
    Ok(())
}

impl Harvest {
    fn ensure_live(&self, harvest_id: HarvestId) -> Result<(), DomainError> {
        if !self.exists() {
            return Err(DomainError::not_found("harvest"));
        }
        if self.id != harvest_id {
            return Err(DomainError::invariant("harvest_id mismatch"));
        }
        Ok(())
    }

    fn handle_record(&self, cmd: &RecordHarvest) -> Result<Vec<HarvestEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("harvest already exists"));
        }
        ensure_positive_yield(cmd.yield_amount)?;
        ensure_positive_rating(cmd.quality_rating)?;

        Ok(vec![HarvestEvent::HarvestRecorded(HarvestRecorded {
            harvest_id: cmd.harvest_id,
            crop_id: cmd.crop_id,
            farm_id: cmd.farm_id,
            lot_id: cmd.lot_id,
            yield_amount: cmd.yield_amount,
            quality_rating: cmd.quality_rating,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record(yield_amount: Quantity, quality_rating: u32) -> Result<Vec<HarvestEvent>, DomainError> {
        let harvest_id = HarvestId::generate();
        Harvest::empty(harvest_id).handle(&HarvestCommand::RecordHarvest(RecordHarvest {
            harvest_id,
            crop_id: CropId::generate(),
            farm_id: FarmId::generate(),
            lot_id: LotId::generate(),
            yield_amount,
            quality_rating,
            occurred_at: Utc::now(),
        }))
    }

    #[test]
    fn record_validates_yield_and_rating() {
        assert!(matches!(
            record(Quantity::ZERO, 3),
            Err(DomainError::InvalidArgument(_))
        ));
        assert!(matches!(
            record(Quantity::new(dec!(2)).unwrap(), 0),
            Err(DomainError::InvalidArgument(_))
        ));
        assert!(record(Quantity::new(dec!(2)).unwrap(), 1).is_ok());
    }

    #[test]
    fn revise_yield_reports_the_previous_value() {
        let events = record(Quantity::new(dec!(5)).unwrap(), 4).unwrap();
        let HarvestEvent::HarvestRecorded(recorded) = &events[0] else {
            panic!("expected HarvestRecorded");
        };
        let mut harvest = Harvest::empty(recorded.harvest_id);
        harvest.apply(&events[0]);

        let revised = harvest
            .handle(&HarvestCommand::ReviseYield(ReviseYield {
                harvest_id: harvest.id_typed(),
                yield_amount: Quantity::new(dec!(9)).unwrap(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        match &revised[0] {
            HarvestEvent::HarvestYieldRevised(e) => {
                assert_eq!(e.previous.amount(), dec!(5));
                assert_eq!(e.crop_id, recorded.crop_id);
            }
            other => panic!("unexpected event {other:?}"),
        }
        harvest.apply(&revised[0]);
        assert_eq!(harvest.yield_amount().amount(), dec!(9));
    }

    #[test]
    fn removed_harvest_cannot_be_revised() {
        let events = record(Quantity::new(dec!(1)).unwrap(), 2).unwrap();
        let HarvestEvent::HarvestRecorded(recorded) = &events[0] else {
            panic!("expected HarvestRecorded");
        };
        let mut harvest = Harvest::empty(recorded.harvest_id);
        harvest.apply(&events[0]);
        let removed = harvest
            .handle(&HarvestCommand::RemoveHarvest(RemoveHarvest {
                harvest_id: harvest.id_typed(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        harvest.apply(&removed[0]);

        let err = harvest
            .handle(&HarvestCommand::ReviseQuality(ReviseQuality {
                harvest_id: harvest.id_typed(),
                quality_rating: 5,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound("harvest")));
    }

    #[test]
    fn transfer_rebooks_the_lot_and_is_idempotent() {
        let events = record(Quantity::new(dec!(3)).unwrap(), 4).unwrap();
        let HarvestEvent::HarvestRecorded(recorded) = &events[0] else {
            panic!("expected HarvestRecorded");
        };
        let mut harvest = Harvest::empty(recorded.harvest_id);
        harvest.apply(&events[0]);

        let target = LotId::generate();
        let transfer = HarvestCommand::TransferToLot(TransferToLot {
            harvest_id: harvest.id_typed(),
            lot_id: target,
            occurred_at: Utc::now(),
        });
        let moved = harvest.handle(&transfer).unwrap();
        match &moved[0] {
            HarvestEvent::HarvestTransferred(e) => {
                assert_eq!(e.from, recorded.lot_id);
                assert_eq!(e.to, target);
            }
            other => panic!("unexpected event {other:?}"),
        }
        harvest.apply(&moved[0]);
        assert_eq!(harvest.lot_id(), target);
        assert_eq!(harvest.yield_amount().amount(), dec!(3));

        assert!(harvest.handle(&transfer).unwrap().is_empty());
    }
}
