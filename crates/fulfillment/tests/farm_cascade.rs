use chrono::Utc;
use rust_decimal_macros::dec;

use fieldstock_crops::{Farm, FarmCommand, RetireFarm};
use fieldstock_fulfillment::{CascadeReport, FulfillmentConfig, FulfillmentContext, FulfillmentError};
use fieldstock_inventory::LotId;

fn ctx() -> FulfillmentContext {
    FulfillmentContext::in_memory(&FulfillmentConfig::default())
}

#[test]
fn crops_must_reference_existing_farms_and_lots() {
    let ctx = ctx();
    let farms = ctx.farms();
    let farm_id = farms.register_farm("Meadow", "Lower Road").unwrap();

    assert!(matches!(
        farms.register_crop("wheat", None, Some(LotId::generate())).unwrap_err(),
        FulfillmentError::NotFound(_)
    ));

    let crop = farms.register_crop("wheat", None, None).unwrap();
    assert_eq!(crop.farm_id, None);
    let crop = farms.assign_crop_to_farm(crop.crop_id, farm_id).unwrap();
    assert_eq!(crop.farm_id, Some(farm_id));

    let lot_id = ctx.inventory().register_lot("wheat", "silo", dec!(0)).unwrap();
    let crop = farms.link_crop_to_lot(crop.crop_id, lot_id).unwrap();
    assert_eq!(crop.lot_id, Some(lot_id));
    assert_eq!(farms.crops_by_farm(farm_id).len(), 1);

    assert!(matches!(
        farms.register_farm("  ", "nowhere").unwrap_err(),
        FulfillmentError::InvalidArgument(_)
    ));
}

#[test]
fn deleting_a_farm_removes_its_crops_and_harvests() {
    let ctx = ctx();
    let farm_id = ctx.farms().register_farm("Meadow", "Lower Road").unwrap();
    let lot_id = ctx.inventory().register_lot("barley", "silo", dec!(0)).unwrap();
    let crop = ctx.farms().register_crop("barley", Some(farm_id), Some(lot_id)).unwrap();
    ctx.harvests().record(crop.crop_id, dec!(3), 3).unwrap();
    ctx.harvests().record(crop.crop_id, dec!(5), 4).unwrap();

    let report = ctx.farms().delete_farm(farm_id).unwrap();
    assert_eq!(
        report,
        CascadeReport {
            harvests_removed: 2,
            crops_removed: 1,
        }
    );

    assert!(ctx.harvests().all().is_empty());
    assert!(matches!(
        ctx.farms().get_crop(crop.crop_id).unwrap_err(),
        FulfillmentError::NotFound(_)
    ));
    assert!(matches!(
        ctx.farms().get_farm(farm_id).unwrap_err(),
        FulfillmentError::NotFound(_)
    ));
    // Received stock stays in the lot.
    assert_eq!(ctx.inventory().get_lot(lot_id).unwrap().quantity.amount(), dec!(8));
}

#[test]
fn harvests_of_a_moved_crop_are_removed_and_its_average_refreshed() {
    let ctx = ctx();
    let old_farm = ctx.farms().register_farm("Old Farm", "East").unwrap();
    let new_farm = ctx.farms().register_farm("New Farm", "West").unwrap();
    let lot_id = ctx.inventory().register_lot("rye", "silo", dec!(0)).unwrap();
    let crop = ctx.farms().register_crop("rye", Some(old_farm), Some(lot_id)).unwrap();

    ctx.harvests().record(crop.crop_id, dec!(4), 3).unwrap();
    ctx.farms().assign_crop_to_farm(crop.crop_id, new_farm).unwrap();
    ctx.harvests().record(crop.crop_id, dec!(8), 3).unwrap();
    assert_eq!(ctx.farms().get_crop(crop.crop_id).unwrap().average_yield, Some(dec!(6)));

    let report = ctx.farms().delete_farm(old_farm).unwrap();
    assert_eq!(report.harvests_removed, 1);
    assert_eq!(report.crops_removed, 0);

    let survivor = ctx.farms().get_crop(crop.crop_id).unwrap();
    assert_eq!(survivor.harvest_count, 1);
    assert_eq!(survivor.average_yield, Some(dec!(8)));
    assert_eq!(ctx.harvests().harvests_by_farm(new_farm).len(), 1);
}

#[test]
fn deleting_a_crop_removes_its_harvests() {
    let ctx = ctx();
    let farm_id = ctx.farms().register_farm("Meadow", "Lower Road").unwrap();
    let lot_id = ctx.inventory().register_lot("oats", "silo", dec!(0)).unwrap();
    let oats = ctx.farms().register_crop("oats", Some(farm_id), Some(lot_id)).unwrap();
    let flax = ctx.farms().register_crop("flax", Some(farm_id), Some(lot_id)).unwrap();
    ctx.harvests().record(oats.crop_id, dec!(2), 3).unwrap();
    ctx.harvests().record(flax.crop_id, dec!(7), 3).unwrap();

    let report = ctx.farms().delete_crop(oats.crop_id).unwrap();
    assert_eq!(report.harvests_removed, 1);
    assert_eq!(report.crops_removed, 1);
    assert_eq!(ctx.harvests().all().len(), 1);
    assert_eq!(ctx.farms().crops_by_farm(farm_id).len(), 1);
    assert_eq!(ctx.yields().farm_total_yield(farm_id).unwrap(), dec!(7));
}

#[test]
fn deleting_an_unknown_farm_is_not_found() {
    let ctx = ctx();
    let farm_id = ctx.farms().register_farm("Gone", "Away").unwrap();
    ctx.farms().delete_farm(farm_id).unwrap();
    assert!(matches!(
        ctx.farms().delete_farm(farm_id).unwrap_err(),
        FulfillmentError::NotFound(_)
    ));
}

#[test]
fn crops_cannot_join_a_deleted_farm() {
    let ctx = ctx();
    let farm_id = ctx.farms().register_farm("Closed", "North").unwrap();
    let crop = ctx.farms().register_crop("leeks", None, None).unwrap();
    ctx.farms().delete_farm(farm_id).unwrap();

    assert!(matches!(
        ctx.farms().register_crop("leeks", Some(farm_id), None).unwrap_err(),
        FulfillmentError::NotFound(_)
    ));
    assert!(matches!(
        ctx.farms().assign_crop_to_farm(crop.crop_id, farm_id).unwrap_err(),
        FulfillmentError::NotFound(_)
    ));
    assert_eq!(ctx.farms().get_crop(crop.crop_id).unwrap().farm_id, None);
}

#[test]
fn harvests_cannot_be_booked_against_a_retired_farm() {
    let ctx = ctx();
    let farm_id = ctx.farms().register_farm("Fallow", "South").unwrap();
    let lot_id = ctx.inventory().register_lot("beets", "cellar", dec!(0)).unwrap();
    let crop = ctx.farms().register_crop("beets", Some(farm_id), Some(lot_id)).unwrap();

    // Retire the farm alone, leaving its crop pointing at it.
    ctx.dispatcher()
        .dispatch(
            farm_id,
            FarmCommand::RetireFarm(RetireFarm {
                farm_id,
                occurred_at: Utc::now(),
            }),
            Farm::empty,
        )
        .unwrap();

    let err = ctx.harvests().record(crop.crop_id, dec!(3), 4).unwrap_err();
    assert!(matches!(err, FulfillmentError::IncompleteCropSetup(_)));
    assert!(ctx.harvests().all().is_empty());
    assert_eq!(ctx.inventory().get_lot(lot_id).unwrap().quantity.amount(), dec!(0));
}
