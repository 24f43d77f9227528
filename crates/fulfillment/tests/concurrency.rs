use std::thread;

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use fieldstock_fulfillment::{FulfillmentConfig, FulfillmentContext, FulfillmentError};
use fieldstock_orders::{DeliveryStatus, OrderId};

fn contended_ctx() -> FulfillmentContext {
    FulfillmentContext::in_memory(&FulfillmentConfig::default().with_max_commit_attempts(1_000))
}

#[test]
fn concurrent_client_orders_never_oversell_a_lot() {
    let ctx = contended_ctx();
    let lot_id = ctx.inventory().register_lot("strawberries", "cold store", dec!(10)).unwrap();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let ctx = ctx.clone();
            thread::spawn(move || {
                let client = ctx
                    .clients()
                    .register_client(&format!("client {i}"), &format!("c{i}@example.test"), "", "")
                    .unwrap();
                ctx.clients().place_client_order(client.client_id, lot_id, dec!(1))
            })
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(_) => accepted += 1,
            Err(FulfillmentError::InsufficientStock { .. }) => {}
            Err(other) => panic!("unexpected failure: {other}"),
        }
    }

    assert_eq!(accepted, 10);
    assert_eq!(ctx.inventory().get_lot(lot_id).unwrap().quantity.amount(), dec!(0));
    assert_eq!(ctx.orders().orders_for_lot(lot_id).len(), 10);
}

#[test]
fn concurrent_place_and_cancel_conserve_quantity() {
    let ctx = contended_ctx();
    let lot_id = ctx.inventory().register_lot("cherries", "cold store", dec!(20)).unwrap();
    let orders: Vec<_> = (0..8)
        .map(|_| ctx.orders().create(lot_id, dec!(2)).unwrap().order_id)
        .collect();

    let handles: Vec<_> = orders
        .iter()
        .copied()
        .map(|order_id| {
            let ctx = ctx.clone();
            thread::spawn(move || {
                ctx.orders().place(order_id).unwrap();
                ctx.orders().cancel(order_id).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(ctx.inventory().get_lot(lot_id).unwrap().quantity.amount(), dec!(20));
    assert_eq!(ctx.orders().orders_by_status(DeliveryStatus::Cancelled).len(), 8);
}

#[test]
fn concurrent_placements_of_pending_orders_never_oversell_a_lot() {
    let ctx = contended_ctx();
    let lot_id = ctx.inventory().register_lot("raspberries", "cold store", dec!(10)).unwrap();
    let orders: Vec<OrderId> = (0..8)
        .map(|_| ctx.orders().create(lot_id, dec!(3)).unwrap().order_id)
        .collect();

    let handles: Vec<_> = orders
        .iter()
        .copied()
        .map(|order_id| {
            let ctx = ctx.clone();
            thread::spawn(move || ctx.orders().place(order_id))
        })
        .collect();

    let mut placed = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(_) => placed += 1,
            Err(FulfillmentError::InsufficientStock { .. }) => {}
            Err(other) => panic!("unexpected failure: {other}"),
        }
    }

    assert_eq!(placed, 3);
    assert_eq!(ctx.inventory().get_lot(lot_id).unwrap().quantity.amount(), dec!(1));
    for order_id in orders {
        let order = ctx.orders().get(order_id).unwrap();
        match order.status {
            DeliveryStatus::Processing => {
                assert_eq!(order.reservation.map(|q| q.amount()), Some(dec!(3)));
            }
            DeliveryStatus::Pending => assert_eq!(order.reservation, None),
            other => panic!("unexpected status {other:?}"),
        }
    }
    assert_eq!(ctx.orders().orders_by_status(DeliveryStatus::Processing).len(), 3);
}

#[test]
fn crops_registered_during_a_farm_cascade_never_outlive_the_farm() {
    let ctx = contended_ctx();
    for round in 0..20 {
        let farm_id = ctx.farms().register_farm(&format!("Farm {round}"), "Valley").unwrap();

        let registering = {
            let ctx = ctx.clone();
            thread::spawn(move || {
                (0..4)
                    .map(|_| ctx.farms().register_crop("kale", Some(farm_id), None))
                    .collect::<Vec<_>>()
            })
        };
        let deleting = {
            let ctx = ctx.clone();
            thread::spawn(move || ctx.farms().delete_farm(farm_id))
        };

        deleting.join().unwrap().unwrap();
        for registered in registering.join().unwrap() {
            match registered {
                Ok(crop) => assert!(matches!(
                    ctx.farms().get_crop(crop.crop_id).unwrap_err(),
                    FulfillmentError::NotFound(_)
                )),
                Err(FulfillmentError::NotFound(_)) => {}
                Err(other) => panic!("unexpected failure: {other}"),
            }
        }
        assert!(ctx.farms().crops_by_farm(farm_id).is_empty());
    }
}

#[derive(Debug, Clone)]
enum Step {
    Create(u8),
    Place(usize),
    Cancel(usize),
    Deliver(usize),
    Delete(usize),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (1u8..6).prop_map(Step::Create),
        (0usize..8).prop_map(Step::Place),
        (0usize..8).prop_map(Step::Cancel),
        (0usize..8).prop_map(Step::Deliver),
        (0usize..8).prop_map(Step::Delete),
    ]
}

fn pick(orders: &[OrderId], i: usize) -> Option<OrderId> {
    if orders.is_empty() {
        return None;
    }
    orders.get(i % orders.len()).copied()
}

proptest! {
    // Available stock plus live reservations (excluding delivered ones) always
    // equals what was registered minus what was delivered.
    #[test]
    fn lot_quantity_matches_outstanding_reservations(steps in proptest::collection::vec(step(), 1..40)) {
        let ctx = FulfillmentContext::in_memory(&FulfillmentConfig::default());
        let initial = dec!(15);
        let lot_id = ctx.inventory().register_lot("plums", "orchard", initial).unwrap();
        let mut orders = Vec::new();
        let mut delivered = Decimal::ZERO;

        for step in steps {
            match step {
                Step::Create(n) => {
                    if let Ok(view) = ctx.orders().create(lot_id, Decimal::from(n)) {
                        orders.push(view.order_id);
                    }
                }
                Step::Place(i) => {
                    if let Some(id) = pick(&orders, i) {
                        let _ = ctx.orders().place(id);
                    }
                }
                Step::Cancel(i) => {
                    if let Some(id) = pick(&orders, i) {
                        let _ = ctx.orders().cancel(id);
                    }
                }
                Step::Deliver(i) => {
                    if let Some(id) = pick(&orders, i) {
                        if let Ok(view) = ctx.orders().mark_delivered(id) {
                            delivered += view.quantity_ordered.amount();
                        }
                    }
                }
                Step::Delete(i) => {
                    if let Some(id) = pick(&orders, i) {
                        let _ = ctx.orders().delete(id);
                    }
                }
            }
        }

        let held: Decimal = ctx
            .orders()
            .list()
            .iter()
            .filter(|o| o.status != DeliveryStatus::Delivered)
            .filter_map(|o| o.reservation.map(|q| q.amount()))
            .sum();
        let available = ctx.inventory().get_lot(lot_id).unwrap().quantity.amount();
        prop_assert!(available >= Decimal::ZERO);
        prop_assert_eq!(available + held + delivered, initial);
    }
}
