use rust_decimal_macros::dec;

use fieldstock_events::EventBus;
use fieldstock_fulfillment::{FulfillmentConfig, FulfillmentContext, FulfillmentError};
use fieldstock_inventory::LotId;
use fieldstock_orders::{DeliveryStatus, OrderId};

fn ctx() -> FulfillmentContext {
    FulfillmentContext::in_memory(&FulfillmentConfig::default())
}

fn available(ctx: &FulfillmentContext, lot_id: LotId) -> rust_decimal::Decimal {
    ctx.inventory().get_lot(lot_id).unwrap().quantity.amount()
}

#[test]
fn place_then_cancel_restores_the_lot() {
    let ctx = ctx();
    let lot_id = ctx.inventory().register_lot("carrots", "cold store A", dec!(10)).unwrap();

    let order = ctx.orders().create(lot_id, dec!(7)).unwrap();
    assert_eq!(order.status, DeliveryStatus::Pending);
    assert_eq!(order.reservation, None);
    assert_eq!(available(&ctx, lot_id), dec!(10));

    let placed = ctx.orders().place(order.order_id).unwrap();
    assert_eq!(placed.status, DeliveryStatus::Processing);
    assert_eq!(placed.reservation.map(|q| q.amount()), Some(dec!(7)));
    assert_eq!(available(&ctx, lot_id), dec!(3));

    let cancelled = ctx.orders().cancel(order.order_id).unwrap();
    assert_eq!(cancelled.status, DeliveryStatus::Cancelled);
    assert_eq!(cancelled.reservation, None);
    assert_eq!(available(&ctx, lot_id), dec!(10));
}

#[test]
fn create_rejects_quantity_above_availability() {
    let ctx = ctx();
    let lot_id = ctx.inventory().register_lot("leeks", "cold store B", dec!(2)).unwrap();

    let err = ctx.orders().create(lot_id, dec!(5)).unwrap_err();
    assert!(matches!(
        err,
        FulfillmentError::InsufficientStock { lot, .. } if lot == lot_id
    ));
    assert!(ctx.orders().list().is_empty());
    assert_eq!(available(&ctx, lot_id), dec!(2));
}

#[test]
fn create_rejects_unknown_lot_and_non_positive_quantity() {
    let ctx = ctx();
    let err = ctx.orders().create(LotId::generate(), dec!(1)).unwrap_err();
    assert!(matches!(err, FulfillmentError::NotFound(_)));

    let lot_id = ctx.inventory().register_lot("kale", "shed", dec!(4)).unwrap();
    let err = ctx.orders().create(lot_id, dec!(0)).unwrap_err();
    assert!(matches!(err, FulfillmentError::InvalidArgument(_)));
}

#[test]
fn place_without_enough_stock_changes_nothing() {
    let ctx = ctx();
    let lot_id = ctx.inventory().register_lot("beets", "shed", dec!(6)).unwrap();
    let first = ctx.orders().create(lot_id, dec!(4)).unwrap();
    let second = ctx.orders().create(lot_id, dec!(4)).unwrap();

    ctx.orders().place(first.order_id).unwrap();
    let err = ctx.orders().place(second.order_id).unwrap_err();
    assert!(matches!(err, FulfillmentError::InsufficientStock { .. }));

    let second = ctx.orders().get(second.order_id).unwrap();
    assert_eq!(second.status, DeliveryStatus::Pending);
    assert_eq!(second.reservation, None);
    assert_eq!(available(&ctx, lot_id), dec!(2));
}

#[test]
fn delivered_orders_cannot_be_cancelled() {
    let ctx = ctx();
    let lot_id = ctx.inventory().register_lot("onions", "barn", dec!(10)).unwrap();
    let order = ctx.orders().create(lot_id, dec!(3)).unwrap();
    ctx.orders().place(order.order_id).unwrap();
    let delivered = ctx.orders().mark_delivered(order.order_id).unwrap();
    assert_eq!(delivered.status, DeliveryStatus::Delivered);

    let err = ctx.orders().cancel(order.order_id).unwrap_err();
    assert_eq!(err, FulfillmentError::AlreadyDelivered);
    assert_eq!(ctx.orders().get(order.order_id).unwrap().status, DeliveryStatus::Delivered);
    assert_eq!(available(&ctx, lot_id), dec!(7));
}

#[test]
fn pending_order_without_reservation_cannot_be_delivered() {
    let ctx = ctx();
    let lot_id = ctx.inventory().register_lot("garlic", "barn", dec!(10)).unwrap();
    let order = ctx.orders().create(lot_id, dec!(3)).unwrap();

    let err = ctx.orders().mark_delivered(order.order_id).unwrap_err();
    assert!(matches!(err, FulfillmentError::IllegalTransition(_)));
}

#[test]
fn status_override_leaves_inventory_alone() {
    let ctx = ctx();
    let lot_id = ctx.inventory().register_lot("squash", "barn", dec!(10)).unwrap();
    let order = ctx.orders().create(lot_id, dec!(4)).unwrap();
    ctx.orders().place(order.order_id).unwrap();

    let overridden = ctx
        .orders()
        .update_status(order.order_id, DeliveryStatus::Cancelled)
        .unwrap();
    assert_eq!(overridden.status, DeliveryStatus::Cancelled);
    assert_eq!(available(&ctx, lot_id), dec!(6));
    assert_eq!(ctx.orders().orders_by_status(DeliveryStatus::Cancelled).len(), 1);
}

#[test]
fn deleting_an_order_releases_its_reservation() {
    let ctx = ctx();
    let lot_id = ctx.inventory().register_lot("peas", "barn", dec!(10)).unwrap();
    let order = ctx.orders().create(lot_id, dec!(4)).unwrap();
    ctx.orders().place(order.order_id).unwrap();
    assert_eq!(available(&ctx, lot_id), dec!(6));

    ctx.orders().delete(order.order_id).unwrap();
    assert_eq!(available(&ctx, lot_id), dec!(10));
    assert!(ctx.orders().orders_for_lot(lot_id).is_empty());
    assert!(matches!(
        ctx.orders().get(order.order_id).unwrap_err(),
        FulfillmentError::NotFound(_)
    ));
}

#[test]
fn deleting_a_delivered_order_keeps_stock_consumed() {
    let ctx = ctx();
    let lot_id = ctx.inventory().register_lot("radish", "barn", dec!(10)).unwrap();
    let order = ctx.orders().create(lot_id, dec!(4)).unwrap();
    ctx.orders().place(order.order_id).unwrap();
    ctx.orders().mark_delivered(order.order_id).unwrap();

    ctx.orders().delete(order.order_id).unwrap();
    assert_eq!(available(&ctx, lot_id), dec!(6));
}

#[test]
fn unknown_order_is_not_found() {
    let ctx = ctx();
    let err = ctx.orders().place(OrderId::generate()).unwrap_err();
    assert!(matches!(err, FulfillmentError::NotFound(_)));
}

#[test]
fn committed_events_are_published_together() {
    let ctx = ctx();
    let lot_id = ctx.inventory().register_lot("chicory", "cellar", dec!(5)).unwrap();
    let order = ctx.orders().create(lot_id, dec!(2)).unwrap();

    let subscription = ctx.bus().subscribe();
    ctx.orders().place(order.order_id).unwrap();

    let published: Vec<String> = subscription
        .drain()
        .iter()
        .map(|envelope| envelope.event_type().to_string())
        .collect();
    assert_eq!(
        published,
        vec![
            "orders.order.reservation_held",
            "orders.order.placed",
            "inventory.lot.quantity_reserved",
        ]
    );
}

#[test]
fn disabled_bus_publishes_nothing() {
    let ctx = FulfillmentContext::in_memory(&FulfillmentConfig::default().with_event_bus(false));
    let subscription = ctx.bus().subscribe();
    ctx.inventory().register_lot("fennel", "cellar", dec!(5)).unwrap();
    assert!(subscription.drain().is_empty());
}
