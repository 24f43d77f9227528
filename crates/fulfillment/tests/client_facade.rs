use rust_decimal_macros::dec;

use fieldstock_clients::ClientId;
use fieldstock_fulfillment::{ClientDetails, FulfillmentConfig, FulfillmentContext, FulfillmentError};
use fieldstock_orders::DeliveryStatus;

fn ctx() -> FulfillmentContext {
    FulfillmentContext::in_memory(&FulfillmentConfig::default())
}

#[test]
fn client_order_reserves_immediately_and_stays_pending() {
    let ctx = ctx();
    let lot_id = ctx.inventory().register_lot("carrots", "cold store", dec!(10)).unwrap();
    let client = ctx
        .clients()
        .register_client("Corner Grocer", "orders@grocer.test", "weekly", "")
        .unwrap();

    let order = ctx.clients().place_client_order(client.client_id, lot_id, dec!(4)).unwrap();
    assert_eq!(order.status, DeliveryStatus::Pending);
    assert_eq!(order.reservation.map(|q| q.amount()), Some(dec!(4)));
    assert_eq!(ctx.inventory().get_lot(lot_id).unwrap().quantity.amount(), dec!(6));
    assert_eq!(
        ctx.clients().get(client.client_id).unwrap().current_order,
        Some(order.order_id)
    );

    // Placing later must not debit the lot a second time.
    ctx.orders().place(order.order_id).unwrap();
    assert_eq!(ctx.inventory().get_lot(lot_id).unwrap().quantity.amount(), dec!(6));

    let delivered = ctx.clients().handle_delivery_receipt(order.order_id).unwrap();
    assert_eq!(delivered.status, DeliveryStatus::Delivered);
    assert_eq!(ctx.inventory().get_lot(lot_id).unwrap().quantity.amount(), dec!(6));
}

#[test]
fn pending_client_order_can_be_delivered_directly() {
    let ctx = ctx();
    let lot_id = ctx.inventory().register_lot("kale", "shed", dec!(5)).unwrap();
    let client = ctx.clients().register_client("Bistro", "chef@bistro.test", "", "").unwrap();
    let order = ctx.clients().place_client_order(client.client_id, lot_id, dec!(5)).unwrap();

    let delivered = ctx.clients().handle_delivery_receipt(order.order_id).unwrap();
    assert_eq!(delivered.status, DeliveryStatus::Delivered);
}

#[test]
fn oversized_client_order_leaves_everything_untouched() {
    let ctx = ctx();
    let lot_id = ctx.inventory().register_lot("leeks", "cold store", dec!(2)).unwrap();
    let client = ctx.clients().register_client("Deli", "deli@example.test", "", "").unwrap();

    let err = ctx
        .clients()
        .place_client_order(client.client_id, lot_id, dec!(5))
        .unwrap_err();
    assert!(matches!(err, FulfillmentError::InsufficientStock { .. }));
    assert!(ctx.orders().list().is_empty());
    assert_eq!(ctx.clients().get(client.client_id).unwrap().current_order, None);
    assert_eq!(ctx.inventory().get_lot(lot_id).unwrap().quantity.amount(), dec!(2));
}

#[test]
fn unknown_client_cannot_order() {
    let ctx = ctx();
    let lot_id = ctx.inventory().register_lot("leeks", "cold store", dec!(2)).unwrap();
    let err = ctx
        .clients()
        .place_client_order(ClientId::generate(), lot_id, dec!(1))
        .unwrap_err();
    assert!(matches!(err, FulfillmentError::NotFound(_)));
    assert_eq!(ctx.inventory().get_lot(lot_id).unwrap().quantity.amount(), dec!(2));
}

#[test]
fn a_new_order_replaces_the_current_one() {
    let ctx = ctx();
    let lot_id = ctx.inventory().register_lot("apples", "cellar", dec!(10)).unwrap();
    let client = ctx.clients().register_client("Cafe", "cafe@example.test", "", "").unwrap();

    ctx.clients().place_client_order(client.client_id, lot_id, dec!(1)).unwrap();
    let standalone = ctx.orders().create(lot_id, dec!(2)).unwrap();
    let view = ctx
        .clients()
        .assign_existing_order(client.client_id, standalone.order_id)
        .unwrap();
    assert_eq!(view.current_order, Some(standalone.order_id));
}

#[test]
fn client_details_can_be_maintained() {
    let ctx = ctx();
    let clients = ctx.clients();
    let client = clients.register_client("Market", "market@example.test", "daily", "").unwrap();

    clients.update_payment_history(client.client_id, "paid 2024-05").unwrap();
    clients.update_order_preferences(client.client_id, "twice weekly").unwrap();
    let view = clients
        .update_details(
            client.client_id,
            ClientDetails {
                name: Some("Market Hall".to_string()),
                contact_info: Some("hall@example.test".to_string()),
                ..ClientDetails::default()
            },
        )
        .unwrap();
    assert_eq!(view.name, "Market Hall");
    assert_eq!(view.payment_history, "paid 2024-05");
    assert_eq!(view.order_preferences, "twice weekly");
    assert_eq!(clients.clients_by_contact_info("hall@example.test").len(), 1);
    assert!(clients.clients_by_contact_info("market@example.test").is_empty());

    clients.remove_client(client.client_id).unwrap();
    assert!(clients.list().is_empty());
    assert!(matches!(
        clients.get(client.client_id).unwrap_err(),
        FulfillmentError::NotFound(_)
    ));
}
