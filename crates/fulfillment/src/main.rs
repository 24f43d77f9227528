use rust_decimal::Decimal;

use fieldstock_fulfillment::{FulfillmentConfig, FulfillmentContext, FulfillmentError};

fn main() -> anyhow::Result<()> {
    fieldstock_observability::init();

    let config = FulfillmentConfig::from_env();
    let ctx = FulfillmentContext::in_memory(&config);

    let lot_id = ctx
        .inventory()
        .register_lot("carrots", "cold store A", Decimal::from(10))?;

    let order = ctx.orders().create(lot_id, Decimal::from(7))?;
    let order = ctx.orders().place(order.order_id)?;
    tracing::info!(
        order_id = %order.order_id,
        available = %ctx.inventory().get_lot(lot_id)?.quantity,
        "order placed"
    );

    ctx.orders().cancel(order.order_id)?;
    tracing::info!(
        available = %ctx.inventory().get_lot(lot_id)?.quantity,
        "order cancelled, reservation released"
    );

    let farm_id = ctx.farms().register_farm("North Field", "Valley Road 4")?;
    let crop = ctx.farms().register_crop("carrots", Some(farm_id), Some(lot_id))?;
    ctx.harvests().record(crop.crop_id, Decimal::from(4), 4)?;
    ctx.harvests().record(crop.crop_id, Decimal::from(6), 3)?;
    let average = ctx.yields().recompute(crop.crop_id)?;
    tracing::info!(crop_id = %crop.crop_id, ?average, "average yield refreshed");

    let client = ctx
        .clients()
        .register_client("Corner Grocer", "orders@cornergrocer.test", "weekly", "")?;
    let small_lot = ctx
        .inventory()
        .register_lot("leeks", "cold store B", Decimal::from(2))?;
    match ctx
        .clients()
        .place_client_order(client.client_id, small_lot, Decimal::from(5))
    {
        Err(FulfillmentError::InsufficientStock {
            requested, available, ..
        }) => {
            tracing::info!(%requested, %available, "oversized client order rejected");
        }
        Err(err) => return Err(err.into()),
        Ok(order) => anyhow::bail!("order {} should have been rejected", order.order_id),
    }

    let report = ctx.farms().delete_farm(farm_id)?;
    tracing::info!(
        crops = report.crops_removed,
        harvests = report.harvests_removed,
        "farm retired"
    );

    Ok(())
}
