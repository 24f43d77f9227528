//! ClientOrderFacade: client-facing ordering plus client administration.
//!
//! A client references a single current order. Placing a new order
//! overwrites that reference; the replaced order itself is untouched.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::instrument;

use fieldstock_clients::{
    AssignOrder, Client, ClientCommand, ClientId, RecordPaymentHistory, RegisterClient, RemoveClient,
    UpdateClientDetails, UpdateOrderPreferences,
};
use fieldstock_core::{DomainError, Quantity};
use fieldstock_infra::projections::{ClientView, OrderView};
use fieldstock_inventory::{InventoryLot, LotId};
use fieldstock_orders::{Order, OrderId};

use crate::context::FulfillmentContext;
use crate::error::{FulfillmentError, FulfillmentResult};
use crate::orders::create_in;

/// Partial update of a client's free-text details. `None` keeps the
/// current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientDetails {
    pub name: Option<String>,
    pub contact_info: Option<String>,
    pub order_preferences: Option<String>,
    pub payment_history: Option<String>,
}

pub struct ClientOrderFacade<'a> {
    ctx: &'a FulfillmentContext,
}

impl<'a> ClientOrderFacade<'a> {
    pub(crate) fn new(ctx: &'a FulfillmentContext) -> Self {
        Self { ctx }
    }

    /// Create an order for `client_id` that already holds its quantity, and
    /// make it the client's current order.
    ///
    /// The order stays `Pending`; the lot is debited exactly once, here.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn place_client_order(
        &self,
        client_id: ClientId,
        lot_id: LotId,
        quantity: Decimal,
    ) -> FulfillmentResult<OrderView> {
        let quantity = Quantity::positive(quantity)?;
        let order_id = OrderId::generate();
        self.ctx.dispatcher().transact(|tx| {
            let mut client = tx.load_existing(client_id, Client::empty)?;
            create_in(tx, order_id, lot_id, quantity, true)?;
            tx.execute(
                &mut client,
                ClientCommand::AssignOrder(AssignOrder {
                    client_id,
                    order_id,
                    occurred_at: Utc::now(),
                }),
            )?;
            Ok(())
        })?;

        tracing::info!(%client_id, %order_id, %lot_id, %quantity, "client order placed");
        self.ctx.orders().get(order_id)
    }

    /// Record that the order reached the client. No inventory effect.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn handle_delivery_receipt(&self, order_id: OrderId) -> FulfillmentResult<OrderView> {
        self.ctx.orders().mark_delivered(order_id)
    }

    #[instrument(skip(self), err(level = "warn"))]
    pub fn register_client(
        &self,
        name: &str,
        contact_info: &str,
        order_preferences: &str,
        payment_history: &str,
    ) -> FulfillmentResult<ClientView> {
        let client_id = ClientId::generate();
        self.ctx.dispatcher().dispatch(
            client_id,
            ClientCommand::RegisterClient(RegisterClient {
                client_id,
                name: name.to_string(),
                contact_info: contact_info.to_string(),
                order_preferences: order_preferences.to_string(),
                payment_history: payment_history.to_string(),
                occurred_at: Utc::now(),
            }),
            Client::empty,
        )?;

        tracing::info!(%client_id, "client registered");
        self.get(client_id)
    }

    #[instrument(skip(self), err(level = "warn"))]
    pub fn update_details(&self, client_id: ClientId, details: ClientDetails) -> FulfillmentResult<ClientView> {
        self.ctx.dispatcher().dispatch(
            client_id,
            ClientCommand::UpdateClientDetails(UpdateClientDetails {
                client_id,
                name: details.name,
                contact_info: details.contact_info,
                order_preferences: details.order_preferences,
                payment_history: details.payment_history,
                occurred_at: Utc::now(),
            }),
            Client::empty,
        )?;

        tracing::info!(%client_id, "client details updated");
        self.get(client_id)
    }

    #[instrument(skip(self), err(level = "warn"))]
    pub fn update_payment_history(&self, client_id: ClientId, payment_history: &str) -> FulfillmentResult<ClientView> {
        self.ctx.dispatcher().dispatch(
            client_id,
            ClientCommand::RecordPaymentHistory(RecordPaymentHistory {
                client_id,
                payment_history: payment_history.to_string(),
                occurred_at: Utc::now(),
            }),
            Client::empty,
        )?;
        self.get(client_id)
    }

    #[instrument(skip(self), err(level = "warn"))]
    pub fn update_order_preferences(&self, client_id: ClientId, order_preferences: &str) -> FulfillmentResult<ClientView> {
        self.ctx.dispatcher().dispatch(
            client_id,
            ClientCommand::UpdateOrderPreferences(UpdateOrderPreferences {
                client_id,
                order_preferences: order_preferences.to_string(),
                occurred_at: Utc::now(),
            }),
            Client::empty,
        )?;
        self.get(client_id)
    }

    /// Make an existing order the client's current order.
    ///
    /// The order's lot must still be able to supply the ordered quantity.
    /// This is an availability check only; nothing is reserved.
    #[instrument(skip(self), err(level = "warn"))]
    pub fn assign_existing_order(&self, client_id: ClientId, order_id: OrderId) -> FulfillmentResult<ClientView> {
        self.ctx.dispatcher().transact(|tx| {
            let mut client = tx.load_existing(client_id, Client::empty)?;
            let order = tx.load_existing(order_id, Order::empty)?;
            let lot = tx.load(order.lot_id(), InventoryLot::empty)?;
            if !lot.can_supply(order.quantity_ordered()) {
                return Err(DomainError::insufficient_stock(
                    order.lot_id().aggregate_id(),
                    order.quantity_ordered(),
                    lot.quantity(),
                )
                .into());
            }
            tx.execute(
                &mut client,
                ClientCommand::AssignOrder(AssignOrder {
                    client_id,
                    order_id,
                    occurred_at: Utc::now(),
                }),
            )?;
            Ok(())
        })?;

        tracing::info!(%client_id, %order_id, "order assigned to client");
        self.get(client_id)
    }

    #[instrument(skip(self), err(level = "warn"))]
    pub fn remove_client(&self, client_id: ClientId) -> FulfillmentResult<()> {
        self.ctx.dispatcher().dispatch(
            client_id,
            ClientCommand::RemoveClient(RemoveClient {
                client_id,
                occurred_at: Utc::now(),
            }),
            Client::empty,
        )?;

        tracing::info!(%client_id, "client removed");
        Ok(())
    }

    pub fn get(&self, client_id: ClientId) -> FulfillmentResult<ClientView> {
        self.ctx
            .read_models()
            .clients
            .get(&client_id)
            .ok_or_else(|| FulfillmentError::NotFound(format!("client {client_id}")))
    }

    pub fn list(&self) -> Vec<ClientView> {
        self.ctx.read_models().clients.list()
    }

    pub fn clients_by_contact_info(&self, contact_info: &str) -> Vec<ClientView> {
        self.ctx.read_models().clients.by_contact_info(contact_info)
    }
}
