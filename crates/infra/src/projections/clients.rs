use serde_json::Value as JsonValue;

use fieldstock_clients::{Client, ClientEvent, ClientId};
use fieldstock_core::{AggregateRoot, Entity};
use fieldstock_events::{EventEnvelope, Projection, ProjectionError};
use fieldstock_orders::OrderId;

use crate::projections::cursor::{StreamCursors, decode};
use crate::read_model::{InMemoryReadStore, ReadStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientView {
    pub client_id: ClientId,
    pub name: String,
    pub contact_info: String,
    pub order_preferences: String,
    pub payment_history: String,
    pub current_order: Option<OrderId>,
}

impl Entity for ClientView {
    type Id = ClientId;

    fn id(&self) -> &ClientId {
        &self.client_id
    }
}

#[derive(Debug, Default)]
pub struct ClientDirectoryProjection {
    rows: InMemoryReadStore<ClientView>,
    cursors: StreamCursors,
}

impl ClientDirectoryProjection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, client_id: &ClientId) -> Option<ClientView> {
        self.rows.get(client_id)
    }

    pub fn list(&self) -> Vec<ClientView> {
        self.rows.list()
    }

    /// Exact match on the stored contact string.
    pub fn by_contact_info(&self, contact_info: &str) -> Vec<ClientView> {
        self.rows.filter(&|c: &ClientView| c.contact_info == contact_info)
    }

    fn row(&self, client_id: ClientId) -> Result<ClientView, ProjectionError> {
        self.rows.get(&client_id).ok_or(ProjectionError::UnknownEntity {
            entity: "client",
            aggregate_id: client_id.aggregate_id(),
        })
    }

    fn fold(&self, ev: ClientEvent) -> Result<(), ProjectionError> {
        match ev {
            ClientEvent::ClientRegistered(e) => self.rows.upsert(ClientView {
                client_id: e.client_id,
                name: e.name,
                contact_info: e.contact_info,
                order_preferences: e.order_preferences,
                payment_history: e.payment_history,
                current_order: None,
            }),
            ClientEvent::ClientDetailsUpdated(e) => {
                let mut row = self.row(e.client_id)?;
                row.name = e.name;
                row.contact_info = e.contact_info;
                row.order_preferences = e.order_preferences;
                row.payment_history = e.payment_history;
                self.rows.upsert(row);
            }
            ClientEvent::PaymentHistoryRecorded(e) => {
                let mut row = self.row(e.client_id)?;
                row.payment_history = e.payment_history;
                self.rows.upsert(row);
            }
            ClientEvent::OrderPreferencesUpdated(e) => {
                let mut row = self.row(e.client_id)?;
                row.order_preferences = e.order_preferences;
                self.rows.upsert(row);
            }
            ClientEvent::OrderAssigned(e) => {
                let mut row = self.row(e.client_id)?;
                row.current_order = Some(e.order_id);
                self.rows.upsert(row);
            }
            ClientEvent::ClientRemoved(e) => {
                self.rows.remove(&e.client_id);
            }
        }
        Ok(())
    }
}

impl Projection for ClientDirectoryProjection {
    fn name(&self) -> &'static str {
        "clients.directory"
    }

    fn apply(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != Client::AGGREGATE_TYPE {
            return Ok(());
        }
        if !self.cursors.is_next(envelope)? {
            return Ok(());
        }

        self.fold(decode(envelope)?)?;
        self.cursors.advance(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }

    fn reset(&self) {
        self.rows.clear();
        self.cursors.clear();
    }
}
