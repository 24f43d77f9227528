use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fieldstock_core::{Aggregate, AggregateRoot, DomainError, typed_id};
use fieldstock_events::Event;
use fieldstock_orders::OrderId;

typed_id!(
    /// Client identifier.
    ClientId
);

/// Aggregate root: Client.
///
/// `current_order` is a single reference; assigning a new order replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    id: ClientId,
    name: String,
    contact_info: String,
    order_preferences: String,
    payment_history: String,
    current_order: Option<OrderId>,
    version: u64,
    created: bool,
    removed: bool,
}

impl Client {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ClientId) -> Self {
        Self {
            id,
            name: String::new(),
            contact_info: String::new(),
            order_preferences: String::new(),
            payment_history: String::new(),
            current_order: None,
            version: 0,
            created: false,
            removed: false,
        }
    }

    pub fn id_typed(&self) -> ClientId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contact_info(&self) -> &str {
        &self.contact_info
    }

    pub fn order_preferences(&self) -> &str {
        &self.order_preferences
    }

    pub fn payment_history(&self) -> &str {
        &self.payment_history
    }

    pub fn current_order(&self) -> Option<OrderId> {
        self.current_order
    }
}

impl AggregateRoot for Client {
    type Id = ClientId;

    const AGGREGATE_TYPE: &'static str = "clients.client";

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

/// Command: RegisterClient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterClient {
    pub client_id: ClientId,
    pub name: String,
    pub contact_info: String,
    pub order_preferences: String,
    pub payment_history: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateClientDetails. `None` keeps the existing value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateClientDetails {
    pub client_id: ClientId,
    pub name: Option<String>,
    pub contact_info: Option<String>,
    pub order_preferences: Option<String>,
    pub payment_history: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordPaymentHistory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPaymentHistory {
    pub client_id: ClientId,
    pub payment_history: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateOrderPreferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOrderPreferences {
    pub client_id: ClientId,
    pub order_preferences: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignOrder {
    pub client_id: ClientId,
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveClient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveClient {
    pub client_id: ClientId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientCommand {
    RegisterClient(RegisterClient),
    UpdateClientDetails(UpdateClientDetails),
    RecordPaymentHistory(RecordPaymentHistory),
    UpdateOrderPreferences(UpdateOrderPreferences),
    AssignOrder(AssignOrder),
    RemoveClient(RemoveClient),
}

/// Event: ClientRegistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRegistered {
    pub client_id: ClientId,
    pub name: String,
    pub contact_info: String,
    pub order_preferences: String,
    pub payment_history: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ClientDetailsUpdated (full snapshot of the editable fields).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDetailsUpdated {
    pub client_id: ClientId,
    pub name: String,
    pub contact_info: String,
    pub order_preferences: String,
    pub payment_history: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentHistoryRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentHistoryRecorded {
    pub client_id: ClientId,
    pub payment_history: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderPreferencesUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPreferencesUpdated {
    pub client_id: ClientId,
    pub order_preferences: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderAssigned. `replaced` is the previous order reference, now orphaned
/// from this client's view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAssigned {
    pub client_id: ClientId,
    pub order_id: OrderId,
    pub replaced: Option<OrderId>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ClientRemoved (tombstone).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRemoved {
    pub client_id: ClientId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientEvent {
    ClientRegistered(ClientRegistered),
    ClientDetailsUpdated(ClientDetailsUpdated),
    PaymentHistoryRecorded(PaymentHistoryRecorded),
    OrderPreferencesUpdated(OrderPreferencesUpdated),
    OrderAssigned(OrderAssigned),
    ClientRemoved(ClientRemoved),
}

impl Event for ClientEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ClientEvent::ClientRegistered(_) => "clients.client.registered",
            ClientEvent::ClientDetailsUpdated(_) => "clients.client.details_updated",
            ClientEvent::PaymentHistoryRecorded(_) => "clients.client.payment_history_recorded",
            ClientEvent::OrderPreferencesUpdated(_) => "clients.client.order_preferences_updated",
            ClientEvent::OrderAssigned(_) => "clients.client.order_assigned",
            ClientEvent::ClientRemoved(_) => "clients.client.removed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ClientEvent::ClientRegistered(e) => e.occurred_at,
            ClientEvent::ClientDetailsUpdated(e) => e.occurred_at,
            ClientEvent::PaymentHistoryRecorded(e) => e.occurred_at,
            ClientEvent::OrderPreferencesUpdated(e) => e.occurred_at,
            ClientEvent::OrderAssigned(e) => e.occurred_at,
            ClientEvent::ClientRemoved(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Client {
    type Command = ClientCommand;
    type Event = ClientEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ClientEvent::ClientRegistered(e) => {
                self.id = e.client_id;
                self.name = e.name.clone();
                self.contact_info = e.contact_info.clone();
                self.order_preferences = e.order_preferences.clone();
                self.payment_history = e.payment_history.clone();
                self.current_order = None;
                self.created = true;
            }
            ClientEvent::ClientDetailsUpdated(e) => {
                self.name = e.name.clone();
                self.contact_info = e.contact_info.clone();
                self.order_preferences = e.order_preferences.clone();
                self.payment_history = e.payment_history.clone();
            }
            ClientEvent::PaymentHistoryRecorded(e) => {
                self.payment_history = e.payment_history.clone();
            }
            ClientEvent::OrderPreferencesUpdated(e) => {
                self.order_preferences = e.order_preferences.clone();
            }
            ClientEvent::OrderAssigned(e) => {
                self.current_order = Some(e.order_id);
            }
            ClientEvent::ClientRemoved(_) => {
                self.removed = true;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ClientCommand::RegisterClient(cmd) => self.handle_register(cmd),
            ClientCommand::UpdateClientDetails(cmd) => self.handle_update(cmd),
            ClientCommand::RecordPaymentHistory(cmd) => self.handle_payment_history(cmd),
            ClientCommand::UpdateOrderPreferences(cmd) => self.handle_preferences(cmd),
            ClientCommand::AssignOrder(cmd) => self.handle_assign(cmd),
            ClientCommand::RemoveClient(cmd) => self.handle_remove(cmd),
        }
    }
}

impl Client {
    fn ensure_live(&self, client_id: ClientId) -> Result<(), DomainError> {
        if !self.exists() {
            return Err(DomainError::not_found("client"));
        }
        if self.id != client_id {
            return Err(DomainError::invariant("client_id mismatch"));
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterClient) -> Result<Vec<ClientEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("client already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::invalid_argument("name cannot be empty"));
        }

        Ok(vec![ClientEvent::ClientRegistered(ClientRegistered {
            client_id: cmd.client_id,
            name: cmd.name.trim().to_string(),
            contact_info: cmd.contact_info.clone(),
            order_preferences: cmd.order_preferences.clone(),
            payment_history: cmd.payment_history.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateClientDetails) -> Result<Vec<ClientEvent>, DomainError> {
        self.ensure_live(cmd.client_id)?;

        let name = cmd.name.clone().unwrap_or_else(|| self.name.clone());
        if name.trim().is_empty() {
            return Err(DomainError::invalid_argument("name cannot be empty"));
        }

        Ok(vec![ClientEvent::ClientDetailsUpdated(ClientDetailsUpdated {
            client_id: cmd.client_id,
            name: name.trim().to_string(),
            contact_info: cmd
                .contact_info
                .clone()
                .unwrap_or_else(|| self.contact_info.clone()),
            order_preferences: cmd
                .order_preferences
                .clone()
                .unwrap_or_else(|| self.order_preferences.clone()),
            payment_history: cmd
                .payment_history
                .clone()
                .unwrap_or_else(|| self.payment_history.clone()),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_payment_history(
        &self,
        cmd: &RecordPaymentHistory,
    ) -> Result<Vec<ClientEvent>, DomainError> {
        self.ensure_live(cmd.client_id)?;

        Ok(vec![ClientEvent::PaymentHistoryRecorded(PaymentHistoryRecorded {
            client_id: cmd.client_id,
            payment_history: cmd.payment_history.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_preferences(
        &self,
        cmd: &UpdateOrderPreferences,
    ) -> Result<Vec<ClientEvent>, DomainError> {
        self.ensure_live(cmd.client_id)?;

        Ok(vec![ClientEvent::OrderPreferencesUpdated(OrderPreferencesUpdated {
            client_id: cmd.client_id,
            order_preferences: cmd.order_preferences.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign(&self, cmd: &AssignOrder) -> Result<Vec<ClientEvent>, DomainError> {
        self.ensure_live(cmd.client_id)?;

        Ok(vec![ClientEvent::OrderAssigned(OrderAssigned {
            client_id: cmd.client_id,
            order_id: cmd.order_id,
            replaced: self.current_order.filter(|prior| *prior != cmd.order_id),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove(&self, cmd: &RemoveClient) -> Result<Vec<ClientEvent>, DomainError> {
        self.ensure_live(cmd.client_id)?;

        Ok(vec![ClientEvent::ClientRemoved(ClientRemoved {
            client_id: cmd.client_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered_client() -> Client {
        let client_id = ClientId::generate();
        let mut client = Client::empty(client_id);
        let events = client
            .handle(&ClientCommand::RegisterClient(RegisterClient {
                client_id,
                name: "  Green Grocer  ".to_string(),
                contact_info: "orders@greengrocer.test".to_string(),
                order_preferences: "weekly".to_string(),
                payment_history: String::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            client.apply(e);
        }
        client
    }

    fn assign(client: &Client, order_id: OrderId) -> Vec<ClientEvent> {
        client
            .handle(&ClientCommand::AssignOrder(AssignOrder {
                client_id: client.id_typed(),
                order_id,
                occurred_at: Utc::now(),
            }))
            .unwrap()
    }

    #[test]
    fn register_trims_the_name() {
        let client = registered_client();
        assert!(client.exists());
        assert_eq!(client.name(), "Green Grocer");
        assert_eq!(client.current_order(), None);
    }

    #[test]
    fn register_rejects_blank_name() {
        let client_id = ClientId::generate();
        let err = Client::empty(client_id)
            .handle(&ClientCommand::RegisterClient(RegisterClient {
                client_id,
                name: "   ".to_string(),
                contact_info: String::new(),
                order_preferences: String::new(),
                payment_history: String::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    #[test]
    fn update_keeps_fields_that_are_not_supplied() {
        let mut client = registered_client();
        let events = client
            .handle(&ClientCommand::UpdateClientDetails(UpdateClientDetails {
                client_id: client.id_typed(),
                name: None,
                contact_info: Some("555-0100".to_string()),
                order_preferences: None,
                payment_history: None,
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            client.apply(e);
        }

        assert_eq!(client.name(), "Green Grocer");
        assert_eq!(client.contact_info(), "555-0100");
        assert_eq!(client.order_preferences(), "weekly");
    }

    #[test]
    fn assigning_a_new_order_replaces_the_previous_one() {
        let mut client = registered_client();
        let first = OrderId::generate();
        let second = OrderId::generate();

        for e in &assign(&client, first) {
            client.apply(e);
        }
        let events = assign(&client, second);
        match &events[0] {
            ClientEvent::OrderAssigned(e) => assert_eq!(e.replaced, Some(first)),
            other => panic!("unexpected event {other:?}"),
        }
        for e in &events {
            client.apply(e);
        }
        assert_eq!(client.current_order(), Some(second));
    }

    #[test]
    fn removed_client_is_not_found() {
        let mut client = registered_client();
        let events = client
            .handle(&ClientCommand::RemoveClient(RemoveClient {
                client_id: client.id_typed(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            client.apply(e);
        }

        assert!(!client.exists());
        let err = client
            .handle(&ClientCommand::RecordPaymentHistory(RecordPaymentHistory {
                client_id: client.id_typed(),
                payment_history: "paid".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound("client")));
    }
}
