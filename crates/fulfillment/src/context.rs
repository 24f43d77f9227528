//! Wiring of the in-memory store, bus, dispatcher and read models.

use std::sync::Arc;

use serde_json::Value as JsonValue;

use fieldstock_events::{EventEnvelope, InMemoryEventBus};
use fieldstock_infra::command_dispatcher::CommandDispatcher;
use fieldstock_infra::config::FulfillmentConfig;
use fieldstock_infra::event_store::InMemoryEventStore;
use fieldstock_infra::projections::ReadModels;

use crate::clients::ClientOrderFacade;
use crate::farms::FarmRegistry;
use crate::harvests::HarvestRecorder;
use crate::inventory::InventoryLedger;
use crate::orders::OrderLifecycle;
use crate::yields::YieldAggregator;

pub type Store = Arc<InMemoryEventStore>;
pub type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type Dispatcher = CommandDispatcher<Store, Bus>;

/// Shared handle to everything the services need. Cheap to clone and safe to
/// move across threads.
#[derive(Debug, Clone)]
pub struct FulfillmentContext {
    dispatcher: Arc<Dispatcher>,
    read_models: ReadModels,
}

impl FulfillmentContext {
    /// In-memory wiring: every read model is attached to the store so lookups
    /// reflect each commit as soon as it returns.
    pub fn in_memory(config: &FulfillmentConfig) -> Self {
        let read_models = ReadModels::new();
        let store: Store = Arc::new(read_models.attach(InMemoryEventStore::new()));
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let dispatcher = Arc::new(CommandDispatcher::from_config(store, bus, config));

        tracing::info!(
            max_commit_attempts = config.max_commit_attempts,
            event_bus_enabled = config.event_bus_enabled,
            "fulfillment context ready"
        );

        Self {
            dispatcher,
            read_models,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn read_models(&self) -> &ReadModels {
        &self.read_models
    }

    pub fn bus(&self) -> &Bus {
        self.dispatcher.bus()
    }

    pub fn inventory(&self) -> InventoryLedger<'_> {
        InventoryLedger::new(self)
    }

    pub fn harvests(&self) -> HarvestRecorder<'_> {
        HarvestRecorder::new(self)
    }

    pub fn yields(&self) -> YieldAggregator<'_> {
        YieldAggregator::new(self)
    }

    pub fn orders(&self) -> OrderLifecycle<'_> {
        OrderLifecycle::new(self)
    }

    pub fn clients(&self) -> ClientOrderFacade<'_> {
        ClientOrderFacade::new(self)
    }

    pub fn farms(&self) -> FarmRegistry<'_> {
        FarmRegistry::new(self)
    }
}
