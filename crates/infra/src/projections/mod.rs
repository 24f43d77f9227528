//! Projection implementations (read model builders).
//!
//! Projections consume committed events and build the filtered lookups the
//! services query. All projections are:
//! - **Rebuildable**: can be reconstructed from the global event log
//! - **Idempotent**: per-stream cursors skip events already folded

pub mod clients;
pub mod crops;
pub mod cursor;
pub mod harvests;
pub mod lots;
pub mod orders;

use std::sync::Arc;

use thiserror::Error;

use fieldstock_events::{Projection, ProjectionError};

use crate::event_store::{EventStore, EventStoreError, InMemoryEventStore};

pub use clients::{ClientDirectoryProjection, ClientView};
pub use crops::{CropDirectoryProjection, CropView};
pub use cursor::StreamCursors;
pub use harvests::{HarvestLedgerProjection, HarvestView};
pub use lots::{LotCatalogProjection, LotView};
pub use orders::{OrderBookProjection, OrderView};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("projection {projection} failed: {source}")]
    Projection {
        projection: &'static str,
        #[source]
        source: ProjectionError,
    },
}

/// Every read model the fulfillment services query, shared by handle.
#[derive(Debug, Clone, Default)]
pub struct ReadModels {
    pub lots: Arc<LotCatalogProjection>,
    pub orders: Arc<OrderBookProjection>,
    pub harvests: Arc<HarvestLedgerProjection>,
    pub crops: Arc<CropDirectoryProjection>,
    pub clients: Arc<ClientDirectoryProjection>,
}

impl ReadModels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Arc<dyn Projection>> {
        vec![
            self.lots.clone() as Arc<dyn Projection>,
            self.orders.clone() as Arc<dyn Projection>,
            self.harvests.clone() as Arc<dyn Projection>,
            self.crops.clone() as Arc<dyn Projection>,
            self.clients.clone() as Arc<dyn Projection>,
        ]
    }

    /// Register every projection on `store` so appends keep them current.
    pub fn attach(&self, store: InMemoryEventStore) -> InMemoryEventStore {
        self.all()
            .into_iter()
            .fold(store, |store, projection| store.with_projection(projection))
    }

    /// Clear every read model and replay the whole log through it.
    pub fn rebuild<S: EventStore + ?Sized>(&self, store: &S) -> Result<u64, ReplayError> {
        let projections = self.all();
        for projection in &projections {
            projection.reset();
        }

        let mut replayed = 0u64;
        for stored in store.load_all()? {
            let envelope = stored.to_envelope();
            for projection in &projections {
                projection.apply(&envelope).map_err(|source| ReplayError::Projection {
                    projection: projection.name(),
                    source,
                })?;
            }
            replayed += 1;
        }

        tracing::info!(events = replayed, "read models rebuilt");
        Ok(replayed)
    }
}
