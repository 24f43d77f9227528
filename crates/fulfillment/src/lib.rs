//! Fulfillment services for the farm produce core.
//!
//! Every operation that touches more than one aggregate (an order and its
//! lot, a harvest with its lot and crop, a client with its order) runs as a
//! single unit of work: either all of its events are committed or none are.
//! Lookups are served from read models kept current by the event store.

pub mod clients;
pub mod context;
pub mod error;
pub mod farms;
pub mod harvests;
pub mod inventory;
pub mod orders;
pub mod yields;

pub use clients::{ClientDetails, ClientOrderFacade};
pub use context::FulfillmentContext;
pub use error::{FulfillmentError, FulfillmentResult};
pub use farms::{CascadeReport, FarmRegistry};
pub use harvests::HarvestRecorder;
pub use inventory::InventoryLedger;
pub use orders::OrderLifecycle;
pub use yields::YieldAggregator;

pub use fieldstock_infra::config::FulfillmentConfig;
pub use fieldstock_infra::projections::{ClientView, CropView, HarvestView, LotView, OrderView};
