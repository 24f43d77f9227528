//! Inventory domain module (event-sourced).
//!
//! Business rules for inventory lots, implemented purely as deterministic
//! domain logic (no IO, no storage). The lot aggregate is the only place
//! where available quantity changes, so "never negative" is enforced here.

pub mod lot;

pub use lot::{
    InventoryLot, LotCommand, LotEvent, LotId, LotRegistered, QuantityReleased, QuantityReserved,
    ReceiveStock, RegisterLot, ReleaseQuantity, ReserveQuantity, StockReceived,
};
