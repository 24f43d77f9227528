//! Clients domain module (event-sourced).
//!
//! A client carries free-text contact and preference details and a reference
//! to the single order it is currently associated with.

pub mod client;

pub use client::{
    AssignOrder, Client, ClientCommand, ClientDetailsUpdated, ClientEvent, ClientId,
    ClientRegistered, ClientRemoved, OrderAssigned, OrderPreferencesUpdated, PaymentHistoryRecorded,
    RecordPaymentHistory, RegisterClient, RemoveClient, UpdateClientDetails, UpdateOrderPreferences,
};
