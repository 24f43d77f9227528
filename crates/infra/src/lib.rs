//! Infrastructure layer: event store, command dispatch, read models, config.

pub mod command_dispatcher;
pub mod config;
pub mod event_store;
pub mod projections;
pub mod read_model;
