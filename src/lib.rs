//! Order mutation and consistency engine.
//!
//! Creates, updates and deletes food orders against an [`store::OrderStore`],
//! keeps each order's total equal to the sum of its stored items, and emits
//! best-effort notifications through [`messaging::EventPublisher`].

pub mod api;
pub mod config;
pub mod domain;
pub mod messaging;
pub mod metrics;
pub mod models;
pub mod store;
pub mod telemetry;
pub mod utils;
