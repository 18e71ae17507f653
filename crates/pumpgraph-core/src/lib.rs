//! pumpgraph-core: Shared types, configuration, and error handling for pumpgraph.
//!
//! This crate provides the foundational pieces used by the graph access layer
//! and the station handlers:
//! - Node entity types (PumpingStation, Profile, HourRate)
//! - Layered configuration loading
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use error::CoreError;
pub use types::{HourRate, NodeEntity, Profile, PumpingStation};
