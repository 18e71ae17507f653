//! pumpgraph-station: pumping station handlers over the graph access layer.
//!
//! Stations are written as whole trees (station, daily profiles, hourly
//! rates) with an embedding of the station name, and found again by id or
//! by free-text similarity.

pub mod config;
pub mod embed;
pub mod error;
pub mod handlers;
pub mod schema;

pub use config::{EmbedderConfig, Settings, StationConfig};
pub use embed::{Embedder, HttpEmbedder};
pub use error::{Result, StationError};
pub use handlers::StationService;
