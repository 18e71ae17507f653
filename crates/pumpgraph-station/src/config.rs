//! Configuration for the station handlers and the `pumpgraph` CLI.

use serde::Deserialize;

use pumpgraph_core::config as core_config;
use pumpgraph_graph::{GraphConfig, DEFAULT_CONNECTION};

use crate::error::Result;

/// Station handler settings, from the `[station]` section or
/// `PUMPGRAPH__STATION__*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct StationConfig {
    /// Name of the graph connection in `[graph.connections]`.
    #[serde(default = "default_connection")]
    pub connection: String,

    /// Vector-indexed predicate holding the station name embedding.
    #[serde(default = "default_embedding_predicate")]
    pub embedding_predicate: String,

    /// Results returned by a search when the caller gives no limit.
    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,
}

/// Embedding service endpoint, from the `[embedder]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbedderConfig {
    #[serde(default = "default_embedder_url")]
    pub url: String,

    #[serde(default = "default_embedder_timeout")]
    pub timeout_secs: u64,
}

fn default_connection() -> String {
    DEFAULT_CONNECTION.to_string()
}

fn default_embedding_predicate() -> String {
    "PumpingStation.embedding".to_string()
}

fn default_search_top_k() -> usize {
    3
}

fn default_embedder_url() -> String {
    "http://localhost:8000/embed".to_string()
}

fn default_embedder_timeout() -> u64 {
    30
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            connection: default_connection(),
            embedding_predicate: default_embedding_predicate(),
            search_top_k: default_search_top_k(),
        }
    }
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            url: default_embedder_url(),
            timeout_secs: default_embedder_timeout(),
        }
    }
}

/// Everything the CLI needs, loaded in one pass.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub graph: GraphConfig,
    pub embedder: EmbedderConfig,
    pub station: StationConfig,
}

impl Settings {
    /// Load `<file_prefix>.toml` (optional) layered under `PUMPGRAPH__`
    /// environment variables. Absent sections take their defaults.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = core_config::load(file_prefix)?;
        Ok(Self {
            graph: core_config::section(&cfg, "graph")?,
            embedder: core_config::section(&cfg, "embedder")?,
            station: core_config::section(&cfg, "station")?,
        })
    }
}
