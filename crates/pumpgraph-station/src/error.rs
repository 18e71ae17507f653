//! Error types for the pumpgraph-station crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StationError {
    #[error("Graph error: {0}")]
    Graph(#[from] pumpgraph_graph::GraphError),

    #[error("{0}")]
    Core(#[from] pumpgraph_core::CoreError),

    #[error("Embedding service error: {0}")]
    Embedding(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<reqwest::Error> for StationError {
    fn from(e: reqwest::Error) -> Self {
        StationError::Embedding(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StationError>;
