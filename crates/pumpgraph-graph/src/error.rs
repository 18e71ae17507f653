//! Error types for graph access operations.

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Node type not registered: {node_type}")]
    NotFound { node_type: String },

    #[error("Duplicate relationship {predicate} on node type {node_type}")]
    DuplicateRelationship {
        node_type: String,
        predicate: String,
    },

    #[error("Node type registered twice: {node_type}")]
    DuplicateNodeType { node_type: String },

    #[error("Graph store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Graph store rejected request: {0}")]
    Store(String),

    #[error("Unknown graph connection: {name}")]
    UnknownConnection { name: String },

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl From<reqwest::Error> for GraphError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            GraphError::Deserialization(e.to_string())
        } else {
            GraphError::StoreUnavailable(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
