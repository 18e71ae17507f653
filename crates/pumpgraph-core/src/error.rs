use thiserror::Error;

/// Errors shared by every pumpgraph crate.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid {entity}: {reason}")]
    InvalidEntity { entity: String, reason: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
