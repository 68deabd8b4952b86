//! Error handling for the driftlab CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Debug, Error)]
pub enum CliError {
    #[error("router error: {0}")]
    Router(#[from] driftlab_router::RouterError),

    #[error("client error: {0}")]
    Client(#[from] driftlab_client::ClientError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
