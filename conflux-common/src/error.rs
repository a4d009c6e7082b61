//! Common error types for Conflux

use thiserror::Error;

/// Common result type for Conflux operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Conflux crates
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Explicitly named config file does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}
