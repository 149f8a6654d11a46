// Opsvault: Top-level error types
//
// Aggregates errors from the crypto, store and config modules into a single
// error enum for the application boundary.

use thiserror::Error;

/// Top-level error type for all opsvault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("Key error: {0}")]
    Key(#[from] crate::crypto::KeyError),

    #[error("{0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, VaultError>;
