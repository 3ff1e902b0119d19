//! Common error types for XVAL

use thiserror::Error;

/// Common result type for XVAL operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across XVAL crates
///
/// The engine itself never fails on bad facet data; these errors only
/// surface at the edges (configuration files, CLI input/output).
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
