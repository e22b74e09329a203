//! Error types for the irex-core library.
//!
//! Per-field extraction misses are not errors: they resolve to empty
//! defaults and are logged at debug level. `IrexError` covers the truly
//! fatal conditions around the extraction core - configuration loading,
//! file I/O, and serialization.

use thiserror::Error;

/// Main error type for the irex library.
#[derive(Error, Debug)]
pub enum IrexError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The document does not match the expected invoice format.
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for the irex library.
pub type Result<T> = std::result::Result<T, IrexError>;
