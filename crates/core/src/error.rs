//! Error types for the linkage engine

use thiserror::Error;

/// Linkage engine errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Name processing error: {0}")]
    Names(#[from] geolink_names::Error),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;
