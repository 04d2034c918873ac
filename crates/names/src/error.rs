//! Error types for name processing

use thiserror::Error;

/// Name processing errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lexicon parse error: {0}")]
    LexiconParse(#[from] toml::de::Error),

    #[error("Invalid lexicon: {0}")]
    InvalidLexicon(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for name operations
pub type Result<T> = std::result::Result<T, Error>;
