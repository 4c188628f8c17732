//! Engine error type.
//!
//! Only startup can fail. Once an [`Engine`](crate::Engine) exists, every
//! decision cycle terminates with a valid decision and runtime failures
//! are reported through counters and logs instead.

use npcmind_core::CoreError;
use thiserror::Error;

/// Errors surfaced while configuring or constructing the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The configuration cannot produce a working engine.
    #[error("Misconfigured: {0}")]
    Misconfigured(String),

    /// Agent state or memory store error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// File system error (config file, log directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, EngineError>;
