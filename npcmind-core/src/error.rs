//! Error types for the npcmind core library.

use thiserror::Error;

/// Top-level error type for agent state and memory operations.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A record (or its embedding) could not be committed to the store.
    ///
    /// Callers treat this as best-effort: the agent forgets the event and
    /// the simulation continues.
    #[error("Memory write failed: {0}")]
    MemoryWrite(String),

    /// Retrieval failed while assembling context.
    #[error("Memory read failed: {0}")]
    MemoryRead(String),

    /// The embedding provider could not produce a vector.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// SQLite journal error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, CoreError>;
