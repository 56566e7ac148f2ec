//! Error types for itdept
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can surface from the itdept library
#[derive(Debug, Error)]
pub enum ItDeptError {
    /// No snapshot stored under this session id
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Operation not allowed in the run's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("Config error: {0}")]
    Config(String),

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// LLM provider error
    #[error("LLM error: {0}")]
    Llm(String),

    /// Tool execution error
    #[error("Tool error: {0}")]
    Tool(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQLite index error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type alias for itdept operations
pub type Result<T> = std::result::Result<T, ItDeptError>;
