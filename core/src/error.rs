//! Error types for tablesync

use thiserror::Error;

/// Result type used throughout tablesync
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors raised by the reconciliation engine and its collaborators
#[derive(Debug, Error)]
pub enum SyncError {
    /// Source or destination could not be read
    #[error("Failed to fetch '{table}' from '{connection}': {message}")]
    Fetch {
        table: String,
        connection: String,
        message: String,
    },

    /// Row index out of range for a copy, sync or delete
    #[error("Row index {index} is out of range for the {side} dataset ({len} rows)")]
    Index {
        side: &'static str,
        index: usize,
        len: usize,
    },

    /// Source and destination schemas diverge
    #[error("Column mismatch: {0}")]
    ColumnMismatch(String),

    /// The store rejected a changeset
    #[error("Commit to '{table}' rejected: {message}")]
    Persistence { table: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    pub fn fetch(table: &str, connection: &str, message: impl Into<String>) -> Self {
        Self::Fetch {
            table: table.to_string(),
            connection: connection.to_string(),
            message: message.into(),
        }
    }

    pub fn index(side: &'static str, index: usize, len: usize) -> Self {
        Self::Index { side, index, len }
    }

    pub fn column_mismatch(message: impl Into<String>) -> Self {
        Self::ColumnMismatch(message.into())
    }

    pub fn persistence(table: &str, message: impl Into<String>) -> Self {
        Self::Persistence {
            table: table.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Whether the error came from reading a dataset
    pub fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }
}
