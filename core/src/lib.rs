//! # tablesync-core
//!
//! Core library for tablesync - reconciles one table between a source and a
//! destination database. Rows are matched by their unique-key columns, copied,
//! merged or field-synced into the destination, and the resulting changeset is
//! committed back to the destination store.
//!
//! This crate provides the engine and a DuckDB-backed store that can be used by
//! different interfaces (CLI, services, etc.).

pub mod commit;
pub mod config;
pub mod database;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod format;
pub mod matcher;
pub mod store;

// Re-export the most commonly used types for convenience
pub use commit::{CommitCoordinator, CommitOutcome};
pub use config::Config;
pub use database::{ConnectionSpec, TableDescriptor};
pub use dataset::{Changeset, Column, Dataset, Row, RowState, Value, ValueType};
pub use engine::{MergeSummary, ReconciliationSession, RowView, Side};
pub use error::{Result, SyncError};
pub use format::{format_binary, ValueFormatter, DEFAULT_BINARY_PREVIEW};
pub use matcher::RowMatcher;
pub use store::{ChangePersister, DataFetcher, DuckDbStore};
