use crate::database::{ConnectionSpec, TableDescriptor};
use crate::dataset::{Changeset, Dataset};
use crate::error::Result;

/// Reads a table snapshot from a connection
pub trait DataFetcher: Send + Sync {
    /// Load the whole table. Never returns a partial dataset.
    fn load(&self, table: &TableDescriptor, connection: &ConnectionSpec) -> Result<Dataset>;
}

/// Writes a changeset back to a connection
pub trait ChangePersister: Send + Sync {
    /// Apply every row of the changeset, or none of them
    fn commit(&self, connection: &ConnectionSpec, changeset: &Changeset) -> Result<()>;
}

impl<T: DataFetcher + ?Sized> DataFetcher for &T {
    fn load(&self, table: &TableDescriptor, connection: &ConnectionSpec) -> Result<Dataset> {
        (**self).load(table, connection)
    }
}

impl<T: ChangePersister + ?Sized> ChangePersister for &T {
    fn commit(&self, connection: &ConnectionSpec, changeset: &Changeset) -> Result<()> {
        (**self).commit(connection, changeset)
    }
}

pub mod duckdb_store;

pub use duckdb_store::DuckDbStore;
