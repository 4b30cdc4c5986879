//! Common test utilities and fixtures

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tablesync_core::{
    ChangePersister, Changeset, Column, ConnectionSpec, DataFetcher, Dataset, Result, RowState,
    SyncError, TableDescriptor, Value, ValueType,
};

/// Rows held for one connection
#[derive(Debug, Clone)]
struct StoredTable {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
}

/// In-memory fetch/persist collaborator keyed by connection name
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, StoredTable>>,
    failing_fetches: Mutex<HashSet<String>>,
    fail_commits: AtomicBool,
    commits: Mutex<Vec<Changeset>>,
    loads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, connection: &str, columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        self.tables
            .lock()
            .unwrap()
            .insert(connection.to_string(), StoredTable { columns, rows });
        self
    }

    pub fn fail_fetches_from(&self, connection: &str) {
        self.failing_fetches
            .lock()
            .unwrap()
            .insert(connection.to_string());
    }

    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn commits(&self) -> Vec<Changeset> {
        self.commits.lock().unwrap().clone()
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn stored_rows(&self, connection: &str) -> Vec<Vec<Value>> {
        self.tables.lock().unwrap()[connection].rows.clone()
    }
}

fn key_of(columns: &[Column], values: &[Value]) -> Vec<Value> {
    columns
        .iter()
        .zip(values)
        .filter(|(c, _)| c.is_unique_key)
        .map(|(_, v)| v.clone())
        .collect()
}

impl DataFetcher for MemoryStore {
    fn load(&self, table: &TableDescriptor, connection: &ConnectionSpec) -> Result<Dataset> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.failing_fetches.lock().unwrap().contains(&connection.name) {
            return Err(SyncError::fetch(
                &table.full_name,
                &connection.name,
                "connection refused",
            ));
        }
        let tables = self.tables.lock().unwrap();
        let stored = tables.get(&connection.name).ok_or_else(|| {
            SyncError::fetch(&table.full_name, &connection.name, "no such table")
        })?;
        let mut dataset = Dataset::new(stored.columns.clone())?;
        for row in &stored.rows {
            dataset.push_row(row.clone())?;
        }
        Ok(dataset)
    }
}

impl ChangePersister for MemoryStore {
    fn commit(&self, connection: &ConnectionSpec, changeset: &Changeset) -> Result<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(SyncError::persistence(&changeset.table, "store unavailable"));
        }
        let mut tables = self.tables.lock().unwrap();
        let stored = tables
            .get_mut(&connection.name)
            .ok_or_else(|| SyncError::persistence(&changeset.table, "no such table"))?;
        let columns = changeset.columns.clone();

        for row in &changeset.rows {
            let stored_key = key_of(&columns, row.stored_values());
            let existing = stored
                .rows
                .iter()
                .position(|r| !stored_key.is_empty() && key_of(&columns, r) == stored_key);
            match (row.state(), existing) {
                (RowState::Deleted, Some(i)) => {
                    stored.rows.remove(i);
                }
                (RowState::Modified, Some(i)) | (RowState::Added, Some(i)) => {
                    stored.rows[i] = row.values().to_vec();
                }
                (RowState::Added, None) => {
                    let mut values = row.values().to_vec();
                    // Assign generated keys the way a sequence would
                    for (c, column) in columns.iter().enumerate() {
                        if column.is_auto_generated && values[c].is_null() {
                            let next = stored
                                .rows
                                .iter()
                                .filter_map(|r| match r[c] {
                                    Value::Integer(n) => Some(n),
                                    _ => None,
                                })
                                .max()
                                .unwrap_or(0)
                                + 1;
                            values[c] = Value::Integer(next);
                        }
                    }
                    stored.rows.push(values);
                }
                (state, None) => {
                    return Err(SyncError::persistence(
                        &changeset.table,
                        format!("{state} row not found"),
                    ))
                }
                (RowState::Unchanged, Some(_)) => {}
            }
        }

        self.commits.lock().unwrap().push(changeset.clone());
        Ok(())
    }
}

/// `id` (generated key) and `name` columns
pub fn people_columns() -> Vec<Column> {
    vec![
        Column::new("id", ValueType::Scalar).unique_key().auto_generated(),
        Column::new("name", ValueType::Scalar),
    ]
}

pub fn person(id: i64, name: &str) -> Vec<Value> {
    vec![Value::Integer(id), Value::from(name)]
}

pub fn source_conn() -> ConnectionSpec {
    ConnectionSpec::duckdb_file("source", "source.duckdb")
}

pub fn dest_conn() -> ConnectionSpec {
    ConnectionSpec::duckdb_file("destination", "destination.duckdb")
}

pub fn people_table() -> TableDescriptor {
    TableDescriptor::parse("main.people")
}
