//! DuckDB-backed fetch and persistence.
//!
//! Each call opens an in-memory DuckDB connection and ATTACHes the target
//! database, so the same code path serves MySQL, PostgreSQL, SQLite and DuckDB
//! files.

use super::{ChangePersister, DataFetcher};
use crate::config::TableOverrides;
use crate::database::{quote_identifier, ConnectionSpec, TableDescriptor};
use crate::dataset::{Changeset, Column, Dataset, Row, RowState, Value};
use crate::error::{Result, SyncError};
use chrono::{DateTime, NaiveDate};
use duckdb::types::{TimeUnit, Value as DuckValue};
use duckdb::{params, params_from_iter, Connection};
use log::{debug, info};

const ATTACH_ALIAS: &str = "tablesync_target";

/// Fetches and commits through DuckDB's ATTACH support
#[derive(Debug, Clone, Default)]
pub struct DuckDbStore;

impl DuckDbStore {
    pub fn new() -> Self {
        Self
    }

    fn open(connection: &ConnectionSpec) -> Result<Connection> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("SET enable_progress_bar=false;")?;
        conn.execute_batch(&connection.create_attach_statement(ATTACH_ALIAS)?)?;
        Ok(conn)
    }

    fn read_dataset(
        conn: &Connection,
        table: &TableDescriptor,
        connection: &ConnectionSpec,
    ) -> Result<Dataset> {
        let default_schema = connection.default_schema();
        let schema = table.schema_or(&default_schema);

        let mut columns = read_columns(conn, schema, &table.name)?;
        if columns.is_empty() {
            return Err(SyncError::fetch(
                &table.full_name,
                &connection.name,
                "table not found or has no columns",
            ));
        }
        apply_key_constraints(conn, schema, &table.name, &mut columns)?;
        apply_overrides(&mut columns, &table.overrides)?;

        let column_list = columns
            .iter()
            .map(|c| quote_identifier(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let order_by = columns
            .iter()
            .filter(|c| c.is_unique_key)
            .map(|c| quote_identifier(&c.name))
            .collect::<Vec<_>>();
        let mut sql = format!(
            "SELECT {column_list} FROM {}",
            table.qualified_name(ATTACH_ALIAS, &default_schema)
        );
        if !order_by.is_empty() {
            sql.push_str(&format!(" ORDER BY {}", order_by.join(", ")));
        }

        let width = columns.len();
        let mut dataset = Dataset::new(columns)?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(from_duck_value(row.get::<usize, DuckValue>(i)?));
            }
            Ok(values)
        })?;
        for row in rows {
            dataset.push_row(row?)?;
        }
        Ok(dataset)
    }

    fn write_changeset(
        conn: &mut Connection,
        connection: &ConnectionSpec,
        changeset: &Changeset,
    ) -> Result<()> {
        let table = TableDescriptor::parse(&changeset.table);
        let target = table.qualified_name(ATTACH_ALIAS, &connection.default_schema());
        let columns = &changeset.columns;
        let keys: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_unique_key)
            .map(|(i, _)| i)
            .collect();
        let key_filter = keys
            .iter()
            .map(|&k| format!("{} IS NOT DISTINCT FROM ?", quote_identifier(&columns[k].name)))
            .collect::<Vec<_>>()
            .join(" AND ");

        let tx = conn.transaction()?;

        // Deletes first so re-inserted keys do not collide
        let ordered = [RowState::Deleted, RowState::Modified, RowState::Added];
        for state in ordered {
            for row in changeset.rows.iter().filter(|r| r.state() == state) {
                match state {
                    RowState::Deleted => {
                        require_keys(&keys, &changeset.table)?;
                        let sql = format!("DELETE FROM {target} WHERE {key_filter}");
                        let affected = tx.execute(&sql, params_from_iter(key_values(&keys, row)))?;
                        if affected == 0 {
                            return Err(SyncError::persistence(
                                &changeset.table,
                                "a deleted row no longer exists in the store",
                            ));
                        }
                    }
                    RowState::Modified => {
                        require_keys(&keys, &changeset.table)?;
                        let updated =
                            match update_row(&tx, &target, &key_filter, columns, &keys, row)? {
                                Some(affected) => affected > 0,
                                None => row_exists(&tx, &target, &key_filter, &keys, row)?,
                            };
                        if !updated {
                            return Err(SyncError::persistence(
                                &changeset.table,
                                "a modified row no longer exists in the store",
                            ));
                        }
                    }
                    RowState::Added => {
                        // Re-pushing a row whose key already exists updates it in place
                        let has_key =
                            !keys.is_empty() && keys.iter().all(|&k| !row.values()[k].is_null());
                        if has_key {
                            let stored =
                                match update_row(&tx, &target, &key_filter, columns, &keys, row)? {
                                    Some(affected) => affected > 0,
                                    None => row_exists(&tx, &target, &key_filter, &keys, row)?,
                                };
                            if stored {
                                continue;
                            }
                        }
                        let inserted: Vec<usize> = (0..columns.len())
                            .filter(|&i| {
                                let column = &columns[i];
                                !column.is_read_only
                                    && !(column.is_auto_generated && row.values()[i].is_null())
                            })
                            .collect();
                        let sql = if inserted.is_empty() {
                            format!("INSERT INTO {target} DEFAULT VALUES")
                        } else {
                            format!(
                                "INSERT INTO {target} ({}) VALUES ({})",
                                inserted
                                    .iter()
                                    .map(|&i| quote_identifier(&columns[i].name))
                                    .collect::<Vec<_>>()
                                    .join(", "),
                                vec!["?"; inserted.len()].join(", ")
                            )
                        };
                        let values: Vec<DuckValue> = inserted
                            .iter()
                            .map(|&i| to_duck_value(&row.values()[i]))
                            .collect();
                        tx.execute(&sql, params_from_iter(values))?;
                    }
                    RowState::Unchanged => {}
                }
            }
        }

        tx.commit()?;
        Ok(())
    }
}

impl DataFetcher for DuckDbStore {
    fn load(&self, table: &TableDescriptor, connection: &ConnectionSpec) -> Result<Dataset> {
        debug!("Loading {} from {}", table, connection);
        let result = Self::open(connection)
            .and_then(|conn| Self::read_dataset(&conn, table, connection));
        match result {
            Ok(dataset) => {
                info!(
                    "Loaded {} rows of {} from '{}'",
                    dataset.len(),
                    table,
                    connection.name
                );
                Ok(dataset)
            }
            Err(e @ SyncError::Fetch { .. }) => Err(e),
            Err(e) => Err(SyncError::fetch(
                &table.full_name,
                &connection.name,
                e.to_string(),
            )),
        }
    }
}

impl ChangePersister for DuckDbStore {
    fn commit(&self, connection: &ConnectionSpec, changeset: &Changeset) -> Result<()> {
        debug!(
            "Committing {} rows to {} on '{}'",
            changeset.len(),
            changeset.table,
            connection.name
        );
        let result = Self::open(connection)
            .and_then(|mut conn| Self::write_changeset(&mut conn, connection, changeset));
        match result {
            Ok(()) => Ok(()),
            Err(e @ SyncError::Persistence { .. }) => Err(e),
            Err(e) => Err(SyncError::persistence(&changeset.table, e.to_string())),
        }
    }
}

/// Update the non-key columns of the stored row; `None` when there is nothing to set
fn update_row(
    conn: &Connection,
    target: &str,
    key_filter: &str,
    columns: &[Column],
    keys: &[usize],
    row: &Row,
) -> Result<Option<usize>> {
    let writable: Vec<usize> = (0..columns.len())
        .filter(|&i| !columns[i].is_unique_key && !columns[i].is_read_only)
        .collect();
    if writable.is_empty() {
        return Ok(None);
    }
    let assignments = writable
        .iter()
        .map(|&i| format!("{} = ?", quote_identifier(&columns[i].name)))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("UPDATE {target} SET {assignments} WHERE {key_filter}");
    let mut values: Vec<DuckValue> = writable
        .iter()
        .map(|&i| to_duck_value(&row.values()[i]))
        .collect();
    values.extend(key_values(keys, row));
    Ok(Some(conn.execute(&sql, params_from_iter(values))?))
}

fn row_exists(
    conn: &Connection,
    target: &str,
    key_filter: &str,
    keys: &[usize],
    row: &Row,
) -> Result<bool> {
    let sql = format!("SELECT COUNT(*) FROM {target} WHERE {key_filter}");
    let count: i64 = conn.query_row(&sql, params_from_iter(key_values(keys, row)), |r| r.get(0))?;
    Ok(count > 0)
}

fn require_keys(keys: &[usize], table: &str) -> Result<()> {
    if keys.is_empty() {
        return Err(SyncError::persistence(
            table,
            "rows cannot be addressed without key columns",
        ));
    }
    Ok(())
}

/// Key values identifying the stored row
fn key_values(keys: &[usize], row: &Row) -> Vec<DuckValue> {
    keys.iter()
        .map(|&k| to_duck_value(&row.stored_values()[k]))
        .collect()
}

fn read_columns(conn: &Connection, schema: &str, table: &str) -> Result<Vec<Column>> {
    let mut stmt = conn.prepare(
        "SELECT column_name, data_type, column_default FROM duckdb_columns() \
         WHERE database_name = ? AND schema_name = ? AND table_name = ? \
         ORDER BY column_index",
    )?;
    let rows = stmt.query_map(params![ATTACH_ALIAS, schema, table], |row| {
        let name: String = row.get(0)?;
        let data_type: String = row.get(1)?;
        let default: Option<String> = row.get(2)?;
        Ok((name, data_type, default))
    })?;

    let mut columns = Vec::new();
    for row in rows {
        let (name, data_type, default) = row?;
        let mut column = Column::from_data_type(name, data_type);
        if default
            .as_deref()
            .map(|d| d.trim_start().to_lowercase().starts_with("nextval("))
            .unwrap_or(false)
        {
            column.is_auto_generated = true;
        }
        columns.push(column);
    }
    Ok(columns)
}

/// Flag the primary key columns, or the first unique constraint when there is no primary key
fn apply_key_constraints(
    conn: &Connection,
    schema: &str,
    table: &str,
    columns: &mut [Column],
) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT constraint_index, constraint_type, UNNEST(constraint_column_names) \
         FROM duckdb_constraints() \
         WHERE database_name = ? AND schema_name = ? AND table_name = ? \
         AND constraint_type IN ('PRIMARY KEY', 'UNIQUE') \
         ORDER BY constraint_index",
    )?;
    let rows = stmt.query_map(params![ATTACH_ALIAS, schema, table], |row| {
        let index: i64 = row.get(0)?;
        let kind: String = row.get(1)?;
        let column: String = row.get(2)?;
        Ok((index, kind, column))
    })?;

    let mut primary = Vec::new();
    let mut first_unique: Option<(i64, Vec<String>)> = None;
    for row in rows {
        let (index, kind, column) = row?;
        if kind == "PRIMARY KEY" {
            primary.push(column);
        } else {
            match &mut first_unique {
                None => first_unique = Some((index, vec![column])),
                Some((first, cols)) if *first == index => cols.push(column),
                Some(_) => {}
            }
        }
    }

    let key = if primary.is_empty() {
        first_unique.map(|(_, cols)| cols).unwrap_or_default()
    } else {
        primary
    };
    for column in columns.iter_mut() {
        column.is_unique_key = key.contains(&column.name);
    }
    Ok(())
}

fn apply_overrides(columns: &mut [Column], overrides: &TableOverrides) -> Result<()> {
    let known = |names: &[String]| -> Result<()> {
        for name in names {
            if !columns.iter().any(|c| &c.name == name) {
                return Err(SyncError::invalid_input(format!(
                    "Override names unknown column '{name}'"
                )));
            }
        }
        Ok(())
    };
    if let Some(keys) = &overrides.key_columns {
        known(keys)?;
    }
    if let Some(generated) = &overrides.auto_generated_columns {
        known(generated)?;
    }
    known(&overrides.read_only_columns)?;

    for column in columns.iter_mut() {
        if let Some(keys) = &overrides.key_columns {
            column.is_unique_key = keys.contains(&column.name);
        }
        if let Some(generated) = &overrides.auto_generated_columns {
            column.is_auto_generated = generated.contains(&column.name);
        }
        if overrides.read_only_columns.contains(&column.name) {
            column.is_read_only = true;
        }
    }
    Ok(())
}

fn timestamp_to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

/// Convert a DuckDB value into a cell value
fn from_duck_value(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Boolean(b),
        DuckValue::TinyInt(i) => Value::Integer(i as i64),
        DuckValue::SmallInt(i) => Value::Integer(i as i64),
        DuckValue::Int(i) => Value::Integer(i as i64),
        DuckValue::BigInt(i) => Value::Integer(i),
        DuckValue::UTinyInt(i) => Value::Integer(i as i64),
        DuckValue::USmallInt(i) => Value::Integer(i as i64),
        DuckValue::UInt(i) => Value::Integer(i as i64),
        DuckValue::UBigInt(i) => match i64::try_from(i) {
            Ok(v) => Value::Integer(v),
            Err(_) => Value::Text(i.to_string()),
        },
        DuckValue::HugeInt(i) => match i64::try_from(i) {
            Ok(v) => Value::Integer(v),
            Err(_) => Value::Text(i.to_string()),
        },
        DuckValue::Float(f) => Value::Float(f as f64),
        DuckValue::Double(f) => Value::Float(f),
        DuckValue::Decimal(d) => Value::Text(d.to_string()),
        DuckValue::Text(s) => Value::Text(s),
        DuckValue::Enum(s) => Value::Text(s),
        DuckValue::Blob(b) => Value::Blob(b),
        DuckValue::Timestamp(unit, v) => {
            match DateTime::from_timestamp_micros(timestamp_to_micros(unit, v)) {
                Some(ts) => Value::Timestamp(ts.naive_utc()),
                None => Value::Text(format!("Timestamp({v})")),
            }
        }
        DuckValue::Date32(days) => {
            // Days since 1970-01-01
            match days
                .checked_add(719_163)
                .and_then(NaiveDate::from_num_days_from_ce_opt)
            {
                Some(date) => Value::Text(date.format("%Y-%m-%d").to_string()),
                None => Value::Text(format!("Date({days})")),
            }
        }
        other => Value::Text(format!("{other:?}")),
    }
}

/// Convert a cell value into a bindable DuckDB value
fn to_duck_value(value: &Value) -> DuckValue {
    match value {
        Value::Null => DuckValue::Null,
        Value::Boolean(b) => DuckValue::Boolean(*b),
        Value::Integer(i) => DuckValue::BigInt(*i),
        Value::Float(f) => DuckValue::Double(*f),
        Value::Text(s) => DuckValue::Text(s.clone()),
        Value::Blob(b) => DuckValue::Blob(b.clone()),
        // Bound as text; the store casts it back to its timestamp type
        Value::Timestamp(ts) => DuckValue::Text(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
    }
}
