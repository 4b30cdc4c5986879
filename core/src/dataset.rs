//! In-memory table snapshots with per-row change tracking

use crate::error::{Result, SyncError};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Broad class of a column's values, used to pick a display treatment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Scalar,
    Binary,
    Other,
}

impl ValueType {
    /// Classify a store-declared type name such as `INTEGER` or `BLOB`
    pub fn from_data_type(data_type: &str) -> Self {
        let upper = data_type.trim().to_uppercase();
        if matches!(
            upper.as_str(),
            "BLOB" | "BYTEA" | "BINARY" | "VARBINARY" | "BIT" | "ROWVERSION"
        ) || upper.starts_with("VARBINARY(")
            || upper.starts_with("BINARY(")
        {
            ValueType::Binary
        } else if upper.ends_with("[]")
            || upper.starts_with("STRUCT")
            || upper.starts_with("MAP")
            || upper.starts_with("UNION")
            || upper.starts_with("LIST")
        {
            ValueType::Other
        } else {
            ValueType::Scalar
        }
    }
}

/// Column metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Type name as declared by the store, for display only
    pub data_type: String,
    pub value_type: ValueType,
    /// Participates in row identity matching
    pub is_unique_key: bool,
    /// Value assigned by the store on insert
    pub is_auto_generated: bool,
    pub is_read_only: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        let data_type = match value_type {
            ValueType::Scalar => "VARCHAR",
            ValueType::Binary => "BLOB",
            ValueType::Other => "UNKNOWN",
        };
        Self {
            name: name.into(),
            data_type: data_type.to_string(),
            value_type,
            is_unique_key: false,
            is_auto_generated: false,
            is_read_only: false,
        }
    }

    /// Build a column from its store-declared type name
    pub fn from_data_type(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        let data_type = data_type.into();
        Self {
            value_type: ValueType::from_data_type(&data_type),
            data_type,
            ..Self::new(name, ValueType::Scalar)
        }
    }

    pub fn unique_key(mut self) -> Self {
        self.is_unique_key = true;
        self
    }

    pub fn auto_generated(mut self) -> Self {
        self.is_auto_generated = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.is_read_only = true;
        self
    }

    /// A key column the store fills in on insert
    pub fn is_generated_key(&self) -> bool {
        self.is_unique_key && self.is_auto_generated
    }

    fn same_shape(&self, other: &Column) -> bool {
        self.name == other.name
            && self.value_type == other.value_type
            && self.is_unique_key == other.is_unique_key
            && self.is_auto_generated == other.is_auto_generated
            && self.is_read_only == other.is_read_only
    }
}

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Blob(b) => write!(f, "BLOB({} bytes)", b.len()),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Value::Blob(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Timestamp(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Pending change state of a row relative to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowState {
    Unchanged,
    Added,
    Modified,
    Deleted,
}

impl RowState {
    pub fn is_pending(&self) -> bool {
        *self != RowState::Unchanged
    }
}

impl fmt::Display for RowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowState::Unchanged => write!(f, "unchanged"),
            RowState::Added => write!(f, "added"),
            RowState::Modified => write!(f, "modified"),
            RowState::Deleted => write!(f, "deleted"),
        }
    }
}

/// A row of values aligned to its dataset's columns
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    values: Vec<Value>,
    state: RowState,
    /// Values as loaded, kept once the row is modified or deleted
    #[serde(skip_serializing_if = "Option::is_none")]
    original: Option<Vec<Value>>,
    /// The store holds this row, whatever its pending state
    #[serde(skip)]
    stored: bool,
}

impl Row {
    /// A row as loaded from the store
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            state: RowState::Unchanged,
            original: None,
            stored: true,
        }
    }

    /// A row that does not exist in the store yet
    pub fn added(values: Vec<Value>) -> Self {
        Self {
            values,
            state: RowState::Added,
            original: None,
            stored: false,
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn state(&self) -> RowState {
        self.state
    }

    pub fn original(&self) -> Option<&[Value]> {
        self.original.as_deref()
    }

    /// Values that identify the stored row: the original ones when the row was changed
    pub fn stored_values(&self) -> &[Value] {
        self.original.as_deref().unwrap_or(&self.values)
    }

    /// Whether the row exists in the store, as opposed to only in this dataset
    pub fn is_stored(&self) -> bool {
        self.stored
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    pub(crate) fn set_value(&mut self, index: usize, value: Value) {
        self.values[index] = value;
    }

    pub(crate) fn replace_values(&mut self, values: Vec<Value>) {
        self.capture_original();
        self.values = values;
    }

    /// Record a pending update; added rows stay added
    pub(crate) fn mark_modified(&mut self) {
        match self.state {
            RowState::Unchanged => {
                self.original = Some(self.values.clone());
                self.state = RowState::Modified;
            }
            RowState::Deleted => self.state = RowState::Modified,
            RowState::Added | RowState::Modified => {}
        }
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.capture_original();
        self.state = RowState::Deleted;
    }

    /// Tag a stored row as added so a commit pushes it again
    pub(crate) fn mark_repush(&mut self) {
        self.capture_original();
        self.state = RowState::Added;
    }

    pub(crate) fn accept(&mut self) {
        self.state = RowState::Unchanged;
        self.original = None;
        self.stored = true;
    }

    fn capture_original(&mut self) {
        if self.stored && self.original.is_none() {
            self.original = Some(self.values.clone());
        }
    }
}

/// Snapshot of one table: ordered columns and rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    columns: Vec<Column>,
    rows: Vec<Row>,
}

impl Dataset {
    /// Create an empty dataset; column names must be unique
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(SyncError::invalid_input(format!(
                    "Duplicate column name '{}'",
                    column.name
                )));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Positions of the columns that make up row identity
    pub fn key_positions(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_unique_key)
            .map(|(i, _)| i)
            .collect()
    }

    /// Append a row as loaded from the store
    pub fn push_row(&mut self, values: Vec<Value>) -> Result<()> {
        self.check_width(values.len())?;
        self.rows.push(Row::new(values));
        Ok(())
    }

    pub(crate) fn append(&mut self, row: Row) {
        debug_assert_eq!(row.values.len(), self.columns.len());
        self.rows.push(row);
    }

    pub(crate) fn row_mut(&mut self, index: usize) -> &mut Row {
        &mut self.rows[index]
    }

    pub(crate) fn rows_mut(&mut self) -> impl Iterator<Item = &mut Row> {
        self.rows.iter_mut()
    }

    pub(crate) fn check_index(&self, side: &'static str, index: usize) -> Result<()> {
        if index >= self.rows.len() {
            return Err(SyncError::index(side, index, self.rows.len()));
        }
        Ok(())
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width != self.columns.len() {
            return Err(SyncError::column_mismatch(format!(
                "row has {} values but the dataset has {} columns",
                width,
                self.columns.len()
            )));
        }
        Ok(())
    }

    /// Rows with a pending change, in row order
    pub fn changed_rows(&self) -> Vec<&Row> {
        self.rows.iter().filter(|r| r.state.is_pending()).collect()
    }

    pub fn has_changes(&self) -> bool {
        self.rows.iter().any(|r| r.state.is_pending())
    }

    /// Mark every pending row as stored; deleted rows are dropped
    pub fn accept_all(&mut self) {
        self.rows.retain(|r| r.state != RowState::Deleted);
        for row in &mut self.rows {
            row.accept();
        }
    }

    /// Delete a row: a row the store never held is dropped, anything else is marked deleted
    pub fn delete_row(&mut self, index: usize) -> Result<()> {
        self.check_index("destination", index)?;
        if !self.rows[index].stored {
            self.rows.remove(index);
        } else {
            self.rows[index].mark_deleted();
        }
        Ok(())
    }

    /// Fail unless both datasets have the same columns in the same order with the same flags
    pub fn ensure_compatible(&self, other: &Dataset) -> Result<()> {
        if self.columns.len() != other.columns.len() {
            return Err(SyncError::column_mismatch(format!(
                "{} columns vs {} columns",
                self.columns.len(),
                other.columns.len()
            )));
        }
        for (i, (a, b)) in self.columns.iter().zip(&other.columns).enumerate() {
            if !a.same_shape(b) {
                return Err(SyncError::column_mismatch(format!(
                    "column {} differs: '{}' vs '{}'",
                    i, a.name, b.name
                )));
            }
        }
        Ok(())
    }

    /// The pending rows paired with the table they belong to
    pub fn changeset(&self, table: &str) -> Changeset {
        Changeset {
            table: table.to_string(),
            columns: self.columns.clone(),
            rows: self.changed_rows().into_iter().cloned().collect(),
        }
    }
}

/// Rows to persist, computed at commit time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Changeset {
    pub table: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

impl Changeset {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn count(&self, state: RowState) -> usize {
        self.rows.iter().filter(|r| r.state == state).count()
    }
}
