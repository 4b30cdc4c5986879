//! Display formatting for cell values

use crate::dataset::{Column, Row, Value, ValueType};
use std::fmt::Write;

/// Number of bytes shown for binary values unless configured otherwise
pub const DEFAULT_BINARY_PREVIEW: usize = 64;

/// Render at most `max_length` bytes as upper-case hex pairs.
///
/// Display only: the output is lossy and must never be compared or persisted.
pub fn format_binary(data: &[u8], max_length: usize) -> String {
    let shown = &data[..data.len().min(max_length)];
    let mut result = String::with_capacity(shown.len() * 2);
    for byte in shown {
        // Writing to a String cannot fail
        let _ = write!(result, "{byte:02X}");
    }
    result
}

/// Display string for one cell; only binary columns are intercepted
pub fn format_value(column: &Column, value: &Value, max_length: usize) -> String {
    match (column.value_type, value) {
        (ValueType::Binary, Value::Blob(data)) => format_binary(data, max_length),
        _ => value.to_string(),
    }
}

/// Formats rows for a renderer using a configured preview length
#[derive(Debug, Clone, Copy)]
pub struct ValueFormatter {
    pub binary_preview_length: usize,
}

impl Default for ValueFormatter {
    fn default() -> Self {
        Self {
            binary_preview_length: DEFAULT_BINARY_PREVIEW,
        }
    }
}

impl ValueFormatter {
    pub fn new(binary_preview_length: usize) -> Self {
        Self {
            binary_preview_length,
        }
    }

    pub fn format(&self, column: &Column, value: &Value) -> String {
        format_value(column, value, self.binary_preview_length)
    }

    /// Display strings for a whole row, aligned to `columns`
    pub fn format_row(&self, columns: &[Column], row: &Row) -> Vec<String> {
        columns
            .iter()
            .zip(row.values())
            .map(|(column, value)| self.format(column, value))
            .collect()
    }
}
