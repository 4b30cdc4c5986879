//! Output formatting utilities

use serde_json::json;
use std::path::Path;
use tablesync_core::error::Result;
use tablesync_core::{Changeset, Column, CommitOutcome, Config, MergeSummary, RowState, RowView};

/// Pretty printer for tablesync output
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print configured connections
    pub fn print_connections(config: &Config, source: Option<&Path>) {
        match source {
            Some(path) => println!("⚙️  Configuration: {}", path.display()),
            None => println!("⚙️  Configuration: defaults (no config file found)"),
        }

        if config.connections.is_empty() {
            println!("No connections configured.");
            return;
        }

        println!("🔌 Connections:");
        for (i, (name, connection)) in config.connections.iter().enumerate() {
            let prefix = if i == config.connections.len() - 1 {
                "└─"
            } else {
                "├─"
            };
            println!(
                "{prefix} {name} ({}): {}",
                connection.db_type,
                connection.redacted_connection_string()
            );
        }
    }

    /// Print one side of a session as a table
    pub fn print_rows(title: &str, columns: &[Column], rows: &[RowView]) {
        println!("📋 {title} ({} rows)", rows.len());
        for line in render_table(columns, rows) {
            println!("   {line}");
        }
    }

    /// Print the rows a commit would send
    pub fn print_changeset(changeset: &Changeset) {
        if changeset.is_empty() {
            println!("✅ No pending changes");
            return;
        }
        println!("🟡 Pending changes for {}: {}", changeset.table, changeset.len());
        println!("├─ Added: {}", changeset.count(RowState::Added));
        println!("├─ Modified: {}", changeset.count(RowState::Modified));
        println!("└─ Deleted: {}", changeset.count(RowState::Deleted));
    }

    pub fn print_merge_summary(summary: &MergeSummary) {
        println!("🔀 Merge");
        println!("├─ Matched: {}", summary.matched);
        println!("├─ Appended: {}", summary.appended);
        println!("└─ Marked for re-push: {}", summary.forced);
    }

    pub fn print_commit_outcome(outcome: &CommitOutcome) {
        match outcome {
            CommitOutcome::NothingToCommit => println!("✅ Nothing to commit"),
            CommitOutcome::Committed(rows) => println!("✅ Committed {rows} rows"),
            CommitOutcome::Rejected(reason) => {
                println!("❌ Commit rejected, destination left unchanged");
                println!("└─ {reason}");
            }
        }
    }

    /// Remind the operator that nothing was persisted
    pub fn print_commit_hint() {
        println!();
        println!("🟡 Changes were not persisted. Re-run with --commit to apply them.");
    }
}

/// Marker shown in front of a row for its state
fn state_marker(state: RowState) -> char {
    match state {
        RowState::Unchanged => ' ',
        RowState::Added => '+',
        RowState::Modified => '~',
        RowState::Deleted => '-',
    }
}

/// Align cells into columns under a header line
fn render_table(columns: &[Column], rows: &[RowView]) -> Vec<String> {
    let mut widths: Vec<usize> = columns.iter().map(|c| c.name.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(&row.cells) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let index_width = rows
        .last()
        .map(|r| r.index.to_string().len())
        .unwrap_or(1);

    let line = |marker: char, index: String, cells: Vec<&str>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect();
        format!("{marker} {index:>index_width$} │ {}", padded.join(" │ "))
            .trim_end()
            .to_string()
    };

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(line(
        ' ',
        "#".to_string(),
        columns.iter().map(|c| c.name.as_str()).collect(),
    ));
    for row in rows {
        lines.push(line(
            state_marker(row.state),
            row.index.to_string(),
            row.cells.iter().map(String::as_str).collect(),
        ));
    }
    lines
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format configured connections as JSON, without credentials
    pub fn format_connections(config: &Config) -> Result<String> {
        let connections: Vec<_> = config
            .connections
            .iter()
            .map(|(name, connection)| {
                json!({
                    "name": name,
                    "type": connection.db_type,
                    "connection": connection.redacted_connection_string(),
                })
            })
            .collect();
        Ok(serde_json::to_string_pretty(&connections)?)
    }

    pub fn format_rows(
        table: &str,
        source: Option<(&[Column], &[RowView])>,
        destination: (&[Column], &[RowView]),
    ) -> Result<String> {
        let side = |(columns, rows): (&[Column], &[RowView])| {
            json!({
                "columns": columns.iter().map(|c| &c.name).collect::<Vec<_>>(),
                "rows": rows,
            })
        };
        let json = json!({
            "table": table,
            "source": source.map(side),
            "destination": side(destination),
        });
        Ok(serde_json::to_string_pretty(&json)?)
    }

    /// Format the result of a mutating command
    pub fn format_operation(
        operation: &str,
        changeset: &Changeset,
        merge: Option<&MergeSummary>,
        outcome: Option<&CommitOutcome>,
    ) -> Result<String> {
        let json = json!({
            "operation": operation,
            "table": changeset.table,
            "pending": {
                "added": changeset.count(RowState::Added),
                "modified": changeset.count(RowState::Modified),
                "deleted": changeset.count(RowState::Deleted),
            },
            "merge": merge,
            "committed": outcome.map(CommitOutcome::succeeded),
            "error": match outcome {
                Some(CommitOutcome::Rejected(reason)) => Some(reason.as_str()),
                _ => None,
            },
        });
        Ok(serde_json::to_string_pretty(&json)?)
    }
}
