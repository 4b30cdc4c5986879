//! Reconciliation session: a source/destination pair of one table

use crate::database::{ConnectionSpec, TableDescriptor};
use crate::dataset::{Dataset, Row, RowState};
use crate::error::{Result, SyncError};
use crate::format::ValueFormatter;
use crate::matcher::RowMatcher;
use crate::store::DataFetcher;
use log::{debug, info};
use serde::Serialize;

/// Which dataset of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Destination,
}

/// Outcome of a merge
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    /// Source rows that found a destination row with the same key
    pub matched: usize,
    /// Source rows appended as new destination rows
    pub appended: usize,
    /// Untouched destination rows marked for re-push
    pub forced: usize,
}

/// Renderer-facing view of one row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowView {
    pub index: usize,
    pub state: RowState,
    pub cells: Vec<String>,
}

/// One operator's reconciliation of a single table between two connections
pub struct ReconciliationSession<S> {
    pub(crate) store: S,
    pub(crate) table: TableDescriptor,
    pub(crate) source_connection: ConnectionSpec,
    pub(crate) destination_connection: ConnectionSpec,
    pub(crate) source: Dataset,
    pub(crate) destination: Dataset,
}

impl<S: DataFetcher> ReconciliationSession<S> {
    /// Start a session by loading both datasets
    pub fn open(
        store: S,
        table: TableDescriptor,
        source_connection: ConnectionSpec,
        destination_connection: ConnectionSpec,
    ) -> Result<Self> {
        let (source, destination) =
            fetch_pair(&store, &table, &source_connection, &destination_connection)?;
        Ok(Self {
            store,
            table,
            source_connection,
            destination_connection,
            source,
            destination,
        })
    }

    /// Reload both datasets; on failure the current ones are kept
    pub fn load(&mut self) -> Result<()> {
        let (source, destination) = fetch_pair(
            &self.store,
            &self.table,
            &self.source_connection,
            &self.destination_connection,
        )?;
        self.source = source;
        self.destination = destination;
        Ok(())
    }

    pub fn table(&self) -> &TableDescriptor {
        &self.table
    }

    pub fn source(&self) -> &Dataset {
        &self.source
    }

    pub fn destination(&self) -> &Dataset {
        &self.destination
    }

    pub fn source_connection(&self) -> &ConnectionSpec {
        &self.source_connection
    }

    pub fn destination_connection(&self) -> &ConnectionSpec {
        &self.destination_connection
    }

    pub fn dataset(&self, side: Side) -> &Dataset {
        match side {
            Side::Source => &self.source,
            Side::Destination => &self.destination,
        }
    }

    /// Copy a source row into the destination.
    ///
    /// A destination row with the same key is updated in place; otherwise the row
    /// is appended as added, with generated keys cleared.
    pub fn copy_row(&mut self, source_index: usize) -> Result<Row> {
        self.source.check_index("source", source_index)?;
        self.source.ensure_compatible(&self.destination)?;

        let source_row = &self.source.rows()[source_index];
        let prepared = RowMatcher::prepare_for_insertion(source_row, &self.destination);

        let dest_index = match RowMatcher::find_match(source_row, &self.destination) {
            Some(index) => {
                debug!("Source row {} replaces destination row {}", source_index, index);
                let row = self.destination.row_mut(index);
                row.mark_modified();
                row.replace_values(prepared.into_values());
                index
            }
            None => {
                debug!("Source row {} appended to destination", source_index);
                self.destination.append(prepared);
                self.destination.len() - 1
            }
        };
        Ok(self.destination.rows()[dest_index].clone())
    }

    /// Merge every source row into the destination, then mark every untouched
    /// destination row as added so the whole destination is re-pushed on commit.
    pub fn merge_all(&mut self) -> Result<MergeSummary> {
        self.source.ensure_compatible(&self.destination)?;

        let mut summary = MergeSummary::default();
        for source_row in self.source.rows() {
            match RowMatcher::find_match(source_row, &self.destination) {
                Some(index) => {
                    summary.matched += 1;
                    let row = self.destination.row_mut(index);
                    // Pending edits in the destination win over source values
                    if row.state() == RowState::Unchanged {
                        row.replace_values(source_row.values().to_vec());
                    }
                }
                None => {
                    summary.appended += 1;
                    self.destination
                        .append(Row::added(source_row.values().to_vec()));
                }
            }
        }

        for row in self.destination.rows_mut() {
            if row.state() == RowState::Unchanged {
                row.mark_repush();
                summary.forced += 1;
            }
        }

        info!(
            "Merged {} into destination: {} matched, {} appended, {} forced to added",
            self.table, summary.matched, summary.appended, summary.forced
        );
        Ok(summary)
    }

    /// Overwrite the non-key fields of a destination row with a source row's
    pub fn sync_fields(&mut self, source_index: usize, dest_index: usize) -> Result<()> {
        self.source.ensure_compatible(&self.destination)?;
        self.source.check_index("source", source_index)?;
        self.destination.check_index("destination", dest_index)?;
        if self.destination.rows()[dest_index].state() == RowState::Deleted {
            return Err(SyncError::invalid_input(format!(
                "Destination row {dest_index} is deleted"
            )));
        }

        let payload: Vec<(usize, _)> = self
            .destination
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, column)| !column.is_unique_key)
            .map(|(i, _)| (i, self.source.rows()[source_index].values()[i].clone()))
            .collect();

        let synced = payload.len();
        let row = self.destination.row_mut(dest_index);
        row.mark_modified();
        for (i, value) in payload {
            row.set_value(i, value);
        }
        debug!(
            "Synced {} fields from source row {} to destination row {}",
            synced, source_index, dest_index
        );
        Ok(())
    }

    /// Delete a destination row
    pub fn delete_row(&mut self, dest_index: usize) -> Result<()> {
        self.destination.delete_row(dest_index)
    }

    /// Row state and display strings for one side, for a renderer to poll
    pub fn row_views(&self, side: Side, formatter: &ValueFormatter) -> Vec<RowView> {
        let dataset = self.dataset(side);
        dataset
            .rows()
            .iter()
            .enumerate()
            .map(|(index, row)| RowView {
                index,
                state: row.state(),
                cells: formatter.format_row(dataset.columns(), row),
            })
            .collect()
    }
}

/// Fetch source and destination; both succeed or neither is returned
fn fetch_pair<S: DataFetcher>(
    store: &S,
    table: &TableDescriptor,
    source_connection: &ConnectionSpec,
    destination_connection: &ConnectionSpec,
) -> Result<(Dataset, Dataset)> {
    let (source, destination) = rayon::join(
        || store.load(table, source_connection),
        || store.load(table, destination_connection),
    );
    let (source, destination) = (source?, destination?);
    info!(
        "Loaded {}: {} source rows, {} destination rows",
        table,
        source.len(),
        destination.len()
    );
    Ok((source, destination))
}
