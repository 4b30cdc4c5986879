//! Persisting a destination's pending rows

use crate::database::ConnectionSpec;
use crate::dataset::Dataset;
use crate::engine::ReconciliationSession;
use crate::error::Result;
use crate::store::{ChangePersister, DataFetcher};
use log::{error, info};

/// What happened to a commit request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// No pending rows; the store was not contacted
    NothingToCommit,
    /// The store applied this many rows and they were accepted
    Committed(usize),
    /// The store refused the changeset; the dataset is unchanged
    Rejected(String),
}

impl CommitOutcome {
    pub fn succeeded(&self) -> bool {
        !matches!(self, CommitOutcome::Rejected(_))
    }
}

/// Hands a dataset's changeset to the store and accepts it on success
pub struct CommitCoordinator;

impl CommitCoordinator {
    /// Persist the pending rows of `dataset`. Never retries.
    pub fn commit<P: ChangePersister>(
        persister: &P,
        table_name: &str,
        connection: &ConnectionSpec,
        dataset: &mut Dataset,
    ) -> CommitOutcome {
        let changeset = dataset.changeset(table_name);
        if changeset.is_empty() {
            info!("Nothing to commit for {}", table_name);
            return CommitOutcome::NothingToCommit;
        }

        match persister.commit(connection, &changeset) {
            Ok(()) => {
                dataset.accept_all();
                info!(
                    "Committed {} rows to {} on '{}'",
                    changeset.len(),
                    table_name,
                    connection.name
                );
                CommitOutcome::Committed(changeset.len())
            }
            Err(e) => {
                error!("Commit to {} on '{}' failed: {}", table_name, connection.name, e);
                CommitOutcome::Rejected(e.to_string())
            }
        }
    }
}

impl<S: DataFetcher + ChangePersister> ReconciliationSession<S> {
    /// Commit the destination's pending rows.
    ///
    /// Returns `Ok(false)` when the store rejects the changeset. After a
    /// successful commit both datasets are reloaded; a failed reload is an error.
    pub fn commit(&mut self) -> Result<bool> {
        Ok(self.commit_with_outcome()?.succeeded())
    }

    pub fn commit_with_outcome(&mut self) -> Result<CommitOutcome> {
        let outcome = CommitCoordinator::commit(
            &self.store,
            &self.table.full_name,
            &self.destination_connection,
            &mut self.destination,
        );
        if let CommitOutcome::Committed(_) = outcome {
            self.load()?;
        }
        Ok(outcome)
    }
}
