mod common;

use common::*;
use tablesync_core::{
    CommitCoordinator, CommitOutcome, ReconciliationSession, Result, RowState, Value,
};

fn open(store: &MemoryStore) -> Result<ReconciliationSession<&MemoryStore>> {
    ReconciliationSession::open(store, people_table(), source_conn(), dest_conn())
}

#[test]
fn test_empty_changeset_skips_store() -> Result<()> {
    let store = MemoryStore::new()
        .with_table("source", people_columns(), vec![person(1, "A")])
        .with_table("destination", people_columns(), vec![person(1, "A")]);
    let mut session = open(&store)?;
    let loads_before = store.load_count();

    store.set_fail_commits(true);
    assert_eq!(session.commit_with_outcome()?, CommitOutcome::NothingToCommit);
    assert!(session.commit()?);

    assert!(store.commits().is_empty());
    assert_eq!(store.load_count(), loads_before);
    Ok(())
}

#[test]
fn test_failed_commit_keeps_pending_rows() -> Result<()> {
    let store = MemoryStore::new()
        .with_table(
            "source",
            people_columns(),
            vec![person(1, "B"), person(9, "New")],
        )
        .with_table(
            "destination",
            people_columns(),
            vec![person(1, "A"), person(2, "Gone")],
        );
    let mut session = open(&store)?;
    session.sync_fields(0, 0)?;
    session.copy_row(1)?;
    session.delete_row(1)?;
    let before: Vec<RowState> = session
        .destination()
        .rows()
        .iter()
        .map(|r| r.state())
        .collect();
    let loads_before = store.load_count();

    store.set_fail_commits(true);
    assert!(!session.commit()?);

    let after: Vec<RowState> = session
        .destination()
        .rows()
        .iter()
        .map(|r| r.state())
        .collect();
    assert_eq!(before, after);
    assert_eq!(
        after,
        vec![RowState::Modified, RowState::Deleted, RowState::Added]
    );
    assert_eq!(store.load_count(), loads_before);
    assert_eq!(
        store.stored_rows("destination"),
        vec![person(1, "A"), person(2, "Gone")]
    );

    // The same session can retry once the store recovers
    store.set_fail_commits(false);
    assert!(session.commit()?);
    assert_eq!(
        store.stored_rows("destination"),
        vec![person(1, "B"), person(2, "New")]
    );
    Ok(())
}

#[test]
fn test_successful_commit_reloads_both_sides() -> Result<()> {
    let store = MemoryStore::new()
        .with_table("source", people_columns(), vec![person(1, "B")])
        .with_table("destination", people_columns(), vec![person(1, "A")]);
    let mut session = open(&store)?;
    session.sync_fields(0, 0)?;
    let loads_before = store.load_count();

    assert_eq!(session.commit_with_outcome()?, CommitOutcome::Committed(1));

    assert_eq!(store.load_count(), loads_before + 2);
    let commits = store.commits();
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].table, "main.people");
    assert_eq!(commits[0].count(RowState::Modified), 1);

    let row = &session.destination().rows()[0];
    assert_eq!(row.state(), RowState::Unchanged);
    assert_eq!(row.value(1), Some(&Value::from("B")));
    Ok(())
}

#[test]
fn test_merge_then_commit_pushes_full_destination() -> Result<()> {
    let store = MemoryStore::new()
        .with_table("source", people_columns(), vec![person(3, "C")])
        .with_table(
            "destination",
            people_columns(),
            vec![person(1, "A"), person(2, "B")],
        );
    let mut session = open(&store)?;
    session.merge_all()?;

    assert!(session.commit()?);

    let commits = store.commits();
    assert_eq!(commits[0].len(), 3);
    assert_eq!(commits[0].count(RowState::Added), 3);
    assert_eq!(
        store.stored_rows("destination"),
        vec![person(1, "A"), person(2, "B"), person(3, "C")]
    );
    assert!(!session.destination().has_changes());
    Ok(())
}

#[test]
fn test_coordinator_accepts_only_on_success() -> Result<()> {
    let store = MemoryStore::new()
        .with_table("source", people_columns(), vec![])
        .with_table("destination", people_columns(), vec![person(1, "A")]);
    let mut dataset = tablesync_core::DataFetcher::load(&store, &people_table(), &dest_conn())?;
    dataset.delete_row(0)?;

    store.set_fail_commits(true);
    let outcome = CommitCoordinator::commit(&store, "main.people", &dest_conn(), &mut dataset);
    assert!(matches!(outcome, CommitOutcome::Rejected(ref msg) if msg.contains("store unavailable")));
    assert_eq!(dataset.rows()[0].state(), RowState::Deleted);

    store.set_fail_commits(false);
    let outcome = CommitCoordinator::commit(&store, "main.people", &dest_conn(), &mut dataset);
    assert_eq!(outcome, CommitOutcome::Committed(1));
    assert!(dataset.is_empty());
    Ok(())
}
