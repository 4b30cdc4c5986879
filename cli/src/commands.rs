//! Command implementations for tablesync CLI

use crate::cli::{Commands, SessionArgs};
use crate::output::{JsonFormatter, PrettyPrinter};
use crate::progress::ProgressReporter;
use log::{debug, warn};
use std::path::Path;
use tablesync_core::config::{self, Config};
use tablesync_core::error::{Result, SyncError};
use tablesync_core::{
    CommitOutcome, ConnectionSpec, DuckDbStore, MergeSummary, ReconciliationSession, Side,
    TableDescriptor, ValueFormatter,
};

type Session = ReconciliationSession<DuckDbStore>;

/// Execute a command
pub fn execute_command(command: Commands, config_path: Option<&Path>) -> Result<()> {
    let load = || config::get_config(config_path);
    match command {
        Commands::Connections { json } => connections_command(config_path, json),
        Commands::Show {
            session,
            dest_only,
            json,
        } => show_command(&load()?, &session, dest_only, json),
        Commands::CopyRow {
            session,
            rows,
            commit,
            json,
        } => copy_row_command(&load()?, &session, &rows, commit, json),
        Commands::Merge {
            session,
            commit,
            json,
        } => merge_command(&load()?, &session, commit, json),
        Commands::SyncFields {
            session,
            from,
            to,
            commit,
            json,
        } => sync_fields_command(&load()?, &session, from, to, commit, json),
        Commands::DeleteRow {
            session,
            rows,
            commit,
            json,
        } => delete_row_command(&load()?, &session, &rows, commit, json),
    }
}

/// List configured connections
fn connections_command(config_path: Option<&Path>, json: bool) -> Result<()> {
    let (config, source) = config::get_config_with_source(config_path)?;
    if json {
        println!("{}", JsonFormatter::format_connections(&config)?);
    } else {
        PrettyPrinter::print_connections(&config, source.as_deref());
    }
    Ok(())
}

/// Resolve both connections and load the table from each
fn open_session(config: &Config, args: &SessionArgs, json: bool) -> Result<Session> {
    let source = ConnectionSpec::from_config(config, &args.source)?;
    let destination = ConnectionSpec::from_config(config, &args.dest)?;
    let table = TableDescriptor::from_config(config, &args.table);
    debug!("Opening session for {table}: {source} -> {destination}");

    let mut progress = ProgressReporter::start(
        &format!(
            "Loading {} from '{}' and '{}'...",
            table, args.source, args.dest
        ),
        !json,
    );
    let session = ReconciliationSession::open(DuckDbStore::new(), table, source, destination)?;
    progress.finish(&format!(
        "Loaded {} source rows and {} destination rows",
        session.source().len(),
        session.destination().len()
    ));
    Ok(session)
}

fn formatter(config: &Config) -> ValueFormatter {
    ValueFormatter::new(config.display.binary_preview_length)
}

/// Show the rows of both sides
fn show_command(config: &Config, args: &SessionArgs, dest_only: bool, json: bool) -> Result<()> {
    let session = open_session(config, args, json)?;
    let formatter = formatter(config);
    let source_rows = session.row_views(Side::Source, &formatter);
    let dest_rows = session.row_views(Side::Destination, &formatter);

    if json {
        let source = (!dest_only).then(|| (session.source().columns(), source_rows.as_slice()));
        println!(
            "{}",
            JsonFormatter::format_rows(
                &session.table().full_name,
                source,
                (session.destination().columns(), dest_rows.as_slice()),
            )?
        );
        return Ok(());
    }

    if !dest_only {
        PrettyPrinter::print_rows(
            &format!("Source '{}'", args.source),
            session.source().columns(),
            &source_rows,
        );
        println!();
    }
    PrettyPrinter::print_rows(
        &format!("Destination '{}'", args.dest),
        session.destination().columns(),
        &dest_rows,
    );
    Ok(())
}

fn copy_row_command(
    config: &Config,
    args: &SessionArgs,
    rows: &[usize],
    commit: bool,
    json: bool,
) -> Result<()> {
    let mut session = open_session(config, args, json)?;
    for &index in rows {
        session.copy_row(index)?;
    }
    finish_operation(config, &mut session, "copy-row", None, commit, json)
}

fn merge_command(config: &Config, args: &SessionArgs, commit: bool, json: bool) -> Result<()> {
    let mut session = open_session(config, args, json)?;
    let summary = session.merge_all()?;
    finish_operation(config, &mut session, "merge", Some(&summary), commit, json)
}

fn sync_fields_command(
    config: &Config,
    args: &SessionArgs,
    from: usize,
    to: usize,
    commit: bool,
    json: bool,
) -> Result<()> {
    let mut session = open_session(config, args, json)?;
    session.sync_fields(from, to)?;
    finish_operation(config, &mut session, "sync-fields", None, commit, json)
}

fn delete_row_command(
    config: &Config,
    args: &SessionArgs,
    rows: &[usize],
    commit: bool,
    json: bool,
) -> Result<()> {
    let mut session = open_session(config, args, json)?;
    // Highest first, so removing an added row does not shift the others
    let mut rows = rows.to_vec();
    rows.sort_unstable_by(|a, b| b.cmp(a));
    rows.dedup();
    for index in rows {
        session.delete_row(index)?;
    }
    finish_operation(config, &mut session, "delete-row", None, commit, json)
}

/// Report the pending changeset and commit it when asked
fn finish_operation(
    config: &Config,
    session: &mut Session,
    operation: &str,
    merge: Option<&MergeSummary>,
    commit: bool,
    json: bool,
) -> Result<()> {
    let table = session.table().full_name.clone();
    let changeset = session.destination().changeset(&table);

    if !json {
        if let Some(summary) = merge {
            PrettyPrinter::print_merge_summary(summary);
        }
        let views = session.row_views(Side::Destination, &formatter(config));
        PrettyPrinter::print_rows(
            &format!("Destination '{}'", session.destination_connection().name),
            session.destination().columns(),
            &views,
        );
        PrettyPrinter::print_changeset(&changeset);
    }

    let outcome = if commit {
        let mut progress = ProgressReporter::start(
            &format!("Committing {} rows to {}...", changeset.len(), table),
            !json && !changeset.is_empty(),
        );
        let outcome = session.commit_with_outcome().map_err(|e| {
            if e.is_fetch() {
                warn!("Changes were committed to {table} but the table could not be reloaded");
            }
            e
        })?;
        progress.finish("Commit finished");
        Some(outcome)
    } else {
        None
    };

    if json {
        println!(
            "{}",
            JsonFormatter::format_operation(operation, &changeset, merge, outcome.as_ref())?
        );
    } else {
        match &outcome {
            Some(outcome) => PrettyPrinter::print_commit_outcome(outcome),
            None if !changeset.is_empty() => PrettyPrinter::print_commit_hint(),
            None => {}
        }
    }

    if let Some(CommitOutcome::Rejected(reason)) = outcome {
        warn!("Destination '{}' kept its pending rows", session.destination_connection().name);
        return Err(SyncError::persistence(&table, reason));
    }
    Ok(())
}
