//! Command-line interface for tablesync

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tablesync")]
#[command(about = "Reconcile a table between a source and a destination database")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to tablesync.toml, then ~/.tablesync/global.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// The table and the two connections a command works on
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Source connection name from tablesync.toml
    #[arg(long)]
    pub source: String,

    /// Destination connection name from tablesync.toml
    #[arg(long)]
    pub dest: String,

    /// Table to reconcile (`table` or `schema.table`)
    #[arg(long)]
    pub table: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List configured connections
    Connections {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the source and destination rows of a table
    Show {
        #[command(flatten)]
        session: SessionArgs,

        /// Only show the destination
        #[arg(long)]
        dest_only: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Copy source rows into the destination
    CopyRow {
        #[command(flatten)]
        session: SessionArgs,

        /// Source row indices to copy
        #[arg(required = true, num_args = 1..)]
        rows: Vec<usize>,

        /// Persist the changes to the destination
        #[arg(long)]
        commit: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Merge every source row into the destination and re-push the whole destination
    Merge {
        #[command(flatten)]
        session: SessionArgs,

        /// Persist the changes to the destination
        #[arg(long)]
        commit: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Copy the non-key fields of a source row onto a destination row
    SyncFields {
        #[command(flatten)]
        session: SessionArgs,

        /// Source row index
        #[arg(long)]
        from: usize,

        /// Destination row index
        #[arg(long)]
        to: usize,

        /// Persist the changes to the destination
        #[arg(long)]
        commit: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete destination rows
    DeleteRow {
        #[command(flatten)]
        session: SessionArgs,

        /// Destination row indices to delete
        #[arg(required = true, num_args = 1..)]
        rows: Vec<usize>,

        /// Persist the changes to the destination
        #[arg(long)]
        commit: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sync_fields() {
        let cli = Cli::try_parse_from([
            "tablesync",
            "sync-fields",
            "--source",
            "prod",
            "--dest",
            "staging",
            "--table",
            "main.people",
            "--from",
            "2",
            "--to",
            "5",
            "--commit",
        ])
        .unwrap();

        match cli.command {
            Commands::SyncFields {
                session,
                from,
                to,
                commit,
                json,
            } => {
                assert_eq!(session.source, "prod");
                assert_eq!(session.dest, "staging");
                assert_eq!(session.table, "main.people");
                assert_eq!((from, to), (2, 5));
                assert!(commit);
                assert!(!json);
            }
            _ => panic!("expected sync-fields"),
        }
    }

    #[test]
    fn test_copy_row_requires_indices() {
        let result = Cli::try_parse_from([
            "tablesync", "copy-row", "--source", "a", "--dest", "b", "--table", "t",
        ]);
        assert!(result.is_err());
    }
}
