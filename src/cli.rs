// CLI Layer
// ユーザー入力の受付とコマンドルーティング

pub mod command_context;
pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Orma - Code-first schema migration CLI
///
/// Reconciles the live PostgreSQL schema with declared entity metadata.
#[derive(Parser, Debug)]
#[command(name = "orma")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Code-first schema migration CLI for PostgreSQL")]
#[command(long_about = "Orma - Code-first schema migration CLI

Derives the expected schema from entity definitions (models.yaml),
compares it with the live PostgreSQL database and applies reversible
migrations recorded in the __orm_migrations history table.")]
#[command(propagate_version = true)]
#[command(after_help = "GETTING STARTED:
  1. Describe your entities:        Edit models.yaml
  2. Preview the migration:         orma migrate --dry-run
  3. Apply it:                      orma migrate
  4. Check migration history:       orma status

For detailed help on each command, use: orma <command> --help")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Target environment
    #[arg(short, long, global = true, value_name = "ENV", default_value = "development")]
    pub env: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile the database with the entity definitions
    ///
    /// Computes the difference between the live schema and the schema
    /// derived from models.yaml, then applies it in a single transaction.
    ///
    /// EXAMPLES:
    ///   # Preview the SQL without executing
    ///   orma migrate --dry-run
    ///
    ///   # Apply to production
    ///   orma migrate --env production
    Migrate {
        /// Dry run - show SQL without executing
        #[arg(long)]
        dry_run: bool,
    },

    /// Roll back the most recently applied migration
    ///
    /// Executes the recorded down SQL and marks the record as rolled back.
    Rollback,

    /// Re-apply the most recently rolled back migration
    ///
    /// Executes the recorded up SQL statement by statement; failing
    /// statements are skipped.
    Forward,

    /// Show the migration history
    Status,
}
