//! Command-line arguments and how they layer onto [`AppConfig`].

use clap::{Args, Parser, Subcommand};
use panverify_core::{AppConfig, SelectionMode, SortOrder, UpdateScope};
use std::path::PathBuf;

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,panverify=debug";

#[derive(Debug, Parser)]
#[command(
    name = "panverify",
    version,
    about = "Resumable PAN verification over a record table"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a TOML config file (default: platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Record store URL, e.g. sqlite://tds.db or mysql://user@host/db
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Table holding the records
    #[arg(long, global = true)]
    pub table: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = DEFAULT_LOG_FILTER, global = true)]
    pub log_level: String,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Verify unprocessed records until none are left
    Run(RunArgs),
    /// Print record counts for the table
    Status,
    /// Validate configuration, connectivity and table layout
    Check,
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Debug, Default, Args)]
pub struct RunArgs {
    /// Selection mode (single or batch)
    #[arg(long)]
    pub mode: Option<SelectionMode>,

    /// Records per selection; implies batch mode unless --mode is given
    #[arg(long)]
    pub batch_limit: Option<u32>,

    /// Rows skipped by the first selection
    #[arg(long)]
    pub batch_offset: Option<u32>,

    /// Column candidates are ordered by
    #[arg(long)]
    pub ordering_field: Option<String>,

    /// Ordering direction (asc or desc)
    #[arg(long)]
    pub order: Option<SortOrder>,

    /// Rows an outcome is written to (key or identifier)
    #[arg(long)]
    pub update_scope: Option<UpdateScope>,
}

impl Cli {
    /// Layer flag values over `config`. Flags win over file and environment.
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(url) = &self.database_url {
            config.database.url.clone_from(url);
        }
        if let Some(table) = &self.table {
            config.table.name.clone_from(table);
        }
        if let Command::Run(args) = &self.command {
            args.apply_to(config);
        }
    }
}

impl RunArgs {
    fn apply_to(&self, config: &mut AppConfig) {
        let selection = &mut config.selection;
        if let Some(limit) = self.batch_limit {
            selection.batch_limit = limit;
            selection.mode = SelectionMode::Batch;
        }
        if let Some(mode) = self.mode {
            selection.mode = mode;
        }
        if let Some(offset) = self.batch_offset {
            selection.batch_offset = offset;
        }
        if let Some(field) = &self.ordering_field {
            selection.ordering_field = Some(field.clone());
        }
        if let Some(order) = self.order {
            selection.order = order;
        }
        if let Some(scope) = self.update_scope {
            selection.update_scope = scope;
        }
    }
}
