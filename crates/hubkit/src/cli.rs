//! Clap derive structures for the `hubkit` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// hubkit -- inspect connector configuration and event cursors
#[derive(Debug, Parser)]
#[command(
    name = "hubkit",
    version,
    about = "Inspect hubkit configuration and event cursors",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configuration file (defaults to the platform config dir)
    #[arg(long, short = 'c', env = "HUBKIT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HUBKIT_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// Plain text, one value per line (scripting)
    Plain,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the active configuration
    #[command(alias = "cfg")]
    Config(ConfigArgs),

    /// Inspect and reset persisted event cursors
    #[command(alias = "cur")]
    Cursors(CursorsArgs),
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Print the merged configuration with secrets redacted
    Show,

    /// List configured connectors
    Connectors {
        /// Only connectors visible to this principal
        #[arg(long)]
        principal: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct CursorsArgs {
    #[command(subcommand)]
    pub command: CursorsCommand,
}

#[derive(Debug, Subcommand)]
pub enum CursorsCommand {
    /// List every persisted cursor
    #[command(alias = "ls")]
    List {
        /// Only cursors of this connector
        #[arg(long)]
        connector: Option<String>,
    },

    /// Show one cursor
    Get {
        connector: String,
        /// Event path, e.g. "dataSets/$events/new_value"
        event: String,
    },

    /// Overwrite one cursor
    Set {
        connector: String,
        event: String,
        value: i64,
        /// Allow moving the cursor backwards (records are redelivered)
        #[arg(long)]
        force: bool,
    },

    /// Remove one cursor; the next subscription baselines again
    #[command(alias = "rm")]
    Reset { connector: String, event: String },
}
