//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::CONFIG_FILE_NAME;

/// automigrate - Automatic schema migrations
#[derive(Parser, Debug)]
#[command(name = "automigrate")]
#[command(author = "Pegasus Heavy Industries LLC")]
#[command(version)]
#[command(about = "automigrate - Automatic schema migrations", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILE_NAME)]
    pub config: PathBuf,

    /// Database URL, overriding the configuration file
    #[arg(long, global = true, env = "AUTOMIGRATE_DATABASE_URL")]
    pub database_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Bring the database in line with the declared model
    Migrate(MigrateArgs),

    /// Show the SQL a migration would run without touching the database
    Plan(PlanArgs),

    /// Print the live database schema
    Introspect(IntrospectArgs),

    /// List applied migrations
    History,

    /// Display version information
    Version,
}

// =============================================================================
// Migrate Command
// =============================================================================

/// Arguments for the `migrate` command
#[derive(Args, Debug, Default)]
pub struct MigrateArgs {
    /// Generate SQL without executing it
    #[arg(long)]
    pub dry_run: bool,

    /// Allow dropping columns that are no longer declared
    #[arg(long)]
    pub allow_drop_column: bool,

    /// Allow dropping tables that are no longer declared
    #[arg(long)]
    pub allow_drop_table: bool,

    /// Write the generated script to a file
    #[arg(short, long)]
    pub script: Option<PathBuf>,

    /// Back up the database before applying changes
    #[arg(long)]
    pub backup: bool,

    /// Report a failed run instead of exiting with an error
    #[arg(long)]
    pub no_halt: bool,
}

// =============================================================================
// Plan Command
// =============================================================================

/// Arguments for the `plan` command
#[derive(Args, Debug, Default)]
pub struct PlanArgs {
    /// Write the script to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Include column drops in the plan
    #[arg(long)]
    pub allow_drop_column: bool,

    /// Include table drops in the plan
    #[arg(long)]
    pub allow_drop_table: bool,
}

// =============================================================================
// Introspect Command
// =============================================================================

/// Arguments for the `introspect` command
#[derive(Args, Debug)]
pub struct IntrospectArgs {
    /// Output format
    #[arg(short, long, default_value = "toml")]
    pub format: SchemaOutputFormat,

    /// Write the schema to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Schema output formats
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchemaOutputFormat {
    #[default]
    Toml,
    Json,
}

impl std::fmt::Display for SchemaOutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaOutputFormat::Toml => write!(f, "toml"),
            SchemaOutputFormat::Json => write!(f, "json"),
        }
    }
}
