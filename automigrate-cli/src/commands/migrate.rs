//! `automigrate migrate` command - Apply pending model changes.

use automigrate_core::{MigrationOptions, MigrationOutcome, OutcomeStatus};

use crate::cli::MigrateArgs;
use crate::config::Config;
use crate::connect;
use crate::error::{CliError, CliResult};
use crate::output::{self, kv, success, warn};

/// Run the migrate command
pub async fn run(config: &Config, args: MigrateArgs) -> CliResult<()> {
    output::header("Migrate");

    let options = options(config, &args);
    let executor = connect::executor(config).await?;

    kv("Provider", executor.provider().as_str());
    kv("Model", &config.model_path().display().to_string());
    output::newline();

    let outcome = executor.migrate(&options).await?;
    report(&outcome);

    if outcome.status == OutcomeStatus::Failed {
        return Err(CliError::Migration(
            outcome
                .error
                .unwrap_or_else(|| "migration failed".to_string()),
        ));
    }
    Ok(())
}

/// Merge command-line flags over the configured options.
pub fn options(config: &Config, args: &MigrateArgs) -> MigrationOptions {
    let mut options = config.migration.clone();
    if args.dry_run {
        options.dry_run = true;
    }
    if args.allow_drop_column {
        options.allow_drop_column = true;
    }
    if args.allow_drop_table {
        options.allow_drop_table = true;
    }
    if args.backup {
        options.backup_database = true;
    }
    if args.no_halt {
        options.halt_on_failure = false;
    }
    if let Some(script) = &args.script {
        options = options.script_path(script.clone());
    }
    options
}

/// Print the outcome of a run
pub fn report(outcome: &MigrationOutcome) {
    kv("Status", &output::style_status(outcome.status));
    kv("Duration", &format!("{}ms", outcome.duration_ms));

    if !outcome.applied.is_empty() {
        output::newline();
        output::section("Operations");
        for op in &outcome.applied {
            output::list_item(&op.to_string());
        }
    }

    if !outcome.skipped.is_empty() {
        output::newline();
        warn(&format!(
            "{} operation(s) skipped by policy:",
            outcome.skipped.len()
        ));
        for op in &outcome.skipped {
            output::list_item(&op.to_string());
        }
    }

    if let Some(backup) = &outcome.backup {
        kv("Backup", &backup.display().to_string());
    }

    output::newline();
    match outcome.status {
        OutcomeStatus::NoChanges => output::info("Database is up to date"),
        OutcomeStatus::Applied => success(&format!(
            "Applied {} operation(s)",
            outcome.applied.len()
        )),
        OutcomeStatus::ScriptOnly => {
            if let Some(script) = &outcome.script {
                output::code(script);
            }
            output::info("Dry run, nothing was executed");
        }
        OutcomeStatus::Failed => {}
    }
}
