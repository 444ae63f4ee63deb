//! `automigrate history` command - List applied migrations.

use automigrate_core::history;

use crate::config::Config;
use crate::connect;
use crate::error::CliResult;
use crate::output::{self, kv};

/// Run the history command
pub async fn run(config: &Config) -> CliResult<()> {
    output::header("Migration History");

    let provider = config.provider()?;
    let conn = connect::connect(config).await?;
    let records = history::read_records(conn.as_ref(), provider).await?;

    if records.is_empty() {
        output::info("No migrations have been applied");
        return Ok(());
    }

    for record in &records {
        output::section(&record.id);
        kv("Applied", &record.applied_at.to_rfc3339());
        kv("Operations", &record.operation_count.to_string());
        kv("Checksum", &record.checksum);
        output::newline();
    }
    output::dim(&format!("{} migration(s)", records.len()));
    Ok(())
}
