//! `automigrate plan` command - Print the pending migration script.

use crate::cli::PlanArgs;
use crate::config::Config;
use crate::connect;
use crate::error::CliResult;
use crate::output::{self, success};

/// Run the plan command
pub async fn run(config: &Config, args: PlanArgs) -> CliResult<()> {
    let mut options = config.migration.clone();
    options.allow_drop_column |= args.allow_drop_column;
    options.allow_drop_table |= args.allow_drop_table;
    if let Some(path) = &args.output {
        options = options.script_path(path.clone());
    }

    let executor = connect::executor(config).await?;
    let outcome = executor.plan(&options).await?;

    for op in &outcome.skipped {
        output::warn(&format!("skipped by policy: {}", op));
    }

    if outcome.applied.is_empty() {
        output::info("No pending model changes");
        return Ok(());
    }

    match (&args.output, &outcome.script) {
        (Some(path), _) => success(&format!(
            "Wrote {} statement(s) to {}",
            outcome.commands.len(),
            path.display()
        )),
        (None, Some(script)) => print!("{}", script),
        (None, None) => {}
    }
    Ok(())
}
