//! `automigrate version` command - Display version information.

use crate::error::CliResult;
use crate::output::{self, kv};

/// Package version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name
const NAME: &str = env!("CARGO_PKG_NAME");

/// Run the version command
pub async fn run() -> CliResult<()> {
    output::header("automigrate");

    kv("Version", VERSION);
    kv("Binary", NAME);

    #[cfg(debug_assertions)]
    let build_mode = "debug";
    #[cfg(not(debug_assertions))]
    let build_mode = "release";

    kv("Build", build_mode);

    let mut drivers = Vec::new();

    #[cfg(feature = "postgres")]
    drivers.push("postgresql");

    #[cfg(feature = "sqlite")]
    drivers.push("sqlite");

    if drivers.is_empty() {
        drivers.push("none");
    }

    kv("Drivers", &drivers.join(", "));
    kv("Script dialects", "postgresql, mysql, sqlite, sqlserver");

    output::newline();
    Ok(())
}
