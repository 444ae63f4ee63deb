//! automigrate CLI - Command-line interface for the automigrate engine.

use clap::Parser;

use automigrate_cli::cli::{Cli, Command};
use automigrate_cli::commands;
use automigrate_cli::config::Config;
use automigrate_cli::error::CliResult;
use automigrate_cli::{logging, output};

#[tokio::main]
async fn main() {
    // Run the CLI and handle errors
    if let Err(e) = run().await {
        output::newline();
        output::error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    // Commands that never touch the database
    if let Command::Version = cli.command {
        return commands::version::run().await;
    }

    let config = Config::load(&cli.config)?.with_database_url(cli.database_url);

    match cli.command {
        Command::Migrate(args) => commands::migrate::run(&config, args).await,
        Command::Plan(args) => commands::plan::run(&config, args).await,
        Command::Introspect(args) => commands::introspect::run(&config, args).await,
        Command::History => commands::history::run(&config).await,
        Command::Version => commands::version::run().await,
    }
}
