//! CLI error types and result alias.

use automigrate_core::MigrationError;
use miette::Diagnostic;
use thiserror::Error;

/// Result type alias for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI error types
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// IO error
    #[error("IO error: {0}")]
    #[diagnostic(code(automigrate::io))]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(automigrate::config),
        help("check automigrate.toml or pass --config")
    )]
    Config(String),

    /// Model loading error
    #[error("Model error: {0}")]
    #[diagnostic(code(automigrate::model))]
    Model(String),

    /// Database error
    #[error("Database error: {0}")]
    #[diagnostic(code(automigrate::database))]
    Database(String),

    /// Migration error
    #[error("Migration error: {0}")]
    #[diagnostic(code(automigrate::migration))]
    Migration(String),

    /// Format error
    #[error("Format error: {0}")]
    #[diagnostic(code(automigrate::format))]
    Format(String),
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        CliError::Config(format!("Failed to parse TOML: {}", err))
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Format(format!("Failed to serialize JSON: {}", err))
    }
}

impl From<MigrationError> for CliError {
    fn from(err: MigrationError) -> Self {
        match err {
            MigrationError::Io(e) => CliError::Io(e),
            MigrationError::Config(msg) | MigrationError::UnsupportedProvider(msg) => {
                CliError::Config(msg)
            }
            MigrationError::Model(msg) => CliError::Model(msg),
            MigrationError::Connection(msg)
            | MigrationError::Database(msg)
            | MigrationError::Introspection(msg) => CliError::Database(msg),
            MigrationError::Serialization(msg) => CliError::Format(msg),
            other => CliError::Migration(other.to_string()),
        }
    }
}
