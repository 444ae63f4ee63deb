//! Error types for the migration engine.

use thiserror::Error;

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrationError>;

/// Errors that can occur during migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database operation error.
    #[error("Database error: {0}")]
    Database(String),

    /// The connection could not be validated.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The provider identity is not one of the supported dialects.
    #[error("Unsupported database provider: '{0}'")]
    UnsupportedProvider(String),

    /// The dialect cannot express the operation.
    #[error("{provider} cannot render operation {operation}")]
    UnsupportedOperation {
        /// Provider name.
        provider: String,
        /// Operation kind.
        operation: String,
    },

    /// Catalog metadata could not be read.
    #[error("Introspection error: {0}")]
    Introspection(String),

    /// The declared model is malformed.
    #[error("Model error: {0}")]
    Model(String),

    /// The live and declared schemas cannot be reconciled.
    #[error("Diff error: {0}")]
    Diff(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The migration batch failed and was rolled back.
    #[error("Migration transaction failed: {0}")]
    Execution(String),

    /// Backup before migration failed.
    #[error("Backup failed: {0}")]
    Backup(String),

    /// Serialization of a schema or record failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl MigrationError {
    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create an unsupported operation error.
    pub fn unsupported_operation(provider: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            provider: provider.into(),
            operation: operation.into(),
        }
    }

    /// Create an introspection error.
    pub fn introspection(msg: impl Into<String>) -> Self {
        Self::Introspection(msg.into())
    }

    /// Create a model error.
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create a diff error.
    pub fn diff(msg: impl Into<String>) -> Self {
        Self::Diff(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an execution error.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Create a backup error.
    pub fn backup(msg: impl Into<String>) -> Self {
        Self::Backup(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Check if this is a recoverable error.
    ///
    /// Introspection and database read failures are recovered by treating the
    /// live schema as empty.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Introspection(_) | Self::Database(_))
    }
}

impl From<serde_json::Error> for MigrationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for MigrationError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(format!("Failed to parse TOML: {}", err))
    }
}

impl From<toml::ser::Error> for MigrationError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(format!("Failed to serialize TOML: {}", err))
    }
}
