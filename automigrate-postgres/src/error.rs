//! Error types for PostgreSQL operations.

use automigrate_core::MigrationError;
use thiserror::Error;

/// Result type for PostgreSQL operations.
pub type PgResult<T> = Result<T, PgError>;

/// Errors that can occur during PostgreSQL operations.
#[derive(Error, Debug)]
pub enum PgError {
    /// PostgreSQL error.
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection error.
    #[error("connection error: {0}")]
    Connection(String),
}

impl PgError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Check if the server closed the connection.
    pub fn is_closed(&self) -> bool {
        match self {
            Self::Postgres(e) => e.is_closed(),
            Self::Connection(_) => true,
            Self::Config(_) => false,
        }
    }
}

impl From<PgError> for MigrationError {
    fn from(err: PgError) -> Self {
        match err {
            PgError::Postgres(e) => {
                // Server errors carry the message and SQLSTATE in the DbError.
                match e.as_db_error() {
                    Some(db) => MigrationError::database(format!("{} ({})", db.message(), db.code().code())),
                    None => MigrationError::database(e.to_string()),
                }
            }
            PgError::Config(msg) => MigrationError::config(msg),
            PgError::Connection(msg) => MigrationError::connection(msg),
        }
    }
}
