//! SQLite connection for the automigrate engine.
//!
//! This crate implements [`automigrate_core::DatabaseConnection`] on top of
//! `tokio-rusqlite`, so a SQLite database can be migrated by a
//! [`automigrate_core::MigrationExecutor`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use automigrate_core::{MigrationExecutor, MigrationGate, MigrationOptions};
//! use automigrate_sqlite::{SqliteConfig, SqliteConnection};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let conn = SqliteConnection::open(SqliteConfig::from_url("sqlite://./app.db")?).await?;
//!     let executor = MigrationExecutor::new(Arc::new(conn), Arc::new(model()), MigrationGate::new())?;
//!     executor.migrate(&MigrationOptions::default()).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod types;

pub use config::{DatabasePath, JournalMode, SqliteConfig};
pub use connection::SqliteConnection;
pub use error::{SqliteError, SqliteResult};
