//! PostgreSQL connection for the automigrate engine.
//!
//! [`PgConnection`] implements [`automigrate_core::DatabaseConnection`] over
//! `tokio-postgres`. PostgreSQL runs DDL transactionally, so a failed batch
//! leaves the schema exactly as it was.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use automigrate_core::{MigrationExecutor, MigrationGate, MigrationOptions};
//! use automigrate_postgres::PgConnection;
//!
//! let conn = PgConnection::connect_url("postgres://app@localhost/shop").await?;
//! let executor = MigrationExecutor::new(Arc::new(conn), Arc::new(model), MigrationGate::new())?;
//! let outcome = executor.migrate(&MigrationOptions::default()).await?;
//! ```

pub mod config;
pub mod connection;
pub mod error;

pub use config::PgConfig;
pub use connection::PgConnection;
pub use error::{PgError, PgResult};
