//! # automigrate
//!
//! Automatic schema migrations for Rust applications.
//!
//! automigrate compares a declared model with the schema a live database
//! reports, filters the differences through a safety policy and applies the
//! remaining changes in one transaction. It provides:
//! - Catalog introspection for PostgreSQL, MySQL, SQLite and SQL Server
//! - A differ producing ordered, dependency-aware change operations
//! - Per-dialect SQL generation and script rendering
//! - A transactional executor with a single-flight gate and an audit record
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use automigrate::prelude::*;
//! use automigrate::sqlite::{SqliteConfig, SqliteConnection};
//!
//! struct User;
//!
//! impl Entity for User {
//!     fn table() -> Table {
//!         Table::new("users")
//!             .column(Column::new("id", ColumnType::Int).auto_increment())
//!             .column(Column::new("email", ColumnType::VarChar(Some(255))))
//!             .primary_key(["id"])
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let conn = SqliteConnection::open(SqliteConfig::file("app.db")).await?;
//!     let model = ModelBuilder::new().entity::<User>();
//!     let executor = MigrationExecutor::new(Arc::new(conn), Arc::new(model), MigrationGate::new())?;
//!
//!     let outcome = executor.migrate(&MigrationOptions::default()).await?;
//!     println!("{}: {} operation(s)", outcome.status, outcome.applied.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `sqlite` (default): the [`sqlite`] driver
//! - `postgres`: the [`postgres`] driver

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use automigrate_core as core;

/// SQLite driver.
#[cfg(feature = "sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlite")))]
pub mod sqlite {
    pub use automigrate_sqlite::*;
}

/// PostgreSQL driver.
#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres {
    pub use automigrate_postgres::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use automigrate_core::{
        Column, ColumnType, DatabaseConnection, DatabaseSchema, Entity, ForeignKey, Index,
        MigrationExecutor, MigrationGate, MigrationOptions, MigrationOutcome, ModelBuilder,
        ModelProvider, OutcomeStatus, Provider, ReferentialAction, SchemaFile, Table,
    };
}

// Re-export key types at the crate root
pub use automigrate_core::{MigrateResult, MigrationError};
