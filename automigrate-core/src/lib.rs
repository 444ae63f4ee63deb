//! # automigrate-core
//!
//! Automatic schema migration engine.
//!
//! This crate provides functionality for:
//! - Catalog introspection for PostgreSQL, MySQL, SQLite and SQL Server
//! - A declared schema model built from entities, code or schema files
//! - Schema diffing with a dependency-safe operation order
//! - A declarative safety policy that keeps destructive operations out by default
//! - Dialect-specific SQL generation
//! - Transactional execution under a single-flight gate, with an audit record
//!
//! ## Architecture
//!
//! At startup the host hands a connection and a model to a
//! [`MigrationExecutor`] and calls [`MigrationExecutor::migrate`]. Every run
//! reads the live schema again; nothing is cached between runs.
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌───────────────┐
//! │ Live DB      │────▶│ Introspector   │────▶│               │
//! └──────────────┘     └────────────────┘     │ Schema Differ │
//! ┌──────────────┐     ┌────────────────┐     │               │
//! │ Entities     │────▶│ Model Provider │────▶│               │
//! └──────────────┘     └────────────────┘     └───────────────┘
//!                                                     │
//!                                                     ▼
//!                      ┌────────────────┐     ┌───────────────┐
//!                      │ SQL Generator  │◀────│ Policy Filter │
//!                      └────────────────┘     └───────────────┘
//!                              │
//!                              ▼
//!                      ┌────────────────┐     ┌───────────────┐
//!                      │ Transaction    │────▶│ Audit Record  │
//!                      └────────────────┘     └───────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use automigrate_core::{MigrationExecutor, MigrationGate, MigrationOptions, ModelBuilder};
//!
//! async fn run(conn: Arc<dyn automigrate_core::DatabaseConnection>) -> automigrate_core::MigrateResult<()> {
//!     let model = ModelBuilder::new().entity::<User>().entity::<Post>();
//!     let gate = MigrationGate::new();
//!
//!     let executor = MigrationExecutor::new(conn, Arc::new(model), gate)?;
//!     let outcome = executor.migrate(&MigrationOptions::default()).await?;
//!     println!("{}: {} operations", outcome.status, outcome.applied.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Safety policy
//!
//! Only `CreateTable` and `AddColumn` run unconditionally. `DropTable` and
//! `DropColumn` run only when enabled in [`MigrationOptions`]. Everything
//! else the differ finds is reported in [`MigrationOutcome::skipped`].

pub mod connection;
pub mod diff;
pub mod error;
pub mod executor;
pub mod history;
pub mod introspect;
pub mod lock;
pub mod model;
pub mod operation;
pub mod options;
pub mod policy;
pub mod provider;
pub mod schema;
pub mod sql;

// Re-exports
pub use connection::{DatabaseConnection, Row, RowExt};
pub use diff::SchemaDiffer;
pub use error::{MigrateResult, MigrationError};
pub use executor::{MigrationExecutor, MigrationOutcome, MigrationPhase, OutcomeStatus};
pub use history::{AUTO_MIGRATIONS_TABLE, MigrationRecord};
pub use introspect::{IntrospectionConfig, SchemaIntrospector};
pub use lock::{MigrationGate, MigrationGuard};
pub use model::{Entity, ModelBuilder, ModelProvider, SchemaFile, SchemaFormat};
pub use operation::{ChangeOperation, OperationKind};
pub use options::MigrationOptions;
pub use policy::{FilteredOperations, OperationPolicy, PolicyFlag, PolicyRule};
pub use provider::Provider;
pub use schema::{
    CheckConstraint, Column, ColumnType, DatabaseSchema, ForeignKey, Index, PrimaryKey,
    ReferentialAction, Sequence, Table, TableRef, UniqueConstraint,
};
pub use sql::{
    MigrationCommand, MssqlGenerator, MySqlGenerator, PostgresSqlGenerator, SqlGenerator,
    SqliteGenerator, generate, generator_for, join_commands, render_script,
};
