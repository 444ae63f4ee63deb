//! Live database introspection.
//!
//! [`SchemaIntrospector`] reads catalog metadata through a
//! [`DatabaseConnection`] and produces the same [`DatabaseSchema`] shape the
//! declared model uses. Each dialect has its own catalog strategy:
//!
//! - PostgreSQL, MySQL and SQL Server issue one catalog-wide query per object
//!   kind and assemble the rows with shared code
//! - SQLite is read table by table through `PRAGMA` statements
//!
//! Tables in the dialect's default schema are reported unqualified so they
//! compare equal to unqualified declared tables.

mod catalog;
mod mssql;
mod mysql;
mod postgres;
pub mod queries;
mod sqlite;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::connection::{DatabaseConnection, Row, RowExt};
use crate::error::MigrateResult;
use crate::history::AUTO_MIGRATIONS_TABLE;
use crate::provider::Provider;
use crate::schema::{Column, DatabaseSchema, Sequence, Table};

use catalog::TableSet;

/// Configuration for introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntrospectionConfig {
    /// Catalog schemas to read. Empty reads every user schema (PostgreSQL,
    /// SQL Server) or the current database (MySQL).
    pub schemas: Vec<String>,
    /// Tables to leave out.
    pub exclude_tables: Vec<String>,
    /// Keep identifiers exactly as the catalog reports them. When false,
    /// identifiers are folded to lower case.
    pub use_database_names: bool,
}

impl Default for IntrospectionConfig {
    fn default() -> Self {
        Self {
            schemas: Vec::new(),
            exclude_tables: vec![AUTO_MIGRATIONS_TABLE.to_string()],
            use_database_names: true,
        }
    }
}

impl IntrospectionConfig {
    /// Create a new introspection config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read only this schema (may be called repeatedly).
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schemas.push(schema.into());
        self
    }

    /// Read only these schemas.
    pub fn schemas(mut self, schemas: Vec<String>) -> Self {
        self.schemas = schemas;
        self
    }

    /// Exclude these tables.
    pub fn exclude_tables(mut self, tables: Vec<String>) -> Self {
        self.exclude_tables = tables;
        self
    }

    /// Keep catalog identifiers as reported.
    pub fn use_database_names(mut self, enabled: bool) -> Self {
        self.use_database_names = enabled;
        self
    }

    /// Check if a table should be included.
    pub fn should_include_table(&self, name: &str) -> bool {
        !self
            .exclude_tables
            .iter()
            .any(|excluded| excluded.eq_ignore_ascii_case(name))
    }
}

/// Reads the live schema of a database.
#[derive(Debug, Clone)]
pub struct SchemaIntrospector {
    provider: Provider,
    config: IntrospectionConfig,
}

impl SchemaIntrospector {
    /// Create an introspector for a dialect.
    pub fn new(provider: Provider, config: IntrospectionConfig) -> Self {
        Self { provider, config }
    }

    /// The dialect being read.
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// The active configuration.
    pub fn config(&self) -> &IntrospectionConfig {
        &self.config
    }

    /// Read the live schema.
    pub async fn introspect(&self, conn: &dyn DatabaseConnection) -> MigrateResult<DatabaseSchema> {
        debug!(provider = %self.provider, schemas = ?self.config.schemas, "Introspecting database");

        let mut schema = match self.provider {
            Provider::Postgres => {
                catalog_schema(conn, self.provider, &self.config, postgres::parse_column).await?
            }
            Provider::MySql => {
                catalog_schema(conn, self.provider, &self.config, mysql::parse_column).await?
            }
            Provider::SqlServer => {
                catalog_schema(conn, self.provider, &self.config, mssql::parse_column).await?
            }
            Provider::Sqlite => sqlite::read_schema(conn, &self.config).await?,
        };

        schema
            .tables
            .retain(|t| self.config.should_include_table(&t.name));
        if !self.config.use_database_names {
            fold_case(&mut schema);
        }

        info!(
            provider = %self.provider,
            tables = schema.tables.len(),
            sequences = schema.sequences.len(),
            "Read database model"
        );
        Ok(schema)
    }
}

/// Run an optional catalog query.
async fn fetch(conn: &dyn DatabaseConnection, sql: Option<String>) -> MigrateResult<Vec<Row>> {
    match sql {
        Some(sql) => conn.query(&sql).await,
        None => Ok(Vec::new()),
    }
}

/// Read a catalog-wide dialect.
async fn catalog_schema<F>(
    conn: &dyn DatabaseConnection,
    provider: Provider,
    config: &IntrospectionConfig,
    parse_column: F,
) -> MigrateResult<DatabaseSchema>
where
    F: Fn(&Row) -> MigrateResult<Column> + Send + Sync,
{
    let schemas = &config.schemas;
    let current = conn
        .query(queries::current_schema_query(provider))
        .await?
        .first()
        .and_then(|row| row.get_str("name"));
    let default_schema = current.or_else(|| provider.default_schema().map(str::to_string));

    let mut set = TableSet::new(default_schema);
    set.add_tables(&conn.query(&queries::tables_query(provider, schemas)).await?)?;
    set.add_columns(
        &fetch(conn, queries::columns_query(provider, schemas)).await?,
        parse_column,
    )?;
    set.add_key_constraints(&fetch(conn, queries::key_constraints_query(provider, schemas)).await?)?;
    set.add_foreign_keys(&fetch(conn, queries::foreign_keys_query(provider, schemas)).await?)?;
    set.add_indexes(&fetch(conn, queries::indexes_query(provider, schemas)).await?)?;
    set.add_check_constraints(
        &fetch(conn, queries::check_constraints_query(provider, schemas)).await?,
    )?;

    let sequences = fetch(conn, queries::sequences_query(provider, schemas))
        .await?
        .iter()
        .map(|row| parse_sequence(row, &set))
        .collect::<MigrateResult<Vec<_>>>()?;

    let namespaces = fetch(conn, queries::schemas_query(provider, schemas))
        .await?
        .iter()
        .filter_map(|row| row.get_str("name"))
        .filter(|name| set.qualifier(Some(name.clone())).is_some())
        .collect();

    Ok(DatabaseSchema {
        schemas: namespaces,
        sequences,
        tables: set.into_tables(),
    })
}

/// Parse a sequence row. Bounds equal to the engine defaults are reported as
/// unset.
fn parse_sequence(row: &Row, set: &TableSet) -> MigrateResult<Sequence> {
    let mut sequence = Sequence::new(row.require_str("sequence_name")?);
    sequence.schema = set.qualifier(row.get_str("sequence_schema"));
    sequence.start = row.get_i64("start_value").unwrap_or(1);
    sequence.increment = row.get_i64("increment").unwrap_or(1);
    sequence.cycle = row.get_bool("cycle").unwrap_or(false);

    let ascending = sequence.increment > 0;
    sequence.min_value = row.get_i64("minimum_value").filter(|&min| {
        if ascending {
            min != 1 && min != i64::MIN
        } else {
            min != i64::MIN
        }
    });
    sequence.max_value = row.get_i64("maximum_value").filter(|&max| {
        if ascending {
            max != i64::MAX
        } else {
            max != -1 && max != i64::MAX
        }
    });
    Ok(sequence)
}

/// Fold every identifier to lower case.
fn fold_case(schema: &mut DatabaseSchema) {
    lower_all(&mut schema.schemas);
    for sequence in &mut schema.sequences {
        lower(&mut sequence.name);
        lower_opt(&mut sequence.schema);
    }
    for table in &mut schema.tables {
        fold_table(table);
    }
}

fn fold_table(table: &mut Table) {
    lower(&mut table.name);
    lower_opt(&mut table.schema);
    for column in &mut table.columns {
        lower(&mut column.name);
    }
    if let Some(pk) = table.primary_key.as_mut() {
        lower_all(&mut pk.columns);
        lower_opt(&mut pk.name);
    }
    for fk in &mut table.foreign_keys {
        lower_all(&mut fk.columns);
        lower_all(&mut fk.referenced_columns);
        lower(&mut fk.referenced_table);
        lower_opt(&mut fk.referenced_schema);
        lower_opt(&mut fk.name);
    }
    for unique in &mut table.unique_constraints {
        lower_all(&mut unique.columns);
        lower_opt(&mut unique.name);
    }
    for check in &mut table.check_constraints {
        lower(&mut check.name);
    }
    for index in &mut table.indexes {
        lower(&mut index.name);
        lower_all(&mut index.columns);
    }
}

fn lower(value: &mut String) {
    *value = value.to_ascii_lowercase();
}

fn lower_opt(value: &mut Option<String>) {
    if let Some(value) = value.as_mut() {
        lower(value);
    }
}

fn lower_all(values: &mut [String]) {
    values.iter_mut().for_each(lower);
}
