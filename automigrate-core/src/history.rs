//! Audit record of applied migration runs.
//!
//! Each applied run can append one row to `__auto_migrations`. The table is
//! created on demand inside the same transaction as the run itself, so a
//! rolled back run leaves no record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::connection::{DatabaseConnection, RowExt};
use crate::error::{MigrateResult, MigrationError};
use crate::provider::Provider;
use crate::schema::TableRef;
use crate::sql::{generator_for, quote_string, MigrationCommand};

/// Name of the audit table.
pub const AUTO_MIGRATIONS_TABLE: &str = "__auto_migrations";

/// A record of an applied run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Run id, a UTC timestamp.
    pub id: String,
    /// SHA-256 of the executed batch.
    pub checksum: String,
    /// Number of operations applied.
    pub operation_count: i64,
    /// When the run was applied.
    pub applied_at: DateTime<Utc>,
}

impl MigrationRecord {
    /// Create the record for a batch about to be applied.
    pub fn for_batch(batch: &str, operation_count: usize) -> Self {
        let applied_at = Utc::now();
        Self {
            id: applied_at.format("%Y%m%d%H%M%S%6f").to_string(),
            checksum: checksum(batch),
            operation_count: operation_count as i64,
            applied_at,
        }
    }
}

/// Hex SHA-256 of a batch.
pub fn checksum(batch: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(batch.as_bytes());
    hex::encode(hasher.finalize())
}

fn table() -> TableRef {
    TableRef::unqualified(AUTO_MIGRATIONS_TABLE)
}

/// Statement creating the audit table when it does not exist.
pub fn create_table_sql(provider: Provider) -> String {
    let q = |name: &str| provider.quote_identifier(name);
    let text = match provider {
        Provider::SqlServer => "NVARCHAR(64)",
        _ => "VARCHAR(64)",
    };
    let body = format!(
        "{} (\n    {} {text} NOT NULL PRIMARY KEY,\n    {} {text} NOT NULL,\n    {} INTEGER NOT NULL,\n    {} {text} NOT NULL\n)",
        q(AUTO_MIGRATIONS_TABLE),
        q("id"),
        q("checksum"),
        q("operation_count"),
        q("applied_at"),
        text = text,
    );

    match provider {
        Provider::SqlServer => format!(
            "IF OBJECT_ID(N{}, N'U') IS NULL CREATE TABLE {}",
            quote_string(&q(AUTO_MIGRATIONS_TABLE)),
            body
        ),
        Provider::MySql => format!("CREATE TABLE IF NOT EXISTS {};", body),
        Provider::Postgres | Provider::Sqlite => format!("CREATE TABLE IF NOT EXISTS {}", body),
    }
}

/// Statement inserting a record.
pub fn insert_sql(provider: Provider, record: &MigrationRecord) -> String {
    let columns = ["id", "checksum", "operation_count", "applied_at"].map(String::from);
    let row = vec![
        Value::from(record.id.clone()),
        Value::from(record.checksum.clone()),
        Value::from(record.operation_count),
        Value::from(record.applied_at.to_rfc3339()),
    ];
    let mut sql = generator_for(provider)
        .insert_data(&table(), &columns, &[row])
        .concat();
    if provider == Provider::MySql {
        sql.push(';');
    }
    sql
}

/// Commands appended to a batch to record it.
pub fn record_commands(provider: Provider, record: &MigrationRecord) -> Vec<MigrationCommand> {
    vec![
        MigrationCommand::new(provider, create_table_sql(provider)),
        MigrationCommand::new(provider, insert_sql(provider, record)),
    ]
}

/// Query returning a row when the audit table exists.
fn exists_sql(provider: Provider) -> String {
    let name = quote_string(AUTO_MIGRATIONS_TABLE);
    match provider {
        Provider::Sqlite => format!(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = {}",
            name
        ),
        Provider::Postgres => format!(
            "SELECT table_name AS name FROM information_schema.tables WHERE table_schema = current_schema() AND table_name = {}",
            name
        ),
        Provider::MySql => format!(
            "SELECT table_name AS name FROM information_schema.tables WHERE table_schema = DATABASE() AND table_name = {}",
            name
        ),
        Provider::SqlServer => format!(
            "SELECT name FROM sys.tables WHERE name = {} AND schema_id = SCHEMA_ID()",
            name
        ),
    }
}

/// Read every record, oldest first. A database that was never migrated has
/// no records.
pub async fn read_records(
    conn: &dyn DatabaseConnection,
    provider: Provider,
) -> MigrateResult<Vec<MigrationRecord>> {
    if conn.query(&exists_sql(provider)).await?.is_empty() {
        return Ok(Vec::new());
    }

    let q = |name: &str| provider.quote_identifier(name);
    let sql = format!(
        "SELECT {}, {}, {}, {} FROM {} ORDER BY {}",
        q("id"),
        q("checksum"),
        q("operation_count"),
        q("applied_at"),
        q(AUTO_MIGRATIONS_TABLE),
        q("id")
    );

    conn.query(&sql)
        .await?
        .iter()
        .map(|row| {
            let applied_at = row.require_str("applied_at")?;
            Ok(MigrationRecord {
                id: row.require_str("id")?,
                checksum: row.require_str("checksum")?,
                operation_count: row.get_i64("operation_count").unwrap_or(0),
                applied_at: DateTime::parse_from_rfc3339(&applied_at)
                    .map_err(|e| {
                        MigrationError::serialization(format!(
                            "invalid applied_at '{}': {}",
                            applied_at, e
                        ))
                    })?
                    .with_timezone(&Utc),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_record_for_batch() {
        let record = MigrationRecord::for_batch("CREATE TABLE a (x INTEGER)", 1);
        assert_eq!(record.checksum.len(), 64);
        assert_eq!(record.checksum, checksum("CREATE TABLE a (x INTEGER)"));
        assert_ne!(record.checksum, checksum("CREATE TABLE b (x INTEGER)"));
        assert_eq!(record.operation_count, 1);
        assert_eq!(record.id.len(), 20);
    }

    #[test]
    fn test_create_table_per_dialect() {
        assert!(create_table_sql(Provider::Sqlite)
            .starts_with("CREATE TABLE IF NOT EXISTS \"__auto_migrations\""));
        assert!(create_table_sql(Provider::MySql).ends_with(");"));
        assert!(create_table_sql(Provider::SqlServer)
            .starts_with("IF OBJECT_ID(N'[__auto_migrations]', N'U') IS NULL CREATE TABLE [__auto_migrations]"));
    }

    #[test]
    fn test_insert_sql() {
        let record = MigrationRecord::for_batch("SELECT 1", 3);
        let sql = insert_sql(Provider::Postgres, &record);
        assert!(sql.starts_with(
            "INSERT INTO \"__auto_migrations\" (\"id\", \"checksum\", \"operation_count\", \"applied_at\") VALUES ("
        ));
        assert!(sql.contains(&format!("'{}'", record.checksum)));
        assert!(sql.contains(", 3, "));

        let sql = insert_sql(Provider::SqlServer, &record);
        assert!(sql.contains(&format!("N'{}'", record.id)));
        assert!(insert_sql(Provider::MySql, &record).ends_with(");"));
    }
}
