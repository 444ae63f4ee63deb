//! Database connection abstraction used by the engine.
//!
//! Drivers implement [`DatabaseConnection`]. Catalog reads return rows as JSON
//! maps so introspection can be written once per dialect, independent of the
//! driver's native row type.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{MigrateResult, MigrationError};

/// A result row keyed by column name.
pub type Row = Map<String, Value>;

/// Connection to a live database.
///
/// `begin`, `execute_batch` and `commit`/`rollback` are always called in that
/// order by one task at a time; the connection does not need to support
/// interleaved transactions.
#[async_trait::async_trait]
pub trait DatabaseConnection: Send + Sync {
    /// Provider identity, such as `"postgresql"` or `"sqlite"`.
    fn provider_name(&self) -> &str;

    /// Check that the connection is usable.
    async fn ping(&self) -> MigrateResult<()>;

    /// Run a read query and collect its rows.
    async fn query(&self, sql: &str) -> MigrateResult<Vec<Row>>;

    /// Open a transaction.
    async fn begin(&self) -> MigrateResult<()>;

    /// Execute a multi-statement batch inside the open transaction.
    async fn execute_batch(&self, sql: &str) -> MigrateResult<()>;

    /// Commit the open transaction.
    async fn commit(&self) -> MigrateResult<()>;

    /// Roll back the open transaction.
    async fn rollback(&self) -> MigrateResult<()>;

    /// Write a full backup of the database to `dest`.
    async fn backup(&self, dest: &Path) -> MigrateResult<()> {
        let _ = dest;
        Err(MigrationError::backup(format!(
            "backups are not supported for {}",
            self.provider_name()
        )))
    }
}

/// Lenient accessors for catalog rows.
///
/// Column lookup ignores case, since catalogs differ in how they case result
/// column names.
pub trait RowExt {
    /// Raw value of a column.
    fn value(&self, column: &str) -> Option<&Value>;

    /// Column as a string. Numbers and booleans are stringified.
    fn get_str(&self, column: &str) -> Option<String> {
        match self.value(column)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Column as a string, failing if it is missing.
    fn require_str(&self, column: &str) -> MigrateResult<String> {
        self.get_str(column).ok_or_else(|| {
            MigrationError::introspection(format!("catalog row is missing column '{}'", column))
        })
    }

    /// Column as an integer. Accepts numbers and numeric strings.
    fn get_i64(&self, column: &str) -> Option<i64> {
        match self.value(column)? {
            Value::Number(n) => n.as_i64(),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Column as a boolean. Accepts booleans, `0`/`1`, `YES`/`NO` and `t`/`f`.
    fn get_bool(&self, column: &str) -> Option<bool> {
        match self.value(column)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|v| v != 0),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "t" | "true" | "y" | "yes" => Some(true),
                "0" | "f" | "false" | "n" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl RowExt for Row {
    fn value(&self, column: &str) -> Option<&Value> {
        self.get(column).or_else(|| {
            self.iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(column))
                .map(|(_, value)| value)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let r = row(json!({ "COLUMN_NAME": "id", "is_nullable": "NO" }));
        assert_eq!(r.get_str("column_name").as_deref(), Some("id"));
        assert_eq!(r.get_bool("IS_NULLABLE"), Some(false));
    }

    #[test]
    fn test_lenient_numbers_and_booleans() {
        let r = row(json!({ "notnull": 1, "pk": "2", "flag": "t", "missing": null }));
        assert_eq!(r.get_bool("notnull"), Some(true));
        assert_eq!(r.get_i64("pk"), Some(2));
        assert_eq!(r.get_bool("flag"), Some(true));
        assert_eq!(r.get_str("missing"), None);
        assert_eq!(r.get_str("notnull").as_deref(), Some("1"));
    }

    #[test]
    fn test_require_str_reports_column() {
        let r = row(json!({}));
        let err = r.require_str("table_name").unwrap_err();
        assert!(err.to_string().contains("table_name"));
    }
}
