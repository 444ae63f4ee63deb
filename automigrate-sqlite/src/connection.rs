//! SQLite connection used by the migration engine.

use std::path::Path;

use automigrate_core::{DatabaseConnection, MigrateResult, Row};
use tokio_rusqlite::Connection;
use tracing::{debug, trace};

use crate::config::{DatabasePath, SqliteConfig};
use crate::error::{SqliteError, SqliteResult};
use crate::types::row_to_map;

/// A single SQLite connection.
///
/// All calls run on the connection's background thread in submission order.
/// Transactions are plain `BEGIN`/`COMMIT` statements, so DDL inside a run
/// is rolled back together with the rest of the batch.
#[derive(Clone)]
pub struct SqliteConnection {
    conn: Connection,
    config: SqliteConfig,
}

impl SqliteConnection {
    /// Open a connection and apply the configuration pragmas.
    pub async fn open(config: SqliteConfig) -> SqliteResult<Self> {
        let conn = match &config.path {
            DatabasePath::Memory => Connection::open_in_memory().await?,
            DatabasePath::File(path) => Connection::open(path).await?,
        };

        let init_sql = config.init_sql();
        conn.call(move |conn| {
            conn.execute_batch(&init_sql)?;
            Ok(())
        })
        .await?;

        debug!(path = ?config.path, "Opened SQLite connection");
        Ok(Self { conn, config })
    }

    /// Open a connection from a URL.
    pub async fn open_url(url: &str) -> SqliteResult<Self> {
        Self::open(SqliteConfig::from_url(url)?).await
    }

    /// Get the configuration.
    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// Run a query and return all rows.
    pub async fn query_rows(&self, sql: &str) -> SqliteResult<Vec<Row>> {
        let sql = sql.to_string();
        trace!(sql = %sql, "Executing query");

        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let columns: Vec<String> = stmt
                    .column_names()
                    .iter()
                    .map(|s| s.to_string())
                    .collect();

                let rows = stmt.query_map([], |row| row_to_map(row, &columns))?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await?;
        Ok(rows)
    }

    /// Execute one or more statements.
    pub async fn execute(&self, sql: &str) -> SqliteResult<()> {
        let sql = sql.to_string();
        debug!(sql = %sql, "Executing batch");

        self.conn
            .call(move |conn| {
                conn.execute_batch(&sql)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Write a compacted copy of the database to `dest`.
    pub async fn backup_to(&self, dest: &Path) -> SqliteResult<()> {
        if dest.exists() {
            return Err(SqliteError::backup(format!(
                "'{}' already exists",
                dest.display()
            )));
        }
        let target = dest
            .to_str()
            .ok_or_else(|| SqliteError::backup("backup path is not valid UTF-8"))?
            .replace('\'', "''");

        self.execute(&format!("VACUUM INTO '{}'", target)).await
    }
}

#[async_trait::async_trait]
impl DatabaseConnection for SqliteConnection {
    fn provider_name(&self) -> &str {
        "sqlite"
    }

    async fn ping(&self) -> MigrateResult<()> {
        self.conn
            .call(|conn| {
                conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
                Ok(())
            })
            .await
            .map_err(|e| SqliteError::connection(e.to_string()))?;
        Ok(())
    }

    async fn query(&self, sql: &str) -> MigrateResult<Vec<Row>> {
        Ok(self.query_rows(sql).await?)
    }

    async fn begin(&self) -> MigrateResult<()> {
        Ok(self.execute("BEGIN").await?)
    }

    async fn execute_batch(&self, sql: &str) -> MigrateResult<()> {
        Ok(self.execute(sql).await?)
    }

    async fn commit(&self) -> MigrateResult<()> {
        Ok(self.execute("COMMIT").await?)
    }

    async fn rollback(&self) -> MigrateResult<()> {
        Ok(self.execute("ROLLBACK").await?)
    }

    async fn backup(&self, dest: &Path) -> MigrateResult<()> {
        Ok(self.backup_to(dest).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use automigrate_core::RowExt;

    #[tokio::test]
    async fn test_query_rows() {
        let conn = SqliteConnection::open(SqliteConfig::memory()).await.unwrap();
        conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT); INSERT INTO t (name) VALUES ('a')")
            .await
            .unwrap();

        let rows = conn.query_rows("SELECT id, name FROM t").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_i64("id"), Some(1));
        assert_eq!(rows[0].get_str("name").as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_rollback_discards_ddl() {
        let conn = SqliteConnection::open(SqliteConfig::memory()).await.unwrap();
        conn.begin().await.unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER)").await.unwrap();
        conn.rollback().await.unwrap();

        let rows = conn
            .query_rows("SELECT name FROM sqlite_master WHERE name = 't'")
            .await
            .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_ping_and_provider() {
        let conn = SqliteConnection::open(SqliteConfig::memory()).await.unwrap();
        tokio_test::assert_ok!(conn.ping().await);
        assert_eq!(conn.provider_name(), "sqlite");
    }

    #[tokio::test]
    async fn test_backup_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let conn = SqliteConnection::open(SqliteConfig::file(dir.path().join("app.db")))
            .await
            .unwrap();
        conn.execute("CREATE TABLE t (id INTEGER)").await.unwrap();

        let dest = dir.path().join("backup.db");
        conn.backup(&dest).await.unwrap();
        assert!(dest.exists());

        let copy = SqliteConnection::open(SqliteConfig::file(&dest)).await.unwrap();
        let rows = copy
            .query_rows("SELECT name FROM sqlite_master WHERE name = 't'")
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);

        assert!(conn.backup(&dest).await.is_err());
    }
}
