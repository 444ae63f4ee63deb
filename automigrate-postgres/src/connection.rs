//! PostgreSQL connection used by the migration engine.

use automigrate_core::{DatabaseConnection, MigrateResult, Row};
use serde_json::Value;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};
use tracing::{debug, error, trace};

use crate::config::PgConfig;
use crate::error::{PgError, PgResult};

/// A single PostgreSQL session.
///
/// Catalog reads and migration batches go through the simple query protocol,
/// so every value arrives as text and multi-statement batches run as sent.
pub struct PgConnection {
    client: Client,
    config: PgConfig,
}

impl PgConnection {
    /// Connect and spawn the connection driver task.
    pub async fn connect(config: PgConfig) -> PgResult<Self> {
        let (client, connection) = config
            .to_pg_config()
            .connect(NoTls)
            .await
            .map_err(|e| PgError::connection(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "PostgreSQL connection closed with error");
            }
        });

        debug!(host = %config.host, database = %config.database, "Connected to PostgreSQL");
        Ok(Self { client, config })
    }

    /// Connect from a URL.
    pub async fn connect_url(url: &str) -> PgResult<Self> {
        Self::connect(PgConfig::from_url(url)?).await
    }

    /// Get the configuration.
    pub fn config(&self) -> &PgConfig {
        &self.config
    }

    /// Run a query and return its rows with text values.
    pub async fn query_rows(&self, sql: &str) -> PgResult<Vec<Row>> {
        trace!(sql = %sql, "Executing query");
        let messages = self.client.simple_query(sql).await?;
        Ok(messages
            .into_iter()
            .filter_map(|message| match message {
                SimpleQueryMessage::Row(row) => {
                    let mut map = Row::new();
                    for (i, column) in row.columns().iter().enumerate() {
                        let value = row
                            .get(i)
                            .map(|v| Value::String(v.to_string()))
                            .unwrap_or(Value::Null);
                        map.insert(column.name().to_string(), value);
                    }
                    Some(map)
                }
                _ => None,
            })
            .collect())
    }

    /// Execute one or more statements.
    pub async fn execute(&self, sql: &str) -> PgResult<()> {
        debug!(sql = %sql, "Executing batch");
        self.client.batch_execute(sql).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl DatabaseConnection for PgConnection {
    fn provider_name(&self) -> &str {
        "postgresql"
    }

    async fn ping(&self) -> MigrateResult<()> {
        if self.client.is_closed() {
            return Err(PgError::connection("connection is closed").into());
        }
        self.client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| PgError::connection(e.to_string()))?;
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
}
