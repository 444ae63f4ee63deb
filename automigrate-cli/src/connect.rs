//! Opening database connections from configuration.

use std::sync::Arc;

use automigrate_core::{
    DatabaseConnection, MigrationExecutor, MigrationGate, Provider, SchemaFile,
};
use tracing::debug;

use crate::config::Config;
use crate::error::{CliError, CliResult};

/// Open a connection for the configured provider.
pub async fn connect(config: &Config) -> CliResult<Arc<dyn DatabaseConnection>> {
    let provider = config.provider()?;
    let url = config.database_url()?;
    debug!(provider = %provider, "Opening database connection");

    match provider {
        #[cfg(feature = "sqlite")]
        Provider::Sqlite => {
            let conn = automigrate_sqlite::SqliteConnection::open_url(url)
                .await
                .map_err(|e| CliError::Database(e.to_string()))?;
            Ok(Arc::new(conn))
        }
        #[cfg(feature = "postgres")]
        Provider::Postgres => {
            let conn = automigrate_postgres::PgConnection::connect_url(url)
                .await
                .map_err(|e| CliError::Database(e.to_string()))?;
            Ok(Arc::new(conn))
        }
        other => Err(CliError::Config(format!(
            "no driver for provider '{}' in this build",
            other
        ))),
    }
}

/// Build an executor over the configured connection and model file.
pub async fn executor(config: &Config) -> CliResult<MigrationExecutor> {
    let connection = connect(config).await?;
    let model = SchemaFile::new(config.model_path())?;
    let executor = MigrationExecutor::new(connection, Arc::new(model), MigrationGate::new())?
        .with_introspection_config(config.introspection());
    Ok(executor)
}
