//! CLI configuration handling.

use std::path::{Path, PathBuf};

use automigrate_core::{IntrospectionConfig, MigrationOptions, Provider};
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};

/// Default config file name (lives in project root)
pub const CONFIG_FILE_NAME: &str = "automigrate.toml";

/// Default declared model file (relative to the config file)
pub const MODEL_FILE_NAME: &str = "schema.toml";

/// automigrate CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Declared model configuration
    pub model: ModelConfig,

    /// Options applied to every migration run
    pub migration: MigrationOptions,

    /// Directory the config was loaded from
    #[serde(skip)]
    root: PathBuf,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> CliResult<Self> {
        if !path.exists() {
            return Err(CliError::Config(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    /// Override the database URL
    pub fn with_database_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url {
            self.database.url = url;
        }
        self
    }

    /// Database URL, failing when none is configured
    pub fn database_url(&self) -> CliResult<&str> {
        if self.database.url.trim().is_empty() {
            return Err(CliError::Config(
                "database.url is not set (use [database] url or AUTOMIGRATE_DATABASE_URL)".into(),
            ));
        }
        Ok(&self.database.url)
    }

    /// Provider from the explicit setting or the URL scheme
    pub fn provider(&self) -> CliResult<Provider> {
        let provider = match &self.database.provider {
            Some(name) => name.parse()?,
            None => Provider::from_url(self.database_url()?)?,
        };
        Ok(provider)
    }

    /// Model file path, resolved against the config directory
    pub fn model_path(&self) -> PathBuf {
        if self.model.path.is_absolute() {
            self.model.path.clone()
        } else {
            self.root.join(&self.model.path)
        }
    }

    /// Introspection settings for the configured schema
    pub fn introspection(&self) -> IntrospectionConfig {
        let mut config = IntrospectionConfig::default();
        if let Some(schema) = &self.database.schema {
            config = config.schema(schema.clone());
        }
        if !self.database.exclude_tables.is_empty() {
            let mut excluded = config.exclude_tables.clone();
            excluded.extend(self.database.exclude_tables.iter().cloned());
            config = config.exclude_tables(excluded);
        }
        config
    }
}

/// Database configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL
    pub url: String,

    /// Database provider (postgresql, sqlite, mysql, sqlserver)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Catalog schema to introspect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Extra tables left out of introspection
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude_tables: Vec<String>,
}

/// Declared model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Schema file (`.toml` or `.json`)
    pub path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(MODEL_FILE_NAME),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_load_full_config() {
        let (dir, path) = write_config(
            r#"
            [database]
            url = "postgres://localhost/app"
            schema = "app"

            [model]
            path = "model/schema.json"

            [migration]
            allow_drop_column = true
            backup_database = true
            "#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.provider().unwrap(), Provider::Postgres);
        assert_eq!(config.model_path(), dir.path().join("model/schema.json"));
        assert!(config.migration.allow_drop_column);
        assert!(config.migration.backup_database);
        assert!(!config.migration.allow_drop_table);
        assert_eq!(config.introspection().schemas, vec!["app".to_string()]);
    }

    #[test]
    fn test_defaults() {
        let (dir, path) = write_config("[database]\nurl = \"sqlite://app.db\"\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.provider().unwrap(), Provider::Sqlite);
        assert_eq!(config.model_path(), dir.path().join(MODEL_FILE_NAME));
        assert_eq!(config.migration, MigrationOptions::default());
    }

    #[test]
    fn test_explicit_provider_wins() {
        let (_dir, path) = write_config(
            "[database]\nurl = \"file:app.db\"\nprovider = \"sqlite3\"\nexclude_tables = [\"audit\"]\n",
        );
        let config = Config::load(&path).unwrap();
        assert_eq!(config.provider().unwrap(), Provider::Sqlite);
        assert!(!config.introspection().should_include_table("audit"));
        assert!(!config.introspection().should_include_table("__auto_migrations"));
    }

    #[test]
    fn test_missing_url() {
        let (_dir, path) = write_config("[model]\npath = \"schema.toml\"\n");
        let config = Config::load(&path).unwrap();
        assert!(matches!(config.provider(), Err(CliError::Config(_))));

        let config = config.with_database_url(Some("sqlite://x.db".into()));
        assert_eq!(config.database_url().unwrap(), "sqlite://x.db");
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Path::new("/nonexistent/automigrate.toml")).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }
}
