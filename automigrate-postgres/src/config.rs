//! PostgreSQL connection configuration.

use std::fmt;
use std::time::Duration;

use crate::error::{PgError, PgResult};

/// PostgreSQL connection configuration.
#[derive(Clone)]
pub struct PgConfig {
    /// Host.
    pub host: String,
    /// Port (default: 5432).
    pub port: u16,
    /// Database name.
    pub database: String,
    /// Username.
    pub user: String,
    /// Password.
    pub password: Option<String>,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Statement timeout applied to every statement of the session.
    pub statement_timeout: Option<Duration>,
    /// Application name (shown in pg_stat_activity).
    pub application_name: String,
    /// Schemas put on the session's `search_path`.
    pub search_path: Vec<String>,
}

impl fmt::Debug for PgConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("connect_timeout", &self.connect_timeout)
            .field("statement_timeout", &self.statement_timeout)
            .field("application_name", &self.application_name)
            .field("search_path", &self.search_path)
            .finish()
    }
}

impl PgConfig {
    /// Parse a `postgres://` or `postgresql://` URL.
    ///
    /// Query parameters: `sslmode` (`disable` or `prefer`), `connect_timeout`
    /// (seconds), `statement_timeout` (milliseconds), `application_name`,
    /// `search_path` (comma separated).
    pub fn from_url(url: impl AsRef<str>) -> PgResult<Self> {
        let parsed = url::Url::parse(url.as_ref())
            .map_err(|e| PgError::config(format!("invalid database URL: {}", e)))?;

        if parsed.scheme() != "postgresql" && parsed.scheme() != "postgres" {
            return Err(PgError::config(format!(
                "invalid scheme: expected 'postgresql' or 'postgres', got '{}'",
                parsed.scheme()
            )));
        }

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| PgError::config("missing host in URL"))?
            .to_string();

        let database = parsed.path().trim_start_matches('/').to_string();
        if database.is_empty() {
            return Err(PgError::config("missing database name in URL"));
        }

        let user = if parsed.username().is_empty() {
            "postgres".to_string()
        } else {
            parsed.username().to_string()
        };

        let mut config = Self {
            host,
            port: parsed.port().unwrap_or(5432),
            database,
            user,
            password: parsed.password().map(String::from),
            connect_timeout: Duration::from_secs(30),
            statement_timeout: None,
            application_name: "automigrate".to_string(),
            search_path: Vec::new(),
        };

        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "sslmode" => match value.as_ref() {
                    "disable" | "prefer" => {}
                    other => {
                        return Err(PgError::config(format!(
                            "unsupported sslmode '{}': only disable and prefer are available",
                            other
                        )));
                    }
                },
                "connect_timeout" => {
                    let secs: u64 = value
                        .parse()
                        .map_err(|_| PgError::config("invalid connect_timeout"))?;
                    config.connect_timeout = Duration::from_secs(secs);
                }
                "statement_timeout" => {
                    let ms: u64 = value
                        .parse()
                        .map_err(|_| PgError::config("invalid statement_timeout"))?;
                    config.statement_timeout = Some(Duration::from_millis(ms));
                }
                "application_name" => config.application_name = value.into_owned(),
                "search_path" => {
                    config.search_path = value
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect();
                }
                _ => {}
            }
        }

        Ok(config)
    }

    /// Add a schema to the search path.
    pub fn search_path_schema(mut self, schema: impl Into<String>) -> Self {
        self.search_path.push(schema.into());
        self
    }

    /// Set the statement timeout.
    pub fn statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = Some(timeout);
        self
    }

    /// Session options passed at startup.
    fn session_options(&self) -> Option<String> {
        let mut options = Vec::new();
        if let Some(timeout) = self.statement_timeout {
            options.push(format!("-c statement_timeout={}", timeout.as_millis()));
        }
        if !self.search_path.is_empty() {
            options.push(format!("-c search_path={}", self.search_path.join(",")));
        }
        (!options.is_empty()).then(|| options.join(" "))
    }

    /// Convert to tokio-postgres config.
    pub fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config.host(&self.host);
        config.port(self.port);
        config.dbname(&self.database);
        config.user(&self.user);
        config.application_name(&self.application_name);
        config.connect_timeout(self.connect_timeout);

        if let Some(password) = &self.password {
            config.password(password);
        }
        if let Some(options) = self.session_options() {
            config.options(&options);
        }

        config
    }
}
