//! SQLite configuration.

use std::path::{Path, PathBuf};

use crate::error::{SqliteError, SqliteResult};

/// Database location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DatabasePath {
    /// In-memory database.
    #[default]
    Memory,
    /// File-based database.
    File(PathBuf),
}

impl DatabasePath {
    /// Check if this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JournalMode {
    /// Delete the journal after each transaction.
    Delete,
    /// Truncate the journal instead of deleting it.
    Truncate,
    /// Keep the journal in memory.
    Memory,
    /// Write-ahead logging.
    #[default]
    Wal,
}

impl JournalMode {
    /// Get the SQLite pragma value.
    pub fn as_pragma(&self) -> &'static str {
        match self {
            Self::Delete => "DELETE",
            Self::Truncate => "TRUNCATE",
            Self::Memory => "MEMORY",
            Self::Wal => "WAL",
        }
    }

    fn parse(value: &str) -> SqliteResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "delete" => Ok(Self::Delete),
            "truncate" => Ok(Self::Truncate),
            "memory" => Ok(Self::Memory),
            "wal" => Ok(Self::Wal),
            other => Err(SqliteError::config(format!("unknown journal mode '{}'", other))),
        }
    }
}

/// SQLite connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteConfig {
    /// Database location.
    pub path: DatabasePath,
    /// Enforce foreign keys.
    pub foreign_keys: bool,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: Option<u32>,
    /// Journal mode.
    pub journal_mode: JournalMode,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: DatabasePath::Memory,
            foreign_keys: true,
            busy_timeout_ms: Some(5000),
            journal_mode: JournalMode::Wal,
        }
    }
}

impl SqliteConfig {
    /// Configuration for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Configuration for a file-based database.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            path: DatabasePath::File(path.as_ref().to_path_buf()),
            ..Default::default()
        }
    }

    /// Parse a SQLite URL.
    ///
    /// Supported formats:
    /// - `sqlite::memory:` or `:memory:`
    /// - `sqlite://path/to/db.sqlite` (relative) and `sqlite:///abs/db.sqlite`
    /// - `sqlite:path/to/db.sqlite` and `file:path/to/db.sqlite`
    /// - a bare file path
    ///
    /// Query parameters: `foreign_keys`, `busy_timeout`, `journal_mode`,
    /// `mode=memory`.
    pub fn from_url(url: impl AsRef<str>) -> SqliteResult<Self> {
        let url = url.as_ref().trim();
        let (location, query) = match url.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (url, None),
        };

        let path = location
            .strip_prefix("sqlite://")
            .or_else(|| location.strip_prefix("sqlite:"))
            .or_else(|| location.strip_prefix("file:"))
            .unwrap_or(location);
        if path.is_empty() {
            return Err(SqliteError::config("database path is required"));
        }

        let mut config = if path == ":memory:" {
            Self::memory()
        } else {
            Self::file(path)
        };

        if let Some(query) = query {
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                match key.as_ref() {
                    "mode" if value == "memory" => config.path = DatabasePath::Memory,
                    "foreign_keys" => config.foreign_keys = parse_flag(&value),
                    "busy_timeout" => {
                        let ms = value.parse().map_err(|_| {
                            SqliteError::config(format!("invalid busy_timeout '{}'", value))
                        })?;
                        config.busy_timeout_ms = Some(ms);
                    }
                    "journal_mode" => config.journal_mode = JournalMode::parse(&value)?,
                    _ => {}
                }
            }
        }

        Ok(config)
    }

    /// Statements run on every new connection.
    pub fn init_sql(&self) -> String {
        let mut sql = String::new();
        if self.foreign_keys {
            sql.push_str("PRAGMA foreign_keys = ON;\n");
        }
        if !self.path.is_memory() {
            sql.push_str(&format!(
                "PRAGMA journal_mode = {};\n",
                self.journal_mode.as_pragma()
            ));
        }
        if let Some(timeout) = self.busy_timeout_ms {
            sql.push_str(&format!("PRAGMA busy_timeout = {};\n", timeout));
        }
        sql
    }

    /// Enable or disable foreign key enforcement.
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Set the busy timeout in milliseconds.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = Some(ms);
        self
    }

    /// Set the journal mode.
    pub fn journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value, "true" | "1" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_config_from_url_memory() {
        assert!(SqliteConfig::from_url("sqlite::memory:").unwrap().path.is_memory());
        assert!(SqliteConfig::from_url(":memory:").unwrap().path.is_memory());
        assert!(
            SqliteConfig::from_url("sqlite://app.db?mode=memory")
                .unwrap()
                .path
                .is_memory()
        );
    }

    #[test]
    fn test_config_from_url_file() {
        let config = SqliteConfig::from_url("sqlite://./test.db").unwrap();
        assert_eq!(config.path, DatabasePath::File(PathBuf::from("./test.db")));

        let config = SqliteConfig::from_url("sqlite:///var/lib/app.db").unwrap();
        assert_eq!(config.path, DatabasePath::File(PathBuf::from("/var/lib/app.db")));

        let config = SqliteConfig::from_url("data/app.db").unwrap();
        assert_eq!(config.path, DatabasePath::File(PathBuf::from("data/app.db")));
    }

    #[test]
    fn test_config_from_url_with_options() {
        let config = SqliteConfig::from_url(
            "sqlite://./test.db?foreign_keys=false&busy_timeout=10000&journal_mode=delete",
        )
        .unwrap();

        assert!(!config.foreign_keys);
        assert_eq!(config.busy_timeout_ms, Some(10000));
        assert_eq!(config.journal_mode, JournalMode::Delete);
    }

    #[test]
    fn test_config_from_url_rejects_bad_values() {
        assert!(SqliteConfig::from_url("sqlite://").is_err());
        assert!(SqliteConfig::from_url("sqlite://a.db?busy_timeout=soon").is_err());
        assert!(SqliteConfig::from_url("sqlite://a.db?journal_mode=fast").is_err());
    }

    #[test]
    fn test_init_sql() {
        let sql = SqliteConfig::file("app.db").init_sql();
        assert!(sql.contains("foreign_keys = ON"));
        assert!(sql.contains("journal_mode = WAL"));
        assert!(sql.contains("busy_timeout = 5000"));

        let sql = SqliteConfig::memory().foreign_keys(false).init_sql();
        assert!(!sql.contains("foreign_keys"));
        assert!(!sql.contains("journal_mode"));
    }
}
