//! Tracing subscriber setup.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "AUTOMIGRATE_LOG";

/// Environment variable selecting the log format
pub const LOG_FORMAT_ENV: &str = "AUTOMIGRATE_LOG_FORMAT";

const VERBOSE_FILTER: &str =
    "info,automigrate_cli=debug,automigrate_core=debug,automigrate_sqlite=debug,automigrate_postgres=debug";

static INIT: Once = Once::new();

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    /// Parse a format name, falling back to pretty output
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "compact" => Self::Compact,
            _ => Self::Pretty,
        }
    }

    /// Format from the environment
    pub fn from_env() -> Self {
        std::env::var(LOG_FORMAT_ENV)
            .map(|value| Self::parse(&value))
            .unwrap_or_default()
    }
}

/// Build the filter: `AUTOMIGRATE_LOG` wins, then `--verbose`, then warnings only.
pub fn filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new(VERBOSE_FILTER)
        } else {
            EnvFilter::new("warn")
        }
    })
}

/// Install the global subscriber. Later calls are no-ops.
///
/// Logs go to stderr so command output on stdout stays pipeable.
pub fn init(verbose: bool) {
    INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*};

        let format = LogFormat::from_env();
        let registry = tracing_subscriber::registry().with(filter(verbose));
        let result = match format {
            LogFormat::Json => registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init(),
            LogFormat::Compact => registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .try_init(),
            LogFormat::Pretty => registry
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init(),
        };

        match result {
            Ok(()) => tracing::debug!(format = ?format, "automigrate logging initialized"),
            Err(e) => eprintln!("failed to install log subscriber: {}", e),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("unknown"), LogFormat::Pretty);
    }

    #[test]
    fn test_init_twice() {
        init(false);
        init(true);
    }
}
