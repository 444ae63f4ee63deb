//! Per-run migration options.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::MigrateResult;

/// Options controlling a single migration run.
///
/// Destructive operations are disabled by default, and a failed run is
/// reported to the caller as an error unless `halt_on_failure` is turned off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationOptions {
    /// Record each applied run in the audit table.
    pub use_auto_migration_record: bool,
    /// Back up the database before mutating it.
    pub backup_database: bool,
    /// Directory backups are written to.
    pub backup_dir: PathBuf,
    /// Check the connection before introspecting.
    pub validate_connection: bool,
    /// Render the generated batch as a script.
    pub generate_script: bool,
    /// File the script is written to.
    pub script_path: Option<PathBuf>,
    /// Stop after generating SQL.
    pub dry_run: bool,
    /// Allow `DropColumn` operations.
    pub allow_drop_column: bool,
    /// Allow `DropTable` operations.
    pub allow_drop_table: bool,
    /// Return an error when the run fails instead of reporting it in the outcome.
    pub halt_on_failure: bool,
    /// Match identifiers case-sensitively.
    pub case_sensitive_names: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            use_auto_migration_record: true,
            backup_database: false,
            backup_dir: PathBuf::from("backups"),
            validate_connection: true,
            generate_script: false,
            script_path: None,
            dry_run: false,
            allow_drop_column: false,
            allow_drop_table: false,
            halt_on_failure: true,
            case_sensitive_names: false,
        }
    }
}

impl MigrationOptions {
    /// Create options with conservative defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a TOML file.
    pub fn load(path: &Path) -> MigrateResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Enable or disable the audit record.
    pub fn use_auto_migration_record(mut self, enabled: bool) -> Self {
        self.use_auto_migration_record = enabled;
        self
    }

    /// Enable or disable the pre-migration backup.
    pub fn backup_database(mut self, enabled: bool) -> Self {
        self.backup_database = enabled;
        self
    }

    /// Set the backup directory.
    pub fn backup_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = dir.into();
        self
    }

    /// Enable or disable connection validation.
    pub fn validate_connection(mut self, enabled: bool) -> Self {
        self.validate_connection = enabled;
        self
    }

    /// Enable or disable script generation.
    pub fn generate_script(mut self, enabled: bool) -> Self {
        self.generate_script = enabled;
        self
    }

    /// Write the generated script to a file.
    pub fn script_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.generate_script = true;
        self.script_path = Some(path.into());
        self
    }

    /// Enable dry-run mode.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Allow dropping columns.
    pub fn allow_drop_column(mut self, allow: bool) -> Self {
        self.allow_drop_column = allow;
        self
    }

    /// Allow dropping tables.
    pub fn allow_drop_table(mut self, allow: bool) -> Self {
        self.allow_drop_table = allow;
        self
    }

    /// Choose whether a failed run is returned as an error.
    pub fn halt_on_failure(mut self, halt: bool) -> Self {
        self.halt_on_failure = halt;
        self
    }

    /// Match identifiers case-sensitively.
    pub fn case_sensitive_names(mut self, enabled: bool) -> Self {
        self.case_sensitive_names = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_conservative() {
        let options = MigrationOptions::default();
        assert!(!options.allow_drop_column);
        assert!(!options.allow_drop_table);
        assert!(options.halt_on_failure);
        assert!(options.validate_connection);
        assert!(options.use_auto_migration_record);
        assert!(!options.dry_run);
    }

    #[test]
    fn test_builder_pattern() {
        let options = MigrationOptions::new()
            .allow_drop_column(true)
            .halt_on_failure(false)
            .script_path("out/migration.sql");

        assert!(options.allow_drop_column);
        assert!(!options.halt_on_failure);
        assert!(options.generate_script);
        assert_eq!(options.script_path, Some(PathBuf::from("out/migration.sql")));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let options: MigrationOptions = toml::from_str(
            r#"
            allow_drop_table = true
            backup_dir = "/var/backups"
            "#,
        )
        .unwrap();

        assert!(options.allow_drop_table);
        assert!(!options.allow_drop_column);
        assert_eq!(options.backup_dir, PathBuf::from("/var/backups"));
        assert!(options.halt_on_failure);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("migration.toml");
        std::fs::write(&path, "dry_run = true\nhalt_on_failure = false\n").unwrap();

        let options = MigrationOptions::load(&path).unwrap();
        assert!(options.dry_run);
        assert!(!options.halt_on_failure);
    }
}
