//! Declared schema model sources.
//!
//! The declared model is what the database should look like. It comes from a
//! [`ModelProvider`]: a static [`DatabaseSchema`], a [`ModelBuilder`] fed with
//! application [`Entity`] types, or a [`SchemaFile`] on disk.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{MigrateResult, MigrationError};
use crate::schema::{DatabaseSchema, Sequence, Table};

/// Source of the declared target schema.
pub trait ModelProvider: Send + Sync {
    /// Produce the declared schema for one run.
    fn declared_schema(&self) -> MigrateResult<DatabaseSchema>;
}

impl ModelProvider for DatabaseSchema {
    fn declared_schema(&self) -> MigrateResult<DatabaseSchema> {
        self.validate()?;
        Ok(self.clone())
    }
}

/// An application type mapped to a table.
///
/// ```rust
/// use automigrate_core::model::Entity;
/// use automigrate_core::schema::{Column, ColumnType, Table};
///
/// struct User;
///
/// impl Entity for User {
///     fn table() -> Table {
///         Table::new("users")
///             .column(Column::new("id", ColumnType::Int).auto_increment())
///             .column(Column::new("name", ColumnType::VarChar(Some(100))))
///             .primary_key(["id"])
///     }
/// }
/// ```
pub trait Entity {
    /// The table this type is stored in.
    fn table() -> Table;
}

/// Builds a declared schema from entities and ad-hoc definitions.
#[derive(Debug, Clone, Default)]
pub struct ModelBuilder {
    schema: DatabaseSchema,
}

impl ModelBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type.
    pub fn entity<E: Entity>(self) -> Self {
        self.table(E::table())
    }

    /// Register a table.
    pub fn table(mut self, table: Table) -> Self {
        if let Some(schema) = &table.schema {
            if !self.schema.schemas.contains(schema) {
                self.schema.schemas.push(schema.clone());
            }
        }
        self.schema.tables.push(table);
        self
    }

    /// Register a sequence.
    pub fn sequence(mut self, sequence: Sequence) -> Self {
        self.schema.sequences.push(sequence);
        self
    }

    /// Validate and return the schema.
    pub fn build(self) -> MigrateResult<DatabaseSchema> {
        self.schema.validate()?;
        debug!(tables = self.schema.tables.len(), "Built declared model");
        Ok(self.schema)
    }
}

impl ModelProvider for ModelBuilder {
    fn declared_schema(&self) -> MigrateResult<DatabaseSchema> {
        self.clone().build()
    }
}

/// Format of a schema file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFormat {
    /// TOML document.
    Toml,
    /// JSON document.
    Json,
}

impl SchemaFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> MigrateResult<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            _ => Err(MigrationError::config(format!(
                "cannot tell the format of schema file '{}' (expected .toml or .json)",
                path.display()
            ))),
        }
    }
}

/// A declared schema stored in a TOML or JSON file.
///
/// The file is read on every call, so edits are picked up by the next run.
#[derive(Debug, Clone)]
pub struct SchemaFile {
    path: PathBuf,
    format: SchemaFormat,
}

impl SchemaFile {
    /// Reference a schema file, choosing the format by extension.
    pub fn new(path: impl Into<PathBuf>) -> MigrateResult<Self> {
        let path = path.into();
        let format = SchemaFormat::from_path(&path)?;
        Ok(Self { path, format })
    }

    /// Path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Format of the file.
    pub fn format(&self) -> SchemaFormat {
        self.format
    }

    /// Read and parse the file.
    pub fn load(&self) -> MigrateResult<DatabaseSchema> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            MigrationError::model(format!("cannot read '{}': {}", self.path.display(), e))
        })?;
        let schema = match self.format {
            SchemaFormat::Toml => DatabaseSchema::from_toml_str(&content),
            SchemaFormat::Json => DatabaseSchema::from_json_str(&content),
        }
        .map_err(|e| MigrationError::model(format!("{}: {}", self.path.display(), e)))?;
        schema.validate()?;
        Ok(schema)
    }
}

impl ModelProvider for SchemaFile {
    fn declared_schema(&self) -> MigrateResult<DatabaseSchema> {
        self.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ColumnType, ForeignKey};
    use pretty_assertions::assert_eq;

    struct User;

    impl Entity for User {
        fn table() -> Table {
            Table::new("users")
                .column(Column::new("id", ColumnType::Int).auto_increment())
                .column(Column::new("name", ColumnType::VarChar(Some(100))))
                .primary_key(["id"])
        }
    }

    struct Post;

    impl Entity for Post {
        fn table() -> Table {
            Table::new("posts")
                .in_schema("blog")
                .column(Column::new("id", ColumnType::BigInt).auto_increment())
                .column(Column::new("user_id", ColumnType::Int))
                .primary_key(["id"])
                .foreign_key(ForeignKey::new(["user_id"], "users", ["id"]))
        }
    }

    #[test]
    fn test_builder_registers_entities() {
        let schema = ModelBuilder::new()
            .entity::<User>()
            .entity::<Post>()
            .build()
            .unwrap();

        assert_eq!(schema.tables.len(), 2);
        assert_eq!(schema.schemas, vec!["blog".to_string()]);
        assert!(schema.table_named("posts").is_some());
    }

    #[test]
    fn test_builder_rejects_duplicate_tables() {
        let err = ModelBuilder::new()
            .entity::<User>()
            .entity::<User>()
            .build()
            .unwrap_err();
        assert!(matches!(err, MigrationError::Model(_)));
    }

    #[test]
    fn test_builder_rejects_unknown_reference() {
        let err = ModelBuilder::new().entity::<Post>().build().unwrap_err();
        assert!(err.to_string().contains("users"));
    }

    #[test]
    fn test_schema_file_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.toml");
        let schema = ModelBuilder::new().entity::<User>().build().unwrap();
        std::fs::write(&path, schema.to_toml_string().unwrap()).unwrap();

        let file = SchemaFile::new(&path).unwrap();
        assert_eq!(file.format(), SchemaFormat::Toml);
        assert_eq!(file.declared_schema().unwrap(), schema);
    }

    #[test]
    fn test_schema_file_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.JSON");
        let schema = ModelBuilder::new().entity::<User>().build().unwrap();
        std::fs::write(&path, schema.to_json_string().unwrap()).unwrap();

        let file = SchemaFile::new(&path).unwrap();
        assert_eq!(file.format(), SchemaFormat::Json);
        assert_eq!(file.load().unwrap(), schema);
    }

    #[test]
    fn test_schema_file_unknown_extension() {
        let err = SchemaFile::new("schema.yaml").unwrap_err();
        assert!(matches!(err, MigrationError::Config(_)));
    }

    #[test]
    fn test_schema_file_missing() {
        let file = SchemaFile::new("/nonexistent/schema.toml").unwrap();
        assert!(matches!(file.load().unwrap_err(), MigrationError::Model(_)));
    }
}
