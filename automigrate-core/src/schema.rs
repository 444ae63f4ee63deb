//! Normalized schema model shared by the declared and the live side.
//!
//! Both the host's declared model and the result of catalog introspection are
//! expressed as a [`DatabaseSchema`], so the differ can compare them
//! structurally.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MigrateResult, MigrationError};

/// A complete database schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSchema {
    /// Named schemas (namespaces) the tables live in.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub schemas: Vec<String>,
    /// Sequences.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sequences: Vec<Sequence>,
    /// Tables.
    pub tables: Vec<Table>,
}

impl DatabaseSchema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table.
    pub fn with_table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    /// Add a sequence.
    pub fn with_sequence(mut self, sequence: Sequence) -> Self {
        self.sequences.push(sequence);
        self
    }

    /// Check if the schema has no objects at all.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.sequences.is_empty() && self.schemas.is_empty()
    }

    /// Find a table by reference.
    pub fn table(&self, table: &TableRef, case_sensitive: bool) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| t.table_ref().matches(table, case_sensitive))
    }

    /// Resolve the table a foreign key on `owner` points at.
    ///
    /// An explicit schema wins. An unqualified target is looked up in the
    /// owner's schema first, then by name anywhere in this schema, and is
    /// otherwise taken to live in the default schema.
    pub fn resolve_reference(&self, owner: &TableRef, fk: &ForeignKey) -> TableRef {
        if let Some(schema) = &fk.referenced_schema {
            return TableRef::new(Some(schema.clone()), &fk.referenced_table);
        }
        let local = TableRef::new(owner.schema.clone(), &fk.referenced_table);
        if self.table(&local, false).is_some() {
            return local;
        }
        self.table_named(&fk.referenced_table)
            .map(Table::table_ref)
            .unwrap_or_else(|| TableRef::unqualified(&fk.referenced_table))
    }

    /// Find a table by unqualified name.
    pub fn table_named(&self, name: &str) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| names_match(&t.name, name, false))
    }

    /// Parse a schema from TOML.
    pub fn from_toml_str(content: &str) -> MigrateResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Render the schema as TOML.
    pub fn to_toml_string(&self) -> MigrateResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Parse a schema from JSON.
    pub fn from_json_str(content: &str) -> MigrateResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Render the schema as pretty JSON.
    pub fn to_json_string(&self) -> MigrateResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the schema for definitions that cannot exist in a database.
    pub fn validate(&self) -> MigrateResult<()> {
        let mut seen_tables = HashSet::new();
        for table in &self.tables {
            if !seen_tables.insert(table.table_ref().key(false)) {
                return Err(MigrationError::model(format!(
                    "table '{}' is declared more than once",
                    table.table_ref()
                )));
            }
            table.validate()?;

            for fk in &table.foreign_keys {
                let target = self.resolve_reference(&table.table_ref(), fk);
                let referenced = self.table(&target, false).ok_or_else(|| {
                    MigrationError::model(format!(
                        "foreign key on '{}' references unknown table '{}'",
                        table.name, target
                    ))
                })?;
                for column in &fk.referenced_columns {
                    if referenced.find_column(column).is_none() {
                        return Err(MigrationError::model(format!(
                            "foreign key on '{}' references unknown column '{}.{}'",
                            table.name, referenced.name, column
                        )));
                    }
                }
            }
        }

        let mut seen_sequences = HashSet::new();
        for sequence in &self.sequences {
            let key = TableRef::new(sequence.schema.clone(), &sequence.name).key(false);
            if !seen_sequences.insert(key) {
                return Err(MigrationError::model(format!(
                    "sequence '{}' is declared more than once",
                    sequence.name
                )));
            }
        }

        Ok(())
    }
}

/// Compare two identifiers.
pub fn names_match(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.eq_ignore_ascii_case(b)
    }
}

/// Schema-qualified reference to a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    /// Schema qualifier (`None` means the connection's default schema).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Table name.
    pub name: String,
}

impl TableRef {
    /// Create a table reference.
    pub fn new(schema: Option<String>, name: impl Into<String>) -> Self {
        Self {
            schema,
            name: name.into(),
        }
    }

    /// Reference to a table in the default schema.
    pub fn unqualified(name: impl Into<String>) -> Self {
        Self::new(None, name)
    }

    /// Lookup key used for matching.
    pub fn key(&self, case_sensitive: bool) -> String {
        let raw = match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        };
        if case_sensitive {
            raw
        } else {
            raw.to_ascii_lowercase()
        }
    }

    /// Check if two references name the same table.
    pub fn matches(&self, other: &TableRef, case_sensitive: bool) -> bool {
        self.key(case_sensitive) == other.key(case_sensitive)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// A table definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Schema qualifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Table comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Columns in declaration order.
    #[serde(default)]
    pub columns: Vec<Column>,
    /// Primary key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<PrimaryKey>,
    /// Foreign keys.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<ForeignKey>,
    /// Unique constraints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unique_constraints: Vec<UniqueConstraint>,
    /// Check constraints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub check_constraints: Vec<CheckConstraint>,
    /// Secondary indexes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<Index>,
}

impl Table {
    /// Create a new table in the default schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            comment: None,
            columns: Vec::new(),
            primary_key: None,
            foreign_keys: Vec::new(),
            unique_constraints: Vec::new(),
            check_constraints: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Set the schema qualifier.
    pub fn in_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Set the table comment.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Add a column.
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Set the primary key columns.
    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = Some(PrimaryKey::new(columns));
        self
    }

    /// Add a foreign key.
    pub fn foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    /// Add a unique constraint over the given columns.
    pub fn unique<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_constraints.push(UniqueConstraint::new(columns));
        self
    }

    /// Add a check constraint.
    pub fn check(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        self.check_constraints.push(CheckConstraint {
            name: name.into(),
            expression: expression.into(),
        });
        self
    }

    /// Add an index.
    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    /// Reference to this table.
    pub fn table_ref(&self) -> TableRef {
        TableRef::new(self.schema.clone(), &self.name)
    }

    /// Find a column by name, ignoring case.
    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| names_match(&c.name, name, false))
    }

    /// Name of the primary key constraint.
    pub fn primary_key_name(&self) -> String {
        self.primary_key
            .as_ref()
            .and_then(|pk| pk.name.clone())
            .unwrap_or_else(|| format!("PK_{}", self.name))
    }

    /// Check the table for internally inconsistent definitions.
    pub fn validate(&self) -> MigrateResult<()> {
        if self.columns.is_empty() {
            return Err(MigrationError::model(format!(
                "table '{}' has no columns",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.name.to_ascii_lowercase()) {
                return Err(MigrationError::model(format!(
                    "column '{}.{}' is declared more than once",
                    self.name, column.name
                )));
            }
        }

        if let Some(pk) = &self.primary_key {
            if pk.columns.is_empty() {
                return Err(MigrationError::model(format!(
                    "primary key of '{}' has no columns",
                    self.name
                )));
            }
            for name in &pk.columns {
                let column = self.require_column(name, "primary key")?;
                if column.nullable {
                    return Err(MigrationError::model(format!(
                        "primary key column '{}.{}' is declared nullable",
                        self.name, name
                    )));
                }
            }
        }

        for unique in &self.unique_constraints {
            for name in &unique.columns {
                self.require_column(name, "unique constraint")?;
            }
        }

        for index in &self.indexes {
            if index.columns.is_empty() {
                return Err(MigrationError::model(format!(
                    "index '{}' on '{}' has no columns",
                    index.name, self.name
                )));
            }
            for name in &index.columns {
                self.require_column(name, "index")?;
            }
        }

        for fk in &self.foreign_keys {
            if fk.columns.is_empty() || fk.columns.len() != fk.referenced_columns.len() {
                return Err(MigrationError::model(format!(
                    "foreign key '{}' has mismatched column lists",
                    fk.constraint_name(self)
                )));
            }
            for name in &fk.columns {
                self.require_column(name, "foreign key")?;
            }
        }

        let mut constraint_names = HashSet::new();
        let names = self
            .indexes
            .iter()
            .map(|i| i.name.clone())
            .chain(self.check_constraints.iter().map(|c| c.name.clone()))
            .chain(self.foreign_keys.iter().map(|fk| fk.constraint_name(self)));
        for name in names {
            if !constraint_names.insert(name.to_ascii_lowercase()) {
                return Err(MigrationError::model(format!(
                    "constraint or index name '{}' is used twice on '{}'",
                    name, self.name
                )));
            }
        }

        Ok(())
    }

    fn require_column(&self, name: &str, context: &str) -> MigrateResult<&Column> {
        self.find_column(name).ok_or_else(|| {
            MigrationError::model(format!(
                "{} on '{}' references unknown column '{}'",
                context, self.name, name
            ))
        })
    }
}

/// A column definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Normalized type.
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Whether the column accepts NULL.
    #[serde(default)]
    pub nullable: bool,
    /// Default value expression, as SQL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Whether values are generated by the database.
    #[serde(default, skip_serializing_if = "is_false")]
    pub auto_increment: bool,
    /// Column comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Column {
    /// Create a NOT NULL column.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: false,
            default: None,
            auto_increment: false,
            comment: None,
        }
    }

    /// Allow NULL values.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Set the default value expression.
    pub fn default_value(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    /// Mark the column as database-generated.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Set the column comment.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Primary key definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryKey {
    /// Constraint name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Key columns in order.
    pub columns: Vec<String>,
}

impl PrimaryKey {
    /// Create an unnamed primary key.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

/// Referential action for foreign keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferentialAction {
    /// No action (the catalog default).
    #[default]
    NoAction,
    /// Restrict.
    Restrict,
    /// Cascade.
    Cascade,
    /// Set null.
    SetNull,
    /// Set default.
    SetDefault,
}

impl ReferentialAction {
    /// SQL keyword.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::NoAction => "NO ACTION",
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
        }
    }

    /// Parse a catalog rule such as `SET NULL` or `CASCADE`.
    pub fn from_catalog(rule: &str) -> Self {
        match rule.trim().to_ascii_uppercase().replace('_', " ").as_str() {
            "CASCADE" => Self::Cascade,
            "SET NULL" => Self::SetNull,
            "SET DEFAULT" => Self::SetDefault,
            "RESTRICT" => Self::Restrict,
            _ => Self::NoAction,
        }
    }
}

/// Foreign key definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Local columns.
    pub columns: Vec<String>,
    /// Referenced table.
    pub referenced_table: String,
    /// Referenced table schema.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced_schema: Option<String>,
    /// Referenced columns.
    pub referenced_columns: Vec<String>,
    /// Action on delete.
    #[serde(default)]
    pub on_delete: ReferentialAction,
    /// Action on update.
    #[serde(default)]
    pub on_update: ReferentialAction,
}

impl ForeignKey {
    /// Create a foreign key from `columns` to `referenced_table(referenced_columns)`.
    pub fn new<I, S, J, T>(columns: I, referenced_table: impl Into<String>, referenced_columns: J) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        J: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
            referenced_table: referenced_table.into(),
            referenced_schema: None,
            referenced_columns: referenced_columns.into_iter().map(Into::into).collect(),
            on_delete: ReferentialAction::NoAction,
            on_update: ReferentialAction::NoAction,
        }
    }

    /// Set the constraint name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the delete action.
    pub fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = action;
        self
    }

    /// Set the update action.
    pub fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = action;
        self
    }

    /// Constraint name, derived from the tables and columns when unnamed.
    pub fn constraint_name(&self, table: &Table) -> String {
        self.name.clone().unwrap_or_else(|| {
            format!(
                "FK_{}_{}_{}",
                table.name,
                self.referenced_table,
                self.columns.join("_")
            )
        })
    }

}

/// Unique constraint definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    /// Constraint name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Columns.
    pub columns: Vec<String>,
}

impl UniqueConstraint {
    /// Create an unnamed unique constraint.
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: None,
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Constraint name, derived from the columns when unnamed.
    pub fn constraint_name(&self, table: &Table) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("AK_{}_{}", table.name, self.columns.join("_")))
    }
}

/// Check constraint definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckConstraint {
    /// Constraint name.
    pub name: String,
    /// Boolean SQL expression.
    pub expression: String,
}

/// Secondary index definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    /// Index name.
    pub name: String,
    /// Indexed columns in order.
    pub columns: Vec<String>,
    /// Whether the index enforces uniqueness.
    #[serde(default)]
    pub unique: bool,
    /// Partial index predicate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

impl Index {
    /// Create a non-unique index named `IX_<table>_<columns>`.
    pub fn new<I, S>(table: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        Self {
            name: format!("IX_{}_{}", table, columns.join("_")),
            columns,
            unique: false,
            filter: None,
        }
    }

    /// Make the index unique.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Override the index name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Restrict the index to rows matching a predicate.
    pub fn filter(mut self, predicate: impl Into<String>) -> Self {
        self.filter = Some(predicate.into());
        self
    }
}

/// Sequence definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    /// Sequence name.
    pub name: String,
    /// Schema qualifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// First value.
    #[serde(default = "one")]
    pub start: i64,
    /// Increment.
    #[serde(default = "one")]
    pub increment: i64,
    /// Minimum value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<i64>,
    /// Maximum value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<i64>,
    /// Whether the sequence wraps around.
    #[serde(default)]
    pub cycle: bool,
}

fn one() -> i64 {
    1
}

impl Sequence {
    /// Create a sequence starting at 1 with increment 1.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            start: 1,
            increment: 1,
            min_value: None,
            max_value: None,
            cycle: false,
        }
    }

    /// Check if the mutable attributes of two sequences differ.
    pub fn differs_from(&self, other: &Sequence) -> bool {
        self.increment != other.increment
            || self.min_value != other.min_value
            || self.max_value != other.max_value
            || self.cycle != other.cycle
    }
}

/// Portable column type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColumnType {
    /// 16-bit integer.
    SmallInt,
    /// 32-bit integer.
    Int,
    /// 64-bit integer.
    BigInt,
    /// Single precision float.
    Float,
    /// Double precision float.
    Double,
    /// Fixed precision number.
    Decimal {
        /// Total digits.
        precision: Option<u32>,
        /// Digits after the decimal point.
        scale: Option<u32>,
    },
    /// Boolean.
    Boolean,
    /// Unbounded text.
    Text,
    /// Variable length text.
    VarChar(Option<u32>),
    /// Fixed length text.
    Char(Option<u32>),
    /// Binary data.
    Bytes,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Date and time with time zone.
    DateTime,
    /// Date and time without time zone.
    Timestamp,
    /// JSON document.
    Json,
    /// UUID.
    Uuid,
    /// Any other engine-specific type, kept verbatim.
    Custom(String),
}

/// Coarse grouping used to decide whether two types are compatible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeFamily {
    /// Integer types.
    Integer,
    /// Boolean.
    Boolean,
    /// Floating point.
    Float,
    /// Fixed precision.
    Decimal,
    /// Character data.
    Text,
    /// Binary data.
    Bytes,
    /// Date only.
    Date,
    /// Time only.
    Time,
    /// Date and time.
    DateTime,
    /// JSON.
    Json,
    /// UUID.
    Uuid,
    /// Engine-specific type name.
    Other(String),
}

impl ColumnType {
    /// Parse a type name as reported by any supported catalog.
    pub fn parse(raw: &str) -> Self {
        let lower = raw.trim().to_ascii_lowercase();
        let (base, args) = match (lower.find('('), lower.find(')')) {
            (Some(open), Some(close)) if close > open => {
                let suffix = lower[close + 1..].trim();
                let base = format!("{} {}", lower[..open].trim(), suffix);
                (base.trim().to_string(), Some(lower[open + 1..close].trim().to_string()))
            }
            _ => (lower.clone(), None),
        };
        let base = base
            .trim_end_matches(" zerofill")
            .trim_end_matches(" unsigned")
            .trim()
            .to_string();

        let length = args.as_deref().and_then(|a| a.parse::<u32>().ok());
        let is_max = args.as_deref() == Some("max");

        match base.as_str() {
            "tinyint" if args.as_deref() == Some("1") => Self::Boolean,
            "smallint" | "int2" | "tinyint" | "smallserial" => Self::SmallInt,
            "int" | "integer" | "int4" | "mediumint" | "serial" => Self::Int,
            "bigint" | "int8" | "bigserial" => Self::BigInt,
            "real" | "float4" => Self::Float,
            "float" | "double" | "double precision" | "float8" => Self::Double,
            "decimal" | "numeric" | "money" => {
                let mut parts = args
                    .as_deref()
                    .unwrap_or_default()
                    .split(',')
                    .map(|p| p.trim().parse::<u32>().ok());
                Self::Decimal {
                    precision: parts.next().flatten(),
                    scale: parts.next().flatten(),
                }
            }
            "bool" | "boolean" | "bit" => Self::Boolean,
            "varchar" | "nvarchar" if is_max => Self::Text,
            "text" | "ntext" | "clob" | "tinytext" | "mediumtext" | "longtext" | "string" => {
                Self::Text
            }
            "varchar" | "nvarchar" | "character varying" => Self::VarChar(length),
            "char" | "nchar" | "character" | "bpchar" => Self::Char(length),
            "blob" | "bytea" | "binary" | "varbinary" | "image" | "tinyblob" | "mediumblob"
            | "longblob" | "bytes" => Self::Bytes,
            "date" => Self::Date,
            "time" | "timetz" | "time without time zone" | "time with time zone" => Self::Time,
            "datetime" | "datetime2" | "datetimeoffset" | "timestamptz"
            | "timestamp with time zone" | "smalldatetime" => Self::DateTime,
            "timestamp" | "timestamp without time zone" => Self::Timestamp,
            "json" | "jsonb" => Self::Json,
            "uuid" | "uniqueidentifier" => Self::Uuid,
            _ => Self::Custom(raw.trim().to_string()),
        }
    }

    /// Family of the type.
    pub fn family(&self) -> TypeFamily {
        match self {
            Self::SmallInt | Self::Int | Self::BigInt => TypeFamily::Integer,
            Self::Float | Self::Double => TypeFamily::Float,
            Self::Decimal { .. } => TypeFamily::Decimal,
            Self::Boolean => TypeFamily::Boolean,
            Self::Text | Self::VarChar(_) | Self::Char(_) => TypeFamily::Text,
            Self::Bytes => TypeFamily::Bytes,
            Self::Date => TypeFamily::Date,
            Self::Time => TypeFamily::Time,
            Self::DateTime | Self::Timestamp => TypeFamily::DateTime,
            Self::Json => TypeFamily::Json,
            Self::Uuid => TypeFamily::Uuid,
            Self::Custom(name) => TypeFamily::Other(name.to_ascii_lowercase()),
        }
    }

    /// Check if values of `self` can be stored in a column of `other`
    /// without a type change.
    pub fn is_compatible_with(&self, other: &ColumnType) -> bool {
        use TypeFamily::*;

        let (a, b) = (self.family(), other.family());
        if a == b {
            return true;
        }
        matches!(
            (a, b),
            (Integer, Boolean)
                | (Boolean, Integer)
                | (Text, Json)
                | (Json, Text)
                | (Text, Uuid)
                | (Uuid, Text)
        )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SmallInt => f.write_str("smallint"),
            Self::Int => f.write_str("int"),
            Self::BigInt => f.write_str("bigint"),
            Self::Float => f.write_str("real"),
            Self::Double => f.write_str("double"),
            Self::Decimal {
                precision: Some(p),
                scale: Some(s),
            } => write!(f, "decimal({},{})", p, s),
            Self::Decimal {
                precision: Some(p),
                scale: None,
            } => write!(f, "decimal({})", p),
            Self::Decimal { .. } => f.write_str("decimal"),
            Self::Boolean => f.write_str("boolean"),
            Self::Text => f.write_str("text"),
            Self::VarChar(Some(n)) => write!(f, "varchar({})", n),
            Self::VarChar(None) => f.write_str("varchar"),
            Self::Char(Some(n)) => write!(f, "char({})", n),
            Self::Char(None) => f.write_str("char"),
            Self::Bytes => f.write_str("bytes"),
            Self::Date => f.write_str("date"),
            Self::Time => f.write_str("time"),
            Self::DateTime => f.write_str("datetime"),
            Self::Timestamp => f.write_str("timestamp"),
            Self::Json => f.write_str("json"),
            Self::Uuid => f.write_str("uuid"),
            Self::Custom(name) => f.write_str(name),
        }
    }
}

impl FromStr for ColumnType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<String> for ColumnType {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<ColumnType> for String {
    fn from(value: ColumnType) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn users() -> Table {
        Table::new("users")
            .column(Column::new("id", ColumnType::Int).auto_increment())
            .column(Column::new("name", ColumnType::Text))
            .primary_key(["id"])
    }

    #[test]
    fn test_resolve_reference() {
        let schema = DatabaseSchema::new()
            .with_table(users())
            .with_table(users().in_schema("audit"))
            .with_table(Table::new("events").in_schema("audit"))
            .with_table(Table::new("posts").in_schema("blog"));
        let to_users = ForeignKey::new(["user_id"], "users", ["id"]);

        // Same schema first
        let owner = TableRef::new(Some("audit".into()), "events");
        assert_eq!(
            schema.resolve_reference(&owner, &to_users),
            TableRef::new(Some("audit".into()), "users")
        );

        // Then by name anywhere
        let owner = TableRef::new(Some("blog".into()), "posts");
        assert_eq!(schema.resolve_reference(&owner, &to_users), TableRef::unqualified("users"));

        // Explicit schema wins
        let mut qualified = to_users.clone();
        qualified.referenced_schema = Some("audit".into());
        assert_eq!(
            schema.resolve_reference(&owner, &qualified),
            TableRef::new(Some("audit".into()), "users")
        );

        // Unknown targets land in the default schema
        let missing = ForeignKey::new(["tag_id"], "tags", ["id"]);
        assert_eq!(schema.resolve_reference(&owner, &missing), TableRef::unqualified("tags"));
    }

    #[test]
    fn test_validate_cross_schema_foreign_key() {
        let schema = DatabaseSchema::new().with_table(users()).with_table(
            Table::new("posts")
                .in_schema("blog")
                .column(Column::new("id", ColumnType::Int))
                .column(Column::new("user_id", ColumnType::Int))
                .primary_key(["id"])
                .foreign_key(ForeignKey::new(["user_id"], "users", ["id"])),
        );
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_parse_catalog_type_names() {
        assert_eq!(ColumnType::parse("INTEGER"), ColumnType::Int);
        assert_eq!(ColumnType::parse("int4"), ColumnType::Int);
        assert_eq!(ColumnType::parse("int(11) unsigned"), ColumnType::Int);
        assert_eq!(ColumnType::parse("tinyint(1)"), ColumnType::Boolean);
        assert_eq!(ColumnType::parse("VARCHAR(50)"), ColumnType::VarChar(Some(50)));
        assert_eq!(ColumnType::parse("nvarchar(max)"), ColumnType::Text);
        assert_eq!(ColumnType::parse("double precision"), ColumnType::Double);
        assert_eq!(
            ColumnType::parse("timestamp(6) with time zone"),
            ColumnType::DateTime
        );
        assert_eq!(
            ColumnType::parse("numeric(18, 2)"),
            ColumnType::Decimal {
                precision: Some(18),
                scale: Some(2)
            }
        );
        assert_eq!(ColumnType::parse("uniqueidentifier"), ColumnType::Uuid);
        assert_eq!(
            ColumnType::parse("geometry"),
            ColumnType::Custom("geometry".to_string())
        );
    }

    #[test]
    fn test_display_parses_back() {
        let types = [
            ColumnType::SmallInt,
            ColumnType::BigInt,
            ColumnType::Float,
            ColumnType::Double,
            ColumnType::Decimal {
                precision: Some(10),
                scale: Some(4),
            },
            ColumnType::VarChar(Some(100)),
            ColumnType::Char(Some(36)),
            ColumnType::Bytes,
            ColumnType::Timestamp,
            ColumnType::Json,
        ];
        for ty in types {
            assert_eq!(ColumnType::parse(&ty.to_string()), ty);
        }
    }

    #[test]
    fn test_type_compatibility() {
        assert!(ColumnType::Int.is_compatible_with(&ColumnType::BigInt));
        assert!(ColumnType::VarChar(Some(50)).is_compatible_with(&ColumnType::Text));
        assert!(ColumnType::Boolean.is_compatible_with(&ColumnType::Int));
        assert!(ColumnType::Uuid.is_compatible_with(&ColumnType::Char(Some(36))));
        assert!(!ColumnType::Text.is_compatible_with(&ColumnType::Int));
        assert!(!ColumnType::Date.is_compatible_with(&ColumnType::Bytes));
    }

    #[test]
    fn test_table_ref_matching() {
        let a = TableRef::new(Some("Sales".into()), "Orders");
        let b = TableRef::new(Some("sales".into()), "orders");
        assert!(a.matches(&b, false));
        assert!(!a.matches(&b, true));
        assert_eq!(a.to_string(), "Sales.Orders");
    }

    #[test]
    fn test_validate_accepts_consistent_schema() {
        let schema = DatabaseSchema::new().with_table(users()).with_table(
            Table::new("profiles")
                .column(Column::new("id", ColumnType::Int))
                .column(Column::new("user_id", ColumnType::Int))
                .primary_key(["id"])
                .foreign_key(
                    ForeignKey::new(["user_id"], "users", ["id"])
                        .on_delete(ReferentialAction::Cascade),
                ),
        );
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_nullable_primary_key() {
        let table = Table::new("t")
            .column(Column::new("id", ColumnType::Int).nullable())
            .primary_key(["id"]);
        let err = DatabaseSchema::new().with_table(table).validate().unwrap_err();
        assert!(err.to_string().contains("nullable"));
    }

    #[test]
    fn test_validate_rejects_unknown_key_column() {
        let table = Table::new("t")
            .column(Column::new("id", ColumnType::Int))
            .primary_key(["uid"]);
        let err = DatabaseSchema::new().with_table(table).validate().unwrap_err();
        assert!(err.to_string().contains("uid"));
    }

    #[test]
    fn test_validate_rejects_dangling_foreign_key() {
        let table = Table::new("profiles")
            .column(Column::new("user_id", ColumnType::Int))
            .foreign_key(ForeignKey::new(["user_id"], "accounts", ["id"]));
        let err = DatabaseSchema::new().with_table(table).validate().unwrap_err();
        assert!(err.to_string().contains("accounts"));
    }

    #[test]
    fn test_validate_rejects_duplicate_tables() {
        let schema = DatabaseSchema::new()
            .with_table(users())
            .with_table(Table::new("USERS").column(Column::new("id", ColumnType::Int)));
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let schema = DatabaseSchema::new()
            .with_table(users().index(Index::new("users", ["name"]).unique()))
            .with_sequence(Sequence::new("order_numbers"));
        let text = schema.to_toml_string().unwrap();
        let parsed = DatabaseSchema::from_toml_str(&text).unwrap();
        assert_eq!(parsed, schema);
    }

    #[test]
    fn test_parse_toml_declaration() {
        let schema = DatabaseSchema::from_toml_str(
            r#"
            [[tables]]
            name = "users"
            primary_key = { columns = ["id"] }

            [[tables.columns]]
            name = "id"
            type = "int"
            auto_increment = true

            [[tables.columns]]
            name = "email"
            type = "varchar(100)"
            nullable = true
            "#,
        )
        .unwrap();

        let users = schema.table_named("users").unwrap();
        assert_eq!(users.columns.len(), 2);
        assert_eq!(users.find_column("email").unwrap().column_type, ColumnType::VarChar(Some(100)));
        assert!(users.find_column("EMAIL").unwrap().nullable);
        assert_eq!(users.primary_key_name(), "PK_users");
    }
}
