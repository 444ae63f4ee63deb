//! SQL generation for change operations.
//!
//! Each dialect implements [`SqlGenerator`]. [`generate`] renders a filtered
//! operation list into [`MigrationCommand`]s and [`join_commands`] turns them
//! into the single batch executed inside the migration transaction.

mod mssql;
mod mysql;
mod postgres;
mod sqlite;

use std::fmt;

use serde_json::Value;

pub use mssql::MssqlGenerator;
pub use mysql::MySqlGenerator;
pub use postgres::PostgresSqlGenerator;
pub use sqlite::SqliteGenerator;

use crate::error::{MigrateResult, MigrationError};
use crate::operation::ChangeOperation;
use crate::provider::Provider;
use crate::schema::{
    Column, ColumnType, DatabaseSchema, ForeignKey, ReferentialAction, Table, TableRef, TypeFamily,
};

/// One rendered SQL statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationCommand {
    /// Statement text.
    pub sql: String,
    /// Dialect the statement targets.
    pub provider: Provider,
}

impl MigrationCommand {
    /// Create a command.
    pub fn new(provider: Provider, sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            provider,
        }
    }
}

impl fmt::Display for MigrationCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Dialect-specific rendering of change operations.
pub trait SqlGenerator: Send + Sync {
    /// The dialect this generator targets.
    fn provider(&self) -> Provider;

    /// Render a portable type as this dialect's storage type.
    fn render_type(&self, column_type: &ColumnType) -> String;

    /// Render one operation into one or more statements.
    ///
    /// `model` is the declared schema, used to resolve referenced objects.
    fn generate_operation(
        &self,
        operation: &ChangeOperation,
        model: &DatabaseSchema,
    ) -> MigrateResult<Vec<String>>;

    /// Quote an identifier.
    fn quote(&self, name: &str) -> String {
        self.provider().quote_identifier(name)
    }

    /// Quote a possibly schema-qualified name.
    fn qualified(&self, schema: Option<&str>, name: &str) -> String {
        match schema {
            Some(schema) => format!("{}.{}", self.quote(schema), self.quote(name)),
            None => self.quote(name),
        }
    }

    /// Quote a table reference.
    fn table_name(&self, table: &TableRef) -> String {
        self.qualified(table.schema.as_deref(), &table.name)
    }

    /// Quote and join a column list.
    fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.quote(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Render a literal value.
    fn literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => quote_string(s),
            other => quote_string(&other.to_string()),
        }
    }

    /// `FOREIGN KEY ... REFERENCES ...` clause of a foreign key on `owner`.
    fn references_clause(&self, owner: &TableRef, fk: &ForeignKey, model: &DatabaseSchema) -> String {
        let target = model.resolve_reference(owner, fk);
        let mut sql = format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            self.column_list(&fk.columns),
            self.table_name(&target),
            self.column_list(&fk.referenced_columns)
        );
        if fk.on_delete != ReferentialAction::NoAction {
            sql.push_str(&format!(" ON DELETE {}", fk.on_delete.as_sql()));
        }
        if fk.on_update != ReferentialAction::NoAction {
            sql.push_str(&format!(" ON UPDATE {}", fk.on_update.as_sql()));
        }
        sql
    }

    /// Inline constraint clauses of a `CREATE TABLE`.
    fn table_constraints(&self, table: &Table, model: &DatabaseSchema) -> Vec<String> {
        let owner = table.table_ref();
        let mut clauses = Vec::new();

        if let Some(pk) = &table.primary_key {
            let name = pk.name.clone().unwrap_or_else(|| table.primary_key_name());
            clauses.push(format!(
                "CONSTRAINT {} PRIMARY KEY ({})",
                self.quote(&name),
                self.column_list(&pk.columns)
            ));
        }
        for unique in &table.unique_constraints {
            clauses.push(format!(
                "CONSTRAINT {} UNIQUE ({})",
                self.quote(&unique.constraint_name(table)),
                self.column_list(&unique.columns)
            ));
        }
        for check in &table.check_constraints {
            clauses.push(format!(
                "CONSTRAINT {} CHECK ({})",
                self.quote(&check.name),
                check.expression
            ));
        }
        for fk in &table.foreign_keys {
            clauses.push(format!(
                "CONSTRAINT {} {}",
                self.quote(&fk.constraint_name(table)),
                self.references_clause(&owner, fk, model)
            ));
        }

        clauses
    }

    /// Default expression for a column, falling back to the type's zero value
    /// for NOT NULL columns added to existing tables.
    ///
    /// Identity columns only go without a default where the database numbers
    /// existing rows itself.
    fn added_column_default(&self, column: &Column) -> Option<String> {
        if column.default.is_some() || column.nullable {
            return column.default.clone();
        }
        let numbers_rows = matches!(self.provider(), Provider::Postgres | Provider::SqlServer);
        if column.auto_increment && numbers_rows {
            return None;
        }
        zero_default(self.provider(), &column.column_type)
    }

    /// `INSERT` statements for seed rows.
    fn insert_data(&self, table: &TableRef, columns: &[String], rows: &[Vec<Value>]) -> Vec<String> {
        rows.iter()
            .map(|row| {
                let values: Vec<String> = row.iter().map(|v| self.literal(v)).collect();
                format!(
                    "INSERT INTO {} ({}) VALUES ({})",
                    self.table_name(table),
                    self.column_list(columns),
                    values.join(", ")
                )
            })
            .collect()
    }

    /// `UPDATE` statement for one keyed row.
    fn update_data(
        &self,
        table: &TableRef,
        key_columns: &[String],
        key_values: &[Value],
        columns: &[String],
        values: &[Value],
    ) -> String {
        let assignments: Vec<String> = columns
            .iter()
            .zip(values)
            .map(|(c, v)| format!("{} = {}", self.quote(c), self.literal(v)))
            .collect();
        format!(
            "UPDATE {} SET {} WHERE {}",
            self.table_name(table),
            assignments.join(", "),
            self.key_predicate(key_columns, key_values)
        )
    }

    /// `DELETE` statements for keyed rows.
    fn delete_data(&self, table: &TableRef, key_columns: &[String], key_values: &[Vec<Value>]) -> Vec<String> {
        key_values
            .iter()
            .map(|key| {
                format!(
                    "DELETE FROM {} WHERE {}",
                    self.table_name(table),
                    self.key_predicate(key_columns, key)
                )
            })
            .collect()
    }

    /// `a = 1 AND b = 'x'`, using `IS NULL` for null keys.
    fn key_predicate(&self, columns: &[String], values: &[Value]) -> String {
        columns
            .iter()
            .zip(values)
            .map(|(c, v)| match v {
                Value::Null => format!("{} IS NULL", self.quote(c)),
                v => format!("{} = {}", self.quote(c), self.literal(v)),
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Error for an operation this dialect cannot express.
    fn unsupported(&self, operation: &ChangeOperation) -> MigrationError {
        MigrationError::unsupported_operation(self.provider().as_str(), operation.kind().to_string())
    }
}

/// Generator for a provider.
pub fn generator_for(provider: Provider) -> Box<dyn SqlGenerator> {
    match provider {
        Provider::SqlServer => Box::new(MssqlGenerator::new()),
        Provider::MySql => Box::new(MySqlGenerator),
        Provider::Sqlite => Box::new(SqliteGenerator),
        Provider::Postgres => Box::new(PostgresSqlGenerator),
    }
}

/// Render operations into commands, preserving order.
pub fn generate(
    provider: Provider,
    operations: &[ChangeOperation],
    model: &DatabaseSchema,
) -> MigrateResult<Vec<MigrationCommand>> {
    let generator = generator_for(provider);
    let mut commands = Vec::new();
    for operation in operations {
        for sql in generator.generate_operation(operation, model)? {
            commands.push(MigrationCommand::new(provider, sql));
        }
    }
    Ok(commands)
}

/// Join command texts into one executable batch.
///
/// MySQL commands carry their own terminator and are concatenated directly;
/// every other dialect joins with a semicolon.
pub fn join_commands(provider: Provider, commands: &[MigrationCommand]) -> String {
    commands
        .iter()
        .map(|c| c.sql.as_str())
        .collect::<Vec<_>>()
        .join(provider.batch_separator())
}

/// Render commands as a human-readable script, one terminated statement per
/// paragraph.
pub fn render_script(provider: Provider, commands: &[MigrationCommand]) -> String {
    let mut script = format!(
        "-- automigrate script for {}\n-- {} statement(s)\n\n",
        provider,
        commands.len()
    );
    for command in commands {
        script.push_str(command.sql.trim_end().trim_end_matches(';'));
        script.push_str(";\n\n");
    }
    script
}

/// The type a declared column is actually stored as by `provider`.
pub fn storage_type(provider: Provider, column_type: &ColumnType) -> ColumnType {
    ColumnType::parse(&generator_for(provider).render_type(column_type))
}

/// Default used when a NOT NULL column without a default is added to an
/// existing table.
pub fn zero_default(provider: Provider, column_type: &ColumnType) -> Option<String> {
    let value = match column_type.family() {
        TypeFamily::Integer | TypeFamily::Float | TypeFamily::Decimal => "0",
        TypeFamily::Boolean => match provider {
            Provider::Postgres => "FALSE",
            _ => "0",
        },
        TypeFamily::Text => "''",
        TypeFamily::Date => "'1970-01-01'",
        TypeFamily::Time => "'00:00:00'",
        TypeFamily::DateTime => "'1970-01-01 00:00:00'",
        TypeFamily::Uuid => "'00000000-0000-0000-0000-000000000000'",
        TypeFamily::Json => match provider {
            Provider::MySql => "(JSON_OBJECT())",
            _ => "'{}'",
        },
        TypeFamily::Bytes => match provider {
            Provider::Postgres => "'\\x'",
            Provider::Sqlite => "X''",
            Provider::SqlServer => "0x",
            Provider::MySql => "('')",
        },
        TypeFamily::Other(_) => return None,
    };
    Some(value.to_string())
}

/// Quote a string literal, doubling embedded quotes.
pub fn quote_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn users() -> Table {
        Table::new("users")
            .column(Column::new("id", ColumnType::Int))
            .column(Column::new("name", ColumnType::Text))
            .primary_key(["id"])
    }

    fn commands(provider: Provider) -> Vec<MigrationCommand> {
        let ops = vec![
            ChangeOperation::CreateTable { table: users() },
            ChangeOperation::AddColumn {
                table: TableRef::unqualified("users"),
                column: Column::new("email", ColumnType::Text).nullable(),
            },
        ];
        generate(provider, &ops, &DatabaseSchema::new().with_table(users())).unwrap()
    }

    #[test]
    fn test_generate_preserves_order() {
        let cmds = commands(Provider::Postgres);
        assert_eq!(cmds.len(), 2);
        assert!(cmds[0].sql.starts_with("CREATE TABLE"));
        assert!(cmds[1].sql.starts_with("ALTER TABLE"));
        assert!(cmds.iter().all(|c| c.provider == Provider::Postgres));
    }

    #[test]
    fn test_join_with_semicolon() {
        let cmds = vec![
            MigrationCommand::new(Provider::Sqlite, "CREATE TABLE a (x INTEGER)"),
            MigrationCommand::new(Provider::Sqlite, "CREATE TABLE b (y INTEGER)"),
        ];
        assert_eq!(
            join_commands(Provider::Sqlite, &cmds),
            "CREATE TABLE a (x INTEGER);CREATE TABLE b (y INTEGER)"
        );
    }

    #[test]
    fn test_mysql_joins_without_separator() {
        let cmds = commands(Provider::MySql);
        let batch = join_commands(Provider::MySql, &cmds);
        assert_eq!(batch, format!("{}{}", cmds[0].sql, cmds[1].sql));
        assert!(cmds.iter().all(|c| c.sql.trim_end().ends_with(';')));
        assert!(!batch.contains(";;"));
    }

    #[test]
    fn test_render_script_terminates_statements() {
        let script = render_script(Provider::MySql, &commands(Provider::MySql));
        assert!(script.starts_with("-- automigrate script for mysql"));
        assert_eq!(script.matches(";\n\n").count(), 2);
        assert!(!script.contains(";;"));
    }

    #[test]
    fn test_storage_type() {
        assert_eq!(storage_type(Provider::Sqlite, &ColumnType::DateTime), ColumnType::Text);
        assert_eq!(storage_type(Provider::MySql, &ColumnType::Boolean), ColumnType::Boolean);
        assert_eq!(storage_type(Provider::Postgres, &ColumnType::Json), ColumnType::Json);
        assert_eq!(
            storage_type(Provider::SqlServer, &ColumnType::Text),
            ColumnType::Text
        );
    }

    #[test]
    fn test_zero_default() {
        assert_eq!(zero_default(Provider::Postgres, &ColumnType::Boolean).as_deref(), Some("FALSE"));
        assert_eq!(zero_default(Provider::Sqlite, &ColumnType::Int).as_deref(), Some("0"));
        assert_eq!(zero_default(Provider::Sqlite, &ColumnType::Text).as_deref(), Some("''"));
        assert_eq!(zero_default(Provider::MySql, &ColumnType::Custom("geometry".into())), None);
    }

    #[test]
    fn test_added_identity_column() {
        let ops = vec![ChangeOperation::AddColumn {
            table: TableRef::unqualified("users"),
            column: Column::new("seq", ColumnType::Int).auto_increment(),
        }];
        let model = DatabaseSchema::new().with_table(users());
        let sql = |provider| {
            generate(provider, &ops, &model)
                .map(|cmds| cmds.into_iter().map(|c| c.sql).collect::<Vec<_>>().join("\n"))
        };

        assert_eq!(
            sql(Provider::Sqlite).unwrap(),
            "ALTER TABLE \"users\" ADD COLUMN \"seq\" INTEGER NOT NULL DEFAULT 0"
        );
        assert!(!sql(Provider::Postgres).unwrap().contains("DEFAULT"));
        assert!(matches!(
            sql(Provider::MySql).unwrap_err(),
            MigrationError::UnsupportedOperation { .. }
        ));
    }

    #[test]
    fn test_data_operations() {
        let generator = PostgresSqlGenerator;
        let table = TableRef::unqualified("roles");
        let inserts = generator.insert_data(
            &table,
            &["id".to_string(), "name".to_string()],
            &[vec![Value::from(1), Value::from("admin")]],
        );
        assert_eq!(inserts, vec!["INSERT INTO \"roles\" (\"id\", \"name\") VALUES (1, 'admin')"]);

        let delete = generator.delete_data(&table, &["id".to_string()], &[vec![Value::from(1)]]);
        assert_eq!(delete, vec!["DELETE FROM \"roles\" WHERE \"id\" = 1"]);

        let update = generator.update_data(
            &table,
            &["id".to_string()],
            &[Value::from(1)],
            &["name".to_string()],
            &[Value::from("o'brien")],
        );
        assert_eq!(update, "UPDATE \"roles\" SET \"name\" = 'o''brien' WHERE \"id\" = 1");
    }
}
