//! SQLite SQL generation.
//!
//! SQLite's `ALTER TABLE` only adds, drops and renames, so key, constraint and
//! column type changes on existing tables are rejected.

use super::SqlGenerator;
use crate::error::MigrateResult;
use crate::operation::ChangeOperation;
use crate::provider::Provider;
use crate::schema::{Column, ColumnType, DatabaseSchema, Table};

/// SQL generator for SQLite.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteGenerator;

impl SqlGenerator for SqliteGenerator {
    fn provider(&self) -> Provider {
        Provider::Sqlite
    }

    fn render_type(&self, column_type: &ColumnType) -> String {
        match column_type {
            ColumnType::SmallInt | ColumnType::Int | ColumnType::BigInt | ColumnType::Boolean => {
                "INTEGER".to_string()
            }
            ColumnType::Float | ColumnType::Double => "REAL".to_string(),
            ColumnType::Decimal { .. } => "NUMERIC".to_string(),
            ColumnType::Bytes => "BLOB".to_string(),
            ColumnType::Text
            | ColumnType::VarChar(_)
            | ColumnType::Char(_)
            | ColumnType::Date
            | ColumnType::Time
            | ColumnType::DateTime
            | ColumnType::Timestamp
            | ColumnType::Json
            | ColumnType::Uuid => "TEXT".to_string(),
            ColumnType::Custom(name) => name.clone(),
        }
    }

    fn generate_operation(
        &self,
        operation: &ChangeOperation,
        model: &DatabaseSchema,
    ) -> MigrateResult<Vec<String>> {
        let statements = match operation {
            ChangeOperation::CreateTable { table } => vec![self.create_table(table, model)],
            ChangeOperation::DropTable { table, .. } => {
                vec![format!("DROP TABLE {}", self.table_name(table))]
            }
            ChangeOperation::RenameTable { table, new_name } => vec![format!(
                "ALTER TABLE {} RENAME TO {}",
                self.table_name(table),
                self.quote(new_name)
            )],
            ChangeOperation::AddColumn { table, column } => {
                let mut column = column.clone();
                column.default = self.added_column_default(&column);
                vec![format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    self.table_name(table),
                    self.column_definition(&column)
                )]
            }
            ChangeOperation::DropColumn { table, column } => vec![format!(
                "ALTER TABLE {} DROP COLUMN {}",
                self.table_name(table),
                self.quote(column)
            )],
            ChangeOperation::RenameColumn {
                table,
                column,
                new_name,
            } => vec![format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {}",
                self.table_name(table),
                self.quote(column),
                self.quote(new_name)
            )],
            ChangeOperation::CreateIndex { table, index } => {
                let mut sql = format!(
                    "CREATE {}INDEX {} ON {} ({})",
                    if index.unique { "UNIQUE " } else { "" },
                    self.qualified(table.schema.as_deref(), &index.name),
                    self.quote(&table.name),
                    self.column_list(&index.columns)
                );
                if let Some(filter) = &index.filter {
                    sql.push_str(&format!(" WHERE {}", filter));
                }
                vec![sql]
            }
            ChangeOperation::DropIndex { table, name, .. } => vec![format!(
                "DROP INDEX {}",
                self.qualified(table.schema.as_deref(), name)
            )],
            ChangeOperation::InsertData {
                table,
                columns,
                rows,
            } => self.insert_data(table, columns, rows),
            ChangeOperation::UpdateData {
                table,
                key_columns,
                key_values,
                columns,
                values,
            } => vec![self.update_data(table, key_columns, key_values, columns, values)],
            ChangeOperation::DeleteData {
                table,
                key_columns,
                key_values,
            } => self.delete_data(table, key_columns, key_values),
            ChangeOperation::RawSql { sql } => vec![sql.clone()],
            ChangeOperation::EnsureSchema { .. }
            | ChangeOperation::DropSchema { .. }
            | ChangeOperation::CreateSequence { .. }
            | ChangeOperation::AlterSequence { .. }
            | ChangeOperation::RenameSequence { .. }
            | ChangeOperation::DropSequence { .. }
            | ChangeOperation::AlterColumn { .. }
            | ChangeOperation::AddPrimaryKey { .. }
            | ChangeOperation::DropPrimaryKey { .. }
            | ChangeOperation::AddForeignKey { .. }
            | ChangeOperation::DropForeignKey { .. }
            | ChangeOperation::AddUniqueConstraint { .. }
            | ChangeOperation::DropUniqueConstraint { .. }
            | ChangeOperation::AddCheckConstraint { .. }
            | ChangeOperation::DropCheckConstraint { .. }
            | ChangeOperation::RenameIndex { .. } => return Err(self.unsupported(operation)),
        };

        Ok(statements)
    }
}

impl SqliteGenerator {
    /// Generate CREATE TABLE statement.
    ///
    /// A single auto-increment key column becomes an inline
    /// `INTEGER PRIMARY KEY AUTOINCREMENT` rowid alias.
    fn create_table(&self, table: &Table, model: &DatabaseSchema) -> String {
        let rowid = rowid_column(table);

        let mut parts: Vec<String> = table
            .columns
            .iter()
            .map(|c| {
                if Some(c.name.as_str()) == rowid {
                    format!("{} INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT", self.quote(&c.name))
                } else {
                    self.column_definition(c)
                }
            })
            .collect();

        if rowid.is_some() {
            let mut without_pk = table.clone();
            without_pk.primary_key = None;
            parts.extend(self.table_constraints(&without_pk, model));
        } else {
            parts.extend(self.table_constraints(table, model));
        }

        format!(
            "CREATE TABLE {} (\n    {}\n)",
            self.table_name(&table.table_ref()),
            parts.join(",\n    ")
        )
    }

    /// Generate a column definition.
    fn column_definition(&self, column: &Column) -> String {
        let mut parts = vec![
            self.quote(&column.name),
            self.render_type(&column.column_type),
        ];
        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }
        if let Some(default) = &column.default {
            parts.push(format!("DEFAULT {}", default));
        }
        parts.join(" ")
    }
}

/// Name of the column that can be rendered as the rowid alias.
fn rowid_column(table: &Table) -> Option<&str> {
    let pk = table.primary_key.as_ref()?;
    let [name] = pk.columns.as_slice() else {
        return None;
    };
    let column = table.find_column(name)?;
    let integer = matches!(
        column.column_type,
        ColumnType::SmallInt | ColumnType::Int | ColumnType::BigInt
    );
    (column.auto_increment && integer).then_some(column.name.as_str())
}
