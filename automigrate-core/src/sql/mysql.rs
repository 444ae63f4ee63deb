//! MySQL SQL generation.
//!
//! Every statement carries its own `;` terminator, so batches are joined
//! without a separator.

use super::{quote_string, SqlGenerator};
use crate::error::MigrateResult;
use crate::operation::ChangeOperation;
use crate::provider::Provider;
use crate::schema::{Column, ColumnType, DatabaseSchema, Table};

/// SQL generator for MySQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlGenerator;

impl SqlGenerator for MySqlGenerator {
    fn provider(&self) -> Provider {
        Provider::MySql
    }

    fn render_type(&self, column_type: &ColumnType) -> String {
        match column_type {
            ColumnType::SmallInt => "SMALLINT".to_string(),
            ColumnType::Int => "INT".to_string(),
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Float => "FLOAT".to_string(),
            ColumnType::Double => "DOUBLE".to_string(),
            ColumnType::Decimal { precision, scale } => format!(
                "DECIMAL({},{})",
                precision.unwrap_or(18),
                scale.unwrap_or(2)
            ),
            ColumnType::Boolean => "TINYINT(1)".to_string(),
            ColumnType::Text => "LONGTEXT".to_string(),
            ColumnType::VarChar(n) => format!("VARCHAR({})", n.unwrap_or(255)),
            ColumnType::Char(n) => format!("CHAR({})", n.unwrap_or(1)),
            ColumnType::Bytes => "LONGBLOB".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Time => "TIME(6)".to_string(),
            ColumnType::DateTime => "DATETIME(6)".to_string(),
            ColumnType::Timestamp => "TIMESTAMP(6)".to_string(),
            ColumnType::Json => "JSON".to_string(),
            ColumnType::Uuid => "CHAR(36)".to_string(),
            ColumnType::Custom(name) => name.clone(),
        }
    }

    fn generate_operation(
        &self,
        operation: &ChangeOperation,
        model: &DatabaseSchema,
    ) -> MigrateResult<Vec<String>> {
        let statements = match operation {
            ChangeOperation::EnsureSchema { name } => {
                vec![format!("CREATE SCHEMA IF NOT EXISTS {}", self.quote(name))]
            }
            ChangeOperation::DropSchema { name } => {
                vec![format!("DROP SCHEMA {}", self.quote(name))]
            }
            ChangeOperation::CreateSequence { .. }
            | ChangeOperation::AlterSequence { .. }
            | ChangeOperation::RenameSequence { .. }
            | ChangeOperation::DropSequence { .. } => return Err(self.unsupported(operation)),
            ChangeOperation::CreateTable { table } => vec![self.create_table(table, model)],
            ChangeOperation::DropTable { table, .. } => {
                vec![format!("DROP TABLE {}", self.table_name(table))]
            }
            ChangeOperation::RenameTable { table, new_name } => vec![format!(
                "RENAME TABLE {} TO {}",
                self.table_name(table),
                self.qualified(table.schema.as_deref(), new_name)
            )],
            ChangeOperation::AddColumn { table, column } => {
                // AUTO_INCREMENT needs a key, which cannot be added here
                if column.auto_increment {
                    return Err(self.unsupported(operation));
                }
                let mut column = column.clone();
                column.default = self.added_column_default(&column);
                vec![format!(
                    "ALTER TABLE {} ADD {}",
                    self.table_name(table),
                    self.column_definition(&column)
                )]
            }
            ChangeOperation::DropColumn { table, column } => vec![format!(
                "ALTER TABLE {} DROP COLUMN {}",
                self.table_name(table),
                self.quote(column)
            )],
            ChangeOperation::AlterColumn { table, column, .. } => vec![format!(
                "ALTER TABLE {} MODIFY COLUMN {}",
                self.table_name(table),
                self.column_definition(column)
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
            ChangeOperation::AddPrimaryKey {
                table,
                name,
                primary_key,
            } => vec![format!(
                "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({})",
                self.table_name(table),
                self.quote(name),
                self.column_list(&primary_key.columns)
            )],
            ChangeOperation::DropPrimaryKey { table, .. } => {
                vec![format!("ALTER TABLE {} DROP PRIMARY KEY", self.table_name(table))]
            }
            ChangeOperation::AddForeignKey {
                table,
                name,
                foreign_key,
            } => vec![format!(
                "ALTER TABLE {} ADD CONSTRAINT {} {}",
                self.table_name(table),
                self.quote(name),
                self.references_clause(table, foreign_key, model)
            )],
            ChangeOperation::DropForeignKey { table, name, .. } => vec![format!(
                "ALTER TABLE {} DROP FOREIGN KEY {}",
                self.table_name(table),
                self.quote(name)
            )],
            ChangeOperation::AddUniqueConstraint {
                table,
                name,
                constraint,
            } => vec![format!(
                "ALTER TABLE {} ADD CONSTRAINT {} UNIQUE ({})",
                self.table_name(table),
                self.quote(name),
                self.column_list(&constraint.columns)
            )],
            ChangeOperation::DropUniqueConstraint { table, name, .. } => vec![format!(
                "ALTER TABLE {} DROP INDEX {}",
                self.table_name(table),
                self.quote(name)
            )],
            ChangeOperation::AddCheckConstraint { table, constraint } => vec![format!(
                "ALTER TABLE {} ADD CONSTRAINT {} CHECK ({})",
                self.table_name(table),
                self.quote(&constraint.name),
                constraint.expression
            )],
            ChangeOperation::DropCheckConstraint { table, name, .. } => vec![format!(
                "ALTER TABLE {} DROP CHECK {}",
                self.table_name(table),
                self.quote(name)
            )],
            ChangeOperation::CreateIndex { table, index } => {
                if index.filter.is_some() {
                    return Err(self.unsupported(operation));
                }
                vec![format!(
                    "CREATE {}INDEX {} ON {} ({})",
                    if index.unique { "UNIQUE " } else { "" },
                    self.quote(&index.name),
                    self.table_name(table),
                    self.column_list(&index.columns)
                )]
            }
            ChangeOperation::DropIndex { table, name, .. } => vec![format!(
                "DROP INDEX {} ON {}",
                self.quote(name),
                self.table_name(table)
            )],
            ChangeOperation::RenameIndex {
                table,
                name,
                new_name,
            } => vec![format!(
                "ALTER TABLE {} RENAME INDEX {} TO {}",
                self.table_name(table),
                self.quote(name),
                self.quote(new_name)
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
        };

        Ok(statements.into_iter().map(terminate).collect())
    }
}

impl MySqlGenerator {
    /// Generate CREATE TABLE statement.
    fn create_table(&self, table: &Table, model: &DatabaseSchema) -> String {
        let mut parts: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();
        parts.extend(self.table_constraints(table, model));

        let mut sql = format!(
            "CREATE TABLE {} (\n    {}\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
            self.table_name(&table.table_ref()),
            parts.join(",\n    ")
        );
        if let Some(comment) = &table.comment {
            sql.push_str(&format!(" COMMENT={}", quote_string(comment)));
        }
        sql
    }

    /// Generate a column definition.
    fn column_definition(&self, column: &Column) -> String {
        let sql_type = self.render_type(&column.column_type);
        let mut parts = vec![self.quote(&column.name), sql_type.clone()];

        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }
        if column.auto_increment {
            parts.push("AUTO_INCREMENT".to_string());
        } else if let Some(default) = &column.default {
            parts.push(format!("DEFAULT {}", default_expression(&sql_type, default)));
        }
        if let Some(comment) = &column.comment {
            parts.push(format!("COMMENT {}", quote_string(comment)));
        }

        parts.join(" ")
    }
}

/// Text, blob and JSON columns only accept parenthesized expression defaults.
fn default_expression(sql_type: &str, default: &str) -> String {
    let needs_parens = matches!(sql_type, "LONGTEXT" | "LONGBLOB" | "JSON");
    if needs_parens && !default.starts_with('(') {
        format!("({})", default)
    } else {
        default.to_string()
    }
}

fn terminate(sql: String) -> String {
    let trimmed = sql.trim_end();
    if trimmed.ends_with(';') {
        trimmed.to_string()
    } else {
        format!("{};", trimmed)
    }
}
