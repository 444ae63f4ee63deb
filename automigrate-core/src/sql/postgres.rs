//! PostgreSQL SQL generation.

use serde_json::Value;

use super::{quote_string, SqlGenerator};
use crate::error::MigrateResult;
use crate::operation::ChangeOperation;
use crate::provider::Provider;
use crate::schema::{Column, ColumnType, DatabaseSchema, Sequence, Table, TableRef};

/// SQL generator for PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresSqlGenerator;

impl SqlGenerator for PostgresSqlGenerator {
    fn provider(&self) -> Provider {
        Provider::Postgres
    }

    fn render_type(&self, column_type: &ColumnType) -> String {
        match column_type {
            ColumnType::SmallInt => "SMALLINT".to_string(),
            ColumnType::Int => "INTEGER".to_string(),
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Float => "REAL".to_string(),
            ColumnType::Double => "DOUBLE PRECISION".to_string(),
            ColumnType::Decimal {
                precision: Some(p),
                scale: Some(s),
            } => format!("NUMERIC({}, {})", p, s),
            ColumnType::Decimal {
                precision: Some(p),
                scale: None,
            } => format!("NUMERIC({})", p),
            ColumnType::Decimal { .. } => "NUMERIC".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::VarChar(Some(n)) => format!("VARCHAR({})", n),
            ColumnType::VarChar(None) => "VARCHAR".to_string(),
            ColumnType::Char(Some(n)) => format!("CHAR({})", n),
            ColumnType::Char(None) => "CHAR".to_string(),
            ColumnType::Bytes => "BYTEA".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Time => "TIME".to_string(),
            ColumnType::DateTime => "TIMESTAMPTZ".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::Json => "JSONB".to_string(),
            ColumnType::Uuid => "UUID".to_string(),
            ColumnType::Custom(name) => name.clone(),
        }
    }

    fn literal(&self, value: &Value) -> String {
        match value {
            Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Value::Null => "NULL".to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => quote_string(s),
            other => quote_string(&other.to_string()),
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
            ChangeOperation::CreateSequence { sequence } => vec![self.create_sequence(sequence)],
            ChangeOperation::AlterSequence { sequence } => vec![self.alter_sequence(sequence)],
            ChangeOperation::RenameSequence {
                schema,
                name,
                new_name,
            } => vec![format!(
                "ALTER SEQUENCE {} RENAME TO {}",
                self.qualified(schema.as_deref(), name),
                self.quote(new_name)
            )],
            ChangeOperation::DropSequence { schema, name } => vec![format!(
                "DROP SEQUENCE {}",
                self.qualified(schema.as_deref(), name)
            )],
            ChangeOperation::CreateTable { table } => self.create_table(table, model),
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
                let mut statements = vec![format!(
                    "ALTER TABLE {} ADD COLUMN {}",
                    self.table_name(table),
                    self.column_definition(&column)
                )];
                statements.extend(self.column_comment(table, &column));
                statements
            }
            ChangeOperation::DropColumn { table, column } => vec![format!(
                "ALTER TABLE {} DROP COLUMN {}",
                self.table_name(table),
                self.quote(column)
            )],
            ChangeOperation::AlterColumn {
                table,
                column,
                old_column,
            } => self.alter_column(table, column, old_column),
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
            ChangeOperation::AddCheckConstraint { table, constraint } => vec![format!(
                "ALTER TABLE {} ADD CONSTRAINT {} CHECK ({})",
                self.table_name(table),
                self.quote(&constraint.name),
                constraint.expression
            )],
            ChangeOperation::DropPrimaryKey { table, name, .. }
            | ChangeOperation::DropForeignKey { table, name, .. }
            | ChangeOperation::DropUniqueConstraint { table, name, .. }
            | ChangeOperation::DropCheckConstraint { table, name, .. } => vec![format!(
                "ALTER TABLE {} DROP CONSTRAINT {}",
                self.table_name(table),
                self.quote(name)
            )],
            ChangeOperation::CreateIndex { table, index } => {
                let mut sql = format!(
                    "CREATE {}INDEX {} ON {} ({})",
                    if index.unique { "UNIQUE " } else { "" },
                    self.quote(&index.name),
                    self.table_name(table),
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
            ChangeOperation::RenameIndex {
                table,
                name,
                new_name,
            } => vec![format!(
                "ALTER INDEX {} RENAME TO {}",
                self.qualified(table.schema.as_deref(), name),
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

        Ok(statements)
    }
}

impl PostgresSqlGenerator {
    /// Generate CREATE TABLE plus comment statements.
    fn create_table(&self, table: &Table, model: &DatabaseSchema) -> Vec<String> {
        let table_ref = table.table_ref();
        let mut parts: Vec<String> = table
            .columns
            .iter()
            .map(|c| self.column_definition(c))
            .collect();
        parts.extend(self.table_constraints(table, model));

        let mut statements = vec![format!(
            "CREATE TABLE {} (\n    {}\n)",
            self.table_name(&table_ref),
            parts.join(",\n    ")
        )];

        if let Some(comment) = &table.comment {
            statements.push(format!(
                "COMMENT ON TABLE {} IS {}",
                self.table_name(&table_ref),
                quote_string(comment)
            ));
        }
        for column in &table.columns {
            statements.extend(self.column_comment(&table_ref, column));
        }

        statements
    }

    /// Generate a column definition.
    fn column_definition(&self, column: &Column) -> String {
        let sql_type = if column.auto_increment {
            match column.column_type {
                ColumnType::SmallInt => "SMALLSERIAL".to_string(),
                ColumnType::BigInt => "BIGSERIAL".to_string(),
                ColumnType::Int => "SERIAL".to_string(),
                ref other => self.render_type(other),
            }
        } else {
            self.render_type(&column.column_type)
        };

        let mut parts = vec![self.quote(&column.name), sql_type];
        if !column.nullable {
            parts.push("NOT NULL".to_string());
        }
        if let Some(default) = &column.default {
            if !column.auto_increment {
                parts.push(format!("DEFAULT {}", default));
            }
        }
        parts.join(" ")
    }

    fn column_comment(&self, table: &TableRef, column: &Column) -> Option<String> {
        column.comment.as_ref().map(|comment| {
            format!(
                "COMMENT ON COLUMN {}.{} IS {}",
                self.table_name(table),
                self.quote(&column.name),
                quote_string(comment)
            )
        })
    }

    /// Generate ALTER COLUMN statements for the attributes that changed.
    fn alter_column(&self, table: &TableRef, column: &Column, old: &Column) -> Vec<String> {
        let prefix = format!(
            "ALTER TABLE {} ALTER COLUMN {}",
            self.table_name(table),
            self.quote(&column.name)
        );
        let mut statements = Vec::new();

        let new_type = self.render_type(&column.column_type);
        if new_type != self.render_type(&old.column_type) {
            statements.push(format!(
                "{} TYPE {} USING {}::{}",
                prefix,
                new_type,
                self.quote(&column.name),
                new_type
            ));
        }
        if column.nullable != old.nullable {
            statements.push(if column.nullable {
                format!("{} DROP NOT NULL", prefix)
            } else {
                format!("{} SET NOT NULL", prefix)
            });
        }
        if column.default != old.default {
            statements.push(match &column.default {
                Some(default) => format!("{} SET DEFAULT {}", prefix, default),
                None => format!("{} DROP DEFAULT", prefix),
            });
        }

        statements
    }

    fn create_sequence(&self, sequence: &Sequence) -> String {
        format!(
            "CREATE SEQUENCE {} START WITH {} {}",
            self.qualified(sequence.schema.as_deref(), &sequence.name),
            sequence.start,
            self.sequence_attributes(sequence)
        )
    }

    fn alter_sequence(&self, sequence: &Sequence) -> String {
        format!(
            "ALTER SEQUENCE {} {}",
            self.qualified(sequence.schema.as_deref(), &sequence.name),
            self.sequence_attributes(sequence)
        )
    }

    fn sequence_attributes(&self, sequence: &Sequence) -> String {
        let mut parts = vec![format!("INCREMENT BY {}", sequence.increment)];
        parts.push(match sequence.min_value {
            Some(min) => format!("MINVALUE {}", min),
            None => "NO MINVALUE".to_string(),
        });
        parts.push(match sequence.max_value {
            Some(max) => format!("MAXVALUE {}", max),
            None => "NO MAXVALUE".to_string(),
        });
        parts.push(if sequence.cycle { "CYCLE" } else { "NO CYCLE" }.to_string());
        parts.join(" ")
    }
}
