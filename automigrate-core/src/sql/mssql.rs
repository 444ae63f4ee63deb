//! SQL Server SQL generation.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;

use super::{quote_string, SqlGenerator};
use crate::error::MigrateResult;
use crate::operation::ChangeOperation;
use crate::provider::Provider;
use crate::schema::{Column, ColumnType, DatabaseSchema, Sequence, Table, TableRef};

/// SQL generator for SQL Server.
///
/// Dropping a column first drops its default constraint through a
/// `DECLARE @varN` block; the counter keeps those variable names unique
/// within one batch.
#[derive(Debug, Default)]
pub struct MssqlGenerator {
    variable_counter: AtomicUsize,
}

impl MssqlGenerator {
    /// Create a generator with a fresh variable counter.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SqlGenerator for MssqlGenerator {
    fn provider(&self) -> Provider {
        Provider::SqlServer
    }

    fn render_type(&self, column_type: &ColumnType) -> String {
        match column_type {
            ColumnType::SmallInt => "SMALLINT".to_string(),
            ColumnType::Int => "INT".to_string(),
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Float => "REAL".to_string(),
            ColumnType::Double => "FLOAT".to_string(),
            ColumnType::Decimal { precision, scale } => format!(
                "DECIMAL({},{})",
                precision.unwrap_or(18),
                scale.unwrap_or(2)
            ),
            ColumnType::Boolean => "BIT".to_string(),
            ColumnType::Text | ColumnType::Json => "NVARCHAR(MAX)".to_string(),
            ColumnType::VarChar(Some(n)) if *n <= 4000 => format!("NVARCHAR({})", n),
            ColumnType::VarChar(_) => "NVARCHAR(MAX)".to_string(),
            ColumnType::Char(n) => format!("NCHAR({})", n.unwrap_or(1)),
            ColumnType::Bytes => "VARBINARY(MAX)".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Time => "TIME".to_string(),
            ColumnType::DateTime => "DATETIMEOFFSET".to_string(),
            ColumnType::Timestamp => "DATETIME2".to_string(),
            ColumnType::Uuid => "UNIQUEIDENTIFIER".to_string(),
            ColumnType::Custom(name) => name.clone(),
        }
    }

    fn literal(&self, value: &Value) -> String {
        match value {
            Value::String(s) => format!("N{}", quote_string(s)),
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Value::Number(n) => n.to_string(),
            other => format!("N{}", quote_string(&other.to_string())),
        }
    }

    fn generate_operation(
        &self,
        operation: &ChangeOperation,
        model: &DatabaseSchema,
    ) -> MigrateResult<Vec<String>> {
        let statements = match operation {
            ChangeOperation::EnsureSchema { name } => vec![format!(
                "IF SCHEMA_ID({}) IS NULL EXEC({})",
                unicode(name),
                unicode(&format!("CREATE SCHEMA {}", self.quote(name)))
            )],
            ChangeOperation::DropSchema { name } => {
                vec![format!("DROP SCHEMA {}", self.quote(name))]
            }
            ChangeOperation::CreateSequence { sequence } => vec![self.create_sequence(sequence)],
            ChangeOperation::AlterSequence { sequence } => vec![format!(
                "ALTER SEQUENCE {} {}",
                self.qualified(sequence.schema.as_deref(), &sequence.name),
                self.sequence_attributes(sequence)
            )],
            ChangeOperation::RenameSequence {
                schema,
                name,
                new_name,
            } => vec![self.rename(&self.qualified(schema.as_deref(), name), new_name, None)],
            ChangeOperation::DropSequence { schema, name } => vec![format!(
                "DROP SEQUENCE {}",
                self.qualified(schema.as_deref(), name)
            )],
            ChangeOperation::CreateTable { table } => self.create_table(table, model),
            ChangeOperation::DropTable { table, .. } => {
                vec![format!("DROP TABLE {}", self.table_name(table))]
            }
            ChangeOperation::RenameTable { table, new_name } => {
                vec![self.rename(&self.table_name(table), new_name, None)]
            }
            ChangeOperation::AddColumn { table, column } => {
                let mut column = column.clone();
                column.default = self.added_column_default(&column);
                let mut statements = vec![format!(
                    "ALTER TABLE {} ADD {}",
                    self.table_name(table),
                    self.column_definition(&column)
                )];
                statements.extend(self.column_comment(table, &column));
                statements
            }
            ChangeOperation::DropColumn { table, column } => vec![
                self.drop_default_constraint(table, column),
                format!(
                    "ALTER TABLE {} DROP COLUMN {}",
                    self.table_name(table),
                    self.quote(column)
                ),
            ],
            ChangeOperation::AlterColumn {
                table,
                column,
                old_column,
            } => self.alter_column(table, column, old_column),
            ChangeOperation::RenameColumn {
                table,
                column,
                new_name,
            } => vec![self.rename(
                &format!("{}.{}", self.table_name(table), self.quote(column)),
                new_name,
                Some("COLUMN"),
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
                "DROP INDEX {} ON {}",
                self.quote(name),
                self.table_name(table)
            )],
            ChangeOperation::RenameIndex {
                table,
                name,
                new_name,
            } => vec![self.rename(
                &format!("{}.{}", self.table_name(table), self.quote(name)),
                new_name,
                Some("INDEX"),
            )],
            ChangeOperation::InsertData {
                table,
                columns,
                rows,
            } => {
                let inserts = self.insert_data(table, columns, rows);
                if self.inserts_identity(table, columns, model) {
                    let name = self.table_name(table);
                    let mut statements = vec![format!("SET IDENTITY_INSERT {} ON", name)];
                    statements.extend(inserts);
                    statements.push(format!("SET IDENTITY_INSERT {} OFF", name));
                    statements
                } else {
                    inserts
                }
            }
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

impl MssqlGenerator {
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
            statements.push(self.extended_property(&table_ref, None, comment));
        }
        for column in &table.columns {
            statements.extend(self.column_comment(&table_ref, column));
        }

        statements
    }

    fn column_definition(&self, column: &Column) -> String {
        let mut parts = vec![
            self.quote(&column.name),
            self.render_type(&column.column_type),
        ];
        if column.auto_increment {
            parts.push("IDENTITY(1,1)".to_string());
        }
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
        column
            .comment
            .as_ref()
            .map(|comment| self.extended_property(table, Some(&column.name), comment))
    }

    /// `sp_addextendedproperty` call attaching `MS_Description`.
    fn extended_property(&self, table: &TableRef, column: Option<&str>, comment: &str) -> String {
        let schema = table.schema.as_deref().unwrap_or("dbo");
        let mut sql = format!(
            "EXEC sp_addextendedproperty @name = N'MS_Description', @value = {}, @level0type = N'SCHEMA', @level0name = {}, @level1type = N'TABLE', @level1name = {}",
            unicode(comment),
            unicode(schema),
            unicode(&table.name)
        );
        if let Some(column) = column {
            sql.push_str(&format!(
                ", @level2type = N'COLUMN', @level2name = {}",
                unicode(column)
            ));
        }
        sql
    }

    /// Drop the default constraint on a column, if there is one.
    fn drop_default_constraint(&self, table: &TableRef, column: &str) -> String {
        let n = self.variable_counter.fetch_add(1, Ordering::Relaxed);
        let var = format!("@var{}", n);
        let table_name = self.table_name(table);
        format!(
            "DECLARE {var} sysname;\n\
             SELECT {var} = [d].[name]\n\
             FROM [sys].[default_constraints] [d]\n\
             INNER JOIN [sys].[columns] [c] ON [d].[parent_column_id] = [c].[column_id] AND [d].[parent_object_id] = [c].[object_id]\n\
             WHERE ([d].[parent_object_id] = OBJECT_ID({object}) AND [c].[name] = {column});\n\
             IF {var} IS NOT NULL EXEC(N'ALTER TABLE {escaped} DROP CONSTRAINT [' + {var} + ']')",
            var = var,
            object = unicode(&table_name),
            column = unicode(column),
            escaped = table_name.replace('\'', "''"),
        )
    }

    fn alter_column(&self, table: &TableRef, column: &Column, old: &Column) -> Vec<String> {
        let mut statements = Vec::new();
        let default_changed = column.default != old.default;

        if default_changed {
            statements.push(self.drop_default_constraint(table, &column.name));
        }

        statements.push(format!(
            "ALTER TABLE {} ALTER COLUMN {} {}{}",
            self.table_name(table),
            self.quote(&column.name),
            self.render_type(&column.column_type),
            if column.nullable { " NULL" } else { " NOT NULL" }
        ));

        if default_changed {
            if let Some(default) = &column.default {
                statements.push(format!(
                    "ALTER TABLE {} ADD DEFAULT {} FOR {}",
                    self.table_name(table),
                    default,
                    self.quote(&column.name)
                ));
            }
        }

        statements
    }

    /// `sp_rename` call. `object` is already quoted.
    fn rename(&self, object: &str, new_name: &str, kind: Option<&str>) -> String {
        let mut sql = format!("EXEC sp_rename {}, {}", unicode(object), unicode(new_name));
        if let Some(kind) = kind {
            sql.push_str(&format!(", {}", unicode(kind)));
        }
        sql
    }

    fn create_sequence(&self, sequence: &Sequence) -> String {
        format!(
            "CREATE SEQUENCE {} AS BIGINT START WITH {} {}",
            self.qualified(sequence.schema.as_deref(), &sequence.name),
            sequence.start,
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

    /// Check if an insert supplies a value for an identity column.
    fn inserts_identity(&self, table: &TableRef, columns: &[String], model: &DatabaseSchema) -> bool {
        model
            .table(table, false)
            .map(|t| {
                t.columns
                    .iter()
                    .filter(|c| c.auto_increment)
                    .any(|c| columns.iter().any(|name| name.eq_ignore_ascii_case(&c.name)))
            })
            .unwrap_or(false)
    }
}

/// `N'...'` string literal.
fn unicode(value: &str) -> String {
    format!("N{}", quote_string(value))
}
