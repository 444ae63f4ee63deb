//! Assembly of catalog rows into tables.

use std::collections::HashMap;

use crate::connection::{Row, RowExt};
use crate::error::MigrateResult;
use crate::schema::{
    CheckConstraint, Column, ForeignKey, Index, PrimaryKey, ReferentialAction, Table,
    UniqueConstraint,
};

/// Tables keyed by `(schema, name)`, in catalog order.
///
/// Rows whose schema equals `default_schema` are stored unqualified.
pub(crate) struct TableSet {
    default_schema: Option<String>,
    tables: Vec<Table>,
    positions: HashMap<(Option<String>, String), usize>,
}

impl TableSet {
    pub(crate) fn new(default_schema: Option<String>) -> Self {
        Self {
            default_schema,
            tables: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Map a catalog schema name to the model's qualifier.
    pub(crate) fn qualifier(&self, schema: Option<String>) -> Option<String> {
        match (schema, &self.default_schema) {
            (Some(s), Some(d)) if s.eq_ignore_ascii_case(d) => None,
            (Some(s), _) if s.is_empty() => None,
            (schema, _) => schema,
        }
    }

    fn key_of(&self, row: &Row) -> MigrateResult<(Option<String>, String)> {
        Ok((
            self.qualifier(row.get_str("table_schema")),
            row.require_str("table_name")?,
        ))
    }

    /// Register tables from `table_schema, table_name, comment` rows.
    pub(crate) fn add_tables(&mut self, rows: &[Row]) -> MigrateResult<()> {
        for row in rows {
            let (schema, name) = self.key_of(row)?;
            let mut table = Table::new(name.clone());
            table.schema = schema.clone();
            table.comment = row.get_str("comment").filter(|c| !c.is_empty());
            self.positions.insert((schema, name), self.tables.len());
            self.tables.push(table);
        }
        Ok(())
    }

    fn table_mut(&mut self, key: &(Option<String>, String)) -> Option<&mut Table> {
        let index = *self.positions.get(key)?;
        self.tables.get_mut(index)
    }

    /// Attach columns. `parse` turns a row into a column.
    pub(crate) fn add_columns<F>(&mut self, rows: &[Row], parse: F) -> MigrateResult<()>
    where
        F: Fn(&Row) -> MigrateResult<Column>,
    {
        for row in rows {
            let key = self.key_of(row)?;
            let column = parse(row)?;
            if let Some(table) = self.table_mut(&key) {
                table.columns.push(column);
            }
        }
        Ok(())
    }

    /// Attach primary keys and unique constraints from
    /// `constraint_name, constraint_type, column_name` rows.
    pub(crate) fn add_key_constraints(&mut self, rows: &[Row]) -> MigrateResult<()> {
        for (key, name, group) in self.group(rows, "constraint_name")? {
            let Some(table) = self.table_mut(&key) else {
                continue;
            };
            let columns: Vec<String> = group
                .iter()
                .filter_map(|r| r.get_str("column_name"))
                .collect();
            let kind = group
                .first()
                .and_then(|r| r.get_str("constraint_type"))
                .unwrap_or_default()
                .to_ascii_uppercase();

            if kind == "PRIMARY KEY" || kind == "PK" {
                table.primary_key = Some(PrimaryKey {
                    name: Some(name),
                    columns,
                });
            } else {
                table.unique_constraints.push(UniqueConstraint {
                    name: Some(name),
                    columns,
                });
            }
        }
        Ok(())
    }

    /// Attach foreign keys from `constraint_name, column_name,
    /// referenced_schema, referenced_table, referenced_column, delete_rule,
    /// update_rule` rows.
    pub(crate) fn add_foreign_keys(&mut self, rows: &[Row]) -> MigrateResult<()> {
        for (key, name, group) in self.group(rows, "constraint_name")? {
            let Some(first) = group.first() else {
                continue;
            };
            let referenced_schema = self.qualifier(first.get_str("referenced_schema"));
            let referenced_table = first.require_str("referenced_table")?;
            let fk = ForeignKey {
                name: Some(name),
                columns: group.iter().filter_map(|r| r.get_str("column_name")).collect(),
                referenced_table,
                referenced_schema,
                referenced_columns: group
                    .iter()
                    .filter_map(|r| r.get_str("referenced_column"))
                    .collect(),
                on_delete: ReferentialAction::from_catalog(
                    &first.get_str("delete_rule").unwrap_or_default(),
                ),
                on_update: ReferentialAction::from_catalog(
                    &first.get_str("update_rule").unwrap_or_default(),
                ),
            };
            if let Some(table) = self.table_mut(&key) {
                table.foreign_keys.push(fk);
            }
        }
        Ok(())
    }

    /// Attach indexes from `index_name, column_name, is_unique, filter` rows.
    pub(crate) fn add_indexes(&mut self, rows: &[Row]) -> MigrateResult<()> {
        for (key, name, group) in self.group(rows, "index_name")? {
            let Some(first) = group.first() else {
                continue;
            };
            let index = Index {
                name,
                columns: group.iter().filter_map(|r| r.get_str("column_name")).collect(),
                unique: first.get_bool("is_unique").unwrap_or(false),
                filter: first.get_str("filter").map(|f| strip_parens(&f)),
            };
            if let Some(table) = self.table_mut(&key) {
                table.indexes.push(index);
            }
        }
        Ok(())
    }

    /// Attach check constraints from `constraint_name, definition` rows.
    pub(crate) fn add_check_constraints(&mut self, rows: &[Row]) -> MigrateResult<()> {
        for row in rows {
            let key = self.key_of(row)?;
            let name = row.require_str("constraint_name")?;
            let definition = row.get_str("definition").unwrap_or_default();
            if let Some(table) = self.table_mut(&key) {
                table.check_constraints.push(CheckConstraint {
                    name,
                    expression: check_expression(&definition),
                });
            }
        }
        Ok(())
    }

    /// Group consecutive rows of the same table and object name.
    #[allow(clippy::type_complexity)]
    fn group<'r>(
        &self,
        rows: &'r [Row],
        name_column: &str,
    ) -> MigrateResult<Vec<((Option<String>, String), String, Vec<&'r Row>)>> {
        let mut groups: Vec<((Option<String>, String), String, Vec<&'r Row>)> = Vec::new();
        for row in rows {
            let key = self.key_of(row)?;
            let name = row.require_str(name_column)?;
            match groups.last_mut() {
                Some((k, n, members)) if *k == key && *n == name => members.push(row),
                _ => groups.push((key, name, vec![row])),
            }
        }
        Ok(groups)
    }

    pub(crate) fn into_tables(self) -> Vec<Table> {
        self.tables
    }
}

/// Strip redundant outer parentheses, as SQL Server and PostgreSQL add them
/// around defaults, filters and check expressions.
pub(crate) fn strip_parens(expr: &str) -> String {
    let mut current = expr.trim();
    while current.starts_with('(') && current.ends_with(')') && wraps_whole(current) {
        current = current[1..current.len() - 1].trim();
    }
    current.to_string()
}

/// Check if the first `(` closes at the last character.
fn wraps_whole(expr: &str) -> bool {
    let mut depth = 0usize;
    for (i, ch) in expr.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 && i != expr.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Expression of a check definition, without the `CHECK` keyword.
pub(crate) fn check_expression(definition: &str) -> String {
    let trimmed = definition.trim();
    let body = match trimmed.get(..5) {
        Some(keyword) if keyword.eq_ignore_ascii_case("check") => &trimmed[5..],
        _ => trimmed,
    };
    strip_parens(body)
}
