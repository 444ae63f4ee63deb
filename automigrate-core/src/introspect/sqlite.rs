//! SQLite catalog strategy.
//!
//! SQLite has no information schema; each table is read through
//! `PRAGMA table_info`, `PRAGMA foreign_key_list`, `PRAGMA index_list` and
//! `PRAGMA index_info`. Check constraints are not reported.

use std::collections::BTreeMap;

use super::queries;
use super::IntrospectionConfig;
use crate::connection::{DatabaseConnection, Row, RowExt};
use crate::error::MigrateResult;
use crate::provider::Provider;
use crate::schema::{
    Column, ColumnType, DatabaseSchema, ForeignKey, Index, PrimaryKey, ReferentialAction, Table,
    UniqueConstraint,
};
use crate::sql::quote_string;

/// Read every user table.
pub(super) async fn read_schema(
    conn: &dyn DatabaseConnection,
    config: &IntrospectionConfig,
) -> MigrateResult<DatabaseSchema> {
    let mut schema = DatabaseSchema::new();

    for row in conn.query(&queries::tables_query(Provider::Sqlite, &[])).await? {
        let name = row.require_str("table_name")?;
        if !config.should_include_table(&name) {
            continue;
        }
        let sql = row.get_str("sql").unwrap_or_default();
        schema.tables.push(read_table(conn, &name, &sql).await?);
    }

    resolve_implicit_references(conn, &mut schema).await?;
    Ok(schema)
}

async fn read_table(conn: &dyn DatabaseConnection, name: &str, sql: &str) -> MigrateResult<Table> {
    let mut table = Table::new(name);

    let info = conn.query(&queries::sqlite_table_info(name)).await?;
    let mut key_columns: Vec<(i64, String)> = Vec::new();
    for row in &info {
        let column = parse_column(row)?;
        let position = row.get_i64("pk").unwrap_or(0);
        if position > 0 {
            key_columns.push((position, column.name.clone()));
        }
        table.columns.push(column);
    }
    key_columns.sort();

    if !key_columns.is_empty() {
        let columns: Vec<String> = key_columns.into_iter().map(|(_, c)| c).collect();
        if let [single] = columns.as_slice() {
            let autoincrement = sql.to_ascii_uppercase().contains("AUTOINCREMENT");
            if let Some(column) = table.columns.iter_mut().find(|c| &c.name == single) {
                if autoincrement && column.column_type == ColumnType::Int {
                    column.auto_increment = true;
                }
            }
        }
        table.primary_key = Some(PrimaryKey {
            name: None,
            columns,
        });
    }

    table.foreign_keys = read_foreign_keys(conn, name).await?;

    for row in conn.query(&queries::sqlite_index_list(name)).await? {
        let index_name = row.require_str("name")?;
        let columns = read_index_columns(conn, &index_name).await?;
        let unique = row.get_bool("unique").unwrap_or(false);

        match row.get_str("origin").as_deref() {
            Some("pk") => {}
            Some("u") => table.unique_constraints.push(UniqueConstraint {
                name: None,
                columns,
            }),
            _ => {
                let filter = if row.get_bool("partial").unwrap_or(false) {
                    read_index_filter(conn, &index_name).await?
                } else {
                    None
                };
                table.indexes.push(Index {
                    name: index_name,
                    columns,
                    unique,
                    filter,
                });
            }
        }
    }
    table.indexes.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(table)
}

fn parse_column(row: &Row) -> MigrateResult<Column> {
    let name = row.require_str("name")?;
    let declared = row.get_str("type").unwrap_or_default();
    let column_type = if declared.trim().is_empty() {
        ColumnType::Custom("BLOB".to_string())
    } else {
        ColumnType::parse(&declared)
    };
    let not_null = row.get_bool("notnull").unwrap_or(false);
    let rowid = row.get_i64("pk").unwrap_or(0) > 0 && declared.eq_ignore_ascii_case("integer");

    Ok(Column {
        name,
        column_type,
        nullable: !(not_null || rowid),
        default: row.get_str("dflt_value"),
        auto_increment: false,
        comment: None,
    })
}

async fn read_foreign_keys(conn: &dyn DatabaseConnection, table: &str) -> MigrateResult<Vec<ForeignKey>> {
    let mut grouped: BTreeMap<i64, Vec<Row>> = BTreeMap::new();
    for row in conn.query(&queries::sqlite_foreign_key_list(table)).await? {
        grouped
            .entry(row.get_i64("id").unwrap_or(0))
            .or_default()
            .push(row);
    }

    let mut foreign_keys = Vec::new();
    for (_, mut rows) in grouped {
        rows.sort_by_key(|r| r.get_i64("seq").unwrap_or(0));
        let Some(first) = rows.first() else {
            continue;
        };
        foreign_keys.push(ForeignKey {
            name: None,
            columns: rows.iter().filter_map(|r| r.get_str("from")).collect(),
            referenced_table: first.require_str("table")?,
            referenced_schema: None,
            referenced_columns: rows.iter().filter_map(|r| r.get_str("to")).collect(),
            on_delete: ReferentialAction::from_catalog(&first.get_str("on_delete").unwrap_or_default()),
            on_update: ReferentialAction::from_catalog(&first.get_str("on_update").unwrap_or_default()),
        });
    }
    Ok(foreign_keys)
}

async fn read_index_columns(conn: &dyn DatabaseConnection, index: &str) -> MigrateResult<Vec<String>> {
    let mut rows = conn.query(&queries::sqlite_index_info(index)).await?;
    rows.sort_by_key(|r| r.get_i64("seqno").unwrap_or(0));
    Ok(rows.iter().filter_map(|r| r.get_str("name")).collect())
}

/// The `WHERE` predicate of a partial index, taken from its stored SQL.
async fn read_index_filter(conn: &dyn DatabaseConnection, index: &str) -> MigrateResult<Option<String>> {
    let sql = format!(
        "SELECT sql FROM sqlite_master WHERE type = 'index' AND name = {}",
        quote_string(index)
    );
    let definition = conn
        .query(&sql)
        .await?
        .first()
        .and_then(|row| row.get_str("sql"))
        .unwrap_or_default();
    Ok(definition
        .to_ascii_uppercase()
        .rfind(" WHERE ")
        .map(|pos| definition[pos + " WHERE ".len()..].trim().to_string()))
}

/// A foreign key declared as `REFERENCES parent` without columns targets the
/// parent's primary key; PRAGMA reports its columns as NULL.
async fn resolve_implicit_references(
    conn: &dyn DatabaseConnection,
    schema: &mut DatabaseSchema,
) -> MigrateResult<()> {
    let mut missing = Vec::new();
    for table in &schema.tables {
        for fk in &table.foreign_keys {
            if fk.referenced_columns.len() != fk.columns.len() {
                missing.push(fk.referenced_table.clone());
            }
        }
    }

    for parent in missing {
        let key: Vec<String> = match schema.table_named(&parent) {
            Some(t) => t.primary_key.as_ref().map(|pk| pk.columns.clone()).unwrap_or_default(),
            None => {
                let mut rows = conn.query(&queries::sqlite_table_info(&parent)).await?;
                rows.retain(|r| r.get_i64("pk").unwrap_or(0) > 0);
                rows.sort_by_key(|r| r.get_i64("pk").unwrap_or(0));
                rows.iter().filter_map(|r| r.get_str("name")).collect()
            }
        };
        for table in &mut schema.tables {
            for fk in &mut table.foreign_keys {
                if fk.referenced_table.eq_ignore_ascii_case(&parent)
                    && fk.referenced_columns.len() != fk.columns.len()
                {
                    fk.referenced_columns = key.clone();
                }
            }
        }
    }
    Ok(())
}
