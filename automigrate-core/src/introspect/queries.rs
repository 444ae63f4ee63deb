//! Catalog queries used by introspection.
//!
//! Every query aliases its result columns to the same names
//! (`table_schema`, `table_name`, `column_name`, `constraint_name`, ...) so
//! the rows can be assembled by shared code. SQLite is read per table through
//! PRAGMAs.

use crate::provider::Provider;
use crate::sql::quote_string;

/// `<column> IN (...)` when schemas are given, otherwise `fallback`.
fn schema_filter(column: &str, schemas: &[String], fallback: &str) -> String {
    if schemas.is_empty() {
        return fallback.replace("{col}", column);
    }
    let list: Vec<String> = schemas.iter().map(|s| quote_string(s)).collect();
    format!("{} IN ({})", column, list.join(", "))
}

fn default_filter(provider: Provider) -> &'static str {
    match provider {
        Provider::Postgres => {
            "{col} NOT IN ('pg_catalog', 'information_schema') AND {col} NOT LIKE 'pg\\_%'"
        }
        Provider::MySql => "{col} = DATABASE()",
        Provider::SqlServer => "{col} NOT IN ('sys', 'INFORMATION_SCHEMA')",
        Provider::Sqlite => "1 = 1",
    }
}

fn filter(provider: Provider, column: &str, schemas: &[String]) -> String {
    schema_filter(column, schemas, default_filter(provider))
}

/// Current database or default schema.
pub fn current_schema_query(provider: Provider) -> &'static str {
    match provider {
        Provider::Postgres => "SELECT current_schema() AS name",
        Provider::MySql => "SELECT DATABASE() AS name",
        Provider::SqlServer => "SELECT SCHEMA_NAME() AS name",
        Provider::Sqlite => "SELECT 'main' AS name",
    }
}

/// User schemas.
pub fn schemas_query(provider: Provider, schemas: &[String]) -> Option<String> {
    match provider {
        Provider::Postgres => Some(format!(
            "SELECT nspname AS name FROM pg_catalog.pg_namespace WHERE {} ORDER BY nspname",
            filter(provider, "nspname", schemas)
        )),
        Provider::SqlServer => Some(format!(
            "SELECT name FROM sys.schemas WHERE schema_id < 16384 AND name <> 'guest' AND {} ORDER BY name",
            filter(provider, "name", schemas)
        )),
        Provider::MySql | Provider::Sqlite => None,
    }
}

/// Base tables with comments.
pub fn tables_query(provider: Provider, schemas: &[String]) -> String {
    match provider {
        Provider::Postgres => format!(
            "SELECT t.table_schema, t.table_name, \
                obj_description(format('%I.%I', t.table_schema, t.table_name)::regclass, 'pg_class') AS comment \
             FROM information_schema.tables t \
             WHERE t.table_type = 'BASE TABLE' AND {} \
             ORDER BY t.table_schema, t.table_name",
            filter(provider, "t.table_schema", schemas)
        ),
        Provider::MySql => format!(
            "SELECT table_schema, table_name, table_comment AS comment \
             FROM information_schema.tables \
             WHERE table_type = 'BASE TABLE' AND {} \
             ORDER BY table_schema, table_name",
            filter(provider, "table_schema", schemas)
        ),
        Provider::SqlServer => format!(
            "SELECT s.name AS table_schema, t.name AS table_name, CAST(ep.value AS NVARCHAR(MAX)) AS comment \
             FROM sys.tables t \
             JOIN sys.schemas s ON s.schema_id = t.schema_id \
             LEFT JOIN sys.extended_properties ep ON ep.major_id = t.object_id AND ep.minor_id = 0 AND ep.name = 'MS_Description' \
             WHERE t.is_ms_shipped = 0 AND {} \
             ORDER BY s.name, t.name",
            filter(provider, "s.name", schemas)
        ),
        Provider::Sqlite => "SELECT name AS table_name, sql \
             FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
             ORDER BY name"
            .to_string(),
    }
}

/// Columns of every base table, in ordinal order.
pub fn columns_query(provider: Provider, schemas: &[String]) -> Option<String> {
    match provider {
        Provider::Postgres => Some(format!(
            "SELECT c.table_schema, c.table_name, c.column_name, c.data_type, c.udt_name, \
                c.is_nullable, c.column_default, c.is_identity, \
                c.character_maximum_length, c.numeric_precision, c.numeric_scale, \
                (SELECT col_description(a.attrelid, a.attnum) FROM pg_catalog.pg_attribute a \
                 WHERE a.attrelid = format('%I.%I', c.table_schema, c.table_name)::regclass \
                   AND a.attname = c.column_name) AS comment \
             FROM information_schema.columns c \
             JOIN information_schema.tables t \
               ON t.table_schema = c.table_schema AND t.table_name = c.table_name AND t.table_type = 'BASE TABLE' \
             WHERE {} \
             ORDER BY c.table_schema, c.table_name, c.ordinal_position",
            filter(provider, "c.table_schema", schemas)
        )),
        Provider::MySql => Some(format!(
            "SELECT c.table_schema, c.table_name, c.column_name, c.column_type, c.is_nullable, \
                c.column_default, c.extra, c.column_comment AS comment \
             FROM information_schema.columns c \
             JOIN information_schema.tables t \
               ON t.table_schema = c.table_schema AND t.table_name = c.table_name AND t.table_type = 'BASE TABLE' \
             WHERE {} \
             ORDER BY c.table_schema, c.table_name, c.ordinal_position",
            filter(provider, "c.table_schema", schemas)
        )),
        Provider::SqlServer => Some(format!(
            "SELECT s.name AS table_schema, t.name AS table_name, c.name AS column_name, \
                ty.name AS data_type, c.max_length, c.precision, c.scale, c.is_nullable, c.is_identity, \
                dc.definition AS column_default, CAST(ep.value AS NVARCHAR(MAX)) AS comment \
             FROM sys.columns c \
             JOIN sys.tables t ON t.object_id = c.object_id \
             JOIN sys.schemas s ON s.schema_id = t.schema_id \
             JOIN sys.types ty ON ty.user_type_id = c.user_type_id \
             LEFT JOIN sys.default_constraints dc ON dc.object_id = c.default_object_id \
             LEFT JOIN sys.extended_properties ep ON ep.major_id = c.object_id AND ep.minor_id = c.column_id AND ep.name = 'MS_Description' \
             WHERE t.is_ms_shipped = 0 AND {} \
             ORDER BY s.name, t.name, c.column_id",
            filter(provider, "s.name", schemas)
        )),
        Provider::Sqlite => None,
    }
}

/// Primary key and unique constraint columns, in key order.
///
/// `constraint_type` is `PRIMARY KEY`/`UNIQUE` (or `PK`/`UQ` on SQL Server).
pub fn key_constraints_query(provider: Provider, schemas: &[String]) -> Option<String> {
    match provider {
        Provider::Postgres | Provider::MySql => Some(format!(
            "SELECT tc.table_schema, tc.table_name, tc.constraint_name, tc.constraint_type, kcu.column_name \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.key_column_usage kcu \
               ON kcu.constraint_schema = tc.constraint_schema \
              AND kcu.constraint_name = tc.constraint_name \
              AND kcu.table_name = tc.table_name \
             WHERE tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE') AND {} \
             ORDER BY tc.table_schema, tc.table_name, tc.constraint_name, kcu.ordinal_position",
            filter(provider, "tc.table_schema", schemas)
        )),
        Provider::SqlServer => Some(format!(
            "SELECT s.name AS table_schema, t.name AS table_name, kc.name AS constraint_name, \
                kc.type AS constraint_type, c.name AS column_name \
             FROM sys.key_constraints kc \
             JOIN sys.tables t ON t.object_id = kc.parent_object_id \
             JOIN sys.schemas s ON s.schema_id = t.schema_id \
             JOIN sys.index_columns ic ON ic.object_id = kc.parent_object_id AND ic.index_id = kc.unique_index_id \
             JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id \
             WHERE {} \
             ORDER BY s.name, t.name, kc.name, ic.key_ordinal",
            filter(provider, "s.name", schemas)
        )),
        Provider::Sqlite => None,
    }
}

/// Foreign key column pairs, in key order.
pub fn foreign_keys_query(provider: Provider, schemas: &[String]) -> Option<String> {
    match provider {
        Provider::Postgres => Some(format!(
            "SELECT n.nspname AS table_schema, c.relname AS table_name, con.conname AS constraint_name, \
                a.attname AS column_name, rn.nspname AS referenced_schema, rc.relname AS referenced_table, \
                ra.attname AS referenced_column, rco.delete_rule, rco.update_rule \
             FROM pg_catalog.pg_constraint con \
             JOIN pg_catalog.pg_class c ON c.oid = con.conrelid \
             JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
             JOIN pg_catalog.pg_class rc ON rc.oid = con.confrelid \
             JOIN pg_catalog.pg_namespace rn ON rn.oid = rc.relnamespace \
             JOIN information_schema.referential_constraints rco \
               ON rco.constraint_schema = n.nspname AND rco.constraint_name = con.conname \
             CROSS JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(attnum, refattnum, ord) \
             JOIN pg_catalog.pg_attribute a ON a.attrelid = con.conrelid AND a.attnum = k.attnum \
             JOIN pg_catalog.pg_attribute ra ON ra.attrelid = con.confrelid AND ra.attnum = k.refattnum \
             WHERE con.contype = 'f' AND {} \
             ORDER BY n.nspname, c.relname, con.conname, k.ord",
            filter(provider, "n.nspname", schemas)
        )),
        Provider::MySql => Some(format!(
            "SELECT kcu.table_schema, kcu.table_name, kcu.constraint_name, kcu.column_name, \
                kcu.referenced_table_schema AS referenced_schema, kcu.referenced_table_name AS referenced_table, \
                kcu.referenced_column_name AS referenced_column, rc.delete_rule, rc.update_rule \
             FROM information_schema.key_column_usage kcu \
             JOIN information_schema.referential_constraints rc \
               ON rc.constraint_schema = kcu.constraint_schema \
              AND rc.constraint_name = kcu.constraint_name \
              AND rc.table_name = kcu.table_name \
             WHERE kcu.referenced_table_name IS NOT NULL AND {} \
             ORDER BY kcu.table_schema, kcu.table_name, kcu.constraint_name, kcu.ordinal_position",
            filter(provider, "kcu.table_schema", schemas)
        )),
        Provider::SqlServer => Some(format!(
            "SELECT s.name AS table_schema, t.name AS table_name, fk.name AS constraint_name, \
                c.name AS column_name, rs.name AS referenced_schema, rt.name AS referenced_table, \
                rcol.name AS referenced_column, \
                fk.delete_referential_action_desc AS delete_rule, \
                fk.update_referential_action_desc AS update_rule \
             FROM sys.foreign_keys fk \
             JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id \
             JOIN sys.tables t ON t.object_id = fk.parent_object_id \
             JOIN sys.schemas s ON s.schema_id = t.schema_id \
             JOIN sys.columns c ON c.object_id = fkc.parent_object_id AND c.column_id = fkc.parent_column_id \
             JOIN sys.tables rt ON rt.object_id = fk.referenced_object_id \
             JOIN sys.schemas rs ON rs.schema_id = rt.schema_id \
             JOIN sys.columns rcol ON rcol.object_id = fkc.referenced_object_id AND rcol.column_id = fkc.referenced_column_id \
             WHERE {} \
             ORDER BY s.name, t.name, fk.name, fkc.constraint_column_id",
            filter(provider, "s.name", schemas)
        )),
        Provider::Sqlite => None,
    }
}

/// Secondary indexes that do not back a key constraint.
pub fn indexes_query(provider: Provider, schemas: &[String]) -> Option<String> {
    match provider {
        Provider::Postgres => Some(format!(
            "SELECT n.nspname AS table_schema, t.relname AS table_name, i.relname AS index_name, \
                a.attname AS column_name, ix.indisunique AS is_unique, \
                pg_get_expr(ix.indpred, ix.indrelid) AS filter \
             FROM pg_catalog.pg_index ix \
             JOIN pg_catalog.pg_class t ON t.oid = ix.indrelid \
             JOIN pg_catalog.pg_class i ON i.oid = ix.indexrelid \
             JOIN pg_catalog.pg_namespace n ON n.oid = t.relnamespace \
             CROSS JOIN LATERAL unnest(ix.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord) \
             JOIN pg_catalog.pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum \
             WHERE t.relkind = 'r' \
               AND NOT EXISTS (SELECT 1 FROM pg_catalog.pg_constraint con \
                               WHERE con.conindid = ix.indexrelid AND con.contype IN ('p', 'u', 'x')) \
               AND {} \
             ORDER BY n.nspname, t.relname, i.relname, k.ord",
            filter(provider, "n.nspname", schemas)
        )),
        Provider::MySql => Some(format!(
            "SELECT s.table_schema, s.table_name, s.index_name, s.column_name, \
                CASE WHEN s.non_unique = 0 THEN 1 ELSE 0 END AS is_unique, NULL AS filter \
             FROM information_schema.statistics s \
             WHERE s.index_name <> 'PRIMARY' \
               AND NOT EXISTS (SELECT 1 FROM information_schema.table_constraints tc \
                               WHERE tc.table_schema = s.table_schema AND tc.table_name = s.table_name \
                                 AND tc.constraint_name = s.index_name \
                                 AND tc.constraint_type IN ('UNIQUE', 'FOREIGN KEY')) \
               AND {} \
             ORDER BY s.table_schema, s.table_name, s.index_name, s.seq_in_index",
            filter(provider, "s.table_schema", schemas)
        )),
        Provider::SqlServer => Some(format!(
            "SELECT s.name AS table_schema, t.name AS table_name, i.name AS index_name, \
                c.name AS column_name, i.is_unique, i.filter_definition AS filter \
             FROM sys.indexes i \
             JOIN sys.index_columns ic ON ic.object_id = i.object_id AND ic.index_id = i.index_id \
             JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id \
             JOIN sys.tables t ON t.object_id = i.object_id \
             JOIN sys.schemas s ON s.schema_id = t.schema_id \
             WHERE i.type > 0 AND i.is_primary_key = 0 AND i.is_unique_constraint = 0 \
               AND ic.is_included_column = 0 AND t.is_ms_shipped = 0 AND {} \
             ORDER BY s.name, t.name, i.name, ic.key_ordinal",
            filter(provider, "s.name", schemas)
        )),
        Provider::Sqlite => None,
    }
}

/// Check constraints.
pub fn check_constraints_query(provider: Provider, schemas: &[String]) -> Option<String> {
    match provider {
        Provider::Postgres => Some(format!(
            "SELECT n.nspname AS table_schema, c.relname AS table_name, con.conname AS constraint_name, \
                pg_get_constraintdef(con.oid) AS definition \
             FROM pg_catalog.pg_constraint con \
             JOIN pg_catalog.pg_class c ON c.oid = con.conrelid \
             JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
             WHERE con.contype = 'c' AND {} \
             ORDER BY n.nspname, c.relname, con.conname",
            filter(provider, "n.nspname", schemas)
        )),
        Provider::MySql => Some(format!(
            "SELECT tc.table_schema, tc.table_name, cc.constraint_name, cc.check_clause AS definition \
             FROM information_schema.table_constraints tc \
             JOIN information_schema.check_constraints cc \
               ON cc.constraint_schema = tc.constraint_schema AND cc.constraint_name = tc.constraint_name \
             WHERE tc.constraint_type = 'CHECK' AND {} \
             ORDER BY tc.table_schema, tc.table_name, cc.constraint_name",
            filter(provider, "tc.table_schema", schemas)
        )),
        Provider::SqlServer => Some(format!(
            "SELECT s.name AS table_schema, t.name AS table_name, cc.name AS constraint_name, \
                cc.definition \
             FROM sys.check_constraints cc \
             JOIN sys.tables t ON t.object_id = cc.parent_object_id \
             JOIN sys.schemas s ON s.schema_id = t.schema_id \
             WHERE {} \
             ORDER BY s.name, t.name, cc.name",
            filter(provider, "s.name", schemas)
        )),
        Provider::Sqlite => None,
    }
}

/// Standalone sequences. Sequences owned by serial or identity columns are
/// left out.
pub fn sequences_query(provider: Provider, schemas: &[String]) -> Option<String> {
    match provider {
        Provider::Postgres => Some(format!(
            "SELECT n.nspname AS sequence_schema, c.relname AS sequence_name, \
                s.seqstart AS start_value, s.seqincrement AS increment, \
                s.seqmin AS minimum_value, s.seqmax AS maximum_value, s.seqcycle AS cycle \
             FROM pg_catalog.pg_sequence s \
             JOIN pg_catalog.pg_class c ON c.oid = s.seqrelid \
             JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
             WHERE NOT EXISTS (SELECT 1 FROM pg_catalog.pg_depend d \
                               WHERE d.objid = s.seqrelid AND d.deptype IN ('a', 'i')) \
               AND {} \
             ORDER BY n.nspname, c.relname",
            filter(provider, "n.nspname", schemas)
        )),
        Provider::SqlServer => Some(format!(
            "SELECT s.name AS sequence_schema, sq.name AS sequence_name, \
                CAST(sq.start_value AS BIGINT) AS start_value, CAST(sq.increment AS BIGINT) AS increment, \
                CAST(sq.minimum_value AS BIGINT) AS minimum_value, CAST(sq.maximum_value AS BIGINT) AS maximum_value, \
                sq.is_cycling AS cycle \
             FROM sys.sequences sq \
             JOIN sys.schemas s ON s.schema_id = sq.schema_id \
             WHERE {} \
             ORDER BY s.name, sq.name",
            filter(provider, "s.name", schemas)
        )),
        Provider::MySql | Provider::Sqlite => None,
    }
}

/// SQLite column metadata for one table.
pub fn sqlite_table_info(table: &str) -> String {
    format!("PRAGMA table_info({})", quote_string(table))
}

/// SQLite foreign keys for one table.
pub fn sqlite_foreign_key_list(table: &str) -> String {
    format!("PRAGMA foreign_key_list({})", quote_string(table))
}

/// SQLite indexes for one table.
pub fn sqlite_index_list(table: &str) -> String {
    format!("PRAGMA index_list({})", quote_string(table))
}

/// SQLite columns of one index.
pub fn sqlite_index_info(index: &str) -> String {
    format!("PRAGMA index_info({})", quote_string(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filters() {
        let sql = tables_query(Provider::Postgres, &[]);
        assert!(sql.contains("t.table_schema NOT IN ('pg_catalog', 'information_schema')"));

        let sql = tables_query(Provider::MySql, &[]);
        assert!(sql.contains("table_schema = DATABASE()"));
    }

    #[test]
    fn test_explicit_schemas_are_quoted() {
        let sql = columns_query(Provider::SqlServer, &["sales".into(), "o'neil".into()]).unwrap();
        assert!(sql.contains("s.name IN ('sales', 'o''neil')"));
    }

    #[test]
    fn test_sqlite_uses_pragmas() {
        assert!(columns_query(Provider::Sqlite, &[]).is_none());
        assert_eq!(sqlite_table_info("users"), "PRAGMA table_info('users')");
        assert_eq!(sqlite_index_info("IX_users_email"), "PRAGMA index_info('IX_users_email')");
    }

    #[test]
    fn test_sequences_only_where_supported() {
        assert!(sequences_query(Provider::MySql, &[]).is_none());
        assert!(sequences_query(Provider::Postgres, &[])
            .unwrap()
            .contains("pg_sequence"));
    }
}
