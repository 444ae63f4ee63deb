//! SQL Server column metadata.

use super::catalog::strip_parens;
use crate::connection::{Row, RowExt};
use crate::error::MigrateResult;
use crate::schema::{Column, ColumnType};

/// Parse a `sys.columns` row.
pub(super) fn parse_column(row: &Row) -> MigrateResult<Column> {
    let name = row.require_str("column_name")?;
    let data_type = row.require_str("data_type")?.to_ascii_lowercase();
    let max_length = row.get_i64("max_length");

    let type_name = match data_type.as_str() {
        "nvarchar" | "nchar" => match max_length {
            Some(-1) => format!("{}(max)", data_type),
            Some(bytes) => format!("{}({})", data_type, bytes / 2),
            None => data_type,
        },
        "varchar" | "char" | "varbinary" | "binary" => match max_length {
            Some(-1) => format!("{}(max)", data_type),
            Some(length) => format!("{}({})", data_type, length),
            None => data_type,
        },
        "decimal" | "numeric" => match (row.get_i64("precision"), row.get_i64("scale")) {
            (Some(p), Some(s)) => format!("{}({},{})", data_type, p, s),
            _ => data_type,
        },
        _ => data_type,
    };

    Ok(Column {
        name,
        column_type: ColumnType::parse(&type_name),
        nullable: row.get_bool("is_nullable").unwrap_or(true),
        default: row.get_str("column_default").map(|d| strip_parens(&d)),
        auto_increment: row.get_bool("is_identity").unwrap_or(false),
        comment: row.get_str("comment"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_unicode_lengths() {
        let name = parse_column(&row(json!({
            "column_name": "name", "data_type": "nvarchar", "max_length": 200, "is_nullable": false,
        })))
        .unwrap();
        assert_eq!(name.column_type, ColumnType::VarChar(Some(100)));

        let bio = parse_column(&row(json!({
            "column_name": "bio", "data_type": "nvarchar", "max_length": -1, "is_nullable": true,
        })))
        .unwrap();
        assert_eq!(bio.column_type, ColumnType::Text);
        assert!(bio.nullable);
    }

    #[test]
    fn test_default_and_identity() {
        let column = parse_column(&row(json!({
            "column_name": "id", "data_type": "int", "max_length": 4, "is_nullable": false,
            "is_identity": true, "column_default": null,
        })))
        .unwrap();
        assert!(column.auto_increment);

        let column = parse_column(&row(json!({
            "column_name": "active", "data_type": "bit", "is_nullable": false, "column_default": "((1))",
        })))
        .unwrap();
        assert_eq!(column.column_type, ColumnType::Boolean);
        assert_eq!(column.default.as_deref(), Some("1"));
    }
}
