//! PostgreSQL column metadata.

use crate::connection::{Row, RowExt};
use crate::error::MigrateResult;
use crate::schema::{Column, ColumnType};

/// Parse an `information_schema.columns` row.
pub(super) fn parse_column(row: &Row) -> MigrateResult<Column> {
    let name = row.require_str("column_name")?;
    let data_type = row.require_str("data_type")?;

    let type_name = match data_type.as_str() {
        "USER-DEFINED" | "ARRAY" => row.get_str("udt_name").unwrap_or(data_type),
        "character varying" | "character" => match row.get_i64("character_maximum_length") {
            Some(length) => format!("{}({})", data_type, length),
            None => data_type,
        },
        "numeric" => match (row.get_i64("numeric_precision"), row.get_i64("numeric_scale")) {
            (Some(p), Some(s)) => format!("numeric({},{})", p, s),
            (Some(p), None) => format!("numeric({})", p),
            _ => data_type,
        },
        _ => data_type,
    };

    let default = row.get_str("column_default");
    let serial = default
        .as_deref()
        .map(|d| d.starts_with("nextval("))
        .unwrap_or(false);
    let auto_increment = serial || row.get_bool("is_identity").unwrap_or(false);

    Ok(Column {
        name,
        column_type: ColumnType::parse(&type_name),
        nullable: row.get_bool("is_nullable").unwrap_or(true),
        default: if auto_increment { None } else { default },
        auto_increment,
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
    fn test_numeric_precision() {
        let column = parse_column(&row(json!({
            "column_name": "total", "data_type": "numeric", "udt_name": "numeric",
            "numeric_precision": "10", "numeric_scale": "2", "is_nullable": "NO",
        })))
        .unwrap();
        assert_eq!(
            column.column_type,
            ColumnType::Decimal {
                precision: Some(10),
                scale: Some(2)
            }
        );
        assert!(!column.nullable);
    }

    #[test]
    fn test_identity_column() {
        let column = parse_column(&row(json!({
            "column_name": "id", "data_type": "bigint", "is_nullable": "NO", "is_identity": "YES",
        })))
        .unwrap();
        assert!(column.auto_increment);
        assert_eq!(column.column_type, ColumnType::BigInt);
    }

    #[test]
    fn test_user_defined_type() {
        let column = parse_column(&row(json!({
            "column_name": "mood", "data_type": "USER-DEFINED", "udt_name": "mood", "is_nullable": "YES",
        })))
        .unwrap();
        assert_eq!(column.column_type, ColumnType::Custom("mood".into()));
    }
}
