//! MySQL column metadata.

use crate::connection::{Row, RowExt};
use crate::error::MigrateResult;
use crate::schema::{Column, ColumnType};
use crate::sql::quote_string;

/// Parse an `information_schema.columns` row.
///
/// MySQL reports literal defaults unquoted; they are quoted again unless the
/// column is numeric or the default is an expression.
pub(super) fn parse_column(row: &Row) -> MigrateResult<Column> {
    let name = row.require_str("column_name")?;
    let column_type = ColumnType::parse(&row.require_str("column_type")?);
    let extra = row.get_str("extra").unwrap_or_default().to_ascii_lowercase();
    let nullable = row.get_bool("is_nullable").unwrap_or(true);

    let default = row
        .get_str("column_default")
        .filter(|d| !(nullable && d.eq_ignore_ascii_case("null")))
        .map(|d| {
            let expression = extra.contains("default_generated")
                || d.starts_with('\'')
                || d.parse::<f64>().is_ok()
                || d.to_ascii_uppercase().starts_with("CURRENT_TIMESTAMP");
            if expression { d } else { quote_string(&d) }
        });

    Ok(Column {
        name,
        column_type,
        nullable,
        default,
        auto_increment: extra.contains("auto_increment"),
        comment: row.get_str("comment").filter(|c| !c.is_empty()),
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
    fn test_auto_increment_and_boolean() {
        let id = parse_column(&row(json!({
            "column_name": "id", "column_type": "int unsigned", "is_nullable": "NO", "extra": "auto_increment",
        })))
        .unwrap();
        assert_eq!(id.column_type, ColumnType::Int);
        assert!(id.auto_increment);

        let flag = parse_column(&row(json!({
            "column_name": "active", "column_type": "tinyint(1)", "is_nullable": "NO",
            "column_default": "1", "extra": "",
        })))
        .unwrap();
        assert_eq!(flag.column_type, ColumnType::Boolean);
        assert_eq!(flag.default.as_deref(), Some("1"));
    }

    #[test]
    fn test_string_default_is_quoted() {
        let column = parse_column(&row(json!({
            "column_name": "status", "column_type": "varchar(20)", "is_nullable": "NO",
            "column_default": "new", "extra": "", "comment": "",
        })))
        .unwrap();
        assert_eq!(column.default.as_deref(), Some("'new'"));
        assert_eq!(column.comment, None);
    }
}
