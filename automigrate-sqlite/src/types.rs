//! Conversion of SQLite values into catalog rows.

use automigrate_core::Row;
use rusqlite::types::ValueRef;
use serde_json::Value;

/// Convert a SQLite value to JSON. Blobs that are not UTF-8 become hex.
pub fn from_sqlite_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => match std::str::from_utf8(bytes) {
            Ok(s) => Value::String(s.to_string()),
            Err(_) => Value::String(hex::encode(bytes)),
        },
    }
}

/// Read a whole result row keyed by column name.
pub fn row_to_map(row: &rusqlite::Row<'_>, columns: &[String]) -> rusqlite::Result<Row> {
    let mut map = Row::new();
    for (i, column) in columns.iter().enumerate() {
        map.insert(column.clone(), from_sqlite_value(row.get_ref(i)?));
    }
    Ok(map)
}
