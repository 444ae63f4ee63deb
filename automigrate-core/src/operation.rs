//! Change operations produced by the differ.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{
    CheckConstraint, Column, ForeignKey, Index, PrimaryKey, Sequence, Table, TableRef,
    UniqueConstraint,
};

/// One atomic schema transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ChangeOperation {
    /// Create a schema if it does not exist.
    EnsureSchema {
        /// Schema name.
        name: String,
    },
    /// Drop a schema.
    DropSchema {
        /// Schema name.
        name: String,
    },
    /// Create a sequence.
    CreateSequence {
        /// Sequence definition.
        sequence: Sequence,
    },
    /// Change the attributes of a sequence.
    AlterSequence {
        /// New sequence definition.
        sequence: Sequence,
    },
    /// Rename a sequence.
    RenameSequence {
        /// Schema qualifier.
        schema: Option<String>,
        /// Current name.
        name: String,
        /// New name.
        new_name: String,
    },
    /// Drop a sequence.
    DropSequence {
        /// Schema qualifier.
        schema: Option<String>,
        /// Sequence name.
        name: String,
    },
    /// Create a table with its columns and inline constraints.
    CreateTable {
        /// Table definition. Indexes are created by separate operations.
        table: Table,
    },
    /// Drop a table.
    DropTable {
        /// Target table.
        table: TableRef,
        /// Tables its foreign keys point at.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        references: Vec<TableRef>,
    },
    /// Rename a table.
    RenameTable {
        /// Target table.
        table: TableRef,
        /// New name.
        new_name: String,
    },
    /// Add a column.
    AddColumn {
        /// Target table.
        table: TableRef,
        /// Column definition.
        column: Column,
    },
    /// Drop a column.
    DropColumn {
        /// Target table.
        table: TableRef,
        /// Column name.
        column: String,
    },
    /// Change the type or nullability of a column.
    AlterColumn {
        /// Target table.
        table: TableRef,
        /// New definition.
        column: Column,
        /// Definition currently in the database.
        old_column: Column,
    },
    /// Rename a column.
    RenameColumn {
        /// Target table.
        table: TableRef,
        /// Current name.
        column: String,
        /// New name.
        new_name: String,
    },
    /// Add a primary key.
    AddPrimaryKey {
        /// Target table.
        table: TableRef,
        /// Constraint name.
        name: String,
        /// Key definition.
        primary_key: PrimaryKey,
    },
    /// Drop a primary key.
    DropPrimaryKey {
        /// Target table.
        table: TableRef,
        /// Constraint name.
        name: String,        /// Columns of the table the object covers.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        columns: Vec<String>,
    },
    /// Add a foreign key.
    AddForeignKey {
        /// Target table.
        table: TableRef,
        /// Constraint name.
        name: String,
        /// Key definition.
        foreign_key: ForeignKey,
    },
    /// Drop a foreign key.
    DropForeignKey {
        /// Target table.
        table: TableRef,
        /// Constraint name.
        name: String,        /// Columns of the table the object covers.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        columns: Vec<String>,
        /// Table the key points at.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        references: Option<TableRef>,
        /// Columns of the referenced table.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        referenced_columns: Vec<String>,
    },
    /// Add a unique constraint.
    AddUniqueConstraint {
        /// Target table.
        table: TableRef,
        /// Constraint name.
        name: String,
        /// Constraint definition.
        constraint: UniqueConstraint,
    },
    /// Drop a unique constraint.
    DropUniqueConstraint {
        /// Target table.
        table: TableRef,
        /// Constraint name.
        name: String,        /// Columns of the table the object covers.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        columns: Vec<String>,
    },
    /// Add a check constraint.
    AddCheckConstraint {
        /// Target table.
        table: TableRef,
        /// Constraint definition.
        constraint: CheckConstraint,
    },
    /// Drop a check constraint.
    DropCheckConstraint {
        /// Target table.
        table: TableRef,
        /// Constraint name.
        name: String,        /// Columns of the table the object covers.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        columns: Vec<String>,
    },
    /// Create an index.
    CreateIndex {
        /// Target table.
        table: TableRef,
        /// Index definition.
        index: Index,
    },
    /// Drop an index.
    DropIndex {
        /// Target table.
        table: TableRef,
        /// Index name.
        name: String,        /// Columns of the table the object covers.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        columns: Vec<String>,
    },
    /// Rename an index.
    RenameIndex {
        /// Target table.
        table: TableRef,
        /// Current name.
        name: String,
        /// New name.
        new_name: String,
    },
    /// Insert seed rows.
    InsertData {
        /// Target table.
        table: TableRef,
        /// Column names.
        columns: Vec<String>,
        /// Row values, one vector per row.
        rows: Vec<Vec<Value>>,
    },
    /// Update rows matched by key.
    UpdateData {
        /// Target table.
        table: TableRef,
        /// Key column names.
        key_columns: Vec<String>,
        /// Key values.
        key_values: Vec<Value>,
        /// Updated column names.
        columns: Vec<String>,
        /// Updated values.
        values: Vec<Value>,
    },
    /// Delete rows matched by key.
    DeleteData {
        /// Target table.
        table: TableRef,
        /// Key column names.
        key_columns: Vec<String>,
        /// Key values, one vector per deleted row.
        key_values: Vec<Vec<Value>>,
    },
    /// Arbitrary SQL.
    RawSql {
        /// SQL text.
        sql: String,
    },
}

/// Fieldless discriminant of [`ChangeOperation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// [`ChangeOperation::EnsureSchema`]
    EnsureSchema,
    /// [`ChangeOperation::DropSchema`]
    DropSchema,
    /// [`ChangeOperation::CreateSequence`]
    CreateSequence,
    /// [`ChangeOperation::AlterSequence`]
    AlterSequence,
    /// [`ChangeOperation::RenameSequence`]
    RenameSequence,
    /// [`ChangeOperation::DropSequence`]
    DropSequence,
    /// [`ChangeOperation::CreateTable`]
    CreateTable,
    /// [`ChangeOperation::DropTable`]
    DropTable,
    /// [`ChangeOperation::RenameTable`]
    RenameTable,
    /// [`ChangeOperation::AddColumn`]
    AddColumn,
    /// [`ChangeOperation::DropColumn`]
    DropColumn,
    /// [`ChangeOperation::AlterColumn`]
    AlterColumn,
    /// [`ChangeOperation::RenameColumn`]
    RenameColumn,
    /// [`ChangeOperation::AddPrimaryKey`]
    AddPrimaryKey,
    /// [`ChangeOperation::DropPrimaryKey`]
    DropPrimaryKey,
    /// [`ChangeOperation::AddForeignKey`]
    AddForeignKey,
    /// [`ChangeOperation::DropForeignKey`]
    DropForeignKey,
    /// [`ChangeOperation::AddUniqueConstraint`]
    AddUniqueConstraint,
    /// [`ChangeOperation::DropUniqueConstraint`]
    DropUniqueConstraint,
    /// [`ChangeOperation::AddCheckConstraint`]
    AddCheckConstraint,
    /// [`ChangeOperation::DropCheckConstraint`]
    DropCheckConstraint,
    /// [`ChangeOperation::CreateIndex`]
    CreateIndex,
    /// [`ChangeOperation::DropIndex`]
    DropIndex,
    /// [`ChangeOperation::RenameIndex`]
    RenameIndex,
    /// [`ChangeOperation::InsertData`]
    InsertData,
    /// [`ChangeOperation::UpdateData`]
    UpdateData,
    /// [`ChangeOperation::DeleteData`]
    DeleteData,
    /// [`ChangeOperation::RawSql`]
    RawSql,
}

impl OperationKind {
    /// Every operation kind.
    pub const ALL: [OperationKind; 28] = [
        Self::EnsureSchema,
        Self::DropSchema,
        Self::CreateSequence,
        Self::AlterSequence,
        Self::RenameSequence,
        Self::DropSequence,
        Self::CreateTable,
        Self::DropTable,
        Self::RenameTable,
        Self::AddColumn,
        Self::DropColumn,
        Self::AlterColumn,
        Self::RenameColumn,
        Self::AddPrimaryKey,
        Self::DropPrimaryKey,
        Self::AddForeignKey,
        Self::DropForeignKey,
        Self::AddUniqueConstraint,
        Self::DropUniqueConstraint,
        Self::AddCheckConstraint,
        Self::DropCheckConstraint,
        Self::CreateIndex,
        Self::DropIndex,
        Self::RenameIndex,
        Self::InsertData,
        Self::UpdateData,
        Self::DeleteData,
        Self::RawSql,
    ];
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl ChangeOperation {
    /// The kind of this operation.
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::EnsureSchema { .. } => OperationKind::EnsureSchema,
            Self::DropSchema { .. } => OperationKind::DropSchema,
            Self::CreateSequence { .. } => OperationKind::CreateSequence,
            Self::AlterSequence { .. } => OperationKind::AlterSequence,
            Self::RenameSequence { .. } => OperationKind::RenameSequence,
            Self::DropSequence { .. } => OperationKind::DropSequence,
            Self::CreateTable { .. } => OperationKind::CreateTable,
            Self::DropTable { .. } => OperationKind::DropTable,
            Self::RenameTable { .. } => OperationKind::RenameTable,
            Self::AddColumn { .. } => OperationKind::AddColumn,
            Self::DropColumn { .. } => OperationKind::DropColumn,
            Self::AlterColumn { .. } => OperationKind::AlterColumn,
            Self::RenameColumn { .. } => OperationKind::RenameColumn,
            Self::AddPrimaryKey { .. } => OperationKind::AddPrimaryKey,
            Self::DropPrimaryKey { .. } => OperationKind::DropPrimaryKey,
            Self::AddForeignKey { .. } => OperationKind::AddForeignKey,
            Self::DropForeignKey { .. } => OperationKind::DropForeignKey,
            Self::AddUniqueConstraint { .. } => OperationKind::AddUniqueConstraint,
            Self::DropUniqueConstraint { .. } => OperationKind::DropUniqueConstraint,
            Self::AddCheckConstraint { .. } => OperationKind::AddCheckConstraint,
            Self::DropCheckConstraint { .. } => OperationKind::DropCheckConstraint,
            Self::CreateIndex { .. } => OperationKind::CreateIndex,
            Self::DropIndex { .. } => OperationKind::DropIndex,
            Self::RenameIndex { .. } => OperationKind::RenameIndex,
            Self::InsertData { .. } => OperationKind::InsertData,
            Self::UpdateData { .. } => OperationKind::UpdateData,
            Self::DeleteData { .. } => OperationKind::DeleteData,
            Self::RawSql { .. } => OperationKind::RawSql,
        }
    }

    /// The table this operation targets, if any.
    pub fn table(&self) -> Option<TableRef> {
        match self {
            Self::CreateTable { table } => Some(table.table_ref()),
            Self::DropTable { table, .. }
            | Self::RenameTable { table, .. }
            | Self::AddColumn { table, .. }
            | Self::DropColumn { table, .. }
            | Self::AlterColumn { table, .. }
            | Self::RenameColumn { table, .. }
            | Self::AddPrimaryKey { table, .. }
            | Self::DropPrimaryKey { table, .. }
            | Self::AddForeignKey { table, .. }
            | Self::DropForeignKey { table, .. }
            | Self::AddUniqueConstraint { table, .. }
            | Self::DropUniqueConstraint { table, .. }
            | Self::AddCheckConstraint { table, .. }
            | Self::DropCheckConstraint { table, .. }
            | Self::CreateIndex { table, .. }
            | Self::DropIndex { table, .. }
            | Self::RenameIndex { table, .. }
            | Self::InsertData { table, .. }
            | Self::UpdateData { table, .. }
            | Self::DeleteData { table, .. } => Some(table.clone()),
            Self::EnsureSchema { .. }
            | Self::DropSchema { .. }
            | Self::CreateSequence { .. }
            | Self::AlterSequence { .. }
            | Self::RenameSequence { .. }
            | Self::DropSequence { .. }
            | Self::RawSql { .. } => None,
        }
    }

    /// Check if this operation can destroy data.
    pub fn is_destructive(&self) -> bool {
        matches!(
            self.kind(),
            OperationKind::DropTable
                | OperationKind::DropColumn
                | OperationKind::DropSchema
                | OperationKind::DropSequence
                | OperationKind::AlterColumn
                | OperationKind::DeleteData
        )
    }
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnsureSchema { name } | Self::DropSchema { name } => {
                write!(f, "{} {}", self.kind(), name)
            }
            Self::CreateSequence { sequence } | Self::AlterSequence { sequence } => {
                write!(f, "{} {}", self.kind(), sequence.name)
            }
            Self::RenameSequence { name, new_name, .. } => {
                write!(f, "{} {} -> {}", self.kind(), name, new_name)
            }
            Self::DropSequence { name, .. } => write!(f, "{} {}", self.kind(), name),
            Self::CreateTable { table } => write!(f, "{} {}", self.kind(), table.table_ref()),
            Self::DropTable { table, .. } => write!(f, "{} {}", self.kind(), table),
            Self::RenameTable { table, new_name } => {
                write!(f, "{} {} -> {}", self.kind(), table, new_name)
            }
            Self::AddColumn { table, column } | Self::AlterColumn { table, column, .. } => {
                write!(f, "{} {}.{}", self.kind(), table, column.name)
            }
            Self::DropColumn { table, column } => {
                write!(f, "{} {}.{}", self.kind(), table, column)
            }
            Self::RenameColumn {
                table,
                column,
                new_name,
            } => write!(f, "{} {}.{} -> {}", self.kind(), table, column, new_name),
            Self::AddPrimaryKey { table, name, .. }
            | Self::DropPrimaryKey { table, name, .. }
            | Self::AddForeignKey { table, name, .. }
            | Self::DropForeignKey { table, name, .. }
            | Self::AddUniqueConstraint { table, name, .. }
            | Self::DropUniqueConstraint { table, name, .. }
            | Self::DropCheckConstraint { table, name, .. }
            | Self::DropIndex { table, name, .. } => {
                write!(f, "{} {} on {}", self.kind(), name, table)
            }
            Self::AddCheckConstraint { table, constraint } => {
                write!(f, "{} {} on {}", self.kind(), constraint.name, table)
            }
            Self::CreateIndex { table, index } => {
                write!(f, "{} {} on {}", self.kind(), index.name, table)
            }
            Self::RenameIndex {
                table,
                name,
                new_name,
            } => write!(f, "{} {} -> {} on {}", self.kind(), name, new_name, table),
            Self::InsertData { table, rows, .. } => {
                write!(f, "{} {} ({} rows)", self.kind(), table, rows.len())
            }
            Self::UpdateData { table, .. } => write!(f, "{} {}", self.kind(), table),
            Self::DeleteData {
                table, key_values, ..
            } => write!(f, "{} {} ({} rows)", self.kind(), table, key_values.len()),
            Self::RawSql { .. } => write!(f, "{}", self.kind()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    #[test]
    fn test_kind_and_display() {
        let op = ChangeOperation::DropColumn {
            table: TableRef::unqualified("users"),
            column: "legacy_flag".to_string(),
        };
        assert_eq!(op.kind(), OperationKind::DropColumn);
        assert_eq!(op.to_string(), "DropColumn users.legacy_flag");
        assert!(op.is_destructive());
    }

    #[test]
    fn test_create_table_targets_its_table() {
        let op = ChangeOperation::CreateTable {
            table: Table::new("users").column(Column::new("id", ColumnType::Int)),
        };
        assert_eq!(op.table(), Some(TableRef::unqualified("users")));
        assert!(!op.is_destructive());
    }

    #[test]
    fn test_serde_tagging() {
        let op = ChangeOperation::EnsureSchema {
            name: "sales".to_string(),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["op"], "ensure_schema");
        let back: ChangeOperation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn test_all_kinds_are_distinct() {
        let unique: std::collections::HashSet<_> = OperationKind::ALL.iter().collect();
        assert_eq!(unique.len(), OperationKind::ALL.len());
    }
}
