//! Safety policy applied to the differ's output.
//!
//! Unattended migration only performs additive table and column changes.
//! Dropping tables or columns can be opted into; everything else (keys,
//! constraints, indexes, renames, alterations, sequences, data and raw SQL)
//! is never applied automatically.

use tracing::{debug, warn};

use crate::operation::{ChangeOperation, OperationKind};
use crate::options::MigrationOptions;
use crate::schema::{TableRef, names_match};

/// Option flag a gated rule consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyFlag {
    /// [`MigrationOptions::allow_drop_table`]
    AllowDropTable,
    /// [`MigrationOptions::allow_drop_column`]
    AllowDropColumn,
}

impl PolicyFlag {
    /// Read the flag from the options.
    pub fn is_set(&self, options: &MigrationOptions) -> bool {
        match self {
            Self::AllowDropTable => options.allow_drop_table,
            Self::AllowDropColumn => options.allow_drop_column,
        }
    }
}

/// What the policy does with one kind of operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyRule {
    /// Always applied.
    AlwaysAllow,
    /// Never applied.
    AlwaysDeny,
    /// Applied only when the flag is set.
    Gated(PolicyFlag),
}

/// Result of filtering an operation list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilteredOperations {
    /// Operations that will be applied, in differ order.
    pub allowed: Vec<ChangeOperation>,
    /// Operations the policy removed, in differ order.
    pub skipped: Vec<ChangeOperation>,
}

impl FilteredOperations {
    /// Check if nothing is left to apply.
    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}

/// The declarative operation policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationPolicy;

impl OperationPolicy {
    /// Rule for one operation kind.
    pub const fn rule(kind: OperationKind) -> PolicyRule {
        use OperationKind::*;

        match kind {
            CreateTable | AddColumn => PolicyRule::AlwaysAllow,
            DropTable => PolicyRule::Gated(PolicyFlag::AllowDropTable),
            DropColumn => PolicyRule::Gated(PolicyFlag::AllowDropColumn),
            EnsureSchema | DropSchema | CreateSequence | AlterSequence | RenameSequence
            | DropSequence | RenameTable | AlterColumn | RenameColumn | AddPrimaryKey
            | DropPrimaryKey | AddForeignKey | DropForeignKey | AddUniqueConstraint
            | DropUniqueConstraint | AddCheckConstraint | DropCheckConstraint | CreateIndex
            | DropIndex | RenameIndex | InsertData | UpdateData | DeleteData | RawSql => {
                PolicyRule::AlwaysDeny
            }
        }
    }

    /// Check if one operation passes under the given options.
    pub fn allows(operation: &ChangeOperation, options: &MigrationOptions) -> bool {
        match Self::rule(operation.kind()) {
            PolicyRule::AlwaysAllow => true,
            PolicyRule::AlwaysDeny => false,
            PolicyRule::Gated(flag) => flag.is_set(options),
        }
    }

    /// Split the operations into allowed and skipped, keeping relative order.
    ///
    /// A permitted drop that cannot run while a skipped operation's object
    /// still exists is skipped as well.
    pub fn filter(operations: Vec<ChangeOperation>, options: &MigrationOptions) -> FilteredOperations {
        let (mut allowed, mut skipped): (Vec<_>, Vec<_>) = operations
            .into_iter()
            .enumerate()
            .partition(|(_, op)| Self::allows(op, options));
        for (_, operation) in &skipped {
            debug!(operation = %operation, "Operation excluded by policy");
        }

        loop {
            let (held, kept): (Vec<_>, Vec<_>) = allowed
                .into_iter()
                .partition(|(_, op)| skipped.iter().any(|(_, s)| blocks(s, op)));
            allowed = kept;
            if held.is_empty() {
                break;
            }
            for (_, operation) in &held {
                warn!(operation = %operation, "Drop held back by a skipped operation");
            }
            skipped.extend(held);
        }
        skipped.sort_by_key(|(position, _)| *position);

        FilteredOperations {
            allowed: allowed.into_iter().map(|(_, op)| op).collect(),
            skipped: skipped.into_iter().map(|(_, op)| op).collect(),
        }
    }
}

/// Check if `operation` would fail while the object `skipped` was going to
/// remove is still in place.
fn blocks(skipped: &ChangeOperation, operation: &ChangeOperation) -> bool {
    match operation {
        ChangeOperation::DropColumn { table, column } => match skipped {
            ChangeOperation::DropIndex {
                table: owner,
                columns,
                ..
            }
            | ChangeOperation::DropPrimaryKey {
                table: owner,
                columns,
                ..
            }
            | ChangeOperation::DropUniqueConstraint {
                table: owner,
                columns,
                ..
            }
            | ChangeOperation::DropCheckConstraint {
                table: owner,
                columns,
                ..
            } => same_table(owner, table) && contains(columns, column),
            ChangeOperation::DropForeignKey {
                table: owner,
                columns,
                references,
                referenced_columns,
                ..
            } => {
                (same_table(owner, table) && contains(columns, column))
                    || (references.as_ref().is_some_and(|r| same_table(r, table))
                        && contains(referenced_columns, column))
            }
            _ => false,
        },
        ChangeOperation::DropTable { table, .. } => match skipped {
            ChangeOperation::DropForeignKey { references, .. } => {
                references.as_ref().is_some_and(|r| same_table(r, table))
            }
            ChangeOperation::DropTable { references, .. } => {
                references.iter().any(|r| same_table(r, table))
            }
            _ => false,
        },
        _ => false,
    }
}

fn same_table(a: &TableRef, b: &TableRef) -> bool {
    a.key(false) == b.key(false)
}

fn contains(columns: &[String], column: &str) -> bool {
    columns.iter().any(|c| names_match(c, column, false))
}
