//! Schema diffing between the live database and the declared model.
//!
//! The differ is a pure function over two [`DatabaseSchema`] snapshots. It
//! produces operations in an order that is safe to execute as written:
//!
//! 1. drops of dependent objects (foreign keys, indexes, constraints, keys)
//! 2. schema and sequence creation
//! 3. table creation, referenced tables first
//! 4. column additions and alterations
//! 5. keys, constraints, indexes and foreign keys on the new shape
//! 6. column drops, table drops (referencing tables first), sequence drops
//!
//! Renames are not detected: a renamed object shows up as a drop plus a
//! create.

use std::collections::HashSet;

use tracing::debug;

use crate::error::{MigrateResult, MigrationError};
use crate::operation::ChangeOperation;
use crate::provider::Provider;
use crate::schema::{
    CheckConstraint, Column, DatabaseSchema, ForeignKey, Index, Sequence, Table, TableRef, TypeFamily,
    names_match,
};
use crate::sql;

/// Computes the operations that transform a live schema into a declared one.
#[derive(Debug, Clone)]
pub struct SchemaDiffer {
    provider: Provider,
    case_sensitive: bool,
}

/// Operations bucketed by execution phase.
#[derive(Debug, Default)]
struct DiffPlan {
    drop_dependents: Vec<ChangeOperation>,
    namespaces: Vec<ChangeOperation>,
    create_tables: Vec<ChangeOperation>,
    columns: Vec<ChangeOperation>,
    add_dependents: Vec<ChangeOperation>,
    drop_columns: Vec<ChangeOperation>,
    drop_tables: Vec<ChangeOperation>,
    drop_sequences: Vec<ChangeOperation>,
}

impl DiffPlan {
    fn into_operations(self) -> Vec<ChangeOperation> {
        let mut ops = self.drop_dependents;
        ops.extend(self.namespaces);
        ops.extend(self.create_tables);
        ops.extend(self.columns);
        ops.extend(self.add_dependents);
        ops.extend(self.drop_columns);
        ops.extend(self.drop_tables);
        ops.extend(self.drop_sequences);
        ops
    }
}

impl SchemaDiffer {
    /// Create a differ for the given provider.
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            case_sensitive: false,
        }
    }

    /// Match identifiers case-sensitively.
    pub fn case_sensitive(mut self, enabled: bool) -> Self {
        self.case_sensitive = enabled;
        self
    }

    /// Compute the ordered operations that turn `live` into `declared`.
    pub fn diff(
        &self,
        live: &DatabaseSchema,
        declared: &DatabaseSchema,
    ) -> MigrateResult<Vec<ChangeOperation>> {
        declared
            .validate()
            .map_err(|e| MigrationError::diff(e.to_string()))?;
        self.check_foreign_key_targets(declared)?;

        let mut plan = DiffPlan::default();

        self.diff_namespaces(live, declared, &mut plan);
        self.diff_sequences(live, declared, &mut plan);

        let mut new_tables = Vec::new();
        for table in &declared.tables {
            match live.table(&table.table_ref(), self.case_sensitive) {
                Some(existing) => self.diff_table(live, existing, declared, table, &mut plan),
                None => new_tables.push(table),
            }
        }
        self.create_tables(declared, &new_tables, &mut plan);

        let dropped: Vec<&Table> = live
            .tables
            .iter()
            .filter(|t| declared.table(&t.table_ref(), self.case_sensitive).is_none())
            .collect();
        self.drop_tables(live, &dropped, &mut plan);

        let ops = plan.into_operations();
        debug!(count = ops.len(), "Computed schema diff");
        Ok(ops)
    }

    /// Foreign keys must target a primary or unique key of a compatible type.
    fn check_foreign_key_targets(&self, declared: &DatabaseSchema) -> MigrateResult<()> {
        for table in &declared.tables {
            for fk in &table.foreign_keys {
                let target_ref = declared.resolve_reference(&table.table_ref(), fk);
                let Some(target) = declared.table(&target_ref, self.case_sensitive) else {
                    return Err(MigrationError::diff(format!(
                        "foreign key on '{}' targets '{}', which is not declared",
                        table.name, target_ref
                    )));
                };

                let wanted = self.column_set(&fk.referenced_columns);
                let is_key = target
                    .primary_key
                    .iter()
                    .map(|pk| &pk.columns)
                    .chain(target.unique_constraints.iter().map(|u| &u.columns))
                    .chain(target.indexes.iter().filter(|i| i.unique).map(|i| &i.columns))
                    .any(|cols| self.column_set(cols) == wanted);
                if !is_key {
                    return Err(MigrationError::diff(format!(
                        "foreign key '{}' references ({}) on '{}', which is not a primary or unique key",
                        fk.constraint_name(table),
                        fk.referenced_columns.join(", "),
                        target.name
                    )));
                }

                for (local, remote) in fk.columns.iter().zip(&fk.referenced_columns) {
                    let (Some(local_col), Some(remote_col)) =
                        (table.find_column(local), target.find_column(remote))
                    else {
                        continue;
                    };
                    if !key_types_agree(&local_col.column_type.family(), &remote_col.column_type.family()) {
                        return Err(MigrationError::diff(format!(
                            "foreign key column '{}.{}' ({}) conflicts with '{}.{}' ({})",
                            table.name,
                            local,
                            local_col.column_type,
                            target.name,
                            remote,
                            remote_col.column_type
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn diff_namespaces(&self, live: &DatabaseSchema, declared: &DatabaseSchema, plan: &mut DiffPlan) {
        if matches!(self.provider, Provider::Sqlite | Provider::MySql) {
            return;
        }

        let default_schema = self.provider.default_schema();
        let mut seen = HashSet::new();
        let wanted = declared
            .schemas
            .iter()
            .cloned()
            .chain(declared.tables.iter().filter_map(|t| t.schema.clone()))
            .chain(declared.sequences.iter().filter_map(|s| s.schema.clone()));

        for name in wanted {
            let is_default = default_schema
                .map(|d| names_match(d, &name, self.case_sensitive))
                .unwrap_or(false);
            let exists = live
                .schemas
                .iter()
                .any(|s| names_match(s, &name, self.case_sensitive));
            if is_default || exists || !seen.insert(self.key(&name)) {
                continue;
            }
            plan.namespaces.push(ChangeOperation::EnsureSchema { name });
        }
    }

    fn diff_sequences(&self, live: &DatabaseSchema, declared: &DatabaseSchema, plan: &mut DiffPlan) {
        let find = |schema: &DatabaseSchema, seq: &Sequence| -> Option<Sequence> {
            let key = TableRef::new(seq.schema.clone(), &seq.name);
            schema
                .sequences
                .iter()
                .find(|s| TableRef::new(s.schema.clone(), &s.name).matches(&key, self.case_sensitive))
                .cloned()
        };

        for sequence in &declared.sequences {
            match find(live, sequence) {
                None => plan.namespaces.push(ChangeOperation::CreateSequence {
                    sequence: sequence.clone(),
                }),
                Some(existing) if existing.differs_from(sequence) => {
                    plan.namespaces.push(ChangeOperation::AlterSequence {
                        sequence: sequence.clone(),
                    })
                }
                Some(_) => {}
            }
        }

        for sequence in &live.sequences {
            if find(declared, sequence).is_none() {
                plan.drop_sequences.push(ChangeOperation::DropSequence {
                    schema: sequence.schema.clone(),
                    name: sequence.name.clone(),
                });
            }
        }
    }

    fn diff_table(
        &self,
        live_schema: &DatabaseSchema,
        live: &Table,
        declared_schema: &DatabaseSchema,
        declared: &Table,
        plan: &mut DiffPlan,
    ) {
        let table = live.table_ref();
        let live_target = |fk: &ForeignKey| live_schema.resolve_reference(&table, fk);
        let declared_target = |fk: &ForeignKey| declared_schema.resolve_reference(&declared.table_ref(), fk);

        // Foreign keys
        for fk in &live.foreign_keys {
            if !declared
                .foreign_keys
                .iter()
                .any(|d| self.same_foreign_key(fk, &live_target(fk), d, &declared_target(d)))
            {
                plan.drop_dependents.push(ChangeOperation::DropForeignKey {
                    table: table.clone(),
                    name: fk.constraint_name(live),
                    columns: fk.columns.clone(),
                    references: Some(live_target(fk)),
                    referenced_columns: fk.referenced_columns.clone(),
                });
            }
        }

        // Indexes
        for index in &live.indexes {
            if !declared.indexes.iter().any(|d| self.same_index(index, d)) {
                let mut columns = index.columns.clone();
                if let Some(filter) = &index.filter {
                    columns.extend(mentioned_columns(live, filter));
                }
                plan.drop_dependents.push(ChangeOperation::DropIndex {
                    table: table.clone(),
                    name: index.name.clone(),
                    columns,
                });
            }
        }

        // Unique constraints
        for unique in &live.unique_constraints {
            if !declared
                .unique_constraints
                .iter()
                .any(|d| self.column_set(&d.columns) == self.column_set(&unique.columns))
            {
                plan.drop_dependents.push(ChangeOperation::DropUniqueConstraint {
                    table: table.clone(),
                    name: unique.constraint_name(live),
                    columns: unique.columns.clone(),
                });
            }
        }

        // Check constraints
        for check in &live.check_constraints {
            if !declared
                .check_constraints
                .iter()
                .any(|d| self.same_check(check, d))
            {
                plan.drop_dependents.push(ChangeOperation::DropCheckConstraint {
                    table: table.clone(),
                    name: check.name.clone(),
                    columns: mentioned_columns(live, &check.expression),
                });
            }
        }

        // Primary key
        let live_pk = live.primary_key.as_ref().map(|pk| self.column_list(&pk.columns));
        let declared_pk = declared.primary_key.as_ref().map(|pk| self.column_list(&pk.columns));
        if live_pk != declared_pk {
            if let Some(pk) = &live.primary_key {
                plan.drop_dependents.push(ChangeOperation::DropPrimaryKey {
                    table: table.clone(),
                    name: live.primary_key_name(),
                    columns: pk.columns.clone(),
                });
            }
            if let Some(pk) = &declared.primary_key {
                plan.add_dependents.push(ChangeOperation::AddPrimaryKey {
                    table: table.clone(),
                    name: declared.primary_key_name(),
                    primary_key: pk.clone(),
                });
            }
        }

        // Columns
        for column in &declared.columns {
            match self.find_column(live, &column.name) {
                None => plan.columns.push(ChangeOperation::AddColumn {
                    table: table.clone(),
                    column: column.clone(),
                }),
                Some(existing) if self.column_changed(existing, column) => {
                    plan.columns.push(ChangeOperation::AlterColumn {
                        table: table.clone(),
                        column: column.clone(),
                        old_column: existing.clone(),
                    })
                }
                Some(_) => {}
            }
        }
        for column in &live.columns {
            if self.find_column(declared, &column.name).is_none() {
                plan.drop_columns.push(ChangeOperation::DropColumn {
                    table: table.clone(),
                    column: column.name.clone(),
                });
            }
        }

        // New dependents
        for unique in &declared.unique_constraints {
            if !live
                .unique_constraints
                .iter()
                .any(|l| self.column_set(&l.columns) == self.column_set(&unique.columns))
            {
                plan.add_dependents.push(ChangeOperation::AddUniqueConstraint {
                    table: table.clone(),
                    name: unique.constraint_name(declared),
                    constraint: unique.clone(),
                });
            }
        }
        for check in &declared.check_constraints {
            if !live
                .check_constraints
                .iter()
                .any(|l| self.same_check(l, check))
            {
                plan.add_dependents.push(ChangeOperation::AddCheckConstraint {
                    table: table.clone(),
                    constraint: check.clone(),
                });
            }
        }
        for index in &declared.indexes {
            if !live.indexes.iter().any(|l| self.same_index(l, index)) {
                plan.add_dependents.push(ChangeOperation::CreateIndex {
                    table: table.clone(),
                    index: index.clone(),
                });
            }
        }
        for fk in &declared.foreign_keys {
            if !live
                .foreign_keys
                .iter()
                .any(|l| self.same_foreign_key(l, &live_target(l), fk, &declared_target(fk)))
            {
                plan.add_dependents.push(ChangeOperation::AddForeignKey {
                    table: table.clone(),
                    name: fk.constraint_name(declared),
                    foreign_key: fk.clone(),
                });
            }
        }
    }

    /// Emit `CreateTable` for new tables, referenced tables first.
    ///
    /// A foreign key that closes a cycle among new tables is split off into a
    /// later `AddForeignKey`.
    fn create_tables(&self, declared: &DatabaseSchema, tables: &[&Table], plan: &mut DiffPlan) {
        let (order, cut) = self.dependency_order(declared, tables);

        for table in order {
            let mut definition = table.clone();
            definition.indexes.clear();
            let deferred: Vec<ForeignKey> = definition
                .foreign_keys
                .iter()
                .filter(|fk| cut.contains(&(table.table_ref().key(self.case_sensitive), fk.constraint_name(table))))
                .cloned()
                .collect();
            definition
                .foreign_keys
                .retain(|fk| !deferred.iter().any(|d| d == fk));

            let table_ref = table.table_ref();
            plan.create_tables
                .push(ChangeOperation::CreateTable { table: definition });

            for index in &table.indexes {
                plan.add_dependents.push(ChangeOperation::CreateIndex {
                    table: table_ref.clone(),
                    index: index.clone(),
                });
            }
            for fk in deferred {
                plan.add_dependents.push(ChangeOperation::AddForeignKey {
                    table: table_ref.clone(),
                    name: fk.constraint_name(table),
                    foreign_key: fk,
                });
            }
        }
    }

    /// Emit `DropTable` for removed tables, referencing tables first.
    fn drop_tables(&self, live: &DatabaseSchema, tables: &[&Table], plan: &mut DiffPlan) {
        let (order, cut) = self.dependency_order(live, tables);

        for table in &order {
            for fk in &table.foreign_keys {
                if cut.contains(&(table.table_ref().key(self.case_sensitive), fk.constraint_name(table))) {
                    plan.drop_dependents.push(ChangeOperation::DropForeignKey {
                        table: table.table_ref(),
                        name: fk.constraint_name(table),
                        columns: fk.columns.clone(),
                        references: Some(live.resolve_reference(&table.table_ref(), fk)),
                        referenced_columns: fk.referenced_columns.clone(),
                    });
                }
            }
        }

        for table in order.into_iter().rev() {
            let owner = table.table_ref();
            let references = table
                .foreign_keys
                .iter()
                .map(|fk| live.resolve_reference(&owner, fk))
                .collect();
            plan.drop_tables.push(ChangeOperation::DropTable {
                table: owner,
                references,
            });
        }
    }

    /// Order tables so referenced tables come before referencing ones.
    ///
    /// Returns the order plus the foreign keys (as `(table key, constraint
    /// name)`) that had to be cut to break cycles. Self references never
    /// count as dependencies.
    fn dependency_order<'a>(
        &self,
        schema: &DatabaseSchema,
        tables: &[&'a Table],
    ) -> (Vec<&'a Table>, HashSet<(String, String)>) {
        let keys: Vec<String> = tables
            .iter()
            .map(|t| t.table_ref().key(self.case_sensitive))
            .collect();

        let mut remaining: Vec<usize> = (0..tables.len()).collect();
        let mut placed: HashSet<String> = HashSet::new();
        let mut order = Vec::with_capacity(tables.len());
        let mut cut = HashSet::new();

        let pending_deps = |idx: usize, placed: &HashSet<String>| -> Vec<(String, String)> {
            let table = tables[idx];
            table
                .foreign_keys
                .iter()
                .filter_map(|fk| {
                    let target = schema.resolve_reference(&table.table_ref(), fk).key(self.case_sensitive);
                    let in_set = keys.contains(&target);
                    let is_self = target == keys[idx];
                    (in_set && !is_self && !placed.contains(&target))
                        .then(|| (keys[idx].clone(), fk.constraint_name(table)))
                })
                .collect()
        };

        while !remaining.is_empty() {
            let ready = remaining
                .iter()
                .position(|&idx| pending_deps(idx, &placed).is_empty());

            let pos = match ready {
                Some(pos) => pos,
                None => {
                    let idx = remaining[0];
                    cut.extend(pending_deps(idx, &placed));
                    0
                }
            };

            let idx = remaining.remove(pos);
            placed.insert(keys[idx].clone());
            order.push(tables[idx]);
        }

        (order, cut)
    }

    fn column_changed(&self, live: &Column, declared: &Column) -> bool {
        let storage = sql::storage_type(self.provider, &declared.column_type);
        !storage.is_compatible_with(&live.column_type) || live.nullable != declared.nullable
    }

    fn same_foreign_key(&self, a: &ForeignKey, a_target: &TableRef, b: &ForeignKey, b_target: &TableRef) -> bool {
        self.column_list(&a.columns) == self.column_list(&b.columns)
            && self.column_list(&a.referenced_columns) == self.column_list(&b.referenced_columns)
            && a_target.matches(b_target, self.case_sensitive)
    }

    /// Checks match by name, or by expression with parentheses and
    /// whitespace removed.
    fn same_check(&self, a: &CheckConstraint, b: &CheckConstraint) -> bool {
        let normalize = |e: &str| {
            e.chars()
                .filter(|c| !c.is_whitespace() && *c != '(' && *c != ')')
                .collect::<String>()
                .to_ascii_lowercase()
        };
        names_match(&a.name, &b.name, self.case_sensitive)
            || normalize(&a.expression) == normalize(&b.expression)
    }

    fn same_index(&self, a: &Index, b: &Index) -> bool {
        a.unique == b.unique && self.column_list(&a.columns) == self.column_list(&b.columns)
    }

    fn find_column<'a>(&self, table: &'a Table, name: &str) -> Option<&'a Column> {
        table
            .columns
            .iter()
            .find(|c| names_match(&c.name, name, self.case_sensitive))
    }

    fn key(&self, name: &str) -> String {
        if self.case_sensitive {
            name.to_string()
        } else {
            name.to_ascii_lowercase()
        }
    }

    fn column_list(&self, columns: &[String]) -> Vec<String> {
        columns.iter().map(|c| self.key(c)).collect()
    }

    fn column_set(&self, columns: &[String]) -> Vec<String> {
        let mut set = self.column_list(columns);
        set.sort();
        set
    }
}

/// Columns of `table` named as identifiers in a SQL expression.
fn mentioned_columns(table: &Table, expression: &str) -> Vec<String> {
    let words: Vec<&str> = expression
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .collect();

    table
        .columns
        .iter()
        .filter(|c| words.iter().any(|w| w.eq_ignore_ascii_case(&c.name)))
        .map(|c| c.name.clone())
        .collect()
}

fn key_types_agree(a: &TypeFamily, b: &TypeFamily) -> bool {
    a == b
        || matches!(
            (a, b),
            (TypeFamily::Text, TypeFamily::Uuid)
                | (TypeFamily::Uuid, TypeFamily::Text)
        )
}
