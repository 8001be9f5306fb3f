//! Schema linking: resolve cross-table references and order emission
//!
//! Linking turns the declared metadata of a [`Catalog`] into a
//! [`LinkedSchema`]: every join column is resolved to a concrete column of
//! its target table, foreign keys are grouped into constraints, unique keys
//! are collected, and the tables are ordered so that every table comes after
//! everything it references.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashSet};

use tracing::debug;

use super::error::{CompileError, CompileResult};
use super::schema::{Catalog, ColumnSchema, TableSchema};

/// A join column resolved to its target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyLink {
    /// Local field
    pub field: String,
    /// Local physical column
    pub column: String,
    /// Index of the referenced table in the catalog
    pub target: usize,
    pub target_field: String,
    pub target_column: String,
}

/// One foreign-key constraint, possibly spanning several columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyGroup {
    pub target: usize,
    pub columns: Vec<String>,
    pub target_columns: Vec<String>,
    /// Split off because another column references the same target column
    split: bool,
}

/// A table together with its resolved links
#[derive(Debug, Clone)]
pub struct LinkedTable<'a> {
    pub schema: &'a TableSchema,
    /// Position in the catalog
    pub index: usize,
    pub primary_key: Vec<String>,
    /// Physical column names per unique key, solo keys first
    pub unique_keys: Vec<Vec<String>>,
    /// Resolved join columns in column order
    pub foreign_keys: Vec<ForeignKeyLink>,
    pub foreign_key_groups: Vec<ForeignKeyGroup>,
    /// Base table of a view
    pub view_base: Option<usize>,
}

impl LinkedTable<'_> {
    pub fn is_view(&self) -> bool {
        self.schema.is_view()
    }

    /// Resolved link of a join column, by field
    pub fn foreign_key(&self, field: &str) -> Option<&ForeignKeyLink> {
        self.foreign_keys.iter().find(|fk| fk.field == field)
    }
}

/// A fully linked catalog
#[derive(Debug, Clone)]
pub struct LinkedSchema<'a> {
    catalog: &'a Catalog,
    tables: Vec<LinkedTable<'a>>,
    order: Vec<usize>,
}

impl<'a> LinkedSchema<'a> {
    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    /// Linked table at a catalog index
    pub fn table(&self, index: usize) -> &LinkedTable<'a> {
        &self.tables[index]
    }

    pub fn get(&self, name: &str) -> Option<&LinkedTable<'a>> {
        self.catalog.table_index(name).map(|i| &self.tables[i])
    }

    /// Catalog indices in emission order
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Tables in emission order
    pub fn ordered(&self) -> impl Iterator<Item = &LinkedTable<'a>> {
        self.order.iter().map(move |&i| &self.tables[i])
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Resolves references between the tables of a catalog
pub struct SchemaLinker<'a> {
    catalog: &'a Catalog,
}

impl<'a> SchemaLinker<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    pub fn link(&self) -> CompileResult<LinkedSchema<'a>> {
        self.check_duplicate_tables()?;
        let mut tables = Vec::with_capacity(self.catalog.len());
        for (index, schema) in self.catalog.tables().iter().enumerate() {
            let linked = self.link_table(index, schema)?;
            debug!(
                table = %schema.qualified_name(),
                foreign_keys = linked.foreign_keys.len(),
                unique_keys = linked.unique_keys.len(),
                "linked table"
            );
            tables.push(linked);
        }

        let order = self.emission_order(&tables)?;
        Ok(LinkedSchema {
            catalog: self.catalog,
            tables,
            order,
        })
    }

    fn check_duplicate_tables(&self) -> CompileResult<()> {
        let mut seen = HashSet::new();
        for schema in self.catalog.tables() {
            let name = schema.qualified_name();
            if !seen.insert(name.clone()) {
                return Err(CompileError::DuplicateTable { table: name });
            }
        }
        Ok(())
    }

    fn link_table(&self, index: usize, schema: &'a TableSchema) -> CompileResult<LinkedTable<'a>> {
        check_duplicate_columns(schema)?;

        let view_base = match &schema.view_of {
            Some(base) => {
                if base.is_empty() || schema.column_count() == 0 {
                    return Err(CompileError::EmptyView {
                        view: schema.qualified_name(),
                    });
                }
                let base_index =
                    self.catalog
                        .table_index(base)
                        .ok_or_else(|| CompileError::UnresolvedReference {
                            table: schema.qualified_name(),
                            target: base.clone(),
                            via: "view base table".to_string(),
                        })?;
                Some(base_index)
            }
            None => None,
        };

        let mut foreign_keys = Vec::new();
        for column in schema.columns() {
            if let Some(link) = self.resolve_join(schema, column)? {
                foreign_keys.push(link);
            }
        }

        Ok(LinkedTable {
            schema,
            index,
            primary_key: schema.primary_key().iter().map(|c| c.name.clone()).collect(),
            unique_keys: unique_keys(schema)?,
            foreign_key_groups: group_foreign_keys(&foreign_keys),
            foreign_keys,
            view_base,
        })
    }

    fn resolve_join(
        &self,
        schema: &TableSchema,
        column: &ColumnSchema,
    ) -> CompileResult<Option<ForeignKeyLink>> {
        let Some(join) = &column.join else {
            return Ok(None);
        };

        let target_index =
            self.catalog
                .table_index(&join.table)
                .ok_or_else(|| CompileError::UnresolvedReference {
                    table: schema.qualified_name(),
                    target: join.table.clone(),
                    via: format!("column '{}'", column.name),
                })?;
        let target = &self.catalog.tables()[target_index];

        if target.is_view() && !schema.is_view() {
            return Err(CompileError::ForeignKeyTargetIsView {
                table: schema.qualified_name(),
                column: column.name.clone(),
                view: target.qualified_name(),
            });
        }

        let (target_column, missing) = match (&join.column, &join.field) {
            (Some(_), Some(_)) => {
                return Err(CompileError::AmbiguousJoinSpecifier {
                    table: schema.qualified_name(),
                    column: column.name.clone(),
                })
            }
            (None, None) => {
                return Err(CompileError::MissingJoinSpecifier {
                    table: schema.qualified_name(),
                    column: column.name.clone(),
                })
            }
            (Some(name), None) => (target.column_by_name(name), name),
            (None, Some(field)) => (target.column(field), field),
        };
        let target_column = target_column.ok_or_else(|| CompileError::UnresolvedColumn {
            table: schema.qualified_name(),
            target: target.qualified_name(),
            column: missing.clone(),
        })?;

        Ok(Some(ForeignKeyLink {
            field: column.field.clone(),
            column: column.name.clone(),
            target: target_index,
            target_field: target_column.field.clone(),
            target_column: target_column.name.clone(),
        }))
    }

    /// Topological order; among ready tables, physical tables go before views,
    /// then declaration order
    fn emission_order(&self, tables: &[LinkedTable<'a>]) -> CompileResult<Vec<usize>> {
        let n = tables.len();
        let mut dependencies: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
        for table in tables {
            let deps = &mut dependencies[table.index];
            for fk in &table.foreign_keys {
                if fk.target == table.index {
                    debug!(table = %table.schema.qualified_name(), column = %fk.column, "self-referencing foreign key");
                    continue;
                }
                deps.insert(fk.target);
            }
            if let Some(base) = table.view_base {
                if base == table.index {
                    let name = table.schema.qualified_name();
                    return Err(CompileError::DependencyCycle {
                        path: vec![name.clone(), name],
                    });
                }
                deps.insert(base);
            }
        }

        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut pending: Vec<usize> = vec![0; n];
        for (i, deps) in dependencies.iter().enumerate() {
            pending[i] = deps.len();
            for &d in deps {
                dependents[d].push(i);
            }
        }

        let mut ready: BinaryHeap<Reverse<(bool, usize)>> = tables
            .iter()
            .filter(|t| pending[t.index] == 0)
            .map(|t| Reverse((t.is_view(), t.index)))
            .collect();
        let mut order = Vec::with_capacity(n);
        while let Some(Reverse((_, i))) = ready.pop() {
            order.push(i);
            for &dependent in &dependents[i] {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    ready.push(Reverse((tables[dependent].is_view(), dependent)));
                }
            }
        }

        if order.len() < n {
            let placed: HashSet<usize> = order.iter().copied().collect();
            let path = find_cycle(&dependencies, &placed)
                .into_iter()
                .map(|i| tables[i].schema.qualified_name())
                .collect();
            return Err(CompileError::DependencyCycle { path });
        }
        Ok(order)
    }
}

/// Link a catalog
pub fn link(catalog: &Catalog) -> CompileResult<LinkedSchema<'_>> {
    SchemaLinker::new(catalog).link()
}

fn check_duplicate_columns(schema: &TableSchema) -> CompileResult<()> {
    if let Some(column) = schema.duplicate_columns().first() {
        return Err(CompileError::DuplicateColumn {
            table: schema.qualified_name(),
            column: column.clone(),
        });
    }
    let mut seen = HashSet::new();
    for column in schema.columns() {
        if !seen.insert(column.name.as_str()) {
            return Err(CompileError::DuplicateColumn {
                table: schema.qualified_name(),
                column: column.name.clone(),
            });
        }
    }
    Ok(())
}

fn unique_keys(schema: &TableSchema) -> CompileResult<Vec<Vec<String>>> {
    let mut keys: Vec<Vec<String>> = schema
        .columns()
        .filter(|c| c.unique)
        .map(|c| vec![c.name.clone()])
        .collect();

    for constraint in &schema.unique_constraints {
        let mut names = Vec::new();
        for field in &constraint.fields {
            let column = schema
                .column(field)
                .ok_or_else(|| unresolved_local(schema, field))?;
            names.push(column.name.clone());
        }
        for name in &constraint.columns {
            let column = schema
                .column_by_name(name)
                .ok_or_else(|| unresolved_local(schema, name))?;
            names.push(column.name.clone());
        }
        if !names.is_empty() {
            keys.push(names);
        }
    }
    Ok(keys)
}

fn unresolved_local(schema: &TableSchema, column: &str) -> CompileError {
    CompileError::UnresolvedColumn {
        table: schema.qualified_name(),
        target: schema.qualified_name(),
        column: column.to_string(),
    }
}

/// Columns referencing the same table share one constraint, unless another
/// local column references the same target column; such columns get a
/// constraint of their own.
fn group_foreign_keys(links: &[ForeignKeyLink]) -> Vec<ForeignKeyGroup> {
    let mut groups: Vec<ForeignKeyGroup> = Vec::new();
    for link in links {
        let collides = links.iter().any(|other| {
            other.field != link.field
                && other.target == link.target
                && other.target_column == link.target_column
        });
        let existing = if collides {
            None
        } else {
            groups
                .iter_mut()
                .find(|g| g.target == link.target && !g.split)
        };
        match existing {
            Some(group) => {
                group.columns.push(link.column.clone());
                group.target_columns.push(link.target_column.clone());
            }
            None => groups.push(ForeignKeyGroup {
                target: link.target,
                columns: vec![link.column.clone()],
                target_columns: vec![link.target_column.clone()],
                split: collides,
            }),
        }
    }
    groups
}

fn find_cycle(dependencies: &[BTreeSet<usize>], placed: &HashSet<usize>) -> Vec<usize> {
    let Some(start) = (0..dependencies.len()).find(|i| !placed.contains(i)) else {
        return Vec::new();
    };
    let mut path = vec![start];
    let mut current = start;
    loop {
        let next = dependencies[current]
            .iter()
            .copied()
            .find(|d| !placed.contains(d));
        let Some(next) = next else {
            return path;
        };
        if let Some(pos) = path.iter().position(|&p| p == next) {
            let mut cycle = path.split_off(pos);
            cycle.push(next);
            return cycle;
        }
        path.push(next);
        current = next;
    }
}
