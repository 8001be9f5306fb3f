//! DDL generation for linked schemas

use std::collections::BTreeSet;

use tracing::{debug, warn};

use super::dialect::{get_dialect, SqlDialect, SqlDialectImpl};
use super::error::{CompileError, CompileResult};
use super::linker::{LinkedSchema, LinkedTable};
use super::schema::{ColumnSchema, ScalarKind, TableSchema};

/// Generator for SQL DDL (CREATE TABLE, CREATE VIEW, etc.)
pub struct DdlGenerator {
    dialect: Box<dyn SqlDialectImpl>,
    create_schemas: bool,
}

impl DdlGenerator {
    /// Create a new DDL generator for the specified dialect
    pub fn new(dialect: SqlDialect) -> Self {
        Self {
            dialect: get_dialect(dialect),
            create_schemas: true,
        }
    }

    /// Whether to emit CREATE SCHEMA for the namespaces in use
    pub fn with_schema_creation(mut self, enabled: bool) -> Self {
        self.create_schemas = enabled;
        self
    }

    /// Generate every statement needed to create the schema, in order
    pub fn generate(&self, linked: &LinkedSchema<'_>) -> CompileResult<Vec<String>> {
        let mut statements = Vec::new();
        if self.create_schemas {
            statements.extend(self.generate_namespaces(linked));
        }
        for table in linked.ordered() {
            statements.push(self.generate_statement(linked, table)?);
        }
        debug!(statements = statements.len(), "generated DDL");
        Ok(statements)
    }

    /// All statements as one script
    pub fn generate_script(&self, linked: &LinkedSchema<'_>) -> CompileResult<String> {
        let mut sql = String::new();
        for statement in self.generate(linked)? {
            sql.push_str(&statement);
            sql.push_str(";\n\n");
        }
        Ok(sql)
    }

    /// CREATE TABLE or CREATE VIEW, depending on the table
    pub fn generate_statement(
        &self,
        linked: &LinkedSchema<'_>,
        table: &LinkedTable<'_>,
    ) -> CompileResult<String> {
        if table.is_view() {
            self.generate_view(linked, table)
        } else {
            self.generate_table(linked, table)
        }
    }

    /// CREATE SCHEMA statements, sorted and deduplicated
    pub fn generate_namespaces(&self, linked: &LinkedSchema<'_>) -> Vec<String> {
        let namespaces: BTreeSet<&str> = linked
            .catalog()
            .tables()
            .iter()
            .filter_map(|t| t.namespace.as_deref())
            .collect();
        namespaces
            .into_iter()
            .filter_map(|ns| self.dialect.create_schema(ns))
            .collect()
    }

    /// Generate CREATE TABLE statement for a physical table
    pub fn generate_table(
        &self,
        linked: &LinkedSchema<'_>,
        table: &LinkedTable<'_>,
    ) -> CompileResult<String> {
        let schema = table.schema;
        let mut sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (\n",
            self.table_name(schema)
        );

        let mut lines = Vec::new();
        for column in schema.columns() {
            lines.push(format!("    {}", self.generate_column(schema, column)?));
        }

        if !table.primary_key.is_empty() {
            lines.push(format!(
                "    CONSTRAINT {} PRIMARY KEY ({})",
                self.constraint_name(schema, &[], "PK"),
                self.column_list(&table.primary_key)
            ));
        }

        for key in &table.unique_keys {
            lines.push(format!(
                "    CONSTRAINT {} UNIQUE ({})",
                self.constraint_name(schema, key, "UK"),
                self.column_list(key)
            ));
        }

        for group in &table.foreign_key_groups {
            let target = linked.table(group.target).schema;
            lines.push(format!(
                "    CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
                self.constraint_name(schema, &group.columns, "FK"),
                self.column_list(&group.columns),
                self.reference_name(schema, target),
                self.column_list(&group.target_columns)
            ));
        }

        sql.push_str(&lines.join(",\n"));
        sql.push_str("\n)");
        Ok(sql)
    }

    /// Generate CREATE VIEW statement over the view's base table and the
    /// tables its join columns reference
    pub fn generate_view(
        &self,
        linked: &LinkedSchema<'_>,
        view: &LinkedTable<'_>,
    ) -> CompileResult<String> {
        let schema = view.schema;
        let base_index = view.view_base.ok_or_else(|| CompileError::EmptyView {
            view: schema.qualified_name(),
        })?;
        let base = linked.table(base_index).schema;

        // Tables reachable through the view's join columns, one join each
        let mut joined: Vec<(&TableSchema, String)> = Vec::new();
        let mut joins = Vec::new();
        for fk in &view.foreign_keys {
            let target = linked.table(fk.target).schema;
            if joined.iter().any(|(t, _)| std::ptr::eq(*t, target)) {
                warn!(
                    view = %schema.qualified_name(),
                    column = %fk.column,
                    "table already joined, skipping second join"
                );
                continue;
            }
            let local = base
                .column(&fk.field)
                .ok_or_else(|| CompileError::ViewColumnNotFound {
                    view: schema.qualified_name(),
                    field: fk.field.clone(),
                })?;
            let reference = self.reference_name(schema, target);
            joins.push(format!(
                "JOIN {} ON B.{} = {}.{}",
                reference,
                self.dialect.quote_identifier(&local.name),
                reference,
                self.dialect.quote_identifier(&fk.target_column)
            ));
            joined.push((target, reference));
        }

        let mut select = Vec::new();
        for column in schema.columns() {
            let (qualifier, source) = match base.column(&column.field) {
                Some(source) => ("B".to_string(), source),
                None => joined
                    .iter()
                    .find_map(|(t, reference)| {
                        t.column(&column.field).map(|c| (reference.clone(), c))
                    })
                    .ok_or_else(|| CompileError::ViewColumnNotFound {
                        view: schema.qualified_name(),
                        field: column.field.clone(),
                    })?,
            };
            let mut item = format!(
                "{}.{}",
                qualifier,
                self.dialect.quote_identifier(&source.name)
            );
            if source.name != column.name {
                item.push_str(&format!(
                    " AS {}",
                    self.dialect.quote_identifier(&column.name)
                ));
            }
            select.push(item);
        }

        let mut sql = format!(
            "{} {} AS SELECT {}\nFROM {} B",
            self.dialect.create_view(),
            self.table_name(schema),
            select.join(", "),
            self.table_name(base)
        );
        for join in joins {
            sql.push('\n');
            sql.push_str(&join);
        }
        Ok(sql)
    }

    /// Generate column definition
    fn generate_column(&self, table: &TableSchema, column: &ColumnSchema) -> CompileResult<String> {
        let mut col = format!(
            "{} {}",
            self.dialect.quote_identifier(&column.name),
            self.column_type(table, column)?
        );

        if let Some(literal) = &column.default_literal {
            col.push_str(" DEFAULT ");
            if column.kind.is_textual() {
                col.push_str(&format!("'{}'", literal.replace('\'', "''")));
            } else {
                col.push_str(literal);
            }
        }

        if !column.is_nullable() {
            col.push_str(" NOT NULL");
        }

        Ok(col)
    }

    /// Get SQL column type for a column
    pub fn column_type(&self, table: &TableSchema, column: &ColumnSchema) -> CompileResult<String> {
        if let Some(definition) = &column.definition {
            return Ok(definition.clone());
        }

        let unsupported = |reason: &str| CompileError::UnsupportedColumnType {
            table: table.qualified_name(),
            column: column.name.clone(),
            reason: reason.to_string(),
        };

        let element = match column.kind {
            ScalarKind::Bool => self.dialect.boolean_type().to_string(),
            ScalarKind::Byte | ScalarKind::Short => "SMALLINT".to_string(),
            ScalarKind::Int => "INTEGER".to_string(),
            ScalarKind::Long => "BIGINT".to_string(),
            ScalarKind::Float => "REAL".to_string(),
            ScalarKind::Double => match (column.precision, column.scale) {
                (Some(p), Some(s)) => format!("NUMERIC({},{})", p, s),
                (Some(p), None) => format!("NUMERIC({})", p),
                _ => "DOUBLE PRECISION".to_string(),
            },
            ScalarKind::Char => "CHAR(1)".to_string(),
            ScalarKind::String => match column.length {
                Some(len) => format!("VARCHAR({})", len),
                None => self.dialect.text_type().to_string(),
            },
            ScalarKind::Enum => match column.length {
                Some(len) => format!("VARCHAR({})", len),
                None => return Err(unsupported("enum columns need a length")),
            },
            ScalarKind::Bytes => self.dialect.blob_type().to_string(),
            ScalarKind::Date => "DATE".to_string(),
            ScalarKind::Timestamp => "TIMESTAMP".to_string(),
        };

        if column.is_array {
            self.dialect.array_type(&element).ok_or_else(|| {
                unsupported(&format!(
                    "{} has no array types",
                    self.dialect.dialect()
                ))
            })
        } else {
            Ok(element)
        }
    }

    /// Generate DROP statements in reverse dependency order
    pub fn generate_drop(&self, linked: &LinkedSchema<'_>) -> Vec<String> {
        linked
            .order()
            .iter()
            .rev()
            .map(|&i| {
                let schema = linked.table(i).schema;
                let kind = if schema.is_view() { "VIEW" } else { "TABLE" };
                format!("DROP {} IF EXISTS {}", kind, self.table_name(schema))
            })
            .collect()
    }

    fn table_name(&self, table: &TableSchema) -> String {
        self.dialect
            .qualified_name(table.namespace.as_deref(), &table.name)
    }

    /// Name of a referenced table; a namespaced referrer qualifies an
    /// un-namespaced target with the default namespace
    fn reference_name(&self, from: &TableSchema, target: &TableSchema) -> String {
        let namespace = match (&from.namespace, &target.namespace) {
            (_, Some(ns)) => Some(ns.as_str()),
            (Some(_), None) => self.dialect.default_namespace(),
            (None, None) => None,
        };
        self.dialect.qualified_name(namespace, &target.name)
    }

    fn constraint_name(&self, table: &TableSchema, columns: &[String], suffix: &str) -> String {
        let mut name = table.name.clone();
        for column in columns {
            name.push('_');
            name.push_str(column);
        }
        name.push('_');
        name.push_str(suffix);
        self.dialect.quote_identifier(&name)
    }

    fn column_list(&self, columns: &[String]) -> String {
        columns
            .iter()
            .map(|c| self.dialect.quote_identifier(c))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
