//! SQL dialect abstraction for PostgreSQL and SQLite output

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Supported SQL dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[default]
    Postgres,
    Sqlite,
}

impl SqlDialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlDialect::Postgres => "postgres",
            SqlDialect::Sqlite => "sqlite",
        }
    }
}

impl FromStr for SqlDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(SqlDialect::Postgres),
            "sqlite" | "sqlite3" => Ok(SqlDialect::Sqlite),
            other => Err(format!("unknown dialect '{}'", other)),
        }
    }
}

impl std::fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for dialect-specific SQL generation
pub trait SqlDialectImpl: Send + Sync {
    /// Get the dialect type
    fn dialect(&self) -> SqlDialect;

    /// Quote an identifier (table/column name)
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Quote a possibly namespaced table name, each part separately
    fn qualified_name(&self, namespace: Option<&str>, name: &str) -> String {
        match namespace {
            Some(ns) if self.supports_namespaces() => {
                format!("{}.{}", self.quote_identifier(ns), self.quote_identifier(name))
            }
            _ => self.quote_identifier(name),
        }
    }

    /// Generate parameter placeholder for bind variable
    fn parameter_placeholder(&self, index: usize) -> String;

    /// Comparison operator under which NULL equals NULL
    fn null_safe_equals(&self) -> &str;

    /// Case-fold an expression for case-insensitive comparison
    fn case_fold(&self, expr: &str) -> String {
        format!("LOWER({})", expr)
    }

    fn boolean_type(&self) -> &str;

    /// Unbounded character type
    fn text_type(&self) -> &str;

    fn blob_type(&self) -> &str;

    fn supports_arrays(&self) -> bool;

    /// Array type over an element type, if arrays are supported
    fn array_type(&self, element: &str) -> Option<String> {
        if self.supports_arrays() {
            Some(format!("{} ARRAY", element))
        } else {
            None
        }
    }

    /// Idempotent view creation prefix
    fn create_view(&self) -> &str;

    fn supports_namespaces(&self) -> bool;

    /// Namespace assumed for an un-namespaced table
    fn default_namespace(&self) -> Option<&str> {
        None
    }

    /// CREATE SCHEMA statement, if the dialect has namespaces
    fn create_schema(&self, namespace: &str) -> Option<String> {
        if self.supports_namespaces() {
            Some(format!(
                "CREATE SCHEMA IF NOT EXISTS {}",
                self.quote_identifier(namespace)
            ))
        } else {
            None
        }
    }

    /// LIMIT syntax
    fn limit(&self, limit: u64) -> String {
        format!("LIMIT {}", limit)
    }
}

/// PostgreSQL dialect implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl SqlDialectImpl for PostgresDialect {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Postgres
    }

    fn parameter_placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn null_safe_equals(&self) -> &str {
        "IS NOT DISTINCT FROM"
    }

    fn boolean_type(&self) -> &str {
        "BOOLEAN"
    }

    fn text_type(&self) -> &str {
        "VARCHAR"
    }

    fn blob_type(&self) -> &str {
        "BYTEA"
    }

    fn supports_arrays(&self) -> bool {
        true
    }

    fn create_view(&self) -> &str {
        "CREATE OR REPLACE VIEW"
    }

    fn supports_namespaces(&self) -> bool {
        true
    }

    fn default_namespace(&self) -> Option<&str> {
        Some("public")
    }
}

/// SQLite dialect implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqlDialectImpl for SqliteDialect {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }

    fn parameter_placeholder(&self, index: usize) -> String {
        format!("?{}", index)
    }

    fn null_safe_equals(&self) -> &str {
        "IS"
    }

    fn boolean_type(&self) -> &str {
        // SQLite stores booleans as 0/1
        "INTEGER"
    }

    fn text_type(&self) -> &str {
        "TEXT"
    }

    fn blob_type(&self) -> &str {
        "BLOB"
    }

    fn supports_arrays(&self) -> bool {
        false
    }

    fn create_view(&self) -> &str {
        "CREATE VIEW IF NOT EXISTS"
    }

    fn supports_namespaces(&self) -> bool {
        false
    }
}

/// Get dialect implementation for a given dialect type
pub fn get_dialect(dialect: SqlDialect) -> Box<dyn SqlDialectImpl> {
    match dialect {
        SqlDialect::Postgres => Box::new(PostgresDialect),
        SqlDialect::Sqlite => Box::new(SqliteDialect),
    }
}
