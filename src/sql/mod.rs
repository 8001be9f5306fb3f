//! Metadata to SQL compilation
//!
//! This module turns a declarative description of entities and their
//! data-access operations into schema DDL and parameterized SQL with an
//! exact binding order.
//!
//! # Overview
//!
//! The compilation process involves:
//! 1. Describing tables, views and operations ([`Catalog`], [`TableSchema`],
//!    [`OperationSpec`])
//! 2. Linking cross-table references and ordering tables ([`SchemaLinker`])
//! 3. Generating CREATE statements ([`DdlGenerator`])
//! 4. Compiling each operation to SQL plus bindings ([`QueryCompiler`])
//!
//! # Example
//!
//! ```rust
//! use sqlforge::sql::{
//!     compile_catalog, Catalog, ColumnSchema, CompilerConfig, OperationKind, OperationSpec,
//!     ParamBinding, ReturnShape, ScalarKind, TableSchema,
//! };
//!
//! let users = TableSchema::new("USERS")
//!     .with_column(ColumnSchema::new("userId", ScalarKind::Long).primary_key())
//!     .with_column(ColumnSchema::new("username", ScalarKind::String).unique())
//!     .with_operation(
//!         OperationSpec::new("getByName", OperationKind::SelectEntity, ReturnShape::One)
//!             .param(ParamBinding::scalar("username", ScalarKind::String)),
//!     );
//! let catalog = Catalog::new().with_table(users);
//!
//! let compiled = compile_catalog(&catalog, &CompilerConfig::default()).unwrap();
//! assert!(compiled.ddl[0].starts_with("CREATE TABLE IF NOT EXISTS \"USERS\""));
//!
//! let op = compiled.operation("USERS", "getByName").unwrap();
//! assert_eq!(
//!     op.statement.sql,
//!     "SELECT \"USER_ID\", \"USERNAME\" FROM \"USERS\" WHERE \"USERNAME\" IS NOT DISTINCT FROM $1"
//! );
//! ```
//!
//! ## SQL Dialects
//!
//! - **PostgreSQL**: arrays, namespaces, `IS NOT DISTINCT FROM`
//! - **SQLite**: INTEGER booleans, `IS` for null-safe equality, no arrays

pub mod compiler;
pub mod ddl;
pub mod dialect;
pub mod error;
pub mod linker;
pub mod operation;
pub mod raw;
pub mod schema;

// Re-export main types
pub use compiler::{
    compile_catalog, Binding, BoundValue, CompiledCatalog, CompiledOperation, CompiledTable,
    CompilerConfig, Encoding, PreludeStep, QueryCompiler, ResultMapping, RowShape, Statement,
};
pub use ddl::DdlGenerator;
pub use dialect::{get_dialect, PostgresDialect, SqlDialect, SqlDialectImpl, SqliteDialect};
pub use error::{CompileError, CompileResult};
pub use linker::{link, ForeignKeyGroup, ForeignKeyLink, LinkedSchema, LinkedTable, SchemaLinker};
pub use operation::{
    BindingRole, CompositeField, Conjunction, Direction, OperationKind, OperationSpec, OrderBy,
    ParamBinding, ParamType, RawPredicate, ReturnShape,
};
pub use raw::{RawSegment, RawSql};
pub use schema::{
    to_column_name, Catalog, ColumnSchema, JoinTarget, ScalarKind, TableSchema, UniqueConstraint,
};
