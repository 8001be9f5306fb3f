//! Error types for schema linking, DDL generation and query compilation

use thiserror::Error;

/// Errors that abort a compilation run
///
/// Every variant carries enough context to locate the offending table,
/// column, operation or parameter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("Table '{table}' references unknown table '{target}' ({via})")]
    UnresolvedReference {
        table: String,
        target: String,
        via: String,
    },

    #[error("Column '{column}' does not exist in table '{target}' (referenced from '{table}')")]
    UnresolvedColumn {
        table: String,
        target: String,
        column: String,
    },

    #[error("Join column '{column}' on '{table}' names both a referenced column and a referenced field")]
    AmbiguousJoinSpecifier { table: String, column: String },

    #[error("Join column '{column}' on '{table}' names neither a referenced column nor a referenced field")]
    MissingJoinSpecifier { table: String, column: String },

    #[error("Foreign key '{column}' on table '{table}' targets view '{view}'")]
    ForeignKeyTargetIsView {
        table: String,
        column: String,
        view: String,
    },

    #[error("Dependency cycle: {}", path.join(" -> "))]
    DependencyCycle { path: Vec<String> },

    #[error("Table '{table}' is declared more than once")]
    DuplicateTable { table: String },

    #[error("Duplicate column '{column}' in table '{table}'")]
    DuplicateColumn { table: String, column: String },

    #[error("View '{view}' has no base table or no columns")]
    EmptyView { view: String },

    #[error("Column '{field}' of view '{view}' not found on its base table or joined tables")]
    ViewColumnNotFound { view: String, field: String },

    #[error("Unsupported type for column '{column}' in table '{table}': {reason}")]
    UnsupportedColumnType {
        table: String,
        column: String,
        reason: String,
    },

    #[error("{table}.{operation}: column '{field}' not found")]
    ColumnNotFound {
        table: String,
        operation: String,
        field: String,
    },

    #[error("{table}.{operation}: parameter '{parameter}' is {found} but column '{column}' is {expected}")]
    TypeMismatch {
        table: String,
        operation: String,
        parameter: String,
        column: String,
        expected: String,
        found: String,
    },

    #[error("{table}.{operation}: unsupported return shape: {reason}")]
    UnsupportedReturnShape {
        table: String,
        operation: String,
        reason: String,
    },

    #[error("{operation}: parameter '{parameter}' combines a field alias with where targets, operator or ignore-case")]
    ConflictingFieldAndWhereAnnotationUse { operation: String, parameter: String },

    #[error("{operation}: ignore-case on non-string parameter '{parameter}'")]
    IgnoreCaseOnNonStringParameter { operation: String, parameter: String },

    #[error("{operation}: update value '{parameter}' is bound to more than one column")]
    MultipleColumnsForSingleValueBinding { operation: String, parameter: String },

    #[error("{operation}: raw SQL references undefined parameter ':{parameter}'")]
    UndefinedSqlParameter { operation: String, parameter: String },

    #[error("{operation}: entity parameter '{parameter}' cannot be combined with other parameters")]
    EntityParameterMixed { operation: String, parameter: String },

    #[error("{table}.{operation}: update has no values to set")]
    EmptyUpdate { table: String, operation: String },
}

/// Result type for compilation
pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_message_lists_path() {
        let err = CompileError::DependencyCycle {
            path: vec!["A".into(), "B".into(), "A".into()],
        };
        assert_eq!(err.to_string(), "Dependency cycle: A -> B -> A");
    }

    #[test]
    fn test_messages_carry_context() {
        let err = CompileError::ColumnNotFound {
            table: "DEVICE".into(),
            operation: "findByColor".into(),
            field: "color".into(),
        };
        assert_eq!(err.to_string(), "DEVICE.findByColor: column 'color' not found");
    }
}
