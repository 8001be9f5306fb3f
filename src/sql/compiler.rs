//! Operation compiler: SQL text plus an ordered binding contract
//!
//! [`QueryCompiler::compile`] turns one [`OperationSpec`] of a table into a
//! [`CompiledOperation`]. The SQL uses positional placeholders; the
//! `bindings` of each [`Statement`] list, in placeholder order, where the
//! value for each placeholder comes from and how it must be encoded.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::ddl::DdlGenerator;
use super::dialect::{get_dialect, SqlDialect, SqlDialectImpl};
use super::error::{CompileError, CompileResult};
use super::linker::link;
use super::operation::{
    BindingRole, Conjunction, OperationKind, OperationSpec, ParamBinding, ParamType, ReturnShape,
};
use super::raw::{RawSegment, RawSql};
use super::schema::{Catalog, ColumnSchema, ScalarKind, TableSchema};

/// Where the value for a placeholder comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum BoundValue {
    /// A method parameter
    Param { name: String },
    /// A field (or dotted path) of a structured parameter
    Field { param: String, field: String },
    /// A local computed by a prelude step
    Local { name: String },
}

/// How a bound value is converted before it reaches the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Encoding {
    /// Passed through
    Plain,
    /// Enum constant bound by its name; a null value stays null when nullable
    EnumName { nullable: bool },
    /// Bound as a SQL array
    SqlArray,
}

/// One positional argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub value: BoundValue,
    /// Physical column the value is compared with or stored into
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    pub encoding: Encoding,
}

/// Work done before the statement executes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PreludeStep {
    /// Mint an id with the named generator into `local`
    GenerateId {
        local: String,
        generator: String,
        column: String,
    },
    /// Map every element of an enum array to its name
    EnumNames {
        local: String,
        source: BoundValue,
        nullable: bool,
    },
}

/// SQL text with its bindings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    pub sql: String,
    pub bindings: Vec<Binding>,
}

/// How the driver result becomes the operation's return value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResultMapping {
    Discard,
    AffectedRows,
    /// Batch: affected rows summed over all elements
    SumAffectedRows,
    /// `true` when exactly one row was affected
    AffectedIsOne,
    /// `true` when any row was affected
    AffectedPositive,
    Count,
    /// `true` when the count is above zero
    CountPositive,
    /// First row or not-found
    FirstRow,
    AllRows,
    /// Return the inserted row, one value per column in physical order
    EchoInserted { values: Vec<BoundValue> },
    /// Run the follow-up select when exactly one row was updated,
    /// otherwise not-found
    ReselectIfUpdated,
}

/// Shape of the rows a statement returns
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RowShape {
    None,
    /// Every column of the table
    Entity { columns: Vec<String> },
    Column {
        name: String,
        kind: ScalarKind,
        is_array: bool,
    },
    /// A single raw expression
    Expression,
}

/// Result of compiling one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledOperation {
    pub name: String,
    pub kind: OperationKind,
    pub returns: ReturnShape,
    pub prelude: Vec<PreludeStep>,
    pub statement: Statement,
    /// Re-select executed after an update that returns the row
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<Statement>,
    /// Batch inserts run the prelude and statement once per element of this
    /// parameter; field references on it resolve against the element
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<String>,
    pub result: ResultMapping,
    pub row: RowShape,
}

/// Configuration for compilation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Target SQL dialect
    pub dialect: SqlDialect,
    /// Whether to emit CREATE SCHEMA for namespaces in use
    pub create_schemas: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            dialect: SqlDialect::Postgres,
            create_schemas: true,
        }
    }
}

/// Compiles operations against one dialect
pub struct QueryCompiler {
    dialect: Box<dyn SqlDialectImpl>,
}

impl QueryCompiler {
    pub fn new(dialect: SqlDialect) -> Self {
        Self {
            dialect: get_dialect(dialect),
        }
    }

    /// Compile one operation of `table`
    pub fn compile(
        &self,
        table: &TableSchema,
        op: &OperationSpec,
    ) -> CompileResult<CompiledOperation> {
        let ctx = Context::new(self.dialect.as_ref(), table, op)?;
        let compiled = match op.kind {
            OperationKind::Insert | OperationKind::BatchInsert => ctx.compile_insert(),
            OperationKind::Update => ctx.compile_update(),
            OperationKind::Delete => ctx.compile_delete(),
            OperationKind::Count | OperationKind::Exists => ctx.compile_count(),
            OperationKind::SelectEntity
            | OperationKind::SelectColumn
            | OperationKind::SelectRawExpression => ctx.compile_select(),
        }?;
        debug!(
            table = %table.qualified_name(),
            operation = %op.name,
            sql = %compiled.statement.sql,
            bindings = compiled.statement.bindings.len(),
            "compiled operation"
        );
        Ok(compiled)
    }

    /// Compile every operation of `table`, in declaration order
    pub fn compile_table(&self, table: &TableSchema) -> CompileResult<Vec<CompiledOperation>> {
        table
            .operations
            .iter()
            .map(|op| self.compile(table, op))
            .collect()
    }
}

/// A parameter with its bound columns
struct ResolvedParam<'a> {
    binding: &'a ParamBinding,
    targets: Vec<Target<'a>>,
}

struct Target<'a> {
    column: &'a ColumnSchema,
    value: BoundValue,
}

/// Steps and locals shared by every statement of one operation
#[derive(Default)]
struct Prelude {
    steps: Vec<PreludeStep>,
    enum_locals: Vec<(BoundValue, String)>,
    enum_count: usize,
}

impl Prelude {
    /// Local holding the element names of an enum array, created once per value
    fn enum_names(&mut self, source: &BoundValue, nullable: bool) -> BoundValue {
        if let Some((_, local)) = self.enum_locals.iter().find(|(v, _)| v == source) {
            return BoundValue::Local {
                name: local.clone(),
            };
        }
        let local = format!("var{}", self.enum_count);
        self.enum_count += 1;
        self.steps.push(PreludeStep::EnumNames {
            local: local.clone(),
            source: source.clone(),
            nullable,
        });
        self.enum_locals.push((source.clone(), local.clone()));
        BoundValue::Local { name: local }
    }

    /// Encode a value of the given type
    fn encode(
        &mut self,
        value: &BoundValue,
        kind: ScalarKind,
        is_array: bool,
        nullable: bool,
    ) -> (BoundValue, Encoding) {
        match (kind, is_array) {
            (ScalarKind::Enum, true) => (self.enum_names(value, nullable), Encoding::SqlArray),
            (_, true) => (value.clone(), Encoding::SqlArray),
            (ScalarKind::Enum, false) => (value.clone(), Encoding::EnumName { nullable }),
            _ => (value.clone(), Encoding::Plain),
        }
    }
}

/// Collects bindings and hands out placeholders in textual order
struct StatementBuilder<'d> {
    dialect: &'d dyn SqlDialectImpl,
    bindings: Vec<Binding>,
}

impl<'d> StatementBuilder<'d> {
    fn new(dialect: &'d dyn SqlDialectImpl) -> Self {
        Self {
            dialect,
            bindings: Vec::new(),
        }
    }

    fn bind(&mut self, binding: Binding) -> String {
        self.bindings.push(binding);
        self.dialect.parameter_placeholder(self.bindings.len())
    }

    fn bind_column(
        &mut self,
        prelude: &mut Prelude,
        column: &ColumnSchema,
        value: &BoundValue,
    ) -> String {
        let (value, encoding) =
            prelude.encode(value, column.kind, column.is_array, column.is_nullable());
        self.bind(Binding {
            value,
            column: Some(column.name.clone()),
            encoding,
        })
    }

    fn finish(self, sql: String) -> Statement {
        Statement {
            sql,
            bindings: self.bindings,
        }
    }
}

/// Immutable state of one compilation
struct Context<'a> {
    dialect: &'a dyn SqlDialectImpl,
    table: &'a TableSchema,
    op: &'a OperationSpec,
    params: Vec<ResolvedParam<'a>>,
    raw_predicate: Option<(RawSql, Conjunction)>,
    raw_expression: Option<RawSql>,
}

impl<'a> Context<'a> {
    fn new(
        dialect: &'a dyn SqlDialectImpl,
        table: &'a TableSchema,
        op: &'a OperationSpec,
    ) -> CompileResult<Self> {
        let raw_predicate = op
            .raw_predicate
            .as_ref()
            .map(|p| (RawSql::parse(&p.sql), p.conjunction));
        let raw_expression = match op.kind {
            OperationKind::SelectRawExpression => op.return_expression.as_deref().map(RawSql::parse),
            _ => None,
        };

        let mut ctx = Self {
            dialect,
            table,
            op,
            params: Vec::new(),
            raw_predicate,
            raw_expression,
        };
        ctx.check_ordering()?;
        ctx.check_raw_parameters()?;
        for binding in &op.params {
            let resolved = ctx.resolve_param(binding)?;
            ctx.params.push(resolved);
        }
        Ok(ctx)
    }

    fn raw_fragments(&self) -> impl Iterator<Item = &RawSql> {
        self.raw_expression
            .iter()
            .chain(self.raw_predicate.iter().map(|(raw, _)| raw))
    }

    /// Order fields must exist; ordering and limits only apply to selects
    fn check_ordering(&self) -> CompileResult<()> {
        for order in &self.op.order_by {
            if self.table.column(&order.field).is_none() {
                return Err(self.column_not_found(&order.field));
            }
        }
        if !self.op.kind.is_select() && (!self.op.order_by.is_empty() || self.op.limit.is_some()) {
            return Err(self.unsupported_return(format!(
                "{:?} does not take ORDER BY or LIMIT",
                self.op.kind
            )));
        }
        Ok(())
    }

    fn check_raw_parameters(&self) -> CompileResult<()> {
        for raw in self.raw_fragments() {
            for name in raw.parameter_names() {
                if self.op.param_named(name).is_none() {
                    return Err(CompileError::UndefinedSqlParameter {
                        operation: self.op.name.clone(),
                        parameter: name.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn is_raw_parameter(&self, name: &str) -> bool {
        self.raw_fragments()
            .any(|raw| raw.parameter_names().any(|n| n == name))
    }

    fn resolve_param(&self, binding: &'a ParamBinding) -> CompileResult<ResolvedParam<'a>> {
        let op = &self.op.name;
        if binding.field_alias.is_some()
            && (!binding.targets.is_empty()
                || binding.ignore_case
                || !binding.is_default_equality())
        {
            return Err(CompileError::ConflictingFieldAndWhereAnnotationUse {
                operation: op.clone(),
                parameter: binding.name.clone(),
            });
        }
        if binding.ignore_case
            && binding.ty
                != (ParamType::Scalar {
                    kind: ScalarKind::String,
                    is_array: false,
                })
        {
            return Err(CompileError::IgnoreCaseOnNonStringParameter {
                operation: op.clone(),
                parameter: binding.name.clone(),
            });
        }

        let mut targets = Vec::new();
        match &binding.ty {
            ParamType::Scalar { kind, is_array } => {
                let explicit = !binding.targets.is_empty();
                let fields: Vec<&str> = if explicit {
                    binding.targets.iter().map(String::as_str).collect()
                } else {
                    vec![binding.field_alias.as_deref().unwrap_or(&binding.name)]
                };
                for field in fields {
                    match self.table.column(field) {
                        Some(column) => {
                            self.check_type(&binding.name, column, *kind, *is_array)?;
                            targets.push(Target {
                                column,
                                value: BoundValue::Param {
                                    name: binding.name.clone(),
                                },
                            });
                        }
                        // Only used inside raw SQL
                        None if !explicit && self.is_raw_parameter(&binding.name) => {}
                        None => return Err(self.column_not_found(field)),
                    }
                }
            }
            ParamType::Composite { fields } => {
                let raw = self.is_raw_parameter(&binding.name);
                for field in fields.iter().filter(|f| !f.skip) {
                    let column = match self.table.column(&field.name) {
                        Some(column) => column,
                        None if raw => continue,
                        None => return Err(self.column_not_found(&field.name)),
                    };
                    let parameter = format!("{}.{}", binding.name, field.name);
                    self.check_type(&parameter, column, field.kind, field.is_array)?;
                    targets.push(Target {
                        column,
                        value: BoundValue::Field {
                            param: binding.name.clone(),
                            field: field.name.clone(),
                        },
                    });
                }
            }
            ParamType::Entity => {
                for column in self.table.columns() {
                    targets.push(Target {
                        column,
                        value: BoundValue::Field {
                            param: binding.name.clone(),
                            field: column.field.clone(),
                        },
                    });
                }
            }
        }

        Ok(ResolvedParam { binding, targets })
    }

    fn check_type(
        &self,
        parameter: &str,
        column: &ColumnSchema,
        kind: ScalarKind,
        is_array: bool,
    ) -> CompileResult<()> {
        if column.accepts(kind, is_array) {
            return Ok(());
        }
        Err(CompileError::TypeMismatch {
            table: self.table.qualified_name(),
            operation: self.op.name.clone(),
            parameter: parameter.to_string(),
            column: column.name.clone(),
            expected: column.kind.describe(column.is_array),
            found: kind.describe(is_array),
        })
    }

    fn column_not_found(&self, field: &str) -> CompileError {
        CompileError::ColumnNotFound {
            table: self.table.qualified_name(),
            operation: self.op.name.clone(),
            field: field.to_string(),
        }
    }

    fn unsupported_return(&self, reason: impl Into<String>) -> CompileError {
        CompileError::UnsupportedReturnShape {
            table: self.table.qualified_name(),
            operation: self.op.name.clone(),
            reason: reason.into(),
        }
    }

    fn table_name(&self) -> String {
        self.dialect
            .qualified_name(self.table.namespace.as_deref(), &self.table.name)
    }

    fn quote(&self, name: &str) -> String {
        self.dialect.quote_identifier(name)
    }

    fn select_all(&self) -> String {
        self.table
            .columns()
            .map(|c| self.quote(&c.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn entity_row(&self) -> RowShape {
        RowShape::Entity {
            columns: self.table.columns().map(|c| c.name.clone()).collect(),
        }
    }

    fn compile_insert(&self) -> CompileResult<CompiledOperation> {
        let batch = self.op.kind == OperationKind::BatchInsert;

        if let Some(entity) = self
            .op
            .params
            .iter()
            .find(|p| p.ty == ParamType::Entity)
        {
            if self.op.params.len() > 1 {
                return Err(CompileError::EntityParameterMixed {
                    operation: self.op.name.clone(),
                    parameter: entity.name.clone(),
                });
            }
        }

        let batch_param = if batch {
            match self.op.params.as_slice() {
                [only] if only.is_composite() => Some(only.name.clone()),
                _ => {
                    return Err(
                        self.unsupported_return("batch insert takes exactly one list of entities")
                    )
                }
            }
        } else {
            None
        };

        let mut prelude = Prelude::default();
        let mut values: Vec<(usize, &ColumnSchema, BoundValue)> = Vec::new();

        for (index, column) in self.table.columns().enumerate() {
            if let Some(generator) = &column.id_generator {
                let local = format!("id{}", index);
                prelude.steps.push(PreludeStep::GenerateId {
                    local: local.clone(),
                    generator: generator.clone(),
                    column: column.name.clone(),
                });
                values.push((index, column, BoundValue::Local { name: local }));
            }
        }

        for param in &self.params {
            for target in &param.targets {
                if target.column.is_generated() {
                    if !param.binding.is_composite() {
                        warn!(
                            operation = %self.op.name,
                            parameter = %param.binding.name,
                            column = %target.column.name,
                            "value for generated column ignored"
                        );
                    }
                    continue;
                }
                if values.iter().any(|(_, c, _)| c.name == target.column.name) {
                    warn!(
                        operation = %self.op.name,
                        column = %target.column.name,
                        "column bound twice, keeping the first value"
                    );
                    continue;
                }
                let index = self
                    .table
                    .column_index(&target.column.field)
                    .unwrap_or(usize::MAX);
                values.push((index, target.column, target.value.clone()));
            }
        }
        values.sort_by_key(|(index, _, _)| *index);

        let mut stmt = StatementBuilder::new(self.dialect);
        let sql = if values.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", self.table_name())
        } else {
            let columns: Vec<String> = values.iter().map(|(_, c, _)| self.quote(&c.name)).collect();
            let placeholders: Vec<String> = values
                .iter()
                .map(|(_, c, v)| stmt.bind_column(&mut prelude, c, v))
                .collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table_name(),
                columns.join(", "),
                placeholders.join(", ")
            )
        };

        let (result, row) = match (self.op.returns, batch) {
            (ReturnShape::Void, _) => (ResultMapping::Discard, RowShape::None),
            (ReturnShape::Int, true) => (ResultMapping::SumAffectedRows, RowShape::None),
            (ReturnShape::Int, false) => (ResultMapping::AffectedRows, RowShape::None),
            (ReturnShape::Bool, false) => (ResultMapping::AffectedIsOne, RowShape::None),
            (ReturnShape::One, false) => {
                let Some(entity) = self
                    .params
                    .iter()
                    .find(|p| p.binding.ty == ParamType::Entity)
                else {
                    return Err(self.unsupported_return("returning the row needs an entity parameter"));
                };
                let echoed = self
                    .table
                    .columns()
                    .map(|column| {
                        values
                            .iter()
                            .find(|(_, c, _)| c.name == column.name)
                            .map(|(_, _, v)| v.clone())
                            .unwrap_or_else(|| BoundValue::Field {
                                param: entity.binding.name.clone(),
                                field: column.field.clone(),
                            })
                    })
                    .collect();
                (
                    ResultMapping::EchoInserted { values: echoed },
                    self.entity_row(),
                )
            }
            (shape, _) => {
                return Err(self.unsupported_return(format!("insert cannot return {:?}", shape)))
            }
        };

        Ok(CompiledOperation {
            name: self.op.name.clone(),
            kind: self.op.kind,
            returns: self.op.returns,
            statement: stmt.finish(sql),
            prelude: prelude.steps,
            follow_up: None,
            batch: batch_param,
            result,
            row,
        })
    }

    fn compile_update(&self) -> CompileResult<CompiledOperation> {
        let (filters, values): (Vec<&ResolvedParam<'a>>, Vec<&ResolvedParam<'a>>) = self
            .params
            .iter()
            .partition(|p| p.binding.role == BindingRole::WhereFilter);

        for param in &values {
            if !param.binding.is_composite() && param.targets.len() > 1 {
                return Err(CompileError::MultipleColumnsForSingleValueBinding {
                    operation: self.op.name.clone(),
                    parameter: param.binding.name.clone(),
                });
            }
        }

        let mut prelude = Prelude::default();
        let mut stmt = StatementBuilder::new(self.dialect);

        let mut assignments = Vec::new();
        for param in &values {
            for target in &param.targets {
                if param.binding.is_composite() && target.column.is_generated() {
                    continue;
                }
                let placeholder = stmt.bind_column(&mut prelude, target.column, &target.value);
                assignments.push(format!("{} = {}", self.quote(&target.column.name), placeholder));
            }
        }
        if assignments.is_empty() {
            return Err(CompileError::EmptyUpdate {
                table: self.table.qualified_name(),
                operation: self.op.name.clone(),
            });
        }

        let mut sql = format!(
            "UPDATE {} SET {}",
            self.table_name(),
            assignments.join(", ")
        );
        sql.push_str(&self.where_clause(
            &filters,
            self.raw_predicate.as_ref(),
            &mut prelude,
            &mut stmt,
        )?);
        let statement = stmt.finish(sql);

        let (result, follow_up, row) = match self.op.returns {
            ReturnShape::Void => (ResultMapping::Discard, None, RowShape::None),
            ReturnShape::Int => (ResultMapping::AffectedRows, None, RowShape::None),
            ReturnShape::Bool => (ResultMapping::AffectedIsOne, None, RowShape::None),
            ReturnShape::One => {
                // Re-select by the same filters; the raw predicate describes
                // the row before the update
                let mut select = StatementBuilder::new(self.dialect);
                let mut sql = format!("SELECT {} FROM {}", self.select_all(), self.table_name());
                sql.push_str(&self.where_clause(&filters, None, &mut prelude, &mut select)?);
                (
                    ResultMapping::ReselectIfUpdated,
                    Some(select.finish(sql)),
                    self.entity_row(),
                )
            }
            ReturnShape::Many => return Err(self.unsupported_return("update cannot return a list")),
        };

        Ok(CompiledOperation {
            name: self.op.name.clone(),
            kind: self.op.kind,
            returns: self.op.returns,
            prelude: prelude.steps,
            statement,
            follow_up,
            batch: None,
            result,
            row,
        })
    }

    fn compile_delete(&self) -> CompileResult<CompiledOperation> {
        let result = match self.op.returns {
            ReturnShape::Void => ResultMapping::Discard,
            ReturnShape::Bool => ResultMapping::AffectedPositive,
            ReturnShape::Int => ResultMapping::AffectedRows,
            shape => {
                return Err(self.unsupported_return(format!("delete cannot return {:?}", shape)))
            }
        };

        let mut prelude = Prelude::default();
        let mut stmt = StatementBuilder::new(self.dialect);
        let filters: Vec<&ResolvedParam<'a>> = self.params.iter().collect();
        let mut sql = format!("DELETE FROM {}", self.table_name());
        sql.push_str(&self.where_clause(
            &filters,
            self.raw_predicate.as_ref(),
            &mut prelude,
            &mut stmt,
        )?);

        Ok(self.finish(prelude, stmt.finish(sql), result, RowShape::None))
    }

    fn compile_count(&self) -> CompileResult<CompiledOperation> {
        let result = match (self.op.kind, self.op.returns) {
            (OperationKind::Count, ReturnShape::Int) => ResultMapping::Count,
            (OperationKind::Exists, ReturnShape::Bool) => ResultMapping::CountPositive,
            (OperationKind::Count, _) => return Err(self.unsupported_return("count must return int")),
            _ => return Err(self.unsupported_return("exists must return bool")),
        };

        let mut prelude = Prelude::default();
        let mut stmt = StatementBuilder::new(self.dialect);
        let filters: Vec<&ResolvedParam<'a>> = self.params.iter().collect();
        let mut sql = format!("SELECT COUNT(*) FROM {}", self.table_name());
        sql.push_str(&self.where_clause(
            &filters,
            self.raw_predicate.as_ref(),
            &mut prelude,
            &mut stmt,
        )?);

        Ok(self.finish(prelude, stmt.finish(sql), result, RowShape::None))
    }

    fn compile_select(&self) -> CompileResult<CompiledOperation> {
        let result = match self.op.returns {
            ReturnShape::One => ResultMapping::FirstRow,
            ReturnShape::Many => ResultMapping::AllRows,
            shape => {
                return Err(self.unsupported_return(format!("select cannot return {:?}", shape)))
            }
        };
        if self.op.return_column.is_some() && self.op.return_expression.is_some() {
            return Err(self.unsupported_return("both a return column and a raw expression given"));
        }

        let mut prelude = Prelude::default();
        let mut stmt = StatementBuilder::new(self.dialect);

        let (select_list, row) = match self.op.kind {
            OperationKind::SelectColumn => {
                let field = self
                    .op
                    .return_column
                    .as_deref()
                    .ok_or_else(|| self.unsupported_return("select column needs a return column"))?;
                let column = self
                    .table
                    .column(field)
                    .ok_or_else(|| self.column_not_found(field))?;
                (
                    self.quote(&column.name),
                    RowShape::Column {
                        name: column.name.clone(),
                        kind: column.kind,
                        is_array: column.is_array,
                    },
                )
            }
            OperationKind::SelectRawExpression => {
                let raw = self.raw_expression.as_ref().ok_or_else(|| {
                    self.unsupported_return("raw expression select needs an expression")
                })?;
                (
                    self.render_raw(raw, &mut prelude, &mut stmt)?,
                    RowShape::Expression,
                )
            }
            _ => (self.select_all(), self.entity_row()),
        };

        let filters: Vec<&ResolvedParam<'a>> = self.params.iter().collect();
        let mut sql = format!("SELECT {} FROM {}", select_list, self.table_name());
        sql.push_str(&self.where_clause(
            &filters,
            self.raw_predicate.as_ref(),
            &mut prelude,
            &mut stmt,
        )?);

        if !self.op.order_by.is_empty() {
            let mut items = Vec::new();
            for order in &self.op.order_by {
                let column = self
                    .table
                    .column(&order.field)
                    .ok_or_else(|| self.column_not_found(&order.field))?;
                items.push(format!(
                    "{} {}",
                    self.quote(&column.name),
                    order.direction.as_sql()
                ));
            }
            sql.push_str(" ORDER BY ");
            sql.push_str(&items.join(", "));
        }
        if let Some(limit) = self.op.limit {
            sql.push(' ');
            sql.push_str(&self.dialect.limit(limit));
        }

        Ok(self.finish(prelude, stmt.finish(sql), result, row))
    }

    fn finish(
        &self,
        prelude: Prelude,
        statement: Statement,
        result: ResultMapping,
        row: RowShape,
    ) -> CompiledOperation {
        CompiledOperation {
            name: self.op.name.clone(),
            kind: self.op.kind,
            returns: self.op.returns,
            prelude: prelude.steps,
            statement,
            follow_up: None,
            batch: None,
            result,
            row,
        }
    }

    /// ` WHERE ...`, or empty when there is nothing to filter on
    fn where_clause(
        &self,
        params: &[&ResolvedParam<'a>],
        raw: Option<&(RawSql, Conjunction)>,
        prelude: &mut Prelude,
        stmt: &mut StatementBuilder<'_>,
    ) -> CompileResult<String> {
        let mut conditions = Vec::new();
        for param in params {
            if param.targets.is_empty() {
                continue;
            }
            let predicates: Vec<String> = param
                .targets
                .iter()
                .map(|t| self.predicate(param.binding, t, prelude, stmt))
                .collect();
            if param.binding.is_composite() {
                conditions.extend(predicates);
            } else if predicates.len() > 1 {
                conditions.push(format!("({})", predicates.join(" OR ")));
            } else {
                conditions.extend(predicates);
            }
        }

        let mut clause = conditions.join(" AND ");
        if let Some((raw, conjunction)) = raw {
            let text = self.render_raw(raw, prelude, stmt)?;
            if clause.is_empty() {
                clause = text;
            } else if !text.is_empty() {
                clause = format!("{} {} ({})", clause, conjunction.as_sql(), text);
            }
        }

        if clause.is_empty() {
            Ok(String::new())
        } else {
            Ok(format!(" WHERE {}", clause))
        }
    }

    fn predicate(
        &self,
        binding: &ParamBinding,
        target: &Target<'_>,
        prelude: &mut Prelude,
        stmt: &mut StatementBuilder<'_>,
    ) -> String {
        let column = self.quote(&target.column.name);
        let placeholder = stmt.bind_column(prelude, target.column, &target.value);
        let operator = binding.operator.trim();
        if binding.ignore_case {
            format!(
                "{} {} {}",
                self.dialect.case_fold(&column),
                operator,
                self.dialect.case_fold(&placeholder)
            )
        } else if target.column.is_nullable() && binding.is_default_equality() {
            format!(
                "{} {} {}",
                column,
                self.dialect.null_safe_equals(),
                placeholder
            )
        } else {
            format!("{} {} {}", column, operator, placeholder)
        }
    }

    /// Substitute placeholders of a raw fragment, binding in occurrence order
    fn render_raw(
        &self,
        raw: &RawSql,
        prelude: &mut Prelude,
        stmt: &mut StatementBuilder<'_>,
    ) -> CompileResult<String> {
        let mut sql = String::new();
        for segment in &raw.segments {
            match segment {
                RawSegment::Text(text) => sql.push_str(text),
                RawSegment::Placeholder { name, path } => {
                    let param = self.op.param_named(name).ok_or_else(|| {
                        CompileError::UndefinedSqlParameter {
                            operation: self.op.name.clone(),
                            parameter: name.clone(),
                        }
                    })?;
                    let value = if path.is_empty() {
                        BoundValue::Param { name: name.clone() }
                    } else {
                        BoundValue::Field {
                            param: name.clone(),
                            field: path.join("."),
                        }
                    };
                    let (value, encoding) = match self.value_type(param, path) {
                        Some((kind, is_array)) => prelude.encode(&value, kind, is_array, true),
                        None => (value, Encoding::Plain),
                    };
                    sql.push_str(&stmt.bind(Binding {
                        value,
                        column: None,
                        encoding,
                    }));
                }
            }
        }
        Ok(sql)
    }

    /// Scalar type of a parameter, or of a field of it
    fn value_type(&self, param: &ParamBinding, path: &[String]) -> Option<(ScalarKind, bool)> {
        match (&param.ty, path) {
            (ParamType::Scalar { kind, is_array }, []) => Some((*kind, *is_array)),
            (ParamType::Composite { fields }, [field]) => fields
                .iter()
                .find(|f| &f.name == field)
                .map(|f| (f.kind, f.is_array)),
            (ParamType::Entity, [field]) => {
                self.table.column(field).map(|c| (c.kind, c.is_array))
            }
            _ => None,
        }
    }
}

/// Result of compiling a whole catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledCatalog {
    pub dialect: SqlDialect,
    /// Schema creation statements in emission order
    pub ddl: Vec<String>,
    /// Operations per table, tables in emission order
    pub tables: Vec<CompiledTable>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledTable {
    pub table: String,
    pub operations: Vec<CompiledOperation>,
}

impl CompiledCatalog {
    pub fn operation(&self, table: &str, name: &str) -> Option<&CompiledOperation> {
        self.tables
            .iter()
            .find(|t| t.table == table)
            .and_then(|t| t.operations.iter().find(|op| op.name == name))
    }
}

/// Link, generate DDL and compile every operation of a catalog
pub fn compile_catalog(catalog: &Catalog, config: &CompilerConfig) -> CompileResult<CompiledCatalog> {
    let linked = link(catalog)?;
    let ddl = DdlGenerator::new(config.dialect)
        .with_schema_creation(config.create_schemas)
        .generate(&linked)?;

    let compiler = QueryCompiler::new(config.dialect);
    let mut tables = Vec::with_capacity(linked.len());
    for table in linked.ordered() {
        tables.push(CompiledTable {
            table: table.schema.qualified_name(),
            operations: compiler.compile_table(table.schema)?,
        });
    }

    info!(
        dialect = %config.dialect,
        tables = tables.len(),
        operations = tables.iter().map(|t| t.operations.len()).sum::<usize>(),
        "compiled catalog"
    );
    Ok(CompiledCatalog {
        dialect: config.dialect,
        ddl,
        tables,
    })
}
