//! Data-access operation descriptors
//!
//! One [`OperationSpec`] describes one repository method: what kind of
//! statement it is, what it returns and how each parameter binds to columns.

use serde::{Deserialize, Serialize};

use super::schema::ScalarKind;

/// Kind of statement an operation compiles to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Insert,
    BatchInsert,
    Update,
    Delete,
    Count,
    Exists,
    SelectEntity,
    SelectColumn,
    SelectRawExpression,
}

impl OperationKind {
    pub fn is_insert(&self) -> bool {
        matches!(self, OperationKind::Insert | OperationKind::BatchInsert)
    }

    pub fn is_select(&self) -> bool {
        matches!(
            self,
            OperationKind::SelectEntity
                | OperationKind::SelectColumn
                | OperationKind::SelectRawExpression
        )
    }
}

/// Declared return shape of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnShape {
    Void,
    Bool,
    Int,
    /// A single row (entity or column value), possibly absent
    One,
    /// A list of rows
    Many,
}

/// Role of a parameter in an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingRole {
    #[default]
    WhereFilter,
    UpdateValue,
    InsertValue,
}

/// A field of a composite parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeField {
    pub name: String,
    pub kind: ScalarKind,
    #[serde(default)]
    pub is_array: bool,
    /// Ignored when binding
    #[serde(default)]
    pub skip: bool,
}

impl CompositeField {
    pub fn new(name: impl Into<String>, kind: ScalarKind) -> Self {
        Self {
            name: name.into(),
            kind,
            is_array: false,
            skip: false,
        }
    }

    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    pub fn skipped(mut self) -> Self {
        self.skip = true;
        self
    }
}

/// Type of a parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamType {
    Scalar {
        kind: ScalarKind,
        #[serde(default)]
        is_array: bool,
    },
    /// Structured value whose fields each bind to a same-named column
    Composite { fields: Vec<CompositeField> },
    /// A whole row of the operation's table
    Entity,
}

/// How one parameter feeds into the generated SQL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamBinding {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    #[serde(default)]
    pub role: BindingRole,
    /// Explicit target fields; several targets are matched disjunctively
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
    /// Bind to this field instead of the one named like the parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_alias: Option<String>,
    #[serde(default = "default_operator")]
    pub operator: String,
    #[serde(default)]
    pub ignore_case: bool,
}

fn default_operator() -> String {
    "=".to_string()
}

impl ParamBinding {
    fn with_type(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            role: BindingRole::WhereFilter,
            targets: Vec::new(),
            field_alias: None,
            operator: default_operator(),
            ignore_case: false,
        }
    }

    pub fn scalar(name: impl Into<String>, kind: ScalarKind) -> Self {
        Self::with_type(
            name,
            ParamType::Scalar {
                kind,
                is_array: false,
            },
        )
    }

    pub fn array(name: impl Into<String>, kind: ScalarKind) -> Self {
        Self::with_type(
            name,
            ParamType::Scalar {
                kind,
                is_array: true,
            },
        )
    }

    pub fn composite(name: impl Into<String>, fields: Vec<CompositeField>) -> Self {
        Self::with_type(name, ParamType::Composite { fields })
    }

    pub fn entity(name: impl Into<String>) -> Self {
        Self::with_type(name, ParamType::Entity)
    }

    /// Match the parameter against these fields
    pub fn matching(mut self, fields: &[&str]) -> Self {
        self.targets = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn as_field(mut self, field: impl Into<String>) -> Self {
        self.field_alias = Some(field.into());
        self
    }

    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = operator.into();
        self
    }

    pub fn ignoring_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    pub fn with_role(mut self, role: BindingRole) -> Self {
        self.role = role;
        self
    }

    /// Structured values bind one column per field
    pub fn is_composite(&self) -> bool {
        !matches!(self.ty, ParamType::Scalar { .. })
    }

    pub fn is_default_equality(&self) -> bool {
        self.operator.trim() == "="
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conjunction {
    #[default]
    And,
    Or,
}

impl Conjunction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Conjunction::And => "AND",
            Conjunction::Or => "OR",
        }
    }
}

/// Literal SQL appended to the generated WHERE clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPredicate {
    pub sql: String,
    #[serde(default)]
    pub conjunction: Conjunction,
}

/// One data-access method
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSpec {
    pub name: String,
    pub kind: OperationKind,
    pub returns: ReturnShape,
    #[serde(default)]
    pub params: Vec<ParamBinding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_predicate: Option<RawPredicate>,
    /// Field selected by a column-returning operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_column: Option<String>,
    /// Select-list expression of a raw-expression operation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_expression: Option<String>,
}

impl OperationSpec {
    pub fn new(name: impl Into<String>, kind: OperationKind, returns: ReturnShape) -> Self {
        Self {
            name: name.into(),
            kind,
            returns,
            params: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            raw_predicate: None,
            return_column: None,
            return_expression: None,
        }
    }

    pub fn param(mut self, binding: ParamBinding) -> Self {
        self.params.push(binding);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Append raw SQL to the WHERE clause with `AND`
    pub fn raw_predicate(self, sql: impl Into<String>) -> Self {
        self.raw_predicate_with(sql, Conjunction::And)
    }

    pub fn raw_predicate_with(mut self, sql: impl Into<String>, conjunction: Conjunction) -> Self {
        self.raw_predicate = Some(RawPredicate {
            sql: sql.into(),
            conjunction,
        });
        self
    }

    pub fn return_column(mut self, field: impl Into<String>) -> Self {
        self.return_column = Some(field.into());
        self
    }

    pub fn return_expression(mut self, sql: impl Into<String>) -> Self {
        self.return_expression = Some(sql.into());
        self
    }

    pub fn returns_list(&self) -> bool {
        self.returns == ReturnShape::Many
    }

    pub fn param_named(&self, name: &str) -> Option<&ParamBinding> {
        self.params.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let op = OperationSpec::new("findByName", OperationKind::SelectEntity, ReturnShape::Many)
            .param(ParamBinding::scalar("name", ScalarKind::String).ignoring_case())
            .order_by("id", Direction::Desc)
            .limit(10);

        assert!(op.returns_list());
        let param = op.param_named("name").unwrap();
        assert!(param.is_default_equality());
        assert!(param.ignore_case);
        assert_eq!(param.role, BindingRole::WhereFilter);
        assert_eq!(op.order_by[0].direction.as_sql(), "DESC");
    }

    #[test]
    fn test_operation_from_json() {
        let json = r#"{
            "name": "getFriendIds",
            "kind": "select_raw_expression",
            "returns": "many",
            "params": [
                {"name": "userId", "type": {"type": "scalar", "kind": "long"},
                 "targets": ["userId", "friendId"]}
            ],
            "raw_predicate": {"sql": "ACCEPT = TRUE"},
            "return_expression": "CASE WHEN USER_ID = :userId THEN FRIEND_ID ELSE USER_ID END"
        }"#;
        let op: OperationSpec = serde_json::from_str(json).unwrap();
        assert_eq!(op.kind, OperationKind::SelectRawExpression);
        assert_eq!(op.params[0].operator, "=");
        assert_eq!(op.params[0].targets, vec!["userId", "friendId"]);
        assert_eq!(op.raw_predicate.unwrap().conjunction, Conjunction::And);
    }
}
