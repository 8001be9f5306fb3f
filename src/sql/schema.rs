//! Entity metadata model: tables, views, columns and their keys
//!
//! The model is built once by a front end (or deserialized from JSON) and is
//! read-only afterwards. Resolved cross-table links live in
//! [`LinkedSchema`](super::linker::LinkedSchema), not here.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::operation::OperationSpec;

/// Scalar kind of a column (or of an array column's elements)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
    String,
    /// Stored by constant name
    Enum,
    /// Binary blob
    Bytes,
    Date,
    Timestamp,
}

impl ScalarKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarKind::Bool => "bool",
            ScalarKind::Byte => "byte",
            ScalarKind::Short => "short",
            ScalarKind::Int => "int",
            ScalarKind::Long => "long",
            ScalarKind::Float => "float",
            ScalarKind::Double => "double",
            ScalarKind::Char => "char",
            ScalarKind::String => "string",
            ScalarKind::Enum => "enum",
            ScalarKind::Bytes => "bytes",
            ScalarKind::Date => "date",
            ScalarKind::Timestamp => "timestamp",
        }
    }

    /// Whether default literals of this kind are rendered as quoted strings
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            ScalarKind::Char
                | ScalarKind::String
                | ScalarKind::Enum
                | ScalarKind::Date
                | ScalarKind::Timestamp
        )
    }

    /// Describe a (possibly array) type for diagnostics
    pub fn describe(&self, is_array: bool) -> String {
        if is_array {
            format!("{}[]", self.as_str())
        } else {
            self.as_str().to_string()
        }
    }
}

impl std::fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target of a join (foreign key) column
///
/// Exactly one of `column` and `field` must be given; the linker enforces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinTarget {
    /// Referenced table (physical name, optionally `namespace.name`)
    pub table: String,
    /// Referenced physical column name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Referenced field name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// Description of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Logical field name used by operations and references
    pub field: String,
    /// Physical column name; derived from `field` when empty
    #[serde(default)]
    pub name: String,
    /// Physical name of the owning table, set when the column is added
    #[serde(default, skip_serializing)]
    pub owner_table: String,
    pub kind: ScalarKind,
    #[serde(default)]
    pub is_array: bool,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_literal: Option<String>,
    /// Name of the id generator used at insert time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_generator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<JoinTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u8>,
    /// Verbatim SQL type, replacing the synthesized one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ColumnSchema {
    /// Create a nullable column whose physical name is derived from the field
    pub fn new(field: impl Into<String>, kind: ScalarKind) -> Self {
        let field = field.into();
        let name = to_column_name(&field);
        Self {
            field,
            name,
            owner_table: String::new(),
            kind,
            is_array: false,
            nullable: true,
            primary_key: false,
            unique: false,
            default_literal: None,
            id_generator: None,
            join: None,
            length: None,
            precision: None,
            scale: None,
            definition: None,
        }
    }

    /// Set the physical column name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make this an array of its scalar kind
    pub fn array(mut self) -> Self {
        self.is_array = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_default(mut self, literal: impl Into<String>) -> Self {
        self.default_literal = Some(literal.into());
        self
    }

    /// Values for this column are minted by the named generator at insert
    pub fn generated_by(mut self, generator: impl Into<String>) -> Self {
        self.id_generator = Some(generator.into());
        self
    }

    /// Reference a field of another table
    pub fn references_field(mut self, table: impl Into<String>, field: impl Into<String>) -> Self {
        self.join = Some(JoinTarget {
            table: table.into(),
            column: None,
            field: Some(field.into()),
        });
        self
    }

    /// Reference a physical column of another table
    pub fn references_column(
        mut self,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        self.join = Some(JoinTarget {
            table: table.into(),
            column: Some(column.into()),
            field: None,
        });
        self
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_precision(mut self, precision: u8, scale: Option<u8>) -> Self {
        self.precision = Some(precision);
        self.scale = scale;
        self
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }

    /// Effective nullability: primary keys and defaulted columns never are
    pub fn is_nullable(&self) -> bool {
        self.nullable && !self.primary_key && self.default_literal.is_none()
    }

    pub fn is_generated(&self) -> bool {
        self.id_generator.is_some()
    }

    pub fn is_foreign_key(&self) -> bool {
        self.join.is_some()
    }

    /// Whether a value of the given type may be bound to this column
    pub fn accepts(&self, kind: ScalarKind, is_array: bool) -> bool {
        self.kind == kind && self.is_array == is_array
    }
}

/// A named group of columns that must be unique together
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    /// Members given by field name
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    /// Members given by physical column name
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
}

impl UniqueConstraint {
    pub fn on_fields(fields: &[&str]) -> Self {
        Self {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            columns: Vec::new(),
        }
    }

    pub fn on_columns(columns: &[&str]) -> Self {
        Self {
            fields: Vec::new(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Description of a table or view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TableDef", into = "TableDef")]
pub struct TableSchema {
    /// Physical table name
    pub name: String,
    pub namespace: Option<String>,
    /// Columns keyed by field, in physical order
    columns: IndexMap<String, ColumnSchema>,
    pub unique_constraints: Vec<UniqueConstraint>,
    /// Base table when this schema describes a view
    pub view_of: Option<String>,
    pub operations: Vec<OperationSpec>,
    /// Physical names of columns rejected because their field was taken
    duplicate_columns: Vec<String>,
}

impl TableSchema {
    /// Create a table with an explicit physical name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            columns: IndexMap::new(),
            unique_constraints: Vec::new(),
            view_of: None,
            operations: Vec::new(),
            duplicate_columns: Vec::new(),
        }
    }

    /// Create a table named after an entity (`deviceLog` -> `DEVICE_LOG`)
    pub fn for_entity(entity: &str) -> Self {
        Self::new(to_column_name(entity))
    }

    /// Create a view over `base`
    pub fn view(name: impl Into<String>, base: impl Into<String>) -> Self {
        let mut table = Self::new(name);
        table.view_of = Some(base.into());
        table
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Add a column, filling in its owner and derived physical name
    ///
    /// A second column for an existing field is not added; the linker
    /// reports it as a duplicate.
    pub fn add_column(&mut self, mut column: ColumnSchema) {
        if column.name.is_empty() {
            column.name = to_column_name(&column.field);
        }
        if self.columns.contains_key(&column.field) {
            self.duplicate_columns.push(column.name);
            return;
        }
        column.owner_table = self.name.clone();
        self.columns.insert(column.field.clone(), column);
    }

    /// Columns dropped by [`add_column`](Self::add_column) for reusing a field
    pub fn duplicate_columns(&self) -> &[String] {
        &self.duplicate_columns
    }

    pub fn with_column(mut self, column: ColumnSchema) -> Self {
        self.add_column(column);
        self
    }

    pub fn with_unique(mut self, constraint: UniqueConstraint) -> Self {
        self.unique_constraints.push(constraint);
        self
    }

    pub fn add_operation(&mut self, operation: OperationSpec) {
        self.operations.push(operation);
    }

    pub fn with_operation(mut self, operation: OperationSpec) -> Self {
        self.add_operation(operation);
        self
    }

    /// Look up a column by field name
    pub fn column(&self, field: &str) -> Option<&ColumnSchema> {
        self.columns.get(field)
    }

    /// Look up a column by physical name
    pub fn column_by_name(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.values().find(|c| c.name == name)
    }

    /// Physical position of a column
    pub fn column_index(&self, field: &str) -> Option<usize> {
        self.columns.get_index_of(field)
    }

    /// Columns in physical order
    pub fn columns(&self) -> impl Iterator<Item = &ColumnSchema> {
        self.columns.values()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn primary_key(&self) -> Vec<&ColumnSchema> {
        self.columns.values().filter(|c| c.primary_key).collect()
    }

    pub fn is_view(&self) -> bool {
        self.view_of.is_some()
    }

    /// `namespace.name`, or just `name`
    pub fn qualified_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}.{}", ns, self.name),
            None => self.name.clone(),
        }
    }
}

/// Serialized form of a table: columns as a list, name optionally derived
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing)]
    entity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    #[serde(default)]
    columns: Vec<ColumnSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    unique_constraints: Vec<UniqueConstraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    view_of: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    operations: Vec<OperationSpec>,
}

impl TryFrom<TableDef> for TableSchema {
    type Error = String;

    fn try_from(def: TableDef) -> Result<Self, Self::Error> {
        let mut table = match (def.name, def.entity) {
            (Some(name), _) => TableSchema::new(name),
            (None, Some(entity)) => TableSchema::for_entity(&entity),
            (None, None) => return Err("table needs a `name` or an `entity`".to_string()),
        };
        table.namespace = def.namespace;
        table.view_of = def.view_of;
        table.unique_constraints = def.unique_constraints;
        table.operations = def.operations;
        for column in def.columns {
            table.add_column(column);
        }
        Ok(table)
    }
}

impl From<TableSchema> for TableDef {
    fn from(table: TableSchema) -> Self {
        TableDef {
            name: Some(table.name),
            entity: None,
            namespace: table.namespace,
            columns: table.columns.into_values().collect(),
            unique_constraints: table.unique_constraints,
            view_of: table.view_of,
            operations: table.operations,
        }
    }
}

/// All tables and views of one compilation run, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    tables: Vec<TableSchema>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, table: TableSchema) {
        self.tables.push(table);
    }

    pub fn with_table(mut self, table: TableSchema) -> Self {
        self.add_table(table);
        self
    }

    pub fn tables(&self) -> &[TableSchema] {
        &self.tables
    }

    /// Find a table by qualified name, falling back to the bare name
    pub fn table_index(&self, name: &str) -> Option<usize> {
        self.tables
            .iter()
            .position(|t| t.qualified_name() == name)
            .or_else(|| self.tables.iter().position(|t| t.name == name))
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.table_index(name).map(|i| &self.tables[i])
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Derive a physical name from a field or entity name
///
/// The first character is upper-cased; every later upper-case letter starts
/// a new `_`-separated word.
pub fn to_column_name(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && c.is_uppercase() {
            result.push('_');
        }
        result.extend(c.to_uppercase());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_name_derivation() {
        assert_eq!(to_column_name("ownerId"), "OWNER_ID");
        assert_eq!(to_column_name("id"), "ID");
        assert_eq!(to_column_name("Device"), "DEVICE");
        assert_eq!(to_column_name("phoneNumber"), "PHONE_NUMBER");
        assert_eq!(to_column_name("deviceIds"), "DEVICE_IDS");
    }

    #[test]
    fn test_nullability_invariant() {
        let pk = ColumnSchema::new("id", ScalarKind::Long).primary_key();
        assert!(!pk.is_nullable());

        let defaulted = ColumnSchema::new("status", ScalarKind::String).with_default("new");
        assert!(defaulted.nullable);
        assert!(!defaulted.is_nullable());

        let plain = ColumnSchema::new("name", ScalarKind::String);
        assert!(plain.is_nullable());
    }

    #[test]
    fn test_columns_keep_insertion_order() {
        let table = TableSchema::for_entity("device")
            .with_column(ColumnSchema::new("id", ScalarKind::Long).primary_key())
            .with_column(ColumnSchema::new("name", ScalarKind::String).with_name("NAME_STR"))
            .with_column(ColumnSchema::new("ownerId", ScalarKind::Long));

        assert_eq!(table.name, "DEVICE");
        let names: Vec<_> = table.columns().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["ID", "NAME_STR", "OWNER_ID"]);
        assert_eq!(table.column_index("ownerId"), Some(2));
        assert_eq!(table.column_by_name("NAME_STR").unwrap().field, "name");
        assert_eq!(table.column("id").unwrap().owner_table, "DEVICE");
    }

    #[test]
    fn test_qualified_lookup() {
        let catalog = Catalog::new()
            .with_table(TableSchema::new("USERS").with_namespace("app"))
            .with_table(TableSchema::new("DEVICE"));

        assert_eq!(catalog.table_index("app.USERS"), Some(0));
        assert_eq!(catalog.table_index("USERS"), Some(0));
        assert_eq!(catalog.table_index("DEVICE"), Some(1));
        assert!(catalog.table("MISSING").is_none());
    }

    #[test]
    fn test_catalog_from_json() {
        let json = r#"{
            "tables": [{
                "entity": "device",
                "columns": [
                    {"field": "id", "kind": "long", "primary_key": true, "id_generator": "snowflake"},
                    {"field": "ownerId", "kind": "long", "nullable": false,
                     "join": {"table": "USERS", "field": "userId"}},
                    {"field": "tags", "kind": "string", "is_array": true}
                ]
            }]
        }"#;
        let catalog = Catalog::from_json(json).unwrap();
        let device = catalog.table("DEVICE").unwrap();
        assert_eq!(device.column_count(), 3);
        let owner = device.column("ownerId").unwrap();
        assert_eq!(owner.name, "OWNER_ID");
        assert_eq!(owner.owner_table, "DEVICE");
        assert!(!owner.is_nullable());
        assert!(device.column("tags").unwrap().is_array);
        assert!(device.column("id").unwrap().is_generated());
    }

    #[test]
    fn test_table_needs_a_name() {
        let err = serde_json::from_str::<TableSchema>(r#"{"columns": []}"#).unwrap_err();
        assert!(err.to_string().contains("needs a `name`"));
    }
}
