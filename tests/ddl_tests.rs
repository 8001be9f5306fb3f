//! DDL generation tests
//!
//! Generates full scripts for the shared social catalog in both dialects and
//! checks statement order, constraint naming and view rendering.

mod common;

use pretty_assertions::assert_eq;
use sqlforge::sql::{
    link, Catalog, ColumnSchema, CompileError, DdlGenerator, ScalarKind, SqlDialect, TableSchema,
};

fn generate(catalog: &Catalog, dialect: SqlDialect) -> Vec<String> {
    let linked = link(catalog).unwrap();
    DdlGenerator::new(dialect).generate(&linked).unwrap()
}

#[test]
fn test_postgres_users_table() {
    let ddl = generate(&common::social_catalog(), SqlDialect::Postgres);
    assert_eq!(ddl.len(), 4);
    assert_eq!(
        ddl[0],
        "CREATE TABLE IF NOT EXISTS \"USERS\" (\n\
         \x20   \"USER_ID\" BIGINT NOT NULL,\n\
         \x20   \"USERNAME\" VARCHAR(32) NOT NULL,\n\
         \x20   \"PHONE_NUMBER\" VARCHAR(20),\n\
         \x20   \"EMAIL\" VARCHAR ARRAY,\n\
         \x20   \"DEVICE_IDS\" BIGINT ARRAY,\n\
         \x20   \"ROLE\" VARCHAR(16) DEFAULT 'MEMBER' NOT NULL,\n\
         \x20   \"BADGES\" VARCHAR(16) ARRAY,\n\
         \x20   CONSTRAINT \"USERS_PK\" PRIMARY KEY (\"USER_ID\"),\n\
         \x20   CONSTRAINT \"USERS_USERNAME_UK\" UNIQUE (\"USERNAME\"),\n\
         \x20   CONSTRAINT \"USERS_USERNAME_PHONE_NUMBER_UK\" UNIQUE (\"USERNAME\", \"PHONE_NUMBER\")\n\
         )"
    );
}

#[test]
fn test_postgres_device_table() {
    let ddl = generate(&common::social_catalog(), SqlDialect::Postgres);
    assert_eq!(
        ddl[1],
        "CREATE TABLE IF NOT EXISTS \"DEVICE\" (\n\
         \x20   \"ID\" BIGINT NOT NULL,\n\
         \x20   \"OWNER_ID\" BIGINT NOT NULL,\n\
         \x20   \"NAME_STR\" VARCHAR(64) NOT NULL,\n\
         \x20   \"NUMERIC\" NUMERIC(10,6),\n\
         \x20   \"COLOR\" VARCHAR,\n\
         \x20   CONSTRAINT \"DEVICE_PK\" PRIMARY KEY (\"ID\"),\n\
         \x20   CONSTRAINT \"DEVICE_OWNER_ID_FK\" FOREIGN KEY (\"OWNER_ID\") REFERENCES \"USERS\" (\"USER_ID\")\n\
         )"
    );
}

#[test]
fn test_friend_constraints() {
    let ddl = generate(&common::social_catalog(), SqlDialect::Postgres);
    let friend = &ddl[2];
    assert!(friend.starts_with("CREATE TABLE IF NOT EXISTS \"FRIEND\" ("));
    assert!(friend.contains("\"ACCEPT\" BOOLEAN,"));
    assert!(!friend.contains("PRIMARY KEY"));
    assert!(friend.contains(
        "CONSTRAINT \"FRIEND_USER_ID_FRIEND_ID_UK\" UNIQUE (\"USER_ID\", \"FRIEND_ID\")"
    ));
    assert!(friend.contains(
        "CONSTRAINT \"FRIEND_USER_ID_FK\" FOREIGN KEY (\"USER_ID\") REFERENCES \"USERS\" (\"USER_ID\")"
    ));
    assert!(friend.contains(
        "CONSTRAINT \"FRIEND_FRIEND_ID_FK\" FOREIGN KEY (\"FRIEND_ID\") REFERENCES \"USERS\" (\"USER_ID\")"
    ));
}

#[test]
fn test_view_over_base_and_join() {
    let ddl = generate(&common::social_catalog(), SqlDialect::Postgres);
    assert_eq!(
        ddl[3],
        "CREATE OR REPLACE VIEW \"FRIEND_VIEW\" AS SELECT B.\"USER_ID\", B.\"FRIEND_ID\", B.\"ACCEPT\", \"USERS\".\"USERNAME\" AS \"FRIEND_NAME\"\n\
         FROM \"FRIEND\" B\n\
         JOIN \"USERS\" ON B.\"FRIEND_ID\" = \"USERS\".\"USER_ID\""
    );
}

#[test]
fn test_sqlite_view_prefix() {
    let catalog = Catalog::new()
        .with_table(common::friend_view())
        .with_table(common::friend())
        .with_table(
            TableSchema::new("USERS")
                .with_column(ColumnSchema::new("userId", ScalarKind::Long).primary_key())
                .with_column(ColumnSchema::new("username", ScalarKind::String)),
        );
    let ddl = generate(&catalog, SqlDialect::Sqlite);
    assert_eq!(ddl.len(), 3);
    assert!(ddl[2].starts_with("CREATE VIEW IF NOT EXISTS \"FRIEND_VIEW\" AS SELECT"));
    assert!(ddl[1].contains("\"ACCEPT\" INTEGER,"));
    assert!(ddl[0].contains("\"USERNAME\" TEXT"));
}

#[test]
fn test_sqlite_rejects_array_columns() {
    let linked_catalog = common::social_catalog();
    let linked = link(&linked_catalog).unwrap();
    let err = DdlGenerator::new(SqlDialect::Sqlite)
        .generate(&linked)
        .unwrap_err();
    assert!(matches!(
        err,
        CompileError::UnsupportedColumnType { ref column, .. } if column == "EMAIL"
    ));
}

#[test]
fn test_view_column_must_resolve() {
    let view = TableSchema::view("BAD_VIEW", "FRIEND")
        .with_column(ColumnSchema::new("userId", ScalarKind::Long))
        .with_column(ColumnSchema::new("nickname", ScalarKind::String));
    let catalog = Catalog::new()
        .with_table(common::users())
        .with_table(common::friend())
        .with_table(view);
    let linked = link(&catalog).unwrap();
    let err = DdlGenerator::new(SqlDialect::Postgres)
        .generate(&linked)
        .unwrap_err();
    assert_eq!(
        err,
        CompileError::ViewColumnNotFound {
            view: "BAD_VIEW".into(),
            field: "nickname".into(),
        }
    );
}

fn namespaced_catalog() -> Catalog {
    Catalog::new()
        .with_table(
            TableSchema::new("LOG")
                .with_namespace("audit")
                .with_column(ColumnSchema::new("id", ScalarKind::Long).primary_key())
                .with_column(
                    ColumnSchema::new("deviceId", ScalarKind::Long).references_field("DEVICE", "id"),
                ),
        )
        .with_table(
            TableSchema::new("DEVICE")
                .with_column(ColumnSchema::new("id", ScalarKind::Long).primary_key())
                .with_column(
                    ColumnSchema::new("ownerId", ScalarKind::Long)
                        .references_field("app.USERS", "userId"),
                ),
        )
        .with_table(
            TableSchema::new("USERS")
                .with_namespace("app")
                .with_column(ColumnSchema::new("userId", ScalarKind::Long).primary_key()),
        )
}

#[test]
fn test_namespaces_postgres() {
    let ddl = generate(&namespaced_catalog(), SqlDialect::Postgres);
    assert_eq!(ddl[0], "CREATE SCHEMA IF NOT EXISTS \"app\"");
    assert_eq!(ddl[1], "CREATE SCHEMA IF NOT EXISTS \"audit\"");
    assert!(ddl[2].starts_with("CREATE TABLE IF NOT EXISTS \"app\".\"USERS\" ("));
    assert!(ddl[3].contains("REFERENCES \"app\".\"USERS\" (\"USER_ID\")"));
    assert!(ddl[4].starts_with("CREATE TABLE IF NOT EXISTS \"audit\".\"LOG\" ("));
    assert!(ddl[4].contains(
        "CONSTRAINT \"LOG_DEVICE_ID_FK\" FOREIGN KEY (\"DEVICE_ID\") REFERENCES \"public\".\"DEVICE\" (\"ID\")"
    ));
}

#[test]
fn test_namespaces_skipped() {
    let catalog = namespaced_catalog();
    let linked = link(&catalog).unwrap();

    let postgres = DdlGenerator::new(SqlDialect::Postgres)
        .with_schema_creation(false)
        .generate(&linked)
        .unwrap();
    assert_eq!(postgres.len(), 3);
    assert!(postgres.iter().all(|s| !s.starts_with("CREATE SCHEMA")));

    let sqlite = DdlGenerator::new(SqlDialect::Sqlite).generate(&linked).unwrap();
    assert_eq!(sqlite.len(), 3);
    assert!(sqlite[0].starts_with("CREATE TABLE IF NOT EXISTS \"USERS\" ("));
    assert!(sqlite[2].contains("REFERENCES \"DEVICE\" (\"ID\")"));
}

#[test]
fn test_script_and_drop() {
    let catalog = common::social_catalog();
    let linked = link(&catalog).unwrap();
    let generator = DdlGenerator::new(SqlDialect::Postgres);

    let script = generator.generate_script(&linked).unwrap();
    assert_eq!(script.matches(";\n\n").count(), 4);
    assert!(script.ends_with(";\n\n"));

    assert_eq!(
        generator.generate_drop(&linked),
        vec![
            "DROP VIEW IF EXISTS \"FRIEND_VIEW\"".to_string(),
            "DROP TABLE IF EXISTS \"FRIEND\"".to_string(),
            "DROP TABLE IF EXISTS \"DEVICE\"".to_string(),
            "DROP TABLE IF EXISTS \"USERS\"".to_string(),
        ]
    );
}
