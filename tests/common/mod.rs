//! Shared catalog fixture: users, their devices and friendships

#![allow(dead_code)]

use sqlforge::sql::{
    Catalog, ColumnSchema, OperationKind, OperationSpec, ParamBinding, ReturnShape, ScalarKind,
    TableSchema, UniqueConstraint,
};

pub fn users() -> TableSchema {
    TableSchema::new("USERS")
        .with_column(
            ColumnSchema::new("userId", ScalarKind::Long)
                .primary_key()
                .generated_by("snowflake"),
        )
        .with_column(
            ColumnSchema::new("username", ScalarKind::String)
                .with_length(32)
                .not_null()
                .unique(),
        )
        .with_column(ColumnSchema::new("phoneNumber", ScalarKind::String).with_length(20))
        .with_column(ColumnSchema::new("email", ScalarKind::String).array())
        .with_column(ColumnSchema::new("deviceIds", ScalarKind::Long).array())
        .with_column(
            ColumnSchema::new("role", ScalarKind::Enum)
                .with_length(16)
                .with_default("MEMBER"),
        )
        .with_column(ColumnSchema::new("badges", ScalarKind::Enum).with_length(16).array())
        .with_unique(UniqueConstraint::on_fields(&["username", "phoneNumber"]))
}

pub fn device() -> TableSchema {
    TableSchema::new("DEVICE")
        .with_column(
            ColumnSchema::new("id", ScalarKind::Long)
                .primary_key()
                .generated_by("snowflake"),
        )
        .with_column(
            ColumnSchema::new("ownerId", ScalarKind::Long)
                .not_null()
                .references_field("USERS", "userId"),
        )
        .with_column(
            ColumnSchema::new("name", ScalarKind::String)
                .with_name("NAME_STR")
                .with_length(64)
                .not_null(),
        )
        .with_column(ColumnSchema::new("numeric", ScalarKind::Double).with_precision(10, Some(6)))
        .with_column(ColumnSchema::new("color", ScalarKind::String))
}

pub fn friend() -> TableSchema {
    TableSchema::new("FRIEND")
        .with_column(
            ColumnSchema::new("userId", ScalarKind::Long)
                .not_null()
                .references_field("USERS", "userId"),
        )
        .with_column(
            ColumnSchema::new("friendId", ScalarKind::Long)
                .not_null()
                .references_field("USERS", "userId"),
        )
        .with_column(ColumnSchema::new("accept", ScalarKind::Bool))
        .with_unique(UniqueConstraint::on_fields(&["userId", "friendId"]))
        .with_operation(get_friend_ids())
}

pub fn friend_view() -> TableSchema {
    TableSchema::view("FRIEND_VIEW", "FRIEND")
        .with_column(ColumnSchema::new("userId", ScalarKind::Long))
        .with_column(
            ColumnSchema::new("friendId", ScalarKind::Long).references_field("USERS", "userId"),
        )
        .with_column(ColumnSchema::new("accept", ScalarKind::Bool))
        .with_column(ColumnSchema::new("username", ScalarKind::String).with_name("FRIEND_NAME"))
}

/// Ids of everyone on the other side of an accepted friendship
pub fn get_friend_ids() -> OperationSpec {
    OperationSpec::new(
        "getFriendIds",
        OperationKind::SelectRawExpression,
        ReturnShape::Many,
    )
    .param(ParamBinding::scalar("userId", ScalarKind::Long).matching(&["userId", "friendId"]))
    .raw_predicate("ACCEPT = TRUE")
    .return_expression("CASE WHEN USER_ID = :userId THEN FRIEND_ID ELSE USER_ID END")
}

/// Declared out of dependency order on purpose
pub fn social_catalog() -> Catalog {
    Catalog::new()
        .with_table(friend_view())
        .with_table(device())
        .with_table(friend())
        .with_table(users())
}
