//! Rebuilds typed object graphs from flat joined result rows.

use crate::error::BridgeError;
use crate::schema::{ColumnKind, RelationLoad, Row, TableDescriptor};
use crate::sql::{alias, cell_to_value};
use serde_json::Value;
use sqlx::mysql::MySqlRow;
use std::collections::HashMap;
use std::sync::Arc;

/// One raw result row, demultiplexed by join alias: alias -> physical
/// column name -> value. Built from the `alias.column` select-list labels
/// the SQL builder emits.
#[derive(Clone, Debug, Default)]
pub struct RawRow {
    groups: HashMap<String, HashMap<String, Value>>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, alias_name: &str, column: &str, value: Value) {
        self.groups
            .entry(alias_name.to_string())
            .or_default()
            .insert(column.to_string(), value);
    }

    pub fn from_sql_row(row: &MySqlRow) -> Self {
        use sqlx::{Column, Row};
        let mut raw = RawRow::new();
        for col in row.columns() {
            let Some((alias_name, column)) = alias::split_label(col.name()) else {
                continue;
            };
            raw.insert(alias_name, column, cell_to_value(row, col.name()));
        }
        raw
    }

    pub fn group(&self, alias_name: &str) -> Option<&HashMap<String, Value>> {
        self.groups.get(alias_name)
    }
}

/// Rebuild one row instance of `table` from the alias group `alias_name`,
/// recursing through DIRECT relations with the shared alias scheme. Scalar
/// columns are type-checked; a missing value on a non-nullable column and a
/// validator mismatch both fail the whole reconstruction.
pub fn reconstruct(
    raw: &RawRow,
    table: &Arc<TableDescriptor>,
    alias_name: &str,
) -> Result<Row, BridgeError> {
    let empty = HashMap::new();
    let group = raw.group(alias_name).unwrap_or(&empty);
    let mut row = Row::new(table.clone());
    for (i, c) in table.columns().iter().enumerate() {
        let value = group.get(&c.name);
        let value = match value {
            Some(v) if !v.is_null() => v.clone(),
            _ => {
                if !c.flags.nullable && value.is_none() {
                    return Err(BridgeError::MissingColumnData {
                        table: table.name().to_string(),
                        column: c.name.clone(),
                    });
                }
                Value::Null
            }
        };
        if !c.ty.accepts(&value) {
            return Err(BridgeError::TypeMismatch {
                table: table.name().to_string(),
                column: c.name.clone(),
                expected: c.ty.sql_name(),
            });
        }
        match &c.kind {
            ColumnKind::OneToOne {
                ref_table,
                load: RelationLoad::Direct,
            } if !value.is_null() => {
                let child_alias = alias::child(alias_name, &c.name);
                let child = reconstruct(raw, ref_table, &child_alias)?;
                row.set_raw(i, value);
                row.set_embedded(i, child);
            }
            // Lazy relations and null foreign keys keep the key only; the
            // relation stays unresolved.
            _ => row.set_raw(i, value),
        }
    }
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnFlags, RelationLoad, SchemaRegistry, SqlType, TableDescriptor};
    use serde_json::json;

    fn fixture() -> SchemaRegistry {
        let mut reg = SchemaRegistry::new();
        let realm = reg
            .register(TableDescriptor::builder("realm").column(
                "realm_name",
                SqlType::Varchar(64),
                ColumnFlags::new(),
            ))
            .unwrap();
        let group = reg
            .register(
                TableDescriptor::builder("group")
                    .column("group_name", SqlType::Varchar(64), ColumnFlags::new())
                    .one_to_one("realm_id", realm, RelationLoad::Direct, ColumnFlags::new().nullable()),
            )
            .unwrap();
        reg.register(
            TableDescriptor::builder("user")
                .column("user_name", SqlType::Varchar(255), ColumnFlags::new())
                .one_to_one("group_id", group, RelationLoad::Direct, ColumnFlags::new().nullable()),
        )
        .unwrap();
        reg
    }

    fn permission_group(raw: &mut RawRow, alias_name: &str, id: i64) {
        raw.insert(alias_name, "permission_id", json!(id));
        raw.insert(alias_name, "read_level", json!(0));
        raw.insert(alias_name, "write_level", json!(0));
        raw.insert(alias_name, "delete_level", json!(0));
    }

    #[test]
    fn reconstructs_scalars_and_nested_directs() {
        let reg = fixture();
        let user = reg.get("user").unwrap();
        let mut raw = RawRow::new();
        raw.insert("user", "user_id", json!(1));
        raw.insert("user", "permission_id", json!(10));
        raw.insert("user", "user_name", json!("alice"));
        raw.insert("user", "group_id", json!(2));
        permission_group(&mut raw, "user__permission_id", 10);
        raw.insert("user__group_id", "group_id", json!(2));
        raw.insert("user__group_id", "permission_id", json!(11));
        raw.insert("user__group_id", "group_name", json!("admins"));
        raw.insert("user__group_id", "realm_id", json!(3));
        permission_group(&mut raw, "user__group_id__permission_id", 11);
        raw.insert("user__group_id__realm_id", "realm_id", json!(3));
        raw.insert("user__group_id__realm_id", "permission_id", json!(12));
        raw.insert("user__group_id__realm_id", "realm_name", json!("earth"));
        permission_group(&mut raw, "user__group_id__realm_id__permission_id", 12);

        let row = reconstruct(&raw, user, "user").unwrap();
        assert_eq!(row.primary_key(), Some(1));
        assert_eq!(row.get("user_name"), Some(&json!("alice")));
        let group = row.embedded("group_id").unwrap();
        assert_eq!(group.get("group_name"), Some(&json!("admins")));
        let realm = group.embedded("realm_id").unwrap();
        assert_eq!(realm.get("realm_name"), Some(&json!("earth")));
        assert_eq!(realm.permission_key(), Some(12));
    }

    #[test]
    fn null_foreign_key_leaves_relation_unresolved() {
        let reg = fixture();
        let user = reg.get("user").unwrap();
        let mut raw = RawRow::new();
        raw.insert("user", "user_id", json!(1));
        raw.insert("user", "permission_id", json!(10));
        raw.insert("user", "user_name", json!("bob"));
        raw.insert("user", "group_id", Value::Null);
        permission_group(&mut raw, "user__permission_id", 10);

        let row = reconstruct(&raw, user, "user").unwrap();
        assert_eq!(row.get("group_id"), Some(&Value::Null));
        assert!(row.embedded("group_id").is_none());
    }

    #[test]
    fn missing_non_nullable_column_fails() {
        let reg = fixture();
        let user = reg.get("user").unwrap();
        let mut raw = RawRow::new();
        raw.insert("user", "user_id", json!(1));
        raw.insert("user", "permission_id", json!(10));
        permission_group(&mut raw, "user__permission_id", 10);

        let err = reconstruct(&raw, user, "user").unwrap_err();
        assert!(
            matches!(err, BridgeError::MissingColumnData { ref column, .. } if column == "user_name")
        );
    }

    #[test]
    fn type_mismatch_fails() {
        let reg = fixture();
        let user = reg.get("user").unwrap();
        let mut raw = RawRow::new();
        raw.insert("user", "user_id", json!(1));
        raw.insert("user", "permission_id", json!(10));
        raw.insert("user", "user_name", json!(42));
        raw.insert("user", "group_id", Value::Null);
        permission_group(&mut raw, "user__permission_id", 10);

        let err = reconstruct(&raw, user, "user").unwrap_err();
        assert!(
            matches!(err, BridgeError::TypeMismatch { ref column, .. } if column == "user_name")
        );
    }

    #[test]
    fn lazy_relation_only_receives_the_key() {
        let mut reg = SchemaRegistry::new();
        let user = reg.register(TableDescriptor::builder("user")).unwrap();
        let session = reg
            .register(TableDescriptor::builder("session").one_to_one(
                "user_id",
                user,
                RelationLoad::Lazy,
                ColumnFlags::new(),
            ))
            .unwrap();
        let mut raw = RawRow::new();
        raw.insert("session", "session_id", json!(4));
        raw.insert("session", "permission_id", json!(9));
        raw.insert("session", "user_id", json!(7));
        permission_group(&mut raw, "session__permission_id", 9);

        let row = reconstruct(&raw, &session, "session").unwrap();
        assert_eq!(row.get("user_id"), Some(&json!(7)));
        assert!(row.embedded("user_id").is_none());
    }

    #[test]
    fn one_to_many_collections_start_empty() {
        let mut reg = SchemaRegistry::new();
        let post = reg.register(TableDescriptor::builder("post")).unwrap();
        let user = reg
            .register(TableDescriptor::builder("user").one_to_many("posts", post, "user_id"))
            .unwrap();
        let mut raw = RawRow::new();
        raw.insert("user", "user_id", json!(1));
        raw.insert("user", "permission_id", json!(2));
        permission_group(&mut raw, "user__permission_id", 2);

        let row = reconstruct(&raw, &user, "user").unwrap();
        assert!(row.children("posts").is_empty());
    }
}
