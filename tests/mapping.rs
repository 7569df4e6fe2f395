//! Cross-component checks: the SQL builder and the row reconstructor must
//! agree on the alias scheme, bind orders must line up with statement
//! placeholders, and row state must track the documented lifecycle.

use rowbridge::{
    reconstruct, ColumnFlags, RawRow, RelationLoad, Row, SchemaRegistry, SqlType, TableDescriptor,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// user -> group -> realm over DIRECT relations (three levels once the
/// permission relation on each table is counted), plus post with a lazy
/// foreign key back to user.
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
    let user = reg
        .register(
            TableDescriptor::builder("user")
                .column("user_name", SqlType::Varchar(255), ColumnFlags::new().unique())
                .one_to_one("group_id", group, RelationLoad::Direct, ColumnFlags::new().nullable()),
        )
        .unwrap();
    reg.register(
        TableDescriptor::builder("post")
            .column("title", SqlType::Varchar(255), ColumnFlags::new())
            .one_to_one("author_id", user, RelationLoad::Lazy, ColumnFlags::new()),
    )
    .unwrap();
    reg
}

/// Pull every select-list label (`AS \`alias.column\``) out of a statement.
fn harvest_labels(sql: &str) -> Vec<(String, String)> {
    let mut labels = Vec::new();
    let mut rest = sql;
    while let Some(pos) = rest.find("AS `") {
        let tail = &rest[pos + 4..];
        let Some(end) = tail.find('`') else { break };
        let label = &tail[..end];
        if let Some((alias, column)) = label.split_once('.') {
            labels.push((alias.to_string(), column.to_string()));
        }
        rest = &tail[end..];
    }
    labels
}

/// Walk an alias path back to its table by following relation columns.
fn resolve_table(root: &Arc<TableDescriptor>, alias: &str) -> Arc<TableDescriptor> {
    let mut table = root.clone();
    let path = alias.strip_prefix(root.name()).unwrap_or(alias).to_string();
    for part in path.split("__").filter(|p| !p.is_empty()) {
        let next = {
            let (_, column) = table.column(part).expect("alias path names a column");
            let (ref_table, _) = column.relation().expect("alias path crosses a relation");
            ref_table.clone()
        };
        table = next;
    }
    table
}

fn synthetic_value(ty: &SqlType, seed: i64) -> Value {
    match ty {
        SqlType::Int | SqlType::BigInt => json!(seed),
        SqlType::Double => json!(seed as f64),
        SqlType::Boolean => json!(true),
        SqlType::Json => json!({"seed": seed}),
        _ => json!(format!("v{}", seed)),
    }
}

#[test]
fn compiler_and_reconstructor_agree_on_aliases() {
    let reg = fixture();
    let user = reg.get("user").unwrap();
    let sql = rowbridge::sql::select_single(user);

    // Distinct aliases at every nesting level, harvested from the statement
    // itself rather than re-derived.
    let labels = harvest_labels(&sql);
    let aliases: std::collections::HashSet<_> =
        labels.iter().map(|(a, _)| a.clone()).collect();
    assert!(aliases.contains("user"));
    assert!(aliases.contains("user__group_id"));
    assert!(aliases.contains("user__group_id__realm_id"));
    assert!(aliases.contains("user__group_id__realm_id__permission_id"));

    // Feed a raw row keyed exactly by the harvested labels back through the
    // reconstructor.
    let mut raw = RawRow::new();
    for (alias, column) in &labels {
        let table = resolve_table(user, alias);
        let (_, c) = table.column(column).expect("label names a column");
        raw.insert(alias, column, synthetic_value(&c.ty, 1));
    }
    let row = reconstruct(&raw, user, "user").expect("reconstruction succeeds");
    assert_eq!(row.primary_key(), Some(1));
    let group = row.embedded("group_id").expect("group embedded");
    let realm = group.embedded("realm_id").expect("realm embedded");
    assert_eq!(realm.get("realm_name"), Some(&json!("v1")));
    assert!(realm.permission().is_some());
}

#[test]
fn insert_placeholders_match_bind_order() {
    let reg = fixture();
    let post = reg.get("post").unwrap();
    let sql = rowbridge::sql::insert(post);
    let placeholders = sql.matches('?').count();
    assert_eq!(placeholders, post.columns().len());

    let sql = rowbridge::sql::update(post);
    // Every column except pk and permission, plus the trailing pk.
    assert_eq!(sql.matches('?').count(), post.columns().len() - 1);
}

#[test]
fn one_to_many_stays_empty_until_expansion() {
    let mut reg = SchemaRegistry::new();
    let child = reg.register(TableDescriptor::builder("child")).unwrap();
    let parent = reg
        .register(TableDescriptor::builder("parent").one_to_many("children", child, "parent_id"))
        .unwrap();
    let mut raw = RawRow::new();
    raw.insert("parent", "parent_id", json!(1));
    raw.insert("parent", "permission_id", json!(2));
    raw.insert("parent__permission_id", "permission_id", json!(2));
    raw.insert("parent__permission_id", "read_level", json!(0));
    raw.insert("parent__permission_id", "write_level", json!(0));
    raw.insert("parent__permission_id", "delete_level", json!(0));
    let row = reconstruct(&raw, &parent, "parent").unwrap();
    assert!(row.children("children").is_empty());

    let out = row.to_json();
    assert_eq!(out["children"], json!([]));
    assert_eq!(out["permission_id"]["read_level"], json!(0));
}

#[test]
fn child_select_filters_by_the_declared_foreign_key() {
    let reg = fixture();
    let post = reg.get("post").unwrap().clone();
    let relation = rowbridge::OneToManyDescriptor {
        name: "posts".into(),
        ref_table: post,
        ref_column: "author_id".into(),
    };
    let sql = rowbridge::sql::child_select(&relation);
    assert!(sql.ends_with("WHERE `post`.`author_id` = ?"));
    // The child's own DIRECT permission relation still joins.
    assert!(sql.contains("LEFT JOIN `permission` AS `post__permission_id`"));
}

#[test]
fn row_json_round_trip_honors_flags() {
    let mut reg = SchemaRegistry::new();
    let user = reg
        .register(
            TableDescriptor::builder("user")
                .column("user_name", SqlType::Varchar(255), ColumnFlags::new())
                .column("secret", SqlType::Text, ColumnFlags::new().private())
                .column("joined", SqlType::DateTime, ColumnFlags::new().readonly()),
        )
        .unwrap();
    let mut row = Row::new(user);
    row.apply_json(
        &json!({"user_name": "alice", "secret": "s", "joined": "2024-01-01T00:00:00"}),
        false,
    )
    .unwrap();
    let out = row.to_json();
    assert_eq!(out["user_name"], json!("alice"));
    assert!(out.get("secret").is_none());

    // Update input may not touch readonly columns.
    let err = row
        .apply_json(&json!({"joined": "2025-01-01T00:00:00"}), true)
        .unwrap_err();
    assert!(matches!(err, rowbridge::BridgeError::ReadonlyColumn { .. }));
}
