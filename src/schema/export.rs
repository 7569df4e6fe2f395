//! JSON description of a table's model, for the schema introspection routes.

use crate::schema::table::{ColumnKind, RelationLoad, TableDescriptor};
use serde_json::{json, Map, Value};

/// Describe one table as a JSON object: column name to a descriptor with the
/// SQL/JSON type pair, the full flag set, and for relation columns the
/// referenced model and loading mode.
pub fn model_schema(table: &TableDescriptor) -> Value {
    let mut columns = Map::new();
    for c in table.columns() {
        let flags = json!({
            "auto_increment": c.flags.auto_increment,
            "nullable": c.flags.nullable,
            "unique": c.flags.unique,
            "readonly": c.flags.readonly,
            "private": c.flags.private,
            "primary_key": c.is_primary_key(),
        });
        let entry = match &c.kind {
            ColumnKind::OneToOne { ref_table, load } => json!({
                "type": "relation",
                "sql_type": c.ty.sql_name(),
                "json_type": c.ty.json_name(),
                "flags": flags,
                "ref": format!("/schema/models/{}", ref_table.name()),
                "loading_type": match load {
                    RelationLoad::Direct => "DIRECT",
                    RelationLoad::Lazy => "LAZY",
                },
            }),
            _ => json!({
                "type": "column",
                "sql_type": c.ty.sql_name(),
                "json_type": c.ty.json_name(),
                "flags": flags,
            }),
        };
        columns.insert(c.name.clone(), entry);
    }
    json!({
        "table": table.name(),
        "columns": columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::registry::SchemaRegistry;
    use crate::schema::types::{ColumnFlags, SqlType};

    #[test]
    fn exports_columns_and_relations() {
        let mut reg = SchemaRegistry::new();
        let user = reg
            .register(TableDescriptor::builder("user").column(
                "user_name",
                SqlType::Varchar(255),
                ColumnFlags::new().unique(),
            ))
            .unwrap();
        let schema = model_schema(&user);
        assert_eq!(schema["table"], "user");
        assert_eq!(schema["columns"]["user_id"]["flags"]["primary_key"], true);
        assert_eq!(schema["columns"]["user_name"]["flags"]["unique"], true);
        assert_eq!(schema["columns"]["permission_id"]["type"], "relation");
        assert_eq!(
            schema["columns"]["permission_id"]["ref"],
            "/schema/models/permission"
        );
        assert_eq!(schema["columns"]["permission_id"]["loading_type"], "DIRECT");
    }
}
