//! Schema registry: owns the shared permission descriptor and validates
//! tables at registration time.

use crate::error::SchemaError;
use crate::schema::table::{ColumnDescriptor, ColumnKind, TableBuilder, TableDescriptor};
use crate::schema::types::{ColumnFlags, SqlType};
use std::collections::HashMap;
use std::sync::Arc;

/// The authorization side-record every entity row owns one-to-one: access
/// levels for read, write and delete. Created before its owner row and
/// deleted after it, inside the owner's transaction.
pub fn permission_table() -> TableDescriptor {
    let level = |name: &str| ColumnDescriptor {
        name: name.into(),
        ty: SqlType::Int,
        flags: ColumnFlags::new(),
        kind: ColumnKind::Scalar,
    };
    TableDescriptor::from_parts(
        "permission".into(),
        vec![
            ColumnDescriptor {
                name: "permission_id".into(),
                ty: SqlType::BigInt,
                flags: ColumnFlags::new().auto_increment(),
                kind: ColumnKind::PrimaryKey,
            },
            level("read_level"),
            level("write_level"),
            level("delete_level"),
        ],
        Vec::new(),
        0,
        None,
    )
}

pub struct SchemaRegistry {
    permission: Arc<TableDescriptor>,
    tables: Vec<Arc<TableDescriptor>>,
    by_name: HashMap<String, Arc<TableDescriptor>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        SchemaRegistry {
            permission: Arc::new(permission_table()),
            tables: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn permission(&self) -> &Arc<TableDescriptor> {
        &self.permission
    }

    /// Finalize and register a table. Injects the primary key and the
    /// permission relation, then checks the DIRECT relation chain is
    /// acyclic. A cycle would make both SQL compilation and row
    /// reconstruction recurse without bound, so it is a registration error.
    pub fn register(&mut self, builder: TableBuilder) -> Result<Arc<TableDescriptor>, SchemaError> {
        let table = builder.finish(Some(self.permission.clone()))?;
        if self.by_name.contains_key(table.name()) || table.name() == self.permission.name() {
            return Err(SchemaError::DuplicateTable(table.name().to_string()));
        }
        check_direct_acyclic(&table, &mut Vec::new())?;
        let table = Arc::new(table);
        self.by_name.insert(table.name().to_string(), table.clone());
        self.tables.push(table.clone());
        Ok(table)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TableDescriptor>> {
        self.by_name.get(name)
    }

    /// Registered entity tables in registration order (excludes the
    /// permission table).
    pub fn tables(&self) -> &[Arc<TableDescriptor>] {
        &self.tables
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn check_direct_acyclic(table: &TableDescriptor, path: &mut Vec<String>) -> Result<(), SchemaError> {
    if path.iter().any(|n| n == table.name()) {
        return Err(SchemaError::DirectCycle(table.name().to_string()));
    }
    path.push(table.name().to_string());
    for (_, ref_table) in table.direct_relations() {
        check_direct_acyclic(ref_table, path)?;
    }
    path.pop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::table::RelationLoad;

    #[test]
    fn permission_table_shape() {
        let p = permission_table();
        assert_eq!(p.name(), "permission");
        assert_eq!(p.pk_name(), "permission_id");
        assert!(p.permission_index().is_none());
        let names: Vec<_> = p.columns().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            ["permission_id", "read_level", "write_level", "delete_level"]
        );
    }

    #[test]
    fn register_injects_permission_relation() {
        let mut reg = SchemaRegistry::new();
        let t = reg
            .register(TableDescriptor::builder("user").column(
                "user_name",
                SqlType::Varchar(255),
                ColumnFlags::new().unique(),
            ))
            .unwrap();
        let perm = t.permission_column().unwrap();
        assert_eq!(perm.name, "permission_id");
        assert_eq!(perm.direct_ref().unwrap().name(), "permission");
    }

    #[test]
    fn duplicate_table_name_is_rejected() {
        let mut reg = SchemaRegistry::new();
        reg.register(TableDescriptor::builder("user")).unwrap();
        let err = reg.register(TableDescriptor::builder("user")).unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateTable(_)));
    }

    #[test]
    fn self_referencing_direct_relation_is_a_cycle() {
        let mut reg = SchemaRegistry::new();
        let group = reg.register(TableDescriptor::builder("group")).unwrap();
        // A table pointing at itself through an already-registered descriptor
        // of the same name.
        let err = reg
            .register(
                TableDescriptor::builder("group2").one_to_one(
                    "group2_ref",
                    Arc::new(TableDescriptor::from_parts(
                        "group2".into(),
                        group.columns().to_vec(),
                        Vec::new(),
                        0,
                        None,
                    )),
                    RelationLoad::Direct,
                    ColumnFlags::new().nullable(),
                ),
            )
            .unwrap_err();
        assert!(matches!(err, SchemaError::DirectCycle(_)));
    }

    #[test]
    fn lazy_relations_do_not_count_toward_cycles() {
        let mut reg = SchemaRegistry::new();
        let group = reg.register(TableDescriptor::builder("group")).unwrap();
        // The same shape as the cycle test, but loaded lazily.
        reg.register(
            TableDescriptor::builder("group2").one_to_one(
                "group2_ref",
                Arc::new(TableDescriptor::from_parts(
                    "group2".into(),
                    group.columns().to_vec(),
                    Vec::new(),
                    0,
                    None,
                )),
                RelationLoad::Lazy,
                ColumnFlags::new().nullable(),
            ),
        )
        .unwrap();
    }
}
