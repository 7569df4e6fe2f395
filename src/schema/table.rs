//! Table and column descriptors: the static model the bridge compiles from.

use crate::error::SchemaError;
use crate::schema::types::{ColumnFlags, SqlType};
use std::sync::Arc;

/// Loading mode for a one-to-one relation. Only DIRECT relations participate
/// in JOIN generation and recursive embedding; LAZY relations store the key
/// and leave the referent to an explicit follow-up fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelationLoad {
    Direct,
    Lazy,
}

/// Closed set of column kinds. Compiler and reconstructor match exhaustively
/// over this instead of testing runtime types.
#[derive(Clone, Debug)]
pub enum ColumnKind {
    Scalar,
    PrimaryKey,
    OneToOne {
        ref_table: Arc<TableDescriptor>,
        load: RelationLoad,
    },
}

#[derive(Clone, Debug)]
pub struct ColumnDescriptor {
    pub name: String,
    pub ty: SqlType,
    pub flags: ColumnFlags,
    pub kind: ColumnKind,
}

impl ColumnDescriptor {
    pub fn is_primary_key(&self) -> bool {
        matches!(self.kind, ColumnKind::PrimaryKey)
    }

    /// The referenced table when this column is a one-to-one relation.
    pub fn relation(&self) -> Option<(&Arc<TableDescriptor>, RelationLoad)> {
        match &self.kind {
            ColumnKind::OneToOne { ref_table, load } => Some((ref_table, *load)),
            _ => None,
        }
    }

    /// The referenced table when this column is a DIRECT one-to-one relation.
    pub fn direct_ref(&self) -> Option<&Arc<TableDescriptor>> {
        match &self.kind {
            ColumnKind::OneToOne {
                ref_table,
                load: RelationLoad::Direct,
            } => Some(ref_table),
            _ => None,
        }
    }
}

/// One-to-many relation: no stored column on the owner. `ref_column` is the
/// foreign-key column on the child table pointing back at the owner's
/// primary key; resolution is always a follow-up query, never a JOIN.
#[derive(Clone, Debug)]
pub struct OneToManyDescriptor {
    pub name: String,
    pub ref_table: Arc<TableDescriptor>,
    pub ref_column: String,
}

/// A table: named, ordered columns (order defines SQL column order), exactly
/// one primary key, and for entity tables one permission-record relation.
#[derive(Clone, Debug)]
pub struct TableDescriptor {
    name: String,
    columns: Vec<ColumnDescriptor>,
    one_to_many: Vec<OneToManyDescriptor>,
    pk: usize,
    permission: Option<usize>,
}

impl TableDescriptor {
    pub(crate) fn from_parts(
        name: String,
        columns: Vec<ColumnDescriptor>,
        one_to_many: Vec<OneToManyDescriptor>,
        pk: usize,
        permission: Option<usize>,
    ) -> Self {
        TableDescriptor {
            name,
            columns,
            one_to_many,
            pk,
            permission,
        }
    }

    pub fn builder(name: impl Into<String>) -> TableBuilder {
        TableBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<(usize, &ColumnDescriptor)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, c)| c.name == name)
    }

    pub fn pk_index(&self) -> usize {
        self.pk
    }

    pub fn pk_column(&self) -> &ColumnDescriptor {
        &self.columns[self.pk]
    }

    pub fn pk_name(&self) -> &str {
        &self.columns[self.pk].name
    }

    pub fn permission_index(&self) -> Option<usize> {
        self.permission
    }

    pub fn permission_column(&self) -> Option<&ColumnDescriptor> {
        self.permission.map(|i| &self.columns[i])
    }

    pub fn one_to_many(&self) -> &[OneToManyDescriptor] {
        &self.one_to_many
    }

    pub fn one_to_many_relation(&self, name: &str) -> Option<(usize, &OneToManyDescriptor)> {
        self.one_to_many
            .iter()
            .enumerate()
            .find(|(_, r)| r.name == name)
    }

    /// DIRECT one-to-one relation columns in descriptor order.
    pub fn direct_relations(&self) -> impl Iterator<Item = (&ColumnDescriptor, &Arc<TableDescriptor>)> {
        self.columns
            .iter()
            .filter_map(|c| c.direct_ref().map(|t| (c, t)))
    }
}

/// Builder for entity tables. The primary key (`<name>_id`, auto-increment
/// BIGINT unless overridden) and the `permission_id` relation are injected by
/// the registry at registration, ahead of the declared columns.
pub struct TableBuilder {
    name: String,
    pk_override: Option<ColumnDescriptor>,
    columns: Vec<ColumnDescriptor>,
    one_to_many: Vec<OneToManyDescriptor>,
}

impl TableBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        TableBuilder {
            name: name.into(),
            pk_override: None,
            columns: Vec::new(),
            one_to_many: Vec::new(),
        }
    }

    pub fn column(mut self, name: impl Into<String>, ty: SqlType, flags: ColumnFlags) -> Self {
        self.columns.push(ColumnDescriptor {
            name: name.into(),
            ty,
            flags,
            kind: ColumnKind::Scalar,
        });
        self
    }

    /// Override the default auto-increment primary key.
    pub fn primary_key(mut self, name: impl Into<String>, ty: SqlType, flags: ColumnFlags) -> Self {
        self.pk_override = Some(ColumnDescriptor {
            name: name.into(),
            ty,
            flags,
            kind: ColumnKind::PrimaryKey,
        });
        self
    }

    /// A stored foreign-key column to another table's primary key.
    pub fn one_to_one(
        mut self,
        name: impl Into<String>,
        ref_table: Arc<TableDescriptor>,
        load: RelationLoad,
        flags: ColumnFlags,
    ) -> Self {
        self.columns.push(ColumnDescriptor {
            name: name.into(),
            ty: SqlType::BigInt,
            flags,
            kind: ColumnKind::OneToOne { ref_table, load },
        });
        self
    }

    /// A reverse relation resolved by a follow-up query against the child
    /// table; `ref_column` is the child's foreign-key column back to us.
    pub fn one_to_many(
        mut self,
        name: impl Into<String>,
        ref_table: Arc<TableDescriptor>,
        ref_column: impl Into<String>,
    ) -> Self {
        self.one_to_many.push(OneToManyDescriptor {
            name: name.into(),
            ref_table,
            ref_column: ref_column.into(),
        });
        self
    }

    /// Assemble the descriptor: pk first, then the permission relation (when
    /// given), then the declared columns in insertion order.
    pub(crate) fn finish(
        self,
        permission: Option<Arc<TableDescriptor>>,
    ) -> Result<TableDescriptor, SchemaError> {
        let name = self.name;
        let pk = self.pk_override.unwrap_or_else(|| ColumnDescriptor {
            name: format!("{}_id", name),
            ty: SqlType::BigInt,
            flags: ColumnFlags::new().auto_increment(),
            kind: ColumnKind::PrimaryKey,
        });

        let mut columns = Vec::with_capacity(self.columns.len() + 2);
        columns.push(pk);
        let permission_index = permission.map(|perm| {
            columns.push(ColumnDescriptor {
                name: "permission_id".into(),
                ty: SqlType::BigInt,
                flags: ColumnFlags::new().readonly(),
                kind: ColumnKind::OneToOne {
                    ref_table: perm,
                    load: RelationLoad::Direct,
                },
            });
            columns.len() - 1
        });
        columns.extend(self.columns);

        let mut seen = std::collections::HashSet::new();
        for c in &columns {
            if !seen.insert(c.name.clone()) {
                return Err(SchemaError::DuplicateColumn {
                    table: name,
                    column: c.name.clone(),
                });
            }
        }

        Ok(TableDescriptor::from_parts(
            name,
            columns,
            self.one_to_many,
            0,
            permission_index,
        ))
    }
}
