//! Live row instances: a table descriptor plus per-column values, embedded
//! DIRECT children and expanded one-to-many collections.

use crate::error::BridgeError;
use crate::schema::table::{ColumnKind, TableDescriptor};
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct Row {
    table: Arc<TableDescriptor>,
    /// One slot per column, descriptor order. Relation columns hold the
    /// foreign key, never the referent.
    values: Vec<Value>,
    /// One slot per column; `Some` only for a resolved DIRECT relation.
    embedded: Vec<Option<Box<Row>>>,
    /// One slot per one-to-many descriptor; empty until expanded.
    children: Vec<Vec<Row>>,
}

impl Row {
    pub fn new(table: Arc<TableDescriptor>) -> Self {
        let columns = table.columns().len();
        let relations = table.one_to_many().len();
        Row {
            table,
            values: vec![Value::Null; columns],
            embedded: vec![None; columns],
            children: vec![Vec::new(); relations],
        }
    }

    pub fn table(&self) -> &Arc<TableDescriptor> {
        &self.table
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.table.column(column).map(|(i, _)| &self.values[i])
    }

    /// Set a column value, running the column's type validator.
    pub fn set(&mut self, column: &str, value: Value) -> Result<(), BridgeError> {
        let (i, c) = self
            .table
            .column(column)
            .ok_or_else(|| BridgeError::UnknownColumn {
                table: self.table.name().to_string(),
                column: column.to_string(),
            })?;
        if !c.ty.accepts(&value) {
            return Err(BridgeError::TypeMismatch {
                table: self.table.name().to_string(),
                column: c.name.clone(),
                expected: c.ty.sql_name(),
            });
        }
        self.values[i] = value;
        Ok(())
    }

    pub(crate) fn set_raw(&mut self, index: usize, value: Value) {
        self.values[index] = value;
    }

    pub fn primary_key(&self) -> Option<i64> {
        self.values[self.table.pk_index()].as_i64()
    }

    /// First assignment only; a row's identity never changes afterwards.
    pub fn set_primary_key(&mut self, id: i64) -> Result<(), BridgeError> {
        if self.primary_key().is_some() {
            return Err(BridgeError::PrimaryKeyReassigned(
                self.table.name().to_string(),
            ));
        }
        self.values[self.table.pk_index()] = Value::from(id);
        Ok(())
    }

    pub fn permission_key(&self) -> Option<i64> {
        self.table
            .permission_index()
            .and_then(|i| self.values[i].as_i64())
    }

    /// The embedded permission record, when resolved.
    pub fn permission(&self) -> Option<&Row> {
        self.table
            .permission_index()
            .and_then(|i| self.embedded[i].as_deref())
    }

    /// Store the permission record created for this row: key plus embedding.
    /// The permission row must already carry its primary key.
    pub fn attach_permission(&mut self, permission: Row) -> Result<(), BridgeError> {
        let key = permission
            .primary_key()
            .ok_or_else(|| BridgeError::PrimaryKeyUnset(permission.table.name().to_string()))?;
        let index = self
            .table
            .permission_index()
            .ok_or_else(|| BridgeError::UnknownColumn {
                table: self.table.name().to_string(),
                column: "permission_id".into(),
            })?;
        self.values[index] = Value::from(key);
        self.embedded[index] = Some(Box::new(permission));
        Ok(())
    }

    pub fn embedded(&self, column: &str) -> Option<&Row> {
        self.table
            .column(column)
            .and_then(|(i, _)| self.embedded[i].as_deref())
    }

    pub(crate) fn set_embedded(&mut self, index: usize, child: Row) {
        self.embedded[index] = Some(Box::new(child));
    }

    /// Expanded one-to-many children; empty until expansion has run.
    pub fn children(&self, relation: &str) -> &[Row] {
        self.table
            .one_to_many_relation(relation)
            .map(|(i, _)| self.children[i].as_slice())
            .unwrap_or(&[])
    }

    /// Replaces the collection; re-expansion never appends.
    pub(crate) fn set_children(&mut self, index: usize, rows: Vec<Row>) {
        self.children[index] = rows;
    }

    /// Bind values for INSERT: every column in descriptor order. Unset
    /// auto-increment columns bind NULL so the engine assigns them; any
    /// other unset non-nullable column is a contract violation. The
    /// permission column is exempt here because the bridge attaches it
    /// mid-transaction, after the permission insert.
    pub(crate) fn insert_values(&self) -> Result<Vec<Value>, BridgeError> {
        let permission_index = self.table.permission_index();
        for (i, c) in self.table.columns().iter().enumerate() {
            let exempt = c.flags.auto_increment || Some(i) == permission_index;
            if self.values[i].is_null() && !c.flags.nullable && !exempt {
                return Err(BridgeError::MissingColumnData {
                    table: self.table.name().to_string(),
                    column: c.name.clone(),
                });
            }
        }
        Ok(self.values.clone())
    }

    /// Bind values for UPDATE: every column except the primary key and the
    /// permission reference, descriptor order, then the primary key last.
    pub(crate) fn update_values(&self) -> Result<Vec<Value>, BridgeError> {
        let pk = self
            .primary_key()
            .ok_or_else(|| BridgeError::PrimaryKeyUnset(self.table.name().to_string()))?;
        let mut out = Vec::with_capacity(self.values.len());
        for (i, c) in self.table.columns().iter().enumerate() {
            if i == self.table.pk_index() || Some(i) == self.table.permission_index() {
                continue;
            }
            if self.values[i].is_null() && !c.flags.nullable {
                return Err(BridgeError::MissingColumnData {
                    table: self.table.name().to_string(),
                    column: c.name.clone(),
                });
            }
            out.push(self.values[i].clone());
        }
        out.push(Value::from(pk));
        Ok(out)
    }

    /// Populate from caller JSON (create/update input). Unknown keys are
    /// ignored; the primary key and permission reference are bridge-managed
    /// and skipped; readonly columns are refused on the update path.
    pub fn apply_json(&mut self, body: &Value, is_update: bool) -> Result<(), BridgeError> {
        let Some(object) = body.as_object() else {
            return Ok(());
        };
        for (key, value) in object {
            let Some((i, c)) = self.table.column(key) else {
                continue;
            };
            if i == self.table.pk_index() || Some(i) == self.table.permission_index() {
                continue;
            }
            if is_update && c.flags.readonly {
                return Err(BridgeError::ReadonlyColumn {
                    table: self.table.name().to_string(),
                    column: c.name.clone(),
                });
            }
            if !c.ty.accepts(value) {
                return Err(BridgeError::TypeMismatch {
                    table: self.table.name().to_string(),
                    column: c.name.clone(),
                    expected: c.ty.sql_name(),
                });
            }
            self.values[i] = value.clone();
        }
        Ok(())
    }

    /// JSON export for the HTTP layer: private columns are omitted, resolved
    /// DIRECT relations nest their referent, one-to-many collections nest as
    /// arrays (empty until expanded).
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (i, c) in self.table.columns().iter().enumerate() {
            if c.flags.private {
                continue;
            }
            let nested = match &c.kind {
                ColumnKind::OneToOne { .. } => self.embedded[i].as_deref().map(Row::to_json),
                _ => None,
            };
            map.insert(c.name.clone(), nested.unwrap_or_else(|| self.values[i].clone()));
        }
        for (i, rel) in self.table.one_to_many().iter().enumerate() {
            let rows: Vec<Value> = self.children[i].iter().map(Row::to_json).collect();
            map.insert(rel.name.clone(), Value::Array(rows));
        }
        Value::Object(map)
    }
}
