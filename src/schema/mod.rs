//! Entity model: tables, columns, relations, live rows, and the registry.

mod export;
mod registry;
mod row;
mod table;
mod types;

pub use export::model_schema;
pub use registry::{permission_table, SchemaRegistry};
pub use row::Row;
pub use table::{
    ColumnDescriptor, ColumnKind, OneToManyDescriptor, RelationLoad, TableBuilder, TableDescriptor,
};
pub use types::{ColumnFlags, SqlType};
