//! rowbridge: model-driven relational mapping bridge for MySQL.
//!
//! Compiles a static table/column/relation model into SQL, executes it
//! transactionally against a pooled connection, and rebuilds object graphs
//! (nested one-to-one, expanded one-to-many) from flat joined rows.

pub mod bridge;
pub mod config;
pub mod error;
pub mod reconstruct;
pub mod schema;
pub mod sql;

pub use bridge::{Bridge, MySqlBridge};
pub use config::DbConfig;
pub use error::{BridgeError, ConfigError, SchemaError};
pub use reconstruct::{reconstruct, RawRow};
pub use schema::{
    model_schema, ColumnFlags, ColumnKind, OneToManyDescriptor, RelationLoad, Row, SchemaRegistry,
    SqlType, TableBuilder, TableDescriptor,
};
