//! Safe SQL building: identifiers from descriptors only, values as
//! positional parameters.

pub mod alias;
mod builder;
mod cache;
pub mod params;

pub use builder::*;
pub use cache::{StatementCache, StatementKind};
pub use params::{cell_to_value, SqlValue};
