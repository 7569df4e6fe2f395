//! Typed errors for every bridge failure path.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("required environment variable '{0}' is not provided")]
    MissingVar(&'static str),
    #[error("environment variable '{name}' must be numeric, got '{value}'")]
    NotNumeric { name: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("duplicate column '{column}' on table '{table}'")]
    DuplicateColumn { table: String, column: String },
    #[error("table '{0}' is already registered")]
    DuplicateTable(String),
    #[error("direct relation cycle through table '{0}'")]
    DirectCycle(String),
}

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("missing column data '{column}' on table '{table}'")]
    MissingColumnData { table: String, column: String },
    #[error("no column '{column}' on table '{table}'")]
    UnknownColumn { table: String, column: String },
    #[error("type mismatch of column '{column}' on table '{table}' (expected {expected})")]
    TypeMismatch {
        table: String,
        column: String,
        expected: String,
    },
    #[error("column '{column}' on table '{table}' is readonly")]
    ReadonlyColumn { table: String, column: String },
    #[error("primary key of table '{0}' is not set")]
    PrimaryKeyUnset(String),
    #[error("primary key of table '{0}' does not change once assigned")]
    PrimaryKeyReassigned(String),
    #[error("connection acquisition: {0}")]
    Acquire(#[source] sqlx::Error),
    #[error("transaction: {0}")]
    Transaction(#[source] sqlx::Error),
    #[error("constraint violation: {0}")]
    Constraint(#[source] sqlx::Error),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Sort a raw driver error into the bridge's failure kinds. Pool exhaustion
/// and constraint violations get their own variants so callers can react.
pub fn classify(e: sqlx::Error) -> BridgeError {
    match &e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => BridgeError::Acquire(e),
        sqlx::Error::Database(db)
            if db.is_unique_violation() || db.is_foreign_key_violation() || db.is_check_violation() =>
        {
            BridgeError::Constraint(e)
        }
        _ => BridgeError::Db(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_pool_timeout_as_acquire() {
        let err = classify(sqlx::Error::PoolTimedOut);
        assert!(matches!(err, BridgeError::Acquire(_)));
    }

    #[test]
    fn classify_other_as_db() {
        let err = classify(sqlx::Error::RowNotFound);
        assert!(matches!(err, BridgeError::Db(_)));
    }
}
