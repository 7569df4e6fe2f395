//! Column value types: an SQL/JSON type pair with a JSON-side validator.

use serde_json::Value;

/// Closed set of supported column types. `sql_name` is the DDL spelling,
/// `accepts` validates a JSON value against the type before it is stored on
/// a row or bound to a statement. Null always passes; nullability is a
/// column flag, not a type property.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SqlType {
    Int,
    BigInt,
    Double,
    Boolean,
    Varchar(u32),
    Text,
    DateTime,
    Json,
    Blob,
}

impl SqlType {
    pub fn sql_name(&self) -> String {
        match self {
            SqlType::Int => "INT".into(),
            SqlType::BigInt => "BIGINT".into(),
            SqlType::Double => "DOUBLE".into(),
            SqlType::Boolean => "BOOLEAN".into(),
            SqlType::Varchar(n) => format!("VARCHAR({})", n),
            SqlType::Text => "TEXT".into(),
            SqlType::DateTime => "DATETIME".into(),
            SqlType::Json => "JSON".into(),
            SqlType::Blob => "BLOB".into(),
        }
    }

    /// JSON schema type name, for model export.
    pub fn json_name(&self) -> &'static str {
        match self {
            SqlType::Int | SqlType::BigInt => "integer",
            SqlType::Double => "number",
            SqlType::Boolean => "boolean",
            SqlType::Varchar(_) | SqlType::Text | SqlType::DateTime | SqlType::Blob => "string",
            SqlType::Json => "object",
        }
    }

    pub fn accepts(&self, v: &Value) -> bool {
        if v.is_null() {
            return true;
        }
        match self {
            SqlType::Int | SqlType::BigInt => v.as_i64().is_some() || v.as_u64().is_some(),
            SqlType::Double => v.is_number(),
            // MySQL booleans come back as TINYINT(1), decoded as 0/1.
            SqlType::Boolean => v.is_boolean() || matches!(v.as_i64(), Some(0) | Some(1)),
            SqlType::Varchar(_) | SqlType::Text | SqlType::DateTime | SqlType::Blob => v.is_string(),
            SqlType::Json => true,
        }
    }
}

/// Column flag set. Defaults are all-off: columns are NOT NULL unless
/// `nullable` is set, matching the DDL policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColumnFlags {
    pub nullable: bool,
    pub unique: bool,
    pub auto_increment: bool,
    pub readonly: bool,
    pub private: bool,
}

impl ColumnFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }
}
