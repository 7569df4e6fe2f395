//! Convert between serde_json::Value and types sqlx can bind or decode.

use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::mysql::{MySql, MySqlRow, MySqlTypeInfo};
use sqlx::{Database, Type};

/// A dynamic value bound to a MySQL statement. Converts from
/// serde_json::Value; numbers bind as BIGINT/DOUBLE, objects and arrays as
/// JSON.
#[derive(Clone, Debug)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
    Json(Value),
}

impl SqlValue {
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::Int(i)
                } else {
                    SqlValue::Double(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => SqlValue::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => SqlValue::Json(v.clone()),
        }
    }
}

impl<'q> Encode<'q, MySql> for SqlValue {
    fn encode_by_ref(
        &self,
        buf: &mut <MySql as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            SqlValue::Null => <Option<i64> as Encode<MySql>>::encode_by_ref(&None, buf)?,
            SqlValue::Bool(b) => <bool as Encode<MySql>>::encode_by_ref(b, buf)?,
            SqlValue::Int(n) => <i64 as Encode<MySql>>::encode_by_ref(n, buf)?,
            SqlValue::Double(n) => <f64 as Encode<MySql>>::encode_by_ref(n, buf)?,
            SqlValue::Text(s) => <String as Encode<MySql>>::encode_by_ref(s, buf)?,
            SqlValue::Json(v) => <Value as Encode<MySql>>::encode_by_ref(v, buf)?,
        })
    }

    fn produces(&self) -> Option<MySqlTypeInfo> {
        Some(match self {
            SqlValue::Null => <Option<i64> as Type<MySql>>::type_info(),
            SqlValue::Bool(_) => <bool as Type<MySql>>::type_info(),
            SqlValue::Int(_) => <i64 as Type<MySql>>::type_info(),
            SqlValue::Double(_) => <f64 as Type<MySql>>::type_info(),
            SqlValue::Text(_) => <str as Type<MySql>>::type_info(),
            SqlValue::Json(_) => <Value as Type<MySql>>::type_info(),
        })
    }
}

impl Type<MySql> for SqlValue {
    fn type_info() -> MySqlTypeInfo {
        <str as Type<MySql>>::type_info()
    }

    fn compatible(_ty: &MySqlTypeInfo) -> bool {
        true
    }
}

/// Decode one cell to JSON, trying the concrete MySQL types widest-first.
pub fn cell_to_value(row: &MySqlRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<u64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(name) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDate>, _>(name) {
        return Value::String(d.format("%Y-%m-%d").to_string());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    if let Ok(Some(b)) = row.try_get::<Option<Vec<u8>>, _>(name) {
        return Value::String(String::from_utf8_lossy(&b).into_owned());
    }
    Value::Null
}
