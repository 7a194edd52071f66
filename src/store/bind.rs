//! Convert serde_json::Value operands to types sqlx can bind.

use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

/// A value bound to a PostgreSQL query, converted from a JSON operand.
#[derive(Clone, Debug)]
pub enum PgBindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Uuid(uuid::Uuid),
    Json(Value),
}

impl PgBindValue {
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => PgBindValue::Null,
            Value::Bool(b) => PgBindValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    PgBindValue::I64(i)
                } else {
                    PgBindValue::F64(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => {
                if let Ok(u) = uuid::Uuid::parse_str(s) {
                    PgBindValue::Uuid(u)
                } else {
                    PgBindValue::String(s.clone())
                }
            }
            Value::Array(_) | Value::Object(_) => PgBindValue::Json(v.clone()),
        }
    }

    /// Bind as a whole JSON document regardless of shape. Used for wholesale
    /// association replacement, where even a scalar goes in as-is.
    pub fn json_wholesale(v: &Value) -> Self {
        PgBindValue::Json(v.clone())
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            PgBindValue::Null => <Option<i32> as Encode<Postgres>>::encode_by_ref(&None, buf)?,
            PgBindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            PgBindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::String(s) => {
                let s_ref: &str = s.as_str();
                <&str as Encode<Postgres>>::encode_by_ref(&s_ref, buf)?
            }
            PgBindValue::Uuid(u) => {
                let u_str = u.to_string();
                <&str as Encode<Postgres>>::encode_by_ref(&u_str.as_str(), buf)?
            }
            PgBindValue::Json(v) => <serde_json::Value as Encode<Postgres>>::encode_by_ref(v, buf)?,
        })
    }
}

impl sqlx::Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}

#[cfg(test)]
mod tests {
    use super::PgBindValue;
    use serde_json::json;

    #[test]
    fn numbers_prefer_integer_binding() {
        assert!(matches!(PgBindValue::from_json(&json!(5)), PgBindValue::I64(5)));
        assert!(matches!(PgBindValue::from_json(&json!(1.5)), PgBindValue::F64(_)));
    }

    #[test]
    fn uuid_strings_bind_as_uuid() {
        let v = json!("7c9e6679-7425-40de-944b-e07fc1f90ae7");
        assert!(matches!(PgBindValue::from_json(&v), PgBindValue::Uuid(_)));
        assert!(matches!(
            PgBindValue::from_json(&json!("plain")),
            PgBindValue::String(_)
        ));
    }

    #[test]
    fn wholesale_binding_keeps_any_shape_as_json() {
        assert!(matches!(
            PgBindValue::json_wholesale(&json!("scalar")),
            PgBindValue::Json(_)
        ));
    }
}
