//! Driver-neutral SQL values.
//!
//! Every argument bound into a query and every cell scanned out of a result set
//! passes through [`Value`]. Drivers convert to and from their own wire types;
//! the rest of the crate only ever sees this enum.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// A single SQL value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true for the "zero" value of the variant (`0`, `""`, `false`, empty bytes, NULL).
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::Text(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::Json(j) => j.is_null(),
            Value::Timestamp(t) => t.timestamp() == 0 && t.timestamp_subsec_nanos() == 0,
            Value::Uuid(u) => u.is_nil(),
        }
    }

    /// Short name of the variant, used in decode errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Json(_) => "json",
            Value::Timestamp(_) => "timestamp",
            Value::Uuid(_) => "uuid",
        }
    }
}

/// Error converting a [`Value`] into a Rust type.
#[derive(Debug, Error)]
pub enum ValueError {
    #[error("cannot decode {found} as {expected}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("{0}")]
    Invalid(String),
}

impl ValueError {
    fn mismatch(expected: &'static str, found: &Value) -> Self {
        Self::Mismatch {
            expected,
            found: found.kind(),
        }
    }
}

/// Convert a Rust value into a bound SQL [`Value`].
pub trait ToValue {
    fn to_value(&self) -> Value;
}

/// Convert a scanned SQL [`Value`] into a Rust value.
///
/// NULL decodes into the type's zero value; use `Option<T>` to observe NULL.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ValueError>;
}

/// Storage type of a column, used for DDL rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Text,
    Bytes,
    Json,
    Timestamp,
    Date,
    Uuid,
}

/// Static column information for a Rust field type.
pub trait ColumnType {
    const SQL_TYPE: SqlType;
    const NULLABLE: bool = false;
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        Ok(value)
    }
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: ColumnType> ColumnType for Option<T> {
    const SQL_TYPE: SqlType = T::SQL_TYPE;
    const NULLABLE: bool = true;
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(false),
            Value::Bool(b) => Ok(b),
            Value::Int(i) => Ok(i != 0),
            Value::Text(s) => match s.as_str() {
                "t" | "true" | "1" => Ok(true),
                "f" | "false" | "0" => Ok(false),
                _ => Err(ValueError::Invalid(format!("invalid bool text {s:?}"))),
            },
            other => Err(ValueError::mismatch("bool", &other)),
        }
    }
}

impl ColumnType for bool {
    const SQL_TYPE: SqlType = SqlType::Boolean;
}

macro_rules! impl_int {
    ($($ty:ty => $sql:expr),* $(,)?) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::Int(i64::from(*self))
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, ValueError> {
                    let n = match value {
                        Value::Null => return Ok(0),
                        Value::Int(i) => i,
                        Value::Bool(b) => i64::from(b),
                        Value::Text(ref s) => s
                            .trim()
                            .parse::<i64>()
                            .map_err(|e| ValueError::Invalid(e.to_string()))?,
                        other => return Err(ValueError::mismatch(stringify!($ty), &other)),
                    };
                    <$ty>::try_from(n).map_err(|_| {
                        ValueError::Invalid(format!("{n} out of range for {}", stringify!($ty)))
                    })
                }
            }

            impl ColumnType for $ty {
                const SQL_TYPE: SqlType = $sql;
            }
        )*
    };
}

impl_int! {
    i8 => SqlType::SmallInt,
    i16 => SqlType::SmallInt,
    i32 => SqlType::Integer,
    i64 => SqlType::BigInt,
    u8 => SqlType::SmallInt,
    u16 => SqlType::Integer,
    u32 => SqlType::BigInt,
}

macro_rules! impl_float {
    ($($ty:ty => $sql:expr),* $(,)?) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::Float(f64::from(*self))
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, ValueError> {
                    match value {
                        Value::Null => Ok(0.0),
                        Value::Float(f) => Ok(f as $ty),
                        Value::Int(i) => Ok(i as $ty),
                        Value::Text(ref s) => s
                            .trim()
                            .parse::<$ty>()
                            .map_err(|e| ValueError::Invalid(e.to_string())),
                        other => Err(ValueError::mismatch(stringify!($ty), &other)),
                    }
                }
            }

            impl ColumnType for $ty {
                const SQL_TYPE: SqlType = $sql;
            }
        )*
    };
}

impl_float! {
    f32 => SqlType::Real,
    f64 => SqlType::Double,
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::Text(self.to_owned())
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(String::new()),
            Value::Text(s) => Ok(s),
            Value::Bytes(b) => String::from_utf8(b).map_err(|e| ValueError::Invalid(e.to_string())),
            Value::Int(i) => Ok(i.to_string()),
            Value::Float(f) => Ok(f.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Json(j) => Ok(j.to_string()),
            Value::Uuid(u) => Ok(u.to_string()),
            Value::Timestamp(t) => Ok(t.to_rfc3339()),
        }
    }
}

impl ColumnType for String {
    const SQL_TYPE: SqlType = SqlType::Text;
}

impl ToValue for [u8] {
    fn to_value(&self) -> Value {
        Value::Bytes(self.to_vec())
    }
}

impl ToValue for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Bytes(b) => Ok(b),
            Value::Text(s) => Ok(s.into_bytes()),
            other => Err(ValueError::mismatch("bytes", &other)),
        }
    }
}

impl ColumnType for Vec<u8> {
    const SQL_TYPE: SqlType = SqlType::Bytes;
}

impl ToValue for DateTime<Utc> {
    fn to_value(&self) -> Value {
        Value::Timestamp(*self)
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(DateTime::<Utc>::UNIX_EPOCH),
            Value::Timestamp(t) => Ok(t),
            Value::Text(s) => parse_timestamp(&s),
            Value::Int(secs) => DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| ValueError::Invalid(format!("timestamp {secs} out of range"))),
            other => Err(ValueError::mismatch("timestamp", &other)),
        }
    }
}

impl ColumnType for DateTime<Utc> {
    const SQL_TYPE: SqlType = SqlType::Timestamp;
}

impl ToValue for NaiveDateTime {
    fn to_value(&self) -> Value {
        Value::Timestamp(self.and_utc())
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        DateTime::<Utc>::from_value(value).map(|t| t.naive_utc())
    }
}

impl ColumnType for NaiveDateTime {
    const SQL_TYPE: SqlType = SqlType::Timestamp;
}

impl ToValue for NaiveDate {
    fn to_value(&self) -> Value {
        Value::Text(self.format("%Y-%m-%d").to_string())
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(NaiveDate::default()),
            Value::Timestamp(t) => Ok(t.date_naive()),
            Value::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|e| ValueError::Invalid(e.to_string())),
            other => Err(ValueError::mismatch("date", &other)),
        }
    }
}

impl ColumnType for NaiveDate {
    const SQL_TYPE: SqlType = SqlType::Date;
}

impl ToValue for Uuid {
    fn to_value(&self) -> Value {
        Value::Uuid(*self)
    }
}

impl FromValue for Uuid {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(Uuid::nil()),
            Value::Uuid(u) => Ok(u),
            Value::Text(s) => Uuid::parse_str(s.trim()).map_err(|e| ValueError::Invalid(e.to_string())),
            Value::Bytes(b) => Uuid::from_slice(&b).map_err(|e| ValueError::Invalid(e.to_string())),
            other => Err(ValueError::mismatch("uuid", &other)),
        }
    }
}

impl ColumnType for Uuid {
    const SQL_TYPE: SqlType = SqlType::Uuid;
}

impl ToValue for serde_json::Value {
    fn to_value(&self) -> Value {
        Value::Json(self.clone())
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(serde_json::Value::Null),
            Value::Json(j) => Ok(j),
            Value::Text(s) => serde_json::from_str(&s).map_err(|e| ValueError::Invalid(e.to_string())),
            Value::Bytes(b) => {
                serde_json::from_slice(&b).map_err(|e| ValueError::Invalid(e.to_string()))
            }
            other => Err(ValueError::mismatch("json", &other)),
        }
    }
}

impl ColumnType for serde_json::Value {
    const SQL_TYPE: SqlType = SqlType::Json;
}

/// Decode a JSON-tagged field. NULL yields `T::default()`.
pub fn decode_json<T>(value: Value) -> Result<T, ValueError>
where
    T: serde::de::DeserializeOwned + Default,
{
    let parsed = match value {
        Value::Null => return Ok(T::default()),
        Value::Json(j) => serde_json::from_value(j),
        Value::Text(s) => serde_json::from_str(&s),
        Value::Bytes(b) => serde_json::from_slice(&b),
        other => return Err(ValueError::mismatch("json", &other)),
    };
    parsed.map_err(|e| ValueError::Invalid(e.to_string()))
}

/// Encode a JSON-tagged field. A value that serializes to `null` becomes SQL NULL.
pub fn encode_json<T>(value: &T) -> Result<Value, serde_json::Error>
where
    T: serde::Serialize + ?Sized,
{
    match serde_json::to_value(value)? {
        serde_json::Value::Null => Ok(Value::Null),
        json => Ok(Value::Json(json)),
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, ValueError> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Ok(t.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%d %H:%M:%S%#z"] {
        if let Ok(t) = DateTime::parse_from_str(s, fmt) {
            return Ok(t.with_timezone(&Utc));
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(t.and_utc());
        }
    }
    Err(ValueError::Invalid(format!("invalid timestamp {s:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_decodes_to_zero_value() {
        assert_eq!(i64::from_value(Value::Null).unwrap(), 0);
        assert_eq!(String::from_value(Value::Null).unwrap(), "");
        assert!(!bool::from_value(Value::Null).unwrap());
        assert_eq!(Option::<i32>::from_value(Value::Null).unwrap(), None);
    }

    #[test]
    fn bool_accepts_integers() {
        assert!(bool::from_value(Value::Int(1)).unwrap());
        assert!(!bool::from_value(Value::Int(0)).unwrap());
    }

    #[test]
    fn int_range_is_checked() {
        let err = i8::from_value(Value::Int(1000)).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn timestamp_parses_sqlite_text() {
        let t = DateTime::<Utc>::from_value(Value::Text("2024-03-01 10:20:30".into())).unwrap();
        assert_eq!(t.to_rfc3339(), "2024-03-01T10:20:30+00:00");

        let t = DateTime::<Utc>::from_value(Value::Text("2024-03-01T10:20:30.5Z".into())).unwrap();
        assert_eq!(t.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn json_null_is_default() {
        let m: std::collections::HashMap<String, i32> = decode_json(Value::Null).unwrap();
        assert!(m.is_empty());

        let m: std::collections::HashMap<String, i32> =
            decode_json(Value::Text(r#"{"a":1}"#.into())).unwrap();
        assert_eq!(m["a"], 1);
    }

    #[test]
    fn option_is_nullable_column() {
        assert!(<Option<i64> as ColumnType>::NULLABLE);
        assert!(!<i64 as ColumnType>::NULLABLE);
        assert_eq!(<Option<String> as ColumnType>::SQL_TYPE, SqlType::Text);
    }
}
