//! 바인딩/스캔 값 타입
//!
//! 변환 계층이 만든 파라미터와 실행기가 읽어 온 컬럼 값을 같은 타입으로 표현합니다.
//! NULL도 타입을 가지므로 드라이버가 파라미터 타입을 추론할 수 있습니다.

use chrono::{NaiveDate, NaiveDateTime};
use sea_query::{ArrayType, Value};
use serde_json::Value as Json;
use tbl_core::{Error, Result};

/// 컬럼/파라미터 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlType {
    Bool,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Text,
    Date,
    Timestamp,
    TextArray,
    Int32Array,
    Int64Array,
    /// 배열을 지원하지 않는 dialect의 배열 표현
    Json,
}

impl SqlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlType::Bool => "bool",
            SqlType::Int16 => "int16",
            SqlType::Int32 => "int32",
            SqlType::Int64 => "int64",
            SqlType::Float32 => "float32",
            SqlType::Float64 => "float64",
            SqlType::Text => "text",
            SqlType::Date => "date",
            SqlType::Timestamp => "timestamp",
            SqlType::TextArray => "text[]",
            SqlType::Int32Array => "int32[]",
            SqlType::Int64Array => "int64[]",
            SqlType::Json => "json",
        }
    }

    /// 이 타입의 NULL 파라미터
    fn null(self) -> Value {
        match self {
            SqlType::Bool => Value::Bool(None),
            SqlType::Int16 => Value::SmallInt(None),
            SqlType::Int32 => Value::Int(None),
            SqlType::Int64 => Value::BigInt(None),
            SqlType::Float32 => Value::Float(None),
            SqlType::Float64 => Value::Double(None),
            SqlType::Text => Value::String(None),
            SqlType::Date => Value::ChronoDate(None),
            SqlType::Timestamp => Value::ChronoDateTime(None),
            SqlType::TextArray => Value::Array(ArrayType::String, None),
            SqlType::Int32Array => Value::Array(ArrayType::Int, None),
            SqlType::Int64Array => Value::Array(ArrayType::BigInt, None),
            SqlType::Json => Value::Json(None),
        }
    }
}

/// 바인딩 파라미터 또는 스캔된 컬럼 값
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// 타입이 지정된 NULL
    Null(SqlType),
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TextArray(Vec<String>),
    Int32Array(Vec<i32>),
    Int64Array(Vec<i64>),
    Json(Json),
}

impl SqlValue {
    pub fn sql_type(&self) -> SqlType {
        match self {
            SqlValue::Null(t) => *t,
            SqlValue::Bool(_) => SqlType::Bool,
            SqlValue::Int16(_) => SqlType::Int16,
            SqlValue::Int32(_) => SqlType::Int32,
            SqlValue::Int64(_) => SqlType::Int64,
            SqlValue::Float32(_) => SqlType::Float32,
            SqlValue::Float64(_) => SqlType::Float64,
            SqlValue::Text(_) => SqlType::Text,
            SqlValue::Date(_) => SqlType::Date,
            SqlValue::Timestamp(_) => SqlType::Timestamp,
            SqlValue::TextArray(_) => SqlType::TextArray,
            SqlValue::Int32Array(_) => SqlType::Int32Array,
            SqlValue::Int64Array(_) => SqlType::Int64Array,
            SqlValue::Json(_) => SqlType::Json,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null(_))
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int64(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<SqlValue> for Value {
    fn from(value: SqlValue) -> Self {
        match value {
            SqlValue::Null(t) => t.null(),
            SqlValue::Bool(b) => b.into(),
            SqlValue::Int16(i) => i.into(),
            SqlValue::Int32(i) => i.into(),
            SqlValue::Int64(i) => i.into(),
            SqlValue::Float32(f) => f.into(),
            SqlValue::Float64(f) => f.into(),
            SqlValue::Text(s) => s.into(),
            SqlValue::Date(d) => d.into(),
            SqlValue::Timestamp(t) => t.into(),
            SqlValue::TextArray(v) => v.into(),
            SqlValue::Int32Array(v) => v.into(),
            SqlValue::Int64Array(v) => v.into(),
            SqlValue::Json(j) => j.into(),
        }
    }
}

/// 빌드된 구문의 파라미터를 바인딩 값으로 되돌림
///
/// 빌더가 만드는 값(`SqlValue`에서 온 값과 LIMIT/OFFSET)만 받습니다.
impl TryFrom<Value> for SqlValue {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        let converted = match value {
            Value::Bool(v) => v.map_or(SqlValue::Null(SqlType::Bool), SqlValue::Bool),
            Value::SmallInt(v) => v.map_or(SqlValue::Null(SqlType::Int16), SqlValue::Int16),
            Value::Int(v) => v.map_or(SqlValue::Null(SqlType::Int32), SqlValue::Int32),
            Value::BigInt(v) => v.map_or(SqlValue::Null(SqlType::Int64), SqlValue::Int64),
            Value::BigUnsigned(Some(n)) => SqlValue::Int64(
                i64::try_from(n).map_err(|_| Error::out_of_range("parameter", "int64", n))?,
            ),
            Value::BigUnsigned(None) => SqlValue::Null(SqlType::Int64),
            Value::Float(v) => v.map_or(SqlValue::Null(SqlType::Float32), SqlValue::Float32),
            Value::Double(v) => v.map_or(SqlValue::Null(SqlType::Float64), SqlValue::Float64),
            Value::String(v) => v.map_or(SqlValue::Null(SqlType::Text), |s| SqlValue::Text(*s)),
            Value::ChronoDate(v) => v.map_or(SqlValue::Null(SqlType::Date), |d| SqlValue::Date(*d)),
            Value::ChronoDateTime(v) => v.map_or(SqlValue::Null(SqlType::Timestamp), |t| {
                SqlValue::Timestamp(*t)
            }),
            Value::Json(v) => v.map_or(SqlValue::Null(SqlType::Json), |j| SqlValue::Json(*j)),
            Value::Array(kind, items) => array_from(kind, items.map(|b| *b))?,
            other => {
                return Err(Error::unsupported_conversion(
                    "parameter",
                    format!("{:?}", other),
                    "sql value",
                ))
            }
        };
        Ok(converted)
    }
}

fn array_from(kind: ArrayType, items: Option<Vec<Value>>) -> Result<SqlValue> {
    let label = format!("{:?}[]", kind);
    let unsupported = || Error::unsupported_conversion("parameter", label.as_str(), "sql array");
    match (kind, items) {
        (ArrayType::String, None) => Ok(SqlValue::Null(SqlType::TextArray)),
        (ArrayType::Int, None) => Ok(SqlValue::Null(SqlType::Int32Array)),
        (ArrayType::BigInt, None) => Ok(SqlValue::Null(SqlType::Int64Array)),
        (ArrayType::String, Some(items)) => items
            .into_iter()
            .map(|v| match v {
                Value::String(Some(s)) => Ok(*s),
                _ => Err(unsupported()),
            })
            .collect::<Result<Vec<_>>>()
            .map(SqlValue::TextArray),
        (ArrayType::Int, Some(items)) => items
            .into_iter()
            .map(|v| match v {
                Value::Int(Some(i)) => Ok(i),
                _ => Err(unsupported()),
            })
            .collect::<Result<Vec<_>>>()
            .map(SqlValue::Int32Array),
        (ArrayType::BigInt, Some(items)) => items
            .into_iter()
            .map(|v| match v {
                Value::BigInt(Some(i)) => Ok(i),
                _ => Err(unsupported()),
            })
            .collect::<Result<Vec<_>>>()
            .map(SqlValue::Int64Array),
        _ => Err(unsupported()),
    }
}
