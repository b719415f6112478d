//! 요청 값 타입
//!
//! 호출자 JSON 값을 닫힌 sum type으로 변환합니다.
//! 변환 계층은 이 타입만 보고 분기하므로 모든 경우가 정적으로 검사됩니다.

use serde_json::Value as Json;

use crate::error::{Error, Result};

/// 요청 값
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
    /// 요소 타입이 섞일 수 있는 배열
    Array(Vec<Value>),
}

impl Value {
    /// 값의 런타임 형태 이름 (에러 메시지용)
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Null => "null",
            Value::Array(_) => "array",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl TryFrom<&Json> for Value {
    type Error = Error;

    fn try_from(value: &Json) -> Result<Self> {
        match value {
            Json::Null => Ok(Value::Null),
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Float(f))
                } else {
                    Err(Error::bad_request(format!("unrepresentable number: {}", n)))
                }
            }
            Json::String(s) => Ok(Value::Text(s.clone())),
            Json::Array(items) => items
                .iter()
                .map(Value::try_from)
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Json::Object(_) => Err(Error::bad_request("object values are not supported")),
        }
    }
}

impl TryFrom<Json> for Value {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self> {
        Value::try_from(&value)
    }
}
