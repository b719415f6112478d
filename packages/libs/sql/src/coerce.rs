//! 값 변환 계층
//!
//! 호출자 값(`Value`)을 필드의 선언 타입에 맞는 바인딩 값(`SqlValue`)으로 변환합니다.
//!
//! # 규칙
//!
//! - `_ignore`, `_auto_inc`: 쓰기에서 제외
//! - `_creator`: INSERT에서만 호출자 ID로 기록, UPDATE에서는 제외
//! - `_updater`: INSERT/UPDATE 모두 호출자 ID로 기록 (호출자 값 무시)
//! - 필수 필드에 값이 없거나 `null`이면 `MissingRequiredField` (배열은 빈 배열)
//! - 범위를 벗어난 정수/실수는 `OutOfRange`
//! - 그 밖의 변환 불가 조합은 `UnsupportedConversion`

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value as Json;
use tbl_core::identity::Identity;
use tbl_core::schema::{DataType, ElementType, FieldDef};
use tbl_core::{Error, Result, Value};

use crate::dialect::{ArrayValues, Dialect};
use crate::value::{SqlType, SqlValue};

/// 쓰기 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Insert,
    Update,
}

/// 필드 단위 값 변환기
#[derive(Debug, Clone, Copy)]
pub struct Coercer<'a> {
    dialect: &'a dyn Dialect,
    identity: &'a Identity,
    mode: WriteMode,
}

impl<'a> Coercer<'a> {
    pub fn new(dialect: &'a dyn Dialect, identity: &'a Identity, mode: WriteMode) -> Self {
        Self {
            dialect,
            identity,
            mode,
        }
    }

    /// 필드 하나 변환
    ///
    /// # Returns
    /// `None`이면 이 필드는 구문에서 빠집니다.
    pub fn coerce_field(&self, def: &FieldDef, value: Option<&Json>) -> Result<Option<SqlValue>> {
        match def.data_type {
            DataType::Ignore | DataType::AutoInc => return Ok(None),
            DataType::Creator if self.mode == WriteMode::Update => return Ok(None),
            DataType::Creator | DataType::Updater => {
                return Ok(Some(SqlValue::Text(self.identity.user_id.clone())));
            }
            _ => {}
        }

        let present = value.filter(|v| !v.is_null());
        let Some(json) = present else {
            return self.missing(def).map(Some);
        };

        if json.is_object() {
            return Err(Error::unsupported_conversion(
                &def.field_name,
                "object",
                def.data_type.as_str(),
            ));
        }
        let value = Value::try_from(json)?;
        self.coerce_value(def, &value).map(Some)
    }

    /// 값이 없는 필드 처리
    fn missing(&self, def: &FieldDef) -> Result<SqlValue> {
        match def.data_type {
            DataType::Array if def.required => Ok(self
                .dialect
                .array_value(ArrayValues::empty(def.element_type()))),
            DataType::TextArray if def.required => Ok(self
                .dialect
                .array_value(ArrayValues::empty(ElementType::String))),
            _ if def.required => Err(Error::MissingRequiredField {
                field: def.field_name.clone(),
            }),
            _ => Ok(SqlValue::Null(bind_type(def, self.dialect))),
        }
    }

    /// null이 아닌 값을 선언 타입으로 변환
    pub fn coerce_value(&self, def: &FieldDef, value: &Value) -> Result<SqlValue> {
        let field = def.field_name.as_str();
        match def.data_type {
            DataType::String | DataType::Creator | DataType::Updater => {
                to_text(field, value).map(SqlValue::Text)
            }
            DataType::Int16 => {
                let i = to_i64(field, value, "int16")?;
                i16::try_from(i)
                    .map(SqlValue::Int16)
                    .map_err(|_| Error::out_of_range(field, "int16", i))
            }
            DataType::Int32 => {
                let i = to_i64(field, value, "int32")?;
                i32::try_from(i)
                    .map(SqlValue::Int32)
                    .map_err(|_| Error::out_of_range(field, "int32", i))
            }
            DataType::Int64 | DataType::AutoInc => to_i64(field, value, "int64").map(SqlValue::Int64),
            DataType::Float32 => {
                let f = to_f64(field, value, "float32")?;
                if f.is_finite() && f.abs() > f32::MAX as f64 {
                    return Err(Error::out_of_range(field, "float32", f));
                }
                Ok(SqlValue::Float32(f as f32))
            }
            DataType::Float64 => to_f64(field, value, "float64").map(SqlValue::Float64),
            DataType::Boolean => to_bool(field, value).map(SqlValue::Bool),
            DataType::Date => to_datetime(field, value, "date").map(|t| SqlValue::Date(t.date())),
            DataType::Timestamp => to_datetime(field, value, "timestamp").map(SqlValue::Timestamp),
            DataType::TextArray => {
                let items = array_items(field, value)?;
                let texts = coerce_elements(field, items, ElementType::String)?;
                Ok(self.dialect.array_value(texts))
            }
            DataType::Array => {
                let items = array_items(field, value)?;
                let values = coerce_elements(field, items, def.element_type())?;
                Ok(self.dialect.array_value(values))
            }
            DataType::Ignore => Err(Error::unsupported_conversion(
                field,
                value.kind(),
                def.data_type.as_str(),
            )),
        }
    }
}

/// 선언 타입의 바인딩/스캔 타입
pub fn bind_type(def: &FieldDef, dialect: &dyn Dialect) -> SqlType {
    match def.data_type {
        DataType::String | DataType::Creator | DataType::Updater | DataType::Ignore => {
            SqlType::Text
        }
        DataType::Int16 => SqlType::Int16,
        DataType::Int32 => SqlType::Int32,
        DataType::Int64 | DataType::AutoInc => SqlType::Int64,
        DataType::Float32 => SqlType::Float32,
        DataType::Float64 => SqlType::Float64,
        DataType::Boolean => SqlType::Bool,
        DataType::Date => SqlType::Date,
        DataType::Timestamp => SqlType::Timestamp,
        DataType::TextArray => dialect.array_type(ElementType::String),
        DataType::Array => dialect.array_type(def.element_type()),
    }
}

fn to_text(field: &str, value: &Value) -> Result<String> {
    match value {
        Value::Text(s) => Ok(s.clone()),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null | Value::Array(_) => {
            Err(Error::unsupported_conversion(field, value.kind(), "string"))
        }
    }
}

fn to_i64(field: &str, value: &Value, target: &str) -> Result<i64> {
    match value {
        Value::Integer(i) => Ok(*i),
        Value::Text(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(i) => Ok(i),
                // 숫자 형태지만 i64를 넘는 경우
                Err(_) if !s.is_empty() && s.parse::<i128>().is_ok() => {
                    Err(Error::out_of_range(field, target, s))
                }
                Err(_) => Err(Error::unsupported_conversion(field, "text", target)),
            }
        }
        Value::Float(f) => {
            if f.fract() != 0.0 || !f.is_finite() {
                Err(Error::unsupported_conversion(field, "float", target))
            } else if *f < i64::MIN as f64 || *f >= i64::MAX as f64 {
                Err(Error::out_of_range(field, target, f))
            } else {
                Ok(*f as i64)
            }
        }
        Value::Bool(_) | Value::Null | Value::Array(_) => {
            Err(Error::unsupported_conversion(field, value.kind(), target))
        }
    }
}

fn to_f64(field: &str, value: &Value, target: &str) -> Result<f64> {
    match value {
        Value::Integer(i) => Ok(*i as f64),
        Value::Float(f) => Ok(*f),
        Value::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::unsupported_conversion(field, "text", target)),
        Value::Bool(_) | Value::Null | Value::Array(_) => {
            Err(Error::unsupported_conversion(field, value.kind(), target))
        }
    }
}

fn to_bool(field: &str, value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Integer(0) => Ok(false),
        Value::Integer(1) => Ok(true),
        Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Ok(true),
            "false" | "f" | "0" => Ok(false),
            _ => Err(Error::unsupported_conversion(field, "text", "boolean")),
        },
        _ => Err(Error::unsupported_conversion(field, value.kind(), "boolean")),
    }
}

/// 날짜/시각 문자열 파싱
///
/// `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS[.f]`, RFC 3339 순서로 시도합니다.
/// RFC 3339는 UTC로 정규화합니다.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(ts);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(ts);
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|ts| ts.naive_utc())
}

fn to_datetime(field: &str, value: &Value, target: &str) -> Result<NaiveDateTime> {
    match value {
        Value::Text(s) => parse_datetime(s)
            .ok_or_else(|| Error::unsupported_conversion(field, "text", target)),
        _ => Err(Error::unsupported_conversion(field, value.kind(), target)),
    }
}

fn array_items<'v>(field: &str, value: &'v Value) -> Result<&'v [Value]> {
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(Error::unsupported_conversion(field, value.kind(), "array")),
    }
}

/// 배열 요소 변환 (하나라도 실패하면 전체 실패)
fn coerce_elements(field: &str, items: &[Value], element: ElementType) -> Result<ArrayValues> {
    match element {
        ElementType::String => items
            .iter()
            .map(|v| to_text(field, v))
            .collect::<Result<Vec<_>>>()
            .map(ArrayValues::Text),
        ElementType::Int32 => items
            .iter()
            .map(|v| {
                let i = to_i64(field, v, "int32")?;
                i32::try_from(i).map_err(|_| Error::out_of_range(field, "int32", i))
            })
            .collect::<Result<Vec<_>>>()
            .map(ArrayValues::Int32),
        ElementType::Int64 => items
            .iter()
            .map(|v| to_i64(field, v, "int64"))
            .collect::<Result<Vec<_>>>()
            .map(ArrayValues::Int64),
    }
}
