//! 필드 데이터 타입 정의
//!
//! 카탈로그가 선언하는 타입 문자열을 닫힌 enum으로 파싱합니다.
//! 실제 저장 타입 외에 쓰기 동작을 바꾸는 sentinel 타입(`_ignore`, `_auto_inc`,
//! `_creator`, `_updater`)과 `array`를 포함합니다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// 선언 데이터 타입
///
/// # JSON 직렬화
///
/// 문자열로 주고받습니다. 파싱은 별칭(`varchar`, `bigint` 등)을 허용하고,
/// 직렬화는 항상 정규 이름을 사용합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataType {
    /// 문자열 계열 (text, varchar, char, uuid)
    String,

    /// 16비트 정수
    Int16,

    /// 32비트 정수
    Int32,

    /// 64비트 정수
    Int64,

    /// 32비트 부동소수점 (real)
    Float32,

    /// 64비트 부동소수점 (double)
    Float64,

    /// 불리언
    Boolean,

    /// 날짜
    Date,

    /// 날짜 + 시각
    Timestamp,

    /// 문자열 배열
    TextArray,

    /// 요소 타입이 `ElementType`으로 지정되는 배열
    Array,

    /// 쓰기에서 제외
    Ignore,

    /// DB가 채우는 자동 증가 컬럼 (쓰기에서 제외)
    AutoInc,

    /// 생성자 (항상 호출자 ID로 기록)
    Creator,

    /// 수정자 (항상 호출자 ID로 기록)
    Updater,
}

impl DataType {
    /// 정규 타입 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::Boolean => "boolean",
            DataType::Date => "date",
            DataType::Timestamp => "timestamp",
            DataType::TextArray => "text_array",
            DataType::Array => "array",
            DataType::Ignore => "_ignore",
            DataType::AutoInc => "_auto_inc",
            DataType::Creator => "_creator",
            DataType::Updater => "_updater",
        }
    }

    /// 쓰기 동작을 바꾸는 sentinel 타입인지
    pub fn is_sentinel(&self) -> bool {
        matches!(
            self,
            DataType::Ignore | DataType::AutoInc | DataType::Creator | DataType::Updater
        )
    }

    /// INSERT/UPDATE 컬럼 목록에서 빠지는 타입인지
    pub fn is_skipped_on_write(&self) -> bool {
        matches!(self, DataType::Ignore | DataType::AutoInc)
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let data_type = match s.trim().to_ascii_lowercase().as_str() {
            "string" | "text" | "varchar" | "char" | "uuid" => DataType::String,
            "int16" | "smallint" => DataType::Int16,
            "int" | "int32" | "integer" => DataType::Int32,
            "int64" | "bigint" | "long" => DataType::Int64,
            "float32" | "real" => DataType::Float32,
            "float" | "float64" | "double" => DataType::Float64,
            "bool" | "boolean" => DataType::Boolean,
            "date" => DataType::Date,
            "datetime" | "timestamp" | "timestamptz" => DataType::Timestamp,
            "text_array" | "string_array" | "text[]" => DataType::TextArray,
            "array" => DataType::Array,
            "_ignore" => DataType::Ignore,
            "_auto_inc" => DataType::AutoInc,
            "_creator" => DataType::Creator,
            "_updater" => DataType::Updater,
            _ => {
                return Err(Error::InvalidDataType {
                    type_name: s.to_string(),
                })
            }
        };
        Ok(data_type)
    }
}

impl TryFrom<String> for DataType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DataType> for String {
    fn from(value: DataType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `array` 필드의 요소 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    #[default]
    String,
    Int32,
    Int64,
}

impl ElementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::String => "string",
            ElementType::Int32 => "int32",
            ElementType::Int64 => "int64",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
