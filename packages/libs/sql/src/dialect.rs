//! SQL dialect
//!
//! DB마다 다른 문법(식별자 인용, 파라미터 placeholder, upsert 절)은 dialect의
//! sea-query builder가 렌더링하고, 배열 표현은 이 trait이 정합니다.
//! 구문 조립 자체는 dialect와 무관합니다.

use std::fmt;
use std::str::FromStr;

use sea_query::{MysqlQueryBuilder, PostgresQueryBuilder, QueryBuilder};
use serde_json::json;
use tbl_core::schema::ElementType;
use tbl_core::Error;

use crate::value::{SqlType, SqlValue};

/// 변환이 끝난 배열 요소
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayValues {
    Text(Vec<String>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
}

impl ArrayValues {
    /// 요소 타입에 맞는 빈 배열
    pub fn empty(element: ElementType) -> Self {
        match element {
            ElementType::String => ArrayValues::Text(Vec::new()),
            ElementType::Int32 => ArrayValues::Int32(Vec::new()),
            ElementType::Int64 => ArrayValues::Int64(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ArrayValues::Text(v) => v.len(),
            ArrayValues::Int32(v) => v.len(),
            ArrayValues::Int64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// SQL dialect
pub trait Dialect: Send + Sync + fmt::Debug {
    /// dialect 이름 (로그용)
    fn name(&self) -> &'static str;

    /// 구문 렌더러 (`$n`/`?` placeholder, 인용 부호, upsert 절)
    fn query_builder(&self) -> &dyn QueryBuilder;

    /// 배열 파라미터
    fn array_value(&self, values: ArrayValues) -> SqlValue;

    /// 배열 컬럼의 바인딩/스캔 타입
    fn array_type(&self, element: ElementType) -> SqlType;
}

/// PostgreSQL: `$n` placeholder, `ON CONFLICT`, 네이티브 배열
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn query_builder(&self) -> &dyn QueryBuilder {
        &PostgresQueryBuilder
    }

    fn array_value(&self, values: ArrayValues) -> SqlValue {
        match values {
            ArrayValues::Text(v) => SqlValue::TextArray(v),
            ArrayValues::Int32(v) => SqlValue::Int32Array(v),
            ArrayValues::Int64(v) => SqlValue::Int64Array(v),
        }
    }

    fn array_type(&self, element: ElementType) -> SqlType {
        match element {
            ElementType::String => SqlType::TextArray,
            ElementType::Int32 => SqlType::Int32Array,
            ElementType::Int64 => SqlType::Int64Array,
        }
    }
}

/// MySQL: `?` placeholder, `ON DUPLICATE KEY UPDATE`, 배열은 JSON 컬럼
#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

impl Dialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    // 충돌 컬럼 없이 유니크 키로 판정 (`ON DUPLICATE KEY UPDATE`)
    fn query_builder(&self) -> &dyn QueryBuilder {
        &MysqlQueryBuilder
    }

    fn array_value(&self, values: ArrayValues) -> SqlValue {
        match values {
            ArrayValues::Text(v) => SqlValue::Json(json!(v)),
            ArrayValues::Int32(v) => SqlValue::Json(json!(v)),
            ArrayValues::Int64(v) => SqlValue::Json(json!(v)),
        }
    }

    fn array_type(&self, _element: ElementType) -> SqlType {
        SqlType::Json
    }
}

static POSTGRES: Postgres = Postgres;
static MYSQL: MySql = MySql;

/// 설정 문자열로 선택하는 dialect 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialectKind {
    Postgres,
    MySql,
}

impl DialectKind {
    pub fn dialect(&self) -> &'static dyn Dialect {
        match self {
            DialectKind::Postgres => &POSTGRES,
            DialectKind::MySql => &MYSQL,
        }
    }
}

impl FromStr for DialectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(DialectKind::Postgres),
            "mysql" | "mariadb" => Ok(DialectKind::MySql),
            other => Err(Error::bad_request(format!("unknown dialect: {}", other))),
        }
    }
}
