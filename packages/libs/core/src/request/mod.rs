//! 요청 타입
//!
//! `request_type`으로 구분되는 JSON 요청 envelope를 파싱합니다.
//! 필수 항목 검증은 디스패처가 수행하므로 대부분의 필드는 기본값을 가집니다.
//!
//! # 모듈 구조
//!
//! - `condition`: 재귀 조건 트리
//! - `join`: 조인/ON 절 정의

mod condition;
mod join;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

pub use condition::{CondDef, CondKind};
pub use join::{JoinDef, JoinType, OnClauseDef};

use crate::error::{Error, Result};
use crate::schema::FieldDef;

/// 레코드 (필드 이름 -> JSON 값)
pub type Record = Map<String, Json>;

/// 요청 envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "request_type", rename_all = "snake_case")]
pub enum Request {
    Query(QueryRequest),
    Insert(InsertRequest),
    Update(UpdateRequest),
    Delete(DeleteRequest),
}

/// 요청 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Query,
    Insert,
    Update,
    Delete,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Query => "query",
            RequestKind::Insert => "insert",
            RequestKind::Update => "update",
            RequestKind::Delete => "delete",
        }
    }

    /// 데이터를 변경하는 요청인지
    pub fn is_mutation(&self) -> bool {
        !matches!(self, RequestKind::Query)
    }
}

impl Request {
    /// JSON 본문에서 파싱
    pub fn from_json(body: Json) -> Result<Self> {
        serde_json::from_value(body)
            .map_err(|e| Error::bad_request(format!("invalid request: {}", e)))
    }

    pub fn kind(&self) -> RequestKind {
        match self {
            Request::Query(_) => RequestKind::Query,
            Request::Insert(_) => RequestKind::Insert,
            Request::Update(_) => RequestKind::Update,
            Request::Delete(_) => RequestKind::Delete,
        }
    }

    pub fn db_name(&self) -> &str {
        match self {
            Request::Query(r) => &r.db_name,
            Request::Insert(r) => &r.db_name,
            Request::Update(r) => &r.db_name,
            Request::Delete(r) => &r.db_name,
        }
    }

    pub fn table_name(&self) -> &str {
        match self {
            Request::Query(r) => &r.table_name,
            Request::Insert(r) => &r.table_name,
            Request::Update(r) => &r.table_name,
            Request::Delete(r) => &r.table_name,
        }
    }
}

/// 정렬 조건
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderbyDef {
    pub field_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,

    #[serde(default = "default_true")]
    pub is_asc: bool,
}

fn default_true() -> bool {
    true
}

/// 조회 요청
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub db_name: String,

    #[serde(default)]
    pub table_name: String,

    #[serde(default)]
    pub condition: Option<CondDef>,

    #[serde(default)]
    pub join_def: Vec<JoinDef>,

    /// 주 테이블 필드 카탈로그 (조건 화이트리스트)
    #[serde(default)]
    pub field_defs: Vec<FieldDef>,

    /// `"<table>.<field>[:<alias>]"` 형식의 선택 컬럼
    #[serde(default)]
    pub field_names: Vec<String>,

    #[serde(default)]
    pub orderby_def: Vec<OrderbyDef>,

    #[serde(default)]
    pub start: i64,

    #[serde(default)]
    pub page_size: i64,
}

/// 삽입 요청
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsertRequest {
    #[serde(default)]
    pub db_name: String,

    #[serde(default)]
    pub table_name: String,

    #[serde(default)]
    pub records: Vec<Record>,

    #[serde(default)]
    pub field_defs: Vec<FieldDef>,

    /// 충돌 판정 컬럼 (비어 있지 않으면 upsert)
    #[serde(default)]
    pub on_conflict_cols: Vec<String>,

    /// 충돌 시 갱신할 컬럼
    #[serde(default)]
    pub on_conflict_update_cols: Vec<String>,
}

/// 수정 항목
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEntry {
    pub field_name: String,

    #[serde(default)]
    pub value: Json,
}

/// 수정 요청
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRequest {
    #[serde(default)]
    pub db_name: String,

    #[serde(default)]
    pub table_name: String,

    #[serde(default)]
    pub field_defs: Vec<FieldDef>,

    /// 수정할 값 (필드 이름 -> 값)
    #[serde(default)]
    pub record: Option<Record>,

    /// 수정할 값 목록 (`record`와 병합, 같은 필드는 이쪽이 우선)
    #[serde(default)]
    pub update_def: Vec<UpdateEntry>,

    #[serde(default)]
    pub condition: Option<CondDef>,

    /// 수정 후 대상 레코드를 다시 조회해서 반환
    #[serde(default)]
    pub need_record: bool,

    /// `need_record` 재조회 컬럼 (생략 시 선언된 모든 필드)
    #[serde(default)]
    pub field_names: Vec<String>,
}

impl UpdateRequest {
    /// `record`와 `update_def`를 병합한 수정 항목
    pub fn entries(&self) -> Vec<(String, Json)> {
        let mut entries: Vec<(String, Json)> = self
            .record
            .iter()
            .flat_map(|r| r.iter().map(|(k, v)| (k.clone(), v.clone())))
            .collect();

        for entry in &self.update_def {
            match entries.iter_mut().find(|(k, _)| *k == entry.field_name) {
                Some(existing) => existing.1 = entry.value.clone(),
                None => entries.push((entry.field_name.clone(), entry.value.clone())),
            }
        }
        entries
    }
}

/// 삭제 요청
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteRequest {
    #[serde(default)]
    pub db_name: String,

    #[serde(default)]
    pub table_name: String,

    #[serde(default)]
    pub field_defs: Vec<FieldDef>,

    #[serde(default)]
    pub condition: Option<CondDef>,
}
