//! 응답 envelope
//!
//! 성공/실패 모두 같은 JSON 형태로 반환합니다.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::Error;
use crate::request::RequestKind;

/// 결과 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultType {
    Query,
    Insert,
    Update,
    Delete,
    Error,
}

impl From<RequestKind> for ResultType {
    fn from(kind: RequestKind) -> Self {
        match kind {
            RequestKind::Query => ResultType::Query,
            RequestKind::Insert => ResultType::Insert,
            RequestKind::Update => ResultType::Update,
            RequestKind::Delete => ResultType::Delete,
        }
    }
}

/// 응답 envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub status: bool,

    #[serde(default)]
    pub error_msg: String,

    pub req_id: String,

    pub result_type: ResultType,

    /// 조회 건수 또는 영향받은 행 수
    pub num_records: u64,

    #[serde(default)]
    pub table_name: String,

    #[serde(default)]
    pub results: Vec<Json>,

    /// transport 상태 코드와 동일한 값 (200/400/401/500)
    pub error_code: u16,

    /// 로그 상관관계용 위치 태그
    #[serde(default)]
    pub loc: String,
}

impl Response {
    /// 성공 응답
    pub fn success(
        req_id: impl Into<String>,
        result_type: ResultType,
        table_name: impl Into<String>,
        num_records: u64,
        results: Vec<Json>,
    ) -> Self {
        Self {
            status: true,
            error_msg: String::new(),
            req_id: req_id.into(),
            result_type,
            num_records,
            table_name: table_name.into(),
            results,
            error_code: 200,
            loc: String::new(),
        }
    }

    /// 실패 응답
    pub fn failure(
        req_id: impl Into<String>,
        table_name: impl Into<String>,
        error: &Error,
        loc: impl Into<String>,
    ) -> Self {
        Self {
            status: false,
            error_msg: error.to_string(),
            req_id: req_id.into(),
            result_type: ResultType::Error,
            num_records: 0,
            table_name: table_name.into(),
            results: Vec::new(),
            error_code: error.status_code(),
            loc: loc.into(),
        }
    }
}
