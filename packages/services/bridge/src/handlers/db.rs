//! /db 핸들러
//!
//! 본문은 JSON 요청 envelope이고, 응답은 항상 envelope입니다.
//! HTTP 상태 코드는 envelope의 `error_code`를 따릅니다.

use std::sync::Arc;

use axum::{body::Bytes, extract::State, http::HeaderMap};
use uuid::Uuid;

use crate::error::EnvelopeResponse;
use crate::middleware::current_request_id;
use crate::state::AppState;

/// 상위 게이트웨이가 인증한 사용자 ID 헤더
pub const USER_ID_HEADER: &str = "x-user-id";

/// /db 핸들러
pub async fn handle_db(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> EnvelopeResponse {
    let req_id = current_request_id().unwrap_or_else(|| Uuid::new_v4().to_string());
    let credential = headers.get(USER_ID_HEADER).and_then(|v| v.to_str().ok());

    // 서버 종료 시 진행 중인 구문도 취소
    let cancel = state.shutdown.child_token();
    let response = state
        .engine
        .handle(&req_id, credential, &body, cancel)
        .await;
    EnvelopeResponse(response)
}
