//! Bridge 에러 타입
//!
//! 드라이버 에러는 이 경계에서 엔진 공통 에러(`tbl_core::Error::Database`)로 바뀝니다.
//! 원본 에러는 로그에만 남깁니다.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Bridge 에러
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("core error: {0}")]
    Core(#[from] tbl_core::Error),
}

impl From<BridgeError> for tbl_core::Error {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Core(e) => e,
            BridgeError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                let message = match &e {
                    // 제약 조건 위반 등 DB가 돌려준 메시지는 그대로 전달
                    sqlx::Error::Database(db) => db.message().to_string(),
                    sqlx::Error::PoolTimedOut => "connection pool timed out".to_string(),
                    sqlx::Error::RowNotFound => "row not found".to_string(),
                    _ => "database operation failed".to_string(),
                };
                tbl_core::Error::database(message)
            }
        }
    }
}

/// 드라이버 에러를 엔진 에러로 변환
pub fn db_error(err: sqlx::Error) -> tbl_core::Error {
    BridgeError::from(err).into()
}

/// 응답 envelope
///
/// transport 상태 코드는 envelope의 `error_code`와 같습니다.
#[derive(Debug)]
pub struct EnvelopeResponse(pub tbl_core::response::Response);

impl IntoResponse for EnvelopeResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.error_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
