//! tbl-bridge: 쿼리 엔진 HTTP 서비스
//!
//! JSON 요청 envelope을 받아 설정된 DB(PostgreSQL/MySQL)에서 실행하고
//! 응답 envelope을 돌려줍니다.
//!
//! # 모듈 구조
//!
//! - `dispatch`: 요청 단계 처리 (인증 → 파싱 → 컴파일 → 실행 → 변환)
//! - `writer`: 배치 INSERT 실행기
//! - `db`: DB 드라이버와 트랜잭션
//! - `context`: 마감 시각/취소 전달
//! - `audit`: 활동 로그
//! - `handlers`, `middleware`: HTTP 계층

pub mod audit;
pub mod config;
pub mod context;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;
pub mod writer;

use std::sync::Arc;

use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use dispatch::Engine;
pub use state::AppState;

/// 라우터 생성
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/db", post(handlers::db::handle_db))
        .route("/health", get(handlers::health::health_check))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(from_fn(middleware::request_id))
        .with_state(state)
}
