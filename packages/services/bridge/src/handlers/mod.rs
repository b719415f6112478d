//! HTTP 핸들러
//!
//! - `db`: 요청 envelope 처리 (`POST /db`)
//! - `health`: 헬스 체크 (`GET /health`)

pub mod db;
pub mod health;
