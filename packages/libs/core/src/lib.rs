//! tbl-core: 쿼리 엔진 공통 핵심 라이브러리
//!
//! 이 크레이트는 SQL 컴파일러(tbl-sql)와 Bridge 서비스가 공유하는 타입을 제공합니다.
//!
//! # 모듈 구조
//!
//! - `schema`: 필드 정의, 선언 데이터 타입, 필드 화이트리스트
//! - `catalog`: 읽기 위주의 필드 카탈로그 저장소
//! - `request`: 요청 envelope (조회/삽입/수정/삭제, 조건 트리, 조인)
//! - `response`: 응답 envelope
//! - `value`: 요청 값 sum type
//! - `identity`: 호출자 신원
//! - `error`: 공통 에러 타입

pub mod catalog;
pub mod error;
pub mod identity;
pub mod request;
pub mod response;
pub mod schema;
pub mod value;

pub use error::{Error, ErrorClass, Result};
pub use value::Value;
