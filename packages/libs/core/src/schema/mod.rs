//! 필드/타입 카탈로그 타입
//!
//! # 개요
//!
//! 카탈로그 자체(저장, 갱신)는 외부 협력자의 몫이고, 이 모듈은 엔진이 소비하는
//! 필드 정의와 타입만 정의합니다.
//!
//! # 모듈 구조
//!
//! - `types`: 선언 데이터 타입 (sentinel 포함)
//! - `field`: 필드 정의와 화이트리스트

mod field;
mod types;

pub use field::{ensure_identifier, is_identifier, FieldDef, FieldSet};
pub use types::{DataType, ElementType};
