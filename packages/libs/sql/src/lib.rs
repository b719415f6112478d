//! tbl-sql: dialect별 SQL 컴파일러
//!
//! 선언적 요청(조건 트리, 조인, 레코드)을 파라미터화된 SQL 구문으로 변환하고,
//! 조회 결과 행을 JSON 객체로 되돌립니다. I/O는 하지 않습니다.
//!
//! # 모듈 구조
//!
//! - `dialect`: 구문 렌더러와 배열 표현 차이
//! - `statement`: sea-query 구문 -> 실행 가능한 구문
//! - `compiler`: 조건 트리 -> WHERE 조건
//! - `coerce`: 호출자 값 -> 선언 타입 값
//! - `columns`: 선택 컬럼/별칭 파싱
//! - `join`: 조인 절 생성
//! - `builder`: CRUD 구문 빌더
//! - `materialize`: 결과 행 -> JSON

pub mod builder;
pub mod coerce;
pub mod columns;
pub mod compiler;
pub mod dialect;
pub mod join;
pub mod materialize;
pub mod statement;
pub mod value;

pub use builder::{
    DeleteBuilder, InsertBuilder, Page, SelectBuilder, SelectPlan, UpdateBuilder, Upsert,
};
pub use coerce::{Coercer, WriteMode};
pub use compiler::{compile, ConditionCompiler, Operator};
pub use dialect::{Dialect, DialectKind, MySql, Postgres};
pub use materialize::Materializer;
pub use statement::Statement;
pub use value::{SqlType, SqlValue};
