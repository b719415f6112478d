//! 조인 정의

use serde::{Deserialize, Serialize};

use crate::schema::FieldDef;

/// ON 절 하나
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnClauseDef {
    /// FROM 쪽 테이블의 필드
    pub source_field_name: String,

    /// 조인되는 테이블의 필드
    pub joined_field_name: String,

    /// 비교 연산자 (생략 시 "=")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_opr: Option<String>,
}

impl OnClauseDef {
    pub fn new(source: impl Into<String>, joined: impl Into<String>) -> Self {
        Self {
            source_field_name: source.into(),
            joined_field_name: joined.into(),
            join_opr: None,
        }
    }

    pub fn operator(&self) -> &str {
        self.join_opr.as_deref().unwrap_or("=")
    }
}

/// 조인 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    #[default]
    Join,
    LeftJoin,
    RightJoin,
    InnerJoin,
}

/// 조인 정의
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinDef {
    /// 기준 테이블 (주 테이블 또는 앞서 조인된 테이블)
    pub from_table_name: String,

    /// 조인할 테이블
    pub joined_table_name: String,

    /// ON 절 목록 (비어 있으면 이 조인은 건너뜀)
    #[serde(default)]
    pub on_clause: Vec<OnClauseDef>,

    #[serde(default)]
    pub join_type: JoinType,

    /// `"<table>.<field>[:<alias>]"` 형식의 추가 선택 컬럼
    #[serde(default)]
    pub selected_fields: Vec<String>,

    /// 기준 테이블 필드 카탈로그 (생략 시 카탈로그 저장소 조회)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_field_defs: Option<Vec<FieldDef>>,

    /// 조인 테이블 필드 카탈로그 (생략 시 카탈로그 저장소 조회)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined_field_defs: Option<Vec<FieldDef>>,

    /// 지정 시 선택 컬럼을 이 이름의 하위 객체로 묶음
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed_name: Option<String>,
}

impl JoinDef {
    pub fn new(from: impl Into<String>, joined: impl Into<String>) -> Self {
        Self {
            from_table_name: from.into(),
            joined_table_name: joined.into(),
            on_clause: Vec::new(),
            join_type: JoinType::default(),
            selected_fields: Vec::new(),
            from_field_defs: None,
            joined_field_defs: None,
            embed_name: None,
        }
    }

    pub fn on(mut self, clause: OnClauseDef) -> Self {
        self.on_clause.push(clause);
        self
    }

    pub fn join_type(mut self, join_type: JoinType) -> Self {
        self.join_type = join_type;
        self
    }

    pub fn select(mut self, field: impl Into<String>) -> Self {
        self.selected_fields.push(field.into());
        self
    }

    pub fn embed(mut self, name: impl Into<String>) -> Self {
        self.embed_name = Some(name.into());
        self
    }
}
