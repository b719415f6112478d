//! 조건 트리 정의
//!
//! 호출자 JSON의 재귀 조건 트리를 그대로 받습니다.
//! `type` 해석과 검증은 컴파일 시점에 수행되므로 여기서는 느슨하게 역직렬화합니다.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::{Error, Result};

/// 조건 노드 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CondKind {
    /// 단일 비교
    Atomic,
    /// 모든 하위 조건 만족
    And,
    /// 하위 조건 중 하나 이상 만족
    Or,
    /// 조건 없음
    Null,
}

impl CondKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "atomic" => Ok(CondKind::Atomic),
            "and" => Ok(CondKind::And),
            "or" => Ok(CondKind::Or),
            "null" | "" => Ok(CondKind::Null),
            other => Err(Error::UnknownConditionType {
                cond_type: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CondKind::Atomic => "atomic",
            CondKind::And => "and",
            CondKind::Or => "or",
            CondKind::Null => "null",
        }
    }
}

/// 조건 정의
///
/// # 예시
///
/// ```json
/// { "type": "atomic", "field_name": "status", "data_type": "string", "opr": "=", "value": "active" }
/// { "type": "or", "conditions": [ { "type": "atomic", ... }, { "type": "atomic", ... } ] }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CondDef {
    /// `atomic`, `and`, `or`, `null`
    #[serde(rename = "type", default)]
    pub cond_type: String,

    /// 비교 대상 필드 (atomic)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,

    /// 비교 대상 필드의 선언 타입 (atomic)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,

    /// 연산자 (atomic)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opr: Option<String>,

    /// 비교 값 (atomic)
    #[serde(default, skip_serializing_if = "Json::is_null")]
    pub value: Json,

    /// 하위 조건 (and/or)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<CondDef>,
}

impl CondDef {
    /// 조건 없음
    pub fn null() -> Self {
        Self {
            cond_type: "null".to_string(),
            ..Default::default()
        }
    }

    /// 단일 비교 조건
    pub fn atomic(
        field_name: impl Into<String>,
        data_type: impl Into<String>,
        opr: impl Into<String>,
        value: Json,
    ) -> Self {
        Self {
            cond_type: "atomic".to_string(),
            field_name: Some(field_name.into()),
            data_type: Some(data_type.into()),
            opr: Some(opr.into()),
            value,
            conditions: Vec::new(),
        }
    }

    pub fn and(conditions: Vec<CondDef>) -> Self {
        Self {
            cond_type: "and".to_string(),
            conditions,
            ..Default::default()
        }
    }

    pub fn or(conditions: Vec<CondDef>) -> Self {
        Self {
            cond_type: "or".to_string(),
            conditions,
            ..Default::default()
        }
    }

    /// 노드 종류 해석
    pub fn kind(&self) -> Result<CondKind> {
        CondKind::parse(&self.cond_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_condition_deserialization() {
        let cond: CondDef = serde_json::from_value(json!({
            "type": "and",
            "conditions": [
                { "type": "atomic", "field_name": "status", "data_type": "string", "opr": "=", "value": "active" },
                { "type": "or", "conditions": [
                    { "type": "atomic", "field_name": "age", "data_type": "int32", "opr": ">", "value": 18 },
                    { "type": "null" }
                ]}
            ]
        }))
        .unwrap();

        assert_eq!(cond.kind().unwrap(), CondKind::And);
        assert_eq!(cond.conditions.len(), 2);
        assert_eq!(cond.conditions[0].field_name.as_deref(), Some("status"));
        assert_eq!(cond.conditions[1].conditions[1].kind().unwrap(), CondKind::Null);
    }

    #[test]
    fn test_unknown_kind() {
        let cond = CondDef {
            cond_type: "xor".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            cond.kind(),
            Err(Error::UnknownConditionType { .. })
        ));
    }
}
