//! 필드 정의
//!
//! 테이블의 필드 메타데이터와, 요청이 참조할 수 있는 필드 화이트리스트를 정의합니다.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::types::{DataType, ElementType};
use crate::error::{Error, Result};

/// 필드 정의
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// 필드 이름
    pub field_name: String,

    /// 선언 타입
    pub data_type: DataType,

    /// 필수 여부
    #[serde(default)]
    pub required: bool,

    /// 읽기 전용 (UPDATE 불가)
    #[serde(default)]
    pub read_only: bool,

    /// `array` 타입의 요소 타입
    #[serde(default)]
    pub element_type: Option<ElementType>,

    /// 설명
    #[serde(default)]
    pub desc: Option<String>,
}

impl FieldDef {
    pub fn new(field_name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            field_name: field_name.into(),
            data_type,
            required: false,
            read_only: false,
            element_type: None,
            desc: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_element_type(mut self, element_type: ElementType) -> Self {
        self.element_type = Some(element_type);
        self
    }

    /// `array` 요소 타입 (생략 시 string)
    pub fn element_type(&self) -> ElementType {
        self.element_type.unwrap_or_default()
    }

    /// INSERT 컬럼 목록에 포함되는지
    pub fn is_insertable(&self) -> bool {
        !self.data_type.is_skipped_on_write()
    }

    /// UPDATE SET 절에 호출자 값으로 지정할 수 있는지
    pub fn is_settable(&self) -> bool {
        !self.read_only && !self.data_type.is_sentinel()
    }
}

/// 테이블 하나의 필드 화이트리스트
///
/// 조건/정렬/수정 대상 필드는 반드시 이 집합에 있어야 합니다.
#[derive(Debug, Clone)]
pub struct FieldSet {
    table: String,
    fields: Vec<FieldDef>,
    index: HashMap<String, usize>,
}

impl FieldSet {
    /// 필드 집합 생성
    ///
    /// 테이블/필드 이름이 SQL 식별자 규칙을 어기면 `InvalidField`를 반환합니다.
    pub fn new(table: impl Into<String>, fields: Vec<FieldDef>) -> Result<Self> {
        let table = table.into();
        ensure_identifier(&table)?;

        let mut index = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            ensure_identifier(&field.field_name)?;
            index.insert(field.field_name.clone(), i);
        }

        Ok(Self {
            table,
            fields,
            index,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn get(&self, field_name: &str) -> Option<&FieldDef> {
        self.index.get(field_name).map(|&i| &self.fields[i])
    }

    pub fn contains(&self, field_name: &str) -> bool {
        self.index.contains_key(field_name)
    }

    /// 필드 조회 (없으면 `InvalidField`)
    pub fn require(&self, field_name: &str) -> Result<&FieldDef> {
        self.get(field_name)
            .ok_or_else(|| Error::invalid_field(format!("{}.{}", self.table, field_name)))
    }

    /// `field` 또는 `table.field` 형태의 이름을 이 테이블의 필드로 해석
    pub fn resolve(&self, name: &str) -> Option<&FieldDef> {
        match name.split_once('.') {
            Some((table, field)) if table == self.table => self.get(field),
            Some(_) => None,
            None => self.get(name),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `table.field` 형태의 정규화된 이름
    pub fn qualified(&self, field_name: &str) -> String {
        format!("{}.{}", self.table, field_name)
    }
}

/// SQL 식별자 검사 (`[A-Za-z_][A-Za-z0-9_]*`)
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// SQL 식별자가 아니면 `InvalidField`
pub fn ensure_identifier(name: &str) -> Result<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(Error::invalid_field(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> FieldSet {
        FieldSet::new(
            "users",
            vec![
                FieldDef::new("id", DataType::AutoInc),
                FieldDef::new("email", DataType::String).required(),
                FieldDef::new("created_by", DataType::Creator),
                FieldDef::new("score", DataType::Int32).read_only(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_plain_and_qualified() {
        let set = users();
        assert!(set.resolve("email").is_some());
        assert!(set.resolve("users.email").is_some());
        assert!(set.resolve("posts.email").is_none());
        assert!(set.resolve("password").is_none());
    }

    #[test]
    fn test_settable_fields() {
        let set = users();
        assert!(set.get("email").unwrap().is_settable());
        assert!(!set.get("created_by").unwrap().is_settable());
        assert!(!set.get("score").unwrap().is_settable());
        assert!(!set.get("id").unwrap().is_insertable());
    }

    #[test]
    fn test_identifier_rules() {
        assert!(is_identifier("user_id"));
        assert!(is_identifier("_private"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier("name; DROP TABLE users"));
        assert!(!is_identifier(""));
        assert!(FieldSet::new("users", vec![FieldDef::new("a b", DataType::String)]).is_err());
    }

    #[test]
    fn test_field_def_deserialization() {
        let json = r#"{
            "field_name": "tags",
            "data_type": "array",
            "required": true,
            "element_type": "int32"
        }"#;
        let def: FieldDef = serde_json::from_str(json).unwrap();
        assert_eq!(def.data_type, DataType::Array);
        assert_eq!(def.element_type(), ElementType::Int32);
        assert!(def.required);
        assert!(!def.read_only);
    }
}
