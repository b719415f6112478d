//! 조건 컴파일러
//!
//! 재귀 조건 트리(`CondDef`)를 sea-query `Condition`으로 변환합니다.
//!
//! - 필드 이름은 화이트리스트(`FieldSet`)에 있어야 SQL에 들어갑니다.
//! - 값은 항상 바인딩 파라미터로만 전달됩니다.
//! - `null` 노드와 모든 자식이 `null`인 그룹은 "조건 없음"(전체 일치)입니다.

use sea_query::{Condition, Expr, LikeExpr, SimpleExpr, Value as QueryValue};
use tbl_core::request::{CondDef, CondKind};
use tbl_core::schema::{DataType, FieldSet};
use tbl_core::{Error, Result, Value};

use crate::coerce::parse_datetime;
use crate::statement::{column_ref, DynIden};
use crate::value::{SqlType, SqlValue};

/// `contain`/`prefix` 패턴의 LIKE 이스케이프 문자
pub const LIKE_ESCAPE: char = '!';

/// 비교 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// 부분 문자열 (`LIKE %v%`)
    Contain,
    /// 접두사 (`LIKE v%`)
    Prefix,
}

impl Operator {
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim() {
            "=" => Ok(Operator::Eq),
            "<>" => Ok(Operator::Ne),
            ">" => Ok(Operator::Gt),
            ">=" => Ok(Operator::Gte),
            "<" => Ok(Operator::Lt),
            "<=" => Ok(Operator::Lte),
            "contain" => Ok(Operator::Contain),
            "prefix" => Ok(Operator::Prefix),
            other => Err(Error::UnsupportedOperator {
                operator: other.to_string(),
            }),
        }
    }

    /// 비교식 생성
    ///
    /// LIKE 계열(`contain`, `prefix`)은 비교 연산자가 아니므로 `None`입니다.
    /// 조인 ON 절은 비교 연산자만 허용합니다.
    pub fn compare(&self, left: Expr, right: impl Into<SimpleExpr>) -> Option<SimpleExpr> {
        let right = right.into();
        let expr = match self {
            Operator::Eq => left.eq(right),
            Operator::Ne => left.ne(right),
            Operator::Gt => left.gt(right),
            Operator::Gte => left.gte(right),
            Operator::Lt => left.lt(right),
            Operator::Lte => left.lte(right),
            Operator::Contain | Operator::Prefix => return None,
        };
        Some(expr)
    }
}

/// 조건 컴파일러
#[derive(Debug, Clone, Copy)]
pub struct ConditionCompiler<'a> {
    fields: &'a FieldSet,
    qualify: bool,
}

impl<'a> ConditionCompiler<'a> {
    pub fn new(fields: &'a FieldSet) -> Self {
        Self {
            fields,
            qualify: false,
        }
    }

    /// 컬럼을 `table.field`로 렌더링 (조인이 있는 SELECT용)
    pub fn qualified(mut self) -> Self {
        self.qualify = true;
        self
    }

    /// 조건 트리 컴파일
    ///
    /// # Returns
    /// `None`이면 조건 없음 (WHERE 절 생략)
    pub fn compile(&self, cond: &CondDef) -> Result<Option<Condition>> {
        match cond.kind()? {
            CondKind::Null => Ok(None),
            CondKind::Atomic => {
                let expr = self.compile_atomic(cond)?;
                Ok(Some(Condition::all().add(expr)))
            }
            kind @ (CondKind::And | CondKind::Or) => self.compile_group(kind, &cond.conditions),
        }
    }

    /// 선택적 조건 컴파일 (요청에 조건이 없으면 `None`)
    pub fn compile_opt(&self, cond: Option<&CondDef>) -> Result<Option<Condition>> {
        match cond {
            Some(c) => self.compile(c),
            None => Ok(None),
        }
    }

    fn compile_group(&self, kind: CondKind, children: &[CondDef]) -> Result<Option<Condition>> {
        if children.is_empty() {
            return Err(Error::EmptyConditionGroup {
                group: kind.as_str().to_string(),
            });
        }

        let mut group = match kind {
            CondKind::Or => Condition::any(),
            _ => Condition::all(),
        };
        let mut matched = false;
        for child in children {
            if let Some(part) = self.compile(child)? {
                group = group.add(part);
                matched = true;
            }
        }
        Ok(matched.then_some(group))
    }

    fn compile_atomic(&self, cond: &CondDef) -> Result<SimpleExpr> {
        let name = cond.field_name.as_deref().unwrap_or_default();
        let field = self
            .fields
            .resolve(name)
            .ok_or_else(|| Error::invalid_field(name))?;
        let op = Operator::parse(cond.opr.as_deref().unwrap_or_default())?;
        let value = Value::try_from(&cond.value)?;

        let column = if self.qualify {
            Expr::col(column_ref(self.fields.table(), &field.field_name))
        } else {
            Expr::col(DynIden::new(&field.field_name))
        };

        if !matches!(op, Operator::Contain | Operator::Prefix) {
            let param = bind_scalar(name, field.data_type, value)?;
            return op
                .compare(column, QueryValue::from(param))
                .ok_or_else(|| Error::UnsupportedOperator {
                    operator: cond.opr.clone().unwrap_or_default(),
                });
        }

        // LIKE는 호출자가 밝힌 타입과 선언 타입이 모두 문자열이어야 함
        let requested = cond
            .data_type
            .as_deref()
            .map(str::parse::<DataType>)
            .transpose()?;
        if requested != Some(DataType::String) {
            return Err(Error::unsupported_conversion(
                name,
                requested.map(|t| t.as_str()).unwrap_or("none"),
                "string",
            ));
        }
        if field.data_type != DataType::String {
            return Err(Error::unsupported_conversion(
                name,
                field.data_type.as_str(),
                "string",
            ));
        }
        let text = value
            .as_text()
            .ok_or_else(|| Error::unsupported_conversion(name, value.kind(), "string"))?;
        let escaped = escape_like(text);
        let pattern = match op {
            Operator::Contain => format!("%{}%", escaped),
            _ => format!("{}%", escaped),
        };
        Ok(column.like(LikeExpr::new(pattern).escape(LIKE_ESCAPE)))
    }
}

/// LIKE 메타 문자(`%`, `_`, 이스케이프 문자)를 글자 그대로 매칭하도록 이스케이프
pub fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            out.push(LIKE_ESCAPE);
        }
        out.push(c);
    }
    out
}

/// 비교 값은 런타임 형태 그대로 바인딩
///
/// 날짜/시각 필드에 온 문자열만 선언 타입으로 파싱합니다.
fn bind_scalar(field: &str, declared: DataType, value: Value) -> Result<SqlValue> {
    match value {
        Value::Text(s) if matches!(declared, DataType::Date | DataType::Timestamp) => {
            let parsed = parse_datetime(&s)
                .ok_or_else(|| Error::unsupported_conversion(field, "text", declared.as_str()))?;
            Ok(match declared {
                DataType::Date => SqlValue::Date(parsed.date()),
                _ => SqlValue::Timestamp(parsed),
            })
        }
        Value::Text(s) => Ok(SqlValue::Text(s)),
        Value::Integer(i) => Ok(SqlValue::Int64(i)),
        Value::Float(f) => Ok(SqlValue::Float64(f)),
        Value::Bool(b) => Ok(SqlValue::Bool(b)),
        Value::Null => Ok(SqlValue::Null(SqlType::Text)),
        Value::Array(_) => Err(Error::unsupported_conversion(field, "array", "scalar")),
    }
}

/// 조건 트리 컴파일 (비정규화 컬럼)
pub fn compile(cond: &CondDef, fields: &FieldSet) -> Result<Option<Condition>> {
    ConditionCompiler::new(fields).compile(cond)
}
