//! 실행 가능한 구문
//!
//! sea-query로 조립한 구문을 dialect의 query builder로 렌더링합니다.
//! placeholder 번호는 구문 전체에 걸쳐 매겨지고, 값은 `params`로만 전달됩니다.

use std::fmt::Write;

use sea_query::{Iden, QueryStatementBuilder};
use tbl_core::Result;

use crate::dialect::Dialect;
use crate::value::SqlValue;

/// 동적 테이블/컬럼 식별자
///
/// 렌더링 시 dialect의 인용 부호로 감싸집니다 (`"x"`, `` `x` ``).
#[derive(Debug, Clone)]
pub(crate) struct DynIden(pub String);

impl Iden for DynIden {
    fn unquoted(&self, s: &mut dyn Write) {
        let _ = s.write_str(&self.0);
    }
}

impl DynIden {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// `table.field` 컬럼 참조
pub(crate) fn column_ref(table: &str, field: &str) -> (DynIden, DynIden) {
    (DynIden::new(table), DynIden::new(field))
}

/// 실행 가능한 구문
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    /// dialect로 렌더링
    pub fn build<S>(statement: &S, dialect: &dyn Dialect) -> Result<Self>
    where
        S: QueryStatementBuilder,
    {
        let (sql, values) = statement.build_any(dialect.query_builder());
        let params = values
            .0
            .into_iter()
            .map(SqlValue::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { sql, params })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySql, Postgres};
    use sea_query::{ConditionalStatement, Expr, Query, Value};

    #[test]
    fn test_identifiers_are_quoted_per_dialect() {
        let mut query = Query::select();
        query
            .expr_as(Expr::col(column_ref("t", "order")), DynIden::new("order"))
            .from(DynIden::new("t"))
            .and_where(Expr::col(column_ref("t", "user")).eq(Value::from(SqlValue::from("x"))));

        let pg = Statement::build(&query, &Postgres).unwrap();
        assert_eq!(
            pg.sql,
            r#"SELECT "t"."order" AS "order" FROM "t" WHERE "t"."user" = $1"#
        );
        assert_eq!(pg.params, vec![SqlValue::from("x")]);

        let my = Statement::build(&query, &MySql).unwrap();
        assert_eq!(
            my.sql,
            "SELECT `t`.`order` AS `order` FROM `t` WHERE `t`.`user` = ?"
        );
    }
}
