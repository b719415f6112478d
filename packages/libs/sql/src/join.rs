//! 조인 빌더
//!
//! 조인 정의 목록을 JOIN 절과 추가 선택 컬럼으로 변환합니다.
//!
//! 각 테이블의 필드 카탈로그는 다음 순서로 찾습니다.
//! 1. 조인 정의에 인라인으로 포함된 필드 정의
//! 2. 앞에서 이미 해석된 테이블 (주 테이블 포함)
//! 3. 카탈로그 저장소

use std::collections::HashMap;

use sea_query::{Condition, Expr, SelectStatement};
use tbl_core::catalog::FieldCatalog;
use tbl_core::request::{JoinDef, JoinType};
use tbl_core::schema::{ensure_identifier, FieldDef, FieldSet};
use tbl_core::{Error, Result};

use crate::columns::{ensure_embed_name, SelectedColumn};
use crate::compiler::Operator;
use crate::statement::{column_ref, DynIden};

/// 조인 절 하나 (`LEFT JOIN b ON a.x = b.y`)
#[derive(Debug, Clone)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: String,
    pub on: Condition,
}

impl JoinClause {
    fn sea_join_type(&self) -> sea_query::JoinType {
        match self.join_type {
            JoinType::Join => sea_query::JoinType::Join,
            JoinType::LeftJoin => sea_query::JoinType::LeftJoin,
            JoinType::RightJoin => sea_query::JoinType::RightJoin,
            JoinType::InnerJoin => sea_query::JoinType::InnerJoin,
        }
    }
}

/// 조인 빌드 결과
#[derive(Debug, Clone, Default)]
pub struct JoinPlan {
    /// 조인 절 (입력 순서)
    pub clauses: Vec<JoinClause>,
    /// 추가 선택 컬럼 (embed 별칭 적용 후)
    pub columns: Vec<SelectedColumn>,
    /// `table.field` -> 필드 정의
    pub field_types: HashMap<String, FieldDef>,
    /// 해석된 테이블별 필드 집합 (주 테이블 포함)
    pub tables: HashMap<String, FieldSet>,
}

impl JoinPlan {
    /// `table.field` 또는 주 테이블 기준 `field`를 (테이블 이름, 필드 정의)로 해석
    pub fn resolve(&self, main_table: &str, name: &str) -> Option<(&str, &FieldDef)> {
        let (table, field) = name.split_once('.').unwrap_or((main_table, name));
        let (key, set) = self.tables.get_key_value(table)?;
        Some((key.as_str(), set.get(field)?))
    }

    /// SELECT 구문에 조인 절 추가
    pub fn apply(&self, query: &mut SelectStatement) {
        for clause in &self.clauses {
            query.join(
                clause.sea_join_type(),
                DynIden::new(clause.table.as_str()),
                clause.on.clone(),
            );
        }
    }
}

/// 조인 빌더
pub struct JoinBuilder<'a> {
    main: &'a FieldSet,
    catalog: &'a dyn FieldCatalog,
}

impl<'a> JoinBuilder<'a> {
    pub fn new(main: &'a FieldSet, catalog: &'a dyn FieldCatalog) -> Self {
        Self { main, catalog }
    }

    pub fn build(&self, joins: &[JoinDef]) -> Result<JoinPlan> {
        let mut plan = JoinPlan::default();
        plan.tables
            .insert(self.main.table().to_string(), self.main.clone());

        for join in joins {
            if join.on_clause.is_empty() {
                tracing::debug!(
                    joined = %join.joined_table_name,
                    "join without on clause skipped"
                );
                continue;
            }

            let from = self.resolve_table(
                &plan,
                &join.from_table_name,
                join.from_field_defs.as_deref(),
            )?;
            let joined = self.resolve_table(
                &plan,
                &join.joined_table_name,
                join.joined_field_defs.as_deref(),
            )?;

            let mut on_cond = Condition::all();
            for on in &join.on_clause {
                let source = from.require(&on.source_field_name)?;
                let target = joined.require(&on.joined_field_name)?;
                let expr = Operator::parse(on.operator())?
                    .compare(
                        Expr::col(column_ref(from.table(), &source.field_name)),
                        Expr::col(column_ref(joined.table(), &target.field_name)),
                    )
                    .ok_or_else(|| Error::UnsupportedOperator {
                        operator: on.operator().to_string(),
                    })?;
                on_cond = on_cond.add(expr);
            }

            plan.clauses.push(JoinClause {
                join_type: join.join_type,
                table: joined.table().to_string(),
                on: on_cond,
            });

            plan.tables.insert(from.table().to_string(), from);
            plan.tables.insert(joined.table().to_string(), joined);

            if let Some(embed) = &join.embed_name {
                ensure_embed_name(embed)?;
            }
            for spec in &join.selected_fields {
                let column = SelectedColumn::parse(spec, &join.joined_table_name)?;
                let def = plan
                    .tables
                    .get(&column.table)
                    .and_then(|t| t.get(&column.field))
                    .ok_or_else(|| Error::invalid_field(column.qualified()))?
                    .clone();
                plan.field_types.insert(column.qualified(), def);
                let column = match &join.embed_name {
                    Some(embed) => column.embedded(embed),
                    None => column,
                };
                plan.columns.push(column);
            }
        }

        Ok(plan)
    }

    fn resolve_table(
        &self,
        plan: &JoinPlan,
        table: &str,
        inline: Option<&[FieldDef]>,
    ) -> Result<FieldSet> {
        ensure_identifier(table)?;
        if let Some(defs) = inline {
            return FieldSet::new(table, defs.to_vec());
        }
        if let Some(known) = plan.tables.get(table) {
            return Ok(known.clone());
        }
        match self.catalog.lookup(table) {
            Some(defs) => FieldSet::new(table, defs.to_vec()),
            None => Err(Error::bad_request(format!(
                "no field catalog for table: {}",
                table
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Postgres;
    use crate::statement::Statement;
    use sea_query::Query;
    use std::collections::HashMap;
    use tbl_core::catalog::CatalogStore;
    use tbl_core::request::OnClauseDef;
    use tbl_core::schema::DataType;

    fn users() -> FieldSet {
        FieldSet::new(
            "users",
            vec![
                FieldDef::new("id", DataType::Int64),
                FieldDef::new("name", DataType::String),
            ],
        )
        .unwrap()
    }

    /// 조인 절만 붙인 SELECT 렌더링
    fn render(plan: &JoinPlan) -> String {
        let mut query = Query::select();
        query
            .column(column_ref("users", "id"))
            .from(DynIden::new("users"));
        plan.apply(&mut query);
        Statement::build(&query, &Postgres).unwrap().sql
    }

    fn catalog() -> CatalogStore {
        let mut tables = HashMap::new();
        tables.insert(
            "profiles".to_string(),
            vec![
                FieldDef::new("user_id", DataType::Int64),
                FieldDef::new("bio", DataType::String),
                FieldDef::new("pic", DataType::String),
            ],
        );
        CatalogStore::from_tables(tables)
    }

    #[test]
    fn test_left_join_with_embed() {
        let main = users();
        let store = catalog();
        let join = JoinDef::new("users", "profiles")
            .on(OnClauseDef::new("id", "user_id"))
            .join_type(JoinType::LeftJoin)
            .select("profiles.bio")
            .select("profiles.pic")
            .embed("profile");

        let plan = JoinBuilder::new(&main, &store).build(&[join]).unwrap();
        assert_eq!(
            render(&plan),
            r#"SELECT "users"."id" FROM "users" LEFT JOIN "profiles" ON "users"."id" = "profiles"."user_id""#
        );
        assert_eq!(plan.clauses[0].join_type, JoinType::LeftJoin);
        let aliases: Vec<&str> = plan.columns.iter().map(|c| c.alias.as_str()).collect();
        assert_eq!(aliases, vec!["profile____bio", "profile____pic"]);
        assert_eq!(
            plan.field_types["profiles.bio"].data_type,
            DataType::String
        );
    }

    #[test]
    fn test_empty_on_clause_is_skipped() {
        let main = users();
        let store = catalog();
        let join = JoinDef::new("users", "profiles").select("profiles.bio");
        let plan = JoinBuilder::new(&main, &store).build(&[join]).unwrap();
        assert!(plan.clauses.is_empty());
        assert!(plan.columns.is_empty());
    }

    #[test]
    fn test_on_fields_are_validated() {
        let main = users();
        let store = catalog();
        let join = JoinDef::new("users", "profiles").on(OnClauseDef::new("id", "secret"));
        assert!(matches!(
            JoinBuilder::new(&main, &store).build(&[join]),
            Err(Error::InvalidField { .. })
        ));
    }

    #[test]
    fn test_join_operator_restricted() {
        let main = users();
        let store = catalog();
        let mut on = OnClauseDef::new("name", "bio");
        on.join_opr = Some("contain".to_string());
        let join = JoinDef::new("users", "profiles").on(on);
        assert!(matches!(
            JoinBuilder::new(&main, &store).build(&[join]),
            Err(Error::UnsupportedOperator { .. })
        ));
    }

    #[test]
    fn test_unknown_table_without_defs() {
        let main = users();
        let store = CatalogStore::new();
        let join = JoinDef::new("users", "orders").on(OnClauseDef::new("id", "user_id"));
        let err = JoinBuilder::new(&main, &store).build(&[join]).unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_inline_field_defs() {
        let main = users();
        let store = CatalogStore::new();
        let mut join = JoinDef::new("users", "orders")
            .on(OnClauseDef::new("id", "user_id"))
            .select("orders.total:order_total");
        join.joined_field_defs = Some(vec![
            FieldDef::new("user_id", DataType::Int64),
            FieldDef::new("total", DataType::Float64),
        ]);

        let plan = JoinBuilder::new(&main, &store).build(&[join]).unwrap();
        assert!(render(&plan).ends_with(r#"JOIN "orders" ON "users"."id" = "orders"."user_id""#));
        assert_eq!(plan.columns[0].alias, "order_total");
        let (table, def) = plan.resolve("users", "orders.total").unwrap();
        assert_eq!(table, "orders");
        assert_eq!(def.field_name, "total");
        assert_eq!(def.data_type, DataType::Float64);
    }
}
