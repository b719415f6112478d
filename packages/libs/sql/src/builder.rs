//! CRUD SQL 빌더
//!
//! 컴파일된 조건, 변환된 값, 조인 계획을 받아 sea-query로 구문을 조립하고
//! dialect의 query builder로 렌더링합니다.
//! 값은 모두 바인딩 파라미터이고, 식별자는 화이트리스트를 거친 뒤 인용됩니다.

use std::collections::HashMap;

use sea_query::{Condition, ConditionalStatement, OnConflict, Order, Query, SimpleExpr, Value};
use serde_json::Value as Json;
use tbl_core::catalog::FieldCatalog;
use tbl_core::identity::Identity;
use tbl_core::request::{CondDef, JoinDef, OrderbyDef, QueryRequest, Record};
use tbl_core::schema::{DataType, FieldDef, FieldSet};
use tbl_core::{Error, Result};

use crate::coerce::{bind_type, Coercer, WriteMode};
use crate::columns::{ColumnList, SelectedColumn};
use crate::compiler::ConditionCompiler;
use crate::dialect::Dialect;
use crate::join::JoinBuilder;
use crate::materialize::Materializer;
use crate::statement::{column_ref, DynIden, Statement};
use crate::value::SqlValue;

/// 페이지 범위
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub start: i64,
    pub size: i64,
}

impl Page {
    /// `size > 0`, `start >= 0`이어야 합니다.
    pub fn new(start: i64, size: i64) -> Result<Self> {
        if size <= 0 {
            return Err(Error::bad_request(format!(
                "page_size must be positive: {}",
                size
            )));
        }
        if start < 0 {
            return Err(Error::bad_request(format!(
                "start must not be negative: {}",
                start
            )));
        }
        Ok(Self { start, size })
    }
}

/// SELECT 빌드 결과
#[derive(Debug, Clone)]
pub struct SelectPlan {
    pub statement: Statement,
    pub materializer: Materializer,
}

/// SELECT 쿼리 빌더
pub struct SelectBuilder<'a> {
    table: &'a FieldSet,
    dialect: &'a dyn Dialect,
    catalog: &'a dyn FieldCatalog,
}

impl<'a> SelectBuilder<'a> {
    pub fn new(
        table: &'a FieldSet,
        dialect: &'a dyn Dialect,
        catalog: &'a dyn FieldCatalog,
    ) -> Self {
        Self {
            table,
            dialect,
            catalog,
        }
    }

    /// 조회 요청으로 SQL 생성
    pub fn build(&self, query: &QueryRequest) -> Result<SelectPlan> {
        let page = Page::new(query.start, query.page_size)?;
        self.assemble(
            &query.field_names,
            query.condition.as_ref(),
            &query.join_def,
            &query.orderby_def,
            Some(page),
        )
    }

    /// 페이지 없이 조회 (쓰기 후 재조회용)
    pub fn build_unpaged(
        &self,
        field_names: &[String],
        condition: Option<&CondDef>,
    ) -> Result<SelectPlan> {
        self.assemble(field_names, condition, &[], &[], None)
    }

    fn assemble(
        &self,
        field_names: &[String],
        condition: Option<&CondDef>,
        joins: &[JoinDef],
        order_by: &[OrderbyDef],
        page: Option<Page>,
    ) -> Result<SelectPlan> {
        let main = self.table.table();
        let plan = JoinBuilder::new(self.table, self.catalog).build(joins)?;

        // 주 테이블 컬럼 (생략 시 선언된 모든 필드)
        let mut columns: Vec<SelectedColumn> = if field_names.is_empty() {
            self.table
                .iter()
                .filter(|f| f.data_type != DataType::Ignore)
                .map(|f| SelectedColumn {
                    table: main.to_string(),
                    field: f.field_name.clone(),
                    alias: f.field_name.clone(),
                })
                .collect()
        } else {
            ColumnList::parse(field_names, main)?.into_columns()
        };
        if columns.is_empty() {
            return Err(Error::bad_request("no columns to select"));
        }

        let mut types: HashMap<String, FieldDef> = HashMap::new();
        for column in &columns {
            if column.table != main {
                return Err(Error::invalid_field(column.qualified()));
            }
            let def = self.table.require(&column.field)?;
            types.insert(column.qualified(), def.clone());
        }
        types.extend(plan.field_types.clone());
        columns.extend(plan.columns.iter().cloned());

        let materializer = Materializer::new(&columns, &types, self.dialect)?;

        let mut query = Query::select();
        for column in &columns {
            let (expr, alias) = column.select_expr();
            query.expr_as(expr, alias);
        }
        query.from(DynIden::new(main));
        plan.apply(&mut query);

        let predicate = ConditionCompiler::new(self.table)
            .qualified()
            .compile_opt(condition)?;
        if let Some(pred) = predicate {
            query.cond_where(pred);
        }

        for order in order_by {
            let (table, def) = plan
                .resolve(main, &order.field_name)
                .ok_or_else(|| Error::invalid_field(&order.field_name))?;
            let direction = if order.is_asc { Order::Asc } else { Order::Desc };
            query.order_by(column_ref(table, &def.field_name), direction);
        }

        if let Some(page) = page {
            query
                .limit(page.size.unsigned_abs())
                .offset(page.start.unsigned_abs());
        }

        Ok(SelectPlan {
            statement: Statement::build(&query, self.dialect)?,
            materializer,
        })
    }
}

/// 검증된 upsert 절
///
/// Postgres는 `ON CONFLICT (...) DO UPDATE SET c = EXCLUDED.c`,
/// MySQL은 `ON DUPLICATE KEY UPDATE c = VALUES(c)`로 렌더링됩니다.
#[derive(Debug, Clone)]
pub struct Upsert(OnConflict);

/// INSERT 쿼리 빌더
///
/// 값 변환(`coerce`)과 구문 생성(`build`)을 분리해서,
/// 배치 실행기가 모든 레코드를 먼저 검증한 뒤 묶음 단위로 구문을 만들 수 있게 합니다.
pub struct InsertBuilder<'a> {
    table: &'a FieldSet,
    dialect: &'a dyn Dialect,
}

impl<'a> InsertBuilder<'a> {
    pub fn new(table: &'a FieldSet, dialect: &'a dyn Dialect) -> Self {
        Self { table, dialect }
    }

    /// INSERT 컬럼 (`_ignore`, `_auto_inc` 제외)
    pub fn columns(&self) -> Vec<&'a FieldDef> {
        self.table.iter().filter(|f| f.is_insertable()).collect()
    }

    /// 레코드 전체를 컬럼 순서의 값 행으로 변환
    pub fn coerce(&self, records: &[Record], identity: &Identity) -> Result<Vec<Vec<SqlValue>>> {
        if records.is_empty() {
            return Err(Error::bad_request("insert requires at least one record"));
        }
        let columns = self.columns();
        if columns.is_empty() {
            return Err(Error::bad_request(format!(
                "table has no writable fields: {}",
                self.table.table()
            )));
        }

        let coercer = Coercer::new(self.dialect, identity, WriteMode::Insert);
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            if let Some(unknown) = record.keys().find(|k| !self.table.contains(k)) {
                return Err(Error::invalid_field(self.table.qualified(unknown)));
            }
            let mut row = Vec::with_capacity(columns.len());
            for def in &columns {
                let value = coercer
                    .coerce_field(def, record.get(&def.field_name))?
                    .unwrap_or_else(|| SqlValue::Null(bind_type(def, self.dialect)));
                row.push(value);
            }
            rows.push(row);
        }
        Ok(rows)
    }

    /// upsert 절 검증/생성
    ///
    /// 충돌 컬럼이 있으면 갱신 컬럼도 있어야 합니다.
    pub fn upsert(&self, conflict_cols: &[String], update_cols: &[String]) -> Result<Option<Upsert>> {
        match (conflict_cols.is_empty(), update_cols.is_empty()) {
            (true, true) => return Ok(None),
            (false, true) => {
                return Err(Error::bad_request(
                    "on_conflict_cols requires on_conflict_update_cols",
                ))
            }
            (true, false) => {
                return Err(Error::bad_request(
                    "on_conflict_update_cols requires on_conflict_cols",
                ))
            }
            (false, false) => {}
        }

        for col in conflict_cols {
            self.table.require(col)?;
        }
        for col in update_cols {
            let def = self.table.require(col)?;
            if !def.is_insertable() {
                return Err(Error::invalid_field(self.table.qualified(col)));
            }
        }

        let mut clause = OnConflict::columns(conflict_cols.iter().map(|c| DynIden::new(c.as_str())));
        clause.update_columns(update_cols.iter().map(|c| DynIden::new(c.as_str())));
        Ok(Some(Upsert(clause)))
    }

    /// 변환된 행 묶음으로 INSERT 구문 생성
    pub fn build(&self, rows: &[Vec<SqlValue>], upsert: Option<&Upsert>) -> Result<Statement> {
        let columns = self.columns();
        if rows.is_empty() {
            return Err(Error::bad_request("insert requires at least one record"));
        }

        let mut query = Query::insert();
        query
            .into_table(DynIden::new(self.table.table()))
            .columns(columns.iter().map(|f| DynIden::new(f.field_name.as_str())));

        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(Error::bad_request(format!(
                    "record {} has {} values, expected {}",
                    i,
                    row.len(),
                    columns.len()
                )));
            }
            let values = row
                .iter()
                .cloned()
                .map(|v| SimpleExpr::from(Value::from(v)));
            query
                .values(values)
                .map_err(|e| Error::bad_request(e.to_string()))?;
        }

        if let Some(Upsert(clause)) = upsert {
            query.on_conflict(clause.clone());
        }
        Statement::build(&query, self.dialect)
    }
}

/// UPDATE 쿼리 빌더
pub struct UpdateBuilder<'a> {
    table: &'a FieldSet,
    dialect: &'a dyn Dialect,
}

impl<'a> UpdateBuilder<'a> {
    pub fn new(table: &'a FieldSet, dialect: &'a dyn Dialect) -> Self {
        Self { table, dialect }
    }

    /// UPDATE 구문 생성
    ///
    /// 조건이 없으면(전체 행 대상) 거부합니다.
    /// `_updater` 필드는 항상 호출자 ID로 기록하고, 호출자가 보낸 sentinel 값은 무시합니다.
    pub fn build(
        &self,
        entries: &[(String, Json)],
        predicate: Option<Condition>,
        identity: &Identity,
    ) -> Result<Statement> {
        let predicate =
            predicate.ok_or_else(|| Error::bad_request("update requires a condition"))?;
        let coercer = Coercer::new(self.dialect, identity, WriteMode::Update);

        let mut query = Query::update();
        query.table(DynIden::new(self.table.table()));

        let mut assigned = 0;
        for (name, value) in entries {
            let def = self
                .table
                .resolve(name)
                .ok_or_else(|| Error::invalid_field(name))?;
            if def.data_type.is_sentinel() {
                continue;
            }
            if !def.is_settable() {
                return Err(Error::invalid_field(self.table.qualified(&def.field_name)));
            }
            if let Some(v) = coercer.coerce_field(def, Some(value))? {
                query.value(DynIden::new(def.field_name.as_str()), Value::from(v));
                assigned += 1;
            }
        }
        if assigned == 0 {
            return Err(Error::bad_request("nothing to update"));
        }

        for def in self.table.iter().filter(|f| f.data_type == DataType::Updater) {
            if let Some(v) = coercer.coerce_field(def, None)? {
                query.value(DynIden::new(def.field_name.as_str()), Value::from(v));
            }
        }

        query.cond_where(predicate);
        Statement::build(&query, self.dialect)
    }
}

/// DELETE 쿼리 빌더
pub struct DeleteBuilder<'a> {
    table: &'a FieldSet,
    dialect: &'a dyn Dialect,
}

impl<'a> DeleteBuilder<'a> {
    pub fn new(table: &'a FieldSet, dialect: &'a dyn Dialect) -> Self {
        Self { table, dialect }
    }

    /// DELETE 구문 생성 (조건 필수)
    pub fn build(&self, predicate: Option<Condition>) -> Result<Statement> {
        let predicate =
            predicate.ok_or_else(|| Error::bad_request("delete requires a condition"))?;
        let mut query = Query::delete();
        query
            .from_table(DynIden::new(self.table.table()))
            .cond_where(predicate);
        Statement::build(&query, self.dialect)
    }
}
