//! 요청 디스패처
//!
//! JSON 요청 하나를 받아 응답 envelope 하나를 돌려줍니다.
//!
//! 처리 단계: Received → Authenticated → Parsed → Compiled → Executed →
//! Materialized → Responded. 어느 단계에서든 실패하면 바로 실패 응답으로 끝나며,
//! 응답의 `loc`에는 `"<요청 종류>:<마지막으로 통과한 단계>"`가 기록됩니다.
//!
//! 컴파일/값 변환은 트랜잭션을 열기 전에 끝나므로 그 단계의 실패로
//! 부분 쓰기가 생기지 않습니다.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as Json;
use tbl_core::catalog::FieldCatalog;
use tbl_core::identity::{Identity, IdentityProvider};
use tbl_core::request::{
    DeleteRequest, InsertRequest, QueryRequest, Request, RequestKind, UpdateRequest,
};
use tbl_core::response::{Response, ResultType};
use tbl_core::schema::FieldSet;
use tbl_core::{Error, ErrorClass, Result};
use tbl_sql::{
    ConditionCompiler, DeleteBuilder, InsertBuilder, SelectBuilder, SelectPlan, SqlValue,
    Statement, UpdateBuilder,
};
use tokio_util::sync::CancellationToken;

use crate::audit::{ActivityEvent, ActivityLog, ActivityOutcome, TracingActivityLog};
use crate::context::CallContext;
use crate::db::{finish, DatabaseRegistry, Transaction};
use crate::writer::BatchedWriter;

/// 처리 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Authenticated,
    Parsed,
    Compiled,
    Executed,
    Materialized,
    Responded,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Authenticated => "authenticated",
            Stage::Parsed => "parsed",
            Stage::Compiled => "compiled",
            Stage::Executed => "executed",
            Stage::Materialized => "materialized",
            Stage::Responded => "responded",
        }
    }
}

/// 요청 하나의 진행 상태
struct Call<'a> {
    req_id: &'a str,
    stage: Stage,
    kind: Option<RequestKind>,
    user_id: Option<String>,
    db_name: String,
    table_name: String,
}

impl Call<'_> {
    fn advance(&mut self, stage: Stage) {
        tracing::debug!(req_id = %self.req_id, stage = stage.as_str(), "stage");
        self.stage = stage;
    }

    fn action(&self) -> &'static str {
        self.kind.map(|k| k.as_str()).unwrap_or("request")
    }

    fn loc(&self) -> String {
        format!("{}:{}", self.action(), self.stage.as_str())
    }
}

/// 실행 결과
struct Outcome {
    num_records: u64,
    results: Vec<Json>,
}

/// 쿼리 엔진
///
/// 요청 사이에 공유하는 상태는 읽기 전용 카탈로그와 DB 핸들뿐입니다.
pub struct Engine {
    databases: DatabaseRegistry,
    catalog: Arc<dyn FieldCatalog>,
    identities: Arc<dyn IdentityProvider>,
    activity: Arc<dyn ActivityLog>,
    writer: BatchedWriter,
    statement_timeout: Option<Duration>,
}

impl Engine {
    pub fn new(
        databases: DatabaseRegistry,
        catalog: Arc<dyn FieldCatalog>,
        identities: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            databases,
            catalog,
            identities,
            activity: Arc::new(TracingActivityLog),
            writer: BatchedWriter::default(),
            statement_timeout: None,
        }
    }

    pub fn with_activity_log(mut self, activity: Arc<dyn ActivityLog>) -> Self {
        self.activity = activity;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Result<Self> {
        self.writer = BatchedWriter::new(batch_size)?;
        Ok(self)
    }

    pub fn with_statement_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.statement_timeout = timeout;
        self
    }

    /// 요청 처리
    ///
    /// `credential`은 transport가 전달한 호출자 자격 증명입니다.
    /// `cancel`이 취소되면 진행 중인 구문은 실패하고 트랜잭션은 롤백됩니다.
    pub async fn handle(
        &self,
        req_id: &str,
        credential: Option<&str>,
        body: &[u8],
        cancel: CancellationToken,
    ) -> Response {
        let mut call = Call {
            req_id,
            stage: Stage::Received,
            kind: None,
            user_id: None,
            db_name: String::new(),
            table_name: String::new(),
        };
        let ctx = CallContext::new()
            .with_timeout(self.statement_timeout)
            .with_cancel(cancel);

        match self.run(&mut call, credential, body, &ctx).await {
            Ok(outcome) => {
                call.advance(Stage::Responded);
                let kind = call.kind.unwrap_or(RequestKind::Query);
                if kind.is_mutation() {
                    self.activity.record(&ActivityEvent {
                        req_id: req_id.to_string(),
                        user_id: call.user_id.clone(),
                        action: kind.as_str().to_string(),
                        db_name: call.db_name.clone(),
                        table_name: call.table_name.clone(),
                        outcome: ActivityOutcome::Mutated {
                            num_records: outcome.num_records,
                        },
                    });
                }
                Response::success(
                    req_id,
                    ResultType::from(kind),
                    call.table_name,
                    outcome.num_records,
                    outcome.results,
                )
            }
            Err(err) => self.fail(call, err),
        }
    }

    fn fail(&self, call: Call<'_>, err: Error) -> Response {
        let loc = call.loc();
        match err.class() {
            ErrorClass::Internal => {
                tracing::error!(req_id = %call.req_id, loc = %loc, "Request failed: {}", err)
            }
            _ => tracing::warn!(req_id = %call.req_id, loc = %loc, "Request rejected: {}", err),
        }
        self.activity.record(&ActivityEvent {
            req_id: call.req_id.to_string(),
            user_id: call.user_id.clone(),
            action: call.action().to_string(),
            db_name: call.db_name.clone(),
            table_name: call.table_name.clone(),
            outcome: ActivityOutcome::Failed {
                class: err.class(),
                code: err.code(),
                loc: loc.clone(),
            },
        });
        Response::failure(call.req_id, call.table_name, &err, loc)
    }

    async fn run(
        &self,
        call: &mut Call<'_>,
        credential: Option<&str>,
        body: &[u8],
        ctx: &CallContext,
    ) -> Result<Outcome> {
        let identity = self
            .identities
            .resolve(credential)
            .ok_or(Error::NotAuthenticated)?;
        call.user_id = Some(identity.user_id.clone());
        call.advance(Stage::Authenticated);

        let json: Json = serde_json::from_slice(body)
            .map_err(|e| Error::bad_request(format!("malformed request body: {}", e)))?;
        let request = Request::from_json(json)?;
        call.kind = Some(request.kind());
        call.db_name = request.db_name().to_string();
        call.table_name = request.table_name().to_string();
        if request.table_name().is_empty() {
            return Err(Error::bad_request("table_name is required"));
        }
        call.advance(Stage::Parsed);

        match request {
            Request::Query(req) => self.query(call, ctx, &req).await,
            Request::Insert(req) => self.insert(call, ctx, &identity, &req).await,
            Request::Update(req) => self.update(call, ctx, &identity, &req).await,
            Request::Delete(req) => self.delete(call, ctx, &req).await,
        }
    }

    /// 요청에 실린 필드 정의, 없으면 카탈로그
    fn field_set(&self, table: &str, inline: &[tbl_core::schema::FieldDef]) -> Result<FieldSet> {
        if !inline.is_empty() {
            return FieldSet::new(table, inline.to_vec());
        }
        let defs = self
            .catalog
            .lookup(table)
            .ok_or_else(|| Error::bad_request(format!("no field catalog for table: {}", table)))?;
        FieldSet::new(table, defs.to_vec())
    }

    async fn query(
        &self,
        call: &mut Call<'_>,
        ctx: &CallContext,
        req: &QueryRequest,
    ) -> Result<Outcome> {
        if req.field_names.is_empty() {
            return Err(Error::bad_request("query requires field_names"));
        }
        let db = self.databases.get(&req.db_name)?;
        let fields = self.field_set(&req.table_name, &req.field_defs)?;
        let plan = SelectBuilder::new(&fields, db.dialect(), self.catalog.as_ref()).build(req)?;
        call.advance(Stage::Compiled);

        let mut tx = ctx.bounded(db.begin()).await?;
        let result = fetch(tx.as_mut(), ctx, &plan).await;
        let rows = finish(tx, ctx, result).await?;
        call.advance(Stage::Executed);

        let results = plan.materializer.materialize_all(rows)?;
        call.advance(Stage::Materialized);
        Ok(Outcome {
            num_records: results.len() as u64,
            results,
        })
    }

    async fn insert(
        &self,
        call: &mut Call<'_>,
        ctx: &CallContext,
        identity: &Identity,
        req: &InsertRequest,
    ) -> Result<Outcome> {
        let db = self.databases.get(&req.db_name)?;
        let fields = self.field_set(&req.table_name, &req.field_defs)?;
        let builder = InsertBuilder::new(&fields, db.dialect());
        let upsert = builder.upsert(&req.on_conflict_cols, &req.on_conflict_update_cols)?;
        let statements = self
            .writer
            .prepare(&builder, &req.records, identity, upsert.as_ref())?;
        call.advance(Stage::Compiled);

        let affected = self.writer.execute(db.as_ref(), ctx, &statements).await?;
        call.advance(Stage::Executed);
        Ok(Outcome {
            num_records: affected,
            results: Vec::new(),
        })
    }

    async fn update(
        &self,
        call: &mut Call<'_>,
        ctx: &CallContext,
        identity: &Identity,
        req: &UpdateRequest,
    ) -> Result<Outcome> {
        let db = self.databases.get(&req.db_name)?;
        let fields = self.field_set(&req.table_name, &req.field_defs)?;
        let predicate = ConditionCompiler::new(&fields).compile_opt(req.condition.as_ref())?;
        let statement =
            UpdateBuilder::new(&fields, db.dialect()).build(&req.entries(), predicate, identity)?;
        // 같은 조건으로 재조회
        let reselect = if req.need_record {
            Some(
                SelectBuilder::new(&fields, db.dialect(), self.catalog.as_ref())
                    .build_unpaged(&req.field_names, req.condition.as_ref())?,
            )
        } else {
            None
        };
        call.advance(Stage::Compiled);

        let mut tx = ctx.bounded(db.begin()).await?;
        let result = update_in_tx(tx.as_mut(), ctx, &statement, reselect.as_ref()).await;
        let (affected, rows) = finish(tx, ctx, result).await?;
        call.advance(Stage::Executed);

        let results = match &reselect {
            Some(plan) => {
                let results = plan.materializer.materialize_all(rows)?;
                call.advance(Stage::Materialized);
                results
            }
            None => Vec::new(),
        };
        Ok(Outcome {
            num_records: affected,
            results,
        })
    }

    async fn delete(
        &self,
        call: &mut Call<'_>,
        ctx: &CallContext,
        req: &DeleteRequest,
    ) -> Result<Outcome> {
        let db = self.databases.get(&req.db_name)?;
        let fields = self.field_set(&req.table_name, &req.field_defs)?;
        let predicate = ConditionCompiler::new(&fields).compile_opt(req.condition.as_ref())?;
        let statement = DeleteBuilder::new(&fields, db.dialect()).build(predicate)?;
        call.advance(Stage::Compiled);

        let mut tx = ctx.bounded(db.begin()).await?;
        let result = ctx.bounded(tx.execute(&statement)).await;
        let affected = finish(tx, ctx, result).await?;
        call.advance(Stage::Executed);
        Ok(Outcome {
            num_records: affected,
            results: Vec::new(),
        })
    }
}

async fn fetch(
    tx: &mut dyn Transaction,
    ctx: &CallContext,
    plan: &SelectPlan,
) -> Result<Vec<Vec<SqlValue>>> {
    ctx.bounded(tx.fetch(&plan.statement, plan.materializer.scan_types()))
        .await
}

async fn update_in_tx(
    tx: &mut dyn Transaction,
    ctx: &CallContext,
    statement: &Statement,
    reselect: Option<&SelectPlan>,
) -> Result<(u64, Vec<Vec<SqlValue>>)> {
    let affected = ctx.bounded(tx.execute(statement)).await?;
    let rows = match reselect {
        Some(plan) => fetch(tx, ctx, plan).await?,
        None => Vec::new(),
    };
    Ok((affected, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::memory::MemoryActivityLog;
    use crate::db::fake::FakeDatabase;
    use serde_json::json;
    use tbl_core::catalog::CatalogStore;
    use tbl_core::identity::TrustedHeaderProvider;

    fn engine(db: &FakeDatabase, log: &Arc<MemoryActivityLog>) -> Engine {
        let mut databases = DatabaseRegistry::new();
        databases.insert("main", Arc::new(db.clone()));
        Engine::new(
            databases,
            Arc::new(CatalogStore::new()),
            Arc::new(TrustedHeaderProvider::default()),
        )
        .with_activity_log(log.clone())
    }

    fn users_defs() -> Json {
        json!([
            { "field_name": "id", "data_type": "_auto_inc" },
            { "field_name": "email", "data_type": "string", "required": true },
            { "field_name": "status", "data_type": "string" },
            { "field_name": "updated_by", "data_type": "_updater" }
        ])
    }

    fn body(value: Json) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[tokio::test]
    async fn test_query_active_users() {
        let db = FakeDatabase::postgres().with_rows(vec![
            vec![SqlValue::Int64(1), SqlValue::from("a@x")],
            vec![SqlValue::Int64(2), SqlValue::from("b@x")],
            vec![SqlValue::Int64(4), SqlValue::from("d@x")],
        ]);
        let log = Arc::new(MemoryActivityLog::default());
        let request = body(json!({
            "request_type": "query",
            "db_name": "main",
            "table_name": "users",
            "field_defs": users_defs(),
            "field_names": ["users.id", "users.email"],
            "condition": { "type": "atomic", "field_name": "status", "data_type": "string", "opr": "=", "value": "active" },
            "start": 0,
            "page_size": 10
        }));

        let resp = engine(&db, &log)
            .handle("r-1", Some("u-1"), &request, CancellationToken::new())
            .await;

        assert!(resp.status, "{}", resp.error_msg);
        assert_eq!(resp.result_type, ResultType::Query);
        assert_eq!(resp.num_records, 3);
        assert_eq!(resp.results[2], json!({ "id": 4, "email": "d@x" }));

        let state = db.state();
        assert_eq!(
            state.fetched[0].sql,
            "SELECT \"users\".\"id\" AS \"id\", \"users\".\"email\" AS \"email\" \
             FROM \"users\" WHERE \"users\".\"status\" = $1 LIMIT $2 OFFSET $3"
        );
        assert_eq!(
            state.fetched[0].params,
            vec![SqlValue::from("active"), SqlValue::Int64(10), SqlValue::Int64(0)]
        );
        assert_eq!(state.commits, 1);
        // 조회는 활동 로그 대상이 아님
        assert!(log.events().is_empty());
    }

    #[tokio::test]
    async fn test_missing_identity_is_401() {
        let db = FakeDatabase::postgres();
        let log = Arc::new(MemoryActivityLog::default());
        let request = body(json!({ "request_type": "delete", "table_name": "users" }));

        let resp = engine(&db, &log)
            .handle("r-2", None, &request, CancellationToken::new())
            .await;

        assert!(!resp.status);
        assert_eq!(resp.error_code, 401);
        assert_eq!(resp.loc, "request:received");
        assert_eq!(db.state().begins, 0);
        assert_eq!(log.events().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_field_fails_before_execution() {
        let db = FakeDatabase::postgres();
        let log = Arc::new(MemoryActivityLog::default());
        let request = body(json!({
            "request_type": "query",
            "db_name": "main",
            "table_name": "users",
            "field_defs": users_defs(),
            "field_names": ["users.id"],
            "condition": { "type": "atomic", "field_name": "password", "opr": "=", "value": "x" },
            "page_size": 10
        }));

        let resp = engine(&db, &log)
            .handle("r-3", Some("u-1"), &request, CancellationToken::new())
            .await;

        assert!(!resp.status);
        assert_eq!(resp.error_code, 500);
        assert_eq!(resp.table_name, "users");
        assert_eq!(resp.loc, "query:parsed");
        assert_eq!(db.state().begins, 0);
    }

    #[tokio::test]
    async fn test_query_without_field_names_is_rejected() {
        let db = FakeDatabase::postgres();
        let log = Arc::new(MemoryActivityLog::default());
        let request = body(json!({
            "request_type": "query",
            "table_name": "users",
            "field_defs": users_defs(),
            "page_size": 10
        }));

        let resp = engine(&db, &log)
            .handle("r-4", Some("u-1"), &request, CancellationToken::new())
            .await;
        assert_eq!(resp.error_code, 400);
    }

    #[tokio::test]
    async fn test_update_with_need_record() {
        let db = FakeDatabase::postgres()
            .with_affected(1)
            .with_rows(vec![vec![SqlValue::Int64(7), SqlValue::from("disabled")]]);
        let log = Arc::new(MemoryActivityLog::default());
        let request = body(json!({
            "request_type": "update",
            "table_name": "users",
            "field_defs": users_defs(),
            "record": { "status": "disabled" },
            "condition": { "type": "atomic", "field_name": "id", "opr": "=", "value": 7 },
            "need_record": true,
            "field_names": ["users.id", "users.status"]
        }));

        let resp = engine(&db, &log)
            .handle("r-5", Some("u-9"), &request, CancellationToken::new())
            .await;

        assert!(resp.status, "{}", resp.error_msg);
        assert_eq!(resp.result_type, ResultType::Update);
        assert_eq!(resp.num_records, 1);
        assert_eq!(resp.results, vec![json!({ "id": 7, "status": "disabled" })]);

        let state = db.state();
        assert_eq!(
            state.executed[0].sql,
            r#"UPDATE "users" SET "status" = $1, "updated_by" = $2 WHERE "id" = $3"#
        );
        assert_eq!(state.executed[0].params[1], SqlValue::from("u-9"));
        assert_eq!(state.fetched.len(), 1);
        assert_eq!(state.commits, 1);

        let events = log.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, "update");
        assert!(matches!(
            events[0].outcome,
            ActivityOutcome::Mutated { num_records: 1 }
        ));
    }

    #[tokio::test]
    async fn test_unconditional_delete_is_rejected() {
        let db = FakeDatabase::postgres();
        let log = Arc::new(MemoryActivityLog::default());
        let request = body(json!({
            "request_type": "delete",
            "table_name": "users",
            "field_defs": users_defs(),
            "condition": { "type": "and", "conditions": [{ "type": "null" }] }
        }));

        let resp = engine(&db, &log)
            .handle("r-6", Some("u-1"), &request, CancellationToken::new())
            .await;

        assert_eq!(resp.error_code, 400);
        assert!(db.state().executed.is_empty());
    }

    #[tokio::test]
    async fn test_insert_database_failure_rolls_back() {
        let db = FakeDatabase::postgres().fail_on(1);
        let log = Arc::new(MemoryActivityLog::default());
        let request = body(json!({
            "request_type": "insert",
            "table_name": "users",
            "field_defs": users_defs(),
            "records": [{ "email": "a@x" }, { "email": "b@x" }]
        }));

        let resp = engine(&db, &log)
            .handle("r-7", Some("u-1"), &request, CancellationToken::new())
            .await;

        assert_eq!(resp.error_code, 500);
        assert_eq!(resp.loc, "insert:compiled");
        let state = db.state();
        assert_eq!(state.rollbacks, 1);
        assert_eq!(state.commits, 0);
        assert!(matches!(
            log.events()[0].outcome,
            ActivityOutcome::Failed { code: "DATABASE_ERROR", .. }
        ));
    }

    #[tokio::test]
    async fn test_cancelled_call_does_not_execute() {
        let db = FakeDatabase::postgres();
        let log = Arc::new(MemoryActivityLog::default());
        let request = body(json!({
            "request_type": "insert",
            "table_name": "users",
            "field_defs": users_defs(),
            "records": [{ "email": "a@x" }]
        }));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let resp = engine(&db, &log)
            .handle("r-8", Some("u-1"), &request, cancel)
            .await;

        assert_eq!(resp.error_code, 500);
        assert!(db.state().executed.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let db = FakeDatabase::postgres();
        let log = Arc::new(MemoryActivityLog::default());
        let resp = engine(&db, &log)
            .handle("r-9", Some("u-1"), b"{not json", CancellationToken::new())
            .await;
        assert_eq!(resp.error_code, 400);
        assert_eq!(resp.loc, "request:authenticated");
    }
}
