//! 배치 INSERT 실행기
//!
//! 레코드를 `batch_size`개씩 묶어 묶음마다 다중 행 INSERT 하나를 만들고,
//! 모든 묶음을 트랜잭션 하나 안에서 순서대로 실행합니다.
//! 값 변환은 트랜잭션을 열기 전에 전체 레코드에 대해 끝내므로
//! 변환 실패 시에는 어떤 구문도 실행되지 않습니다.

use tbl_core::identity::Identity;
use tbl_core::request::Record;
use tbl_core::{Error, Result};
use tbl_sql::{InsertBuilder, Statement, Upsert};

use crate::context::CallContext;
use crate::db::{finish, Database, Transaction};

/// 기본 묶음 크기
pub const DEFAULT_BATCH_SIZE: usize = 30;

/// 배치 INSERT 실행기
#[derive(Debug, Clone, Copy)]
pub struct BatchedWriter {
    batch_size: usize,
}

impl Default for BatchedWriter {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl BatchedWriter {
    pub fn new(batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::bad_request("batch_size must be positive"));
        }
        Ok(Self { batch_size })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 전체 레코드를 변환한 뒤 묶음별 INSERT 구문 생성
    pub fn prepare(
        &self,
        builder: &InsertBuilder<'_>,
        records: &[Record],
        identity: &Identity,
        upsert: Option<&Upsert>,
    ) -> Result<Vec<Statement>> {
        let rows = builder.coerce(records, identity)?;
        rows.chunks(self.batch_size)
            .map(|chunk| builder.build(chunk, upsert))
            .collect()
    }

    /// 구문들을 한 트랜잭션에서 실행, 영향받은 행 수 합계 반환
    ///
    /// 하나라도 실패하면 전체를 롤백합니다.
    pub async fn execute(
        &self,
        db: &dyn Database,
        ctx: &CallContext,
        statements: &[Statement],
    ) -> Result<u64> {
        let mut tx = ctx.bounded(db.begin()).await?;
        let result = run_chunks(tx.as_mut(), ctx, statements).await;
        finish(tx, ctx, result).await
    }

    pub async fn insert(
        &self,
        db: &dyn Database,
        ctx: &CallContext,
        builder: &InsertBuilder<'_>,
        records: &[Record],
        identity: &Identity,
        upsert: Option<&Upsert>,
    ) -> Result<u64> {
        let statements = self.prepare(builder, records, identity, upsert)?;
        tracing::debug!(
            records = records.len(),
            chunks = statements.len(),
            "batched insert prepared"
        );
        self.execute(db, ctx, &statements).await
    }
}

async fn run_chunks(
    tx: &mut dyn Transaction,
    ctx: &CallContext,
    statements: &[Statement],
) -> Result<u64> {
    let mut affected = 0;
    for (i, statement) in statements.iter().enumerate() {
        let n = ctx.bounded(tx.execute(statement)).await.map_err(|e| {
            tracing::error!(chunk = i, "Batch insert failed: {}", e);
            e
        })?;
        affected += n;
    }
    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fake::FakeDatabase;
    use serde_json::json;
    use tbl_core::schema::{DataType, FieldDef, FieldSet};

    fn members() -> FieldSet {
        FieldSet::new(
            "members",
            vec![
                FieldDef::new("id", DataType::AutoInc),
                FieldDef::new("email", DataType::String).required(),
                FieldDef::new("age", DataType::Int16),
            ],
        )
        .unwrap()
    }

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                let mut r = Record::new();
                r.insert("email".into(), json!(format!("m{}@x", i)));
                r.insert("age".into(), json!(20));
                r
            })
            .collect()
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert!(BatchedWriter::new(0).is_err());
        assert_eq!(BatchedWriter::default().batch_size(), 30);
    }

    #[tokio::test]
    async fn test_coercion_failure_executes_nothing() {
        let set = members();
        let db = FakeDatabase::postgres();
        let builder = InsertBuilder::new(&set, db.dialect());
        let mut batch = records(40);
        // 31번째 레코드는 SMALLINT 범위를 벗어남
        batch[30].insert("age".into(), json!(70000));

        let writer = BatchedWriter::new(30).unwrap();
        let err = writer
            .insert(&db, &CallContext::new(), &builder, &batch, &Identity::new("u"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::OutOfRange { .. }));
        let state = db.state();
        assert_eq!(state.begins, 0);
        assert!(state.executed.is_empty());
        assert_eq!(state.commits, 0);
    }

    #[tokio::test]
    async fn test_chunk_failure_rolls_back_everything() {
        let set = members();
        let db = FakeDatabase::postgres().fail_on(2);
        let builder = InsertBuilder::new(&set, db.dialect());

        let writer = BatchedWriter::new(30).unwrap();
        let result = writer
            .insert(&db, &CallContext::new(), &builder, &records(40), &Identity::new("u"), None)
            .await;

        assert!(matches!(result, Err(Error::Database { .. })));
        let state = db.state();
        assert_eq!(state.executed.len(), 2);
        assert_eq!(state.commits, 0);
        assert_eq!(state.rollbacks, 1);
    }

    #[tokio::test]
    async fn test_chunks_run_in_order_in_one_transaction() {
        let set = members();
        let db = FakeDatabase::postgres();
        let builder = InsertBuilder::new(&set, db.dialect());

        let writer = BatchedWriter::new(30).unwrap();
        let affected = writer
            .insert(&db, &CallContext::new(), &builder, &records(40), &Identity::new("u"), None)
            .await
            .unwrap();

        assert_eq!(affected, 40);
        let state = db.state();
        assert_eq!(state.begins, 1);
        assert_eq!(state.commits, 1);
        assert_eq!(state.executed.len(), 2);
        assert_eq!(state.executed[0].params.len(), 60);
        assert_eq!(state.executed[1].params.len(), 20);
        assert_eq!(state.executed[1].params[0], tbl_sql::SqlValue::from("m30@x"));
    }
}
