//! 테스트용 DB
//!
//! 실행된 구문과 커밋/롤백 횟수를 기록하고, n번째 구문을 실패시키거나
//! 미리 정한 행을 돌려줍니다.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tbl_core::{Error, Result};
use tbl_sql::{Dialect, DialectKind, SqlType, SqlValue, Statement};

use super::{Database, Transaction};

#[derive(Debug, Default, Clone)]
pub struct FakeState {
    pub begins: usize,
    pub executed: Vec<Statement>,
    pub fetched: Vec<Statement>,
    pub commits: usize,
    pub rollbacks: usize,
}

#[derive(Debug, Default)]
struct Script {
    /// 1부터 센 실행 순번
    fail_on: Option<usize>,
    rows: Vec<Vec<SqlValue>>,
    affected: Option<u64>,
}

#[derive(Clone)]
pub struct FakeDatabase {
    dialect: &'static dyn Dialect,
    state: Arc<Mutex<FakeState>>,
    script: Arc<Mutex<Script>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FakeDatabase {
    pub fn new(kind: DialectKind) -> Self {
        Self {
            dialect: kind.dialect(),
            state: Arc::default(),
            script: Arc::default(),
        }
    }

    pub fn postgres() -> Self {
        Self::new(DialectKind::Postgres)
    }

    /// n번째(1부터) execute를 실패시킴
    pub fn fail_on(self, n: usize) -> Self {
        lock(&self.script).fail_on = Some(n);
        self
    }

    /// fetch가 돌려줄 행
    pub fn with_rows(self, rows: Vec<Vec<SqlValue>>) -> Self {
        lock(&self.script).rows = rows;
        self
    }

    /// INSERT가 아닌 구문의 영향받은 행 수
    pub fn with_affected(self, n: u64) -> Self {
        lock(&self.script).affected = Some(n);
        self
    }

    pub fn state(&self) -> FakeState {
        lock(&self.state).clone()
    }
}

#[async_trait]
impl Database for FakeDatabase {
    fn dialect(&self) -> &'static dyn Dialect {
        self.dialect
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        lock(&self.state).begins += 1;
        Ok(Box::new(FakeTransaction { db: self.clone() }))
    }
}

struct FakeTransaction {
    db: FakeDatabase,
}

#[async_trait]
impl Transaction for FakeTransaction {
    async fn execute(&mut self, statement: &Statement) -> Result<u64> {
        let mut state = lock(&self.db.state);
        state.executed.push(statement.clone());
        let script = lock(&self.db.script);
        if script.fail_on == Some(state.executed.len()) {
            return Err(Error::database("duplicate key value violates unique constraint"));
        }
        // INSERT는 VALUES 행 수만큼
        if statement.sql.starts_with("INSERT") {
            return Ok(statement.sql.matches("), (").count() as u64 + 1);
        }
        Ok(script.affected.unwrap_or(1))
    }

    async fn fetch(
        &mut self,
        statement: &Statement,
        scan: &[SqlType],
    ) -> Result<Vec<Vec<SqlValue>>> {
        lock(&self.db.state).fetched.push(statement.clone());
        let rows = lock(&self.db.script).rows.clone();
        if rows.iter().any(|r| r.len() != scan.len()) {
            return Err(Error::database("canned row width does not match scan types"));
        }
        Ok(rows)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        lock(&self.db.state).commits += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        lock(&self.db.state).rollbacks += 1;
        Ok(())
    }
}
