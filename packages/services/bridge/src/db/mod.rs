//! DB 실행 계층
//!
//! 컴파일된 구문을 실제 드라이버로 실행합니다.
//! 트랜잭션 핸들은 이를 연 호출 하나가 독점하고, 모든 종료 경로에서
//! `finish`로 커밋 또는 롤백됩니다.
//!
//! # 모듈 구조
//!
//! - `postgres`: sqlx PostgreSQL 드라이버
//! - `mysql`: sqlx MySQL 드라이버

mod mysql;
mod postgres;

#[cfg(test)]
pub(crate) mod fake;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tbl_core::{Error, Result};
use tbl_sql::{Dialect, DialectKind, SqlType, SqlValue, Statement};

use crate::config::Config;
use crate::context::CallContext;

pub use mysql::MySqlDatabase;
pub use postgres::PgDatabase;

/// 열린 트랜잭션
#[async_trait]
pub trait Transaction: Send {
    /// 구문 실행, 영향받은 행 수 반환
    async fn execute(&mut self, statement: &Statement) -> Result<u64>;

    /// 조회 실행. 각 컬럼은 `scan` 타입으로 읽습니다.
    async fn fetch(
        &mut self,
        statement: &Statement,
        scan: &[SqlType],
    ) -> Result<Vec<Vec<SqlValue>>>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// DB 핸들
#[async_trait]
pub trait Database: Send + Sync {
    fn dialect(&self) -> &'static dyn Dialect;

    async fn begin(&self) -> Result<Box<dyn Transaction>>;
}

/// 작업 결과에 따라 커밋 또는 롤백
///
/// 작업이 실패하면 롤백하고 원래 에러를 돌려줍니다. 롤백 실패는 로그만 남깁니다.
pub async fn finish<T>(
    tx: Box<dyn Transaction>,
    ctx: &CallContext,
    result: Result<T>,
) -> Result<T> {
    match result {
        Ok(value) => {
            ctx.bounded(tx.commit()).await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!("Rollback failed: {}", rollback_err);
            }
            Err(err)
        }
    }
}

/// DB 이름 -> 핸들
#[derive(Clone, Default)]
pub struct DatabaseRegistry {
    handles: HashMap<String, Arc<dyn Database>>,
}

impl DatabaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, db: Arc<dyn Database>) {
        self.handles.insert(name.into(), db);
    }

    /// 요청의 `db_name`으로 핸들 선택
    ///
    /// 이름이 비어 있고 등록된 DB가 하나뿐이면 그 DB를 사용합니다.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Database>> {
        if name.is_empty() && self.handles.len() == 1 {
            if let Some(db) = self.handles.values().next() {
                return Ok(Arc::clone(db));
            }
        }
        self.handles
            .get(name)
            .cloned()
            .ok_or_else(|| Error::bad_request(format!("unknown database: {}", name)))
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// 설정의 모든 DB에 연결
pub async fn connect(config: &Config) -> anyhow::Result<DatabaseRegistry> {
    let mut registry = DatabaseRegistry::new();
    for (name, url) in &config.databases {
        let db: Arc<dyn Database> = match config.dialect {
            DialectKind::Postgres => {
                Arc::new(PgDatabase::connect(url, config.max_connections).await?)
            }
            DialectKind::MySql => {
                Arc::new(MySqlDatabase::connect(url, config.max_connections).await?)
            }
        };
        tracing::info!(db = %name, dialect = db.dialect().name(), "database connected");
        registry.insert(name.clone(), db);
    }
    Ok(registry)
}
