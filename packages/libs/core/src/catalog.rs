//! 필드/타입 카탈로그 저장소
//!
//! 테이블별 필드 정의를 읽기 위주로 제공합니다.
//! 스냅샷은 통째로 교체되므로 요청 처리 중에 카탈로그가 바뀌어 보이는 일은 없습니다.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::schema::FieldDef;

/// 카탈로그 조회 인터페이스
pub trait FieldCatalog: Send + Sync {
    /// 테이블의 필드 정의
    fn lookup(&self, table_name: &str) -> Option<Arc<[FieldDef]>>;
}

/// 카탈로그 원본 (외부 메타데이터 저장소)
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn load(&self) -> Result<HashMap<String, Vec<FieldDef>>>;
}

type Snapshot = HashMap<String, Arc<[FieldDef]>>;

/// 카탈로그 스냅샷 저장소
#[derive(Debug, Default)]
pub struct CatalogStore {
    snapshot: RwLock<Arc<Snapshot>>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 초기 테이블 정의로 생성
    pub fn from_tables(tables: HashMap<String, Vec<FieldDef>>) -> Self {
        let store = Self::new();
        store.replace(tables);
        store
    }

    /// 현재 스냅샷
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 스냅샷 교체
    pub fn replace(&self, tables: HashMap<String, Vec<FieldDef>>) {
        let next: Snapshot = tables
            .into_iter()
            .map(|(name, fields)| (name, Arc::from(fields)))
            .collect();
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
    }

    /// 원본에서 다시 읽어 교체. 실패 시 기존 스냅샷 유지
    pub async fn refresh(&self, source: &dyn CatalogSource) -> Result<usize> {
        let tables = source.load().await?;
        let count = tables.len();
        self.replace(tables);
        Ok(count)
    }

    /// 주기적 갱신 태스크 시작
    ///
    /// 첫 갱신은 `every` 뒤에 실행됩니다 (초기 적재는 호출자 몫).
    /// `shutdown`이 취소되면 태스크가 끝납니다.
    pub fn spawn_refresh(
        self: &Arc<Self>,
        source: Arc<dyn CatalogSource>,
        every: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + every, every);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("field catalog refresh stopped");
                        break;
                    }
                    _ = ticker.tick() => {}
                }
                match store.refresh(source.as_ref()).await {
                    Ok(count) => tracing::debug!(tables = count, "field catalog refreshed"),
                    Err(e) => tracing::warn!("Field catalog refresh failed: {}", e),
                }
            }
        })
    }
}

impl FieldCatalog for CatalogStore {
    fn lookup(&self, table_name: &str) -> Option<Arc<[FieldDef]>> {
        self.snapshot().get(table_name).cloned()
    }
}

/// `{ "<table>": [FieldDef, ...] }` 형식의 JSON 파일 원본
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogSource for JsonFileSource {
    async fn load(&self) -> Result<HashMap<String, Vec<FieldDef>>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::database(format!(
                "failed to read catalog {}: {}",
                self.path.display(),
                e
            ))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| Error::database(format!("invalid catalog document: {}", e)))
    }
}
