//! Bridge 앱 상태

use std::sync::{Arc, Mutex, PoisonError};

use tbl_core::catalog::{CatalogSource, CatalogStore, JsonFileSource};
use tbl_core::identity::TrustedHeaderProvider;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::db;
use crate::dispatch::Engine;

/// 앱 상태
///
/// 모든 핸들러에서 공유하는 상태입니다.
pub struct AppState {
    /// 설정
    pub config: Config,

    /// 쿼리 엔진
    pub engine: Engine,

    /// 서버 종료 신호 (요청별 취소 토큰과 백그라운드 태스크의 부모)
    pub shutdown: CancellationToken,

    /// 카탈로그 주기적 갱신 태스크
    catalog_refresh: Mutex<Option<JoinHandle<()>>>,
}

impl AppState {
    /// 새 상태 생성
    ///
    /// DB에 연결하고, 카탈로그 파일이 지정되어 있으면 읽은 뒤 주기적 갱신을 시작합니다.
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let databases = db::connect(config).await?;
        if databases.is_empty() {
            tracing::warn!("No databases configured; every request will fail");
        }

        let shutdown = CancellationToken::new();
        let catalog = Arc::new(CatalogStore::new());
        let mut catalog_refresh = None;
        if let Some(path) = &config.catalog_path {
            let source: Arc<dyn CatalogSource> = Arc::new(JsonFileSource::new(path));
            let tables = catalog.refresh(source.as_ref()).await?;
            tracing::info!(tables, path = %path.display(), "field catalog loaded");
            catalog_refresh = Some(catalog.spawn_refresh(
                source,
                config.catalog_refresh,
                shutdown.child_token(),
            ));
        }

        let identities = Arc::new(TrustedHeaderProvider {
            allow_anonymous: config.disable_auth,
        });

        let engine = Engine::new(databases, catalog, identities)
            .with_batch_size(config.batch_size)?
            .with_statement_timeout(config.statement_timeout);

        Ok(Self {
            config: config.clone(),
            engine,
            shutdown,
            catalog_refresh: Mutex::new(catalog_refresh),
        })
    }

    /// 종료 신호를 보내고 백그라운드 태스크가 끝날 때까지 대기
    pub async fn close(&self) {
        self.shutdown.cancel();
        let task = self
            .catalog_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!("Catalog refresh task ended abnormally: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    #[tokio::test]
    async fn test_close_stops_catalog_refresh() {
        let path = std::env::temp_dir().join(format!("tbl-catalog-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(
            &path,
            r#"{ "users": [{ "field_name": "id", "data_type": "int64" }] }"#,
        )
        .unwrap();

        let vars: HashMap<&str, String> = [
            ("TBL_CATALOG_PATH", path.display().to_string()),
            ("TBL_CATALOG_REFRESH_SECS", "3600".to_string()),
        ]
        .into_iter()
        .collect();
        let config = Config::from_lookup(|k| vars.get(k).cloned()).unwrap();

        // 카탈로그 파일을 읽지 못하면 여기서 실패
        let state = AppState::new(&config).await.unwrap();

        // 갱신 주기가 한 시간이어도 종료 신호에 바로 끝나야 함
        tokio::time::timeout(Duration::from_secs(5), state.close())
            .await
            .unwrap();
        assert!(state.shutdown.is_cancelled());

        std::fs::remove_file(&path).ok();
    }
}
