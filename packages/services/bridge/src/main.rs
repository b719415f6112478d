//! tabula Bridge
//!
//! `POST /db`로 조회/삽입/수정/삭제 요청을 처리합니다.

use std::net::SocketAddr;
use std::sync::Arc;

use tbl_bridge::{create_router, AppState, Config};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 환경변수 로드
    dotenvy::dotenv().ok();

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tbl_bridge=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 설정 로드
    let config = Config::from_env()?;
    tracing::info!(
        dialect = config.dialect.dialect().name(),
        databases = config.databases.len(),
        "Starting Bridge"
    );

    // 앱 상태 초기화
    let state = Arc::new(AppState::new(&config).await?);
    let shutdown = state.shutdown.clone();

    let app = create_router(Arc::clone(&state));

    // 서버 시작
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Bridge listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutting down");
            shutdown.cancel();
        })
        .await?;

    state.close().await;
    Ok(())
}
