//! Bridge 설정

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use tbl_sql::DialectKind;

/// Bridge 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 서버 포트
    pub port: u16,

    /// 프로세스 전체에서 사용하는 SQL dialect
    pub dialect: DialectKind,

    /// DB 이름 -> 접속 URL
    pub databases: Vec<(String, String)>,

    /// DB별 최대 커넥션 수
    pub max_connections: u32,

    /// INSERT 묶음 크기
    pub batch_size: usize,

    /// 구문 실행 제한 시간 (None = 제한 없음)
    pub statement_timeout: Option<Duration>,

    /// 필드 카탈로그 JSON 파일 경로
    pub catalog_path: Option<PathBuf>,

    /// 카탈로그 갱신 주기
    pub catalog_refresh: Duration,

    /// Auth 비활성화 (개발용)
    pub disable_auth: bool,
}

impl Config {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 임의의 조회 함수에서 설정 로드
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let timeout_ms: u64 = var("TBL_STATEMENT_TIMEOUT_MS", "30000")
            .parse()
            .context("TBL_STATEMENT_TIMEOUT_MS")?;
        let batch_size: usize = var("TBL_BATCH_SIZE", "30")
            .parse()
            .context("TBL_BATCH_SIZE")?;
        if batch_size == 0 {
            anyhow::bail!("TBL_BATCH_SIZE must be positive");
        }

        Ok(Self {
            port: var("TBL_BRIDGE_PORT", "3000")
                .parse()
                .context("TBL_BRIDGE_PORT")?,

            dialect: var("TBL_DB_DIALECT", "postgres")
                .parse()
                .map_err(|e| anyhow::anyhow!("TBL_DB_DIALECT: {}", e))?,

            databases: parse_database_urls(&var("TBL_DATABASE_URLS", ""))?,

            max_connections: var("TBL_DB_MAX_CONNECTIONS", "5")
                .parse()
                .unwrap_or(5),

            batch_size,

            statement_timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),

            catalog_path: lookup("TBL_CATALOG_PATH")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),

            catalog_refresh: Duration::from_secs(
                var("TBL_CATALOG_REFRESH_SECS", "60").parse().unwrap_or(60),
            ),

            disable_auth: var("TBL_DISABLE_AUTH", "false").parse().unwrap_or(false),
        })
    }
}

/// `name=url,name=url` 형식 파싱
fn parse_database_urls(raw: &str) -> anyhow::Result<Vec<(String, String)>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (name, url) = pair
                .split_once('=')
                .with_context(|| format!("invalid TBL_DATABASE_URLS entry: {}", pair))?;
            Ok((name.trim().to_string(), url.trim().to_string()))
        })
        .collect()
}
