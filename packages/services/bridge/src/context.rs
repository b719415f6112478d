//! 호출 컨텍스트
//!
//! 요청 하나의 마감 시각과 취소 신호를 DB 호출까지 전달합니다.
//! 마감이 지나거나 취소되면 진행 중인 구문은 `Error::Database`로 실패하고,
//! 열린 트랜잭션은 호출자가 롤백합니다.

use std::future::Future;
use std::time::Duration;

use tbl_core::{Error, Result};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// 호출 컨텍스트
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 지금부터 `timeout` 뒤를 마감으로 설정 (None이면 제한 없음)
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.deadline = timeout.map(|t| Instant::now() + t);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 마감/취소를 지키며 future 실행
    pub async fn bounded<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(Error::database("call cancelled"));
        }

        let run = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, fut)
                    .await
                    .map_err(|_| Error::database("statement deadline exceeded"))?,
                None => fut.await,
            }
        };

        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::database("call cancelled")),
            result = run => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_within_deadline() {
        let ctx = CallContext::new().with_timeout(Some(Duration::from_secs(5)));
        let value = ctx.bounded(async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_deadline_expiry_is_database_error() {
        let ctx = CallContext::new().with_timeout(Some(Duration::from_millis(10)));
        let err = ctx
            .bounded(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "DATABASE_ERROR");
    }

    #[tokio::test]
    async fn test_cancellation() {
        let token = CancellationToken::new();
        let ctx = CallContext::new().with_cancel(token.clone());
        token.cancel();
        let err = ctx.bounded(async { Ok(1) }).await.unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }
}
