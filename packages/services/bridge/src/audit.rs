//! 활동 로그
//!
//! 실패한 요청과 성공한 변경(insert/update/delete)마다 이벤트 하나를 남깁니다.
//! 기록은 fire-and-forget이며 요청 처리 결과에 영향을 주지 않습니다.

use serde::Serialize;
use tbl_core::ErrorClass;

/// 활동 이벤트
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEvent {
    pub req_id: String,
    pub user_id: Option<String>,
    /// 요청 종류 (파싱 전 실패면 "request")
    pub action: String,
    pub db_name: String,
    pub table_name: String,
    pub outcome: ActivityOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActivityOutcome {
    Mutated {
        num_records: u64,
    },
    Failed {
        #[serde(skip)]
        class: ErrorClass,
        code: &'static str,
        loc: String,
    },
}

/// 활동 로그 수신자
pub trait ActivityLog: Send + Sync {
    fn record(&self, event: &ActivityEvent);
}

/// tracing 이벤트로 기록하는 기본 구현
#[derive(Debug, Clone, Default)]
pub struct TracingActivityLog;

impl ActivityLog for TracingActivityLog {
    fn record(&self, event: &ActivityEvent) {
        let user = event.user_id.as_deref().unwrap_or("-");
        match &event.outcome {
            ActivityOutcome::Mutated { num_records } => tracing::info!(
                target: "tbl_bridge::activity",
                req_id = %event.req_id,
                user = %user,
                action = %event.action,
                db = %event.db_name,
                table = %event.table_name,
                num_records,
                "mutation applied"
            ),
            ActivityOutcome::Failed { class, code, loc } => tracing::warn!(
                target: "tbl_bridge::activity",
                req_id = %event.req_id,
                user = %user,
                action = %event.action,
                db = %event.db_name,
                table = %event.table_name,
                class = ?class,
                code,
                loc = %loc,
                "request failed"
            ),
        }
    }
}

#[cfg(test)]
pub(crate) mod memory {
    use std::sync::{Mutex, PoisonError};

    use super::*;

    /// 이벤트를 메모리에 모으는 테스트용 구현
    #[derive(Debug, Default)]
    pub struct MemoryActivityLog {
        events: Mutex<Vec<ActivityEvent>>,
    }

    impl MemoryActivityLog {
        pub fn events(&self) -> Vec<ActivityEvent> {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    impl ActivityLog for MemoryActivityLog {
        fn record(&self, event: &ActivityEvent) {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = ActivityEvent {
            req_id: "r-1".into(),
            user_id: Some("u-1".into()),
            action: "insert".into(),
            db_name: "main".into(),
            table_name: "users".into(),
            outcome: ActivityOutcome::Mutated { num_records: 3 },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["outcome"]["outcome"], "mutated");
        assert_eq!(json["outcome"]["num_records"], 3);

        // 기본 구현은 패닉 없이 기록만 함
        TracingActivityLog.record(&event);
    }
}
