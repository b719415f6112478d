//! 호출자 신원
//!
//! 인증 자체는 외부(게이트웨이)가 수행하고, 엔진은 확정된 호출자 ID만 받습니다.
//! `_creator`/`_updater` 필드는 이 ID로 기록됩니다.

use serde::{Deserialize, Serialize};

/// 인증된 호출자
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// 사용자 ID
    pub user_id: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    /// 인증 비활성화(개발용) 시 사용하는 익명 호출자
    pub fn anonymous() -> Self {
        Self::new("anonymous")
    }
}

/// 신원 제공자
///
/// transport 계층이 전달한 자격 증명(헤더 값 등)을 호출자로 해석합니다.
pub trait IdentityProvider: Send + Sync {
    fn resolve(&self, credential: Option<&str>) -> Option<Identity>;
}

/// 상위 게이트웨이가 이미 인증한 사용자 ID를 그대로 신뢰하는 제공자
#[derive(Debug, Clone, Default)]
pub struct TrustedHeaderProvider {
    /// 자격 증명이 없을 때 익명 호출자로 허용
    pub allow_anonymous: bool,
}

impl IdentityProvider for TrustedHeaderProvider {
    fn resolve(&self, credential: Option<&str>) -> Option<Identity> {
        match credential.map(str::trim) {
            Some(user_id) if !user_id.is_empty() => Some(Identity::new(user_id)),
            _ if self.allow_anonymous => Some(Identity::anonymous()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trusted_header_resolution() {
        let strict = TrustedHeaderProvider::default();
        assert_eq!(strict.resolve(Some("u-1")), Some(Identity::new("u-1")));
        assert_eq!(strict.resolve(Some("  ")), None);
        assert_eq!(strict.resolve(None), None);

        let open = TrustedHeaderProvider {
            allow_anonymous: true,
        };
        assert_eq!(open.resolve(None), Some(Identity::anonymous()));
    }
}
