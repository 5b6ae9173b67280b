//! 에러 타입 정의.

use report_core::{StoreError, SyncMethod};
use report_exchange::RemoteError;
use thiserror::Error;

/// 동기화 엔진 에러 타입
#[derive(Debug, Error)]
pub enum SyncError {
    /// 원격 데이터 소스 에러 (재시도 한도 초과 포함)
    #[error("Remote error: {0}")]
    Remote(RemoteError),

    /// 로컬 저장소 에러
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// 레지스트리 메서드에 대한 처리기가 없음
    #[error("ERR_METHOD_NOT_FOUND: {0}")]
    UnknownMethod(SyncMethod),
}

impl From<RemoteError> for SyncError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::UnknownMethod(method) => Self::UnknownMethod(method),
            other => Self::Remote(other),
        }
    }
}

impl SyncError {
    /// 인증 에러 여부.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Remote(e) if e.is_auth_error())
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, SyncError>;
