//! 내보내기 에러 타입.

use report_core::StoreError;
use report_exchange::RemoteError;
use std::path::PathBuf;
use thiserror::Error;

/// 내보내기 에러.
#[derive(Debug, Error)]
pub enum ExportError {
    /// 파일 열기/쓰기/동기화 실패
    #[error("파일 에러 ({path}): {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV 인코딩 실패
    #[error("CSV 에러: {0}")]
    Csv(#[from] csv::Error),

    /// 데이터 조회 실패
    #[error("데이터 조회 실패: {0}")]
    Source(String),

    /// 인증 에러 (재인증 필요)
    #[error("ERR_AUTH_UNAUTHORIZED: {0}")]
    Unauthorized(String),

    /// 하위 작업 이름에 해당하는 리포트 없음
    #[error("알 수 없는 리포트: {0}")]
    UnknownReport(String),

    /// 저장소 에러
    #[error("저장소 에러: {0}")]
    Store(#[from] StoreError),

    /// 큐 워커가 종료됨
    #[error("내보내기 큐가 닫힘")]
    QueueClosed,
}

impl ExportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// 인증 에러 여부.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }
}

impl From<RemoteError> for ExportError {
    fn from(err: RemoteError) -> Self {
        if err.is_auth_error() {
            Self::Unauthorized(err.to_string())
        } else {
            Self::Source(err.to_string())
        }
    }
}

/// 내보내기 Result 타입.
pub type ExportResult<T> = Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_auth_error_is_classified() {
        let err = ExportError::from(RemoteError::Unauthorized("apikey: invalid".to_string()));
        assert!(err.is_auth_error());

        let err = ExportError::from(RemoteError::Timeout("30s".to_string()));
        assert!(!err.is_auth_error());
        assert!(matches!(err, ExportError::Source(_)));
    }
}
