//! 원격 API 에러 타입.

use report_core::SyncMethod;
use thiserror::Error;

/// 원격 데이터 소스 에러.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// 요청 한도 초과
    #[error("ERR_RATE_LIMIT: {0}")]
    RateLimited(String),

    /// nonce가 이전 요청보다 작음 (시계/nonce 불일치)
    #[error("nonce: small ({0})")]
    NonceTooSmall(String),

    /// 인증/권한 에러
    #[error("ERR_AUTH_UNAUTHORIZED: {0}")]
    Unauthorized(String),

    /// 처리기가 없는 동기화 메서드
    #[error("ERR_METHOD_NOT_FOUND: {0}")]
    UnknownMethod(SyncMethod),

    /// 네트워크/연결 에러
    #[error("Network error: {0}")]
    NetworkError(String),

    /// 타임아웃
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// API 에러 코드
    #[error("API error {code}: {message}")]
    ApiError { code: i32, message: String },

    /// 파싱/역직렬화 에러
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// 원격 호출 Result 타입.
pub type RemoteResult<T> = Result<T, RemoteError>;

const RATE_LIMIT_PATTERNS: [&str; 3] = ["err_rate_limit", "err_limit", "ratelimit"];
const NONCE_PATTERNS: [&str; 1] = ["nonce: small"];
const AUTH_PATTERNS: [&str; 3] = [
    "apikey: digest invalid",
    "apikey: invalid",
    "err_auth_unauthorized",
];

impl RemoteError {
    /// 거래소 에러 메시지를 분류하여 에러를 만듭니다.
    pub fn from_message(code: i32, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        let matches_any = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

        if matches_any(&RATE_LIMIT_PATTERNS) {
            RemoteError::RateLimited(message)
        } else if matches_any(&NONCE_PATTERNS) {
            RemoteError::NonceTooSmall(message)
        } else if matches_any(&AUTH_PATTERNS) {
            RemoteError::Unauthorized(message)
        } else {
            RemoteError::ApiError { code, message }
        }
    }

    /// 요청 한도 초과 에러인지 확인.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, RemoteError::RateLimited(_))
    }

    /// nonce 에러인지 확인.
    pub fn is_nonce_too_small(&self) -> bool {
        matches!(self, RemoteError::NonceTooSmall(_))
    }

    /// 인증 에러인지 확인.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, RemoteError::Unauthorized(_))
    }

    /// 재시도 대상 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        self.is_rate_limit() || self.is_nonce_too_small()
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteError::Timeout(err.to_string())
        } else if err.is_decode() {
            RemoteError::ParseError(err.to_string())
        } else {
            RemoteError::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::ParseError(err.to_string())
    }
}
