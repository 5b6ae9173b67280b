//! 원격 호출 재시도.
//!
//! 거래소 API는 두 종류의 일시적 에러를 돌려줍니다:
//!
//! - **rate limit**: 긴 고정 대기 후 재시도 (기본 1회)
//! - **nonce: small**: 짧은 고정 대기 후 재시도 (기본 20회)
//!
//! 그 외 에러와 재시도 한도를 넘은 에러는 그대로 호출자에게 전파됩니다.
//! 두 카운터는 한 번의 `fetch_with_retry` 호출 안에서 누적됩니다.

use report_core::SyncConfig;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{RemoteError, RemoteResult};

/// 재시도 정책.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// rate limit 에러 허용 재시도 횟수
    pub rate_limit_retries: u32,
    /// rate limit 에러 후 대기 시간
    pub rate_limit_delay: Duration,
    /// nonce 에러 허용 재시도 횟수
    pub nonce_retries: u32,
    /// nonce 에러 후 대기 시간
    pub nonce_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for RetryPolicy {
    fn from(config: &SyncConfig) -> Self {
        Self {
            rate_limit_retries: config.rate_limit_retries,
            rate_limit_delay: config.rate_limit_delay(),
            nonce_retries: config.nonce_retries,
            nonce_delay: config.nonce_delay(),
        }
    }
}

impl RetryPolicy {
    /// 대기 없이 같은 횟수만 재시도하는 정책 (테스트/로컬 소스용).
    pub fn without_delay(mut self) -> Self {
        self.rate_limit_delay = Duration::ZERO;
        self.nonce_delay = Duration::ZERO;
        self
    }
}

/// 일시적 에러를 정책에 따라 재시도하며 원격 호출을 실행합니다.
///
/// # Arguments
/// * `policy` - 재시도 정책
/// * `context` - 로그에 남길 호출 이름
/// * `op` - 매 시도마다 새 future를 만드는 클로저
pub async fn fetch_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    context: &str,
    mut op: F,
) -> RemoteResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RemoteResult<T>>,
{
    let mut rate_limit_count = 0u32;
    let mut nonce_count = 0u32;

    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let delay = match &err {
            RemoteError::RateLimited(_) => {
                rate_limit_count += 1;
                if rate_limit_count > policy.rate_limit_retries {
                    return Err(err);
                }
                policy.rate_limit_delay
            }
            RemoteError::NonceTooSmall(_) => {
                nonce_count += 1;
                if nonce_count > policy.nonce_retries {
                    return Err(err);
                }
                policy.nonce_delay
            }
            _ => {
                debug!(context, error = %err, "재시도 불가 에러");
                return Err(err);
            }
        };

        warn!(
            context,
            error = %err,
            rate_limit_count,
            nonce_count,
            delay_ms = delay.as_millis() as u64,
            "일시적 에러, 대기 후 재시도"
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// 처음 `failures`번은 `make_err`로 실패하고 이후 성공하는 호출
    fn flaky(
        calls: Arc<AtomicU32>,
        failures: u32,
        make_err: fn() -> RemoteError,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = RemoteResult<u32>> + Send>> {
        move || {
            let calls = calls.clone();
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= failures {
                    Err(make_err())
                } else {
                    Ok(n)
                }
            })
        }
    }

    fn rate_limited() -> RemoteError {
        RemoteError::RateLimited("ratelimit: error".to_string())
    }

    fn nonce_small() -> RemoteError {
        RemoteError::NonceTooSmall("nonce: small".to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_once_then_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let result =
            fetch_with_retry(&RetryPolicy::default(), "test", flaky(calls.clone(), 1, rate_limited))
                .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_twice_is_fatal() {
        let calls = Arc::new(AtomicU32::new(0));
        let result =
            fetch_with_retry(&RetryPolicy::default(), "test", flaky(calls.clone(), 2, rate_limited))
                .await;

        assert!(result.unwrap_err().is_rate_limit());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nonce_twenty_failures_then_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let result =
            fetch_with_retry(&RetryPolicy::default(), "test", flaky(calls.clone(), 20, nonce_small))
                .await;

        assert_eq!(result.unwrap(), 21);
        assert_eq!(calls.load(Ordering::SeqCst), 21);
    }

    #[tokio::test(start_paused = true)]
    async fn test_nonce_twenty_one_failures_is_fatal() {
        let calls = Arc::new(AtomicU32::new(0));
        let result =
            fetch_with_retry(&RetryPolicy::default(), "test", flaky(calls.clone(), 100, nonce_small))
                .await;

        assert!(result.unwrap_err().is_nonce_too_small());
        assert_eq!(calls.load(Ordering::SeqCst), 21);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let result = fetch_with_retry(
            &RetryPolicy::default(),
            "test",
            flaky(calls.clone(), 5, || RemoteError::NetworkError("reset".to_string())),
        )
        .await;

        assert!(matches!(result, Err(RemoteError::NetworkError(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_waits_for_cooldown() {
        let calls = Arc::new(AtomicU32::new(0));
        let started = tokio::time::Instant::now();
        fetch_with_retry(&RetryPolicy::default(), "test", flaky(calls, 1, rate_limited))
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_secs(80));
    }
}
