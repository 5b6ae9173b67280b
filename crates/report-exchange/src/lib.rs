//! 원격 거래소 데이터 소스.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - RemoteDataSource trait: 동기화 메서드별 원격 호출 인터페이스
//! - 원격 에러 분류 (rate limit, nonce, 인증)
//! - fetch_with_retry: 일시적 에러에 대한 고정 대기 재시도
//! - Bitfinex REST v2 커넥터

pub mod connector;
pub mod error;
pub mod retry;
pub mod traits;

pub use connector::{BitfinexClient, BitfinexConfig};
pub use error::*;
pub use retry::{fetch_with_retry, RetryPolicy};
pub use traits::*;
