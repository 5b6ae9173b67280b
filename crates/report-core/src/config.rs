//! 설정 관리.
//!
//! 기본값 → (선택) TOML 파일 → `REPORT__` 접두사 환경 변수 순서로 병합합니다.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
    /// 거래소 REST 설정
    pub exchange: ExchangeConfig,
    /// 동기화 엔진 설정
    pub sync: SyncConfig,
    /// 내보내기 설정
    pub export: ExportConfig,
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 접속 URL
    pub url: String,
    /// 최대 연결 수
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/report".to_string(),
            max_connections: 5,
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// 거래소 REST 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// REST API 기본 URL
    pub rest_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            rest_url: "https://api.bitfinex.com".to_string(),
            timeout_secs: 30,
        }
    }
}

/// 동기화 엔진 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// rate limit 에러 후 대기 시간 (밀리초)
    pub rate_limit_delay_ms: u64,
    /// rate limit 에러 재시도 횟수
    pub rate_limit_retries: u32,
    /// nonce 에러 후 대기 시간 (밀리초)
    pub nonce_delay_ms: u64,
    /// nonce 에러 재시도 횟수
    pub nonce_retries: u32,
    /// 한 사용자의 치명적 에러로 전체 배치를 중단할지 여부
    pub abort_on_user_error: bool,
    /// 데몬 모드 실행 주기 (분)
    pub interval_minutes: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rate_limit_delay_ms: 80_000,
            rate_limit_retries: 1,
            nonce_delay_ms: 1_000,
            nonce_retries: 20,
            abort_on_user_error: false,
            interval_minutes: 60,
        }
    }
}

impl SyncConfig {
    /// rate limit 대기 시간을 Duration으로 반환
    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    /// nonce 대기 시간을 Duration으로 반환
    pub fn nonce_delay(&self) -> Duration {
        Duration::from_millis(self.nonce_delay_ms)
    }

    /// 데몬 실행 주기를 Duration으로 반환
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes * 60)
    }
}

/// 내보내기 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportConfig {
    /// 생성 파일을 둘 디렉터리
    pub output_dir: PathBuf,
    /// 인증되지 않은 작업에 기록할 안내 문구
    pub placeholder_message: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir().join("report-export"),
            placeholder_message: "Your file could not be completed, please try again".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("REPORT")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load("config/default.toml")
    }
}
