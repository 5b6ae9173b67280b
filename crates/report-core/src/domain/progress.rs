//! 동기화 진행률.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 자격증명이 없거나 유효하지 않을 때 기록되는 값
pub const PROGRESS_UNAUTHORIZED: &str = "ERR_AUTH_UNAUTHORIZED";

/// 저장된 진행률이 없을 때 반환되는 값
pub const PROGRESS_NOT_STARTED: &str = "SYNCHRONIZATION_HAS_NOT_STARTED_YET";

/// 동기화 진행률.
///
/// 0–100 사이의 정수이거나 센티넬 문자열입니다. 저장 형식은 JSON 숫자 또는
/// 문자열이며, 알 수 없는 문자열은 에러 메시지로 취급합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ProgressRepr", into = "ProgressRepr")]
pub enum Progress {
    /// 백분율 (0–100)
    Percent(u8),
    /// 인증 정보 없음
    Unauthorized,
    /// 아직 동기화가 실행되지 않음
    NotStarted,
    /// 동기화 중 발생한 에러 메시지
    Error(String),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ProgressRepr {
    Percent(u8),
    Text(String),
}

impl From<ProgressRepr> for Progress {
    fn from(repr: ProgressRepr) -> Self {
        match repr {
            ProgressRepr::Percent(p) => Progress::Percent(p.min(100)),
            ProgressRepr::Text(s) if s == PROGRESS_UNAUTHORIZED => Progress::Unauthorized,
            ProgressRepr::Text(s) if s == PROGRESS_NOT_STARTED => Progress::NotStarted,
            ProgressRepr::Text(s) => Progress::Error(s),
        }
    }
}

impl From<Progress> for ProgressRepr {
    fn from(progress: Progress) -> Self {
        match progress {
            Progress::Percent(p) => ProgressRepr::Percent(p),
            Progress::Unauthorized => ProgressRepr::Text(PROGRESS_UNAUTHORIZED.to_string()),
            Progress::NotStarted => ProgressRepr::Text(PROGRESS_NOT_STARTED.to_string()),
            Progress::Error(msg) => ProgressRepr::Text(msg),
        }
    }
}

impl Progress {
    /// 완료 상태 (100%).
    pub const COMPLETE: Progress = Progress::Percent(100);

    /// 완료 비율과 사용자 비중으로 백분율을 계산합니다.
    ///
    /// `round(completed / total * 100 * user_fraction)`, 100을 넘지 않습니다.
    pub fn fraction(completed: usize, total: usize, user_fraction: f64) -> Self {
        if total == 0 {
            return Progress::Percent(0);
        }
        let value = (completed as f64 / total as f64 * 100.0 * user_fraction).round();
        Progress::Percent(value.clamp(0.0, 100.0) as u8)
    }

    /// 백분율 값 반환 (센티넬이면 `None`).
    pub fn percent(&self) -> Option<u8> {
        match self {
            Progress::Percent(p) => Some(*p),
            _ => None,
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Progress::Percent(p) => write!(f, "{}%", p),
            Progress::Unauthorized => write!(f, "{}", PROGRESS_UNAUTHORIZED),
            Progress::NotStarted => write!(f, "{}", PROGRESS_NOT_STARTED),
            Progress::Error(msg) => write!(f, "{}", msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fraction_rounding() {
        assert_eq!(Progress::fraction(1, 3, 1.0), Progress::Percent(33));
        assert_eq!(Progress::fraction(2, 3, 1.0), Progress::Percent(67));
        assert_eq!(Progress::fraction(1, 2, 0.5), Progress::Percent(25));
        assert_eq!(Progress::fraction(3, 3, 1.0), Progress::COMPLETE);
        assert_eq!(Progress::fraction(0, 0, 1.0), Progress::Percent(0));
    }

    #[test]
    fn test_serde_wire_format() {
        assert_eq!(serde_json::to_value(Progress::Percent(42)).unwrap(), json!(42));
        assert_eq!(
            serde_json::to_value(Progress::Unauthorized).unwrap(),
            json!("ERR_AUTH_UNAUTHORIZED")
        );

        let parsed: Progress = serde_json::from_value(json!("ERR_AUTH_UNAUTHORIZED")).unwrap();
        assert_eq!(parsed, Progress::Unauthorized);

        let parsed: Progress = serde_json::from_value(json!("Error: ratelimit: error")).unwrap();
        assert_eq!(parsed, Progress::Error("Error: ratelimit: error".to_string()));

        let parsed: Progress = serde_json::from_value(json!(100)).unwrap();
        assert_eq!(parsed, Progress::COMPLETE);
    }
}
