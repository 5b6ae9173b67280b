//! 원격 API 레코드와 정규화.

use serde_json::{Map, Value};

/// 저장 단위 레코드 (필드 이름 → 값).
pub type Record = Map<String, Value>;

/// 원격 호출 파라미터.
///
/// `start`는 포함 하한, `end`는 포함 상한(밀리초 타임스탬프)입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchParams {
    /// 조회 시작 시각
    pub start: i64,
    /// 조회 종료 시각
    pub end: i64,
    /// 최대 레코드 수 (`None`이면 원격 기본값)
    pub limit: Option<u64>,
}

impl FetchParams {
    /// 현재 시각까지의 범위로 생성.
    pub fn until_now(start: i64, limit: Option<u64>) -> Self {
        Self {
            start,
            end: now_ms(),
            limit,
        }
    }
}

/// 현재 시각 (밀리초).
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// 레코드의 날짜 필드를 유한한 정수로 읽습니다.
///
/// 정수가 아니거나 필드가 없으면 `None`.
pub fn date_value(record: &Value, field: &str) -> Option<i64> {
    as_date(record.as_object()?.get(field)?)
}

/// 단일 값을 정수 타임스탬프로 읽습니다.
pub fn as_date(value: &Value) -> Option<i64> {
    if let Some(v) = value.as_i64() {
        return Some(v);
    }
    value
        .as_f64()
        .filter(|v| v.is_finite() && v.fract() == 0.0)
        .map(|v| v as i64)
}

/// 허용 필드 목록만 남기도록 레코드를 정규화합니다.
///
/// `model`이 비어 있으면 모든 필드를 유지합니다. 객체가 아닌 항목은 버립니다.
pub fn normalize(items: Vec<Value>, model: &[String]) -> Vec<Record> {
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::Object(obj) if model.is_empty() => Some(obj),
            Value::Object(mut obj) => {
                obj.retain(|key, _| model.iter().any(|m| m == key));
                Some(obj)
            }
            other => {
                tracing::debug!(item = %other, "객체가 아닌 항목 무시");
                None
            }
        })
        .collect()
}
