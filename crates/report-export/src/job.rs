//! 내보내기 작업 모델.

use report_core::{Credential, Record};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// 객체가 아닌 `params`는 빈 객체로 취급합니다.
fn params_or_empty<'de, D>(deserializer: D) -> Result<Record, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map,
        _ => Record::new(),
    })
}

/// 하위 작업 (파일 하나).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubJob {
    /// 리포트 이름 (컬렉션 이름)
    pub name: String,
    /// 헤더 및 출력 순서
    #[serde(default)]
    pub columns: Vec<String>,
    /// 사용자 자격증명 (전역 리포트는 없음)
    #[serde(default)]
    pub auth: Option<Credential>,
    /// 조회 파라미터 (`start`, `end` 등)
    #[serde(default, deserialize_with = "params_or_empty")]
    pub params: Record,
}

impl SubJob {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            auth: None,
            params: Record::new(),
        }
    }

    pub fn with_auth(mut self, auth: Credential) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_param(mut self, key: &str, value: Value) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }

    /// 완료 이벤트에 싣는 파라미터 스냅샷 (`params` + `name`).
    pub fn param_snapshot(&self) -> Record {
        let mut snapshot = self.params.clone();
        snapshot.insert("name".to_string(), Value::String(self.name.clone()));
        snapshot
    }
}

/// 내보내기 작업.
///
/// 단일 작업(하위 작업 필드가 최상위에 있는 형태)은 역직렬화 시 항목 하나짜리
/// 배치로 바뀝니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawJob")]
pub struct ExportJob {
    /// 작업 이름
    pub name: String,
    /// 하위 작업 (순서대로 처리)
    pub items: Vec<SubJob>,
    /// true면 실제 데이터 대신 안내 문구만 기록
    pub is_unauthenticated: bool,
    /// 요청자 정보 (그대로 전달)
    pub user_info: Value,
    /// 요청자 ID (그대로 전달)
    pub user_id: Value,
    /// 최상위 파라미터 (`email` 등)
    pub params: Record,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawJob {
    #[serde(default)]
    name: String,
    #[serde(default)]
    items: Option<Vec<SubJob>>,
    #[serde(default)]
    is_unauthenticated: bool,
    #[serde(default)]
    user_info: Value,
    #[serde(default)]
    user_id: Value,
    #[serde(default, deserialize_with = "params_or_empty")]
    params: Record,
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    auth: Option<Credential>,
}

impl From<RawJob> for ExportJob {
    fn from(raw: RawJob) -> Self {
        let items = raw.items.unwrap_or_else(|| {
            vec![SubJob {
                name: raw.name.clone(),
                columns: raw.columns,
                auth: raw.auth,
                params: raw.params.clone(),
            }]
        });

        Self {
            name: raw.name,
            items,
            is_unauthenticated: raw.is_unauthenticated,
            user_info: raw.user_info,
            user_id: raw.user_id,
            params: raw.params,
        }
    }
}

impl ExportJob {
    /// 배치 작업 생성.
    pub fn batch(name: impl Into<String>, items: Vec<SubJob>) -> Self {
        Self {
            name: name.into(),
            items,
            is_unauthenticated: false,
            user_info: Value::Null,
            user_id: Value::Null,
            params: Record::new(),
        }
    }

    /// 하위 작업 하나짜리 작업 생성.
    pub fn single(item: SubJob) -> Self {
        let mut job = Self::batch(item.name.clone(), Vec::new());
        job.params = item.params.clone();
        job.items.push(item);
        job
    }

    pub fn unauthenticated(mut self) -> Self {
        self.is_unauthenticated = true;
        self
    }

    /// 자격증명 시크릿을 지운 복사본 (이벤트 payload용).
    pub fn redacted(&self) -> Self {
        let mut job = self.clone();
        for auth in job.items.iter_mut().filter_map(|item| item.auth.as_mut()) {
            auth.api_secret.clear();
        }
        job
    }

    /// 완료 알림 주소 (최상위 `params.email`).
    pub fn notify_address(&self) -> Option<String> {
        self.params
            .get("email")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}
