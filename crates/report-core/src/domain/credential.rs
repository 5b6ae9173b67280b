//! 사용자 API 자격증명.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// 거래소 API 자격증명.
///
/// # 보안
/// - `Debug` 구현은 `api_key`를 마스킹하고 `api_secret`은 출력하지 않습니다.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// API 키 (사용자 범위 식별자로도 사용)
    pub api_key: String,
    /// API 시크릿
    pub api_secret: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("api_key", &mask_key(&self.api_key))
            .field("api_secret", &"***REDACTED***")
            .finish()
    }
}

impl Credential {
    /// 새 자격증명 생성.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    /// 저장소에 보관된 인증 레코드에서 자격증명을 읽습니다.
    ///
    /// 객체가 아니면 `None`을 반환합니다. 객체이지만 필드가 문자열이 아니면
    /// 빈 문자열로 채워지므로 이후 [`Credential::is_valid`] 검사에서 걸러집니다.
    pub fn from_stored(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let field = |name: &str| {
            obj.get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Some(Self {
            api_key: field("apiKey"),
            api_secret: field("apiSecret"),
        })
    }

    /// 키와 시크릿이 모두 비어있지 않은지 확인.
    pub fn is_valid(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }

    /// 로그에 남겨도 되는 사용자 식별 문자열.
    pub fn masked_key(&self) -> String {
        mask_key(&self.api_key)
    }
}

fn mask_key(key: &str) -> String {
    if key.len() > 8 && key.is_ascii() {
        format!("{}...{}", &key[..4], &key[key.len() - 4..])
    } else {
        "***REDACTED***".to_string()
    }
}
