//! Bitfinex 거래소 커넥터.
//!
//! 계좌 이력(원장, 체결, 주문, 입출금, 펀딩, 포지션)은 인증 REST v2 엔드포인트,
//! 심볼/통화 목록은 공개 설정 엔드포인트에서 가져옵니다.
//! 배열 형태의 응답 행은 엔드포인트별 필드 맵으로 객체로 변환합니다.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use report_core::{Credential, ExchangeConfig, FetchParams, SyncMethod};
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Map, Value};
use sha2::Sha384;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::traits::RemoteDataSource;
use crate::{RemoteError, RemoteResult};

type HmacSha384 = Hmac<Sha384>;

// ============================================================================
// 설정
// ============================================================================

/// Bitfinex 클라이언트 설정.
#[derive(Debug, Clone)]
pub struct BitfinexConfig {
    /// REST 기본 URL (버전 경로 제외)
    pub rest_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for BitfinexConfig {
    fn default() -> Self {
        Self::from(&ExchangeConfig::default())
    }
}

impl From<&ExchangeConfig> for BitfinexConfig {
    fn from(config: &ExchangeConfig) -> Self {
        Self {
            rest_url: config.rest_url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_secs,
        }
    }
}

// ============================================================================
// 엔드포인트 정의
// ============================================================================

/// 인증 이력 엔드포인트와 배열 인덱스 → 필드 이름 맵.
struct HistEndpoint {
    path: &'static str,
    fields: &'static [(usize, &'static str)],
}

const LEDGERS: HistEndpoint = HistEndpoint {
    path: "auth/r/ledgers/hist",
    fields: &[
        (0, "id"),
        (1, "currency"),
        (2, "wallet"),
        (3, "mts"),
        (5, "amount"),
        (6, "balance"),
        (8, "description"),
    ],
};

const TRADES: HistEndpoint = HistEndpoint {
    path: "auth/r/trades/hist",
    fields: &[
        (0, "id"),
        (1, "symbol"),
        (2, "mtsCreate"),
        (3, "orderID"),
        (4, "execAmount"),
        (5, "execPrice"),
        (6, "orderType"),
        (7, "orderPrice"),
        (8, "maker"),
        (9, "fee"),
        (10, "feeCurrency"),
    ],
};

const ORDERS: HistEndpoint = HistEndpoint {
    path: "auth/r/orders/hist",
    fields: &[
        (0, "id"),
        (1, "gid"),
        (2, "cid"),
        (3, "symbol"),
        (4, "mtsCreate"),
        (5, "mtsUpdate"),
        (6, "amount"),
        (7, "amountOrig"),
        (8, "type"),
        (9, "typePrev"),
        (12, "flags"),
        (13, "status"),
        (16, "price"),
        (17, "priceAvg"),
        (18, "priceTrailing"),
        (19, "priceAuxLimit"),
        (23, "notify"),
        (25, "placedId"),
    ],
};

const MOVEMENTS: HistEndpoint = HistEndpoint {
    path: "auth/r/movements/hist",
    fields: &[
        (0, "id"),
        (1, "currency"),
        (2, "currencyName"),
        (5, "mtsStarted"),
        (6, "mtsUpdated"),
        (9, "status"),
        (12, "amount"),
        (13, "fees"),
        (16, "destinationAddress"),
        (20, "transactionId"),
    ],
};

const FUNDING_OFFERS: HistEndpoint = HistEndpoint {
    path: "auth/r/funding/offers/hist",
    fields: &[
        (0, "id"),
        (1, "symbol"),
        (2, "mtsCreate"),
        (3, "mtsUpdate"),
        (4, "amount"),
        (5, "amountOrig"),
        (6, "type"),
        (9, "flags"),
        (10, "status"),
        (14, "rate"),
        (15, "period"),
        (16, "notify"),
        (17, "hidden"),
        (19, "renew"),
        (20, "rateReal"),
    ],
};

const FUNDING_LOAN_FIELDS: &[(usize, &str)] = &[
    (0, "id"),
    (1, "symbol"),
    (2, "side"),
    (3, "mtsCreate"),
    (4, "mtsUpdate"),
    (5, "amount"),
    (6, "flags"),
    (7, "status"),
    (11, "rate"),
    (12, "period"),
    (13, "mtsOpening"),
    (14, "mtsLastPayout"),
    (15, "notify"),
    (16, "hidden"),
    (18, "renew"),
    (19, "rateReal"),
    (20, "noClose"),
];

const FUNDING_LOANS: HistEndpoint = HistEndpoint {
    path: "auth/r/funding/loans/hist",
    fields: FUNDING_LOAN_FIELDS,
};

const FUNDING_CREDITS: HistEndpoint = HistEndpoint {
    path: "auth/r/funding/credits/hist",
    fields: &[
        (0, "id"),
        (1, "symbol"),
        (2, "side"),
        (3, "mtsCreate"),
        (4, "mtsUpdate"),
        (5, "amount"),
        (6, "flags"),
        (7, "status"),
        (11, "rate"),
        (12, "period"),
        (13, "mtsOpening"),
        (14, "mtsLastPayout"),
        (15, "notify"),
        (16, "hidden"),
        (18, "renew"),
        (19, "rateReal"),
        (20, "noClose"),
        (21, "positionPair"),
    ],
};

const POSITIONS: HistEndpoint = HistEndpoint {
    path: "auth/r/positions/hist",
    fields: &[
        (0, "symbol"),
        (1, "status"),
        (2, "amount"),
        (3, "basePrice"),
        (4, "marginFunding"),
        (5, "marginFundingType"),
        (6, "pl"),
        (7, "plPerc"),
        (8, "liquidationPrice"),
        (9, "leverage"),
        (11, "id"),
        (12, "mtsCreate"),
        (13, "mtsUpdate"),
    ],
};

const SYMBOLS_PATH: &str = "conf/pub:list:pair:exchange";
const CURRENCIES_PATH: &str = "conf/pub:map:currency:label";

fn hist_endpoint(method: SyncMethod) -> Option<&'static HistEndpoint> {
    match method {
        SyncMethod::Ledgers => Some(&LEDGERS),
        SyncMethod::Trades => Some(&TRADES),
        SyncMethod::Orders => Some(&ORDERS),
        SyncMethod::Movements => Some(&MOVEMENTS),
        SyncMethod::FundingOfferHistory => Some(&FUNDING_OFFERS),
        SyncMethod::FundingLoanHistory => Some(&FUNDING_LOANS),
        SyncMethod::FundingCreditHistory => Some(&FUNDING_CREDITS),
        SyncMethod::PositionsHistory => Some(&POSITIONS),
        SyncMethod::Symbols | SyncMethod::Currencies => None,
    }
}

/// 배열 행을 필드 맵에 따라 객체로 변환합니다. 이미 객체인 행은 그대로 둡니다.
fn transform_row(row: Value, fields: &[(usize, &str)]) -> Value {
    match row {
        Value::Array(items) => {
            let mut obj = Map::new();
            for (idx, name) in fields {
                if let Some(v) = items.get(*idx) {
                    obj.insert((*name).to_string(), v.clone());
                }
            }
            Value::Object(obj)
        }
        other => other,
    }
}

// ============================================================================
// Bitfinex 클라이언트
// ============================================================================

/// Bitfinex REST v2 클라이언트.
pub struct BitfinexClient {
    config: BitfinexConfig,
    client: Client,
    /// 마지막으로 사용한 nonce (마이크로초)
    last_nonce: AtomicU64,
}

impl BitfinexClient {
    /// 새 Bitfinex 클라이언트 생성.
    ///
    /// # Errors
    /// HTTP 클라이언트 생성에 실패하면 `RemoteError::NetworkError`를 반환합니다.
    pub fn new(config: BitfinexConfig) -> RemoteResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RemoteError::NetworkError(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            config,
            client,
            last_nonce: AtomicU64::new(0),
        })
    }

    /// 엄격히 증가하는 nonce 생성.
    fn next_nonce(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or_default();

        let prev = self
            .last_nonce
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some(now.max(prev + 1))
            })
            .unwrap_or_default();
        now.max(prev + 1)
    }

    /// HMAC-SHA384로 `/api/v2/{path}{nonce}{body}` 서명.
    fn sign(secret: &str, path: &str, nonce: u64, body: &str) -> RemoteResult<String> {
        let mut mac = HmacSha384::new_from_slice(secret.as_bytes())
            .map_err(|e| RemoteError::Unauthorized(e.to_string()))?;
        mac.update(format!("/api/v2/{}{}{}", path, nonce, body).as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// 공개 API GET 요청.
    async fn public_get(&self, path: &str) -> RemoteResult<Value> {
        let url = format!("{}/v2/{}", self.config.rest_url, path);
        debug!("GET {}", url);

        let response = self.client.get(&url).send().await?;
        Self::handle_response(response).await
    }

    /// 서명된 POST 요청.
    async fn auth_post(&self, auth: &Credential, path: &str, body: &Value) -> RemoteResult<Value> {
        let url = format!("{}/v2/{}", self.config.rest_url, path);
        let body = serde_json::to_string(body)?;
        let nonce = self.next_nonce();
        let signature = Self::sign(&auth.api_secret, path, nonce, &body)?;

        debug!(user = %auth.masked_key(), "POST (signed) {}", path);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("bfx-nonce", nonce.to_string())
            .header("bfx-apikey", &auth.api_key)
            .header("bfx-signature", signature)
            .body(body)
            .send()
            .await?;

        Self::handle_response(response).await
    }

    /// 응답 상태와 에러 페이로드를 `RemoteError`로 변환.
    async fn handle_response(response: Response) -> RemoteResult<Value> {
        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RemoteError::RateLimited(text));
        }

        let parsed: Option<Value> = serde_json::from_str(&text).ok();

        // ["error", code, message]
        if let Some(Value::Array(items)) = &parsed {
            if items.first().and_then(Value::as_str) == Some("error") {
                let code = items.get(1).and_then(Value::as_i64).unwrap_or_default() as i32;
                let message = items.get(2).and_then(Value::as_str).unwrap_or_default();
                return Err(RemoteError::from_message(code, message));
            }
        }

        if !status.is_success() {
            let message = parsed
                .as_ref()
                .and_then(|v| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or(text);
            return Err(RemoteError::from_message(status.as_u16() as i32, message));
        }

        parsed.ok_or_else(|| RemoteError::ParseError(format!("JSON 아님: {}", text)))
    }

    async fn fetch_hist(
        &self,
        endpoint: &HistEndpoint,
        auth: &Credential,
        params: &FetchParams,
    ) -> RemoteResult<Vec<Value>> {
        let mut body = json!({ "start": params.start, "end": params.end });
        if let Some(limit) = params.limit {
            body["limit"] = json!(limit);
        }

        match self.auth_post(auth, endpoint.path, &body).await? {
            Value::Array(rows) => Ok(rows
                .into_iter()
                .map(|row| transform_row(row, endpoint.fields))
                .collect()),
            other => Err(RemoteError::ParseError(format!(
                "배열 응답이 아님: {}",
                other
            ))),
        }
    }

    async fn fetch_symbols(&self) -> RemoteResult<Vec<Value>> {
        // [[ "BTCUSD", "ETHUSD", ... ]]
        match self.public_get(SYMBOLS_PATH).await? {
            Value::Array(mut outer) if !outer.is_empty() => match outer.swap_remove(0) {
                Value::Array(pairs) => Ok(pairs),
                other => Err(RemoteError::ParseError(format!("심볼 목록 아님: {}", other))),
            },
            Value::Array(_) => Ok(Vec::new()),
            other => Err(RemoteError::ParseError(format!("심볼 목록 아님: {}", other))),
        }
    }

    async fn fetch_currencies(&self) -> RemoteResult<Vec<Value>> {
        // [[ ["BTC", "Bitcoin"], ... ]]
        let outer = match self.public_get(CURRENCIES_PATH).await? {
            Value::Array(outer) => outer,
            other => return Err(RemoteError::ParseError(format!("통화 목록 아님: {}", other))),
        };

        let pairs = match outer.into_iter().next() {
            Some(Value::Array(pairs)) => pairs,
            _ => return Ok(Vec::new()),
        };

        Ok(pairs
            .into_iter()
            .map(|pair| transform_row(pair, &[(0, "id"), (1, "name")]))
            .collect())
    }
}

#[async_trait]
impl RemoteDataSource for BitfinexClient {
    fn name(&self) -> &str {
        "bitfinex"
    }

    fn supports(&self, _method: SyncMethod) -> bool {
        true
    }

    async fn fetch(
        &self,
        method: SyncMethod,
        auth: &Credential,
        params: &FetchParams,
    ) -> RemoteResult<Vec<Value>> {
        match method {
            SyncMethod::Symbols => self.fetch_symbols().await,
            SyncMethod::Currencies => self.fetch_currencies().await,
            _ => {
                let endpoint =
                    hist_endpoint(method).ok_or(RemoteError::UnknownMethod(method))?;
                self.fetch_hist(endpoint, auth, params).await
            }
        }
    }
}
