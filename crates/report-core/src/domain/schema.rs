//! 동기화 컬렉션 스키마 레지스트리.
//!
//! 동기화 메서드마다 로컬 컬렉션이 어떻게 채워지는지를 기술합니다.
//! 레지스트리는 불변 값이며, 실행마다 [`SchemaRegistry::working_copy`]로
//! 복사본을 받아 사용합니다.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 한 번의 backfill에서 가져올 최대 레코드 수
pub const BACKFILL_LIMIT: u64 = 10_000_000;

/// 동기화 메서드 식별자.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncMethod {
    Ledgers,
    Trades,
    Orders,
    Movements,
    FundingOfferHistory,
    FundingLoanHistory,
    FundingCreditHistory,
    PositionsHistory,
    Symbols,
    Currencies,
}

impl SyncMethod {
    /// 모든 메서드 (레지스트리 순서).
    pub const ALL: [SyncMethod; 10] = [
        SyncMethod::Ledgers,
        SyncMethod::Trades,
        SyncMethod::Orders,
        SyncMethod::Movements,
        SyncMethod::FundingOfferHistory,
        SyncMethod::FundingLoanHistory,
        SyncMethod::FundingCreditHistory,
        SyncMethod::PositionsHistory,
        SyncMethod::Symbols,
        SyncMethod::Currencies,
    ];

    /// 문자열 식별자.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMethod::Ledgers => "ledgers",
            SyncMethod::Trades => "trades",
            SyncMethod::Orders => "orders",
            SyncMethod::Movements => "movements",
            SyncMethod::FundingOfferHistory => "fundingOfferHistory",
            SyncMethod::FundingLoanHistory => "fundingLoanHistory",
            SyncMethod::FundingCreditHistory => "fundingCreditHistory",
            SyncMethod::PositionsHistory => "positionsHistory",
            SyncMethod::Symbols => "symbols",
            SyncMethod::Currencies => "currencies",
        }
    }
}

impl fmt::Display for SyncMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SyncMethod::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("Unknown sync method: {}", s))
    }
}

/// 컬렉션 병합 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// 시간 순서가 있는 대용량 컬렉션, 추가만 함 (backfill)
    InsertableArrayOfObjects,
    /// 작은 객체 목록, 원격과 동일하게 맞춤 (mirror)
    UpdatableArrayOfObjects,
    /// 작은 스칼라 목록, 원격과 동일하게 맞춤 (mirror)
    UpdatableArrayOfScalars,
}

impl CollectionKind {
    /// backfill 대상 여부.
    pub fn is_insertable(&self) -> bool {
        matches!(self, CollectionKind::InsertableArrayOfObjects)
    }
}

/// 정렬 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// SQL 키워드.
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// 최신 레코드 조회에 쓰는 정렬 기준.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    /// 정렬 필드
    pub field: String,
    /// 방향
    pub direction: SortDirection,
}

impl SortOrder {
    /// 내림차순 정렬 (가장 최신이 첫 번째).
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// 컬렉션 기술자.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    /// 동기화 메서드
    pub method: SyncMethod,
    /// 로컬 컬렉션 이름
    pub name: String,
    /// 병합 방식
    pub kind: CollectionKind,
    /// 커서로 쓰는 단조 증가 타임스탬프 필드 (insertable 전용)
    pub date_field: Option<String>,
    /// 최신 레코드 조회 정렬
    pub sort: Option<SortOrder>,
    /// 원격이 한 번에 돌려주는 최대 레코드 수
    ///
    /// 백필은 이 값보다 짧은 페이지를 마지막 페이지로 보고 멈춥니다. 거래소가
    /// 실제로 적용하는 요청당 상한과 정확히 같아야 하며, 더 크게 잡으면 데이터
    /// 중간에서 동기화가 끝납니다.
    pub page_size_ceiling: Option<u64>,
    /// 정규화 시 유지할 필드 (비어 있으면 전체 유지)
    pub model: Vec<String>,
    /// 레코드 식별 필드 (mirror 전용, 스칼라는 하나)
    pub key_fields: Vec<String>,
}

impl CollectionDescriptor {
    /// insertable 컬렉션 기술자 생성.
    pub fn insertable(
        method: SyncMethod,
        date_field: &str,
        page_size_ceiling: u64,
        model: &[&str],
    ) -> Self {
        Self {
            method,
            name: method.as_str().to_string(),
            kind: CollectionKind::InsertableArrayOfObjects,
            date_field: Some(date_field.to_string()),
            sort: Some(SortOrder::desc(date_field)),
            page_size_ceiling: Some(page_size_ceiling),
            model: model.iter().map(|s| s.to_string()).collect(),
            key_fields: Vec::new(),
        }
    }

    /// 객체 mirror 컬렉션 기술자 생성.
    pub fn updatable_objects(method: SyncMethod, key_fields: &[&str], model: &[&str]) -> Self {
        Self {
            method,
            name: method.as_str().to_string(),
            kind: CollectionKind::UpdatableArrayOfObjects,
            date_field: None,
            sort: None,
            page_size_ceiling: None,
            model: model.iter().map(|s| s.to_string()).collect(),
            key_fields: key_fields.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// 스칼라 mirror 컬렉션 기술자 생성.
    pub fn updatable_scalars(method: SyncMethod, key_field: &str) -> Self {
        Self {
            method,
            name: method.as_str().to_string(),
            kind: CollectionKind::UpdatableArrayOfScalars,
            date_field: None,
            sort: None,
            page_size_ceiling: None,
            model: Vec::new(),
            key_fields: vec![key_field.to_string()],
        }
    }

    /// 스칼라 컬렉션의 키 필드.
    pub fn key_field(&self) -> Option<&str> {
        self.key_fields.first().map(String::as_str)
    }
}

/// 불변 컬렉션 스키마 레지스트리.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRegistry {
    descriptors: Vec<CollectionDescriptor>,
}

impl SchemaRegistry {
    /// 주어진 기술자로 레지스트리를 만듭니다 (순서 유지).
    pub fn new(descriptors: Vec<CollectionDescriptor>) -> Self {
        Self { descriptors }
    }

    /// 실행용 복사본.
    pub fn working_copy(&self) -> Vec<CollectionDescriptor> {
        self.descriptors.clone()
    }

    /// 레지스트리 순서로 순회.
    pub fn iter(&self) -> impl Iterator<Item = &CollectionDescriptor> {
        self.descriptors.iter()
    }

    /// 메서드로 기술자 조회.
    pub fn get(&self, method: SyncMethod) -> Option<&CollectionDescriptor> {
        self.descriptors.iter().find(|d| d.method == method)
    }

    /// 컬렉션 이름으로 기술자 조회.
    pub fn by_collection(&self, name: &str) -> Option<&CollectionDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        use SyncMethod::*;

        Self::new(vec![
            CollectionDescriptor::insertable(
                Ledgers,
                "mts",
                5000,
                &["id", "currency", "mts", "amount", "balance", "description", "wallet"],
            ),
            CollectionDescriptor::insertable(
                Trades,
                "mtsCreate",
                1500,
                &[
                    "id", "symbol", "mtsCreate", "orderID", "execAmount", "execPrice",
                    "orderType", "orderPrice", "maker", "fee", "feeCurrency",
                ],
            ),
            CollectionDescriptor::insertable(
                Orders,
                "mtsUpdate",
                5000,
                &[
                    "id", "gid", "cid", "symbol", "mtsCreate", "mtsUpdate", "amount",
                    "amountOrig", "type", "typePrev", "flags", "status", "price", "priceAvg",
                    "priceTrailing", "priceAuxLimit", "notify", "placedId",
                ],
            ),
            CollectionDescriptor::insertable(
                Movements,
                "mtsUpdated",
                25,
                &[
                    "id", "currency", "currencyName", "mtsStarted", "mtsUpdated", "status",
                    "amount", "fees", "destinationAddress", "transactionId",
                ],
            ),
            CollectionDescriptor::insertable(
                FundingOfferHistory,
                "mtsUpdate",
                5000,
                &[
                    "id", "symbol", "mtsCreate", "mtsUpdate", "amount", "amountOrig", "type",
                    "flags", "status", "rate", "period", "notify", "hidden", "renew", "rateReal",
                ],
            ),
            CollectionDescriptor::insertable(
                FundingLoanHistory,
                "mtsUpdate",
                5000,
                &[
                    "id", "symbol", "side", "mtsCreate", "mtsUpdate", "amount", "flags",
                    "status", "rate", "period", "mtsOpening", "mtsLastPayout", "notify",
                    "hidden", "renew", "rateReal", "noClose",
                ],
            ),
            CollectionDescriptor::insertable(
                FundingCreditHistory,
                "mtsUpdate",
                5000,
                &[
                    "id", "symbol", "side", "mtsCreate", "mtsUpdate", "amount", "flags",
                    "status", "rate", "period", "mtsOpening", "mtsLastPayout", "notify",
                    "hidden", "renew", "rateReal", "noClose", "positionPair",
                ],
            ),
            CollectionDescriptor::insertable(
                PositionsHistory,
                "mtsUpdate",
                500,
                &[
                    "id", "symbol", "status", "amount", "basePrice", "marginFunding",
                    "marginFundingType", "pl", "plPerc", "leverage", "mtsCreate", "mtsUpdate",
                ],
            ),
            CollectionDescriptor::updatable_scalars(Symbols, "pairs"),
            CollectionDescriptor::updatable_objects(
                Currencies,
                &["id"],
                &["id", "name", "pool", "explorer"],
            ),
        ])
    }
}
