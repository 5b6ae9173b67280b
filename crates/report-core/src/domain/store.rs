//! 로컬 저장소 계약.
//!
//! 동기화 엔진은 이 trait만 사용하여 저장소에 읽고 씁니다.
//! 구현체는 `report-data` 크레이트에 있습니다 (PostgreSQL, 메모리).

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

use super::{Credential, Progress, Record, SortOrder};

// =============================================================================
// 에러 타입
// =============================================================================

/// 저장소 에러.
#[derive(Debug, Error)]
pub enum StoreError {
    /// 데이터베이스 에러
    #[error("데이터베이스 에러: {0}")]
    Database(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),

    /// 잘못된 요청
    #[error("잘못된 요청: {0}")]
    InvalidInput(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// 저장소 작업 Result 타입.
pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// 조회 조건
// =============================================================================

/// 날짜 범위 레코드 조회 조건 (최신순).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuery {
    /// 범위 판정에 쓰는 날짜 필드
    pub date_field: String,
    /// 포함 하한
    pub start: Option<i64>,
    /// 포함 상한
    pub end: Option<i64>,
    /// 최대 개수
    pub limit: usize,
}

/// 키 필드 → 유지할 값 목록.
pub type KeyLists = BTreeMap<String, Vec<Value>>;

// =============================================================================
// LocalStore Trait
// =============================================================================

/// 동기화 데이터를 보관하는 로컬 저장소.
///
/// 각 호출은 호출 단위로 원자적이어야 합니다. 컬렉션 간 트랜잭션은 가정하지 않습니다.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// 활성 사용자의 저장된 인증 레코드 목록 (저장 순서).
    async fn list_active_credentials(&self) -> StoreResult<Vec<Value>>;

    /// 사용자 범위에서 정렬 기준상 첫 번째 레코드.
    async fn get_latest_record(
        &self,
        collection: &str,
        auth: &Credential,
        sort: &SortOrder,
    ) -> StoreResult<Option<Record>>;

    /// 사용자 범위로 레코드 일괄 추가.
    async fn insert_records(
        &self,
        collection: &str,
        auth: &Credential,
        records: Vec<Record>,
    ) -> StoreResult<()>;

    /// 키 필드가 같은 레코드가 없을 때만 추가 (기존 레코드는 덮어쓰지 않음).
    async fn upsert_if_absent(
        &self,
        collection: &str,
        key_fields: &[String],
        records: Vec<Record>,
    ) -> StoreResult<u64>;

    /// 키 필드 값이 주어진 목록에 없는 레코드 삭제. 삭제 수 반환.
    async fn delete_where_key_not_in(&self, collection: &str, lists: &KeyLists)
        -> StoreResult<u64>;

    /// 진행률 저장.
    async fn set_progress(&self, progress: &Progress) -> StoreResult<()>;

    /// 저장된 진행률 (`None`이면 저장된 값 없음).
    async fn get_progress(&self) -> StoreResult<Option<Progress>>;

    /// 불리언 플래그 저장.
    async fn set_flag(&self, name: &str, value: bool) -> StoreResult<()>;

    /// 불리언 플래그 조회.
    async fn get_flag(&self, name: &str) -> StoreResult<Option<bool>>;

    /// 날짜 범위 레코드 조회 (최신순). `auth`가 없으면 전역 컬렉션.
    async fn query_records(
        &self,
        collection: &str,
        auth: Option<&Credential>,
        query: &RecordQuery,
    ) -> StoreResult<Vec<Record>>;
}
