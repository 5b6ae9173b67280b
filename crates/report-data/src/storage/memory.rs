//! 메모리 저장소.
//!
//! 프로세스 수명 동안만 유지됩니다. 저장된 모든 진행률 값을 순서대로
//! 기록하므로 진행률 단조성 검증에도 사용합니다.

use async_trait::async_trait;
use report_core::{
    as_date, Credential, KeyLists, LocalStore, Progress, Record, RecordQuery, SortDirection,
    SortOrder, StoreError, StoreResult,
};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredRecord {
    /// 사용자 범위 (전역 컬렉션이면 `None`)
    scope: Option<String>,
    data: Record,
}

#[derive(Debug, Default)]
struct Inner {
    credentials: Vec<Value>,
    credentials_unavailable: bool,
    collections: HashMap<String, Vec<StoredRecord>>,
    progress: Option<Progress>,
    progress_history: Vec<Progress>,
    flags: HashMap<String, bool>,
}

/// 메모리 기반 `LocalStore`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 활성 사용자 인증 레코드를 설정합니다.
    pub async fn set_credentials(&self, credentials: Vec<Value>) {
        self.inner.write().await.credentials = credentials;
    }

    /// 자격증명 조회를 실패하게 만듭니다.
    pub async fn set_credentials_unavailable(&self, unavailable: bool) {
        self.inner.write().await.credentials_unavailable = unavailable;
    }

    /// 사용자 범위 레코드를 미리 넣습니다.
    pub async fn seed(&self, collection: &str, scope: Option<&str>, records: Vec<Record>) {
        let mut inner = self.inner.write().await;
        let stored = inner.collections.entry(collection.to_string()).or_default();
        stored.extend(records.into_iter().map(|data| StoredRecord {
            scope: scope.map(str::to_string),
            data,
        }));
    }

    /// 컬렉션의 모든 레코드 (저장 순서).
    pub async fn records(&self, collection: &str) -> Vec<Record> {
        self.inner
            .read()
            .await
            .collections
            .get(collection)
            .map(|rs| rs.iter().map(|r| r.data.clone()).collect())
            .unwrap_or_default()
    }

    /// 지금까지 저장된 진행률 값 (저장 순서).
    pub async fn progress_history(&self) -> Vec<Progress> {
        self.inner.read().await.progress_history.clone()
    }
}

fn same_keys(a: &Record, b: &Record, key_fields: &[String]) -> bool {
    key_fields
        .iter()
        .all(|k| a.get(k).unwrap_or(&Value::Null) == b.get(k).unwrap_or(&Value::Null))
}

fn record_date(record: &Record, field: &str) -> Option<i64> {
    record.get(field).and_then(as_date)
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn list_active_credentials(&self) -> StoreResult<Vec<Value>> {
        let inner = self.inner.read().await;
        if inner.credentials_unavailable {
            return Err(StoreError::Database("credentials table unavailable".to_string()));
        }
        Ok(inner.credentials.clone())
    }

    async fn get_latest_record(
        &self,
        collection: &str,
        auth: &Credential,
        sort: &SortOrder,
    ) -> StoreResult<Option<Record>> {
        let inner = self.inner.read().await;
        let Some(stored) = inner.collections.get(collection) else {
            return Ok(None);
        };

        let scoped = stored
            .iter()
            .filter(|r| r.scope.as_deref() == Some(auth.api_key.as_str()));

        let mut best: Option<(i64, &Record)> = None;
        let mut first: Option<&Record> = None;
        for r in scoped {
            first.get_or_insert(&r.data);
            let Some(date) = record_date(&r.data, &sort.field) else {
                continue;
            };
            let better = match (best, sort.direction) {
                (None, _) => true,
                (Some((d, _)), SortDirection::Desc) => date > d,
                (Some((d, _)), SortDirection::Asc) => date < d,
            };
            if better {
                best = Some((date, &r.data));
            }
        }

        Ok(best.map(|(_, r)| r).or(first).cloned())
    }

    async fn insert_records(
        &self,
        collection: &str,
        auth: &Credential,
        records: Vec<Record>,
    ) -> StoreResult<()> {
        self.seed(collection, Some(&auth.api_key), records).await;
        Ok(())
    }

    async fn upsert_if_absent(
        &self,
        collection: &str,
        key_fields: &[String],
        records: Vec<Record>,
    ) -> StoreResult<u64> {
        if key_fields.is_empty() {
            return Err(StoreError::InvalidInput("key_fields is empty".to_string()));
        }

        let mut inner = self.inner.write().await;
        let stored = inner.collections.entry(collection.to_string()).or_default();
        let mut inserted = 0;

        for record in records {
            if stored.iter().any(|r| same_keys(&r.data, &record, key_fields)) {
                continue;
            }
            stored.push(StoredRecord {
                scope: None,
                data: record,
            });
            inserted += 1;
        }

        Ok(inserted)
    }

    async fn delete_where_key_not_in(
        &self,
        collection: &str,
        lists: &KeyLists,
    ) -> StoreResult<u64> {
        let mut inner = self.inner.write().await;
        let Some(stored) = inner.collections.get_mut(collection) else {
            return Ok(0);
        };

        let before = stored.len();
        stored.retain(|r| {
            lists.iter().all(|(field, allowed)| {
                let value = r.data.get(field).unwrap_or(&Value::Null);
                allowed.contains(value)
            })
        });

        Ok((before - stored.len()) as u64)
    }

    async fn set_progress(&self, progress: &Progress) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.progress = Some(progress.clone());
        inner.progress_history.push(progress.clone());
        Ok(())
    }

    async fn get_progress(&self) -> StoreResult<Option<Progress>> {
        Ok(self.inner.read().await.progress.clone())
    }

    async fn set_flag(&self, name: &str, value: bool) -> StoreResult<()> {
        self.inner.write().await.flags.insert(name.to_string(), value);
        Ok(())
    }

    async fn get_flag(&self, name: &str) -> StoreResult<Option<bool>> {
        Ok(self.inner.read().await.flags.get(name).copied())
    }

    async fn query_records(
        &self,
        collection: &str,
        auth: Option<&Credential>,
        query: &RecordQuery,
    ) -> StoreResult<Vec<Record>> {
        let inner = self.inner.read().await;
        let Some(stored) = inner.collections.get(collection) else {
            return Ok(Vec::new());
        };

        let scope = auth.map(|a| a.api_key.as_str());
        let mut matched: Vec<(Option<i64>, &Record)> = stored
            .iter()
            .filter(|r| r.scope.as_deref() == scope)
            .map(|r| (record_date(&r.data, &query.date_field), &r.data))
            .filter(|(date, _)| match date {
                Some(d) => {
                    query.start.map_or(true, |s| *d >= s) && query.end.map_or(true, |e| *d <= e)
                }
                None => query.start.is_none() && query.end.is_none(),
            })
            .collect();

        // 최신순, 날짜 없는 레코드는 뒤로
        matched.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(matched
            .into_iter()
            .take(query.limit)
            .map(|(_, r)| r.clone())
            .collect())
    }
}
