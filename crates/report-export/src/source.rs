//! 내보내기 데이터 소스.

use async_trait::async_trait;
use report_core::{as_date, now_ms, LocalStore, Record, RecordQuery, SchemaRegistry};
use std::sync::Arc;
use tracing::debug;

use crate::{ExportError, ExportResult, SubJob};

/// 기본 페이지 크기.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// 다음 페이지 위치.
///
/// `end`는 포함 상한이고, `skip`은 `end`와 같은 날짜를 가진 행 중 이미
/// 내보낸 개수입니다. 같은 날짜의 행이 페이지 경계에 걸쳐도 빠지지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub end: i64,
    pub skip: usize,
}

/// 조회 결과 한 페이지.
#[derive(Debug, Clone, Default)]
pub struct ReportPage {
    /// 행 (최신순)
    pub rows: Vec<Record>,
    /// 다음 페이지 커서 (없으면 마지막 페이지)
    pub next_page: Option<PageCursor>,
}

/// 하위 작업의 행을 페이지 단위로 제공하는 소스.
#[async_trait]
pub trait ReportSource: Send + Sync {
    /// `cursor`가 `None`이면 첫 페이지.
    async fn fetch_page(
        &self,
        item: &SubJob,
        cursor: Option<PageCursor>,
    ) -> ExportResult<ReportPage>;
}

/// 로컬 저장소에서 읽는 소스.
///
/// 하위 작업 이름을 컬렉션으로 해석하고, `params.start`/`params.end`를
/// 날짜 범위로 사용합니다. 사용자 범위 컬렉션은 유효한 자격증명이 필요합니다.
pub struct StoreReportSource {
    store: Arc<dyn LocalStore>,
    registry: SchemaRegistry,
    page_size: usize,
}

impl StoreReportSource {
    pub fn new(store: Arc<dyn LocalStore>, registry: SchemaRegistry) -> Self {
        Self {
            store,
            registry,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

fn param_date(item: &SubJob, key: &str) -> Option<i64> {
    item.params.get(key).and_then(as_date)
}

#[async_trait]
impl ReportSource for StoreReportSource {
    async fn fetch_page(
        &self,
        item: &SubJob,
        cursor: Option<PageCursor>,
    ) -> ExportResult<ReportPage> {
        let descriptor = self
            .registry
            .by_collection(&item.name)
            .ok_or_else(|| ExportError::UnknownReport(item.name.clone()))?;

        let auth = if descriptor.kind.is_insertable() {
            match &item.auth {
                Some(auth) if auth.is_valid() => Some(auth),
                _ => {
                    return Err(ExportError::Unauthorized(format!(
                        "{} 내보내기에 자격증명이 필요합니다",
                        item.name
                    )))
                }
            }
        } else {
            None
        };

        // 날짜 필드가 없는 컬렉션은 한 번에 전부 읽음
        let Some(date_field) = descriptor.date_field.clone() else {
            let rows = self
                .store
                .query_records(
                    &descriptor.name,
                    auth,
                    &RecordQuery {
                        date_field: String::new(),
                        start: None,
                        end: None,
                        limit: usize::MAX,
                    },
                )
                .await?;
            return Ok(ReportPage {
                rows,
                next_page: None,
            });
        };

        let start = param_date(item, "start");
        let (end, skip) = match cursor {
            Some(c) => (c.end, c.skip),
            None => (param_date(item, "end").unwrap_or_else(now_ms), 0),
        };
        let limit = self.page_size.saturating_add(skip);
        let query = RecordQuery {
            date_field: date_field.clone(),
            start,
            end: Some(end),
            limit,
        };

        let mut rows = self.store.query_records(&descriptor.name, auth, &query).await?;
        let exhausted = rows.len() < limit;
        // 앞쪽 `skip`개는 이전 페이지에서 내보낸 `end` 날짜의 행
        let rows = rows.split_off(skip.min(rows.len()));

        let date_of = |r: &Record| r.get(&date_field).and_then(as_date);
        let next_page = if exhausted {
            None
        } else {
            rows.last().and_then(date_of).map(|last| {
                let tied = rows.iter().rev().take_while(|r| date_of(r) == Some(last)).count();
                PageCursor {
                    end: last,
                    skip: if last == end { skip + tied } else { tied },
                }
            })
        };

        debug!(
            report = %item.name,
            rows = rows.len(),
            end,
            next_page = ?next_page,
            "내보내기 페이지 조회"
        );

        Ok(ReportPage { rows, next_page })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use report_core::Credential;
    use report_data::MemoryStore;
    use serde_json::{json, Value};

    fn rec(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    async fn seeded() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .seed(
                "ledgers",
                Some("alice"),
                (1..=5)
                    .map(|i| rec(json!({"id": i, "mts": i * 100})))
                    .collect(),
            )
            .await;
        store
            .seed(
                "symbols",
                None,
                vec![rec(json!({"pairs": "BTCUSD"})), rec(json!({"pairs": "ETHUSD"}))],
            )
            .await;
        store
    }

    fn ledgers_item() -> SubJob {
        SubJob::new("ledgers", &["id", "mts"]).with_auth(Credential::new("alice", "s"))
    }

    #[tokio::test]
    async fn test_pages_follow_cursor() {
        let source =
            StoreReportSource::new(seeded().await, SchemaRegistry::default()).with_page_size(2);
        let item = ledgers_item().with_param("end", json!(1000));

        let first = source.fetch_page(&item, None).await.unwrap();
        assert_eq!(first.rows.len(), 2);
        assert_eq!(first.next_page, Some(PageCursor { end: 400, skip: 1 }));

        let second = source.fetch_page(&item, first.next_page).await.unwrap();
        assert_eq!(second.rows[0]["mts"], json!(300));
        assert_eq!(second.next_page, Some(PageCursor { end: 200, skip: 1 }));

        let third = source.fetch_page(&item, second.next_page).await.unwrap();
        assert_eq!(third.rows.len(), 1);
        assert_eq!(third.next_page, None);
    }

    async fn drain(source: &StoreReportSource, item: &SubJob) -> Vec<Record> {
        let mut rows = Vec::new();
        let mut cursor = None;
        loop {
            let page = source.fetch_page(item, cursor).await.unwrap();
            rows.extend(page.rows);
            match page.next_page {
                Some(next) => cursor = Some(next),
                None => return rows,
            }
        }
    }

    #[tokio::test]
    async fn test_equal_timestamps_across_page_boundary() {
        let store = Arc::new(MemoryStore::new());
        store
            .seed(
                "ledgers",
                Some("alice"),
                vec![
                    rec(json!({"id": 1, "mts": 50})),
                    rec(json!({"id": 2, "mts": 100})),
                    rec(json!({"id": 3, "mts": 100})),
                    rec(json!({"id": 4, "mts": 100})),
                    rec(json!({"id": 5, "mts": 100})),
                    rec(json!({"id": 6, "mts": 100})),
                ],
            )
            .await;
        let source = StoreReportSource::new(store, SchemaRegistry::default()).with_page_size(2);
        let item = ledgers_item().with_param("end", json!(1000));

        let rows = drain(&source, &item).await;

        let mut ids: Vec<_> = rows.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows.last().unwrap()["mts"], json!(50));
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_all_rows_share_one_timestamp() {
        let store = Arc::new(MemoryStore::new());
        store
            .seed(
                "ledgers",
                Some("alice"),
                (1..=3).map(|i| rec(json!({"id": i, "mts": 100}))).collect(),
            )
            .await;
        let source = StoreReportSource::new(store, SchemaRegistry::default()).with_page_size(2);

        let rows = drain(&source, &ledgers_item()).await;

        assert_eq!(rows.len(), 3);
    }

    #[tokio::test]
    async fn test_user_report_requires_auth() {
        let source = StoreReportSource::new(seeded().await, SchemaRegistry::default());
        let item = SubJob::new("ledgers", &["id"]);

        let err = source.fetch_page(&item, None).await.unwrap_err();
        assert!(err.is_auth_error());
    }

    #[tokio::test]
    async fn test_global_report_reads_everything() {
        let source = StoreReportSource::new(seeded().await, SchemaRegistry::default());
        let page = source
            .fetch_page(&SubJob::new("symbols", &["pairs"]), None)
            .await
            .unwrap();

        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.next_page, None);
    }

    #[tokio::test]
    async fn test_unknown_report() {
        let source = StoreReportSource::new(seeded().await, SchemaRegistry::default());
        let err = source
            .fetch_page(&SubJob::new("nope", &[]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ExportError::UnknownReport(name) if name == "nope"));
    }
}
