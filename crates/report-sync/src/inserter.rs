//! 증분 동기화 엔진.
//!
//! 사용자 한 명의 실행은 다음 순서로 진행됩니다:
//!
//! 1. [`DataInserter::check_new_data`]: insertable 컬렉션마다 원격 1건과
//!    저장된 최신 레코드를 비교해 새 데이터 여부와 재개 커서를 정합니다.
//!    mirror 컬렉션은 항상 대상입니다.
//! 2. 대상 컬렉션을 레지스트리 순서로 병합합니다 (backfill 또는 mirror).
//! 3. 컬렉션 하나가 끝날 때마다 진행률을 갱신하고, 마지막에 사용자 종료
//!    마커를 기록합니다.
//!
//! 모든 원격 호출은 [`fetch_with_retry`]를 거칩니다. 원격/저장소 에러는
//! 현재 사용자의 실행을 중단시킵니다.

use report_core::{
    as_date, date_value, normalize, now_ms, CollectionDescriptor, CollectionKind, Credential,
    FetchParams, LocalStore, Progress, SchemaRegistry, SyncConfig, SyncMethod, BACKFILL_LIMIT,
};
use report_exchange::{fetch_with_retry, RemoteDataSource, RetryPolicy};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::backfill::BackfillCursor;
use crate::mirror::MirrorPlan;
use crate::progress::ProgressReporter;
use crate::{Result, SyncError, SyncStats};

/// 실행 중 한 컬렉션의 상태.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunEntry {
    /// 레지스트리 기술자 복사본
    pub descriptor: CollectionDescriptor,
    /// 이번 실행에서 병합할지 여부
    pub has_new_data: bool,
    /// backfill 재개 커서 (포함 하한)
    pub resume_from: i64,
}

/// 사용자 한 명의 실행 상태 (저장하지 않음).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRunState {
    entries: Vec<RunEntry>,
}

impl SyncRunState {
    fn new(descriptors: Vec<CollectionDescriptor>) -> Self {
        Self {
            entries: descriptors
                .into_iter()
                .map(|descriptor| RunEntry {
                    descriptor,
                    has_new_data: false,
                    resume_from: 0,
                })
                .collect(),
        }
    }

    /// 레지스트리 순서의 전체 항목.
    pub fn entries(&self) -> &[RunEntry] {
        &self.entries
    }

    /// 병합 대상 항목.
    pub fn flagged(&self) -> impl Iterator<Item = &RunEntry> {
        self.entries.iter().filter(|e| e.has_new_data)
    }

    /// 메서드로 항목 조회.
    pub fn get(&self, method: SyncMethod) -> Option<&RunEntry> {
        self.entries.iter().find(|e| e.descriptor.method == method)
    }
}

/// 진행률 범위.
///
/// 단일 사용자 실행은 `floor = 0, end = 100`. 다중 사용자 실행에서는
/// 직전 사용자의 종료 값을 하한으로 사용해 전체 진행률이 감소하지 않습니다.
#[derive(Debug, Clone, Copy)]
struct ProgressScope {
    fraction: f64,
    floor: u8,
    end: u8,
}

impl ProgressScope {
    fn single(fraction: f64) -> Self {
        Self {
            fraction,
            floor: 0,
            end: 100,
        }
    }

    fn at(&self, completed: usize, total: usize) -> Progress {
        let value = Progress::fraction(completed, total, self.fraction)
            .percent()
            .unwrap_or(0);
        Progress::Percent(value.max(self.floor))
    }
}

/// 증분 동기화 엔진.
pub struct DataInserter {
    source: Arc<dyn RemoteDataSource>,
    store: Arc<dyn LocalStore>,
    registry: SchemaRegistry,
    retry: RetryPolicy,
    progress: ProgressReporter,
    abort_on_user_error: bool,
}

impl DataInserter {
    /// 새 엔진을 만듭니다.
    ///
    /// 원격 소스가 레지스트리의 모든 메서드를 지원하는지 확인하고, 처리기가 없는
    /// 메서드가 있으면 `SyncError::UnknownMethod`를 반환합니다.
    pub fn new(
        source: Arc<dyn RemoteDataSource>,
        store: Arc<dyn LocalStore>,
        registry: SchemaRegistry,
        config: &SyncConfig,
    ) -> Result<Self> {
        if let Some(missing) = registry.iter().find(|d| !source.supports(d.method)) {
            return Err(SyncError::UnknownMethod(missing.method));
        }

        Ok(Self {
            progress: ProgressReporter::new(store.clone()),
            source,
            store,
            registry,
            retry: RetryPolicy::from(config),
            abort_on_user_error: config.abort_on_user_error,
        })
    }

    /// 재시도 정책 교체.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// 진행률 보고기.
    pub fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    /// 전체 동기화 한 번 실행.
    ///
    /// 실행 동안 라이브 호출을 원격 API로 돌리고, 끝나면 (실패해도) 동기화
    /// 저장소 읽기로 되돌립니다. 실패하면 에러 메시지를 진행률로 남깁니다.
    pub async fn run(&self) -> Result<SyncStats> {
        self.progress.redirect_requests_to_api(true).await?;

        let result = self.sync_all_users().await;

        if let Err(e) = self.progress.redirect_requests_to_api(false).await {
            error!(error = %e, "요청 경로 복구 실패");
        }

        if let Err(e) = &result {
            self.progress.log_error_and_set_progress(e).await;
        }

        result
    }

    /// 저장된 모든 활성 사용자를 순서대로 동기화합니다.
    ///
    /// 자격증명이 없거나 조회에 실패하면 `Unauthorized`를 기록하고 정상 종료합니다.
    pub async fn sync_all_users(&self) -> Result<SyncStats> {
        let started = Instant::now();
        let mut stats = SyncStats::new();

        let stored = match self.store.list_active_credentials().await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "자격증명 조회 실패");
                Vec::new()
            }
        };

        if stored.is_empty() {
            info!("동기화할 사용자 없음");
            self.progress.set_progress(Progress::Unauthorized).await?;
            stats.elapsed = started.elapsed();
            return Ok(stats);
        }

        let stored = unique_by_api_key(stored);
        let total = stored.len();
        stats.users_total = total;
        info!(users = total, "다중 사용자 동기화 시작");

        let mut count = 0usize;
        let mut floor = 0u8;
        let mut last_synced = false;
        let mut last_failure: Option<String> = None;

        for value in &stored {
            let Some(auth) = Credential::from_stored(value) else {
                debug!("형식이 잘못된 인증 레코드 건너뜀");
                stats.users_skipped += 1;
                continue;
            };

            count += 1;
            let fraction = count as f64 / total as f64;
            let scope = ProgressScope {
                fraction,
                floor,
                end: (fraction * 100.0).round().clamp(0.0, 100.0) as u8,
            };

            match self.sync_user(&auth, scope).await {
                Ok(user_stats) => {
                    last_synced = user_stats.users_synced > 0;
                    if last_synced {
                        floor = scope.end;
                    }
                    stats.absorb(&user_stats);
                }
                Err(e) if self.abort_on_user_error => {
                    error!(user = %auth.masked_key(), error = %e, "사용자 동기화 실패, 전체 중단");
                    return Err(e);
                }
                Err(e) => {
                    error!(user = %auth.masked_key(), error = %e, "사용자 동기화 실패, 다음 사용자 진행");
                    stats.users_failed += 1;
                    last_synced = false;
                    last_failure = Some(e.to_string());
                }
            }
        }

        if count == 0 {
            self.progress.set_progress(Progress::Unauthorized).await?;
        } else if let Some(message) = last_failure {
            self.progress.set_progress(Progress::Error(message)).await?;
        } else if last_synced && floor < 100 {
            self.progress.set_progress(Progress::COMPLETE).await?;
        }

        stats.elapsed = started.elapsed();
        stats.log_summary("다중 사용자 동기화");
        Ok(stats)
    }

    /// 사용자 한 명을 동기화합니다.
    ///
    /// 컬렉션 하나가 끝날 때마다 `round(완료 / 대상 * 100 * user_fraction)`을,
    /// 마지막에 100을 기록합니다.
    pub async fn sync_one_user(&self, auth: &Credential, user_fraction: f64) -> Result<SyncStats> {
        self.sync_user(auth, ProgressScope::single(user_fraction))
            .await
    }

    async fn sync_user(&self, auth: &Credential, scope: ProgressScope) -> Result<SyncStats> {
        let started = Instant::now();
        let mut stats = SyncStats::new();
        stats.users_total = 1;

        if !auth.is_valid() {
            warn!("인증 정보가 비어 있음");
            self.progress.set_progress(Progress::Unauthorized).await?;
            stats.users_skipped = 1;
            return Ok(stats);
        }

        let user = auth.masked_key();
        info!(user = %user, "사용자 동기화 시작");

        let run = self.check_new_data(auth).await?;
        let flagged: Vec<&RunEntry> = run.flagged().collect();
        let total = flagged.len();

        for (i, entry) in flagged.into_iter().enumerate() {
            let descriptor = &entry.descriptor;
            match descriptor.kind {
                CollectionKind::InsertableArrayOfObjects => {
                    stats.records_inserted +=
                        self.backfill(auth, descriptor, entry.resume_from).await?;
                }
                CollectionKind::UpdatableArrayOfObjects | CollectionKind::UpdatableArrayOfScalars => {
                    let (inserted, deleted) = self.mirror(auth, descriptor).await?;
                    stats.records_inserted += inserted;
                    stats.records_deleted += deleted;
                }
            }
            stats.collections_synced += 1;

            self.progress.set_progress(scope.at(i + 1, total)).await?;
        }

        self.progress
            .set_progress(Progress::Percent(scope.end.max(scope.floor)))
            .await?;

        stats.users_synced = 1;
        stats.elapsed = started.elapsed();
        info!(
            user = %user,
            collections = stats.collections_synced,
            inserted = stats.records_inserted,
            deleted = stats.records_deleted,
            "사용자 동기화 완료"
        );
        Ok(stats)
    }

    /// 컬렉션별 새 데이터 여부와 재개 커서를 계산합니다.
    ///
    /// | 저장 | 원격 | 결과 |
    /// |---|---|---|
    /// | 없음 | 없음 | 대상 아님 |
    /// | 없음 | 있음 | 대상, 커서 0 |
    /// | 있음 | 없음 | 대상 아님 |
    /// | 저장 날짜 < 원격 날짜 | 있음 | 대상, 커서 = 저장 날짜 + 1 |
    /// | 저장 날짜 ≥ 원격 날짜 | 있음 | 대상 아님 |
    pub async fn check_new_data(&self, auth: &Credential) -> Result<SyncRunState> {
        let mut run = SyncRunState::new(self.registry.working_copy());

        for entry in run.entries.iter_mut() {
            let descriptor = &entry.descriptor;
            if !descriptor.kind.is_insertable() {
                entry.has_new_data = true;
                continue;
            }

            let (Some(date_field), Some(sort)) = (&descriptor.date_field, &descriptor.sort) else {
                warn!(method = %descriptor.method, "날짜 필드가 없는 insertable 컬렉션");
                continue;
            };

            let stored = self
                .store
                .get_latest_record(&descriptor.name, auth, sort)
                .await?;
            let probe = self
                .fetch(descriptor.method, auth, FetchParams::until_now(0, Some(1)))
                .await?;

            let Some(remote) = probe.first() else {
                continue;
            };

            match stored {
                None => {
                    entry.has_new_data = true;
                    entry.resume_from = 0;
                }
                Some(record) => {
                    let stored_date = record.get(date_field).and_then(as_date);
                    let remote_date = date_value(remote, date_field);
                    if let (Some(s), Some(r)) = (stored_date, remote_date) {
                        if s < r {
                            entry.has_new_data = true;
                            entry.resume_from = s + 1;
                        }
                    }
                }
            }

            debug!(
                method = %descriptor.method,
                has_new_data = entry.has_new_data,
                resume_from = entry.resume_from,
                "새 데이터 확인"
            );
        }

        Ok(run)
    }

    /// 시간 역순 backfill. 저장한 레코드 수를 반환합니다.
    async fn backfill(
        &self,
        auth: &Credential,
        descriptor: &CollectionDescriptor,
        resume_from: i64,
    ) -> Result<u64> {
        let Some(date_field) = &descriptor.date_field else {
            return Ok(0);
        };

        let page_size = descriptor.page_size_ceiling.unwrap_or(BACKFILL_LIMIT);
        let mut cursor =
            BackfillCursor::new(date_field, resume_from, now_ms(), BACKFILL_LIMIT, page_size);

        while let Some(params) = cursor.next_params() {
            let page = self.fetch(descriptor.method, auth, params).await?;
            let fetched = page.len();
            let records = cursor.accept(page);

            debug!(
                collection = %descriptor.name,
                end = params.end,
                fetched,
                inserted = records.len(),
                state = ?cursor.state(),
                "페이지 처리"
            );

            if !records.is_empty() {
                self.store
                    .insert_records(&descriptor.name, auth, normalize(records, &descriptor.model))
                    .await?;
            }
        }

        info!(
            collection = %descriptor.name,
            inserted = cursor.inserted(),
            "backfill 완료"
        );
        Ok(cursor.inserted())
    }

    /// 전체 mirror 병합. (추가 수, 삭제 수)를 반환합니다.
    async fn mirror(
        &self,
        auth: &Credential,
        descriptor: &CollectionDescriptor,
    ) -> Result<(u64, u64)> {
        let params = FetchParams::until_now(0, descriptor.page_size_ceiling);
        let items = self.fetch(descriptor.method, auth, params).await?;

        let Some(plan) = MirrorPlan::build(descriptor, items) else {
            debug!(collection = %descriptor.name, "원격 집합이 비어 있음, 로컬 유지");
            return Ok((0, 0));
        };

        let deleted = self
            .store
            .delete_where_key_not_in(&descriptor.name, &plan.keep)
            .await?;
        let inserted = self
            .store
            .upsert_if_absent(&descriptor.name, &descriptor.key_fields, plan.records)
            .await?;

        info!(collection = %descriptor.name, inserted, deleted, "mirror 병합 완료");
        Ok((inserted, deleted))
    }

    async fn fetch(
        &self,
        method: SyncMethod,
        auth: &Credential,
        params: FetchParams,
    ) -> Result<Vec<Value>> {
        let items = fetch_with_retry(&self.retry, method.as_str(), || {
            self.source.fetch(method, auth, &params)
        })
        .await?;
        Ok(items)
    }
}

/// `apiKey`가 같은 인증 레코드는 처음 나온 위치에 마지막 값으로 하나만 남깁니다.
/// 객체가 아닌 레코드는 그대로 둡니다.
fn unique_by_api_key(stored: Vec<Value>) -> Vec<Value> {
    let mut unique: Vec<Value> = Vec::with_capacity(stored.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for value in stored {
        let Some(object) = value.as_object() else {
            unique.push(value);
            continue;
        };
        let key = object
            .get("apiKey")
            .map(Value::to_string)
            .unwrap_or_default();

        match positions.get(&key) {
            Some(&i) => unique[i] = value,
            None => {
                positions.insert(key, unique.len());
                unique.push(value);
            }
        }
    }

    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unique_by_api_key_keeps_first_position_last_value() {
        let unique = unique_by_api_key(vec![
            json!({"apiKey": "u1", "apiSecret": "old"}),
            json!("broken"),
            json!({"apiKey": "u2", "apiSecret": "s2"}),
            json!({"apiKey": "u1", "apiSecret": "new"}),
        ]);

        assert_eq!(
            unique,
            vec![
                json!({"apiKey": "u1", "apiSecret": "new"}),
                json!("broken"),
                json!({"apiKey": "u2", "apiSecret": "s2"}),
            ]
        );
    }

    #[test]
    fn test_single_scope_matches_fraction_formula() {
        let scope = ProgressScope::single(0.5);
        assert_eq!(scope.at(1, 4), Progress::Percent(13));
        assert_eq!(scope.at(4, 4), Progress::Percent(50));
        assert_eq!(scope.end, 100);
    }

    #[test]
    fn test_scope_floor_lifts_low_values() {
        let scope = ProgressScope {
            fraction: 1.0,
            floor: 50,
            end: 100,
        };
        assert_eq!(scope.at(1, 10), Progress::Percent(50));
        assert_eq!(scope.at(8, 10), Progress::Percent(80));
    }
}
