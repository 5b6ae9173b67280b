//! 동기화 실행 통계.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 동기화 실행 통계
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncStats {
    /// 저장소에서 읽은 인증 레코드 수
    pub users_total: usize,
    /// 동기화 완료 사용자 수
    pub users_synced: usize,
    /// 치명적 에러로 중단된 사용자 수
    pub users_failed: usize,
    /// 건너뛴 사용자 수 (형식 오류, 인증 정보 없음)
    pub users_skipped: usize,
    /// 병합 완료된 컬렉션 수
    pub collections_synced: usize,
    /// 추가된 레코드 수
    pub records_inserted: u64,
    /// mirror 병합에서 삭제된 레코드 수
    pub records_deleted: u64,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl SyncStats {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 다른 실행(한 사용자)의 통계를 합산합니다. 소요 시간은 합산하지 않습니다.
    pub fn absorb(&mut self, other: &SyncStats) {
        self.users_synced += other.users_synced;
        self.users_failed += other.users_failed;
        self.users_skipped += other.users_skipped;
        self.collections_synced += other.collections_synced;
        self.records_inserted += other.records_inserted;
        self.records_deleted += other.records_deleted;
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            users_total = self.users_total,
            users_synced = self.users_synced,
            users_failed = self.users_failed,
            users_skipped = self.users_skipped,
            collections = self.collections_synced,
            inserted = self.records_inserted,
            deleted = self.records_deleted,
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "동기화 완료"
        );
    }
}
