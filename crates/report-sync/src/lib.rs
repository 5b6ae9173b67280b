//! Incremental sync engine for exchange report data.
//!
//! 이 crate는 원격 거래소 API의 데이터를 사용자별로 로컬 저장소에 증분 동기화합니다:
//! - 새 데이터 확인 (원격 1건 probe vs 저장된 최신 레코드)
//! - 시간 역순 backfill (insertable 컬렉션)
//! - 전체 mirror 병합 (심볼, 통화 등 작은 집합)
//! - 진행률 보고 및 실행 통계

pub mod backfill;
pub mod error;
pub mod inserter;
pub mod mirror;
pub mod progress;
pub mod stats;

pub use backfill::{BackfillCursor, BackfillState};
pub use error::{Result, SyncError};
pub use inserter::{DataInserter, RunEntry, SyncRunState};
pub use mirror::MirrorPlan;
pub use progress::{ProgressReporter, SYNC_MODE_FLAG};
pub use stats::SyncStats;
