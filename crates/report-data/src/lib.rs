//! 로컬 저장소 구현.
//!
//! 이 crate는 `report_core::LocalStore`의 구현을 제공합니다:
//! - PostgreSQL 저장소 (JSONB 레코드)
//! - 메모리 저장소 (테스트 및 단일 프로세스 실행용)

pub mod storage;

pub use storage::memory::MemoryStore;
pub use storage::postgres::PgStore;
