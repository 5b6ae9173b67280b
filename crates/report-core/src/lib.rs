//! # Report Core
//!
//! 거래소 리포트 서비스의 핵심 도메인 모델 및 계약을 제공합니다.
//!
//! 이 크레이트는 동기화 엔진과 내보내기 프로세서가 공유하는 타입을 제공합니다:
//! - 사용자 자격증명
//! - 레코드 및 정규화
//! - 동기화 진행률
//! - 컬렉션 스키마 레지스트리
//! - 로컬 저장소 계약 (`LocalStore`)
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use logging::*;
