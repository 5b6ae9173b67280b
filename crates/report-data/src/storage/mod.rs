//! 저장소 백엔드.

pub mod memory;
pub mod postgres;
