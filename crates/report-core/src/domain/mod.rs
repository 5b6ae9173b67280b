//! 리포트 동기화 및 내보내기를 위한 도메인 모델.

mod credential;
mod progress;
mod record;
mod schema;
mod store;

pub use credential::*;
pub use progress::*;
pub use record::*;
pub use schema::*;
pub use store::*;
