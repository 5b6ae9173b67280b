//! 진행률 보고.
//!
//! 진행률은 저장소에 저장되고 동시에 `watch` 채널로 프로세스 내 구독자에게
//! 전달됩니다.

use report_core::{LocalStore, Progress, StoreResult};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// 라이브 API 호출 / 동기화 저장소 읽기 전환 플래그 이름
pub const SYNC_MODE_FLAG: &str = "syncMode";

/// 진행률 저장 및 방송.
#[derive(Clone)]
pub struct ProgressReporter {
    store: Arc<dyn LocalStore>,
    tx: Arc<watch::Sender<Progress>>,
}

impl ProgressReporter {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        let (tx, _rx) = watch::channel(Progress::NotStarted);
        Self {
            store,
            tx: Arc::new(tx),
        }
    }

    /// 진행률 변경 구독.
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.tx.subscribe()
    }

    /// 진행률을 저장하고 구독자에게 알립니다.
    pub async fn set_progress(&self, progress: Progress) -> StoreResult<()> {
        self.store.set_progress(&progress).await?;
        tracing::debug!(progress = %progress, "진행률 갱신");
        self.tx.send_replace(progress);
        Ok(())
    }

    /// 저장된 진행률. 저장된 값이 없으면 `NotStarted`.
    pub async fn get_progress(&self) -> StoreResult<Progress> {
        Ok(self
            .store
            .get_progress()
            .await?
            .unwrap_or(Progress::NotStarted))
    }

    /// 에러를 로그로 남기고 에러 메시지를 진행률로 저장합니다.
    ///
    /// 저장 실패는 로그만 남깁니다.
    pub async fn log_error_and_set_progress(&self, err: &(dyn fmt::Display + Sync)) {
        if let Err(e) = self.set_progress(Progress::Error(err.to_string())).await {
            error!(error = %e, "진행률 저장 실패");
        }
        error!(error = %err, "동기화 실패");
    }

    /// `state`가 true면 라이브 호출을 원격 API로 돌립니다 (`syncMode = !state`).
    pub async fn redirect_requests_to_api(&self, state: bool) -> StoreResult<()> {
        info!(to_api = state, "요청 경로 전환");
        self.store.set_flag(SYNC_MODE_FLAG, !state).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use report_data::MemoryStore;

    #[tokio::test]
    async fn test_get_progress_defaults_to_not_started() {
        let reporter = ProgressReporter::new(Arc::new(MemoryStore::new()));
        assert_eq!(reporter.get_progress().await.unwrap(), Progress::NotStarted);
    }

    #[tokio::test]
    async fn test_set_progress_is_stored_and_broadcast() {
        let store = Arc::new(MemoryStore::new());
        let reporter = ProgressReporter::new(store.clone());
        let mut rx = reporter.subscribe();

        reporter.set_progress(Progress::Percent(42)).await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Progress::Percent(42));
        assert_eq!(store.get_progress().await.unwrap(), Some(Progress::Percent(42)));
    }

    #[tokio::test]
    async fn test_log_error_stores_message() {
        let reporter = ProgressReporter::new(Arc::new(MemoryStore::new()));
        reporter.log_error_and_set_progress(&"ratelimit: error").await;

        assert_eq!(
            reporter.get_progress().await.unwrap(),
            Progress::Error("ratelimit: error".to_string())
        );
    }

    #[tokio::test]
    async fn test_redirect_inverts_sync_mode() {
        let store = Arc::new(MemoryStore::new());
        let reporter = ProgressReporter::new(store.clone());

        reporter.redirect_requests_to_api(true).await.unwrap();
        assert_eq!(store.get_flag(SYNC_MODE_FLAG).await.unwrap(), Some(false));

        reporter.redirect_requests_to_api(false).await.unwrap();
        assert_eq!(store.get_flag(SYNC_MODE_FLAG).await.unwrap(), Some(true));
    }
}
