//! 내보내기 작업 큐.
//!
//! 작업은 단일 워커가 도착 순서대로 처리하고, 결과 이벤트는 구독자 전체에
//! 방송합니다.

use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{ExportError, ExportJob, ExportResult, JobEvent, JobProcessor};

/// 이벤트 채널 버퍼 크기.
const EVENT_CAPACITY: usize = 64;

pub struct ProcessorQueue {
    jobs: mpsc::Sender<ExportJob>,
    events: broadcast::Sender<JobEvent>,
    worker: JoinHandle<()>,
}

impl ProcessorQueue {
    /// 워커를 시작합니다. `capacity`는 대기 가능한 작업 수입니다.
    pub fn start(processor: Arc<JobProcessor>, capacity: usize) -> Self {
        let (jobs, mut rx) = mpsc::channel::<ExportJob>(capacity.max(1));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let publisher = events.clone();

        let worker = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let outcome = processor.handle(job).await;
                for event in outcome.events() {
                    let kind = event.kind();
                    if publisher.send(event).is_err() {
                        debug!(event = kind, "구독자 없음, 이벤트 폐기");
                    }
                }
            }
            info!("내보내기 큐 워커 종료");
        });

        Self {
            jobs,
            events,
            worker,
        }
    }

    /// 이벤트 구독. 구독 이후 발생한 이벤트만 받습니다.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// 작업 추가. 큐가 가득 차면 자리가 날 때까지 기다립니다.
    pub async fn enqueue(&self, job: ExportJob) -> ExportResult<()> {
        self.jobs
            .send(job)
            .await
            .map_err(|_| ExportError::QueueClosed)
    }

    /// 새 작업을 받지 않고, 남은 작업을 모두 처리한 뒤 종료합니다.
    pub async fn shutdown(self) {
        drop(self.jobs);
        let _ = self.worker.await;
    }
}
