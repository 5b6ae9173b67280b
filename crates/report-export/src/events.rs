//! 작업 결과 및 이벤트.
//!
//! [`JobOutcome`]은 처리 결과 자체이고, [`JobOutcome::events`]가 이를 외부에
//! 알릴 이벤트 목록으로 바꿉니다.

use report_core::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

use crate::{ExportError, ExportJob};

/// 성공한 작업.
#[derive(Debug, Clone)]
pub struct CompletedExport {
    pub job: ExportJob,
    /// 생성된 파일 (하위 작업 순서)
    pub file_paths: Vec<PathBuf>,
    /// 하위 작업별 파라미터 스냅샷
    pub sub_params: Vec<Record>,
}

/// 실패한 작업.
#[derive(Debug)]
pub struct FailedExport {
    pub job: ExportJob,
    pub cause: ExportError,
    /// 실패 전까지 할당된 파일 경로
    pub partial_paths: Vec<PathBuf>,
    /// 삭제하지 못한 파일
    pub undeleted: Vec<PathBuf>,
}

impl FailedExport {
    pub fn cleanup_failed(&self) -> bool {
        !self.undeleted.is_empty()
    }
}

/// 작업 처리 결과.
#[derive(Debug)]
pub enum JobOutcome {
    Completed(CompletedExport),
    Failed(FailedExport),
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// 알릴 이벤트 목록.
    ///
    /// 실패 시 순서: `cleanup-failed` → `auth-error` → `error`.
    pub fn events(&self) -> Vec<JobEvent> {
        match self {
            Self::Completed(done) => vec![JobEvent::Completed {
                user_info: done.job.user_info.clone(),
                user_id: done.job.user_id.clone(),
                name: done.job.name.clone(),
                file_paths: done.file_paths.clone(),
                sub_params: done.sub_params.clone(),
                notify_address: done.job.notify_address(),
                is_unauthenticated: done.job.is_unauthenticated,
            }],
            Self::Failed(failed) => {
                let job = failed.job.redacted();
                let mut events = Vec::with_capacity(3);
                if failed.cleanup_failed() {
                    events.push(JobEvent::CleanupFailed {
                        job: job.clone(),
                        paths: failed.undeleted.clone(),
                    });
                }
                if failed.cause.is_auth_error() {
                    events.push(JobEvent::AuthError { job: job.clone() });
                }
                events.push(JobEvent::Error {
                    job,
                    message: failed.cause.to_string(),
                });
                events
            }
        }
    }
}

/// 외부 알림 이벤트.
///
/// 이벤트에 실리는 작업은 자격증명 시크릿이 지워진 복사본입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum JobEvent {
    /// 모든 파일 생성 완료
    Completed {
        user_info: Value,
        user_id: Value,
        name: String,
        file_paths: Vec<PathBuf>,
        sub_params: Vec<Record>,
        notify_address: Option<String>,
        is_unauthenticated: bool,
    },

    /// 부분 파일 삭제 실패
    CleanupFailed { job: ExportJob, paths: Vec<PathBuf> },

    /// 인증 에러로 실패
    AuthError { job: ExportJob },

    /// 작업 실패
    Error { job: ExportJob, message: String },
}

impl JobEvent {
    /// 이벤트 이름.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::CleanupFailed { .. } => "cleanup-failed",
            Self::AuthError { .. } => "auth-error",
            Self::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SubJob;
    use serde_json::json;

    fn failed(cause: ExportError, undeleted: Vec<PathBuf>) -> JobOutcome {
        JobOutcome::Failed(FailedExport {
            job: ExportJob::single(SubJob::new("ledgers", &["mts"])),
            cause,
            partial_paths: vec![PathBuf::from("/tmp/a.csv")],
            undeleted,
        })
    }

    fn kinds(outcome: &JobOutcome) -> Vec<&'static str> {
        outcome.events().iter().map(JobEvent::kind).collect()
    }

    #[test]
    fn test_failure_event_order() {
        let outcome = failed(
            ExportError::Unauthorized("apikey: invalid".to_string()),
            vec![PathBuf::from("/tmp/a.csv")],
        );
        assert_eq!(kinds(&outcome), vec!["cleanup-failed", "auth-error", "error"]);

        let outcome = failed(ExportError::Source("timeout".to_string()), Vec::new());
        assert_eq!(kinds(&outcome), vec!["error"]);
    }

    #[test]
    fn test_failure_events_do_not_carry_secrets() {
        let outcome = JobOutcome::Failed(FailedExport {
            job: ExportJob::single(
                SubJob::new("ledgers", &["mts"])
                    .with_auth(report_core::Credential::new("key", "top-secret")),
            ),
            cause: ExportError::Unauthorized("apikey: invalid".to_string()),
            partial_paths: Vec::new(),
            undeleted: vec![PathBuf::from("/tmp/a.csv")],
        });

        let events = outcome.events();
        assert_eq!(events.len(), 3);
        for event in &events {
            let payload = serde_json::to_string(event).unwrap();
            assert!(!payload.contains("top-secret"), "{payload}");
        }
    }

    #[test]
    fn test_completed_event_payload() {
        let mut job = ExportJob::batch("multi", vec![SubJob::new("trades", &["id"])]);
        job.params.insert("email".to_string(), json!("a@b.c"));
        job.user_id = json!(42);

        let outcome = JobOutcome::Completed(CompletedExport {
            job,
            file_paths: vec![PathBuf::from("/tmp/x.csv")],
            sub_params: vec![json!({"name": "trades"}).as_object().cloned().unwrap()],
        });

        let events = outcome.events();
        assert_eq!(events.len(), 1);
        let payload = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(payload["type"], json!("completed"));
        assert_eq!(payload["notify_address"], json!("a@b.c"));
        assert_eq!(payload["user_id"], json!(42));
        assert_eq!(payload["sub_params"][0]["name"], json!("trades"));
    }
}
