//! 내보내기 작업 처리기.

use report_core::{ExportConfig, Record};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    CompletedExport, CsvFileWriter, ExportError, ExportJob, ExportResult, FailedExport,
    JobOutcome, ReportSource, SubJob,
};

/// 작업 하나를 처리해 하위 작업마다 CSV 파일을 만듭니다.
///
/// 하위 작업은 순서대로 처리합니다. 중간에 실패하면 이 작업이 할당한
/// 파일 경로를 모두 삭제한 뒤 [`JobOutcome::Failed`]를 반환합니다.
pub struct JobProcessor {
    source: Arc<dyn ReportSource>,
    output_dir: PathBuf,
    placeholder: String,
}

impl JobProcessor {
    pub fn new(source: Arc<dyn ReportSource>, config: &ExportConfig) -> Self {
        Self {
            source,
            output_dir: config.output_dir.clone(),
            placeholder: config.placeholder_message.clone(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[instrument(skip(self, job), fields(job = %job.name, items = job.items.len()))]
    pub async fn handle(&self, job: ExportJob) -> JobOutcome {
        let start = Instant::now();
        let mut file_paths = Vec::with_capacity(job.items.len());
        let mut sub_params = Vec::with_capacity(job.items.len());

        match self.write_all(&job, &mut file_paths, &mut sub_params).await {
            Ok(()) => {
                info!(
                    files = file_paths.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "내보내기 완료"
                );
                JobOutcome::Completed(CompletedExport {
                    job,
                    file_paths,
                    sub_params,
                })
            }
            Err(cause) => {
                error!(error = %cause, files = file_paths.len(), "내보내기 실패");
                let undeleted = remove_files(&file_paths).await;
                JobOutcome::Failed(FailedExport {
                    job,
                    cause,
                    partial_paths: file_paths,
                    undeleted,
                })
            }
        }
    }

    async fn write_all(
        &self,
        job: &ExportJob,
        file_paths: &mut Vec<PathBuf>,
        sub_params: &mut Vec<Record>,
    ) -> ExportResult<()> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| ExportError::io(&self.output_dir, e))?;

        for item in &job.items {
            // 쓰기 전에 경로를 기록해야 실패 시 정리 대상에 포함됨
            let path = self.unique_path();
            file_paths.push(path.clone());
            sub_params.push(item.param_snapshot());

            let rows = if job.is_unauthenticated {
                CsvFileWriter::placeholder(&path, &self.placeholder).await?;
                0
            } else {
                self.write_item(item, &path).await?
            };

            info!(report = %item.name, path = %path.display(), rows, "파일 생성");
        }

        Ok(())
    }

    async fn write_item(&self, item: &SubJob, path: &Path) -> ExportResult<u64> {
        let mut writer = CsvFileWriter::create(path, &item.columns).await?;
        let mut cursor = None;

        loop {
            let page = self.source.fetch_page(item, cursor).await?;
            for row in &page.rows {
                writer.write_record(row)?;
            }
            writer.flush_page().await?;

            match page.next_page {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        let rows = writer.rows();
        writer.finish().await?;
        Ok(rows)
    }

    fn unique_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.csv", Uuid::new_v4()))
    }
}

/// 파일을 모두 삭제 시도하고, 삭제하지 못한 경로를 반환합니다.
/// 이미 없는 파일은 삭제된 것으로 봅니다.
async fn remove_files(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut undeleted = Vec::new();
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "부분 파일 삭제 실패");
                undeleted.push(path.clone());
            }
        }
    }
    undeleted
}
