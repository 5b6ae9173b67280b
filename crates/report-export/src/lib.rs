//! # Report Export
//!
//! 내보내기 작업 처리기.
//!
//! 큐에서 꺼낸 내보내기 작업마다 하위 작업 하나당 CSV 파일 하나를 만듭니다.
//! 하나라도 실패하면 이 작업이 만든 파일을 모두 삭제하고 실패로 보고합니다.
//!
//! - [`JobProcessor`]: 작업 하나를 처리해 [`JobOutcome`]을 반환
//! - [`ProcessorQueue`]: 작업 큐 워커, 결과를 [`JobEvent`]로 방송
//! - [`ReportSource`]: 하위 작업의 행을 페이지 단위로 제공

pub mod error;
pub mod events;
pub mod job;
pub mod processor;
pub mod queue;
pub mod source;
pub mod writer;

pub use error::{ExportError, ExportResult};
pub use events::{CompletedExport, FailedExport, JobEvent, JobOutcome};
pub use job::{ExportJob, SubJob};
pub use processor::JobProcessor;
pub use queue::ProcessorQueue;
pub use source::{PageCursor, ReportPage, ReportSource, StoreReportSource};
pub use writer::CsvFileWriter;
