//! CSV 파일 작성기.
//!
//! 행은 하나의 `csv::Writer` 메모리 버퍼에 쌓이고, [`CsvFileWriter::flush_page`]가
//! 페이지 단위로 버퍼를 파일 쪽 `BufWriter`로 넘깁니다.
//! [`CsvFileWriter::finish`]는 남은 버퍼를 비우고 디스크 동기화까지 기다립니다.

use report_core::Record;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::{ExportError, ExportResult};

/// 셀 문자열 (null은 빈 칸, 문자열은 따옴표 없이).
fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn new_csv_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new())
}

/// 파일 하나에 대한 CSV 작성기.
pub struct CsvFileWriter {
    path: PathBuf,
    csv: csv::Writer<Vec<u8>>,
    file: BufWriter<File>,
    columns: Vec<String>,
    rows: u64,
}

impl CsvFileWriter {
    async fn open(path: &Path, columns: &[String]) -> ExportResult<Self> {
        let file = File::create(path)
            .await
            .map_err(|e| ExportError::io(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            csv: new_csv_writer(),
            file: BufWriter::new(file),
            columns: columns.to_vec(),
            rows: 0,
        })
    }

    /// 파일을 만들고 헤더 행을 씁니다.
    pub async fn create(path: impl AsRef<Path>, columns: &[String]) -> ExportResult<Self> {
        let mut writer = Self::open(path.as_ref(), columns).await?;
        writer.csv.write_record(&writer.columns)?;
        Ok(writer)
    }

    /// 안내 문구 한 줄만 있는 파일을 만듭니다.
    pub async fn placeholder(path: impl AsRef<Path>, message: &str) -> ExportResult<PathBuf> {
        let mut writer = Self::open(path.as_ref(), &[]).await?;
        writer.csv.write_record([message])?;
        writer.finish().await
    }

    /// 레코드 한 행을 열 순서대로 버퍼에 씁니다. 없는 필드는 빈 칸.
    pub fn write_record(&mut self, record: &Record) -> ExportResult<()> {
        self.csv
            .write_record(self.columns.iter().map(|c| cell(record.get(c))))?;
        self.rows += 1;
        Ok(())
    }

    /// 쌓인 행을 파일 쪽으로 넘깁니다. 페이지마다 한 번 호출합니다.
    pub async fn flush_page(&mut self) -> ExportResult<()> {
        self.csv
            .flush()
            .map_err(|e| ExportError::io(&self.path, e))?;
        let csv = std::mem::replace(&mut self.csv, new_csv_writer());
        let bytes = csv
            .into_inner()
            .map_err(|e| ExportError::io(&self.path, e.into_error()))?;
        self.file
            .write_all(&bytes)
            .await
            .map_err(|e| ExportError::io(&self.path, e))
    }

    /// 지금까지 쓴 데이터 행 수 (헤더 제외).
    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 버퍼를 비우고 디스크에 동기화한 뒤 경로를 반환합니다.
    pub async fn finish(mut self) -> ExportResult<PathBuf> {
        self.flush_page().await?;
        self.file
            .flush()
            .await
            .map_err(|e| ExportError::io(&self.path, e))?;
        self.file
            .get_mut()
            .sync_all()
            .await
            .map_err(|e| ExportError::io(&self.path, e))?;
        Ok(self.path)
    }
}
