//! Insertable 컬렉션의 시간 역순 backfill 상태 머신.
//!
//! 원격 소스는 "시각 T 이하의 레코드 N개"만 돌려줄 수 있다고 가정합니다.
//! 커서는 매 페이지의 마지막(가장 오래된) 레코드 시각 - 1 로 이동하며,
//! 아래 조건 중 하나에서 멈춥니다:
//!
//! - 빈 페이지, 또는 마지막 레코드의 날짜가 정수가 아님 → `Done`
//! - 마지막 날짜가 직전 페이지의 마지막 날짜 이상 (커서가 전진하지 않음) → `Done`
//! - 요청 개수보다 짧은 페이지 (원격 데이터 소진) → `Done`
//! - 재개 커서에 도달했거나 전체 limit을 채움 → 페이지를 잘라내고 `Trimmed`

use report_core::{date_value, FetchParams};
use serde_json::Value;

/// Backfill 진행 상태.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackfillState {
    /// 다음 페이지 요청 대기
    Paging {
        /// 다음 요청 파라미터
        params: FetchParams,
        /// 직전 페이지의 마지막 날짜 (첫 페이지는 요청 `end`)
        prev_last: i64,
    },
    /// 마지막 페이지를 경계에 맞춰 잘라냄
    Trimmed,
    /// 더 가져올 데이터 없음
    Done,
}

impl BackfillState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BackfillState::Paging { .. })
    }
}

/// 한 컬렉션 backfill의 커서.
#[derive(Debug, Clone)]
pub struct BackfillCursor {
    date_field: String,
    resume_from: i64,
    limit: u64,
    page_size: u64,
    inserted: u64,
    state: BackfillState,
}

impl BackfillCursor {
    /// 새 커서.
    ///
    /// # Arguments
    /// * `date_field` - 커서 필드
    /// * `resume_from` - 포함 하한 (이보다 오래된 레코드는 저장하지 않음)
    /// * `end` - 첫 요청의 상한 시각
    /// * `limit` - 이번 backfill 전체의 최대 저장 개수
    /// * `page_size` - 한 번에 요청할 최대 개수
    pub fn new(
        date_field: impl Into<String>,
        resume_from: i64,
        end: i64,
        limit: u64,
        page_size: u64,
    ) -> Self {
        let page_size = page_size.max(1);
        let state = if limit == 0 {
            BackfillState::Done
        } else {
            BackfillState::Paging {
                params: FetchParams {
                    start: resume_from,
                    end,
                    limit: Some(limit.min(page_size)),
                },
                prev_last: end,
            }
        };

        Self {
            date_field: date_field.into(),
            resume_from,
            limit,
            page_size,
            inserted: 0,
            state,
        }
    }

    /// 다음 요청 파라미터 (종료 상태면 `None`).
    pub fn next_params(&self) -> Option<FetchParams> {
        match &self.state {
            BackfillState::Paging { params, .. } => Some(*params),
            _ => None,
        }
    }

    pub fn state(&self) -> &BackfillState {
        &self.state
    }

    /// 지금까지 저장 대상으로 넘긴 레코드 수.
    pub fn inserted(&self) -> u64 {
        self.inserted
    }

    /// 받은 페이지를 반영하고 저장할 레코드를 돌려줍니다.
    ///
    /// 종료 상태에서는 항상 빈 목록을 반환합니다.
    pub fn accept(&mut self, page: Vec<Value>) -> Vec<Value> {
        let BackfillState::Paging { params, prev_last } = self.state.clone() else {
            return Vec::new();
        };

        let Some(last) = page.last().and_then(|r| date_value(r, &self.date_field)) else {
            self.state = BackfillState::Done;
            return Vec::new();
        };

        if last >= prev_last {
            tracing::debug!(last, prev_last, "커서가 전진하지 않음, backfill 종료");
            self.state = BackfillState::Done;
            return Vec::new();
        }

        let requested = params.limit.unwrap_or(self.page_size);
        let short_page = (page.len() as u64) < requested;
        let mut records = page;
        let mut trimmed = false;

        if self.resume_from >= last {
            let field = self.date_field.as_str();
            let from = self.resume_from;
            records.retain(|r| date_value(r, field).is_some_and(|d| d >= from));
            trimmed = true;
        }

        let headroom = self.limit - self.inserted;
        if records.len() as u64 > headroom {
            records.truncate(headroom as usize);
            trimmed = true;
        }

        self.inserted += records.len() as u64;
        let remaining = self.limit - self.inserted;

        self.state = if trimmed {
            BackfillState::Trimmed
        } else if remaining == 0 || short_page {
            BackfillState::Done
        } else {
            BackfillState::Paging {
                params: FetchParams {
                    start: params.start,
                    end: last - 1,
                    limit: Some(remaining.min(self.page_size)),
                },
                prev_last: last,
            }
        };

        records
    }
}
