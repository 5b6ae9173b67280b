//! 원격 데이터 소스 trait 정의.

use async_trait::async_trait;
use report_core::{Credential, FetchParams, SyncMethod};
use serde_json::Value;
use std::sync::Arc;

use crate::RemoteResult;

/// 동기화 메서드별 원격 호출 인터페이스.
///
/// insertable 메서드는 `params.end` 이하의 레코드를 최신순으로 최대 `params.limit`개
/// 반환해야 합니다. mirror 메서드는 파라미터를 무시하고 전체 집합을 반환합니다.
#[async_trait]
pub trait RemoteDataSource: Send + Sync {
    /// 소스 이름 반환.
    fn name(&self) -> &str;

    /// 메서드 처리기 존재 여부.
    fn supports(&self, method: SyncMethod) -> bool;

    /// 메서드 호출.
    ///
    /// 지원하지 않는 메서드는 `RemoteError::UnknownMethod`를 반환합니다.
    async fn fetch(
        &self,
        method: SyncMethod,
        auth: &Credential,
        params: &FetchParams,
    ) -> RemoteResult<Vec<Value>>;
}

#[async_trait]
impl<T: RemoteDataSource + ?Sized> RemoteDataSource for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn supports(&self, method: SyncMethod) -> bool {
        (**self).supports(method)
    }

    async fn fetch(
        &self,
        method: SyncMethod,
        auth: &Credential,
        params: &FetchParams,
    ) -> RemoteResult<Vec<Value>> {
        (**self).fetch(method, auth, params).await
    }
}
