//! 동기화 모듈.

pub mod full_sync;
pub mod price_history_sync;
pub mod stock_list_sync;

pub use full_sync::{
    run_full_sync, SyncOptions, SyncOrchestrator, SyncOutcome, SyncPhase, SyncResult,
};
pub use price_history_sync::{FetchWindow, PriceHistoryReport, PriceHistorySyncer};
pub use stock_list_sync::{StockListReport, StockListSyncer};

use std::future::Future;
use std::time::Duration;

use halo_core::SourceError;

/// 데이터 소스 호출 기본 타임아웃.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// 데이터 소스 호출에 타임아웃을 적용합니다.
pub(crate) async fn with_timeout<T, Fut>(
    limit: Duration,
    operation: &str,
    fut: Fut,
) -> Result<T, SourceError>
where
    Fut: Future<Output = Result<T, SourceError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(SourceError::Timeout(format!(
            "{} exceeded {}ms",
            operation,
            limit.as_millis()
        ))),
    }
}
