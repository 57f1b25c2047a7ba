//! 저장소 추상화.
//!
//! 동기화 엔진이 사용하는 영속성 연산만 정의합니다.
//! 구체적인 저장소(PostgreSQL, 메모리 등)는 `halo-data`에 있습니다.

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{NewPriceBar, NewStock, NewSyncRecord, StockRef, SyncRecordUpdate};
use crate::error::DataResult;

/// 종목/가격/동기화 기록 저장소.
///
/// 한 청크 안의 여러 태스크가 동시에 호출하므로 `Send + Sync`여야 합니다.
/// `insert_price_bars`는 `(symbol, trade_date)` 고유 제약을 강제해야 하며,
/// 위반 시 `DataError::DuplicateError`를 반환합니다.
#[async_trait]
pub trait StockRepository: Send + Sync {
    /// 저장된 모든 종목 (symbol 순).
    async fn list_stocks(&self) -> DataResult<Vec<StockRef>>;

    /// 저장된 모든 종목 코드.
    async fn list_symbols(&self) -> DataResult<Vec<String>> {
        Ok(self
            .list_stocks()
            .await?
            .into_iter()
            .map(|stock| stock.symbol)
            .collect())
    }

    /// 종목 일괄 삽입. 삽입된 행 수를 반환합니다.
    async fn insert_stocks(&self, rows: &[NewStock]) -> DataResult<u64>;

    /// 가격 일괄 삽입. 삽입된 행 수를 반환합니다.
    async fn insert_price_bars(&self, rows: &[NewPriceBar]) -> DataResult<u64>;

    /// 종목의 가장 최근 거래일.
    async fn latest_trade_date(&self, symbol: &str) -> DataResult<Option<NaiveDate>>;

    /// 동기화 기록 생성. 새 기록의 ID를 반환합니다.
    async fn create_sync_record(&self, record: &NewSyncRecord) -> DataResult<i64>;

    /// 동기화 기록 갱신.
    async fn update_sync_record(&self, id: i64, update: &SyncRecordUpdate) -> DataResult<()>;

    /// `sync_type` 단위 실행 잠금 획득 시도.
    ///
    /// 이미 다른 실행이 잠금을 보유 중이면 `false`를 반환합니다.
    async fn try_acquire_run_lock(&self, sync_type: &str) -> DataResult<bool>;

    /// 실행 잠금 해제.
    async fn release_run_lock(&self, sync_type: &str) -> DataResult<()>;
}
