//! 메모리 기반 `StockRepository`.
//!
//! PostgreSQL 스키마와 같은 고유 제약을 강제합니다:
//! - `stocks.symbol`
//! - `stock_prices (symbol, trade_date)`
//!
//! 일괄 삽입은 원자적입니다. 한 행이라도 위반하면 아무것도 기록되지 않습니다.
//! 테스트용 장애 주입 기능을 포함합니다.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;

use halo_core::{
    DataError, DataResult, NewPriceBar, NewStock, NewSyncRecord, StockRef, StockRepository,
    SyncRecord, SyncRecordUpdate,
};

#[derive(Default)]
struct State {
    stocks: BTreeMap<String, NewStock>,
    prices: BTreeMap<String, BTreeMap<NaiveDate, NewPriceBar>>,
    sync_records: Vec<SyncRecord>,
    run_locks: HashSet<String>,
}

#[derive(Default)]
struct Faults {
    list_stocks: bool,
    create_sync_record: bool,
    update_sync_record: bool,
    /// 완료(success/failed) 상태로의 갱신만 실패
    finish_sync_record: bool,
    /// 남은 종목 삽입 실패 횟수
    stock_inserts: usize,
    /// 종목별 남은 가격 삽입 실패 횟수
    price_inserts: HashMap<String, usize>,
}

#[derive(Default)]
struct Calls {
    insert_stocks: usize,
    insert_price_bars: usize,
}

/// 메모리 저장소.
#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
    faults: RwLock<Faults>,
    calls: RwLock<Calls>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 이미 저장된 종목으로 초기화합니다.
    pub fn with_stocks<I>(stocks: I) -> Self
    where
        I: IntoIterator<Item = StockRef>,
    {
        let mut state = State::default();
        for stock in stocks {
            state.stocks.insert(
                stock.symbol.clone(),
                NewStock {
                    symbol: stock.symbol,
                    name: stock.name,
                    industry: None,
                    list_date: None,
                    total_shares: None,
                    circulating_shares: None,
                },
            );
        }
        Self {
            state: RwLock::new(state),
            ..Default::default()
        }
    }

    /// 가격 행을 제약 검사 없이 미리 채웁니다.
    pub async fn seed_price_bars(&self, rows: impl IntoIterator<Item = NewPriceBar>) {
        let mut state = self.state.write().await;
        for row in rows {
            state
                .prices
                .entry(row.symbol.clone())
                .or_default()
                .insert(row.trade_date, row);
        }
    }

    // ---------------------------------------------------------------------
    // 장애 주입
    // ---------------------------------------------------------------------

    pub async fn fail_list_stocks(&self, fail: bool) {
        self.faults.write().await.list_stocks = fail;
    }

    pub async fn fail_create_sync_record(&self, fail: bool) {
        self.faults.write().await.create_sync_record = fail;
    }

    pub async fn fail_update_sync_record(&self, fail: bool) {
        self.faults.write().await.update_sync_record = fail;
    }

    pub async fn fail_finish_sync_record(&self, fail: bool) {
        self.faults.write().await.finish_sync_record = fail;
    }

    /// 다음 `times`번의 종목 일괄 삽입을 실패시킵니다.
    pub async fn fail_stock_inserts(&self, times: usize) {
        self.faults.write().await.stock_inserts = times;
    }

    /// `symbol`을 포함한 다음 `times`번의 가격 삽입을 실패시킵니다.
    pub async fn fail_price_inserts(&self, symbol: &str, times: usize) {
        self.faults
            .write()
            .await
            .price_inserts
            .insert(symbol.to_string(), times);
    }

    // ---------------------------------------------------------------------
    // 조회
    // ---------------------------------------------------------------------

    pub async fn stock(&self, symbol: &str) -> Option<NewStock> {
        self.state.read().await.stocks.get(symbol).cloned()
    }

    pub async fn stock_count(&self) -> usize {
        self.state.read().await.stocks.len()
    }

    /// 종목의 가격 행 (거래일 오름차순).
    pub async fn price_bars(&self, symbol: &str) -> Vec<NewPriceBar> {
        self.state
            .read()
            .await
            .prices
            .get(symbol)
            .map(|bars| bars.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn price_bar_count(&self) -> usize {
        self.state
            .read()
            .await
            .prices
            .values()
            .map(|bars| bars.len())
            .sum()
    }

    pub async fn sync_records(&self) -> Vec<SyncRecord> {
        self.state.read().await.sync_records.clone()
    }

    pub async fn is_run_locked(&self, sync_type: &str) -> bool {
        self.state.read().await.run_locks.contains(sync_type)
    }

    pub async fn insert_stocks_calls(&self) -> usize {
        self.calls.read().await.insert_stocks
    }

    pub async fn insert_price_bars_calls(&self) -> usize {
        self.calls.read().await.insert_price_bars
    }
}

#[async_trait]
impl StockRepository for MemoryRepository {
    async fn list_stocks(&self) -> DataResult<Vec<StockRef>> {
        if self.faults.read().await.list_stocks {
            return Err(DataError::ConnectionError("injected list_stocks failure".to_string()));
        }

        Ok(self
            .state
            .read()
            .await
            .stocks
            .values()
            .map(|s| StockRef {
                symbol: s.symbol.clone(),
                name: s.name.clone(),
            })
            .collect())
    }

    async fn insert_stocks(&self, rows: &[NewStock]) -> DataResult<u64> {
        self.calls.write().await.insert_stocks += 1;

        {
            let mut faults = self.faults.write().await;
            if faults.stock_inserts > 0 {
                faults.stock_inserts -= 1;
                return Err(DataError::QueryError("injected insert_stocks failure".to_string()));
            }
        }

        let mut state = self.state.write().await;
        let mut seen = BTreeSet::new();
        for row in rows {
            if state.stocks.contains_key(&row.symbol) || !seen.insert(row.symbol.as_str()) {
                return Err(DataError::DuplicateError(format!(
                    "stocks_symbol_idx: {}",
                    row.symbol
                )));
            }
        }

        for row in rows {
            state.stocks.insert(row.symbol.clone(), row.clone());
        }
        Ok(rows.len() as u64)
    }

    async fn insert_price_bars(&self, rows: &[NewPriceBar]) -> DataResult<u64> {
        self.calls.write().await.insert_price_bars += 1;

        {
            let mut faults = self.faults.write().await;
            for row in rows {
                if let Some(remaining) = faults.price_inserts.get_mut(&row.symbol) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        return Err(DataError::QueryError(format!(
                            "injected insert_price_bars failure for {}",
                            row.symbol
                        )));
                    }
                }
            }
        }

        let mut state = self.state.write().await;
        let mut seen = BTreeSet::new();
        for row in rows {
            let exists = state
                .prices
                .get(&row.symbol)
                .is_some_and(|bars| bars.contains_key(&row.trade_date));
            if exists || !seen.insert((row.symbol.as_str(), row.trade_date)) {
                return Err(DataError::DuplicateError(format!(
                    "stock_prices_stock_date_idx: ({}, {})",
                    row.symbol, row.trade_date
                )));
            }
        }

        for row in rows {
            state
                .prices
                .entry(row.symbol.clone())
                .or_default()
                .insert(row.trade_date, row.clone());
        }
        Ok(rows.len() as u64)
    }

    async fn latest_trade_date(&self, symbol: &str) -> DataResult<Option<NaiveDate>> {
        Ok(self
            .state
            .read()
            .await
            .prices
            .get(symbol)
            .and_then(|bars| bars.keys().next_back().copied()))
    }

    async fn create_sync_record(&self, record: &NewSyncRecord) -> DataResult<i64> {
        if self.faults.read().await.create_sync_record {
            return Err(DataError::ConnectionError(
                "injected create_sync_record failure".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        let id = state.sync_records.len() as i64 + 1;
        state.sync_records.push(SyncRecord::from_new(id, record));
        Ok(id)
    }

    async fn update_sync_record(&self, id: i64, update: &SyncRecordUpdate) -> DataResult<()> {
        {
            let faults = self.faults.read().await;
            let finishing = update.status.is_some_and(|s| s.is_terminal());
            if faults.update_sync_record || (faults.finish_sync_record && finishing) {
                return Err(DataError::ConnectionError(
                    "injected update_sync_record failure".to_string(),
                ));
            }
        }

        let mut state = self.state.write().await;
        let record = state
            .sync_records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| DataError::NotFound(format!("sync record {}", id)))?;

        record.apply(update).map_err(DataError::InvalidData)
    }

    async fn try_acquire_run_lock(&self, sync_type: &str) -> DataResult<bool> {
        Ok(self
            .state
            .write()
            .await
            .run_locks
            .insert(sync_type.to_string()))
    }

    async fn release_run_lock(&self, sync_type: &str) -> DataResult<()> {
        self.state.write().await.run_locks.remove(sync_type);
        Ok(())
    }
}
