//! 가격 이력 증분 동기화 모듈.
//!
//! 저장된 종목마다 가장 최근 거래일 다음 날부터 오늘까지의 일봉만 조회하여 저장합니다.
//! 조회 구간은 시도할 때마다 다시 계산되므로, 이전 시도가 일부를 저장한 뒤
//! 실패했더라도 같은 날짜를 두 번 저장하지 않습니다.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate};
use tracing::{debug, info, warn};

use halo_core::{KlineBar, MarketDataSource, NewPriceBar, StockRef, StockRepository};

use super::{with_timeout, SyncPhase, DEFAULT_FETCH_TIMEOUT};
use crate::{BatchRunner, CollectorError, PhaseStats, Result, RetryError, RetryPolicy};

/// 가격 이력 동기화 결과
#[derive(Debug, Clone, Default)]
pub struct PriceHistoryReport {
    /// 새로 저장된 일봉 수
    pub updated_prices: usize,
    /// 누적 에러 메시지
    pub errors: Vec<String>,
    pub stats: PhaseStats,
}

/// 종목 하나의 조회 구간.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    /// 시작일 (포함). `None`이면 데이터 소스의 전체 이력
    pub start: Option<NaiveDate>,
    /// 종료일 (포함)
    pub end: NaiveDate,
}

impl FetchWindow {
    /// 최근 거래일 `latest` 기준 증분 구간 `[latest + 1, today]`.
    pub fn incremental(latest: Option<NaiveDate>, today: NaiveDate) -> Self {
        Self {
            start: latest.map(|d| d.succ_opt().unwrap_or(NaiveDate::MAX)),
            end: today,
        }
    }

    /// 더 조회할 날짜가 없는지 (`start >= today`).
    pub fn is_up_to_date(&self) -> bool {
        matches!(self.start, Some(start) if start >= self.end)
    }

    /// 구간 밖의 일봉을 버리고 같은 날짜는 첫 항목만 남겨 저장 행으로 변환합니다.
    pub fn select(&self, symbol: &str, bars: &[KlineBar]) -> Vec<NewPriceBar> {
        let mut seen = HashSet::new();
        bars.iter()
            .filter(|bar| self.start.map_or(true, |start| bar.date >= start))
            .filter(|bar| bar.date <= self.end)
            .filter(|bar| seen.insert(bar.date))
            .map(|bar| NewPriceBar::from_kline(symbol, bar))
            .collect()
    }
}

/// 종목 하나의 동기화 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SymbolOutcome {
    /// 이미 최신
    UpToDate,
    /// 조회 성공, 새 데이터 없음
    Empty,
    /// 저장된 행 수
    Written(usize),
}

/// 가격 이력 동기화기
pub struct PriceHistorySyncer {
    repo: Arc<dyn StockRepository>,
    source: Arc<dyn MarketDataSource>,
    fetch_timeout: Duration,
    retry_base_delay: Duration,
    reference_date: Option<NaiveDate>,
}

impl PriceHistorySyncer {
    pub fn new(repo: Arc<dyn StockRepository>, source: Arc<dyn MarketDataSource>) -> Self {
        Self {
            repo,
            source,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            retry_base_delay: RetryPolicy::DEFAULT_BASE_DELAY,
            reference_date: None,
        }
    }

    /// 데이터 소스 호출당 타임아웃 설정
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// 재시도 백오프 기본 단위 설정
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// "오늘"로 사용할 날짜 고정 (기본: 로컬 날짜)
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    fn today(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| Local::now().date_naive())
    }

    /// 가격 이력 동기화 실행.
    ///
    /// 종목별 실패는 에러 목록에 누적되며, 종목 목록 조회 실패만 `Err`로 전파됩니다.
    pub async fn sync(
        &self,
        batch_size: usize,
        max_retries: u32,
        delay: Duration,
    ) -> Result<PriceHistoryReport> {
        let start = Instant::now();
        let mut report = PriceHistoryReport::default();
        let today = self.today();

        let stocks = self.repo.list_stocks().await?;
        report.stats.total = stocks.len();

        info!(
            source = self.source.source_name(),
            stocks = stocks.len(),
            today = %today,
            "가격 이력 동기화 시작"
        );

        if stocks.is_empty() {
            warn!("동기화할 종목이 없습니다");
            report.stats.elapsed = start.elapsed();
            return Ok(report);
        }

        let runner = BatchRunner::new(batch_size, delay);
        let policy = &RetryPolicy::new(max_retries, self.retry_base_delay);

        let chunks = runner
            .for_each_chunk(&stocks, move |_, chunk| {
                BatchRunner::settle(chunk, move |stock| self.sync_symbol(stock, today, policy))
            })
            .await;
        report.stats.chunks = chunks.len();

        for (stock, result) in stocks.iter().zip(chunks.into_iter().flatten()) {
            match result {
                Ok(SymbolOutcome::UpToDate) => report.stats.skipped += 1,
                Ok(SymbolOutcome::Empty) => {
                    report.stats.success += 1;
                    report.stats.empty += 1;
                }
                Ok(SymbolOutcome::Written(rows)) => {
                    report.stats.success += 1;
                    report.updated_prices += rows;
                }
                Err(e) => {
                    warn!(symbol = %stock.symbol, attempts = e.attempts, error = %e.last_error, "가격 이력 동기화 실패");
                    report.stats.errors += 1;
                    report
                        .errors
                        .push(format!("Failed to sync prices for {}: {}", stock.label(), e));
                }
            }
        }

        report.stats.rows_written = report.updated_prices;
        report.stats.elapsed = start.elapsed();
        report.stats.log_summary(SyncPhase::PriceHistory);

        Ok(report)
    }

    async fn sync_symbol(
        &self,
        stock: &StockRef,
        today: NaiveDate,
        policy: &RetryPolicy,
    ) -> std::result::Result<SymbolOutcome, RetryError<CollectorError>> {
        policy
            .attempt(|attempt| self.sync_symbol_once(stock, today, attempt))
            .await
    }

    /// 한 번의 시도. 구간은 매번 저장소 기준으로 다시 계산합니다.
    async fn sync_symbol_once(
        &self,
        stock: &StockRef,
        today: NaiveDate,
        attempt: u32,
    ) -> Result<SymbolOutcome> {
        let latest = self.repo.latest_trade_date(&stock.symbol).await?;
        let window = FetchWindow::incremental(latest, today);

        if window.is_up_to_date() {
            debug!(symbol = %stock.symbol, latest = ?latest, "이미 최신 데이터");
            return Ok(SymbolOutcome::UpToDate);
        }

        debug!(
            symbol = %stock.symbol,
            start = ?window.start,
            end = %window.end,
            attempt,
            "일봉 조회"
        );

        let bars = with_timeout(
            self.fetch_timeout,
            "get_stock_history",
            self.source
                .get_stock_history(&stock.symbol, window.start, window.end),
        )
        .await?;

        let rows = window.select(&stock.symbol, &bars);
        if rows.len() != bars.len() {
            debug!(
                symbol = %stock.symbol,
                received = bars.len(),
                kept = rows.len(),
                "구간 밖 또는 중복 일봉 제외"
            );
        }
        if rows.is_empty() {
            return Ok(SymbolOutcome::Empty);
        }

        let inserted = self.repo.insert_price_bars(&rows).await?;
        debug!(symbol = %stock.symbol, inserted, "일봉 저장 완료");

        Ok(SymbolOutcome::Written(inserted as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bar(date: NaiveDate) -> KlineBar {
        KlineBar {
            date,
            open: dec!(10),
            high: dec!(11),
            low: dec!(9),
            close: dec!(10.5),
            volume: Some(dec!(1000)),
            amount: None,
            pct_change: None,
            turnover: None,
        }
    }

    #[test]
    fn test_incremental_window_starts_day_after_latest() {
        let window = FetchWindow::incremental(Some(date(2024, 1, 10)), date(2024, 1, 15));
        assert_eq!(window.start, Some(date(2024, 1, 11)));
        assert_eq!(window.end, date(2024, 1, 15));
        assert!(!window.is_up_to_date());
    }

    #[test]
    fn test_window_without_history_requests_everything() {
        let window = FetchWindow::incremental(None, date(2024, 1, 15));
        assert_eq!(window.start, None);
        assert!(!window.is_up_to_date());
    }

    #[test]
    fn test_window_up_to_date() {
        // 어제까지 저장됨 -> 시작일 == 오늘 -> 건너뜀
        let today = date(2024, 1, 15);
        assert!(FetchWindow::incremental(Some(date(2024, 1, 14)), today).is_up_to_date());
        assert!(FetchWindow::incremental(Some(today), today).is_up_to_date());
        assert!(!FetchWindow::incremental(Some(date(2024, 1, 13)), today).is_up_to_date());
    }

    #[test]
    fn test_select_drops_out_of_window_and_duplicate_bars() {
        let window = FetchWindow::incremental(Some(date(2024, 1, 10)), date(2024, 1, 15));
        let bars = vec![
            bar(date(2024, 1, 9)),
            bar(date(2024, 1, 10)),
            bar(date(2024, 1, 11)),
            bar(date(2024, 1, 11)),
            bar(date(2024, 1, 12)),
            bar(date(2024, 1, 16)),
        ];

        let rows = window.select("000001", &bars);
        let dates: Vec<NaiveDate> = rows.iter().map(|r| r.trade_date).collect();
        assert_eq!(dates, vec![date(2024, 1, 11), date(2024, 1, 12)]);
        assert!(rows.iter().all(|r| r.symbol == "000001"));
    }
}
