//! 통합 테스트 공용 도구: 모의 데이터 소스와 픽스처.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use halo_collector::SyncOrchestrator;
use halo_core::{
    KlineBar, MarketDataSource, NewPriceBar, SourceError, StockDetail, StockInfo, StockRef,
};
use halo_data::MemoryRepository;

/// 테스트 기준 "오늘".
pub fn today() -> NaiveDate {
    date(2024, 1, 15)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn kline(day: NaiveDate) -> KlineBar {
    let close = dec!(10) + Decimal::from(day.day0());
    KlineBar {
        date: day,
        open: close - dec!(0.2),
        high: close + dec!(0.3),
        low: close - dec!(0.4),
        close,
        volume: Some(dec!(150000)),
        amount: Some(dec!(1520000.5)),
        pct_change: Some(dec!(0.85)),
        turnover: None,
    }
}

/// `from..=to` 모든 날짜의 일봉.
pub fn daily_bars(from: NaiveDate, to: NaiveDate) -> Vec<KlineBar> {
    from.iter_days().take_while(|d| *d <= to).map(kline).collect()
}

/// 저장소에 미리 넣을 가격 행.
pub fn price_rows(symbol: &str, from: NaiveDate, to: NaiveDate) -> Vec<NewPriceBar> {
    daily_bars(from, to)
        .iter()
        .map(|bar| NewPriceBar::from_kline(symbol, bar))
        .collect()
}

pub fn stock_ref(symbol: &str, name: &str) -> StockRef {
    StockRef {
        symbol: symbol.to_string(),
        name: name.to_string(),
    }
}

pub fn repo_with(stocks: &[(&str, &str)]) -> Arc<MemoryRepository> {
    Arc::new(MemoryRepository::with_stocks(
        stocks.iter().map(|(symbol, name)| stock_ref(symbol, name)),
    ))
}

/// 기준일이 고정된 오케스트레이터.
pub fn orchestrator(repo: &Arc<MemoryRepository>, source: &Arc<MockSource>) -> SyncOrchestrator {
    SyncOrchestrator::new(repo.clone(), source.clone()).with_reference_date(today())
}

/// 모의 데이터 소스 호출 기록.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Universe,
    Detail(String),
    History {
        symbol: String,
        start: Option<NaiveDate>,
        end: NaiveDate,
    },
}

/// 설정 가능한 모의 `MarketDataSource`.
#[derive(Default)]
pub struct MockSource {
    universe: Vec<StockInfo>,
    fail_universe: bool,
    history: HashMap<String, Vec<KlineBar>>,
    ignore_start: bool,
    failing_details: HashSet<String>,
    history_failures: Mutex<HashMap<String, usize>>,
    panic_symbol: Option<String>,
    calls: Mutex<Vec<Call>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_universe(mut self, stocks: &[(&str, &str)]) -> Self {
        self.universe = stocks
            .iter()
            .map(|(symbol, name)| StockInfo::new(*symbol, *name))
            .collect();
        self
    }

    pub fn with_history(mut self, symbol: &str, bars: Vec<KlineBar>) -> Self {
        self.history.insert(symbol.to_string(), bars);
        self
    }

    /// 시작일을 무시하고 보유한 전체 이력을 반환
    pub fn ignoring_start_bound(mut self) -> Self {
        self.ignore_start = true;
        self
    }

    pub fn failing_universe(mut self) -> Self {
        self.fail_universe = true;
        self
    }

    pub fn failing_detail(mut self, symbol: &str) -> Self {
        self.failing_details.insert(symbol.to_string());
        self
    }

    /// `symbol`의 이력 조회를 `times`번 실패시킴 (`usize::MAX`면 항상)
    pub fn failing_history(self, symbol: &str, times: usize) -> Self {
        self.history_failures
            .lock()
            .unwrap()
            .insert(symbol.to_string(), times);
        self
    }

    pub fn panicking_history(mut self, symbol: &str) -> Self {
        self.panic_symbol = Some(symbol.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn universe_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Universe))
            .count()
    }

    pub fn detail_calls(&self, symbol: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Detail(s) if s == symbol))
            .count()
    }

    /// `symbol`의 이력 조회 구간 (호출 순)
    pub fn history_calls(&self, symbol: &str) -> Vec<(Option<NaiveDate>, NaiveDate)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::History { symbol: s, start, end } if s == symbol => Some((start, end)),
                _ => None,
            })
            .collect()
    }

    pub fn total_history_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::History { .. }))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MarketDataSource for MockSource {
    async fn get_all_stocks_info(&self) -> Result<Vec<StockInfo>, SourceError> {
        self.record(Call::Universe);
        if self.fail_universe {
            return Err(SourceError::Network("connection refused".to_string()));
        }
        Ok(self.universe.clone())
    }

    async fn get_stock_detail(&self, symbol: &str) -> Result<StockDetail, SourceError> {
        self.record(Call::Detail(symbol.to_string()));
        if self.failing_details.contains(symbol) {
            return Err(SourceError::Api(format!("no detail for {}", symbol)));
        }
        Ok(StockDetail {
            industry: Some("银行".to_string()),
            list_date: Some(date(1991, 4, 3)),
            total_shares: Some(dec!(19405918198)),
            circulating_shares: Some(dec!(19405546950)),
        })
    }

    async fn get_stock_history(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: NaiveDate,
    ) -> Result<Vec<KlineBar>, SourceError> {
        self.record(Call::History {
            symbol: symbol.to_string(),
            start,
            end,
        });

        if self.panic_symbol.as_deref() == Some(symbol) {
            panic!("bridge crashed for {}", symbol);
        }

        {
            let mut failures = self.history_failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(symbol) {
                if *remaining > 0 {
                    if *remaining != usize::MAX {
                        *remaining -= 1;
                    }
                    return Err(SourceError::Timeout(format!("history for {}", symbol)));
                }
            }
        }

        let lower = if self.ignore_start { None } else { start };
        Ok(self
            .history
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date <= end && lower.map_or(true, |s| b.date >= s))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn source_name(&self) -> &str {
        "mock"
    }
}
