//! 종목 목록 동기화 모듈.
//!
//! 데이터 소스의 전체 종목 목록과 저장된 종목을 비교하여
//! 새로 나타난 종목만 상세 정보와 함께 저장합니다.
//! 기존 종목은 갱신하지 않습니다.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use halo_core::{MarketDataSource, NewStock, SourceError, StockInfo, StockRepository};

use super::{with_timeout, SyncPhase, DEFAULT_FETCH_TIMEOUT};
use crate::{BatchRunner, ChunkInfo, PhaseStats, Result, RetryError, RetryPolicy};

/// 종목 목록 동기화 결과
#[derive(Debug, Clone, Default)]
pub struct StockListReport {
    /// 데이터 소스가 반환한 전체 종목 수
    pub total_stocks: usize,
    /// 새로 저장된 종목 수
    pub new_stocks: usize,
    /// 누적 에러 메시지
    pub errors: Vec<String>,
    pub stats: PhaseStats,
}

/// 청크 하나의 처리 결과
#[derive(Debug, Default)]
struct ChunkOutcome {
    inserted: usize,
    errors: Vec<String>,
}

/// 종목 목록 동기화기
pub struct StockListSyncer {
    repo: Arc<dyn StockRepository>,
    source: Arc<dyn MarketDataSource>,
    fetch_timeout: Duration,
    retry_base_delay: Duration,
}

impl StockListSyncer {
    pub fn new(repo: Arc<dyn StockRepository>, source: Arc<dyn MarketDataSource>) -> Self {
        Self {
            repo,
            source,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            retry_base_delay: RetryPolicy::DEFAULT_BASE_DELAY,
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

    /// 종목 목록 동기화 실행.
    ///
    /// 전체 목록 조회 실패는 에러 하나로 기록하고 정상 반환합니다.
    /// 저장된 종목 조회 실패만 `Err`로 전파됩니다.
    pub async fn sync(
        &self,
        batch_size: usize,
        max_retries: u32,
        delay: Duration,
    ) -> Result<StockListReport> {
        let start = Instant::now();
        let mut report = StockListReport::default();

        info!(source = self.source.source_name(), "종목 목록 동기화 시작");

        // 1. 전체 종목 목록 조회 (재시도 없음)
        let universe = match with_timeout(
            self.fetch_timeout,
            "get_all_stocks_info",
            self.source.get_all_stocks_info(),
        )
        .await
        {
            Ok(universe) => universe,
            Err(e) => {
                error!(error = %e, "전체 종목 목록 조회 실패");
                report.errors.push(format!("Failed to fetch stock list: {}", e));
                report.stats.errors = 1;
                report.stats.elapsed = start.elapsed();
                return Ok(report);
            }
        };
        report.total_stocks = universe.len();

        // 2. 신규 종목 추출
        let persisted: HashSet<String> = self.repo.list_symbols().await?.into_iter().collect();
        let new_stocks = diff_universe(universe, &persisted);

        report.stats.total = new_stocks.len();
        report.stats.skipped = report.total_stocks.saturating_sub(new_stocks.len());

        info!(
            total = report.total_stocks,
            persisted = persisted.len(),
            new = new_stocks.len(),
            "신규 종목 추출 완료"
        );

        if new_stocks.is_empty() {
            report.stats.elapsed = start.elapsed();
            report.stats.log_summary(SyncPhase::StockList);
            return Ok(report);
        }

        // 3. 청크 단위로 상세 조회 후 일괄 저장
        let runner = BatchRunner::new(batch_size, delay);
        let policy = &RetryPolicy::new(max_retries, self.retry_base_delay);

        let outcomes = runner
            .for_each_chunk(&new_stocks, move |info, chunk| {
                self.sync_chunk(info, chunk, policy)
            })
            .await;

        report.stats.chunks = outcomes.len();
        for outcome in outcomes {
            report.new_stocks += outcome.inserted;
            report.stats.errors += outcome.errors.len();
            report.errors.extend(outcome.errors);
        }
        report.stats.success = report.new_stocks;
        report.stats.rows_written = report.new_stocks;
        report.stats.elapsed = start.elapsed();
        report.stats.log_summary(SyncPhase::StockList);

        Ok(report)
    }

    async fn sync_chunk(
        &self,
        info: ChunkInfo,
        chunk: &[StockInfo],
        policy: &RetryPolicy,
    ) -> ChunkOutcome {
        let mut outcome = ChunkOutcome::default();

        let results =
            BatchRunner::settle(chunk, |stock| self.fetch_new_stock(stock, policy)).await;

        let mut rows = Vec::with_capacity(chunk.len());
        for (stock, result) in chunk.iter().zip(results) {
            match result {
                Ok(row) => rows.push(row),
                Err(e) => {
                    warn!(symbol = %stock.symbol, attempts = e.attempts, error = %e.last_error, "종목 상세 조회 실패");
                    outcome
                        .errors
                        .push(format!("Failed to fetch detail for {}: {}", stock.label(), e));
                }
            }
        }

        if rows.is_empty() {
            return outcome;
        }

        match self.repo.insert_stocks(&rows).await {
            Ok(inserted) => {
                debug!(chunk = %info, inserted, "종목 저장 완료");
                outcome.inserted = inserted as usize;
            }
            Err(e) => {
                error!(chunk = %info, rows = rows.len(), error = %e, "종목 일괄 저장 실패");
                outcome.errors.push(format!(
                    "Failed to insert stocks for chunk {}: {}",
                    info, e
                ));
            }
        }

        outcome
    }

    async fn fetch_new_stock(
        &self,
        stock: &StockInfo,
        policy: &RetryPolicy,
    ) -> std::result::Result<NewStock, RetryError<SourceError>> {
        let detail = policy
            .attempt(|_| {
                with_timeout(
                    self.fetch_timeout,
                    "get_stock_detail",
                    self.source.get_stock_detail(&stock.symbol),
                )
            })
            .await?;

        Ok(NewStock::from_parts(stock, detail))
    }
}

/// 저장되지 않은 종목만 남깁니다 (순서 유지, 중복은 첫 항목만).
fn diff_universe(universe: Vec<StockInfo>, persisted: &HashSet<String>) -> Vec<StockInfo> {
    let mut seen = HashSet::new();
    universe
        .into_iter()
        .filter(|stock| !persisted.contains(&stock.symbol) && seen.insert(stock.symbol.clone()))
        .collect()
}
