//! 전체 동기화 오케스트레이션.
//!
//! 종목 목록 동기화와 가격 이력 동기화를 순서대로 실행하고,
//! 전체 실행을 하나의 `SyncRecord` 생명주기(pending → running → success/failed)로 기록합니다.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::Instant;
use tracing::{error, info, warn, Instrument};

use halo_core::{
    MarketDataSource, NewSyncRecord, StockRepository, SyncRecordUpdate, SyncStatus,
    SYNC_TYPE_FULL,
};

use super::{PriceHistorySyncer, StockListSyncer, DEFAULT_FETCH_TIMEOUT};
use crate::{CollectorError, Result, RetryPolicy};

/// 전체 동기화 옵션
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// 청크당 항목 수
    pub batch_size: usize,
    /// 항목당 최대 시도 횟수
    pub max_retries: u32,
    /// 청크 간 딜레이
    pub delay_between_batches: Duration,
    /// 종목 목록 동기화 포함 여부
    pub sync_stock_list: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: 50,
            max_retries: 3,
            delay_between_batches: Duration::from_millis(1000),
            sync_stock_list: true,
        }
    }
}

/// 실행 결과 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// 에러 없음
    Success,
    /// 에러가 있지만 일부 데이터는 저장됨
    Partial,
    /// 에러가 있고 저장된 데이터 없음
    Failed,
}

impl SyncOutcome {
    pub fn classify(error_count: usize, rows_written: usize) -> Self {
        match (error_count, rows_written) {
            (0, _) => Self::Success,
            (_, 0) => Self::Failed,
            _ => Self::Partial,
        }
    }
}

/// 동기화 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    StockList,
    PriceHistory,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StockList => write!(f, "stock_list"),
            Self::PriceHistory => write!(f, "price_history"),
        }
    }
}

/// 전체 동기화 결과 요약
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    /// 동기화 기록 ID
    pub record_id: i64,
    /// 에러가 하나도 없으면 true
    pub success: bool,
    pub outcome: SyncOutcome,
    pub total_stocks: usize,
    pub new_stocks: usize,
    pub updated_prices: usize,
    pub errors: Vec<String>,
    /// 소요 시간 (초)
    pub duration: u64,
}

/// 실행 중 누적되는 진행 상황
#[derive(Debug, Default)]
struct RunProgress {
    phase: Option<SyncPhase>,
    total_stocks: usize,
    new_stocks: usize,
    updated_prices: usize,
    errors: Vec<String>,
}

impl RunProgress {
    fn rows_written(&self) -> usize {
        self.new_stocks + self.updated_prices
    }
}

/// 단계 실행 중 중단된 원인
struct PhaseFailure {
    phase: Option<SyncPhase>,
    message: String,
    chain: Vec<String>,
}

/// 전체 동기화 오케스트레이터
pub struct SyncOrchestrator {
    repo: Arc<dyn StockRepository>,
    source: Arc<dyn MarketDataSource>,
    fetch_timeout: Duration,
    retry_base_delay: Duration,
    reference_date: Option<NaiveDate>,
}

impl SyncOrchestrator {
    pub fn new(repo: Arc<dyn StockRepository>, source: Arc<dyn MarketDataSource>) -> Self {
        Self {
            repo,
            source,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            retry_base_delay: RetryPolicy::DEFAULT_BASE_DELAY,
            reference_date: None,
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// 가격 이력 단계에서 "오늘"로 사용할 날짜 고정
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    /// 이 오케스트레이터 설정을 따르는 종목 목록 동기화기
    pub fn stock_list_syncer(&self) -> StockListSyncer {
        StockListSyncer::new(Arc::clone(&self.repo), Arc::clone(&self.source))
            .with_fetch_timeout(self.fetch_timeout)
            .with_retry_base_delay(self.retry_base_delay)
    }

    /// 이 오케스트레이터 설정을 따르는 가격 이력 동기화기
    pub fn price_history_syncer(&self) -> PriceHistorySyncer {
        let syncer = PriceHistorySyncer::new(Arc::clone(&self.repo), Arc::clone(&self.source))
            .with_fetch_timeout(self.fetch_timeout)
            .with_retry_base_delay(self.retry_base_delay);
        match self.reference_date {
            Some(date) => syncer.with_reference_date(date),
            None => syncer,
        }
    }

    /// 전체 동기화 실행.
    ///
    /// 다른 실행이 잠금을 보유 중이거나 동기화 기록을 만들 수 없으면 `Err`를 반환합니다.
    /// 그 외의 실패는 모두 `SyncResult.errors`에 기록됩니다.
    pub async fn run(&self, options: SyncOptions) -> Result<SyncResult> {
        if !self.repo.try_acquire_run_lock(SYNC_TYPE_FULL).await? {
            warn!(sync_type = SYNC_TYPE_FULL, "이미 실행 중인 동기화가 있습니다");
            return Err(CollectorError::AlreadyRunning(SYNC_TYPE_FULL.to_string()));
        }

        let result = self.run_locked(&options).await;

        if let Err(e) = self.repo.release_run_lock(SYNC_TYPE_FULL).await {
            warn!(sync_type = SYNC_TYPE_FULL, error = %e, "실행 잠금 해제 실패");
        }

        result
    }

    async fn run_locked(&self, options: &SyncOptions) -> Result<SyncResult> {
        let clock = Instant::now();

        // 1. 동기화 기록 생성 (pending -> running)
        let record_id = self
            .repo
            .create_sync_record(&NewSyncRecord::pending(SYNC_TYPE_FULL, Utc::now()))
            .await
            .map_err(CollectorError::SyncRecord)?;

        if let Err(e) = self
            .repo
            .update_sync_record(record_id, &SyncRecordUpdate::running())
            .await
        {
            error!(record_id, error = %e, "동기화 기록 상태 변경 실패");
            let abort = SyncRecordUpdate::finished(SyncStatus::Failed, Utc::now(), 0)
                .with_error(Some(e.to_string()), None);
            if let Err(e) = self.repo.update_sync_record(record_id, &abort).await {
                warn!(record_id, error = %e, "동기화 기록 실패 처리 불가");
            }
            return Err(CollectorError::SyncRecord(e));
        }

        info!(
            record_id,
            batch_size = options.batch_size,
            max_retries = options.max_retries,
            delay_ms = options.delay_between_batches.as_millis() as u64,
            sync_stock_list = options.sync_stock_list,
            "전체 동기화 시작"
        );

        // 2. 단계 실행 (에러와 panic 모두 여기서 잡음)
        let mut progress = RunProgress::default();
        let outcome = AssertUnwindSafe(self.run_phases(options, &mut progress))
            .catch_unwind()
            .await;

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(PhaseFailure {
                phase: progress.phase,
                message: e.to_string(),
                chain: error_chain(&e),
            }),
            Err(panic) => Some(PhaseFailure {
                phase: progress.phase,
                message: format!("panic: {}", panic_message(panic.as_ref())),
                chain: Vec::new(),
            }),
        };

        if let Some(failure) = &failure {
            error!(
                record_id,
                phase = ?failure.phase,
                error = %failure.message,
                "동기화 단계 중단"
            );
            progress.errors.push(match failure.phase {
                Some(phase) => format!("{} phase failed: {}", phase, failure.message),
                None => failure.message.clone(),
            });
        }

        // 3. 최종 상태 기록
        let duration = clock.elapsed().as_secs();
        let success = progress.errors.is_empty();
        let status = if success {
            SyncStatus::Success
        } else {
            SyncStatus::Failed
        };

        let details = match &failure {
            Some(failure) => Some(json!({
                "error": failure.message,
                "chain": failure.chain,
                "phase": failure.phase.map(|p| p.to_string()),
            })),
            None if !success => Some(json!({ "errors": progress.errors })),
            None => None,
        };
        let message = (!success).then(|| progress.errors.join("; "));

        let update = SyncRecordUpdate::finished(status, Utc::now(), duration as i64)
            .with_counts(
                (progress.total_stocks + progress.updated_prices) as i64,
                progress.rows_written() as i64,
                progress.errors.len() as i64,
            )
            .with_error(message, details);

        if let Err(e) = self.repo.update_sync_record(record_id, &update).await {
            error!(record_id, error = %e, "동기화 기록 완료 처리 실패");
            progress
                .errors
                .push(format!("Failed to finalize sync record {}: {}", record_id, e));
        }

        let result = SyncResult {
            record_id,
            success: progress.errors.is_empty(),
            outcome: SyncOutcome::classify(progress.errors.len(), progress.rows_written()),
            total_stocks: progress.total_stocks,
            new_stocks: progress.new_stocks,
            updated_prices: progress.updated_prices,
            errors: progress.errors,
            duration,
        };

        info!(
            record_id,
            outcome = ?result.outcome,
            total_stocks = result.total_stocks,
            new_stocks = result.new_stocks,
            updated_prices = result.updated_prices,
            errors = result.errors.len(),
            duration_secs = result.duration,
            "전체 동기화 완료"
        );

        Ok(result)
    }

    async fn run_phases(&self, options: &SyncOptions, progress: &mut RunProgress) -> Result<()> {
        if options.sync_stock_list {
            progress.phase = Some(SyncPhase::StockList);
            let report = self
                .stock_list_syncer()
                .sync(
                    options.batch_size,
                    options.max_retries,
                    options.delay_between_batches,
                )
                .instrument(halo_core::sync_span!("sync_phase", SyncPhase::StockList))
                .await?;
            progress.total_stocks = report.total_stocks;
            progress.new_stocks = report.new_stocks;
            progress.errors.extend(report.errors);
        } else {
            info!("종목 목록 동기화 건너뜀");
        }

        progress.phase = Some(SyncPhase::PriceHistory);
        let report = self
            .price_history_syncer()
            .sync(
                options.batch_size,
                options.max_retries,
                options.delay_between_batches,
            )
            .instrument(halo_core::sync_span!("sync_phase", SyncPhase::PriceHistory))
            .await?;
        progress.updated_prices = report.updated_prices;
        progress.errors.extend(report.errors);

        Ok(())
    }
}

/// 기본 설정으로 전체 동기화를 한 번 실행합니다.
pub async fn run_full_sync(
    repo: Arc<dyn StockRepository>,
    source: Arc<dyn MarketDataSource>,
    options: Option<SyncOptions>,
) -> Result<SyncResult> {
    SyncOrchestrator::new(repo, source)
        .run(options.unwrap_or_default())
        .await
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = Some(err);
    while let Some(e) = current {
        chain.push(e.to_string());
        current = e.source();
    }
    chain
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
