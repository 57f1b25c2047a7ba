//! 주식 데이터 동기화 엔진.
//!
//! 이 crate는 시장 데이터 소스와 저장소 사이의 동기화를 담당합니다:
//! - 종목 목록 동기화 (신규 종목 + 상세 정보)
//! - 가격 이력 증분 동기화 (일봉)
//! - 두 단계를 하나의 `SyncRecord` 생명주기로 묶는 전체 동기화
//!
//! 모든 외부 호출은 청크 단위로 묶여 실행되며(`BatchRunner`),
//! 실패한 호출은 선형 백오프로 재시도됩니다(`RetryPolicy`).

pub mod batch;
pub mod config;
pub mod error;
pub mod modules;
pub mod retry;
pub mod stats;

pub use batch::{BatchRunner, ChunkInfo};
pub use config::CollectorConfig;
pub use error::{CollectorError, Result};
pub use modules::{
    run_full_sync, FetchWindow, PriceHistoryReport, PriceHistorySyncer, StockListReport,
    StockListSyncer, SyncOptions, SyncOrchestrator, SyncOutcome, SyncPhase, SyncResult,
};
pub use retry::{RetryError, RetryPolicy};
pub use stats::PhaseStats;
