//! 동기화 단계 통계 구조체.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::modules::SyncPhase;

/// 동기화 단계(종목 목록/가격 이력) 통계
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PhaseStats {
    /// 처리 대상 항목 수
    pub total: usize,
    /// 성공 항목 수
    pub success: usize,
    /// 에러 수 (항목 또는 청크 단위)
    pub errors: usize,
    /// 건너뛴 항목 수 (이미 최신 데이터)
    pub skipped: usize,
    /// 빈 데이터 (조회 성공, 데이터 없음)
    pub empty: usize,
    /// 저장된 총 행 수
    pub rows_written: usize,
    /// 처리한 청크 수
    pub chunks: usize,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl PhaseStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.success as f64 / self.total as f64) * 100.0
        }
    }

    /// 단계 종료 로그. 에러가 있으면 warn 레벨.
    pub fn log_summary(&self, phase: SyncPhase) {
        let elapsed_ms = self.elapsed.as_millis() as u64;
        if self.errors > 0 {
            tracing::warn!(
                %phase,
                errors = self.errors,
                elapsed_ms,
                "{} 단계 완료 (에러 포함): {}",
                phase,
                self
            );
        } else {
            tracing::info!(%phase, elapsed_ms, "{} 단계 완료: {}", phase, self);
        }
    }
}

impl fmt::Display for PhaseStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ok ({:.1}%), rows {}, skipped {}, empty {}, errors {}, chunks {}",
            self.success,
            self.total,
            self.success_rate(),
            self.rows_written,
            self.skipped,
            self.empty,
            self.errors,
            self.chunks
        )
    }
}
