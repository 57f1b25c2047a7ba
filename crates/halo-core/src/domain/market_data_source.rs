//! 시장 데이터 소스 추상화.
//!
//! 종목 목록, 종목별 상세 정보, 기간별 일봉을 제공하는
//! 데이터 소스 중립적인 인터페이스입니다.

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use super::{KlineBar, StockDetail, StockInfo};

// =============================================================================
// 에러 타입
// =============================================================================

/// MarketDataSource 에러.
#[derive(Debug, Error)]
pub enum SourceError {
    /// 네트워크/프로세스 실행 에러
    #[error("네트워크 에러: {0}")]
    Network(String),

    /// 데이터 소스가 실패 응답을 반환함
    #[error("API 에러: {0}")]
    Api(String),

    /// 응답 파싱 에러
    #[error("파싱 에러: {0}")]
    Parse(String),

    /// 호출 타임아웃
    #[error("타임아웃: {0}")]
    Timeout(String),

    /// 기타 에러
    #[error("기타 에러: {0}")]
    Other(String),
}

// =============================================================================
// MarketDataSource Trait
// =============================================================================

/// 시장 데이터 소스 trait.
///
/// 구현체는 동시에 여러 태스크에서 호출될 수 있어야 합니다.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// 전체 종목 목록(유니버스) 조회.
    async fn get_all_stocks_info(&self) -> Result<Vec<StockInfo>, SourceError>;

    /// 종목별 정적 메타데이터 조회.
    async fn get_stock_detail(&self, symbol: &str) -> Result<StockDetail, SourceError>;

    /// 기간별 일봉 조회.
    ///
    /// `start`가 `None`이면 데이터 소스가 제공하는 전체 이력을 요청합니다.
    /// `end`는 포함 범위입니다.
    async fn get_stock_history(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: NaiveDate,
    ) -> Result<Vec<KlineBar>, SourceError>;

    /// 데이터 소스 이름 (로깅용).
    fn source_name(&self) -> &str;
}
