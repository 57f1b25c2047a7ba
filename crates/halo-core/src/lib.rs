//! # Halo Core
//!
//! 주식 데이터 동기화 엔진의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 엔진 전반에서 사용되는 기본 타입을 제공합니다:
//! - 종목(Stock), 가격 봉(PriceBar), 동기화 기록(SyncRecord) 모델
//! - 시장 데이터 소스(`MarketDataSource`) 추상화
//! - 저장소(`StockRepository`) 추상화
//! - 에러 타입
//! - 로깅 인프라

pub mod domain;
pub mod error;
pub mod logging;

pub use domain::*;
pub use error::*;
pub use logging::*;
