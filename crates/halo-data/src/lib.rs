//! 저장소 및 시장 데이터 어댑터.
//!
//! 이 crate는 다음을 제공합니다:
//! - PostgreSQL 저장소 (`PgStockRepository`)
//! - 테스트/드라이런용 메모리 저장소 (`MemoryRepository`)
//! - Python 브리지 기반 시장 데이터 소스 (`PythonBridgeSource`)

pub mod provider;
pub mod storage;

pub use provider::{ApiResponse, PythonBridgeConfig, PythonBridgeSource};
pub use storage::memory::MemoryRepository;
pub use storage::postgres::{Database, DatabaseConfig, PgStockRepository};
