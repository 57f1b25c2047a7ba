//! 에러 타입 정의.

use std::fmt;

use halo_core::{DataError, SourceError};

/// Collector 에러 타입
#[derive(Debug)]
pub enum CollectorError {
    /// 저장소 에러
    Database(DataError),
    /// 설정 에러
    Config(String),
    /// 데이터 소스 에러
    DataSource(SourceError),
    /// 같은 종류의 동기화가 이미 실행 중
    AlreadyRunning(String),
    /// 동기화 기록 생성/갱신 실패
    SyncRecord(DataError),
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database(e) => write!(f, "Database error: {}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::DataSource(e) => write!(f, "Data source error: {}", e),
            Self::AlreadyRunning(sync_type) => {
                write!(f, "Sync already running: {}", sync_type)
            }
            Self::SyncRecord(e) => write!(f, "Sync record error: {}", e),
        }
    }
}

impl std::error::Error for CollectorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Database(e) | Self::SyncRecord(e) => Some(e),
            Self::DataSource(e) => Some(e),
            Self::Config(_) | Self::AlreadyRunning(_) => None,
        }
    }
}

impl From<DataError> for CollectorError {
    fn from(err: DataError) -> Self {
        Self::Database(err)
    }
}

impl From<SourceError> for CollectorError {
    fn from(err: SourceError) -> Self {
        Self::DataSource(err)
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
