//! 환경변수 기반 설정 모듈.

use std::path::PathBuf;
use std::time::Duration;

use crate::modules::SyncOptions;
use crate::Result;

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 데이터베이스 URL
    pub database_url: String,
    /// 데이터베이스 최대 연결 수
    pub db_max_connections: u32,
    /// 동기화 설정
    pub sync: SyncConfig,
    /// Python 브리지 설정
    pub bridge: BridgeConfig,
    /// 데몬 모드 설정
    pub daemon: DaemonConfig,
}

/// 동기화 설정
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 청크당 항목 수
    pub batch_size: usize,
    /// 항목당 최대 시도 횟수
    pub max_retries: u32,
    /// 청크 간 딜레이 (밀리초)
    pub batch_delay_ms: u64,
    /// 재시도 백오프 기본 단위 (밀리초)
    pub retry_base_delay_ms: u64,
    /// 데이터 소스 호출당 타임아웃 (초)
    pub fetch_timeout_secs: u64,
    /// 종목 목록 동기화 포함 여부
    pub sync_stock_list: bool,
}

/// Python 브리지 설정
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Python 실행 파일
    pub python_path: String,
    /// `py` 패키지를 포함한 디렉터리
    pub package_dir: PathBuf,
}

/// 데몬 모드 설정
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// 전체 동기화 실행 주기 (분 단위)
    pub interval_minutes: u64,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드 (`.env` 포함)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 임의의 키-값 조회 함수로 설정을 만듭니다.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or_else(|| {
            crate::error::CollectorError::Config(
                "DATABASE_URL 환경변수가 설정되지 않았습니다".to_string(),
            )
        })?;

        Ok(Self {
            database_url,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10),
            sync: SyncConfig {
                batch_size: parse_or(&lookup, "SYNC_BATCH_SIZE", 50),
                max_retries: parse_or(&lookup, "SYNC_MAX_RETRIES", 3),
                batch_delay_ms: parse_or(&lookup, "SYNC_BATCH_DELAY_MS", 1000),
                retry_base_delay_ms: parse_or(&lookup, "SYNC_RETRY_BASE_DELAY_MS", 1000),
                fetch_timeout_secs: parse_or(&lookup, "SYNC_FETCH_TIMEOUT_SECS", 60),
                sync_stock_list: bool_or(&lookup, "SYNC_STOCK_LIST", true),
            },
            bridge: BridgeConfig {
                python_path: lookup("PYTHON_PATH").unwrap_or_else(|| "python3".to_string()),
                package_dir: lookup("STOCK_BRIDGE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(".")),
            },
            daemon: DaemonConfig {
                interval_minutes: parse_or(&lookup, "DAEMON_INTERVAL_MINUTES", 60),
            },
        })
    }
}

impl SyncConfig {
    /// 청크 간 딜레이를 Duration으로 반환
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// 전체 동기화 옵션으로 변환
    pub fn to_options(&self) -> SyncOptions {
        SyncOptions {
            batch_size: self.batch_size,
            max_retries: self.max_retries,
            delay_between_batches: self.batch_delay(),
            sync_stock_list: self.sync_stock_list,
        }
    }
}

impl DaemonConfig {
    /// 실행 주기를 Duration으로 반환 (최소 1분)
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.max(1).saturating_mul(60))
    }
}

/// 값을 파싱 (없거나 실패 시 기본값 사용)
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// bool 값 파싱 (대소문자 무시, 알 수 없는 값은 기본값)
fn bool_or<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| match v.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            CollectorConfig::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://localhost/halo")]))
                .unwrap();

        assert_eq!(config.sync.batch_size, 50);
        assert_eq!(config.sync.max_retries, 3);
        assert_eq!(config.sync.batch_delay(), Duration::from_millis(1000));
        assert_eq!(config.sync.fetch_timeout(), Duration::from_secs(60));
        assert!(config.sync.sync_stock_list);
        assert_eq!(config.bridge.python_path, "python3");
        assert_eq!(config.daemon.interval(), Duration::from_secs(3600));
    }

    #[test]
    fn test_overrides_and_invalid_values() {
        let config = CollectorConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/halo"),
            ("SYNC_BATCH_SIZE", "10"),
            ("SYNC_MAX_RETRIES", "abc"),
            ("SYNC_STOCK_LIST", "false"),
            ("STOCK_BRIDGE_DIR", "/opt/halo/stock"),
        ]))
        .unwrap();

        assert_eq!(config.sync.batch_size, 10);
        assert_eq!(config.sync.max_retries, 3);
        assert!(!config.sync.sync_stock_list);
        assert_eq!(config.bridge.package_dir, PathBuf::from("/opt/halo/stock"));

        let options = config.sync.to_options();
        assert_eq!(options.batch_size, 10);
        assert!(!options.sync_stock_list);
    }

    #[test]
    fn test_zero_daemon_interval_is_clamped() {
        let config = CollectorConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/halo"),
            ("DAEMON_INTERVAL_MINUTES", "0"),
        ]))
        .unwrap();

        assert_eq!(config.daemon.interval(), Duration::from_secs(60));

        let huge = DaemonConfig {
            interval_minutes: u64::MAX,
        };
        assert_eq!(huge.interval(), Duration::from_secs(u64::MAX));
    }

    #[tokio::test]
    async fn test_zero_daemon_interval_builds_ticker() {
        let config = CollectorConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/halo"),
            ("DAEMON_INTERVAL_MINUTES", "0"),
        ]))
        .unwrap();

        let interval = tokio::time::interval(config.daemon.interval());
        assert_eq!(interval.period(), Duration::from_secs(60));
    }

    #[test]
    fn test_bool_values_are_case_insensitive() {
        let parse = |value: &str| {
            CollectorConfig::from_lookup(lookup_from(&[
                ("DATABASE_URL", "postgres://localhost/halo"),
                ("SYNC_STOCK_LIST", value),
            ]))
            .unwrap()
            .sync
            .sync_stock_list
        };

        assert!(parse("TRUE"));
        assert!(parse("yes"));
        assert!(!parse("FALSE"));
        assert!(!parse("0"));
        // 알 수 없는 값은 기본값(true)
        assert!(parse("maybe"));
    }

    #[test]
    fn test_missing_database_url() {
        let err = CollectorConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }
}
