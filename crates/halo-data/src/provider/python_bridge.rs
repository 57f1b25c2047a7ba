//! Python 데이터 패키지 브리지.
//!
//! 종목 데이터는 Python 패키지(`py`)가 제공하며, 각 함수는 JSON 문자열을
//! 출력합니다. 이 모듈은 호출마다 `python3 -c` 하위 프로세스를 띄우고
//! 표준출력을 `ApiResponse`로 해석합니다.
//!
//! | 함수 | 용도 |
//! |------|------|
//! | `get_all_stocks_info` | 전체 종목 목록 |
//! | `get_stock_individual_basic_info_xq` | 종목 상세 |
//! | `get_stock_history` | 기간별 일봉 (`YYYYMMDD`) |

use std::path::PathBuf;
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, warn};

use halo_core::{KlineBar, MarketDataSource, SourceError, StockDetail, StockInfo};

const FN_ALL_STOCKS: &str = "get_all_stocks_info";
const FN_STOCK_DETAIL: &str = "get_stock_individual_basic_info_xq";
const FN_STOCK_HISTORY: &str = "get_stock_history";

/// 데이터 소스 응답 봉투.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// 봉투를 `Result`로 변환합니다.
    pub fn into_result(self) -> Result<T, SourceError> {
        match (self.success, self.data) {
            (true, Some(data)) => Ok(data),
            (true, None) => Err(SourceError::Parse("success response without data".to_string())),
            (false, _) => Err(SourceError::Api(
                self.error.unwrap_or_else(|| "unknown error".to_string()),
            )),
        }
    }
}

/// 브리지 설정.
#[derive(Debug, Clone)]
pub struct PythonBridgeConfig {
    /// Python 실행 파일 경로
    pub python_path: String,
    /// `py` 패키지를 포함한 디렉터리
    pub package_dir: PathBuf,
    /// 호출당 타임아웃
    pub timeout: Duration,
}

impl Default for PythonBridgeConfig {
    fn default() -> Self {
        Self {
            python_path: "python3".to_string(),
            package_dir: PathBuf::from("."),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Python 하위 프로세스 기반 `MarketDataSource`.
#[derive(Debug, Clone)]
pub struct PythonBridgeSource {
    config: PythonBridgeConfig,
}

impl PythonBridgeSource {
    pub fn new(config: PythonBridgeConfig) -> Self {
        Self { config }
    }

    /// `python -c` 로 실행할 스크립트를 만듭니다.
    ///
    /// 인자는 JSON 리터럴로 렌더링합니다. 문자열/null 외의 값은 넘기지 않습니다.
    fn build_script(&self, function: &str, args: &[Value]) -> String {
        let dir = Value::String(self.config.package_dir.to_string_lossy().into_owned());
        let rendered: Vec<String> = args
            .iter()
            .map(|arg| match arg {
                Value::Null => "None".to_string(),
                other => other.to_string(),
            })
            .collect();

        format!(
            "import sys, warnings\n\
             warnings.filterwarnings('ignore')\n\
             sys.path.insert(0, {dir})\n\
             from py import {function}\n\
             print({function}({args}))\n",
            dir = dir,
            function = function,
            args = rendered.join(", "),
        )
    }

    async fn execute(&self, function: &str, args: &[Value]) -> Result<String, SourceError> {
        let script = self.build_script(function, args);

        let child = Command::new(&self.config.python_path)
            .arg("-c")
            .arg(&script)
            .current_dir(&self.config.package_dir)
            .env("PYTHONIOENCODING", "utf-8")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SourceError::Network(format!("failed to start python: {}", e)))?;

        // 타임아웃 시 future가 drop되며 kill_on_drop으로 프로세스 종료
        let output = tokio::time::timeout(self.config.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                SourceError::Timeout(format!(
                    "{} exceeded {}ms",
                    function,
                    self.config.timeout.as_millis()
                ))
            })?
            .map_err(|e| SourceError::Network(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::Api(format!(
                "{} exited with {}: {}",
                function,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(function, bytes = stdout.len(), "브리지 응답 수신");
        Ok(stdout)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        function: &str,
        args: &[Value],
    ) -> Result<T, SourceError> {
        let raw = self.execute(function, args).await?;
        parse_response(&raw)
    }
}

/// 브리지 출력 문자열을 해석합니다.
pub fn parse_response<T: DeserializeOwned>(raw: &str) -> Result<T, SourceError> {
    let response: ApiResponse<T> = match serde_json::from_str(raw) {
        Ok(response) => response,
        Err(e) => {
            // 라이브러리가 stdout에 남긴 잡음 뒤에 한 줄 JSON이 오는 경우
            let last_json_line = raw
                .lines()
                .rev()
                .find(|line| line.trim_start().starts_with('{'))
                .ok_or_else(|| SourceError::Parse(e.to_string()))?;
            serde_json::from_str(last_json_line).map_err(|e| SourceError::Parse(e.to_string()))?
        }
    };
    response.into_result()
}

/// 브리지가 반환하는 상세 정보 원본 (값 타입이 일정하지 않음).
#[derive(Debug, Deserialize)]
struct RawStockDetail {
    #[serde(default)]
    industry: Value,
    #[serde(default)]
    list_date: Value,
    #[serde(default)]
    total_shares: Value,
    #[serde(default)]
    circulating_shares: Value,
}

impl RawStockDetail {
    fn into_detail(self) -> StockDetail {
        StockDetail {
            industry: lenient_string(&self.industry),
            list_date: lenient_date(&self.list_date),
            total_shares: lenient_decimal(&self.total_shares),
            circulating_shares: lenient_decimal(&self.circulating_shares),
        }
    }
}

fn lenient_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() && s.trim() != "-" => Some(s.trim().to_string()),
        _ => None,
    }
}

fn lenient_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

/// `YYYYMMDD` (문자열/숫자) 또는 `YYYY-MM-DD`.
fn lenient_date(value: &Value) -> Option<NaiveDate> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };

    NaiveDate::parse_from_str(&text, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(&text, "%Y-%m-%d"))
        .ok()
}

#[async_trait]
impl MarketDataSource for PythonBridgeSource {
    async fn get_all_stocks_info(&self) -> Result<Vec<StockInfo>, SourceError> {
        self.call(FN_ALL_STOCKS, &[]).await
    }

    async fn get_stock_detail(&self, symbol: &str) -> Result<StockDetail, SourceError> {
        let raw: RawStockDetail = self
            .call(FN_STOCK_DETAIL, &[Value::String(symbol.to_string())])
            .await?;
        Ok(raw.into_detail())
    }

    async fn get_stock_history(
        &self,
        symbol: &str,
        start: Option<NaiveDate>,
        end: NaiveDate,
    ) -> Result<Vec<KlineBar>, SourceError> {
        let mut args = vec![Value::String(symbol.to_string())];
        // 시작일이 없으면 전체 이력 (브리지는 두 날짜가 모두 있을 때만 구간 조회)
        if let Some(start) = start {
            args.push(Value::String(start.format("%Y%m%d").to_string()));
            args.push(Value::String(end.format("%Y%m%d").to_string()));
        }

        let mut bars: Vec<KlineBar> = self.call(FN_STOCK_HISTORY, &args).await?;

        let before = bars.len();
        bars.retain(|b| b.date <= end);
        if bars.len() != before {
            warn!(symbol, dropped = before - bars.len(), "종료일 이후 일봉 제외");
        }
        Ok(bars)
    }

    fn source_name(&self) -> &str {
        "python-bridge"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_success_response() {
        let raw = r#"{"success": true, "data": [{"code": "000001", "name": "平安银行", "symbol": "000001", "market": "SZ"}], "timestamp": "2024-01-15T10:00:00"}"#;
        let stocks: Vec<StockInfo> = parse_response(raw).unwrap();
        assert_eq!(stocks, vec![StockInfo::new("000001", "平安银行")]);
    }

    #[test]
    fn test_parse_failure_response() {
        let raw = r#"{"success": false, "error": "股票代码不能为空", "timestamp": "2024-01-15T10:00:00"}"#;
        let err = parse_response::<Vec<StockInfo>>(raw).unwrap_err();
        assert!(matches!(err, SourceError::Api(msg) if msg == "股票代码不能为空"));
    }

    #[test]
    fn test_parse_skips_leading_noise() {
        let raw = "Downloading... 100%\n{\"success\": true, \"data\": []}";
        let bars: Vec<KlineBar> = parse_response(raw).unwrap();
        assert!(bars.is_empty());
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = parse_response::<Vec<StockInfo>>("Traceback (most recent call last)").unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));
    }

    #[test]
    fn test_raw_detail_is_lenient() {
        let raw = r#"{"success": true, "data": {
            "code": "000001", "name": "平安银行", "industry": "银行",
            "list_date": 19910403, "total_shares": 19405918198.0, "circulating_shares": ""
        }}"#;
        let detail = parse_response::<RawStockDetail>(raw).unwrap().into_detail();

        assert_eq!(detail.industry.as_deref(), Some("银行"));
        assert_eq!(detail.list_date, NaiveDate::from_ymd_opt(1991, 4, 3));
        assert_eq!(detail.total_shares, Some(dec!(19405918198)));
        assert!(detail.circulating_shares.is_none());
    }

    #[test]
    fn test_lenient_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 11);
        assert_eq!(lenient_date(&Value::String("20240111".into())), expected);
        assert_eq!(lenient_date(&Value::String("2024-01-11".into())), expected);
        assert_eq!(lenient_date(&Value::String("".into())), None);
        assert_eq!(lenient_date(&Value::Null), None);
    }

    #[test]
    fn test_build_script_renders_args() {
        let source = PythonBridgeSource::new(PythonBridgeConfig {
            package_dir: PathBuf::from("/opt/halo/stock"),
            ..Default::default()
        });
        let script = source.build_script(
            FN_STOCK_HISTORY,
            &[
                Value::String("000001".into()),
                Value::String("20240111".into()),
                Value::String("20240115".into()),
            ],
        );

        assert!(script.contains("sys.path.insert(0, \"/opt/halo/stock\")"));
        assert!(script.contains("from py import get_stock_history"));
        assert!(script.contains("print(get_stock_history(\"000001\", \"20240111\", \"20240115\"))"));
    }
}
