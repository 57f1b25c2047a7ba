//! 종목 모델.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 데이터 소스가 제공하는 종목 목록의 한 항목.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockInfo {
    /// 종목 코드 (예: "000001")
    pub symbol: String,
    /// 종목명
    pub name: String,
}

impl StockInfo {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
        }
    }

    /// 에러 메시지용 표기 (`000001(平安银行)`).
    pub fn label(&self) -> String {
        format!("{}({})", self.symbol, self.name)
    }
}

/// 종목별 정적 메타데이터.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDetail {
    /// 업종
    pub industry: Option<String>,
    /// 상장일
    pub list_date: Option<NaiveDate>,
    /// 총 발행주식수
    pub total_shares: Option<Decimal>,
    /// 유통주식수
    pub circulating_shares: Option<Decimal>,
}

/// 저장소에 새로 삽입할 종목 행.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStock {
    pub symbol: String,
    pub name: String,
    pub industry: Option<String>,
    pub list_date: Option<NaiveDate>,
    pub total_shares: Option<Decimal>,
    pub circulating_shares: Option<Decimal>,
}

impl NewStock {
    /// 목록 항목과 상세 정보를 합쳐 삽입 행을 만듭니다.
    pub fn from_parts(info: &StockInfo, detail: StockDetail) -> Self {
        Self {
            symbol: info.symbol.clone(),
            name: info.name.clone(),
            industry: detail.industry,
            list_date: detail.list_date,
            total_shares: detail.total_shares,
            circulating_shares: detail.circulating_shares,
        }
    }
}

/// 저장된 종목의 조회용 투영.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx-support", derive(sqlx::FromRow))]
pub struct StockRef {
    pub symbol: String,
    pub name: String,
}

impl StockRef {
    pub fn label(&self) -> String {
        format!("{}({})", self.symbol, self.name)
    }
}
