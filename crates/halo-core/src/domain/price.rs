//! 일봉(OHLCV) 모델.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 데이터 소스가 반환하는 일봉 한 개.
///
/// 숫자 필드는 수신 시점에 `Decimal`로 변환됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KlineBar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    #[serde(default)]
    pub volume: Option<Decimal>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    /// 등락률 (%)
    #[serde(default)]
    pub pct_change: Option<Decimal>,
    /// 회전율 (%)
    #[serde(default)]
    pub turnover: Option<Decimal>,
}

/// 저장소에 새로 삽입할 가격 행.
///
/// `(symbol, trade_date)`는 저장소 전체에서 유일합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPriceBar {
    pub symbol: String,
    pub trade_date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Option<Decimal>,
    pub amount: Option<Decimal>,
    pub change_percent: Option<Decimal>,
    pub turnover: Option<Decimal>,
}

impl NewPriceBar {
    pub fn from_kline(symbol: &str, bar: &KlineBar) -> Self {
        Self {
            symbol: symbol.to_string(),
            trade_date: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            amount: bar.amount,
            change_percent: bar.pct_change,
            turnover: bar.turnover,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_kline_deserialize_numbers_and_missing_fields() {
        let json = r#"{
            "date": "2024-01-11",
            "open": 10.5,
            "high": 10.92,
            "low": 10.31,
            "close": "10.88",
            "volume": 1520034
        }"#;

        let bar: KlineBar = serde_json::from_str(json).unwrap();
        assert_eq!(bar.date, NaiveDate::from_ymd_opt(2024, 1, 11).unwrap());
        assert_eq!(bar.close, dec!(10.88));
        assert_eq!(bar.volume, Some(dec!(1520034)));
        assert!(bar.amount.is_none());
        assert!(bar.turnover.is_none());
    }

    #[test]
    fn test_price_bar_from_kline() {
        let bar = KlineBar {
            date: NaiveDate::from_ymd_opt(2024, 1, 12).unwrap(),
            open: dec!(9.8),
            high: dec!(10.1),
            low: dec!(9.7),
            close: dec!(10.0),
            volume: None,
            amount: Some(dec!(123456.78)),
            pct_change: Some(dec!(-1.25)),
            turnover: Some(dec!(0.42)),
        };

        let row = NewPriceBar::from_kline("000001", &bar);
        assert_eq!(row.symbol, "000001");
        assert_eq!(row.trade_date, bar.date);
        assert_eq!(row.change_percent, Some(dec!(-1.25)));
        assert_eq!(row.amount, Some(dec!(123456.78)));
    }
}
