//! Binance spot kline (candlestick) API.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::client::{SourceClient, SourceConfig};
use super::errors::{Result, SourceError};

/// Public Binance spot API.
pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

const KLINES_PATH: &str = "/api/v3/klines";

/// Candle width.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[default]
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
}

impl Interval {
    /// Wire name, e.g. `1m`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::OneHour => "1h",
            Self::FourHours => "4h",
            Self::OneDay => "1d",
        }
    }

    /// Distance between consecutive candle open times.
    pub fn duration(self) -> TimeDelta {
        match self {
            Self::OneMinute => TimeDelta::minutes(1),
            Self::FiveMinutes => TimeDelta::minutes(5),
            Self::FifteenMinutes => TimeDelta::minutes(15),
            Self::OneHour => TimeDelta::hours(1),
            Self::FourHours => TimeDelta::hours(4),
            Self::OneDay => TimeDelta::days(1),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "1m" => Ok(Self::OneMinute),
            "5m" => Ok(Self::FiveMinutes),
            "15m" => Ok(Self::FifteenMinutes),
            "1h" => Ok(Self::OneHour),
            "4h" => Ok(Self::FourHours),
            "1d" => Ok(Self::OneDay),
            other => Err(SourceError::config(format!("unsupported kline interval '{other}'"))),
        }
    }
}

/// Window of a kline request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OhlcArgs {
    /// First candle open time, inclusive.
    pub start: DateTime<Utc>,
    /// Last candle open time, inclusive.
    pub end: Option<DateTime<Utc>>,
    /// Maximum number of candles; the exchange caps this at 1000.
    pub limit: Option<u32>,
}

/// One OHLC candle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    /// Open time, truncated to whole seconds.
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Anything that can serve OHLC candles.
#[async_trait]
pub trait CandleSource: Send + Sync {
    async fn ohlc(&self, symbol: &str, interval: Interval, args: &OhlcArgs) -> Result<Vec<Candle>>;
}

/// Client for `GET /api/v3/klines`.
#[derive(Debug, Clone)]
pub struct BinanceApi {
    client: SourceClient,
}

impl BinanceApi {
    pub fn new(config: SourceConfig) -> Result<Self> {
        Ok(Self::with_client(SourceClient::new(config)?))
    }

    pub fn with_client(client: SourceClient) -> Self {
        Self { client }
    }
}

/// Query pairs in the order the exchange documents them.
fn klines_query(symbol: &str, interval: Interval, args: &OhlcArgs) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("symbol", symbol.to_string()),
        ("interval", interval.as_str().to_string()),
        ("startTime", args.start.timestamp_millis().to_string()),
    ];
    if let Some(end) = args.end {
        query.push(("endTime", end.timestamp_millis().to_string()));
    }
    if let Some(limit) = args.limit {
        query.push(("limit", limit.to_string()));
    }
    query
}

#[async_trait]
impl CandleSource for BinanceApi {
    async fn ohlc(&self, symbol: &str, interval: Interval, args: &OhlcArgs) -> Result<Vec<Candle>> {
        let query = klines_query(symbol, interval, args);
        let rows: Vec<Vec<Value>> = self.client.get_json(KLINES_PATH, &query).await?;
        parse_klines(&rows)
    }
}

/// Decode kline rows.
///
/// Each row is `[openTime, open, high, low, close, ...]`; trailing fields
/// (volume, close time, trade counts) are ignored. A single malformed row
/// fails the whole page.
pub fn parse_klines(rows: &[Vec<Value>]) -> Result<Vec<Candle>> {
    rows.iter()
        .enumerate()
        .map(|(idx, row)| parse_row(row).map_err(|e| SourceError::decode(format!("kline {idx}: {e}"))))
        .collect()
}

fn parse_row(row: &[Value]) -> std::result::Result<Candle, String> {
    if row.len() < 5 {
        return Err(format!("expected at least 5 fields, got {}", row.len()));
    }

    let millis = row[0]
        .as_i64()
        .ok_or_else(|| format!("open time is not an integer: {}", row[0]))?;
    let open_time = DateTime::from_timestamp(millis.div_euclid(1000), 0)
        .ok_or_else(|| format!("open time out of range: {millis}"))?;

    Ok(Candle {
        open_time,
        open: price(&row[1], "open")?,
        high: price(&row[2], "high")?,
        low: price(&row[3], "low")?,
        close: price(&row[4], "close")?,
    })
}

fn price(value: &Value, field: &str) -> std::result::Result<f64, String> {
    let parsed = match value {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed
        .filter(|p| p.is_finite())
        .ok_or_else(|| format!("{field} is not a price: {value}"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::http::{HttpMethod, MockTransport};
    use serde_json::json;

    fn api(transport: &MockTransport) -> BinanceApi {
        let config = SourceConfig {
            requests_per_second: 1_000,
            ..SourceConfig::new(DEFAULT_BASE_URL)
        };
        BinanceApi::with_client(
            SourceClient::with_transport(config, Arc::new(transport.clone())).expect("client"),
        )
    }

    #[test]
    fn interval_round_trips_wire_names() {
        for interval in [Interval::OneMinute, Interval::OneHour, Interval::OneDay] {
            assert_eq!(interval.as_str().parse::<Interval>().expect("parse"), interval);
        }
        assert!("7m".parse::<Interval>().is_err());
        assert_eq!(Interval::FiveMinutes.duration(), TimeDelta::minutes(5));
    }

    #[tokio::test]
    async fn ohlc_builds_documented_query() {
        let transport = MockTransport::new();
        let url = "https://api.binance.com/api/v3/klines?symbol=TIAUSDT&interval=1m&startTime=1698710640000&limit=2";
        transport.push_json(
            HttpMethod::Get,
            url,
            r#"[[1698710640000,"3.10","3.20","3.00","3.15","1000"],[1698710700999,"3.15","3.30","3.10","3.25","900"]]"#,
        );

        let args = OhlcArgs {
            start: DateTime::from_timestamp(1_698_710_640, 0).expect("ts"),
            end: None,
            limit: Some(2),
        };
        let candles = api(&transport)
            .ohlc("TIAUSDT", Interval::OneMinute, &args)
            .await
            .expect("ohlc");

        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open_time.timestamp(), 1_698_710_640);
        assert_eq!(candles[0].close, 3.15);
        // sub-second part of openTime is dropped
        assert_eq!(candles[1].open_time.timestamp(), 1_698_710_700);
        assert_eq!(transport.requests()[0].url, url);
    }

    #[test]
    fn query_includes_end_time_when_set() {
        let args = OhlcArgs {
            start: DateTime::from_timestamp(60, 0).expect("ts"),
            end: Some(DateTime::from_timestamp(120, 0).expect("ts")),
            limit: None,
        };
        let query = klines_query("TIAUSDT", Interval::OneMinute, &args);
        let keys: Vec<_> = query.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, ["symbol", "interval", "startTime", "endTime"]);
        assert_eq!(query[3].1, "120000");
    }

    #[test]
    fn parse_accepts_numeric_prices() {
        let rows = vec![vec![json!(60_000), json!(1.5), json!(2), json!(1), json!(1.75)]];
        let candles = parse_klines(&rows).expect("numbers are accepted");
        assert_eq!(candles[0].high, 2.0);
        assert_eq!(candles[0].open_time.timestamp(), 60);
    }

    #[test]
    fn one_malformed_row_fails_the_page() {
        let rows = vec![
            vec![json!(60_000), json!("1"), json!("2"), json!("1"), json!("1.5")],
            vec![json!(120_000), json!("1"), json!("oops"), json!("1"), json!("1.5")],
        ];
        let err = parse_klines(&rows).expect_err("bad price");
        assert!(err.to_string().contains("kline 1"), "{err}");

        let short = vec![vec![json!(60_000), json!("1")]];
        assert!(parse_klines(&short).is_err());
    }
}
