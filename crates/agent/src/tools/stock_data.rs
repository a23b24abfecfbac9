use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info};

use super::{parse_input, Tool, ToolError};
use crate::llm::ToolSpec;

pub const TOOL_NAME: &str = "stock_data_lookup";

pub const PRICE_COLUMNS: [&str; 8] =
    ["Date", "Open", "High", "Low", "Close", "Volume", "Dividends", "Stock Splits"];

#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("market data transport error: {0}")]
    Transport(String),
    #[error("market data provider returned status {0}")]
    Status(u16),
    #[error("market data decode error: {0}")]
    Decode(String),
    #[error("no price history for `{0}`")]
    NoData(String),
}

/// Daily price history in split orientation: column names plus row data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    pub columns: Vec<String>,
    pub data: Vec<Vec<Value>>,
}

#[async_trait]
pub trait MarketData: Send + Sync {
    /// One month of daily bars for `ticker`.
    async fn monthly_history(&self, ticker: &str) -> Result<PriceTable, MarketDataError>;
}

#[async_trait]
impl<M: MarketData + ?Sized> MarketData for std::sync::Arc<M> {
    async fn monthly_history(&self, ticker: &str) -> Result<PriceTable, MarketDataError> {
        (**self).monthly_history(ticker).await
    }
}

/// Reads the public chart endpoint that backs Yahoo Finance pages.
pub struct YahooChartClient {
    client: Client,
    endpoint: String,
}

impl YahooChartClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, MarketDataError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (compatible; switchboard)")
            .build()
            .map_err(|error| MarketDataError::Transport(error.to_string()))?;
        Ok(Self { client, endpoint: endpoint.into().trim_end_matches('/').to_string() })
    }
}

#[derive(Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
    #[serde(default)]
    events: ChartEvents,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i32,
}

#[derive(Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Default, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Default, Deserialize)]
struct ChartEvents {
    #[serde(default)]
    dividends: HashMap<String, DividendEvent>,
    #[serde(default)]
    splits: HashMap<String, SplitEvent>,
}

#[derive(Deserialize)]
struct DividendEvent {
    amount: f64,
    date: i64,
}

#[derive(Deserialize)]
struct SplitEvent {
    numerator: f64,
    denominator: f64,
    date: i64,
}

fn iso_date(timestamp: i64, offset: &FixedOffset) -> Value {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|at| at.with_timezone(offset).format("%Y-%m-%dT%H:%M:%S%.3f%:z").to_string())
        .map_or(Value::Null, Value::String)
}

fn value_at<T: Into<Value> + Copy>(series: &[Option<T>], index: usize) -> Value {
    series.get(index).copied().flatten().map_or(Value::Null, Into::into)
}

fn same_day(left: i64, right: i64) -> bool {
    left.div_euclid(86_400) == right.div_euclid(86_400)
}

fn into_table(result: ChartResult) -> PriceTable {
    let offset = FixedOffset::east_opt(result.meta.gmtoffset).unwrap_or_else(|| Utc.fix());
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let data = result
        .timestamp
        .iter()
        .enumerate()
        .map(|(index, &timestamp)| {
            let dividend = result
                .events
                .dividends
                .values()
                .find(|event| same_day(event.date, timestamp))
                .map_or(0.0, |event| event.amount);
            let split = result
                .events
                .splits
                .values()
                .find(|event| same_day(event.date, timestamp) && event.denominator != 0.0)
                .map_or(0.0, |event| event.numerator / event.denominator);

            vec![
                iso_date(timestamp, &offset),
                value_at(&quote.open, index),
                value_at(&quote.high, index),
                value_at(&quote.low, index),
                value_at(&quote.close, index),
                value_at(&quote.volume, index),
                json!(dividend),
                json!(split),
            ]
        })
        .collect();

    PriceTable { columns: PRICE_COLUMNS.iter().map(|column| column.to_string()).collect(), data }
}

#[async_trait]
impl MarketData for YahooChartClient {
    async fn monthly_history(&self, ticker: &str) -> Result<PriceTable, MarketDataError> {
        let response = self
            .client
            .get(format!("{}/v8/finance/chart/{ticker}", self.endpoint))
            .query(&[("range", "1mo"), ("interval", "1d"), ("events", "div,splits")])
            .send()
            .await
            .map_err(|error| MarketDataError::Transport(error.to_string()))?;

        if !response.status().is_success() {
            return Err(MarketDataError::Status(response.status().as_u16()));
        }

        let envelope: ChartEnvelope =
            response.json().await.map_err(|error| MarketDataError::Decode(error.to_string()))?;
        let result = envelope
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| MarketDataError::NoData(ticker.to_string()))?;

        Ok(into_table(result))
    }
}

#[derive(Deserialize)]
struct StockDataInput {
    ticker: String,
}

/// `stock_data_lookup`: recent price history for one ticker.
pub struct StockDataLookupTool<M> {
    market_data: M,
}

impl<M: MarketData> StockDataLookupTool<M> {
    pub fn new(market_data: M) -> Self {
        Self { market_data }
    }
}

#[async_trait]
impl<M: MarketData + 'static> Tool for StockDataLookupTool<M> {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: TOOL_NAME.to_string(),
            description: "Finding stock price history for specific stocks. Returns one month of \
                          daily prices as JSON."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "ticker": {"type": "string", "description": "The ticker of stock."}
                },
                "required": ["ticker"]
            }),
        }
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        let input: StockDataInput = parse_input(TOOL_NAME, input)?;
        info!(event_name = "tool.stock_data.lookup", ticker = %input.ticker, "looking up prices");

        match self.market_data.monthly_history(&input.ticker).await {
            Ok(table) => serde_json::to_string(&table).or_else(|error| {
                error!(
                    event_name = "tool.stock_data.encode_failed",
                    error = %error,
                    "could not encode price history"
                );
                Ok(String::new())
            }),
            Err(error) => {
                error!(
                    event_name = "tool.stock_data.failed",
                    ticker = %input.ticker,
                    error = %error,
                    "price history lookup failed"
                );
                Ok(String::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{MarketData, StockDataLookupTool, YahooChartClient};
    use crate::tools::Tool;

    fn chart_body() -> serde_json::Value {
        json!({
            "chart": {
                "result": [{
                    "meta": {"gmtoffset": -18000},
                    "timestamp": [1717767000, 1718026200],
                    "indicators": {"quote": [{
                        "open": [194.65, 196.9],
                        "high": [196.94, 197.3],
                        "low": [194.14, 192.15],
                        "close": [196.89, null],
                        "volume": [53103900, 97262100]
                    }]},
                    "events": {"dividends": {"1717767000": {"amount": 0.25, "date": 1717767000}}}
                }],
                "error": null
            }
        })
    }

    #[tokio::test]
    async fn chart_response_becomes_split_table() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .and(query_param("range", "1mo"))
            .and(query_param("interval", "1d"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chart_body()))
            .mount(&server)
            .await;

        let client = YahooChartClient::new(server.uri(), Duration::from_secs(5)).expect("client");
        let table = client.monthly_history("AAPL").await.expect("table");

        assert_eq!(table.columns[0], "Date");
        assert_eq!(table.columns[7], "Stock Splits");
        assert_eq!(table.data.len(), 2);
        assert_eq!(table.data[0][0], json!("2024-06-07T08:30:00.000-05:00"));
        assert_eq!(table.data[0][4], json!(196.89));
        assert_eq!(table.data[0][6], json!(0.25));
        assert_eq!(table.data[1][4], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn provider_failures_yield_empty_output() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = YahooChartClient::new(server.uri(), Duration::from_secs(5)).expect("client");
        let tool = StockDataLookupTool::new(client);

        assert_eq!(tool.execute(json!({"ticker": "NOPE"})).await, Ok(String::new()));
        assert!(tool.execute(json!({})).await.is_err());
    }
}
