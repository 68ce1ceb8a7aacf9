use crate::types::{PricePoint, StockSnapshot};
use crate::PriceSource;
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use stocksense_core::{ConfigError, CoreError, MarketDataError, MarketSettings};
use tracing::{debug, info, warn};

pub const YAHOO_FINANCE_URL: &str = "https://query1.finance.yahoo.com";
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; stocksense/0.1)";

#[derive(Debug, Clone)]
pub struct MarketDataConfig {
    pub base_url: String,
    pub range: String,
    pub interval: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            base_url: YAHOO_FINANCE_URL.to_string(),
            range: "1mo".to_string(),
            interval: "1d".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 15,
        }
    }
}

impl MarketDataConfig {
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

impl From<&MarketSettings> for MarketDataConfig {
    fn from(settings: &MarketSettings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            range: settings.range.clone(),
            interval: settings.interval.clone(),
            ..Self::default()
        }
    }
}

// Chart endpoint payload, reduced to the fields we read.

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    symbol: Option<String>,
    currency: Option<String>,
    regular_market_price: Option<f64>,
    previous_close: Option<f64>,
    chart_previous_close: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug)]
pub struct YahooFinanceClient {
    http_client: Client,
    config: MarketDataConfig,
}

impl YahooFinanceClient {
    pub fn new(config: MarketDataConfig) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(CoreError::Network)?;

        Ok(Self {
            http_client,
            config,
        })
    }

    /// `{base}/v8/finance/chart/{symbol}` with the symbol escaped as a single path segment.
    fn chart_url(&self, symbol: &str) -> Result<Url, CoreError> {
        let invalid = || ConfigError::InvalidValue {
            field: "market.base_url".to_string(),
            value: self.config.base_url.clone(),
        };

        let mut url = Url::parse(&self.config.base_url).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol]);
        Ok(url)
    }

    async fn fetch_chart(&self, symbol: &str) -> Result<StockSnapshot, CoreError> {
        let url = self.chart_url(symbol)?;
        debug!("Fetching price chart for {}", symbol);

        let response = self
            .http_client
            .get(url)
            .query(&[
                ("range", self.config.range.as_str()),
                ("interval", self.config.interval.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        let envelope: ChartEnvelope = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(_) if status == StatusCode::NOT_FOUND => {
                return Err(MarketDataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                }
                .into())
            }
            Err(_) if !status.is_success() => {
                return Err(MarketDataError::ProviderRejected {
                    status_code: status.as_u16(),
                }
                .into())
            }
            Err(e) => {
                return Err(MarketDataError::InvalidResponse {
                    details: e.to_string(),
                }
                .into())
            }
        };

        snapshot_from_chart(symbol, envelope.chart, status)
    }
}

#[async_trait]
impl PriceSource for YahooFinanceClient {
    async fn fetch_quote(&self, symbol: &str) -> Result<StockSnapshot, CoreError> {
        let snapshot = self.fetch_chart(symbol).await?;
        info!(
            "Fetched {} price points for {} (last {:.2})",
            snapshot.history.len(),
            snapshot.symbol,
            snapshot.current_price
        );
        Ok(snapshot)
    }
}

fn snapshot_from_chart(
    symbol: &str,
    chart: ChartBody,
    status: StatusCode,
) -> Result<StockSnapshot, CoreError> {
    if let Some(error) = chart.error {
        warn!("Price provider error for {}: {} {}", symbol, error.code, error.description);
        return Err(if error.code.eq_ignore_ascii_case("Not Found") {
            MarketDataError::SymbolNotFound {
                symbol: symbol.to_string(),
            }
        } else {
            MarketDataError::InvalidResponse {
                details: format!("{}: {}", error.code, error.description),
            }
        }
        .into());
    }

    if !status.is_success() {
        return Err(MarketDataError::ProviderRejected {
            status_code: status.as_u16(),
        }
        .into());
    }

    let result = chart
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| MarketDataError::SymbolNotFound {
            symbol: symbol.to_string(),
        })?;

    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|series| series.close)
        .unwrap_or_default();

    let history: Vec<PricePoint> = result
        .timestamp
        .iter()
        .zip(closes)
        .filter_map(|(timestamp, close)| {
            let close = close.filter(|c| c.is_finite())?;
            let date = DateTime::from_timestamp(*timestamp, 0)?.date_naive();
            Some(PricePoint { date, close })
        })
        .collect();

    let meta = result.meta;
    let current_price = meta
        .regular_market_price
        .or_else(|| history.last().map(|point| point.close))
        .ok_or_else(|| MarketDataError::InvalidResponse {
            details: format!("no price available for {}", symbol),
        })?;
    let previous_close = meta
        .previous_close
        .or(meta.chart_previous_close)
        .or_else(|| history.iter().rev().nth(1).map(|point| point.close));

    Ok(StockSnapshot::new(
        meta.symbol.unwrap_or_else(|| symbol.to_string()),
        meta.currency,
        current_price,
        previous_close,
        history,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> YahooFinanceClient {
        YahooFinanceClient::new(MarketDataConfig::default().with_base_url(server.uri())).unwrap()
    }

    #[test]
    fn test_config_from_settings() {
        let settings = MarketSettings {
            base_url: "http://localhost:9000".to_string(),
            range: "5d".to_string(),
            interval: "1h".to_string(),
        };
        let config = MarketDataConfig::from(&settings);
        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.range, "5d");
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[tokio::test]
    async fn test_fetch_quote_builds_snapshot() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/ABC"))
            .and(query_param("range", "1mo"))
            .and(query_param("interval", "1d"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "chart": {
                    "result": [{
                        "meta": {
                            "symbol": "ABC",
                            "currency": "USD",
                            "regularMarketPrice": 105.0,
                            "chartPreviousClose": 100.0
                        },
                        "timestamp": [1709856000, 1709942400, 1710201600],
                        "indicators": {"quote": [{"close": [101.5, null, 104.25]}]}
                    }],
                    "error": null
                }
            })))
            .mount(&server)
            .await;

        let snapshot = client(&server).fetch_quote("ABC").await.unwrap();

        assert_eq!(snapshot.symbol, "ABC");
        assert_eq!(snapshot.currency.as_deref(), Some("USD"));
        assert_eq!(snapshot.current_price, 105.0);
        assert_eq!(snapshot.previous_close, Some(100.0));
        assert_eq!(snapshot.change, Some(5.0));
        assert_eq!(snapshot.history.len(), 2);
        assert_eq!(snapshot.history[0].date.to_string(), "2024-03-08");
        assert_eq!(snapshot.history[1].close, 104.25);
    }

    #[tokio::test]
    async fn test_unknown_symbol() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/NOPE"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "chart": {
                    "result": null,
                    "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
                }
            })))
            .mount(&server)
            .await;

        let err = client(&server).fetch_quote("NOPE").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::MarketData(MarketDataError::SymbolNotFound { ref symbol }) if symbol == "NOPE"
        ));
    }

    #[tokio::test]
    async fn test_provider_rejection_and_garbage() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/BUSY"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Too Many Requests"))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/ODD"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let client = client(&server);

        let err = client.fetch_quote("BUSY").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::MarketData(MarketDataError::ProviderRejected { status_code: 429 })
        ));

        let err = client.fetch_quote("ODD").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::MarketData(MarketDataError::InvalidResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_symbol_is_escaped_in_path() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/BRK%2FB%3Fx"))
            .and(query_param("range", "1mo"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "chart": {"result": null, "error": {"code": "Not Found", "description": ""}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).fetch_quote("BRK/B?x").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::MarketData(MarketDataError::SymbolNotFound { .. })
        ));
    }

    #[test]
    fn test_chart_url_rejects_bad_base() {
        let client =
            YahooFinanceClient::new(MarketDataConfig::default().with_base_url("not a url")).unwrap();
        assert!(matches!(
            client.chart_url("ABC"),
            Err(CoreError::Config(ConfigError::InvalidValue { .. }))
        ));

        let client = YahooFinanceClient::new(
            MarketDataConfig::default().with_base_url("http://localhost:9000/"),
        )
        .unwrap();
        assert_eq!(
            client.chart_url("ABC").unwrap().as_str(),
            "http://localhost:9000/v8/finance/chart/ABC"
        );
    }

    #[test]
    fn test_price_falls_back_to_history() {
        let chart: ChartBody = serde_json::from_value(json!({
            "result": [{
                "meta": {},
                "timestamp": [1709856000, 1709942400],
                "indicators": {"quote": [{"close": [10.0, 12.0]}]}
            }],
            "error": null
        }))
        .unwrap();

        let snapshot = snapshot_from_chart("XYZ", chart, StatusCode::OK).unwrap();
        assert_eq!(snapshot.symbol, "XYZ");
        assert_eq!(snapshot.current_price, 12.0);
        assert_eq!(snapshot.previous_close, Some(10.0));
        assert_eq!(snapshot.currency, None);
    }

    #[test]
    fn test_empty_result_is_not_found() {
        let chart: ChartBody =
            serde_json::from_value(json!({"result": [], "error": null})).unwrap();
        assert!(matches!(
            snapshot_from_chart("XYZ", chart, StatusCode::OK),
            Err(CoreError::MarketData(MarketDataError::SymbolNotFound { .. }))
        ));
    }
}
