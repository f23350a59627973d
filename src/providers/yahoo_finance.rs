use crate::core::market::{
    DividendPayment, DividendProfile, MarketDataError, MarketDataSource, RawQuote,
};
use crate::providers::util::with_retry;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// (range, interval) pairs tried in order: intraday, daily, then a few days
/// back so a closed market still yields its last close.
const QUOTE_WINDOWS: [(&str, &str); 3] = [("1d", "5m"), ("1d", "1d"), ("5d", "1d")];
const RATE_WINDOWS: [(&str, &str); 2] = [("1d", "1d"), ("5d", "1d")];

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub quote_retries: usize,
    pub index_retries: usize,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            quote_retries: 2,
            index_retries: 1,
            delay_ms: 500,
        }
    }
}

pub struct YahooFinanceProvider {
    base_url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl YahooFinanceProvider {
    pub fn new(base_url: &str, retry: RetryPolicy) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("wonfolio/1.0")
            .build()
            .unwrap_or_default();
        YahooFinanceProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            retry,
        }
    }

    fn chart_url(&self, symbol: &str, range: &str, interval: &str) -> String {
        format!(
            "{}/v8/finance/chart/{}?interval={}&range={}",
            self.base_url, symbol, interval, range
        )
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        symbol: &str,
        url: &str,
        retries: usize,
    ) -> Result<T, MarketDataError> {
        debug!("Requesting market data from {}", url);
        let http_error = |source| MarketDataError::Http {
            symbol: symbol.to_string(),
            source,
        };

        let response = with_retry(
            || async { self.client.get(url).send().await?.error_for_status() },
            retries,
            self.retry.delay_ms,
        )
        .await
        .map_err(http_error)?;

        let text = response.text().await.map_err(http_error)?;
        serde_json::from_str(&text).map_err(|e| MarketDataError::Decode {
            symbol: symbol.to_string(),
            message: e.to_string(),
        })
    }

    /// Walks `windows` until one returns a close. Transport failures end the
    /// walk immediately since a wider window will not fix them.
    async fn latest_close(
        &self,
        symbol: &str,
        windows: &[(&str, &str)],
        retries: usize,
    ) -> Result<(ChartMeta, f64), MarketDataError> {
        for (range, interval) in windows {
            let url = self.chart_url(symbol, range, interval);
            let item = match self.get_json::<YahooChartResponse>(symbol, &url, retries).await {
                Ok(data) => data.chart.into_first(),
                Err(e @ MarketDataError::Http { .. }) => return Err(e),
                Err(e) => {
                    debug!("Window {range}/{interval} unusable for {symbol}: {e}");
                    continue;
                }
            };

            match item {
                Some(item) => {
                    if let Some(close) = item.closes().last() {
                        return Ok((item.meta, *close));
                    }
                    debug!("No closes for {symbol} in {range}/{interval} window");
                }
                None => debug!("Empty chart result for {symbol} in {range}/{interval} window"),
            }
        }
        Err(MarketDataError::NoPrice(symbol.to_string()))
    }
}

#[derive(Deserialize, Debug)]
struct YahooChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
}

impl ChartResult {
    fn into_first(self) -> Option<ChartItem> {
        self.result.and_then(|items| items.into_iter().next())
    }
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    meta: ChartMeta,
    indicators: Option<Indicators>,
    events: Option<ChartEvents>,
}

impl ChartItem {
    fn closes(&self) -> Vec<f64> {
        self.indicators
            .as_ref()
            .and_then(|inds| inds.quote.first())
            .and_then(|q| q.close.as_ref())
            .map(|closes| {
                closes
                    .iter()
                    .flatten()
                    .copied()
                    .filter(|c| c.is_finite())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Deserialize, Debug, Default)]
struct ChartMeta {
    currency: Option<String>,
    #[serde(rename = "shortName")]
    short_name: Option<String>,
    #[serde(rename = "longName")]
    long_name: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<QuoteIndicator>,
}

#[derive(Deserialize, Debug)]
struct QuoteIndicator {
    close: Option<Vec<Option<f64>>>,
}

#[derive(Deserialize, Debug)]
struct ChartEvents {
    #[serde(default)]
    dividends: HashMap<String, DividendEvent>,
}

#[derive(Deserialize, Debug)]
struct DividendEvent {
    amount: f64,
    date: i64,
}

#[derive(Deserialize, Debug)]
struct YahooSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: SummaryResult,
}

#[derive(Deserialize, Debug)]
struct SummaryResult {
    result: Option<Vec<SummaryItem>>,
}

#[derive(Deserialize, Debug)]
struct SummaryItem {
    #[serde(rename = "summaryDetail")]
    summary_detail: Option<SummaryDetail>,
}

#[derive(Deserialize, Debug, Default)]
struct SummaryDetail {
    #[serde(rename = "dividendRate", default)]
    dividend_rate: RawValue,
    #[serde(rename = "trailingAnnualDividendRate", default)]
    trailing_annual_dividend_rate: RawValue,
    #[serde(rename = "dividendYield", default)]
    dividend_yield: RawValue,
    #[serde(rename = "previousClose", default)]
    previous_close: RawValue,
}

/// Yahoo wraps numbers as `{"raw": 0.96, "fmt": "0.96"}`, or `{}` when absent.
#[derive(Deserialize, Debug, Default)]
struct RawValue {
    raw: Option<f64>,
}

#[async_trait]
impl MarketDataSource for YahooFinanceProvider {
    #[instrument(name = "YahooQuoteFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_quote(&self, symbol: &str) -> Result<RawQuote, MarketDataError> {
        let (meta, price) = self
            .latest_close(symbol, &QUOTE_WINDOWS, self.retry.quote_retries)
            .await?;

        Ok(RawQuote {
            price,
            currency: meta.currency.unwrap_or_else(|| "USD".to_string()),
            name: meta.short_name.or(meta.long_name),
        })
    }

    #[instrument(name = "YahooRateFetch", skip(self), fields(pair = %pair))]
    async fn fetch_exchange_rate(&self, pair: &str) -> Result<f64, MarketDataError> {
        let (_, rate) = self
            .latest_close(pair, &RATE_WINDOWS, self.retry.quote_retries)
            .await?;
        if rate <= 0.0 {
            return Err(MarketDataError::Decode {
                symbol: pair.to_string(),
                message: format!("non-positive rate {rate}"),
            });
        }
        Ok(rate)
    }

    async fn fetch_recent_closes(&self, symbol: &str) -> Result<Vec<f64>, MarketDataError> {
        let url = self.chart_url(symbol, "5d", "1d");
        let data: YahooChartResponse = self
            .get_json(symbol, &url, self.retry.index_retries)
            .await?;
        let item = data
            .chart
            .into_first()
            .ok_or_else(|| MarketDataError::EmptyResult(symbol.to_string()))?;
        Ok(item.closes())
    }

    #[instrument(name = "YahooDividendFetch", skip(self), fields(symbol = %symbol))]
    async fn fetch_dividend_profile(
        &self,
        symbol: &str,
    ) -> Result<DividendProfile, MarketDataError> {
        let url = format!(
            "{}/v10/finance/quoteSummary/{}?modules=summaryDetail",
            self.base_url, symbol
        );
        let data: YahooSummaryResponse = self
            .get_json(symbol, &url, self.retry.quote_retries)
            .await?;

        let detail = data
            .quote_summary
            .result
            .and_then(|items| items.into_iter().next())
            .ok_or_else(|| MarketDataError::EmptyResult(symbol.to_string()))?
            .summary_detail
            .unwrap_or_default();

        Ok(DividendProfile {
            dividend_rate: detail.dividend_rate.raw,
            trailing_annual_rate: detail.trailing_annual_dividend_rate.raw,
            yield_pct: detail.dividend_yield.raw.map(|y| y * 100.0),
            price: detail.previous_close.raw,
        })
    }

    async fn fetch_dividend_history(
        &self,
        symbol: &str,
    ) -> Result<Vec<DividendPayment>, MarketDataError> {
        let url = format!("{}&events=div", self.chart_url(symbol, "10y", "1mo"));
        let data: YahooChartResponse = self
            .get_json(symbol, &url, self.retry.quote_retries)
            .await?;
        let item = data
            .chart
            .into_first()
            .ok_or_else(|| MarketDataError::EmptyResult(symbol.to_string()))?;

        let mut payments: Vec<DividendPayment> = item
            .events
            .map(|events| events.dividends.into_values().collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|event| {
                Utc.timestamp_opt(event.date, 0)
                    .single()
                    .map(|dt| DividendPayment {
                        date: dt.date_naive(),
                        amount: event.amount,
                    })
            })
            .collect();
        payments.sort_by_key(|p| p.date);
        debug!("Found {} dividend payments for {}", payments.len(), symbol);
        Ok(payments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn no_delay() -> RetryPolicy {
        RetryPolicy {
            quote_retries: 2,
            index_retries: 1,
            delay_ms: 0,
        }
    }

    fn chart_body(currency: &str, name: &str, closes: &str) -> String {
        format!(
            r#"{{
                "chart": {{
                    "result": [{{
                        "meta": {{ "currency": "{currency}", "shortName": "{name}" }},
                        "timestamp": [1700000000, 1700086400],
                        "indicators": {{ "quote": [{{ "close": {closes} }}] }}
                    }}]
                }}
            }}"#
        )
    }

    async fn mount_chart(server: &MockServer, symbol: &str, range: &str, interval: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/v8/finance/chart/{symbol}")))
            .and(query_param("range", range))
            .and(query_param("interval", interval))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_successful_quote_fetch() {
        let mock_server = MockServer::start().await;
        mount_chart(
            &mock_server,
            "AAPL",
            "1d",
            "5m",
            &chart_body("USD", "Apple Inc.", "[189.1, null, 190.25]"),
        )
        .await;

        let provider = YahooFinanceProvider::new(&mock_server.uri(), no_delay());
        let quote = provider.fetch_quote("AAPL").await.unwrap();

        assert_eq!(quote.price, 190.25);
        assert_eq!(quote.currency, "USD");
        assert_eq!(quote.name.as_deref(), Some("Apple Inc."));
    }

    #[tokio::test]
    async fn test_quote_falls_back_to_wider_window() {
        let mock_server = MockServer::start().await;
        mount_chart(&mock_server, "SCHD", "1d", "5m", &chart_body("USD", "Schwab", "[]")).await;
        mount_chart(&mock_server, "SCHD", "1d", "1d", r#"{"chart": {"result": []}}"#).await;
        mount_chart(
            &mock_server,
            "SCHD",
            "5d",
            "1d",
            &chart_body("USD", "Schwab", "[27.5, 27.8]"),
        )
        .await;

        let provider = YahooFinanceProvider::new(&mock_server.uri(), no_delay());
        let quote = provider.fetch_quote("SCHD").await.unwrap();
        assert_eq!(quote.price, 27.8);
    }

    #[tokio::test]
    async fn test_quote_with_no_data_in_any_window() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/NOPE"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"chart": {"result": null}}"#))
            .mount(&mock_server)
            .await;

        let provider = YahooFinanceProvider::new(&mock_server.uri(), no_delay());
        let result = provider.fetch_quote("NOPE").await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "No price available for NOPE in any lookback window"
        );
    }

    #[tokio::test]
    async fn test_quote_server_error_is_retried_then_reported() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&mock_server)
            .await;

        let provider = YahooFinanceProvider::new(&mock_server.uri(), no_delay());
        let result = provider.fetch_quote("AAPL").await;
        assert!(matches!(result, Err(MarketDataError::Http { .. })));
    }

    #[tokio::test]
    async fn test_successful_rate_fetch() {
        let mock_server = MockServer::start().await;
        mount_chart(
            &mock_server,
            "KRW=X",
            "1d",
            "1d",
            &chart_body("KRW", "USD/KRW", "[1378.2]"),
        )
        .await;

        let provider = YahooFinanceProvider::new(&mock_server.uri(), no_delay());
        let rate = provider.fetch_exchange_rate("KRW=X").await.unwrap();
        assert_eq!(rate, 1378.2);
    }

    #[tokio::test]
    async fn test_malformed_rate_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/KRW=X"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"charts": {}}"#))
            .mount(&mock_server)
            .await;

        let provider = YahooFinanceProvider::new(&mock_server.uri(), no_delay());
        assert!(provider.fetch_exchange_rate("KRW=X").await.is_err());
    }

    #[tokio::test]
    async fn test_recent_closes_skip_missing_values() {
        let mock_server = MockServer::start().await;
        mount_chart(
            &mock_server,
            "SPY",
            "5d",
            "1d",
            &chart_body("USD", "SPDR", "[5000.0, null, 5050.0, 5025.0]"),
        )
        .await;

        let provider = YahooFinanceProvider::new(&mock_server.uri(), no_delay());
        let closes = provider.fetch_recent_closes("SPY").await.unwrap();
        assert_eq!(closes, vec![5000.0, 5050.0, 5025.0]);
    }

    #[tokio::test]
    async fn test_dividend_profile_fetch() {
        let mock_server = MockServer::start().await;
        let body = r#"{
            "quoteSummary": {
                "result": [{
                    "summaryDetail": {
                        "dividendRate": {"raw": 2.64, "fmt": "2.64"},
                        "trailingAnnualDividendRate": {},
                        "dividendYield": {"raw": 0.0345, "fmt": "3.45%"},
                        "previousClose": {"raw": 76.5}
                    }
                }],
                "error": null
            }
        }"#;
        Mock::given(method("GET"))
            .and(path("/v10/finance/quoteSummary/SCHD"))
            .and(query_param("modules", "summaryDetail"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;

        let provider = YahooFinanceProvider::new(&mock_server.uri(), no_delay());
        let profile = provider.fetch_dividend_profile("SCHD").await.unwrap();

        assert_eq!(profile.dividend_rate, Some(2.64));
        assert_eq!(profile.trailing_annual_rate, None);
        assert!((profile.yield_pct.unwrap() - 3.45).abs() < 1e-9);
        assert_eq!(profile.price, Some(76.5));
    }

    #[tokio::test]
    async fn test_dividend_history_fetch() {
        let mock_server = MockServer::start().await;
        let body = r#"{
            "chart": {
                "result": [{
                    "meta": {"currency": "USD"},
                    "events": {
                        "dividends": {
                            "1703203200": {"amount": 0.24, "date": 1703203200},
                            "1679529600": {"amount": 0.23, "date": 1679529600}
                        }
                    }
                }]
            }
        }"#;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .and(query_param("events", "div"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;

        let provider = YahooFinanceProvider::new(&mock_server.uri(), no_delay());
        let payments = provider.fetch_dividend_history("AAPL").await.unwrap();

        assert_eq!(payments.len(), 2);
        assert_eq!(payments[0].date, NaiveDate::from_ymd_opt(2023, 3, 23).unwrap());
        assert_eq!(payments[0].amount, 0.23);
        assert_eq!(payments[1].date, NaiveDate::from_ymd_opt(2023, 12, 22).unwrap());
    }

    #[tokio::test]
    async fn test_dividend_history_without_events() {
        let mock_server = MockServer::start().await;
        mount_chart(&mock_server, "BTC-USD", "10y", "1mo", &chart_body("USD", "Bitcoin", "[1.0]")).await;

        let provider = YahooFinanceProvider::new(&mock_server.uri(), no_delay());
        let payments = provider.fetch_dividend_history("BTC-USD").await.unwrap();
        assert!(payments.is_empty());
    }
}
