//! The one place market-data failures turn into defaults.
//!
//! Every operation here returns a usable value. The underlying
//! [`MarketDataError`] is logged with `warn!` and then replaced by the
//! documented sentinel: the fallback exchange rate, a [`Quote`] without a
//! price, a zeroed [`DividendInfo`] or a zeroed [`IndexQuote`]. Only
//! successful lookups are cached.

use crate::core::cache::{Cache, CacheKey, CacheKind};
use crate::core::clock::Clock;
use crate::core::dividend::{derive_yield, dividend_growth};
use crate::core::holding::{Currency, Holding};
use crate::core::market::{DividendInfo, IndexQuote, MarketDataError, MarketDataSource, Quote};
use crate::core::valuation::MarketSnapshot;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

/// KRW per USD.
pub const FX_PAIR: &str = "KRW=X";
pub const DEFAULT_FALLBACK_RATE: f64 = 1450.0;

/// Exchange suffixes of KOSPI and KOSDAQ listings.
const DOMESTIC_SUFFIXES: [&str; 2] = [".KS", ".KQ"];

/// Benchmarks shown alongside the portfolio, in display order.
pub const MARKET_INDICES: [(&str, &str); 5] = [
    ("USD/KRW", "KRW=X"),
    ("KOSPI", "^KS11"),
    ("S&P 500", "^GSPC"),
    ("NASDAQ", "^IXIC"),
    ("VIX", "^VIX"),
];

pub fn is_domestic_ticker(ticker: &str) -> bool {
    let upper = ticker.to_uppercase();
    DOMESTIC_SUFFIXES.iter().any(|suffix| upper.ends_with(suffix))
}

pub struct MarketDataGateway {
    source: Arc<dyn MarketDataSource>,
    cache: Cache,
    clock: Arc<dyn Clock>,
    fallback_rate: f64,
}

impl MarketDataGateway {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        cache: Cache,
        clock: Arc<dyn Clock>,
        fallback_rate: f64,
    ) -> Self {
        Self {
            source,
            cache,
            clock,
            fallback_rate,
        }
    }

    /// KRW per one USD, or the fallback rate when the provider fails.
    pub async fn exchange_rate(&self) -> f64 {
        let key = CacheKey::new(CacheKind::ExchangeRate, FX_PAIR);
        if let Some(rate) = self.cache.get::<f64>(&key).await {
            return rate;
        }

        match self.source.fetch_exchange_rate(FX_PAIR).await {
            Ok(rate) => {
                self.cache.put(&key, &rate).await;
                rate
            }
            Err(e) => {
                warn!(
                    "Exchange rate lookup failed: {e}. Using fallback {}",
                    self.fallback_rate
                );
                self.fallback_rate
            }
        }
    }

    /// Latest price for `ticker`, or a quote with no price.
    pub async fn quote(&self, ticker: &str) -> Quote {
        let key = CacheKey::new(CacheKind::Quote, ticker);
        if let Some(quote) = self.cache.get::<Quote>(&key).await {
            return quote;
        }

        match self.fetch_quote(ticker).await {
            Ok(quote) => {
                self.cache.put(&key, &quote).await;
                quote
            }
            Err(e) => {
                warn!("Quote lookup failed for {ticker}: {e}");
                Quote::unavailable(ticker)
            }
        }
    }

    async fn fetch_quote(&self, ticker: &str) -> Result<Quote, MarketDataError> {
        let raw = self.source.fetch_quote(ticker).await?;
        if !raw.price.is_finite() || raw.price < 0.0 {
            return Err(MarketDataError::Decode {
                symbol: ticker.to_string(),
                message: format!("invalid price {}", raw.price),
            });
        }

        let currency = if is_domestic_ticker(ticker) {
            if !raw.currency.eq_ignore_ascii_case("KRW") {
                debug!(
                    "Provider reports {} for domestic ticker {ticker}, using KRW",
                    raw.currency
                );
            }
            Currency::KRW
        } else {
            Currency::from_provider_code(&raw.currency)
        };

        Ok(Quote {
            price: Some(raw.price),
            currency,
            name: raw.name.unwrap_or_else(|| ticker.to_string()),
        })
    }

    /// Yield and dividend growth percentages, `(0, 0)` on any failure.
    pub async fn dividend_info(&self, ticker: &str) -> DividendInfo {
        let key = CacheKey::new(CacheKind::Dividend, ticker);
        if let Some(info) = self.cache.get::<DividendInfo>(&key).await {
            return info;
        }

        match self.fetch_dividend_info(ticker).await {
            Ok(info) => {
                self.cache.put(&key, &info).await;
                info
            }
            Err(e) => {
                warn!("Dividend lookup failed for {ticker}: {e}");
                DividendInfo::default()
            }
        }
    }

    async fn fetch_dividend_info(&self, ticker: &str) -> Result<DividendInfo, MarketDataError> {
        let profile = self.source.fetch_dividend_profile(ticker).await?;
        let price = match profile.price.filter(|p| *p > 0.0) {
            Some(price) => Some(price),
            None => self.quote(ticker).await.price,
        };
        let yield_pct = derive_yield(&profile, price);

        let growth_pct = match self.source.fetch_dividend_history(ticker).await {
            Ok(payments) => dividend_growth(&payments, self.clock.today()),
            Err(e) => {
                debug!("No dividend history for {ticker}: {e}");
                0.0
            }
        };

        debug!("Dividend info for {ticker}: yield {yield_pct:.2}%, growth {growth_pct:.2}%");
        Ok(DividendInfo {
            yield_pct,
            growth_pct,
        })
    }

    /// Level and day-over-day change of each benchmark in [`MARKET_INDICES`].
    pub async fn market_indices(&self) -> Vec<IndexQuote> {
        let futures = MARKET_INDICES
            .iter()
            .map(|(name, symbol)| self.index_quote(name, symbol));
        join_all(futures).await
    }

    async fn index_quote(&self, name: &str, symbol: &str) -> IndexQuote {
        let key = CacheKey::new(CacheKind::Index, symbol);
        if let Some(quote) = self.cache.get::<IndexQuote>(&key).await {
            return quote;
        }

        let closes = match self.source.fetch_recent_closes(symbol).await {
            Ok(closes) => closes,
            Err(e) => {
                warn!("Index lookup failed for {symbol}: {e}");
                return IndexQuote::zeroed(name, symbol);
            }
        };

        // Last two sessions, whatever calendar days they fell on
        let [.., prev, current] = closes.as_slice() else {
            warn!("Not enough sessions for {symbol}: {}", closes.len());
            return IndexQuote::zeroed(name, symbol);
        };
        let change = current - prev;
        let change_pct = if *prev != 0.0 {
            change / prev * 100.0
        } else {
            0.0
        };

        let quote = IndexQuote {
            name: name.to_string(),
            symbol: symbol.to_string(),
            level: *current,
            change,
            change_pct,
        };
        self.cache.put(&key, &quote).await;
        quote
    }

    /// Everything one valuation pass needs, fetched one ticker at a time.
    ///
    /// Dividend data is only looked up for holdings without a pinned yield.
    /// `progress` is called once per holding.
    pub async fn snapshot(
        &self,
        holdings: &[Holding],
        progress: &(dyn Fn() + Sync),
    ) -> MarketSnapshot {
        let mut snapshot = MarketSnapshot {
            exchange_rate: self.exchange_rate().await,
            ..Default::default()
        };

        for holding in holdings {
            if !snapshot.quotes.contains_key(&holding.ticker) {
                let quote = self.quote(&holding.ticker).await;
                snapshot.quotes.insert(holding.ticker.clone(), quote);
            }
            if holding.pinned_yield().is_none()
                && !snapshot.dividends.contains_key(&holding.ticker)
            {
                let info = self.dividend_info(&holding.ticker).await;
                snapshot.dividends.insert(holding.ticker.clone(), info);
            }
            progress();
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::core::market::{DividendPayment, DividendProfile, RawQuote};
    use crate::store::memory::MemoryCollection;
    use async_trait::async_trait;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockSource {
        quotes: HashMap<String, RawQuote>,
        rate: Option<f64>,
        closes: HashMap<String, Vec<f64>>,
        profiles: HashMap<String, DividendProfile>,
        payments: HashMap<String, Vec<DividendPayment>>,
        calls: AtomicUsize,
    }

    impl MockSource {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MarketDataSource for MockSource {
        async fn fetch_quote(&self, symbol: &str) -> Result<RawQuote, MarketDataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.quotes
                .get(symbol)
                .cloned()
                .ok_or_else(|| MarketDataError::NoPrice(symbol.to_string()))
        }

        async fn fetch_exchange_rate(&self, pair: &str) -> Result<f64, MarketDataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.rate
                .ok_or_else(|| MarketDataError::EmptyResult(pair.to_string()))
        }

        async fn fetch_recent_closes(&self, symbol: &str) -> Result<Vec<f64>, MarketDataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.closes
                .get(symbol)
                .cloned()
                .ok_or_else(|| MarketDataError::EmptyResult(symbol.to_string()))
        }

        async fn fetch_dividend_profile(
            &self,
            symbol: &str,
        ) -> Result<DividendProfile, MarketDataError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.profiles
                .get(symbol)
                .cloned()
                .ok_or_else(|| MarketDataError::EmptyResult(symbol.to_string()))
        }

        async fn fetch_dividend_history(
            &self,
            symbol: &str,
        ) -> Result<Vec<DividendPayment>, MarketDataError> {
            Ok(self.payments.get(symbol).cloned().unwrap_or_default())
        }
    }

    fn gateway(source: Arc<MockSource>) -> (MarketDataGateway, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 3, 1, 0, 0).unwrap(),
        ));
        let cache = Cache::new(Arc::new(MemoryCollection::new()), clock.clone());
        (
            MarketDataGateway::new(source, cache, clock.clone(), DEFAULT_FALLBACK_RATE),
            clock,
        )
    }

    fn raw(price: f64, currency: &str, name: &str) -> RawQuote {
        RawQuote {
            price,
            currency: currency.to_string(),
            name: Some(name.to_string()),
        }
    }

    #[tokio::test]
    async fn test_exchange_rate_falls_back_and_is_not_cached() {
        let source = Arc::new(MockSource::default());
        let (gateway, _clock) = gateway(source.clone());

        assert_eq!(gateway.exchange_rate().await, 1450.0);
        assert_eq!(gateway.exchange_rate().await, 1450.0);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_exchange_rate_cached_for_an_hour() {
        let source = Arc::new(MockSource {
            rate: Some(1380.5),
            ..Default::default()
        });
        let (gateway, clock) = gateway(source.clone());

        assert_eq!(gateway.exchange_rate().await, 1380.5);
        clock.advance(Duration::minutes(59));
        assert_eq!(gateway.exchange_rate().await, 1380.5);
        assert_eq!(source.calls(), 1);

        clock.advance(Duration::minutes(2));
        gateway.exchange_rate().await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_quote_returns_sentinel() {
        let source = Arc::new(MockSource::default());
        let (gateway, _clock) = gateway(source);

        let quote = gateway.quote("DELISTED").await;
        assert_eq!(quote, Quote::unavailable("DELISTED"));
        assert!(!quote.is_priced());
        assert_eq!(quote.name, "DELISTED");
        assert_eq!(quote.currency, Currency::KRW);
    }

    #[tokio::test]
    async fn test_domestic_suffix_forces_krw() {
        let mut quotes = HashMap::new();
        quotes.insert("005930.KS".to_string(), raw(71500.0, "USD", "Samsung"));
        quotes.insert("035720.kq".to_string(), raw(48000.0, "USD", "Kakao"));
        quotes.insert("AAPL".to_string(), raw(190.0, "USD", "Apple"));
        let source = Arc::new(MockSource {
            quotes,
            ..Default::default()
        });
        let (gateway, _clock) = gateway(source);

        assert_eq!(gateway.quote("005930.KS").await.currency, Currency::KRW);
        assert_eq!(gateway.quote("035720.kq").await.currency, Currency::KRW);
        let apple = gateway.quote("AAPL").await;
        assert_eq!(apple.currency, Currency::USD);
        assert_eq!(apple.price, Some(190.0));
        assert_eq!(apple.name, "Apple");
    }

    #[tokio::test]
    async fn test_quote_cache_expires_after_ten_minutes() {
        let mut quotes = HashMap::new();
        quotes.insert("AAPL".to_string(), raw(190.0, "USD", "Apple"));
        let source = Arc::new(MockSource {
            quotes,
            ..Default::default()
        });
        let (gateway, clock) = gateway(source.clone());

        gateway.quote("AAPL").await;
        gateway.quote("AAPL").await;
        assert_eq!(source.calls(), 1);

        clock.advance(Duration::minutes(11));
        gateway.quote("AAPL").await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_dividend_info_uses_quote_price_when_profile_has_none() {
        let mut quotes = HashMap::new();
        quotes.insert("O".to_string(), raw(60.0, "USD", "Realty Income"));
        let mut profiles = HashMap::new();
        profiles.insert(
            "O".to_string(),
            DividendProfile {
                dividend_rate: Some(3.0),
                ..Default::default()
            },
        );
        let mut payments = HashMap::new();
        payments.insert(
            "O".to_string(),
            (2019..=2023)
                .map(|year| DividendPayment {
                    date: NaiveDate::from_ymd_opt(year, 6, 1).unwrap(),
                    amount: if year == 2019 { 2.0 } else { 2.5 },
                })
                .collect(),
        );
        let source = Arc::new(MockSource {
            quotes,
            profiles,
            payments,
            ..Default::default()
        });
        let (gateway, _clock) = gateway(source);

        let info = gateway.dividend_info("O").await;
        assert!((info.yield_pct - 5.0).abs() < 1e-9);
        // 2.0 -> 2.5 over four years
        let expected = ((2.5f64 / 2.0).powf(0.25) - 1.0) * 100.0;
        assert!((info.growth_pct - expected).abs() < 1e-4);
    }

    #[tokio::test]
    async fn test_dividend_failure_collapses_to_zero() {
        let source = Arc::new(MockSource::default());
        let (gateway, _clock) = gateway(source);

        assert_eq!(gateway.dividend_info("AAPL").await, DividendInfo::default());
    }

    #[tokio::test]
    async fn test_market_indices_zero_failed_symbols() {
        let mut closes = HashMap::new();
        closes.insert("^GSPC".to_string(), vec![5000.0, 5100.0, 5049.0]);
        closes.insert("^VIX".to_string(), vec![14.0]);
        let source = Arc::new(MockSource {
            closes,
            ..Default::default()
        });
        let (gateway, _clock) = gateway(source);

        let indices = gateway.market_indices().await;
        assert_eq!(indices.len(), MARKET_INDICES.len());
        assert_eq!(indices[0].name, "USD/KRW");

        let spx = &indices[2];
        assert_eq!(spx.symbol, "^GSPC");
        assert_eq!(spx.level, 5049.0);
        assert_eq!(spx.change, -51.0);
        assert!((spx.change_pct - (-1.0)).abs() < 1e-9);

        assert_eq!(indices[1], IndexQuote::zeroed("KOSPI", "^KS11"));
        assert_eq!(indices[4], IndexQuote::zeroed("VIX", "^VIX"));
    }

    #[tokio::test]
    async fn test_snapshot_skips_dividends_for_pinned_yield() {
        use crate::core::holding::AssetType;

        let mut quotes = HashMap::new();
        quotes.insert("SCHD".to_string(), raw(80.0, "USD", "Schwab US Dividend"));
        quotes.insert("005930.KS".to_string(), raw(71500.0, "KRW", "Samsung"));
        let source = Arc::new(MockSource {
            quotes,
            rate: Some(1300.0),
            ..Default::default()
        });
        let (gateway, _clock) = gateway(source);
        let holdings = vec![
            Holding::new("SCHD", 10.0, 70.0, AssetType::ETF).with_dividend_yield(3.5),
            Holding::new("005930.KS", 5.0, 65000.0, AssetType::Stock).with_currency(Currency::KRW),
            Holding::new("GONE", 1.0, 10.0, AssetType::Stock),
        ];

        let ticks = AtomicUsize::new(0);
        let snapshot = gateway
            .snapshot(&holdings, &|| {
                ticks.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert_eq!(snapshot.exchange_rate, 1300.0);
        assert_eq!(snapshot.quotes.len(), 3);
        assert!(!snapshot.quotes["GONE"].is_priced());
        assert!(!snapshot.dividends.contains_key("SCHD"));
        assert_eq!(snapshot.dividends["GONE"], DividendInfo::default());
        assert!(snapshot.dividends.contains_key("005930.KS"));
    }
}
