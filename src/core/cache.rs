use crate::core::clock::Clock;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt::Display;
use std::sync::Arc;
use tracing::debug;

/// Raw byte storage behind the cache. Backends swallow their own errors.
#[async_trait]
pub trait KeyValueCollection: Send + Sync {
    async fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    async fn put(&self, key: &[u8], value: &[u8]);
    async fn remove(&self, key: &[u8]);
}

/// The kinds of market data we cache, each with its own freshness window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    ExchangeRate,
    Quote,
    Dividend,
    Index,
}

impl CacheKind {
    pub fn ttl(&self) -> Duration {
        match self {
            CacheKind::ExchangeRate => Duration::hours(1),
            CacheKind::Quote => Duration::minutes(10),
            CacheKind::Dividend => Duration::hours(24),
            CacheKind::Index => Duration::minutes(10),
        }
    }
}

impl Display for CacheKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                CacheKind::ExchangeRate => "fx",
                CacheKind::Quote => "quote",
                CacheKind::Dividend => "dividend",
                CacheKind::Index => "index",
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: CacheKind,
    pub symbol: String,
}

impl CacheKey {
    pub fn new(kind: CacheKind, symbol: &str) -> Self {
        Self {
            kind,
            symbol: symbol.to_string(),
        }
    }

    fn as_bytes(&self) -> Vec<u8> {
        format!("{}:{}", self.kind, self.symbol).into_bytes()
    }
}

#[derive(Serialize, Deserialize)]
struct CacheEntry<V> {
    value: V,
    fetched_at: DateTime<Utc>,
}

/// Time-aware cache keyed by (operation, symbol).
///
/// An entry is served while `now - fetched_at` is within the TTL of its
/// [`CacheKind`]; past that it is treated as absent and the caller refetches.
#[derive(Clone)]
pub struct Cache {
    collection: Arc<dyn KeyValueCollection>,
    clock: Arc<dyn Clock>,
}

impl Cache {
    pub fn new(collection: Arc<dyn KeyValueCollection>, clock: Arc<dyn Clock>) -> Self {
        Self { collection, clock }
    }

    pub async fn get<V: DeserializeOwned>(&self, key: &CacheKey) -> Option<V> {
        let bytes = self.collection.get(&key.as_bytes()).await;
        let Some(bytes) = bytes else {
            debug!("Cache MISS for key: {:?}", key);
            return None;
        };

        let entry: CacheEntry<V> = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Discarding unreadable cache entry for {:?}: {}", key, e);
                self.collection.remove(&key.as_bytes()).await;
                return None;
            }
        };

        if self.clock.now() - entry.fetched_at > key.kind.ttl() {
            debug!("Cache entry expired for key: {:?}", key);
            return None;
        }

        debug!("Cache HIT for key: {:?}", key);
        Some(entry.value)
    }

    pub async fn put<V: Serialize>(&self, key: &CacheKey, value: &V) {
        let entry = CacheEntry {
            value,
            fetched_at: self.clock.now(),
        };
        match serde_json::to_vec(&entry) {
            Ok(bytes) => {
                self.collection.put(&key.as_bytes(), &bytes).await;
                debug!("Cache PUT for key: {:?}", key);
            }
            Err(e) => debug!("Failed to encode cache entry for {:?}: {}", key, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use crate::store::memory::MemoryCollection;
    use chrono::TimeZone;

    fn cache_with_clock() -> (Cache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 10, 9, 0, 0).unwrap(),
        ));
        let cache = Cache::new(Arc::new(MemoryCollection::new()), clock.clone());
        (cache, clock)
    }

    #[tokio::test]
    async fn test_cache_get_put() {
        let (cache, _clock) = cache_with_clock();
        let key = CacheKey::new(CacheKind::Quote, "AAPL");

        assert!(cache.get::<f64>(&key).await.is_none());

        cache.put(&key, &187.5).await;
        assert_eq!(cache.get::<f64>(&key).await, Some(187.5));

        let other = CacheKey::new(CacheKind::Dividend, "AAPL");
        assert!(cache.get::<f64>(&other).await.is_none());
    }

    #[tokio::test]
    async fn test_quote_entries_expire_after_ten_minutes() {
        let (cache, clock) = cache_with_clock();
        let key = CacheKey::new(CacheKind::Quote, "AAPL");
        cache.put(&key, &187.5).await;

        clock.advance(Duration::minutes(10));
        assert_eq!(cache.get::<f64>(&key).await, Some(187.5));

        clock.advance(Duration::seconds(1));
        assert!(cache.get::<f64>(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_ttl_depends_on_kind() {
        let (cache, clock) = cache_with_clock();
        let fx = CacheKey::new(CacheKind::ExchangeRate, "KRW=X");
        let dividend = CacheKey::new(CacheKind::Dividend, "SCHD");
        cache.put(&fx, &1380.0).await;
        cache.put(&dividend, &(3.4, 11.2)).await;

        clock.advance(Duration::minutes(61));
        assert!(cache.get::<f64>(&fx).await.is_none());
        assert_eq!(cache.get::<(f64, f64)>(&dividend).await, Some((3.4, 11.2)));

        clock.advance(Duration::hours(24));
        assert!(cache.get::<(f64, f64)>(&dividend).await.is_none());
    }

    #[tokio::test]
    async fn test_unreadable_entry_is_a_miss() {
        let (cache, _clock) = cache_with_clock();
        let key = CacheKey::new(CacheKind::Quote, "AAPL");
        cache.put(&key, &"not a number").await;

        assert!(cache.get::<f64>(&key).await.is_none());
    }
}
