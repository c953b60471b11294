//! Spot price data.
//!
//! Defines the `SpotPriceSource` trait, a CoinGecko implementation and a
//! caching wrapper backed by [`cache::TtlCache`].

pub mod cache;
pub mod spot;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use tracing::debug;

use crate::types::{EngineError, SpotQuote};
use cache::{Clock, TtlCache};

/// Source of reference spot prices.
///
/// `Ok(None)` means the price is unavailable, which callers must treat
/// differently from a reported price of zero.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpotPriceSource: Send + Sync {
    async fn get_spot_price(&self, symbol: &str) -> Result<Option<SpotQuote>, EngineError>;
}

/// Serves recent quotes from a TTL cache and falls through to the inner
/// source on a miss. Only available quotes are cached.
pub struct CachedSpotSource<S> {
    inner: S,
    cache: TtlCache<SpotQuote>,
}

impl<S: SpotPriceSource> CachedSpotSource<S> {
    pub fn new(inner: S, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner,
            cache: TtlCache::new(ttl, clock),
        }
    }
}

#[async_trait]
impl<S: SpotPriceSource> SpotPriceSource for CachedSpotSource<S> {
    async fn get_spot_price(&self, symbol: &str) -> Result<Option<SpotQuote>, EngineError> {
        if let Some(hit) = self.cache.get(symbol).await {
            debug!(symbol, value = hit.value, "Spot cache hit");
            return Ok(Some(hit));
        }
        let fetched = self.inner.get_spot_price(symbol).await?;
        if let Some(quote) = fetched {
            self.cache.insert(symbol, quote).await;
        }
        Ok(fetched)
    }
}
