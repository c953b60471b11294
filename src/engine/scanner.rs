//! Market scanner.
//!
//! Fetches the candidate market list and the spot price of every
//! configured asset concurrently, each call under its own timeout. A
//! failed fetch degrades to an empty result plus an ERROR entry; the scan
//! itself never fails.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{info, warn};

use crate::config::{AppConfig, AssetConfig, FallbackConfig};
use crate::data::SpotPriceSource;
use crate::platforms::{timed, MarketSource};
use crate::strategy::edge::SpotBook;
use crate::types::{CycleLog, Market};

/// Everything the edge detector needs for one cycle.
#[derive(Debug, Clone)]
pub struct ScanSnapshot {
    pub markets: Vec<Market>,
    pub spots: SpotBook,
    pub log: CycleLog,
}

pub struct MarketScanner {
    markets: Arc<dyn MarketSource>,
    spots: Arc<dyn SpotPriceSource>,
    category: String,
    assets: Vec<AssetConfig>,
    fallback: FallbackConfig,
    call_timeout: Duration,
}

impl MarketScanner {
    pub fn new(
        markets: Arc<dyn MarketSource>,
        spots: Arc<dyn SpotPriceSource>,
        category: impl Into<String>,
        assets: Vec<AssetConfig>,
        fallback: FallbackConfig,
        call_timeout: Duration,
    ) -> Self {
        Self {
            markets,
            spots,
            category: category.into(),
            assets,
            fallback,
            call_timeout,
        }
    }

    pub fn from_config(
        config: &AppConfig,
        markets: Arc<dyn MarketSource>,
        spots: Arc<dyn SpotPriceSource>,
    ) -> Self {
        Self::new(
            markets,
            spots,
            config.agent.market_category.clone(),
            config.assets.clone(),
            config.fallback.clone(),
            config.execution.call_timeout(),
        )
    }

    pub async fn scan(&self) -> ScanSnapshot {
        let mut log = CycleLog::new();

        let market_fetch = timed(
            "get_candidate_markets",
            self.call_timeout,
            self.markets.get_candidate_markets(&self.category),
        );
        let spot_fetches = join_all(self.assets.iter().map(|asset| async move {
            let result = timed("get_spot_price", self.call_timeout, self.spots.get_spot_price(&asset.symbol)).await;
            (asset.symbol.as_str(), result)
        }));

        let (markets, spots) = tokio::join!(market_fetch, spot_fetches);

        let markets = match markets {
            Ok(m) => m,
            Err(e) => {
                log.error(None, format!("market fetch failed for category {}: {e}", self.category));
                Vec::new()
            }
        };

        let mut book = SpotBook::new(self.assets.clone(), self.fallback.clone());
        for (symbol, result) in spots {
            match result {
                Ok(Some(quote)) => book.insert(symbol, quote),
                Ok(None) => warn!(symbol, "Spot price unavailable"),
                Err(e) => log.error(Some(symbol), format!("spot fetch failed: {e}")),
            }
        }

        info!(
            category = %self.category,
            markets = markets.len(),
            spots = self.assets.iter().filter(|a| book.quote(&a.symbol).is_some()).count(),
            "Scan data fetched"
        );

        ScanSnapshot {
            markets,
            spots: book,
            log,
        }
    }
}
