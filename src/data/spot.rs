//! CoinGecko spot prices.
//!
//! API: `{base}/simple/price?ids={id}&vs_currencies=usd&include_last_updated_at=true`
//! Auth: none for the public tier.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::SpotPriceSource;
use crate::config::{AssetConfig, DataSourcesConfig};
use crate::types::{EngineError, SpotQuote};

const SOURCE: &str = "coingecko";

#[derive(Debug, Deserialize)]
struct SimplePrice {
    #[serde(default)]
    usd: Option<f64>,
    #[serde(default)]
    last_updated_at: Option<i64>,
}

/// Parse a `simple/price` body for one coin id. `Ok(None)` when the coin
/// or its USD field is absent.
pub fn parse_simple_price(body: &str, coin_id: &str) -> Result<Option<SpotQuote>, EngineError> {
    let parsed: HashMap<String, SimplePrice> = serde_json::from_str(body)
        .map_err(|e| EngineError::transport(SOURCE, format!("malformed response: {e}")))?;

    let Some(entry) = parsed.get(coin_id) else {
        return Ok(None);
    };
    let Some(value) = entry.usd else {
        return Ok(None);
    };
    let as_of = entry
        .last_updated_at
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .unwrap_or_else(Utc::now);

    Ok(Some(SpotQuote { value, as_of }))
}

pub struct CoinGeckoSpotSource {
    http: Client,
    base_url: String,
    /// Asset symbol → CoinGecko coin id.
    ids: HashMap<String, String>,
}

impl CoinGeckoSpotSource {
    pub fn new(config: &DataSourcesConfig, assets: &[AssetConfig]) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .user_agent("binary-edge/0.1.0")
            .build()
            .context("Failed to build CoinGecko HTTP client")?;
        let ids = assets
            .iter()
            .map(|a| (a.symbol.clone(), a.spot_id.clone()))
            .collect();
        Ok(Self {
            http,
            base_url: config.coingecko_url.trim_end_matches('/').to_string(),
            ids,
        })
    }
}

#[async_trait]
impl SpotPriceSource for CoinGeckoSpotSource {
    async fn get_spot_price(&self, symbol: &str) -> Result<Option<SpotQuote>, EngineError> {
        let Some(coin_id) = self.ids.get(symbol) else {
            debug!(symbol, "No CoinGecko id configured");
            return Ok(None);
        };

        let url = format!("{}/simple/price", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("ids", coin_id.as_str()),
                ("vs_currencies", "usd"),
                ("include_last_updated_at", "true"),
            ])
            .send()
            .await
            .map_err(|e| EngineError::transport(SOURCE, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(EngineError::transport(SOURCE, format!("HTTP {status}")));
        }

        let body = resp.text().await.map_err(|e| EngineError::transport(SOURCE, e))?;
        let quote = parse_simple_price(&body, coin_id)?;
        debug!(symbol, coin_id = %coin_id, value = ?quote.map(|q| q.value), "Spot fetched");
        Ok(quote)
    }
}
