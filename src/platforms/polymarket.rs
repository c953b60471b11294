//! Polymarket integration.
//!
//! Uses the Gamma API for market discovery (no auth required) and an
//! order gateway for account state and order placement. The gateway holds
//! custody and signs orders; this client only authenticates to it with the
//! credentials it is constructed with.
//!
//! Gamma API: https://gamma-api.polymarket.com

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{DataSourcesConfig, VenueConfig, VenueCredentials};
use crate::platforms::{MarketSource, VenueClient};
use crate::types::{EngineError, Market, OpenOrder, OrderReceipt, OrderRequest, Side};

const GAMMA: &str = "gamma";
const GATEWAY: &str = "order-gateway";

// ---------------------------------------------------------------------------
// Gamma API response types (market discovery)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GammaMarket {
    #[serde(default)]
    pub question: String,
    #[serde(default, rename = "conditionId")]
    pub condition_id: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub closed: bool,
    /// Outcome prices as JSON string: "[\"0.65\",\"0.35\"]"
    #[serde(default, rename = "outcomePrices")]
    pub outcome_prices: Option<String>,
    /// Outcome token ids, same encoding as the prices.
    #[serde(default, rename = "clobTokenIds")]
    pub clob_token_ids: Option<String>,
    /// Gamma sends these as numbers or as decimal strings.
    #[serde(default, deserialize_with = "number_or_string")]
    pub volume: Option<f64>,
    #[serde(default, rename = "volumeNum", deserialize_with = "number_or_string")]
    pub volume_num: Option<f64>,
    #[serde(default, deserialize_with = "number_or_string")]
    pub liquidity: Option<f64>,
    #[serde(default, rename = "liquidityNum", deserialize_with = "number_or_string")]
    pub liquidity_num: Option<f64>,
}

/// Accept a JSON number or a numeric string. Anything unreadable or
/// non-finite is treated as absent so one odd field never sinks the page.
fn number_or_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(value.filter(|v| v.is_finite()))
}

/// Split Gamma's stringified list format into its items.
/// Handles: "[\"0.65\",\"0.35\"]", "0.65, 0.35", etc.
fn parse_string_list(s: &str) -> Vec<String> {
    let cleaned = s.replace(['[', ']', '"', '\\'], "");
    cleaned
        .split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Parse outcome prices as the ordered pair (yes, no). Both must be
/// finite.
pub fn parse_outcome_prices(s: &str) -> Option<(f64, f64)> {
    let parts = parse_string_list(s);
    if parts.len() >= 2 {
        let yes = parts[0].parse::<f64>().ok().filter(|v| v.is_finite())?;
        let no = parts[1].parse::<f64>().ok().filter(|v| v.is_finite())?;
        Some((yes, no))
    } else {
        None
    }
}

/// Convert a Gamma market into our internal Market type. Markets without
/// an id, question or readable prices are dropped.
pub fn convert_market(gm: &GammaMarket, category: &str) -> Option<Market> {
    if gm.condition_id.is_empty() || gm.question.is_empty() {
        return None;
    }

    let Some((price_yes, price_no)) = parse_outcome_prices(gm.outcome_prices.as_deref().unwrap_or("")) else {
        debug!(market_id = %gm.condition_id, "Unreadable outcome prices, dropped");
        return None;
    };

    let mut tokens = parse_string_list(gm.clob_token_ids.as_deref().unwrap_or("")).into_iter();
    let yes_token = tokens.next().unwrap_or_default();
    let no_token = tokens.next().unwrap_or_default();

    Some(Market {
        id: gm.condition_id.clone(),
        question: gm.question.clone(),
        category: category.to_string(),
        price_yes,
        price_no,
        yes_token,
        no_token,
        volume: gm.volume.or(gm.volume_num).unwrap_or(0.0),
        liquidity: gm.liquidity.or(gm.liquidity_num).unwrap_or(0.0),
        active: gm.active && !gm.closed,
    })
}

// ---------------------------------------------------------------------------
// Market source
// ---------------------------------------------------------------------------

pub struct GammaMarketSource {
    http: Client,
    base_url: String,
    limit: u32,
}

impl GammaMarketSource {
    pub fn new(config: &DataSourcesConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build Gamma HTTP client")?;

        Ok(Self {
            http,
            base_url: config.gamma_url.trim_end_matches('/').to_string(),
            limit: config.market_limit,
        })
    }
}

#[async_trait]
impl MarketSource for GammaMarketSource {
    async fn get_candidate_markets(&self, category: &str) -> Result<Vec<Market>, EngineError> {
        let url = format!("{}/markets", self.base_url);
        let limit = self.limit.to_string();
        debug!(category, "Fetching markets from Gamma API");

        let resp = self
            .http
            .get(&url)
            .query(&[
                ("active", "true"),
                ("closed", "false"),
                ("tag_slug", category),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| EngineError::transport(GAMMA, e))?;

        let body = checked_body(GAMMA, resp).await?;
        parse_markets(&body, category)
    }
}

/// Decode a Gamma `/markets` page and keep the active, well-formed markets.
pub fn parse_markets(body: &str, category: &str) -> Result<Vec<Market>, EngineError> {
    let raw: Vec<GammaMarket> = serde_json::from_str(body)
        .map_err(|e| EngineError::transport(GAMMA, format!("malformed markets response: {e}")))?;

    let markets: Vec<Market> = raw
        .iter()
        .filter_map(|gm| convert_market(gm, category))
        .filter(|m| m.active)
        .collect();

    info!(raw = raw.len(), kept = markets.len(), category, "Gamma markets fetched");
    Ok(markets)
}

// ---------------------------------------------------------------------------
// Order gateway wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    #[serde(with = "rust_decimal::serde::str")]
    balance: Decimal,
}

#[derive(Debug, Deserialize)]
struct WireOpenOrder {
    #[serde(with = "rust_decimal::serde::str")]
    price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    original_size: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    size_matched: Decimal,
    #[serde(alias = "asset")]
    asset_id: String,
    side: Side,
}

impl From<WireOpenOrder> for OpenOrder {
    fn from(w: WireOpenOrder) -> Self {
        OpenOrder {
            price: w.price,
            original_size: w.original_size,
            size_matched: w.size_matched,
            asset: w.asset_id,
            side: w.side,
        }
    }
}

#[derive(Debug, Serialize)]
struct WireOrder<'a> {
    token_id: &'a str,
    #[serde(with = "rust_decimal::serde::str")]
    price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    size: Decimal,
    side: Side,
    order_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct WireOrderResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default, rename = "errorMsg", alias = "error_msg")]
    error_msg: Option<String>,
    #[serde(default, rename = "orderID", alias = "order_id")]
    order_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

pub fn parse_balance(body: &str) -> Result<Decimal, EngineError> {
    let parsed: BalanceResponse = serde_json::from_str(body)
        .map_err(|e| EngineError::transport(GATEWAY, format!("malformed balance response: {e}")))?;
    Ok(parsed.balance)
}

pub fn parse_open_orders(body: &str) -> Result<Vec<OpenOrder>, EngineError> {
    let parsed: Vec<WireOpenOrder> = serde_json::from_str(body)
        .map_err(|e| EngineError::transport(GATEWAY, format!("malformed orders response: {e}")))?;
    Ok(parsed.into_iter().map(OpenOrder::from).collect())
}

pub fn parse_order_response(body: &str) -> Result<OrderReceipt, EngineError> {
    let parsed: WireOrderResponse = serde_json::from_str(body)
        .map_err(|e| EngineError::transport(GATEWAY, format!("malformed order response: {e}")))?;

    if parsed.success == Some(false) {
        let msg = parsed.error_msg.unwrap_or_else(|| "order rejected".to_string());
        return Err(EngineError::transport(GATEWAY, msg));
    }
    match parsed.order_id.filter(|id| !id.is_empty()) {
        Some(order_id) => Ok(OrderReceipt {
            order_id,
            status: parsed.status.unwrap_or_else(|| "live".to_string()),
        }),
        None => Err(EngineError::transport(GATEWAY, "order response missing order id")),
    }
}

async fn checked_body(source: &str, resp: Response) -> Result<String, EngineError> {
    let status = resp.status();
    let body = resp.text().await.map_err(|e| EngineError::transport(source, e))?;
    if !status.is_success() {
        return Err(EngineError::transport(source, format!("HTTP {status}: {body}")));
    }
    Ok(body)
}

// ---------------------------------------------------------------------------
// Venue client
// ---------------------------------------------------------------------------

/// Authenticated REST client for the order gateway.
pub struct OrderGatewayClient {
    http: Client,
    base_url: String,
    credentials: VenueCredentials,
}

impl OrderGatewayClient {
    pub fn new(config: &VenueConfig, credentials: VenueCredentials) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()
            .context("Failed to build order gateway HTTP client")?;

        Ok(Self {
            http,
            base_url: config.gateway_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("X-API-KEY", self.credentials.api_key.expose_secret().as_str())
            .header("X-API-PASSPHRASE", self.credentials.passphrase.expose_secret().as_str())
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<String, EngineError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .authed(self.http.get(&url).query(query))
            .send()
            .await
            .map_err(|e| EngineError::transport(GATEWAY, e))?;
        checked_body(GATEWAY, resp).await
    }
}

#[async_trait]
impl VenueClient for OrderGatewayClient {
    async fn get_balance(&self) -> Result<Decimal, EngineError> {
        let body = self.get("/balance", &[]).await?;
        parse_balance(&body)
    }

    async fn get_open_orders(&self) -> Result<Vec<OpenOrder>, EngineError> {
        let body = self.get("/orders", &[("status", "open")]).await?;
        parse_open_orders(&body)
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderReceipt, EngineError> {
        let url = format!("{}/order", self.base_url);
        let wire = WireOrder {
            token_id: &order.token_id,
            price: order.price,
            size: order.size,
            side: order.side,
            order_type: "GTC",
        };
        let resp = self
            .authed(self.http.post(&url).json(&wire))
            .send()
            .await
            .map_err(|e| EngineError::transport(GATEWAY, e))?;
        let body = checked_body(GATEWAY, resp).await?;
        let receipt = parse_order_response(&body)?;
        debug!(order_id = %receipt.order_id, token = %order.token_id, "Order accepted by gateway");
        Ok(receipt)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
