//! In-memory collaborators for integration testing.
//!
//! Deterministic `MarketSource`, `SpotPriceSource` and `VenueClient`
//! implementations whose failures are fully controllable from test code.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use binary_edge::data::SpotPriceSource;
use binary_edge::platforms::{MarketSource, VenueClient};
use binary_edge::types::*;

// ---------------------------------------------------------------------------
// Markets
// ---------------------------------------------------------------------------

/// A market on `question` with distinct outcome tokens.
pub fn market(id: &str, question: &str, yes_price: f64) -> Market {
    Market {
        id: id.to_string(),
        question: question.to_string(),
        category: "crypto".to_string(),
        price_yes: yes_price,
        price_no: 1.0 - yes_price,
        yes_token: format!("{id}-yes"),
        no_token: format!("{id}-no"),
        volume: 10_000.0,
        liquidity: 5_000.0,
        active: true,
    }
}

pub struct MockMarkets {
    markets: Vec<Market>,
    delay: Option<Duration>,
    force_error: Arc<Mutex<Option<String>>>,
}

impl MockMarkets {
    pub fn new(markets: Vec<Market>) -> Self {
        Self {
            markets,
            delay: None,
            force_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Hold every fetch open for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }
}

#[async_trait]
impl MarketSource for MockMarkets {
    async fn get_candidate_markets(&self, _category: &str) -> Result<Vec<Market>, EngineError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.force_error.lock().unwrap().as_ref() {
            return Err(EngineError::transport("mock-markets", err));
        }
        Ok(self.markets.clone())
    }
}

// ---------------------------------------------------------------------------
// Spot prices
// ---------------------------------------------------------------------------

pub struct MockSpots {
    prices: HashMap<String, f64>,
}

impl MockSpots {
    pub fn new(prices: &[(&str, f64)]) -> Self {
        Self {
            prices: prices.iter().map(|(s, v)| (s.to_string(), *v)).collect(),
        }
    }
}

#[async_trait]
impl SpotPriceSource for MockSpots {
    async fn get_spot_price(&self, symbol: &str) -> Result<Option<SpotQuote>, EngineError> {
        Ok(self.prices.get(symbol).map(|value| SpotQuote {
            value: *value,
            as_of: Utc::now(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Venue
// ---------------------------------------------------------------------------

/// A venue that records every order and rejects the ones it is told to.
pub struct MockVenue {
    balance: Decimal,
    open_orders: Vec<OpenOrder>,
    placed: Arc<Mutex<Vec<OrderRequest>>>,
    reject_tokens: Arc<Mutex<HashSet<String>>>,
    balance_error: Arc<Mutex<Option<String>>>,
    open_orders_error: Arc<Mutex<Option<String>>>,
}

impl MockVenue {
    pub fn new(balance: Decimal) -> Self {
        Self {
            balance,
            open_orders: Vec::new(),
            placed: Arc::new(Mutex::new(Vec::new())),
            reject_tokens: Arc::new(Mutex::new(HashSet::new())),
            balance_error: Arc::new(Mutex::new(None)),
            open_orders_error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_open_orders(mut self, orders: Vec<OpenOrder>) -> Self {
        self.open_orders = orders;
        self
    }

    /// Reject every order for `token_id`.
    pub fn reject(&self, token_id: &str) {
        self.reject_tokens.lock().unwrap().insert(token_id.to_string());
    }

    pub fn fail_balance(&self, msg: &str) {
        *self.balance_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn fail_open_orders(&self, msg: &str) {
        *self.open_orders_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn placed(&self) -> Vec<OrderRequest> {
        self.placed.lock().unwrap().clone()
    }
}

#[async_trait]
impl VenueClient for MockVenue {
    async fn get_balance(&self) -> Result<Decimal, EngineError> {
        if let Some(err) = self.balance_error.lock().unwrap().as_ref() {
            return Err(EngineError::transport("mock-venue", err));
        }
        Ok(self.balance)
    }

    async fn get_open_orders(&self) -> Result<Vec<OpenOrder>, EngineError> {
        if let Some(err) = self.open_orders_error.lock().unwrap().as_ref() {
            return Err(EngineError::transport("mock-venue", err));
        }
        Ok(self.open_orders.clone())
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderReceipt, EngineError> {
        if self.reject_tokens.lock().unwrap().contains(&order.token_id) {
            return Err(EngineError::transport(
                "mock-venue",
                format!("order rejected for {}", order.token_id),
            ));
        }
        self.placed.lock().unwrap().push(order.clone());
        Ok(OrderReceipt {
            order_id: format!("MOCK-{}", Uuid::new_v4()),
            status: "live".to_string(),
        })
    }
}
