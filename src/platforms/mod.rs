//! Venue and market-data integrations.
//!
//! Defines the collaborator traits the engine consumes and provides:
//! - Polymarket Gamma — candidate market listing
//! - Order gateway — live balance, open orders and order placement
//! - Paper venue — in-memory dry-run execution

pub mod paper;
pub mod polymarket;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::types::{EngineError, Market, OpenOrder, OrderReceipt, OrderRequest};

/// Source of tradeable binary markets.
///
/// Implementations drop closed or settled markets before returning.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketSource: Send + Sync {
    async fn get_candidate_markets(&self, category: &str) -> Result<Vec<Market>, EngineError>;
}

/// Account and order routing at the trading venue.
///
/// Every method may fail with a transport error; callers decide how each
/// failure degrades.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VenueClient: Send + Sync {
    /// Available collateral in dollars.
    async fn get_balance(&self) -> Result<Decimal, EngineError>;

    /// Orders currently resting at the venue.
    async fn get_open_orders(&self) -> Result<Vec<OpenOrder>, EngineError>;

    /// Place one limit order.
    async fn place_order(&self, order: &OrderRequest) -> Result<OrderReceipt, EngineError>;
}

/// Run an external call under a deadline. An elapsed deadline surfaces as
/// [`EngineError::Timeout`], which callers handle like a transport error.
pub async fn timed<T, F>(operation: &str, limit: Duration, fut: F) -> Result<T, EngineError>
where
    F: Future<Output = Result<T, EngineError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::Timeout {
            operation: operation.to_string(),
            after_ms: limit.as_millis() as u64,
        }),
    }
}
