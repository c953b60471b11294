//! Avellaneda–Stoikov quoting in log-odds space.
//!
//! The half-spread is
//! `δ = γ·σ_b²·T/2 + (1/γ)·ln(1 + γ/k)`
//! where γ is risk aversion, σ_b the belief volatility of the log-odds and
//! k the order-arrival decay. Quotes are built around the fair-value logit
//! and mapped back through the logistic function, so both sides remain
//! valid probabilities however close the fair value sits to 0 or 1.
//!
//! Quotes are display context only; they never gate execution.

use serde::{Deserialize, Serialize};

use crate::config::QuotingConfig;
use crate::types::EngineError;

/// `ln(p / (1 − p))`
pub fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

/// `1 / (1 + e^(−x))`
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Bid/ask probabilities around a fair value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
    /// Half-spread in log-odds units.
    pub half_spread: f64,
}

#[derive(Debug, Clone)]
pub struct QuoteEngine {
    config: QuotingConfig,
}

impl QuoteEngine {
    pub fn new(config: QuotingConfig) -> Self {
        Self { config }
    }

    /// Optimal half-spread. Inventory does not enter δ itself; it shifts the
    /// reservation logit in [`QuoteEngine::quote_with`].
    pub fn half_spread(
        risk_aversion: f64,
        belief_vol: f64,
        horizon: f64,
        _inventory: f64,
        arrival_decay: f64,
    ) -> Result<f64, EngineError> {
        if !(risk_aversion > 0.0) {
            return Err(EngineError::domain(format!("risk aversion must be positive, got {risk_aversion}")));
        }
        if !(arrival_decay > 0.0) {
            return Err(EngineError::domain(format!("arrival decay must be positive, got {arrival_decay}")));
        }
        if belief_vol < 0.0 || horizon < 0.0 || !belief_vol.is_finite() || !horizon.is_finite() {
            return Err(EngineError::domain(format!(
                "belief volatility and horizon must be non-negative, got σ_b={belief_vol} T={horizon}"
            )));
        }
        let inventory_term = risk_aversion * belief_vol * belief_vol * horizon / 2.0;
        let arrival_term = (1.0 + risk_aversion / arrival_decay).ln() / risk_aversion;
        Ok(inventory_term + arrival_term)
    }

    /// Quote a fair probability `p` ∈ (0, 1) with the configured parameters.
    pub fn quote(&self, p: f64, horizon: f64, inventory: f64) -> Result<Quote, EngineError> {
        Self::quote_with(
            p,
            self.config.risk_aversion,
            self.config.belief_volatility,
            horizon,
            inventory,
            self.config.arrival_decay,
        )
    }

    /// `bid = σ(x_r − δ)`, `ask = σ(x_r + δ)` with reservation logit
    /// `x_r = logit(p) − inventory·γ·σ_b²·T`.
    pub fn quote_with(
        p: f64,
        risk_aversion: f64,
        belief_vol: f64,
        horizon: f64,
        inventory: f64,
        arrival_decay: f64,
    ) -> Result<Quote, EngineError> {
        if !(p > 0.0 && p < 1.0) {
            return Err(EngineError::domain(format!("fair probability must be in (0, 1), got {p}")));
        }
        let delta = Self::half_spread(risk_aversion, belief_vol, horizon, inventory, arrival_decay)?;
        let reservation = logit(p) - inventory * risk_aversion * belief_vol * belief_vol * horizon;
        Ok(Quote {
            bid: sigmoid(reservation - delta),
            ask: sigmoid(reservation + delta),
            half_spread: delta,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
