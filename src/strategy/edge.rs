//! Mispricing detection.
//!
//! Prices every candidate market with the at-the-money digital model,
//! compares the fair value with the market's YES price and emits a signal
//! when the gap clears the edge threshold. Signals keep market order.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use super::pricing::PricingModel;
use super::quote::QuoteEngine;
use crate::config::{AppConfig, AssetConfig, FallbackConfig, RiskConfig};
use crate::types::{CycleLog, EdgeSignal, Market, Side, SpotQuote};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Minimum containment score for a question to be associated with an asset.
const MATCH_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone)]
pub struct EdgeConfig {
    /// Minimum |divergence| in percentage points.
    pub threshold: f64,
    pub min_tradeable_price: f64,
    pub max_tradeable_price: f64,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self::from(&RiskConfig::default())
    }
}

impl From<&RiskConfig> for EdgeConfig {
    fn from(risk: &RiskConfig) -> Self {
        Self {
            threshold: risk.edge_threshold,
            min_tradeable_price: risk.min_tradeable_price,
            max_tradeable_price: risk.max_tradeable_price,
        }
    }
}

// ---------------------------------------------------------------------------
// Asset matching
// ---------------------------------------------------------------------------

fn tokens(s: &str) -> HashSet<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 2)
        .map(|w| {
            // "bitcoins" -> "bitcoin"
            if w.len() > 4 && w.ends_with('s') {
                w[..w.len() - 1].to_string()
            } else {
                w.to_string()
            }
        })
        .collect()
}

/// Share of `phrase` tokens present in `question` (0.0–1.0).
fn containment(question: &HashSet<String>, phrase: &str) -> f64 {
    let phrase = tokens(phrase);
    if phrase.is_empty() {
        return 0.0;
    }
    let hits = phrase.iter().filter(|w| question.contains(*w)).count();
    hits as f64 / phrase.len() as f64
}

/// Best-matching asset for a market question, if any clears the threshold.
/// Ties go to the asset listed first.
pub fn match_asset<'a>(question: &str, assets: &'a [AssetConfig]) -> Option<&'a AssetConfig> {
    let words = tokens(question);
    let mut best: Option<(&AssetConfig, f64)> = None;
    for asset in assets {
        let score = std::iter::once(asset.symbol.as_str())
            .chain(std::iter::once(asset.name.as_str()))
            .chain(asset.aliases.iter().map(String::as_str))
            .map(|phrase| containment(&words, phrase))
            .fold(0.0, f64::max);
        if score >= MATCH_THRESHOLD && best.map_or(true, |(_, s)| score > s) {
            best = Some((asset, score));
        }
    }
    best.map(|(asset, _)| asset)
}

// ---------------------------------------------------------------------------
// Spot context
// ---------------------------------------------------------------------------

/// Spot price resolved for one market.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotResolution {
    pub asset: String,
    pub spot: f64,
    /// Set when the default asset/spot pair was used, with the reason.
    pub fallback: Option<String>,
}

/// Spot prices fetched for this cycle plus the matching universe.
#[derive(Debug, Clone)]
pub struct SpotBook {
    assets: Vec<AssetConfig>,
    quotes: HashMap<String, SpotQuote>,
    fallback: FallbackConfig,
}

impl SpotBook {
    pub fn new(assets: Vec<AssetConfig>, fallback: FallbackConfig) -> Self {
        Self {
            assets,
            quotes: HashMap::new(),
            fallback,
        }
    }

    pub fn insert(&mut self, symbol: &str, quote: SpotQuote) {
        self.quotes.insert(symbol.to_string(), quote);
    }

    pub fn quote(&self, symbol: &str) -> Option<&SpotQuote> {
        self.quotes.get(symbol)
    }

    /// Associate a market with a spot price. Never fails: an unmatched
    /// question, or a matched asset without a live quote, degrades to the
    /// default pair and says so.
    pub fn resolve(&self, question: &str) -> SpotResolution {
        let reason = match match_asset(question, &self.assets) {
            Some(asset) => match self.quotes.get(&asset.symbol) {
                Some(q) if q.value > 0.0 => {
                    return SpotResolution {
                        asset: asset.symbol.clone(),
                        spot: q.value,
                        fallback: None,
                    }
                }
                _ => format!("no live spot for {}", asset.symbol),
            },
            None => "no asset matched question".to_string(),
        };

        // The default asset's live spot beats the fixed fallback value.
        let spot = self
            .quotes
            .get(&self.fallback.asset)
            .map(|q| q.value)
            .filter(|v| *v > 0.0)
            .unwrap_or(self.fallback.spot);

        SpotResolution {
            asset: self.fallback.asset.clone(),
            spot,
            fallback: Some(reason),
        }
    }
}

// ---------------------------------------------------------------------------
// Edge detection
// ---------------------------------------------------------------------------

pub struct EdgeDetector {
    config: EdgeConfig,
    model: PricingModel,
    quotes: QuoteEngine,
    horizon_years: f64,
}

impl EdgeDetector {
    pub fn new(config: EdgeConfig, model: PricingModel, quotes: QuoteEngine, horizon_years: f64) -> Self {
        Self {
            config,
            model,
            quotes,
            horizon_years,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            EdgeConfig::from(&config.risk),
            PricingModel::new(&config.model),
            QuoteEngine::new(config.quoting.clone()),
            config.model.horizon_years,
        )
    }

    pub fn config(&self) -> &EdgeConfig {
        &self.config
    }

    /// Evaluate every market in order. Produces exactly one SCAN entry per
    /// evaluated market, plus a SKIP for each excluded or sub-threshold one.
    pub fn scan(&self, markets: &[Market], book: &SpotBook) -> (Vec<EdgeSignal>, CycleLog) {
        let mut log = CycleLog::new();
        let mut signals = Vec::new();

        for market in markets {
            if let Some(signal) = self.evaluate(market, book, &mut log) {
                signals.push(signal);
            }
        }

        debug!(markets = markets.len(), signals = signals.len(), "Edge scan complete");
        (signals, log)
    }

    fn evaluate(&self, market: &Market, book: &SpotBook, log: &mut CycleLog) -> Option<EdgeSignal> {
        let yes = market.price_yes;
        if !(yes > self.config.min_tradeable_price && yes < self.config.max_tradeable_price) {
            log.skip(
                None,
                format!("{}: yes price {:.3} outside tradeable band", market.id, yes),
            );
            return None;
        }

        let resolved = book.resolve(&market.question);
        if let Some(reason) = &resolved.fallback {
            warn!(
                market_id = %market.id,
                asset = %resolved.asset,
                spot = resolved.spot,
                reason = %reason,
                "Using default spot"
            );
        }
        let asset = resolved.asset.as_str();

        let priced = match self.model.price_at_the_money(resolved.spot) {
            Ok(p) => p,
            Err(e) => {
                log.error(Some(asset), format!("{}: pricing failed: {e}", market.id));
                return None;
            }
        };

        let market_price = yes * 100.0;
        let divergence = priced.fair_value - market_price;

        let quote = match self.quotes.quote(priced.fair_value / 100.0, self.horizon_years, 0.0) {
            Ok(q) => format!("bid={:.2} ask={:.2}", q.bid * 100.0, q.ask * 100.0),
            Err(_) => "n/a".to_string(),
        };
        let fallback_note = resolved
            .fallback
            .as_ref()
            .map(|r| format!(" (spot fallback: {r})"))
            .unwrap_or_default();

        log.scan(
            Some(asset),
            format!(
                "{} \"{}\" spot={:.2}{} d2={:.6} N(d2)={:.6} model={:.2} mkt={:.2} edge={:+.2}pp quote {}",
                market.id,
                market.question,
                resolved.spot,
                fallback_note,
                priced.d2,
                priced.nd2,
                priced.fair_value,
                market_price,
                divergence,
                quote,
            ),
        );

        if divergence.abs() < self.config.threshold {
            log.skip(
                Some(asset),
                format!(
                    "{}: edge {:+.2}pp below {:.2}pp threshold",
                    market.id, divergence, self.config.threshold
                ),
            );
            return None;
        }

        let side = if divergence > 0.0 { Side::Buy } else { Side::Sell };
        Some(EdgeSignal {
            asset: asset.to_string(),
            market: market.clone(),
            model_fair: priced.fair_value,
            market_price,
            divergence,
            side,
            d2: priced.d2,
            nd2: priced.nd2,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
