//! Closed-form fair value for a short-horizon binary contract.
//!
//! The contract pays 1 if the underlying settles above the strike. Under
//! the Black–Scholes measure its value is the discounted probability
//! `e^(−rT)·N(d2)`. The engine always strikes at spot, so the value is an
//! estimate of the chance a short "up" market settles YES given only the
//! deterministic drift and volatility terms.

use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::types::EngineError;

// ---------------------------------------------------------------------------
// Standard normal CDF
// ---------------------------------------------------------------------------

// Abramowitz & Stegun 26.2.17, |error| < 7.5e-8.
const AS_P: f64 = 0.231_641_9;
const AS_B1: f64 = 0.319_381_530;
const AS_B2: f64 = -0.356_563_782;
const AS_B3: f64 = 1.781_477_937;
const AS_B4: f64 = -1.821_255_978;
const AS_B5: f64 = 1.330_274_429;
const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// Standard normal density.
pub fn normal_pdf(x: f64) -> f64 {
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Standard normal cumulative distribution function.
pub fn normal_cdf(x: f64) -> f64 {
    if x.is_nan() {
        return f64::NAN;
    }
    let z = x.abs();
    let t = 1.0 / (1.0 + AS_P * z);
    let poly = t * (AS_B1 + t * (AS_B2 + t * (AS_B3 + t * (AS_B4 + t * AS_B5))));
    let upper_tail = normal_pdf(z) * poly;
    if x >= 0.0 {
        1.0 - upper_tail
    } else {
        upper_tail
    }
}

// ---------------------------------------------------------------------------
// Pricing model
// ---------------------------------------------------------------------------

/// Intermediate terms and result of one pricing call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceOutput {
    pub d2: f64,
    pub nd2: f64,
    /// Fair value in percentage points (0–100).
    pub fair_value: f64,
}

/// Digital-option fair-value estimator.
#[derive(Debug, Clone)]
pub struct PricingModel {
    volatility: f64,
    horizon_years: f64,
    risk_free_rate: f64,
}

impl PricingModel {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            volatility: config.volatility,
            horizon_years: config.horizon_years,
            risk_free_rate: config.risk_free_rate,
        }
    }

    /// Price an at-the-money contract on `spot` with the configured σ, T, r.
    pub fn price_at_the_money(&self, spot: f64) -> Result<PriceOutput, EngineError> {
        Self::price(spot, spot, self.volatility, self.horizon_years, self.risk_free_rate)
    }

    /// `d2 = (ln(S/K) + (r − σ²/2)·T) / (σ·√T)`, `fair = e^(−rT)·N(d2)·100`.
    pub fn price(
        spot: f64,
        strike: f64,
        volatility: f64,
        horizon: f64,
        rate: f64,
    ) -> Result<PriceOutput, EngineError> {
        if !(volatility > 0.0) || !volatility.is_finite() {
            return Err(EngineError::domain(format!("volatility must be positive, got {volatility}")));
        }
        if !(horizon > 0.0) || !horizon.is_finite() {
            return Err(EngineError::domain(format!("horizon must be positive, got {horizon}")));
        }
        if !(spot > 0.0) || !spot.is_finite() || !(strike > 0.0) || !strike.is_finite() {
            return Err(EngineError::domain(format!(
                "spot and strike must be positive, got spot={spot} strike={strike}"
            )));
        }
        if !rate.is_finite() {
            return Err(EngineError::domain(format!("rate must be finite, got {rate}")));
        }

        let vol_sqrt_t = volatility * horizon.sqrt();
        let d2 = ((spot / strike).ln() + (rate - 0.5 * volatility * volatility) * horizon) / vol_sqrt_t;
        let nd2 = normal_cdf(d2);
        let fair_value = ((-rate * horizon).exp() * nd2 * 100.0).clamp(0.0, 100.0);

        Ok(PriceOutput { d2, nd2, fair_value })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use statrs::distribution::{ContinuousCDF, Normal};

    const SPOT: f64 = 66_235.0;
    const SIGMA: f64 = 0.50;
    const T: f64 = 0.0000095;
    const R: f64 = 0.0433;

    #[test]
    fn test_normal_cdf_matches_reference() {
        let reference = Normal::new(0.0, 1.0).unwrap();
        let mut x = -6.0;
        while x <= 6.0 {
            let err = (normal_cdf(x) - reference.cdf(x)).abs();
            assert!(err < 1e-6, "x={x} err={err}");
            x += 0.01;
        }
    }

    #[test]
    fn test_normal_cdf_seven_digit_accuracy() {
        let reference = Normal::new(0.0, 1.0).unwrap();
        for i in -600..=600 {
            let x = i as f64 / 100.0;
            assert!((normal_cdf(x) - reference.cdf(x)).abs() < 1e-7, "x={x}");
        }
    }

    #[test]
    fn test_normal_cdf_symmetry_and_midpoint() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-9);
        for x in [0.1, 0.7, 1.5, 3.0] {
            assert!((normal_cdf(x) + normal_cdf(-x) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_reference_scenario() {
        // d2 = (0.0433 − 0.125)·T / (0.5·√T)
        let expected_d2 = (R - 0.5 * SIGMA * SIGMA) * T / (SIGMA * T.sqrt());
        let out = PricingModel::price(SPOT, SPOT, SIGMA, T, R).unwrap();

        assert!((out.d2 - expected_d2).abs() < 1e-15);
        assert!((out.d2 - (-5.0363e-4)).abs() < 1e-7);
        assert!((out.nd2 - 0.499_799).abs() < 1e-6);
        assert!((out.fair_value - 49.9799).abs() < 1e-3);
        let expected_fair = (-R * T).exp() * out.nd2 * 100.0;
        assert!((out.fair_value - expected_fair).abs() < 1e-12);
    }

    #[test]
    fn test_moneyness_moves_value() {
        let itm = PricingModel::price(110.0, 100.0, 0.5, 0.1, 0.0).unwrap();
        let otm = PricingModel::price(90.0, 100.0, 0.5, 0.1, 0.0).unwrap();
        assert!(itm.fair_value > 50.0);
        assert!(otm.fair_value < 50.0);
    }

    #[test]
    fn test_fair_value_bounded() {
        for sigma in [0.01, 0.2, 0.5, 1.0, 3.0] {
            for t in [1e-7, 0.0000095, 0.01, 1.0, 10.0] {
                for r in [-0.5, 0.0, 0.0433, 0.5, 5.0] {
                    let out = PricingModel::price(SPOT, SPOT, sigma, t, r).unwrap();
                    assert!((0.0..=100.0).contains(&out.fair_value), "sigma={sigma} t={t} r={r}");
                }
            }
        }
    }

    #[test]
    fn test_fair_value_non_decreasing_in_rate() {
        for sigma in [0.2, 0.5, 1.0] {
            for t in [0.0000095, 0.001, 0.01] {
                let mut prev = f64::NEG_INFINITY;
                for step in 0..=20 {
                    let r = step as f64 * 0.01;
                    let fair = PricingModel::price(SPOT, SPOT, sigma, t, r).unwrap().fair_value;
                    assert!(fair >= prev, "sigma={sigma} t={t} r={r}");
                    prev = fair;
                }
            }
        }
    }

    #[test]
    fn test_rejects_non_positive_inputs() {
        assert!(matches!(PricingModel::price(SPOT, SPOT, 0.0, T, R), Err(EngineError::Domain(_))));
        assert!(matches!(PricingModel::price(SPOT, SPOT, -0.1, T, R), Err(EngineError::Domain(_))));
        assert!(matches!(PricingModel::price(SPOT, SPOT, SIGMA, 0.0, R), Err(EngineError::Domain(_))));
        assert!(matches!(PricingModel::price(SPOT, SPOT, SIGMA, -1.0, R), Err(EngineError::Domain(_))));
        assert!(matches!(PricingModel::price(0.0, SPOT, SIGMA, T, R), Err(EngineError::Domain(_))));
        assert!(matches!(PricingModel::price(SPOT, SPOT, f64::NAN, T, R), Err(EngineError::Domain(_))));
    }

    #[test]
    fn test_pricing_is_bit_identical() {
        let model = PricingModel::new(&ModelConfig::default());
        let a = model.price_at_the_money(SPOT).unwrap();
        let b = model.price_at_the_money(SPOT).unwrap();
        assert_eq!(a.d2.to_bits(), b.d2.to_bits());
        assert_eq!(a.nd2.to_bits(), b.nd2.to_bits());
        assert_eq!(a.fair_value.to_bits(), b.fair_value.to_bits());
    }
}
