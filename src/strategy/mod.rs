//! Strategy layer: fair-value pricing, edge detection, Kelly sizing,
//! quoting and risk limits.
//!
//! Everything here is synchronous and deterministic apart from the sizer's
//! venue lookups; the engine drives these pieces once per cycle.

pub mod edge;
pub mod kelly;
pub mod pricing;
pub mod quote;
pub mod risk;

pub use edge::{EdgeConfig, EdgeDetector, SpotBook, SpotResolution};
pub use kelly::{PositionSizer, SizingOutcome};
pub use pricing::{PriceOutput, PricingModel};
pub use quote::{Quote, QuoteEngine};
pub use risk::{DrawdownTracker, HaltReason, RiskState};
