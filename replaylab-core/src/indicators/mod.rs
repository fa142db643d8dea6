//! Built-in indicators.
//!
//! Each module exposes the indicator type plus an `entry()` that describes it
//! to the plugin registry. Multi-line indicators (the envelope) are exposed as
//! one named instance per band.

pub mod close;
pub mod ema;
pub mod envelope;
pub mod sma;
pub mod smoothed_close;

pub use close::Close;
pub use ema::Ema;
pub use envelope::{Envelope, EnvelopeBand};
pub use sma::Sma;
pub use smoothed_close::SmoothedClose;

use crate::components::PluginRegistry;

pub fn register_builtins(registry: &mut PluginRegistry) {
    registry.register_indicator(close::entry());
    registry.register_indicator(sma::entry());
    registry.register_indicator(ema::entry());
    registry.register_indicator(envelope::entry());
    registry.register_indicator(smoothed_close::entry());
}

/// Candles from close prices, one hour apart, oldest first.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<crate::domain::Candle> {
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            crate::domain::Candle::flat(base + chrono::Duration::hours(i as i64), close)
        })
        .collect()
}

/// Default epsilon for floating-point comparisons in indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "expected {expected}, got {actual} (diff {})",
        (actual - expected).abs()
    );
}
