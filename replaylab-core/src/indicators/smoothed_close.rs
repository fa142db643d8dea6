//! Centered three-point smoothing of the latest `window` closes.
//!
//! Recomputed every frame and written backwards from the current candle, so
//! each new candle revises the previous smoothed values. With
//! `persist = false` only the latest window stays visible.

use crate::components::{History, Indicator, IndicatorEntry, IndicatorView};
use crate::domain::params::{param_usize, params};

#[derive(Debug, Clone)]
pub struct SmoothedClose {
    window: usize,
}

impl SmoothedClose {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }
}

impl Indicator for SmoothedClose {
    fn calculate(&mut self, history: &History<'_>, _deps: &IndicatorView<'_>) -> Vec<f64> {
        let closes: Vec<f64> = history.iter().take(self.window + 1).map(|c| c.close).collect();
        let n = self.window.min(history.len());
        (0..n)
            .map(|i| {
                let lo = i.saturating_sub(1);
                let hi = (i + 1).min(closes.len() - 1);
                let span = &closes[lo..=hi];
                span.iter().sum::<f64>() / span.len() as f64
            })
            .collect()
    }
}

pub fn entry() -> IndicatorEntry {
    IndicatorEntry::new(
        "smoothed_close",
        "three-point smoothed close, rewritten over the latest window",
        params([("window", 5.0)]),
        |p| Box::new(SmoothedClose::new(param_usize(p, "window", 5))),
    )
}
