//! Simple Moving Average (SMA).
//!
//! Mean close over the latest `period` candles, the in-progress one included.
//! NaN until `period` candles are visible.

use crate::components::{History, Indicator, IndicatorEntry, IndicatorView};
use crate::domain::params::{param_usize, params};

#[derive(Debug, Clone)]
pub struct Sma {
    period: usize,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
        }
    }

    /// Conventional instance name, e.g. `sma_20`.
    pub fn name_for(period: usize) -> String {
        format!("sma_{period}")
    }
}

impl Indicator for Sma {
    fn initialize(&mut self, history: &History<'_>, deps: &IndicatorView<'_>) -> Vec<f64> {
        self.calculate(history, deps)
    }

    fn calculate(&mut self, history: &History<'_>, _deps: &IndicatorView<'_>) -> Vec<f64> {
        vec![history.mean_close(self.period).unwrap_or(f64::NAN)]
    }
}

pub fn entry() -> IndicatorEntry {
    IndicatorEntry::new(
        "sma",
        "simple moving average of close",
        params([("period", 20.0)]),
        |p| Box::new(Sma::new(param_usize(p, "period", 20))),
    )
    .with_initialize()
}
