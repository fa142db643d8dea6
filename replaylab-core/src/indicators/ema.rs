//! Exponential Moving Average (EMA).
//!
//! EMA[t] = alpha * close[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (period + 1),
//! seeded with the first close. Values for closed candles never change, so
//! they are cached by candle index and reused when stepping back and forth.

use crate::components::{History, Indicator, IndicatorEntry, IndicatorView};
use crate::domain::params::{param_usize, params};

#[derive(Debug, Clone)]
pub struct Ema {
    alpha: f64,
    /// EMA of each closed candle, by candle index.
    closed: Vec<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            alpha: 2.0 / (period.max(1) as f64 + 1.0),
            closed: Vec::new(),
        }
    }

    fn step(&self, prev: Option<f64>, close: f64) -> f64 {
        match prev {
            Some(prev) => self.alpha * close + (1.0 - self.alpha) * prev,
            None => close,
        }
    }

    /// Extend the closed-candle cache to cover everything before `history.index()`.
    fn catch_up(&mut self, history: &History<'_>) {
        let closed = history.closed();
        while self.closed.len() < closed.len() {
            let i = self.closed.len();
            let value = self.step(self.closed.last().copied(), closed[i].close);
            self.closed.push(value);
        }
    }

    fn value(&mut self, history: &History<'_>) -> f64 {
        self.catch_up(history);
        let prev = history.index().checked_sub(1).map(|i| self.closed[i]);
        self.step(prev, history.current().close)
    }
}

impl Indicator for Ema {
    fn initialize(&mut self, history: &History<'_>, _deps: &IndicatorView<'_>) -> Vec<f64> {
        vec![self.value(history)]
    }

    fn calculate(&mut self, history: &History<'_>, _deps: &IndicatorView<'_>) -> Vec<f64> {
        vec![self.value(history)]
    }
}

pub fn entry() -> IndicatorEntry {
    IndicatorEntry::new(
        "ema",
        "exponential moving average of close",
        params([("period", 20.0)]),
        |p| Box::new(Ema::new(param_usize(p, "period", 20))),
    )
    .with_initialize()
}
