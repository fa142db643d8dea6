//! The OHLC row shared by the candle store and the tick store.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// OHLC summary of price over one time unit.
///
/// Tick stores use the same shape; a tick usually has `open == high == low == close`.
/// Prices are in the symbol's base currency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn new(time: NaiveDateTime, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
        }
    }

    /// A candle whose four prices are all `price`.
    pub fn flat(time: NaiveDateTime, price: f64) -> Self {
        Self::new(time, price, price, price, price)
    }

    /// Returns true if any price field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high bounds everything from above, low from below.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
    }

    /// Start a synthetic in-progress candle from its first tick.
    ///
    /// The synthetic candle is stamped with `time` (the start of the candle it
    /// belongs to), not with the tick's own timestamp.
    pub fn opened_by(time: NaiveDateTime, tick: &Candle) -> Self {
        Self {
            time,
            open: tick.open,
            high: tick.open.max(tick.close),
            low: tick.open.min(tick.close),
            close: tick.close,
        }
    }

    /// Fold one more tick into a synthetic candle. Open is left untouched.
    pub fn extend(&mut self, tick: &Candle) {
        self.high = self.high.max(tick.close);
        self.low = self.low.min(tick.close);
        self.close = tick.close;
    }
}
