//! Most-recent-first view of candle history.

use crate::domain::Candle;

/// History as plugins see it: `get(0)` is "now", `get(1)` the previous closed
/// candle, and so on back to the first candle of the store.
///
/// "Now" is the synthetic in-progress candle when ticks drive the replay,
/// otherwise the candle at the frame's index. Built once per frame and shared
/// by every plugin.
#[derive(Debug, Clone, Copy)]
pub struct History<'a> {
    current: Candle,
    closed: &'a [Candle],
}

impl<'a> History<'a> {
    /// `closed` holds the candles strictly before the current one, oldest first.
    pub fn new(current: Candle, closed: &'a [Candle]) -> Self {
        Self { current, closed }
    }

    /// Number of candles visible, the current one included.
    pub fn len(&self) -> usize {
        self.closed.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Candle-store index of the current candle.
    pub fn index(&self) -> usize {
        self.closed.len()
    }

    pub fn current(&self) -> &Candle {
        &self.current
    }

    /// Candle `back` steps ago.
    pub fn get(&self, back: usize) -> Option<&Candle> {
        if back == 0 {
            Some(&self.current)
        } else {
            self.closed.len().checked_sub(back).map(|i| &self.closed[i])
        }
    }

    pub fn close(&self, back: usize) -> Option<f64> {
        self.get(back).map(|c| c.close)
    }

    /// Closed candles, oldest first.
    pub fn closed(&self) -> &'a [Candle] {
        self.closed
    }

    /// Candles from now backwards.
    pub fn iter(&self) -> impl Iterator<Item = &Candle> + '_ {
        std::iter::once(&self.current).chain(self.closed.iter().rev())
    }

    /// Mean close of the latest `period` candles, or None if history is shorter.
    pub fn mean_close(&self, period: usize) -> Option<f64> {
        if period == 0 || period > self.len() {
            return None;
        }
        let sum: f64 = self.iter().take(period).map(|c| c.close).sum();
        Some(sum / period as f64)
    }
}
