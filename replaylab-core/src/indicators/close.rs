//! Close price of the current candle.

use crate::components::{History, Indicator, IndicatorEntry, IndicatorView};
use crate::domain::Params;

#[derive(Debug, Clone, Default)]
pub struct Close;

impl Indicator for Close {
    fn initialize(&mut self, history: &History<'_>, _deps: &IndicatorView<'_>) -> Vec<f64> {
        vec![history.current().close]
    }

    fn calculate(&mut self, history: &History<'_>, _deps: &IndicatorView<'_>) -> Vec<f64> {
        vec![history.current().close]
    }
}

pub fn entry() -> IndicatorEntry {
    IndicatorEntry::new("close", "close price of the current candle", Params::new(), |_| {
        Box::new(Close)
    })
    .with_initialize()
}
