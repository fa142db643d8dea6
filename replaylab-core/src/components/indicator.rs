//! Indicator trait and the read-only view of indicator outputs.
//!
//! An indicator is evaluated once per frame against the most-recent-first
//! history. It returns one or more values: the first is written at the current
//! candle index, the next one slot earlier, and so on. Returning several
//! values lets an indicator revise the recent past.

use super::history::History;
use thiserror::Error;

/// Runtime errors raised by plugin evaluation. Logged, never fatal.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PluginError {
    #[error("'{0}' evaluated before it was initialized")]
    NotInitialized(String),
}

/// Trait for indicators.
///
/// `initialize` is the optional warm-up hook; it is only called when the
/// plugin registered with `has_initialize`. Both hooks may return an empty
/// vector to leave the output untouched.
pub trait Indicator: Send {
    fn initialize(&mut self, history: &History<'_>, deps: &IndicatorView<'_>) -> Vec<f64> {
        let _ = (history, deps);
        Vec::new()
    }

    fn calculate(&mut self, history: &History<'_>, deps: &IndicatorView<'_>) -> Vec<f64>;
}

/// One indicator's output series, one slot per candle.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorOutput {
    pub name: String,
    pub values: Vec<f64>,
}

impl IndicatorOutput {
    pub fn new(name: impl Into<String>, len: usize) -> Self {
        Self {
            name: name.into(),
            values: vec![f64::NAN; len],
        }
    }

    pub fn get(&self, index: usize) -> f64 {
        self.values.get(index).copied().unwrap_or(f64::NAN)
    }
}

/// Read access to other indicators' outputs at the frame being evaluated.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorView<'a> {
    outputs: &'a [IndicatorOutput],
    index: usize,
}

impl<'a> IndicatorView<'a> {
    pub fn new(outputs: &'a [IndicatorOutput], index: usize) -> Self {
        Self { outputs, index }
    }

    /// A view with nothing in it.
    pub fn empty(index: usize) -> Self {
        Self { outputs: &[], index }
    }

    /// Candle index the view is anchored at.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn series(&self, name: &str) -> Option<&'a [f64]> {
        self.outputs
            .iter()
            .find(|o| o.name == name)
            .map(|o| o.values.as_slice())
    }

    /// Value of `name`, `back` candles before the current one. NaN when missing.
    pub fn value(&self, name: &str, back: usize) -> f64 {
        match (self.series(name), self.index.checked_sub(back)) {
            (Some(values), Some(i)) => values.get(i).copied().unwrap_or(f64::NAN),
            _ => f64::NAN,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.series(name).is_some()
    }
}
