//! Trader engine: per-trader order books, equity, and per-frame evaluation.
//!
//! Orders are never rewound. A trader only processes frames strictly later
//! than the last one it saw, so scrubbing backward replays indicators but
//! leaves order state as it was.

use super::error::ConfigError;
use super::indicator_engine::IndicatorEngine;
use crate::components::{
    History, IndicatorOutput, IndicatorView, PluginError, PluginRegistry, Trader, TraderContext,
};
use crate::domain::params::{param_bool, param_f64};
use crate::domain::{Candle, Params};
use crate::orders::{OrderBook, Quote, TriggerPolicy};
use chrono::NaiveDateTime;

/// Balance every trader starts from.
pub const DEFAULT_START_BALANCE: f64 = 10_000.0;

struct TraderSlot {
    name: String,
    module: String,
    params: Params,
    plugin: Box<dyn Trader>,
    book: OrderBook,
    has_initialize: bool,
    persist: bool,
    equity: Vec<f64>,
    last_equity_idx: Option<usize>,
    last_time: Option<NaiveDateTime>,
    initialized: bool,
}

pub struct TraderEngine {
    slots: Vec<TraderSlot>,
    start_balance: f64,
    policy: TriggerPolicy,
    len: usize,
}

impl Default for TraderEngine {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            start_balance: DEFAULT_START_BALANCE,
            policy: TriggerPolicy::default(),
            len: 0,
        }
    }
}

impl TraderEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.iter().any(|s| s.name == name)
    }

    fn slot(&self, name: &str) -> Option<&TraderSlot> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// Add a trader and the indicators it depends on, or nothing at all.
    pub fn add(
        &mut self,
        registry: &PluginRegistry,
        indicators: &mut IndicatorEngine,
        name: &str,
        module: &str,
        params: &Params,
    ) -> Result<(), ConfigError> {
        if self.contains(name) {
            return Err(ConfigError::DuplicateName(name.to_string()));
        }
        let entry = registry.trader(module)?;
        let resolved = entry.descriptor.resolve_params(params)?;

        // Stage on a scratch copy so a failing dependency leaves `indicators` as it was.
        let mut staged = indicators.rebuilt(registry, 0)?;
        for dep in (entry.dependencies)(&resolved) {
            staged.add_dependency(registry, &dep.name, &dep.module, &dep.params)?;
        }
        for dep in (entry.dependencies)(&resolved) {
            indicators.add_dependency(registry, &dep.name, &dep.module, &dep.params)?;
        }

        let slot = self.build_slot(registry, name.to_string(), module.to_string(), resolved)?;
        self.slots.push(slot);
        tracing::info!(trader = name, module, "trader added");
        Ok(())
    }

    fn build_slot(
        &self,
        registry: &PluginRegistry,
        name: String,
        module: String,
        params: Params,
    ) -> Result<TraderSlot, ConfigError> {
        let entry = registry.trader(&module)?;
        Ok(TraderSlot {
            plugin: (entry.build)(&params),
            book: OrderBook::new(param_f64(&params, "spread", 0.0)),
            has_initialize: entry.descriptor.has_initialize,
            persist: param_bool(&params, "persist", true),
            equity: vec![f64::NAN; self.len],
            last_equity_idx: None,
            last_time: None,
            initialized: false,
            name,
            module,
            params,
        })
    }

    /// Fresh traders with empty books, sized for `len` candles.
    pub fn rebuilt(
        &self,
        registry: &PluginRegistry,
        len: usize,
        policy: TriggerPolicy,
    ) -> Result<Self, ConfigError> {
        let mut engine = Self {
            slots: Vec::with_capacity(self.slots.len()),
            start_balance: self.start_balance,
            policy,
            len,
        };
        for slot in &self.slots {
            let fresh = engine.build_slot(
                registry,
                slot.name.clone(),
                slot.module.clone(),
                slot.params.clone(),
            )?;
            engine.slots.push(fresh);
        }
        Ok(engine)
    }

    /// Warm up every trader over `max(1, start - lookback)..=start`.
    pub fn init(
        &mut self,
        candles: &[Candle],
        outputs: &[IndicatorOutput],
        start: usize,
        lookback: usize,
    ) {
        let first = start.saturating_sub(lookback).max(1);
        for index in first..=start.min(candles.len().saturating_sub(1)) {
            let history = History::new(candles[index], &candles[..index]);
            let view = IndicatorView::new(outputs, index);
            for slot in self.slots.iter_mut().filter(|s| s.has_initialize) {
                slot.plugin.initialize(&history, &view);
            }
        }
        for slot in &mut self.slots {
            slot.initialized = true;
            slot.last_time = None;
        }
    }

    /// Advance orders, then let each trader act, for a frame at `time`.
    pub fn update(
        &mut self,
        history: &History<'_>,
        outputs: &[IndicatorOutput],
        time: NaiveDateTime,
    ) -> Vec<PluginError> {
        let index = history.index();
        let candle = *history.current();
        let quote = Quote::at(time, candle.close).with_range(candle.low, candle.high);
        let mut errors = Vec::new();

        for slot in &mut self.slots {
            if !slot.initialized {
                let err = PluginError::NotInitialized(slot.name.clone());
                tracing::warn!("{err}");
                errors.push(err);
                continue;
            }
            if slot.last_time.is_some_and(|last| time <= last) {
                continue;
            }
            slot.last_time = Some(time);
            slot.book.update(&quote, self.policy);

            let mut ctx = TraderContext::new(
                &slot.name,
                *history,
                IndicatorView::new(outputs, index),
                &mut slot.book,
                quote,
            );
            slot.plugin.calculate(&mut ctx);

            let equity = self.start_balance
                + slot.book.realized_profit()
                + slot.book.floating_profit(quote.price);
            if !slot.persist {
                if let Some(last) = slot.last_equity_idx {
                    slot.equity[last] = f64::NAN;
                }
            }
            if let Some(value) = slot.equity.get_mut(index) {
                *value = equity;
                slot.last_equity_idx = Some(index);
            }
        }
        errors
    }

    /// Start balance plus realized profit of one trader, or of all when `name` is None.
    pub fn balance(&self, name: Option<&str>) -> f64 {
        let realized: f64 = self
            .slots
            .iter()
            .filter(|s| name.map_or(true, |n| s.name == n))
            .map(|s| s.book.realized_profit())
            .sum();
        self.start_balance + realized
    }

    pub fn equity(&self, name: &str) -> Option<&[f64]> {
        self.slot(name).map(|s| s.equity.as_slice())
    }

    pub fn book(&self, name: &str) -> Option<&OrderBook> {
        self.slot(name).map(|s| &s.book)
    }
}
