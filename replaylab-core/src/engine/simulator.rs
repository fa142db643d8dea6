//! Simulator: the single-threaded replay core.
//!
//! Owns the loaded series, the replay cursor and both plugin engines. Every
//! mutation of frame, indicator or order state goes through `&mut Simulator`;
//! the controller serializes access and runs the stepping loop.

use super::config::SimulationConfig;
use super::cursor::ReplayCursor;
use super::error::{ConfigError, ControlError};
use super::indicator_engine::IndicatorEngine;
use super::trader_engine::TraderEngine;
use crate::components::{History, PluginRegistry};
use crate::data::{SeriesCache, TimeSeries};
use crate::domain::{Direction, Frame, OrderGroup, Params};
use crate::orders::{order_curves, OrderBook, OrderCurves};
use chrono::NaiveDateTime;
use std::sync::Arc;

pub struct Simulator {
    registry: Arc<PluginRegistry>,
    cache: SeriesCache,
    config: Option<SimulationConfig>,
    cursor: Option<ReplayCursor>,
    indicators: IndicatorEngine,
    traders: TraderEngine,
    input_valid: bool,
    /// Bumped for every frame produced, initial frames included.
    sequence: u64,
}

impl Simulator {
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self {
            registry,
            cache: SeriesCache::new(),
            config: None,
            cursor: None,
            indicators: IndicatorEngine::new(),
            traders: TraderEngine::new(),
            input_valid: false,
            sequence: 0,
        }
    }

    /// A simulator over the built-in plugins.
    pub fn with_builtins() -> Self {
        Self::new(Arc::new(PluginRegistry::with_builtins()))
    }

    // ─── Configuration ───────────────────────────────────────────────

    /// Load data, position the cursor and warm up every plugin.
    ///
    /// Either the whole configuration is accepted and the initial frame is
    /// returned, or the previous configuration is kept and the input is
    /// flagged invalid.
    pub fn setup(&mut self, config: SimulationConfig) -> Result<Frame, ConfigError> {
        match self.try_setup(config) {
            Ok(frame) => {
                self.input_valid = true;
                Ok(frame)
            }
            Err(e) => {
                tracing::warn!("setup rejected: {e}");
                self.input_valid = false;
                Err(e)
            }
        }
    }

    fn try_setup(&mut self, config: SimulationConfig) -> Result<Frame, ConfigError> {
        config.validate()?;
        let candles = self.cache.load(&config.candles)?;
        let ticks = match (&config.ticks, config.use_ticks) {
            (Some(source), true) => Some(self.cache.load(source)?),
            _ => None,
        };
        let cursor = ReplayCursor::new(
            Arc::clone(&candles),
            ticks,
            config.start_time,
            config.stop_time,
        )?;

        let (indicators, traders) = self.warmed_up(&cursor, &config)?;
        tracing::info!(
            candles = %config.candles.label(),
            fingerprint = %candles.fingerprint().short(),
            start = cursor.core_index(),
            ticks = cursor.ticks().is_some(),
            "simulation configured"
        );
        self.indicators = indicators;
        self.traders = traders;
        self.cursor = Some(cursor);
        self.config = Some(config);
        self.initial_frame()
    }

    /// Fresh engines initialized over the look-back window ending at the cursor.
    fn warmed_up(
        &self,
        cursor: &ReplayCursor,
        config: &SimulationConfig,
    ) -> Result<(IndicatorEngine, TraderEngine), ConfigError> {
        let candles = cursor.candles();
        let mut indicators = self.indicators.rebuilt(&self.registry, candles.len())?;
        let mut traders =
            self.traders
                .rebuilt(&self.registry, candles.len(), config.trigger_policy)?;
        let start = cursor.core_index();
        indicators.init(candles.rows(), start, config.lookback);
        traders.init(candles.rows(), indicators.outputs(), start, config.lookback);
        Ok((indicators, traders))
    }

    /// Register an indicator. When configured, every plugin is rebuilt and
    /// the replay returns to its start; the new initial frame is returned.
    pub fn add_indicator(
        &mut self,
        name: &str,
        module: &str,
        params: &Params,
    ) -> Result<Option<Frame>, ConfigError> {
        let registry = Arc::clone(&self.registry);
        let added = self.indicators.add(&registry, name, module, params);
        self.after_add(added.map(|_| ()))
    }

    /// Register a trader and the indicators it depends on.
    pub fn add_trader(
        &mut self,
        name: &str,
        module: &str,
        params: &Params,
    ) -> Result<Option<Frame>, ConfigError> {
        let registry = Arc::clone(&self.registry);
        let added = self
            .traders
            .add(&registry, &mut self.indicators, name, module, params);
        self.after_add(added)
    }

    fn after_add(&mut self, added: Result<(), ConfigError>) -> Result<Option<Frame>, ConfigError> {
        if let Err(e) = added {
            tracing::warn!("plugin rejected: {e}");
            self.input_valid = false;
            return Err(e);
        }
        if self.cursor.is_none() {
            return Ok(None);
        }
        match self.reinitialize() {
            Ok(frame) => {
                self.input_valid = true;
                Ok(Some(frame))
            }
            Err(e) => {
                tracing::warn!("rebuild after add failed: {e}");
                self.input_valid = false;
                Err(e)
            }
        }
    }

    /// Rebuild every plugin and rewind to the start of the replay window.
    pub fn reset(&mut self) -> Result<Frame, ControlError> {
        if self.cursor.is_none() {
            tracing::warn!("reset refused: not configured");
            return Err(ControlError::NotConfigured);
        }
        Ok(self.reinitialize()?)
    }

    fn reinitialize(&mut self) -> Result<Frame, ConfigError> {
        let (Some(cursor), Some(config)) = (self.cursor.as_mut(), self.config.as_ref()) else {
            return Err(ConfigError::MissingCandleSource);
        };
        cursor.rewind();
        let cursor = cursor.clone();
        let config = config.clone();
        let (indicators, traders) = self.warmed_up(&cursor, &config)?;
        self.indicators = indicators;
        self.traders = traders;
        self.initial_frame()
    }

    fn initial_frame(&mut self) -> Result<Frame, ConfigError> {
        let cursor = self.cursor.as_ref().ok_or(ConfigError::MissingCandleSource)?;
        self.sequence += 1;
        Ok(cursor.initial_frame())
    }

    // ─── Stepping ────────────────────────────────────────────────────

    pub fn can_step(&self, direction: Direction) -> bool {
        self.cursor
            .as_ref()
            .is_some_and(|c| c.can_step(direction))
    }

    /// Move one aggregation unit and run every plugin on the new frame.
    pub fn step(&mut self, direction: Direction) -> Result<Frame, ControlError> {
        let Some(cursor) = self.cursor.as_mut() else {
            tracing::warn!(%direction, "step refused: not configured");
            return Err(ControlError::NotConfigured);
        };
        if !cursor.step(direction) {
            tracing::warn!(%direction, index = cursor.core_index(), "step refused: at the edge of the replay window");
            return Err(ControlError::AtBoundary(direction));
        }
        let frame = cursor.frame();
        self.process(&frame);
        self.sequence += 1;
        tracing::trace!(index = frame.core_data_idx, time = %frame.time, "stepped {direction}");
        Ok(frame)
    }

    /// Run indicators then traders against `frame`.
    ///
    /// History is built once and shared: the in-progress candle (or the
    /// candle itself without ticks) followed by every closed candle before it.
    fn process(&mut self, frame: &Frame) {
        let Some(cursor) = self.cursor.as_ref() else {
            return;
        };
        let candles = Arc::clone(cursor.candles());
        let index = frame.core_data_idx;
        let current = frame.current_candle.unwrap_or(candles[index]);
        let history = History::new(current, &candles.rows()[..index]);

        self.indicators.update(&history);
        self.traders
            .update(&history, self.indicators.outputs(), frame.time);
    }

    // ─── Queries ─────────────────────────────────────────────────────

    pub fn is_configured(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn is_input_valid(&self) -> bool {
        self.input_valid
    }

    pub fn config(&self) -> Option<&SimulationConfig> {
        self.config.as_ref()
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn frame(&self) -> Option<Frame> {
        self.cursor.as_ref().map(ReplayCursor::frame)
    }

    pub fn candles(&self) -> Option<&Arc<TimeSeries>> {
        self.cursor.as_ref().map(ReplayCursor::candles)
    }

    pub fn tick_index(&self) -> Option<usize> {
        self.cursor.as_ref().and_then(ReplayCursor::tick_index)
    }

    pub fn indicator_names(&self) -> impl Iterator<Item = &str> {
        self.indicators.names()
    }

    pub fn indicator_output(&self, name: &str) -> Option<&[f64]> {
        self.indicators.output(name)
    }

    pub fn trader_names(&self) -> impl Iterator<Item = &str> {
        self.traders.names()
    }

    /// Start balance plus realized profit of one trader, or of all of them.
    pub fn balance(&self, trader: Option<&str>) -> f64 {
        self.traders.balance(trader)
    }

    pub fn equity(&self, trader: &str) -> Option<&[f64]> {
        self.traders.equity(trader)
    }

    pub fn order_book(&self, trader: &str) -> Option<&OrderBook> {
        self.traders.book(trader)
    }

    /// Display curves of one trader's orders over the `n` candles ending at
    /// `time`. Orders still open are drawn up to the current frame's price.
    pub fn order_curves(
        &self,
        trader: &str,
        group: OrderGroup,
        time: NaiveDateTime,
        n: usize,
    ) -> Option<OrderCurves> {
        let cursor = self.cursor.as_ref()?;
        let book = self.traders.book(trader)?;
        let index = cursor.core_index();
        let price = cursor
            .current_candle()
            .unwrap_or(cursor.candles()[index])
            .close;
        Some(order_curves(
            book,
            cursor.candles(),
            group,
            time,
            n,
            cursor.time(),
            price,
            index,
        ))
    }
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("configured", &self.is_configured())
            .field("input_valid", &self.input_valid)
            .field("indicators", &self.indicators.names().collect::<Vec<_>>())
            .field("traders", &self.traders.names().collect::<Vec<_>>())
            .field("sequence", &self.sequence)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SeriesSource;
    use crate::domain::params::params;
    use crate::domain::Candle;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn candles(n: usize) -> SeriesSource {
        let rows = (0..n)
            .map(|i| Candle::flat(t0() + Duration::hours(i as i64), 100.0 + i as f64))
            .collect();
        SeriesSource::memory(TimeSeries::new(rows).unwrap())
    }

    fn config(n: usize) -> SimulationConfig {
        SimulationConfig::new(candles(n), t0() + Duration::hours(3), t0() + Duration::hours(n as i64))
    }

    #[test]
    fn setup_positions_at_start_and_warms_up() {
        let mut sim = Simulator::with_builtins();
        sim.add_indicator("close", "close", &Params::new()).unwrap();
        let frame = sim.setup(config(10)).unwrap();
        assert!(frame.reset);
        assert_eq!(frame.core_data_idx, 3);
        assert!(frame.current_candle.is_none());
        assert!(sim.is_input_valid());
        // close has a warm-up hook that writes each look-back candle
        let close = sim.indicator_output("close").unwrap();
        assert_eq!(close[3], 103.0);
        assert!(close[0].is_nan());
    }

    #[test]
    fn rejected_setup_keeps_previous_configuration() {
        let mut sim = Simulator::with_builtins();
        sim.setup(config(10)).unwrap();
        sim.step(Direction::Forward).unwrap();

        let bad = SimulationConfig::new(candles(10), t0() + Duration::hours(5), t0());
        assert!(matches!(sim.setup(bad), Err(ConfigError::InvalidTimeRange { .. })));
        assert!(!sim.is_input_valid());
        assert_eq!(sim.frame().unwrap().core_data_idx, 4);
    }

    #[test]
    fn steps_run_plugins_and_refuse_edges() {
        let mut sim = Simulator::with_builtins();
        sim.add_indicator("sma_2", "sma", &params([("period", 2.0)]))
            .unwrap();
        sim.setup(config(6)).unwrap();
        assert!(matches!(
            sim.step(Direction::Backward),
            Err(ControlError::AtBoundary(Direction::Backward))
        ));
        let frame = sim.step(Direction::Forward).unwrap();
        assert_eq!(frame.core_data_idx, 4);
        assert!(!frame.reset);
        assert_eq!(sim.indicator_output("sma_2").unwrap()[4], 103.5);

        sim.step(Direction::Forward).unwrap();
        assert!(!sim.can_step(Direction::Forward));
        assert!(sim.step(Direction::Forward).is_err());
    }

    #[test]
    fn adding_while_configured_rewinds() {
        let mut sim = Simulator::with_builtins();
        sim.setup(config(10)).unwrap();
        sim.step(Direction::Forward).unwrap();
        let frame = sim
            .add_indicator("sma_3", "sma", &params([("period", 3.0)]))
            .unwrap()
            .unwrap();
        assert!(frame.reset);
        assert_eq!(frame.core_data_idx, 3);
        assert_eq!(sim.indicator_output("sma_3").unwrap().len(), 10);
    }

    #[test]
    fn failed_add_invalidates_input() {
        let mut sim = Simulator::with_builtins();
        sim.setup(config(10)).unwrap();
        let err = sim
            .add_indicator("x", "sma", &params([("lenght", 3.0)]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Factory(_)));
        assert!(!sim.is_input_valid());
        sim.add_indicator("x", "sma", &params([("period", 3.0)]))
            .unwrap();
        assert!(sim.is_input_valid());
    }

    #[test]
    fn failed_rebuild_after_add_invalidates_input() {
        let mut sim = Simulator::with_builtins();
        sim.setup(config(10)).unwrap();
        assert!(sim.is_input_valid());
        // a cursor without its configuration cannot be rebuilt
        sim.config = None;
        let err = sim.add_indicator("close", "close", &Params::new()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCandleSource));
        assert!(!sim.is_input_valid());
    }

    #[test]
    fn sequence_counts_every_frame() {
        let mut sim = Simulator::with_builtins();
        sim.setup(config(10)).unwrap();
        sim.step(Direction::Forward).unwrap();
        sim.reset().unwrap();
        assert_eq!(sim.sequence(), 3);
    }
}
