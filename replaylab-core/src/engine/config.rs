//! Simulation configuration and the TOML replay file.
//!
//! ```toml
//! [simulation]
//! candles = "eurusd_h1.csv"
//! ticks = "eurusd_ticks.csv"
//! start = "2024-01-02 00:00"
//! stop = "2024-01-05 00:00"
//! interval = 0.05
//! use_ticks = true
//! trigger_policy = "last_price"
//!
//! [[indicator]]
//! name = "sma_20"
//! module = "sma"
//! params = { period = 20 }
//!
//! [[trader]]
//! name = "cross"
//! module = "ma_cross"
//! params = { fast_period = 10, slow_period = 30, spread = 0.0001 }
//! ```
//!
//! Relative paths are resolved against the replay file's directory.

use super::error::ConfigError;
use crate::data::{parse_timestamp, SeriesSource};
use crate::domain::Params;
use crate::orders::TriggerPolicy;
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

/// Indicator warm-up window, in candles.
pub const DEFAULT_LOOKBACK: usize = 100;

/// Everything `setup` needs.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub candles: SeriesSource,
    pub ticks: Option<SeriesSource>,
    pub start_time: NaiveDateTime,
    pub stop_time: NaiveDateTime,
    /// Wall-clock seconds per step.
    pub interval: f64,
    pub use_ticks: bool,
    pub trigger_policy: TriggerPolicy,
    pub lookback: usize,
}

impl SimulationConfig {
    pub fn new(candles: SeriesSource, start_time: NaiveDateTime, stop_time: NaiveDateTime) -> Self {
        Self {
            candles,
            ticks: None,
            start_time,
            stop_time,
            interval: 0.0,
            use_ticks: false,
            trigger_policy: TriggerPolicy::default(),
            lookback: DEFAULT_LOOKBACK,
        }
    }

    /// Attach a tick source and enable aggregation.
    pub fn with_ticks(mut self, ticks: SeriesSource) -> Self {
        self.ticks = Some(ticks);
        self.use_ticks = true;
        self
    }

    pub fn with_interval(mut self, seconds: f64) -> Self {
        self.interval = seconds;
        self
    }

    pub fn with_trigger_policy(mut self, policy: TriggerPolicy) -> Self {
        self.trigger_policy = policy;
        self
    }

    pub fn with_lookback(mut self, lookback: usize) -> Self {
        self.lookback = lookback;
        self
    }

    /// Checks that need no data loaded.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_time >= self.stop_time {
            return Err(ConfigError::InvalidTimeRange {
                start: self.start_time,
                stop: self.stop_time,
            });
        }
        validate_interval(self.interval)?;
        if self.use_ticks && self.ticks.is_none() {
            return Err(ConfigError::MissingTickSource);
        }
        Ok(())
    }
}

pub(crate) fn validate_interval(seconds: f64) -> Result<(), ConfigError> {
    if seconds.is_finite() && seconds >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NegativeInterval(seconds))
    }
}

// ── Replay file ──

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayFile {
    pub simulation: SimulationSection,
    #[serde(default, rename = "indicator")]
    pub indicators: Vec<PluginSection>,
    #[serde(default, rename = "trader")]
    pub traders: Vec<PluginSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationSection {
    pub candles: Option<PathBuf>,
    pub ticks: Option<PathBuf>,
    #[serde(deserialize_with = "timestamp")]
    pub start: NaiveDateTime,
    #[serde(deserialize_with = "timestamp")]
    pub stop: NaiveDateTime,
    #[serde(default)]
    pub interval: f64,
    #[serde(default)]
    pub use_ticks: bool,
    #[serde(default)]
    pub trigger_policy: TriggerPolicy,
    #[serde(default = "default_lookback")]
    pub lookback: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PluginSection {
    pub name: String,
    pub module: String,
    #[serde(default)]
    pub params: Params,
}

fn default_lookback() -> usize {
    DEFAULT_LOOKBACK
}

fn timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognised timestamp '{raw}'")))
}

impl ReplayFile {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Build the simulation config, resolving relative paths against `base_dir`.
    pub fn to_config(&self, base_dir: &Path) -> Result<SimulationConfig, ConfigError> {
        let sim = &self.simulation;
        let candles = sim
            .candles
            .as_ref()
            .map(|p| SeriesSource::Csv(base_dir.join(p)))
            .ok_or(ConfigError::MissingCandleSource)?;
        let mut config = SimulationConfig::new(candles, sim.start, sim.stop)
            .with_interval(sim.interval)
            .with_trigger_policy(sim.trigger_policy)
            .with_lookback(sim.lookback);
        config.ticks = sim.ticks.as_ref().map(|p| SeriesSource::Csv(base_dir.join(p)));
        config.use_ticks = sim.use_ticks;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TimeSeries;
    use crate::domain::ParamValue;
    use chrono::NaiveDate;

    fn at(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn memory() -> SeriesSource {
        SeriesSource::memory(TimeSeries::new(Vec::new()).unwrap())
    }

    #[test]
    fn rejects_inverted_range() {
        let config = SimulationConfig::new(memory(), at(3), at(2));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTimeRange { .. })
        ));
    }

    #[test]
    fn rejects_negative_interval() {
        let config = SimulationConfig::new(memory(), at(2), at(3)).with_interval(-0.5);
        assert!(matches!(config.validate(), Err(ConfigError::NegativeInterval(_))));
        let config = SimulationConfig::new(memory(), at(2), at(3)).with_interval(f64::NAN);
        assert!(matches!(config.validate(), Err(ConfigError::NegativeInterval(_))));
    }

    #[test]
    fn ticks_required_when_enabled() {
        let mut config = SimulationConfig::new(memory(), at(2), at(3));
        config.use_ticks = true;
        assert!(matches!(config.validate(), Err(ConfigError::MissingTickSource)));
        assert!(config.with_ticks(memory()).validate().is_ok());
    }

    #[test]
    fn parses_replay_file() {
        let file = ReplayFile::from_toml_str(
            r#"
            [simulation]
            candles = "candles.csv"
            ticks = "ticks.csv"
            start = "2024-01-02 00:00"
            stop = "2024-01-05"
            interval = 0.25
            use_ticks = true
            trigger_policy = "intrabar_range"

            [[indicator]]
            name = "sma_20"
            module = "sma"
            params = { period = 20 }

            [[trader]]
            name = "cross"
            module = "ma_cross"
            params = { fast_period = 5, slow_period = 20, spread = 0.0001 }
            "#,
        )
        .unwrap();
        assert_eq!(file.indicators.len(), 1);
        assert_eq!(file.indicators[0].params["period"], ParamValue::Number(20.0));
        assert_eq!(file.traders[0].module, "ma_cross");
        assert_eq!(file.simulation.lookback, DEFAULT_LOOKBACK);

        let config = file.to_config(Path::new("/data")).unwrap();
        assert!(config.use_ticks);
        assert_eq!(config.trigger_policy, TriggerPolicy::IntrabarRange);
        assert_eq!(config.start_time, at(2));
        assert_eq!(config.stop_time, at(5));
        match &config.candles {
            SeriesSource::Csv(path) => assert_eq!(path, Path::new("/data/candles.csv")),
            other => panic!("unexpected source {other:?}"),
        }
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bad_timestamp_is_a_toml_error() {
        let err = ReplayFile::from_toml_str(
            r#"
            [simulation]
            start = "soon"
            stop = "2024-01-05"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn missing_candles_reported() {
        let file = ReplayFile::from_toml_str(
            r#"
            [simulation]
            start = "2024-01-02"
            stop = "2024-01-05"
            "#,
        )
        .unwrap();
        assert!(matches!(
            file.to_config(Path::new(".")),
            Err(ConfigError::MissingCandleSource)
        ));
    }
}
