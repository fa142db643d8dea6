//! Error taxonomy of the engine.
//!
//! `ConfigError` blocks progress until the configuration is fixed.
//! `ControlError` reports a refused operation; the engine state is unchanged.

use crate::components::FactoryError;
use crate::data::DataError;
use crate::domain::Direction;
use chrono::NaiveDateTime;
use std::path::PathBuf;
use thiserror::Error;

use super::controller::SimState;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("start time {start} is not before stop time {stop}")]
    InvalidTimeRange {
        start: NaiveDateTime,
        stop: NaiveDateTime,
    },

    #[error("interval must be a non-negative number of seconds, got {0}")]
    NegativeInterval(f64),

    #[error("tick aggregation requested but no tick source configured")]
    MissingTickSource,

    #[error("no candle source configured")]
    MissingCandleSource,

    #[error("no data between {start} and {stop}")]
    NoDataInRange {
        start: NaiveDateTime,
        stop: NaiveDateTime,
    },

    #[error("cyclic indicator dependency: {}", .path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    #[error("indicator '{name}' is declared twice with different modules or parameters")]
    DependencyConflict { name: String },

    #[error("a plugin named '{0}' already exists")]
    DuplicateName(String),

    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid replay file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Factory(#[from] FactoryError),
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("refused while {0:?}")]
    Busy(SimState),

    #[error("simulation is already running")]
    AlreadyRunning,

    #[error("simulation is not running")]
    NotRunning,

    #[error("simulation is not configured")]
    NotConfigured,

    #[error("configuration is not valid")]
    InvalidInput,

    #[error("cannot step while running")]
    SteppingWhileRunning,

    #[error("cannot step {0}: at the edge of the replay window")]
    AtBoundary(Direction),

    #[error("interval must be a non-negative number of seconds, got {0}")]
    NegativeInterval(f64),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
