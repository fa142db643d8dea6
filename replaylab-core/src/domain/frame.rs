//! Frame: the unit of simulated state published each step.

use super::Candle;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Simulated state at one step of the replay.
///
/// Invariants:
/// - `current_candle` is `None` whenever tick aggregation is disabled.
/// - `core_data_idx` is always a valid row of the candle store.
/// - `reset` is true exactly once per (re)configuration or explicit reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Index into the candle store of the completed-or-in-progress candle.
    pub core_data_idx: usize,
    /// Current simulated timestamp (tick time when ticks drive the replay).
    pub time: NaiveDateTime,
    /// Synthetic not-yet-closed candle built from ticks.
    pub current_candle: Option<Candle>,
    /// "Discard incremental state, recompute from scratch."
    pub reset: bool,
}

impl Frame {
    /// The initial frame of a (re)configured replay.
    pub fn initial(
        core_data_idx: usize,
        time: NaiveDateTime,
        current_candle: Option<Candle>,
    ) -> Self {
        Self {
            core_data_idx,
            time,
            current_candle,
            reset: true,
        }
    }
}

/// Stepping direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Forward,
    Backward,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Backward => write!(f, "backward"),
        }
    }
}
