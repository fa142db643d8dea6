//! Replay cursor: frame position and tick-to-candle aggregation.
//!
//! Without ticks the cursor walks the candle store one candle at a time.
//! With ticks it walks the tick store; the candle a tick belongs to is the
//! last candle starting at or before it, and the in-progress candle is the
//! fold of that candle's ticks seen so far.
//!
//! Stepping forward extends the in-progress candle in O(1), or opens a fresh
//! one when the tick crosses into the next candle. Stepping backward cannot
//! undo an extension, so it rebuilds the candle by replaying its ticks from
//! the candle's first tick. Both paths fold with the same operations in the
//! same order, so a forward/backward round trip is bit-exact.

use super::error::ConfigError;
use crate::data::{Lookup, TimeSeries};
use crate::domain::{Candle, Direction, Frame};
use chrono::NaiveDateTime;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Position {
    core: usize,
    /// Next tick to apply; every tick before it has been consumed. Only
    /// meaningful when ticks drive the replay.
    next_tick: usize,
}

#[derive(Debug, Clone)]
pub struct ReplayCursor {
    candles: Arc<TimeSeries>,
    ticks: Option<Arc<TimeSeries>>,
    stop_time: NaiveDateTime,
    origin: Position,
    pos: Position,
    current_candle: Option<Candle>,
}

impl ReplayCursor {
    /// Position at the first candle starting at or after `start_time`.
    ///
    /// With ticks, the first tick of that candle is applied. A candle with no
    /// ticks inside the window starts as a flat candle at its open, and the
    /// first step applies the next tick wherever it falls.
    pub fn new(
        candles: Arc<TimeSeries>,
        ticks: Option<Arc<TimeSeries>>,
        start_time: NaiveDateTime,
        stop_time: NaiveDateTime,
    ) -> Result<Self, ConfigError> {
        let no_data = || ConfigError::NoDataInRange {
            start: start_time,
            stop: stop_time,
        };
        let core = candles
            .index_of(start_time, Lookup::GreaterOrEqual)
            .ok_or_else(no_data)?;
        if candles[core].time > stop_time {
            return Err(no_data());
        }

        let mut next_tick = 0;
        if let Some(ticks) = &ticks {
            let first = ticks
                .index_of(candles[core].time, Lookup::GreaterOrEqual)
                .unwrap_or(ticks.len());
            let owned = ticks.time(first).is_some_and(|t| {
                t <= stop_time
                    && candles.index_from_hint(t, Lookup::LessOrEqual, core) == Some(core)
            });
            next_tick = if owned { first + 1 } else { first };
            if !owned {
                tracing::debug!(candle = core, "start candle has no ticks, seeding it from its open");
            }
        }

        let origin = Position { core, next_tick };
        let mut cursor = Self {
            candles,
            ticks,
            stop_time,
            origin,
            pos: origin,
            current_candle: None,
        };
        cursor.rebuild();
        Ok(cursor)
    }

    pub fn candles(&self) -> &Arc<TimeSeries> {
        &self.candles
    }

    pub fn ticks(&self) -> Option<&Arc<TimeSeries>> {
        self.ticks.as_ref()
    }

    pub fn core_index(&self) -> usize {
        self.pos.core
    }

    /// The last tick applied to the current candle, if it has any.
    pub fn tick_index(&self) -> Option<usize> {
        let ticks = self.ticks.as_ref()?;
        let last = self.pos.next_tick.checked_sub(1)?;
        (ticks[last].time >= self.candles[self.pos.core].time).then_some(last)
    }

    pub fn origin_index(&self) -> usize {
        self.origin.core
    }

    pub fn current_candle(&self) -> Option<Candle> {
        self.current_candle
    }

    /// Current simulated time: the last applied tick's time with ticks, else
    /// the candle's.
    pub fn time(&self) -> NaiveDateTime {
        match (&self.ticks, self.tick_index()) {
            (Some(ticks), Some(tick)) => ticks[tick].time,
            _ => self.candles[self.pos.core].time,
        }
    }

    pub fn frame(&self) -> Frame {
        Frame {
            core_data_idx: self.pos.core,
            time: self.time(),
            current_candle: self.current_candle,
            reset: false,
        }
    }

    /// The frame at the cursor, flagged as a fresh start.
    pub fn initial_frame(&self) -> Frame {
        Frame::initial(self.pos.core, self.time(), self.current_candle)
    }

    /// Whether one more step in `direction` stays inside the replay window.
    ///
    /// Forward with ticks, the next tick and the candle it falls into must
    /// both start no later than the stop time.
    pub fn can_step(&self, direction: Direction) -> bool {
        match (direction, &self.ticks) {
            (Direction::Backward, None) => self.pos.core > self.origin.core,
            (Direction::Backward, Some(_)) => self.pos.next_tick > self.origin.next_tick,
            (Direction::Forward, None) => self
                .candles
                .time(self.pos.core + 1)
                .is_some_and(|t| t <= self.stop_time),
            (Direction::Forward, Some(ticks)) => {
                let Some(next_tick) = ticks.time(self.pos.next_tick) else {
                    return false;
                };
                let next_candle = self
                    .candles
                    .index_from_hint(next_tick, Lookup::LessOrEqual, self.pos.core)
                    .and_then(|i| self.candles.time(i));
                next_tick <= self.stop_time && next_candle.is_some_and(|t| t <= self.stop_time)
            }
        }
    }

    /// Move one aggregation unit. Returns false, without moving, at the edges.
    pub fn step(&mut self, direction: Direction) -> bool {
        if !self.can_step(direction) {
            return false;
        }
        let Some(ticks) = self.ticks.clone() else {
            self.pos.core = match direction {
                Direction::Forward => self.pos.core + 1,
                Direction::Backward => self.pos.core - 1,
            };
            return true;
        };

        match direction {
            Direction::Forward => {
                let tick = ticks[self.pos.next_tick];
                self.pos.next_tick += 1;
                let owner = self.owner_of(&tick);
                if owner != self.pos.core {
                    self.pos.core = owner;
                    self.current_candle = Some(Candle::opened_by(self.candles[owner].time, &tick));
                } else if let Some(candle) = self.current_candle.as_mut() {
                    candle.extend(&tick);
                } else {
                    self.rebuild();
                }
            }
            Direction::Backward => {
                self.pos.next_tick -= 1;
                if self.pos.next_tick == self.origin.next_tick {
                    self.pos = self.origin;
                } else {
                    self.pos.core = self.owner_of(&ticks[self.pos.next_tick - 1]);
                }
                self.rebuild();
            }
        }
        true
    }

    /// Return to the setup position.
    pub fn rewind(&mut self) {
        self.pos = self.origin;
        self.rebuild();
    }

    fn owner_of(&self, tick: &Candle) -> usize {
        // ticks past the origin never precede the origin candle, so the lookup always lands
        self.candles
            .index_from_hint(tick.time, Lookup::LessOrEqual, self.pos.core)
            .unwrap_or(self.pos.core)
    }

    /// Fold the current candle's ticks up to the cursor, or seed it from its
    /// open when none have arrived.
    fn rebuild(&mut self) {
        let Some(ticks) = &self.ticks else {
            self.current_candle = None;
            return;
        };
        let core = self.candles[self.pos.core];
        let Some(last) = self.tick_index() else {
            self.current_candle = Some(Candle::flat(core.time, core.open));
            return;
        };
        let first = ticks
            .index_from_hint(core.time, Lookup::GreaterOrEqual, last)
            .unwrap_or(last)
            .min(last);
        let rows = &ticks.rows()[first..=last];
        let mut candle = Candle::opened_by(core.time, &rows[0]);
        for tick in &rows[1..] {
            candle.extend(tick);
        }
        self.current_candle = Some(candle);
    }
}
