//! Time series store with integer indexing and time lookups.

use super::source::DataError;
use crate::domain::{Candle, SeriesFingerprint};
use chrono::NaiveDateTime;

/// How a timestamp lookup resolves to a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// First row whose time equals the target.
    Equal,
    /// First row whose time is at or after the target.
    GreaterOrEqual,
    /// Last row whose time is at or before the target.
    LessOrEqual,
}

/// Ordered OHLC rows, ascending by time.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    rows: Vec<Candle>,
    fingerprint: SeriesFingerprint,
}

impl TimeSeries {
    /// Build a series, rejecting rows that go backward in time.
    ///
    /// Equal consecutive timestamps are accepted (tick feeds repeat them).
    pub fn new(rows: Vec<Candle>) -> Result<Self, DataError> {
        if let Some(pos) = rows.windows(2).position(|w| w[1].time < w[0].time) {
            return Err(DataError::NotSorted { row: pos + 1 });
        }
        let fingerprint = fingerprint_rows(&rows);
        Ok(Self { rows, fingerprint })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Candle> {
        self.rows.get(index)
    }

    pub fn rows(&self) -> &[Candle] {
        &self.rows
    }

    pub fn time(&self, index: usize) -> Option<NaiveDateTime> {
        self.rows.get(index).map(|c| c.time)
    }

    pub fn first(&self) -> Option<&Candle> {
        self.rows.first()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.rows.last()
    }

    pub fn fingerprint(&self) -> &SeriesFingerprint {
        &self.fingerprint
    }

    /// Binary-search the row matching `time` under `lookup`.
    pub fn index_of(&self, time: NaiveDateTime, lookup: Lookup) -> Option<usize> {
        match lookup {
            Lookup::GreaterOrEqual => {
                let idx = self.rows.partition_point(|c| c.time < time);
                (idx < self.rows.len()).then_some(idx)
            }
            Lookup::LessOrEqual => {
                let idx = self.rows.partition_point(|c| c.time <= time);
                idx.checked_sub(1)
            }
            Lookup::Equal => self
                .index_of(time, Lookup::GreaterOrEqual)
                .filter(|&idx| self.rows[idx].time == time),
        }
    }

    /// Walk from `hint` toward the row matching `time` under `lookup`.
    ///
    /// Cheap when the target sits near the hint, which is the common case
    /// when resolving times close to the current frame.
    pub fn index_from_hint(
        &self,
        time: NaiveDateTime,
        lookup: Lookup,
        hint: usize,
    ) -> Option<usize> {
        if self.rows.is_empty() {
            return None;
        }
        let mut idx = hint.min(self.rows.len() - 1);
        match lookup {
            Lookup::LessOrEqual => {
                if self.rows[idx].time <= time {
                    while idx + 1 < self.rows.len() && self.rows[idx + 1].time <= time {
                        idx += 1;
                    }
                    Some(idx)
                } else {
                    while self.rows[idx].time > time {
                        idx = idx.checked_sub(1)?;
                    }
                    Some(idx)
                }
            }
            Lookup::GreaterOrEqual => {
                if self.rows[idx].time >= time {
                    while idx > 0 && self.rows[idx - 1].time >= time {
                        idx -= 1;
                    }
                    Some(idx)
                } else {
                    while self.rows[idx].time < time {
                        idx += 1;
                        if idx == self.rows.len() {
                            return None;
                        }
                    }
                    Some(idx)
                }
            }
            Lookup::Equal => self
                .index_from_hint(time, Lookup::GreaterOrEqual, hint)
                .filter(|&idx| self.rows[idx].time == time),
        }
    }
}

impl std::ops::Index<usize> for TimeSeries {
    type Output = Candle;

    fn index(&self, index: usize) -> &Candle {
        &self.rows[index]
    }
}

fn fingerprint_rows(rows: &[Candle]) -> SeriesFingerprint {
    let mut bytes = Vec::with_capacity(rows.len() * 40);
    for row in rows {
        bytes.extend_from_slice(&row.time.and_utc().timestamp_micros().to_le_bytes());
        for price in [row.open, row.high, row.low, row.close] {
            bytes.extend_from_slice(&price.to_bits().to_le_bytes());
        }
    }
    SeriesFingerprint::from_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn hourly(hours: &[u32]) -> TimeSeries {
        TimeSeries::new(
            hours
                .iter()
                .map(|&h| Candle::flat(at(h), 100.0 + h as f64))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_unsorted_rows() {
        let rows = vec![Candle::flat(at(2), 1.0), Candle::flat(at(1), 1.0)];
        match TimeSeries::new(rows) {
            Err(DataError::NotSorted { row }) => assert_eq!(row, 1),
            other => panic!("expected NotSorted, got {other:?}"),
        }
    }

    #[test]
    fn accepts_repeated_timestamps() {
        let rows = vec![Candle::flat(at(1), 1.0), Candle::flat(at(1), 1.1)];
        assert_eq!(TimeSeries::new(rows).unwrap().len(), 2);
    }

    #[test]
    fn lookup_greater_or_equal() {
        let s = hourly(&[1, 3, 5, 7]);
        assert_eq!(s.index_of(at(0), Lookup::GreaterOrEqual), Some(0));
        assert_eq!(s.index_of(at(3), Lookup::GreaterOrEqual), Some(1));
        assert_eq!(s.index_of(at(4), Lookup::GreaterOrEqual), Some(2));
        assert_eq!(s.index_of(at(8), Lookup::GreaterOrEqual), None);
    }

    #[test]
    fn lookup_less_or_equal() {
        let s = hourly(&[1, 3, 5, 7]);
        assert_eq!(s.index_of(at(0), Lookup::LessOrEqual), None);
        assert_eq!(s.index_of(at(3), Lookup::LessOrEqual), Some(1));
        assert_eq!(s.index_of(at(4), Lookup::LessOrEqual), Some(1));
        assert_eq!(s.index_of(at(9), Lookup::LessOrEqual), Some(3));
    }

    #[test]
    fn lookup_equal() {
        let s = hourly(&[1, 3, 5]);
        assert_eq!(s.index_of(at(5), Lookup::Equal), Some(2));
        assert_eq!(s.index_of(at(4), Lookup::Equal), None);
    }

    #[test]
    fn hinted_lookup_matches_binary_search() {
        let s = hourly(&[1, 3, 5, 7, 9, 11]);
        for target in 0..13 {
            for hint in 0..8 {
                for lookup in [Lookup::LessOrEqual, Lookup::GreaterOrEqual, Lookup::Equal] {
                    assert_eq!(
                        s.index_from_hint(at(target), lookup, hint),
                        s.index_of(at(target), lookup),
                        "target={target} hint={hint} lookup={lookup:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = hourly(&[1, 2]);
        let b = hourly(&[1, 2]);
        let c = hourly(&[1, 3]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
