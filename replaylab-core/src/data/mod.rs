//! Data layer: the time series store, its loaders, and the source cache.
//!
//! A `TimeSeries` is an ordered, integer-indexed table of OHLC rows with O(1)
//! row access and monotonic time lookups. The same type stores candles and
//! ticks. Sources are loaded once per setup; CSV sources are cached by path.

pub mod csv;
pub mod series;
pub mod source;
pub mod synthetic;

pub use self::csv::{parse_timestamp, read_csv, read_csv_from_reader};
pub use series::{Lookup, TimeSeries};
pub use source::{DataError, SeriesCache, SeriesSource};
pub use synthetic::{generate, SyntheticSpec};
