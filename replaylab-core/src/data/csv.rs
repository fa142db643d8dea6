//! CSV loader for candle and tick files.
//!
//! Expected header: `Date,Open,High,Low,Close` (lowercase also accepted).
//! Extra columns are ignored.

use super::series::TimeSeries;
use super::source::DataError;
use crate::domain::Candle;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y.%m.%d %H:%M:%S",
    "%Y.%m.%d %H:%M",
];

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "date", alias = "Time", alias = "time")]
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Open", alias = "open")]
    open: f64,
    #[serde(rename = "High", alias = "high")]
    high: f64,
    #[serde(rename = "Low", alias = "low")]
    low: f64,
    #[serde(rename = "Close", alias = "close")]
    close: f64,
}

/// Parse one of the accepted timestamp layouts. A bare date means midnight.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Load a CSV file into a validated series.
pub fn read_csv(path: &Path) -> Result<TimeSeries, DataError> {
    let file = std::fs::File::open(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_csv_from_reader(file)
}

/// Load CSV rows from any reader.
pub fn read_csv_from_reader<R: Read>(reader: R) -> Result<TimeSeries, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (row, record) in rdr.deserialize::<CsvRow>().enumerate() {
        let record = record?;
        let time = parse_timestamp(&record.date).ok_or_else(|| DataError::BadTimestamp {
            row,
            value: record.date.clone(),
        })?;
        let candle = Candle::new(time, record.open, record.high, record.low, record.close);
        if candle.is_void() {
            return Err(DataError::InvalidRow {
                row,
                reason: "NaN price".into(),
            });
        }
        rows.push(candle);
    }
    TimeSeries::new(rows)
}
