//! ReplayLab Core: candle/tick replay with pluggable indicators and traders.
//!
//! This crate contains the simulation core:
//! - Domain types (candles, frames, orders, plugin parameters)
//! - Time series store with ordered time lookups, CSV loading, synthetic data
//! - Tick-to-candle aggregation that steps forward and backward
//! - Indicator dependency graph with persistent or decaying outputs
//! - Per-trader order books with price-triggered state transitions
//! - Controller with a stepping worker and one-frame-in-flight publication

pub mod components;
pub mod data;
pub mod domain;
pub mod engine;
pub mod indicators;
pub mod orders;
pub mod traders;
