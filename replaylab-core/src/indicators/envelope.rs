//! Moving-average envelope band.
//!
//! Reads its `sma_<period>` dependency and shifts it up or down by
//! `deviation` percent. One instance per band.

use super::sma::Sma;
use crate::components::{DependencySpec, History, Indicator, IndicatorEntry, IndicatorView};
use crate::domain::params::{param_f64, param_usize, params};
use crate::domain::{ParamValue, Params};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeBand {
    Upper,
    Lower,
}

#[derive(Debug, Clone)]
pub struct Envelope {
    source: String,
    factor: f64,
}

impl Envelope {
    pub fn new(period: usize, deviation_pct: f64, band: EnvelopeBand) -> Self {
        let shift = deviation_pct / 100.0;
        Self {
            source: Sma::name_for(period),
            factor: match band {
                EnvelopeBand::Upper => 1.0 + shift,
                EnvelopeBand::Lower => 1.0 - shift,
            },
        }
    }

    fn value(&self, deps: &IndicatorView<'_>) -> f64 {
        deps.value(&self.source, 0) * self.factor
    }
}

impl Indicator for Envelope {
    fn initialize(&mut self, _history: &History<'_>, deps: &IndicatorView<'_>) -> Vec<f64> {
        vec![self.value(deps)]
    }

    fn calculate(&mut self, _history: &History<'_>, deps: &IndicatorView<'_>) -> Vec<f64> {
        vec![self.value(deps)]
    }
}

fn band(p: &Params) -> EnvelopeBand {
    match p.get("band").and_then(ParamValue::as_str) {
        Some("lower") => EnvelopeBand::Lower,
        _ => EnvelopeBand::Upper,
    }
}

fn dependencies(p: &Params) -> Vec<DependencySpec> {
    let period = param_usize(p, "period", 20);
    vec![DependencySpec::new(
        Sma::name_for(period),
        "sma",
        params([("period", period as f64)]),
    )]
}

pub fn entry() -> IndicatorEntry {
    let mut defaults = params([("period", 20.0), ("deviation", 0.1)]);
    defaults.insert("band".into(), ParamValue::Text("upper".into()));
    IndicatorEntry::new(
        "envelope",
        "sma shifted by a percentage (band = upper | lower)",
        defaults,
        |p| {
            Box::new(Envelope::new(
                param_usize(p, "period", 20),
                param_f64(p, "deviation", 0.1),
                band(p),
            ))
        },
    )
    .with_initialize()
    .with_dependencies(dependencies)
}
