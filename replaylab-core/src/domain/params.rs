//! Plugin parameters: named config values with deterministic ordering.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ParamValue {
    /// Name of the variant, for type errors.
    pub fn kind(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Number(_) => "number",
            ParamValue::Text(_) => "text",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Number(v) => write!(f, "{v}"),
            ParamValue::Text(v) => write!(f, "\"{v}\""),
        }
    }
}

/// Named parameters. `BTreeMap` keeps listings and hashes deterministic.
pub type Params = BTreeMap<String, ParamValue>;

/// Build a `Params` map from `(name, value)` pairs.
pub fn params<I, K, V>(pairs: I) -> Params
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<ParamValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Extract a named f64 parameter, falling back to `default`.
pub fn param_f64(params: &Params, name: &str, default: f64) -> f64 {
    params.get(name).and_then(ParamValue::as_f64).unwrap_or(default)
}

/// Extract a named usize parameter, falling back to `default`.
pub fn param_usize(params: &Params, name: &str, default: usize) -> usize {
    params
        .get(name)
        .and_then(ParamValue::as_f64)
        .filter(|v| *v >= 0.0)
        .map(|v| v as usize)
        .unwrap_or(default)
}

/// Extract a named bool parameter, falling back to `default`.
pub fn param_bool(params: &Params, name: &str, default: bool) -> bool {
    params
        .get(name)
        .and_then(ParamValue::as_bool)
        .unwrap_or(default)
}
