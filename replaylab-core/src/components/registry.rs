//! Plugin registry: module name → descriptor + constructor.
//!
//! Each plugin module declares its parameters (with defaults), whether it has
//! a warm-up hook, and which indicators it depends on. Dependencies are
//! derived from the resolved parameters so that, for example, `envelope` with
//! `period = 20` depends on an indicator named `sma_20`.

use super::indicator::Indicator;
use super::trader::Trader;
use crate::domain::{ParamValue, Params};
use serde::Serialize;
use std::collections::BTreeMap;

// ─── Error type ──────────────────────────────────────────────────────

/// Errors that can occur while turning a module name into a plugin.
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum FactoryError {
    #[error("Unknown indicator module: {0}")]
    UnknownIndicator(String),
    #[error("Unknown trader module: {0}")]
    UnknownTrader(String),
    #[error("Unknown parameters for '{module}': {}", .names.join(", "))]
    UnknownParameters { module: String, names: Vec<String> },
    #[error("Parameter '{name}' of '{module}' must be a {expected}, got a {found}")]
    WrongParameterType {
        module: String,
        name: String,
        expected: &'static str,
        found: &'static str,
    },
}

// ─── Descriptors ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    Indicator,
    Trader,
}

/// A named indicator a plugin reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencySpec {
    pub name: String,
    pub module: String,
    pub params: Params,
}

impl DependencySpec {
    pub fn new(name: impl Into<String>, module: impl Into<String>, params: Params) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            params,
        }
    }
}

/// Static description of a plugin module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginDescriptor {
    pub module: String,
    pub kind: PluginKind,
    pub summary: String,
    /// Accepted parameters and their defaults.
    pub parameters: Params,
    pub has_initialize: bool,
}

impl PluginDescriptor {
    /// Overlay `supplied` on the defaults. Names the module never declared are rejected.
    pub fn resolve_params(&self, supplied: &Params) -> Result<Params, FactoryError> {
        let unknown: Vec<String> = supplied
            .keys()
            .filter(|k| !self.parameters.contains_key(*k))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(FactoryError::UnknownParameters {
                module: self.module.clone(),
                names: unknown,
            });
        }
        for (name, value) in supplied {
            let Some(expected) = self.parameters.get(name).map(ParamValue::kind) else {
                continue;
            };
            if value.kind() != expected {
                return Err(FactoryError::WrongParameterType {
                    module: self.module.clone(),
                    name: name.clone(),
                    expected,
                    found: value.kind(),
                });
            }
        }
        let mut resolved = self.parameters.clone();
        resolved.extend(supplied.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(resolved)
    }
}

pub type IndicatorBuilder = fn(&Params) -> Box<dyn Indicator>;
pub type TraderBuilder = fn(&Params) -> Box<dyn Trader>;
pub type DependencyResolver = fn(&Params) -> Vec<DependencySpec>;

fn no_dependencies(_: &Params) -> Vec<DependencySpec> {
    Vec::new()
}

pub struct IndicatorEntry {
    pub descriptor: PluginDescriptor,
    pub dependencies: DependencyResolver,
    pub build: IndicatorBuilder,
}

impl IndicatorEntry {
    /// Every indicator accepts `persist` (default true).
    pub fn new(module: &str, summary: &str, mut parameters: Params, build: IndicatorBuilder) -> Self {
        parameters
            .entry("persist".into())
            .or_insert(ParamValue::Bool(true));
        Self {
            descriptor: PluginDescriptor {
                module: module.into(),
                kind: PluginKind::Indicator,
                summary: summary.into(),
                parameters,
                has_initialize: false,
            },
            dependencies: no_dependencies,
            build,
        }
    }

    pub fn with_initialize(mut self) -> Self {
        self.descriptor.has_initialize = true;
        self
    }

    pub fn with_dependencies(mut self, dependencies: DependencyResolver) -> Self {
        self.dependencies = dependencies;
        self
    }
}

pub struct TraderEntry {
    pub descriptor: PluginDescriptor,
    pub dependencies: DependencyResolver,
    pub build: TraderBuilder,
}

impl TraderEntry {
    /// Every trader accepts `persist` (default true) and `spread` (default 0).
    pub fn new(module: &str, summary: &str, mut parameters: Params, build: TraderBuilder) -> Self {
        parameters
            .entry("persist".into())
            .or_insert(ParamValue::Bool(true));
        parameters
            .entry("spread".into())
            .or_insert(ParamValue::Number(0.0));
        Self {
            descriptor: PluginDescriptor {
                module: module.into(),
                kind: PluginKind::Trader,
                summary: summary.into(),
                parameters,
                has_initialize: false,
            },
            dependencies: no_dependencies,
            build,
        }
    }

    pub fn with_initialize(mut self) -> Self {
        self.descriptor.has_initialize = true;
        self
    }

    pub fn with_dependencies(mut self, dependencies: DependencyResolver) -> Self {
        self.dependencies = dependencies;
        self
    }
}

// ─── Registry ────────────────────────────────────────────────────────

/// Registration table of plugin modules.
#[derive(Default)]
pub struct PluginRegistry {
    indicators: BTreeMap<String, IndicatorEntry>,
    traders: BTreeMap<String, TraderEntry>,
}

impl PluginRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in indicator and trader.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::indicators::register_builtins(&mut registry);
        crate::traders::register_builtins(&mut registry);
        registry
    }

    /// Register an indicator module, replacing any previous one with that name.
    pub fn register_indicator(&mut self, entry: IndicatorEntry) {
        self.indicators
            .insert(entry.descriptor.module.clone(), entry);
    }

    /// Register a trader module, replacing any previous one with that name.
    pub fn register_trader(&mut self, entry: TraderEntry) {
        self.traders.insert(entry.descriptor.module.clone(), entry);
    }

    pub fn indicator(&self, module: &str) -> Result<&IndicatorEntry, FactoryError> {
        self.indicators
            .get(module)
            .ok_or_else(|| FactoryError::UnknownIndicator(module.to_string()))
    }

    pub fn trader(&self, module: &str) -> Result<&TraderEntry, FactoryError> {
        self.traders
            .get(module)
            .ok_or_else(|| FactoryError::UnknownTrader(module.to_string()))
    }

    /// All descriptors, indicators first, each group sorted by module name.
    pub fn descriptors(&self) -> impl Iterator<Item = &PluginDescriptor> {
        self.indicators
            .values()
            .map(|e| &e.descriptor)
            .chain(self.traders.values().map(|e| &e.descriptor))
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("indicators", &self.indicators.keys().collect::<Vec<_>>())
            .field("traders", &self.traders.keys().collect::<Vec<_>>())
            .finish()
    }
}
