//! Indicator engine: dependency graph, warm-up, and per-frame evaluation.
//!
//! Slots are kept in topological order (dependencies first), so evaluating
//! slot `k` can read every output before it. Outputs live in a separate vector
//! from the plugins so one can be borrowed mutably while the rest are read.

use super::error::ConfigError;
use crate::components::{
    History, Indicator, IndicatorOutput, IndicatorView, PluginError, PluginRegistry,
};
use crate::domain::params::param_bool;
use crate::domain::{Candle, Params};

struct IndicatorSlot {
    module: String,
    params: Params,
    plugin: Box<dyn Indicator>,
    has_initialize: bool,
    persist: bool,
    /// `(index, len)` of the most recent write.
    last_write: Option<(usize, usize)>,
    initialized: bool,
}

/// Declared but not yet committed slot.
struct Staged {
    name: String,
    module: String,
    params: Params,
}

#[derive(Default)]
pub struct IndicatorEngine {
    slots: Vec<IndicatorSlot>,
    outputs: Vec<IndicatorOutput>,
    len: usize,
}

impl IndicatorEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.outputs.iter().any(|o| o.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(|o| o.name.as_str())
    }

    pub fn outputs(&self) -> &[IndicatorOutput] {
        &self.outputs
    }

    pub fn output(&self, name: &str) -> Option<&[f64]> {
        self.outputs
            .iter()
            .find(|o| o.name == name)
            .map(|o| o.values.as_slice())
    }

    pub fn view(&self, index: usize) -> IndicatorView<'_> {
        IndicatorView::new(&self.outputs, index)
    }

    /// Add a user-named indicator. Its name must be new.
    pub fn add(
        &mut self,
        registry: &PluginRegistry,
        name: &str,
        module: &str,
        params: &Params,
    ) -> Result<Vec<String>, ConfigError> {
        if self.contains(name) {
            return Err(ConfigError::DuplicateName(name.to_string()));
        }
        self.add_dependency(registry, name, module, params)
    }

    /// Add an indicator and everything it depends on, or nothing at all.
    ///
    /// An existing indicator with the same name, module and parameters is
    /// reused; the same name with anything else is a conflict. Returns the
    /// names of the slots actually added.
    pub fn add_dependency(
        &mut self,
        registry: &PluginRegistry,
        name: &str,
        module: &str,
        params: &Params,
    ) -> Result<Vec<String>, ConfigError> {
        let mut staged = Vec::new();
        let mut stack = Vec::new();
        self.resolve(registry, name, module, params, &mut stack, &mut staged)?;

        let mut built = Vec::with_capacity(staged.len());
        for Staged { name, module, params } in staged {
            built.push((name, Self::build_slot(registry, module, params)?));
        }
        let mut added = Vec::with_capacity(built.len());
        for (name, slot) in built {
            self.slots.push(slot);
            self.outputs.push(IndicatorOutput::new(name.clone(), self.len));
            added.push(name);
        }
        if !added.is_empty() {
            tracing::info!(indicators = ?added, "indicators added");
        }
        Ok(added)
    }

    fn resolve(
        &self,
        registry: &PluginRegistry,
        name: &str,
        module: &str,
        params: &Params,
        stack: &mut Vec<(String, String, Params)>,
        staged: &mut Vec<Staged>,
    ) -> Result<(), ConfigError> {
        let entry = registry.indicator(module)?;
        let resolved = entry.descriptor.resolve_params(params)?;

        if stack
            .iter()
            .any(|(n, m, p)| n == name || (m == module && *p == resolved))
        {
            let mut path: Vec<String> = stack.iter().map(|(n, _, _)| n.clone()).collect();
            path.push(name.to_string());
            return Err(ConfigError::CyclicDependency { path });
        }

        let existing = self
            .slots
            .iter()
            .zip(&self.outputs)
            .map(|(s, o)| (o.name.as_str(), s.module.as_str(), &s.params))
            .chain(staged.iter().map(|s| (s.name.as_str(), s.module.as_str(), &s.params)))
            .find(|(n, _, _)| *n == name);
        if let Some((_, m, p)) = existing {
            return if m == module && *p == resolved {
                Ok(())
            } else {
                Err(ConfigError::DependencyConflict {
                    name: name.to_string(),
                })
            };
        }

        stack.push((name.to_string(), module.to_string(), resolved.clone()));
        for dep in (entry.dependencies)(&resolved) {
            self.resolve(registry, &dep.name, &dep.module, &dep.params, stack, staged)?;
        }
        stack.pop();

        staged.push(Staged {
            name: name.to_string(),
            module: module.to_string(),
            params: resolved,
        });
        Ok(())
    }

    fn build_slot(
        registry: &PluginRegistry,
        module: String,
        params: Params,
    ) -> Result<IndicatorSlot, ConfigError> {
        let entry = registry.indicator(&module)?;
        Ok(IndicatorSlot {
            plugin: (entry.build)(&params),
            has_initialize: entry.descriptor.has_initialize,
            persist: param_bool(&params, "persist", true),
            module,
            params,
            last_write: None,
            initialized: false,
        })
    }

    /// Fresh plugin instances and empty outputs sized for `len` candles.
    pub fn rebuilt(&self, registry: &PluginRegistry, len: usize) -> Result<Self, ConfigError> {
        let mut engine = Self {
            slots: Vec::with_capacity(self.slots.len()),
            outputs: Vec::with_capacity(self.outputs.len()),
            len,
        };
        for (slot, output) in self.slots.iter().zip(&self.outputs) {
            engine
                .slots
                .push(Self::build_slot(registry, slot.module.clone(), slot.params.clone())?);
            engine.outputs.push(IndicatorOutput::new(output.name.clone(), len));
        }
        Ok(engine)
    }

    /// Warm up every slot over `max(1, start - lookback)..=start`.
    pub fn init(&mut self, candles: &[Candle], start: usize, lookback: usize) {
        let first = start.saturating_sub(lookback).max(1);
        for index in first..=start.min(candles.len().saturating_sub(1)) {
            let history = History::new(candles[index], &candles[..index]);
            for k in 0..self.slots.len() {
                if !self.slots[k].has_initialize {
                    continue;
                }
                let (deps, rest) = self.outputs.split_at_mut(k);
                let view = IndicatorView::new(deps, index);
                let slot = &mut self.slots[k];
                let values = slot.plugin.initialize(&history, &view);
                write(slot, &mut rest[0], index, &values);
            }
        }
        for slot in &mut self.slots {
            slot.initialized = true;
        }
        tracing::debug!(slots = self.slots.len(), start, "indicators initialized");
    }

    /// Evaluate every slot against `history`. Uninitialized slots are skipped and reported.
    pub fn update(&mut self, history: &History<'_>) -> Vec<PluginError> {
        let index = history.index();
        let mut errors = Vec::new();
        for k in 0..self.slots.len() {
            let (deps, rest) = self.outputs.split_at_mut(k);
            let slot = &mut self.slots[k];
            if !slot.initialized {
                let err = PluginError::NotInitialized(rest[0].name.clone());
                tracing::warn!("{err}");
                errors.push(err);
                continue;
            }
            let view = IndicatorView::new(deps, index);
            let values = slot.plugin.calculate(history, &view);
            write(slot, &mut rest[0], index, &values);
        }
        errors
    }
}

/// Write `values` backwards from `index`, first clearing the previous write
/// window when the slot does not persist.
fn write(slot: &mut IndicatorSlot, output: &mut IndicatorOutput, index: usize, values: &[f64]) {
    if !slot.persist {
        if let Some((last, len)) = slot.last_write {
            let from = (last + 1).saturating_sub(len);
            for v in &mut output.values[from..=last] {
                *v = f64::NAN;
            }
        }
    }
    let written = values.len().min(index + 1);
    for (i, &value) in values.iter().take(written).enumerate() {
        output.values[index - i] = value;
    }
    slot.last_write = Some((index, written));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{DependencySpec, IndicatorEntry};
    use crate::domain::params::params;
    use crate::indicators::make_candles;

    fn history(candles: &[Candle], index: usize) -> History<'_> {
        History::new(candles[index], &candles[..index])
    }

    #[test]
    fn dependencies_come_first() {
        let registry = PluginRegistry::with_builtins();
        let mut engine = IndicatorEngine::new();
        let added = engine
            .add(&registry, "env_up", "envelope", &params([("period", 3.0)]))
            .unwrap();
        assert_eq!(added, vec!["sma_3".to_string(), "env_up".to_string()]);
        assert_eq!(engine.names().collect::<Vec<_>>(), vec!["sma_3", "env_up"]);
    }

    #[test]
    fn shared_dependency_is_reused() {
        let registry = PluginRegistry::with_builtins();
        let mut engine = IndicatorEngine::new();
        engine
            .add(&registry, "sma_3", "sma", &params([("period", 3.0)]))
            .unwrap();
        let added = engine
            .add(&registry, "env_up", "envelope", &params([("period", 3.0)]))
            .unwrap();
        assert_eq!(added, vec!["env_up".to_string()]);
        assert_eq!(engine.len(), 2);
    }

    #[test]
    fn conflicting_dependency_leaves_engine_untouched() {
        let registry = PluginRegistry::with_builtins();
        let mut engine = IndicatorEngine::new();
        engine
            .add(&registry, "sma_3", "ema", &params([("period", 3.0)]))
            .unwrap();
        let err = engine
            .add(&registry, "env_up", "envelope", &params([("period", 3.0)]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::DependencyConflict { ref name } if name == "sma_3"));
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn duplicate_and_unknown_are_rejected() {
        let registry = PluginRegistry::with_builtins();
        let mut engine = IndicatorEngine::new();
        engine.add(&registry, "c", "close", &Params::new()).unwrap();
        assert!(matches!(
            engine.add(&registry, "c", "close", &Params::new()),
            Err(ConfigError::DuplicateName(_))
        ));
        assert!(matches!(
            engine.add(&registry, "x", "nope", &Params::new()),
            Err(ConfigError::Factory(_))
        ));
        assert!(matches!(
            engine.add(&registry, "y", "sma", &params([("bogus", 1.0)])),
            Err(ConfigError::Factory(_))
        ));
    }

    fn loop_a(_: &Params) -> Vec<DependencySpec> {
        vec![DependencySpec::new("b", "loop_b", Params::new())]
    }

    fn loop_b(_: &Params) -> Vec<DependencySpec> {
        vec![DependencySpec::new("a", "loop_a", Params::new())]
    }

    #[test]
    fn cycles_are_configuration_errors() {
        let mut registry = PluginRegistry::new();
        registry.register_indicator(
            IndicatorEntry::new("loop_a", "", Params::new(), |_| Box::new(crate::indicators::Close))
                .with_dependencies(loop_a),
        );
        registry.register_indicator(
            IndicatorEntry::new("loop_b", "", Params::new(), |_| Box::new(crate::indicators::Close))
                .with_dependencies(loop_b),
        );
        let mut engine = IndicatorEngine::new();
        match engine.add(&registry, "a", "loop_a", &Params::new()) {
            Err(ConfigError::CyclicDependency { path }) => assert_eq!(path, vec!["a", "b", "a"]),
            other => panic!("expected cycle, got {:?}", other.map(|_| ())),
        }
        assert!(engine.is_empty());
    }

    #[test]
    fn uninitialized_slot_refuses_to_compute() {
        let registry = PluginRegistry::with_builtins();
        let mut engine = IndicatorEngine::new().rebuilt(&registry, 3).unwrap();
        engine.add(&registry, "c", "close", &Params::new()).unwrap();
        let candles = make_candles(&[1.0, 2.0, 3.0]);
        let errors = engine.update(&history(&candles, 2));
        assert_eq!(errors, vec![PluginError::NotInitialized("c".into())]);
        assert!(engine.output("c").unwrap()[2].is_nan());
    }

    #[test]
    fn init_warms_up_and_update_writes_current_slot() {
        let registry = PluginRegistry::with_builtins();
        let mut engine = IndicatorEngine::new();
        engine
            .add(&registry, "sma_2", "sma", &params([("period", 2.0)]))
            .unwrap();
        let candles = make_candles(&[1.0, 3.0, 5.0, 7.0, 9.0]);
        let mut engine = engine.rebuilt(&registry, candles.len()).unwrap();
        engine.init(&candles, 3, 100);
        let out = engine.output("sma_2").unwrap();
        assert!(out[0].is_nan());
        assert_eq!(&out[1..4], &[2.0, 4.0, 6.0]);
        assert!(out[4].is_nan());

        engine.update(&history(&candles, 4));
        assert_eq!(engine.output("sma_2").unwrap()[4], 8.0);
    }
}
