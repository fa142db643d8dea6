//! Plugin-facing surface: the history view, the Indicator and Trader traits,
//! and the registry that turns module names into plugin instances.

pub mod history;
pub mod indicator;
pub mod registry;
pub mod trader;

pub use history::History;
pub use indicator::{Indicator, IndicatorOutput, IndicatorView, PluginError};
pub use registry::{
    DependencySpec, FactoryError, IndicatorEntry, PluginDescriptor, PluginKind, PluginRegistry,
    TraderEntry,
};
pub use trader::{Trader, TraderContext};
