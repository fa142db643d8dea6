//! Built-in traders.

pub mod ma_cross;
pub mod pullback_limit;

pub use ma_cross::MaCross;
pub use pullback_limit::PullbackLimit;

use crate::components::PluginRegistry;

pub fn register_builtins(registry: &mut PluginRegistry) {
    registry.register_trader(ma_cross::entry());
    registry.register_trader(pullback_limit::entry());
}
