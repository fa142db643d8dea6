//! Replay engine: configuration, cursor, plugin engines, and the controller.
//!
//! Each step runs in a fixed order:
//!
//! 1. Advance or rewind the cursor (tick aggregation when enabled)
//! 2. Evaluate indicators in dependency order
//! 3. Advance orders, then let traders act
//! 4. Publish the frame, waiting for the previous one to be acknowledged
//! 5. Sleep out the rest of the step interval

pub mod config;
pub mod controller;
pub mod cursor;
pub mod error;
pub mod indicator_engine;
pub mod publish;
pub mod simulator;
pub mod trader_engine;

pub use config::{PluginSection, ReplayFile, SimulationConfig, SimulationSection, DEFAULT_LOOKBACK};
pub use controller::{Controller, SimState};
pub use cursor::ReplayCursor;
pub use error::{ConfigError, ControlError};
pub use indicator_engine::IndicatorEngine;
pub use publish::{AckHandle, ChannelRenderer, FramePublisher, NullRenderer, Renderer, RendererEvent};
pub use simulator::Simulator;
pub use trader_engine::{TraderEngine, DEFAULT_START_BALANCE};
