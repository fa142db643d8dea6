//! Domain types for the replay engine.

pub mod candle;
pub mod frame;
pub mod ids;
pub mod order;
pub mod params;

pub use candle::Candle;
pub use frame::{Direction, Frame};
pub use ids::{OrderId, SeriesFingerprint};
pub use order::{Order, OrderAuditEntry, OrderGroup, OrderKind, OrderSide, OrderStatus};
pub use params::{ParamValue, Params};

/// Timestamp type used across the engine.
pub type Timestamp = chrono::NaiveDateTime;
