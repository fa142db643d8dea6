//! Order management: validity rules, the per-trader order book, and the
//! read-side curve reconstruction used for display.

pub mod history;
pub mod order_book;
pub mod validity;

pub use history::{order_curves, OrderCurve, OrderCurves};
pub use order_book::{OrderBook, OrderError, OrderRequest, Quote, TriggerPolicy};
pub use validity::{check_request, exit_reached, strike_reached, ExitReason};
