//! Pullback trader working with pending orders.
//!
//! While flat, rests a BUY_LIMIT `offset` below the price when the close is
//! above its EMA (buying the dip in an uptrend), or a SELL_LIMIT `offset`
//! above it when below. When `breakout` is set it uses stop orders on the far
//! side instead. Unfilled orders are withdrawn after `expiry` candles.

use crate::components::{DependencySpec, History, IndicatorView, Trader, TraderContext, TraderEntry};
use crate::domain::params::{param_bool, param_f64, param_usize, params};
use crate::domain::{OrderKind, OrderSide, Params};

#[derive(Debug, Clone)]
pub struct PullbackLimit {
    trend: String,
    offset: f64,
    stop: f64,
    target: f64,
    expiry: usize,
    breakout: bool,
    placed_at: Option<usize>,
}

impl PullbackLimit {
    pub fn new(trend_period: usize, offset: f64, stop: f64, target: f64, expiry: usize) -> Self {
        Self {
            trend: format!("ema_{trend_period}"),
            offset,
            stop,
            target,
            expiry: expiry.max(1),
            breakout: false,
            placed_at: None,
        }
    }

    pub fn with_breakout(mut self, breakout: bool) -> Self {
        self.breakout = breakout;
        self
    }
}

impl Trader for PullbackLimit {
    fn initialize(&mut self, _history: &History<'_>, _indicators: &IndicatorView<'_>) {
        self.placed_at = None;
    }

    fn calculate(&mut self, ctx: &mut TraderContext<'_>) {
        let index = ctx.history().index();

        if let Some(placed_at) = self.placed_at {
            let pending: Vec<_> = ctx.pending_orders().map(|o| o.id).collect();
            if pending.is_empty() {
                self.placed_at = None;
            } else if index >= placed_at + self.expiry {
                for id in pending {
                    let _ = ctx.close_order(id);
                }
                self.placed_at = None;
            }
            return;
        }
        if ctx.active_orders().next().is_some() {
            return;
        }

        let trend = ctx.indicators().value(&self.trend, 0);
        if trend.is_nan() {
            return;
        }
        let price = ctx.price();
        let uptrend = price > trend;
        let (kind, strike) = match (uptrend, self.breakout) {
            (true, false) => (OrderKind::BuyLimit, price - self.offset),
            (false, false) => (OrderKind::SellLimit, price + self.offset),
            (true, true) => (OrderKind::BuyStop, price + self.offset),
            (false, true) => (OrderKind::SellStop, price - self.offset),
        };
        let order = match kind.side() {
            OrderSide::Buy => {
                ctx.create_order(kind, strike - self.stop, strike + self.target, Some(strike))
            }
            OrderSide::Sell => {
                ctx.create_order(kind, strike + self.stop, strike - self.target, Some(strike))
            }
        };
        if order.is_placed() {
            self.placed_at = Some(index);
        }
    }
}

fn dependencies(p: &Params) -> Vec<DependencySpec> {
    let period = param_usize(p, "trend_period", 50);
    vec![DependencySpec::new(
        format!("ema_{period}"),
        "ema",
        params([("period", period as f64)]),
    )]
}

pub fn entry() -> TraderEntry {
    let mut defaults = params([
        ("trend_period", 50.0),
        ("offset", 0.0010),
        ("stop", 0.0020),
        ("target", 0.0040),
        ("expiry", 10.0),
    ]);
    defaults.insert("breakout".into(), false.into());
    TraderEntry::new(
        "pullback_limit",
        "pending limit (or stop) entries around an ema trend filter",
        defaults,
        |p| {
            Box::new(
                PullbackLimit::new(
                    param_usize(p, "trend_period", 50),
                    param_f64(p, "offset", 0.0010),
                    param_f64(p, "stop", 0.0020),
                    param_f64(p, "target", 0.0040),
                    param_usize(p, "expiry", 10),
                )
                .with_breakout(param_bool(p, "breakout", false)),
            )
        },
    )
    .with_initialize()
    .with_dependencies(dependencies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::IndicatorOutput;
    use crate::domain::{Candle, OrderStatus};
    use crate::indicators::make_candles;
    use crate::orders::{OrderBook, Quote};

    fn step(trader: &mut PullbackLimit, book: &mut OrderBook, candles: &[Candle], idx: usize, trend: f64) {
        let mut ema = IndicatorOutput::new("ema_5", candles.len());
        ema.values[idx] = trend;
        let outputs = [ema];
        let current = candles[idx];
        let mut ctx = TraderContext::new(
            "pullback",
            History::new(current, &candles[..idx]),
            IndicatorView::new(&outputs, idx),
            book,
            Quote::at(current.time, current.close),
        );
        trader.calculate(&mut ctx);
    }

    #[test]
    fn rests_buy_limit_in_uptrend() {
        let candles = make_candles(&[1.10, 1.10]);
        let mut trader = PullbackLimit::new(5, 0.01, 0.01, 0.02, 3);
        let mut book = OrderBook::new(0.0);
        step(&mut trader, &mut book, &candles, 0, 1.05);
        let order = &book.orders()[0];
        assert_eq!(order.kind, OrderKind::BuyLimit);
        assert_eq!(order.status, OrderStatus::Pending);
        assert!((order.open_price - 1.09).abs() < 1e-12);
    }

    #[test]
    fn breakout_uses_stop_orders() {
        let candles = make_candles(&[1.10]);
        let mut trader = PullbackLimit::new(5, 0.01, 0.01, 0.02, 3).with_breakout(true);
        let mut book = OrderBook::new(0.0);
        step(&mut trader, &mut book, &candles, 0, 1.15);
        assert_eq!(book.orders()[0].kind, OrderKind::SellStop);
    }

    #[test]
    fn unfilled_order_expires() {
        let candles = make_candles(&[1.10, 1.10, 1.10, 1.10]);
        let mut trader = PullbackLimit::new(5, 0.01, 0.01, 0.02, 2);
        let mut book = OrderBook::new(0.0);
        step(&mut trader, &mut book, &candles, 0, 1.05);
        step(&mut trader, &mut book, &candles, 1, 1.05);
        assert_eq!(book.orders()[0].status, OrderStatus::Pending);
        step(&mut trader, &mut book, &candles, 2, 1.05);
        assert_eq!(book.orders()[0].status, OrderStatus::Deleted);
        step(&mut trader, &mut book, &candles, 3, 1.05);
        assert_eq!(book.len(), 2);
    }
}
