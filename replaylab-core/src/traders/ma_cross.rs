//! Moving-average crossover trader.
//!
//! Goes long with a market BUY when the fast SMA crosses above the slow one,
//! short with a market SELL on the opposite cross. Any position on the other
//! side is closed first. Stop-loss and take-profit sit `stop_pct` and
//! `target_pct` percent away from the entry price.

use crate::components::{DependencySpec, IndicatorView, Trader, TraderContext, TraderEntry};
use crate::domain::params::{param_f64, param_usize, params};
use crate::domain::{OrderKind, OrderSide, Params};
use crate::indicators::Sma;

#[derive(Debug, Clone)]
pub struct MaCross {
    fast: String,
    slow: String,
    stop_pct: f64,
    target_pct: f64,
}

impl MaCross {
    pub fn new(fast_period: usize, slow_period: usize, stop_pct: f64, target_pct: f64) -> Self {
        Self {
            fast: Sma::name_for(fast_period),
            slow: Sma::name_for(slow_period),
            stop_pct,
            target_pct,
        }
    }

    /// Sign of the fast-minus-slow gap `back` candles ago (0 when unknown).
    fn regime(&self, view: &IndicatorView<'_>, back: usize) -> i8 {
        let gap = view.value(&self.fast, back) - view.value(&self.slow, back);
        if gap > 0.0 {
            1
        } else if gap < 0.0 {
            -1
        } else {
            0
        }
    }
}

impl Trader for MaCross {
    fn calculate(&mut self, ctx: &mut TraderContext<'_>) {
        let now = self.regime(ctx.indicators(), 0);
        let before = self.regime(ctx.indicators(), 1);
        if now == 0 || before == 0 || now == before {
            return;
        }

        let side = if now > 0 { OrderSide::Buy } else { OrderSide::Sell };
        let opposite: Vec<_> = ctx
            .active_orders()
            .filter(|o| o.side() != side)
            .map(|o| o.id)
            .collect();
        for id in opposite {
            let _ = ctx.close_order(id);
        }
        if ctx.active_orders().any(|o| o.side() == side) {
            return;
        }

        let price = ctx.price();
        let stop = price * self.stop_pct / 100.0;
        let target = price * self.target_pct / 100.0;
        match side {
            OrderSide::Buy => ctx.create_order(OrderKind::Buy, price - stop, price + target, None),
            OrderSide::Sell => ctx.create_order(OrderKind::Sell, price + stop, price - target, None),
        };
    }
}

fn dependencies(p: &Params) -> Vec<DependencySpec> {
    [param_usize(p, "fast_period", 10), param_usize(p, "slow_period", 30)]
        .into_iter()
        .map(|period| {
            DependencySpec::new(Sma::name_for(period), "sma", params([("period", period as f64)]))
        })
        .collect()
}

pub fn entry() -> TraderEntry {
    TraderEntry::new(
        "ma_cross",
        "market orders on fast/slow sma crossovers",
        params([
            ("fast_period", 10.0),
            ("slow_period", 30.0),
            ("stop_pct", 0.5),
            ("target_pct", 1.0),
        ]),
        |p| {
            Box::new(MaCross::new(
                param_usize(p, "fast_period", 10),
                param_usize(p, "slow_period", 30),
                param_f64(p, "stop_pct", 0.5),
                param_f64(p, "target_pct", 1.0),
            ))
        },
    )
    .with_dependencies(dependencies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{History, IndicatorOutput};
    use crate::domain::{Candle, OrderStatus};
    use crate::orders::{OrderBook, Quote};
    use chrono::NaiveDate;

    fn outputs(fast: [f64; 2], slow: [f64; 2]) -> Vec<IndicatorOutput> {
        let mut f = IndicatorOutput::new("sma_2", 2);
        f.values.copy_from_slice(&fast);
        let mut s = IndicatorOutput::new("sma_4", 2);
        s.values.copy_from_slice(&slow);
        vec![f, s]
    }

    fn run(trader: &mut MaCross, book: &mut OrderBook, outs: &[IndicatorOutput], price: f64) {
        let time = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(1, 0, 0)
            .unwrap();
        let closed = [Candle::flat(time - chrono::Duration::hours(1), price)];
        let history = History::new(Candle::flat(time, price), &closed);
        let mut ctx = TraderContext::new(
            "cross",
            history,
            IndicatorView::new(outs, 1),
            book,
            Quote::at(time, price),
        );
        trader.calculate(&mut ctx);
    }

    #[test]
    fn buys_on_upward_cross() {
        let mut trader = MaCross::new(2, 4, 1.0, 2.0);
        let mut book = OrderBook::new(0.0);
        run(&mut trader, &mut book, &outputs([9.0, 11.0], [10.0, 10.0]), 100.0);
        let orders = book.orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].kind, OrderKind::Buy);
        assert!((orders[0].stop_loss - 99.0).abs() < 1e-9);
        assert!((orders[0].take_profit - 102.0).abs() < 1e-9);
    }

    #[test]
    fn reverses_on_downward_cross() {
        let mut trader = MaCross::new(2, 4, 1.0, 2.0);
        let mut book = OrderBook::new(0.0);
        run(&mut trader, &mut book, &outputs([9.0, 11.0], [10.0, 10.0]), 100.0);
        run(&mut trader, &mut book, &outputs([11.0, 9.0], [10.0, 10.0]), 100.5);
        assert_eq!(book.orders()[0].status, OrderStatus::Closed);
        assert_eq!(book.orders()[1].kind, OrderKind::Sell);
        assert_eq!(book.orders()[1].status, OrderStatus::Active);
    }

    #[test]
    fn no_cross_no_order() {
        let mut trader = MaCross::new(2, 4, 1.0, 2.0);
        let mut book = OrderBook::new(0.0);
        run(&mut trader, &mut book, &outputs([11.0, 12.0], [10.0, 10.0]), 100.0);
        run(&mut trader, &mut book, &outputs([f64::NAN, 12.0], [10.0, 10.0]), 100.0);
        assert!(book.is_empty());
    }
}
