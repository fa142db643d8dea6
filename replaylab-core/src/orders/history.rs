//! Order curves for display.
//!
//! For a window of `n` candle slots ending at the candle that contains `time`,
//! each order of one display group becomes a column of prices: a flat line at
//! the strike for pending orders, a straight line from open to close for
//! filled ones (open to the current price while still active). Slots the
//! order did not occupy are NaN. Nothing here mutates order state.

use super::order_book::OrderBook;
use crate::data::{Lookup, TimeSeries};
use crate::domain::{OrderGroup, OrderId, OrderStatus};
use chrono::NaiveDateTime;
use serde::Serialize;

/// One order's column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderCurve {
    pub order_id: OrderId,
    pub values: Vec<f64>,
}

/// Curves for one group over a window of candle slots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderCurves {
    /// Candle index of the first row; negative when the window starts before the data.
    pub first_index: i64,
    pub rows: usize,
    pub curves: Vec<OrderCurve>,
}

impl OrderCurves {
    fn empty(first_index: i64, rows: usize) -> Self {
        Self {
            first_index,
            rows,
            curves: Vec::new(),
        }
    }
}

/// Build the curves of `group` for the `n` slots ending at the candle containing `time`.
///
/// `now` and `price` stand in for the close of still-active orders; `hint`
/// is the caller's current candle index and speeds up the time lookups.
#[allow(clippy::too_many_arguments)]
pub fn order_curves(
    book: &OrderBook,
    candles: &TimeSeries,
    group: OrderGroup,
    time: NaiveDateTime,
    n: usize,
    now: NaiveDateTime,
    price: f64,
    hint: usize,
) -> OrderCurves {
    let Some(data_idx) = candles.index_from_hint(time, Lookup::LessOrEqual, hint) else {
        return OrderCurves::empty(0, n);
    };
    let data_idx = data_idx as i64;
    let first = data_idx - n as i64 + 1;
    let mut out = OrderCurves::empty(first, n);

    let slot_of = |t: NaiveDateTime| {
        candles
            .index_from_hint(t, Lookup::LessOrEqual, hint)
            .map(|i| i as i64)
    };

    for order in book.orders().iter().filter(|o| o.kind.group() == group) {
        let mut values = vec![f64::NAN; n];
        match order.status {
            OrderStatus::Unset | OrderStatus::Deleted => continue,
            OrderStatus::Pending => values.fill(order.open_price),
            OrderStatus::Active | OrderStatus::Closed => {
                let (close_time, close_price) = match order.status {
                    OrderStatus::Active => (Some(now), price),
                    _ => (order.close_time, order.close_price.unwrap_or(f64::NAN)),
                };
                let (Some(open_idx), Some(close_idx)) =
                    (order.open_time.and_then(slot_of), close_time.and_then(slot_of))
                else {
                    continue;
                };
                if data_idx - close_idx > n as i64 {
                    continue;
                }
                let span = (close_idx - open_idx).max(1) as f64;
                for (row, value) in values.iter_mut().enumerate() {
                    let idx = first + row as i64;
                    if (open_idx..=close_idx).contains(&idx) {
                        let progress = (idx - open_idx) as f64 / span;
                        *value = order.open_price + progress * (close_price - order.open_price);
                    }
                }
            }
        }
        out.curves.push(OrderCurve {
            order_id: order.id,
            values,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Candle, OrderKind};
    use crate::orders::{OrderRequest, Quote, TriggerPolicy};
    use chrono::NaiveDate;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn candles(n: u32) -> TimeSeries {
        TimeSeries::new((0..n).map(|h| Candle::flat(at(h), 1.0)).collect()).unwrap()
    }

    #[test]
    fn pending_order_is_flat_at_strike() {
        let mut book = OrderBook::new(0.0);
        book.try_create(
            OrderRequest::pending(OrderKind::BuyLimit, 0.9, 0.8, 1.0),
            &Quote::at(at(1), 1.0),
        )
        .unwrap();
        let curves = order_curves(&book, &candles(6), OrderGroup::PendingBuy, at(4), 3, at(4), 1.0, 4);
        assert_eq!(curves.first_index, 2);
        assert_eq!(curves.curves.len(), 1);
        assert_eq!(curves.curves[0].values, vec![0.9, 0.9, 0.9]);
    }

    #[test]
    fn closed_order_interpolates_between_open_and_close() {
        let mut book = OrderBook::new(0.0);
        let order = book
            .try_create(OrderRequest::market(OrderKind::Buy, 0.5, 2.0), &Quote::at(at(1), 1.0))
            .unwrap();
        book.close(order.id, &Quote::at(at(3), 1.4)).unwrap();

        let curves = order_curves(&book, &candles(6), OrderGroup::MarketBuy, at(4), 5, at(4), 1.0, 4);
        assert_eq!(curves.first_index, 0);
        let values = &curves.curves[0].values;
        assert!(values[0].is_nan());
        assert!((values[1] - 1.0).abs() < 1e-12);
        assert!((values[2] - 1.2).abs() < 1e-12);
        assert!((values[3] - 1.4).abs() < 1e-12);
        assert!(values[4].is_nan());
    }

    #[test]
    fn active_order_runs_to_current_price() {
        let mut book = OrderBook::new(0.0);
        book.try_create(OrderRequest::market(OrderKind::Sell, 2.0, 0.5), &Quote::at(at(2), 1.0))
            .unwrap();
        let curves = order_curves(&book, &candles(6), OrderGroup::MarketSell, at(4), 3, at(4), 0.8, 4);
        let values = &curves.curves[0].values;
        assert!((values[0] - 1.0).abs() < 1e-12);
        assert!((values[2] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn groups_and_old_orders_are_filtered() {
        let mut book = OrderBook::new(0.0);
        let old = book
            .try_create(OrderRequest::market(OrderKind::Buy, 0.5, 2.0), &Quote::at(at(0), 1.0))
            .unwrap();
        book.close(old.id, &Quote::at(at(1), 1.1)).unwrap();
        book.try_create(OrderRequest::market(OrderKind::Sell, 2.0, 0.5), &Quote::at(at(4), 1.0))
            .unwrap();
        book.update(&Quote::at(at(5), 1.0), TriggerPolicy::LastPrice);

        let buys = order_curves(&book, &candles(6), OrderGroup::MarketBuy, at(5), 2, at(5), 1.0, 5);
        assert!(buys.curves.is_empty());
        let sells = order_curves(&book, &candles(6), OrderGroup::MarketSell, at(5), 2, at(5), 1.0, 5);
        assert_eq!(sells.curves.len(), 1);
    }

    #[test]
    fn deleted_orders_are_skipped() {
        let mut book = OrderBook::new(0.0);
        let order = book
            .try_create(
                OrderRequest::pending(OrderKind::SellStop, 0.9, 1.0, 0.8),
                &Quote::at(at(1), 1.0),
            )
            .unwrap();
        book.close(order.id, &Quote::at(at(2), 1.0)).unwrap();
        let curves = order_curves(&book, &candles(6), OrderGroup::PendingSell, at(4), 3, at(4), 1.0, 4);
        assert!(curves.curves.is_empty());
    }
}
