//! Price rules for order creation, pending triggers, and exits.
//!
//! All comparisons are strict on creation and inclusive on triggers.
//! `spread` is the constant offset between the quoted and executed price.

use crate::domain::{Order, OrderKind, OrderSide};

/// Why an active order left the market.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
}

impl ExitReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop loss",
            ExitReason::TakeProfit => "take profit",
        }
    }
}

/// Check a creation request against the current price.
///
/// Returns a human-readable reason when the request must be disregarded.
/// `strike` is ignored for market kinds and required for the rest.
pub fn check_request(
    kind: OrderKind,
    price: f64,
    spread: f64,
    stop_loss: f64,
    take_profit: f64,
    strike: Option<f64>,
) -> Result<(), String> {
    if !(price.is_finite() && stop_loss.is_finite() && take_profit.is_finite()) {
        return Err("prices must be finite".into());
    }

    let (reference, price_ok) = match kind {
        OrderKind::Buy | OrderKind::Sell => (price, true),
        _ => {
            let strike = match strike {
                Some(s) if s.is_finite() => s,
                Some(_) => return Err("strike price must be finite".into()),
                None => return Err(format!("{kind:?} needs a strike price")),
            };
            let ok = match kind {
                OrderKind::BuyLimit | OrderKind::SellStop => price > strike,
                OrderKind::SellLimit | OrderKind::BuyStop => price < strike,
                OrderKind::Buy | OrderKind::Sell => true,
            };
            (strike, ok)
        }
    };
    if !price_ok {
        return Err(format!(
            "{kind:?} strike {:.5} is on the wrong side of price {price:.5}",
            reference
        ));
    }

    let levels_ok = match kind.side() {
        OrderSide::Buy => stop_loss < reference - spread && take_profit > reference + spread,
        OrderSide::Sell => stop_loss > reference + spread && take_profit < reference - spread,
    };
    if !levels_ok {
        return Err(format!(
            "{kind:?} levels sl={stop_loss:.5} tp={take_profit:.5} do not bracket {reference:.5} (spread {spread})"
        ));
    }
    Ok(())
}

/// Whether a pending order's strike is reached by a price moving within `[low, high]`.
///
/// Limits fill on a move through the strike toward better prices, stops on a
/// move through it toward worse prices.
pub fn strike_reached(order: &Order, low: f64, high: f64, spread: f64) -> bool {
    let strike = order.open_price;
    match order.kind {
        OrderKind::BuyLimit => low <= strike - spread,
        OrderKind::SellLimit => high >= strike + spread,
        OrderKind::BuyStop => high >= strike - spread,
        OrderKind::SellStop => low <= strike + spread,
        OrderKind::Buy | OrderKind::Sell => false,
    }
}

/// Whether an active order's stop-loss or take-profit is hit within `[low, high]`.
///
/// Stop-loss is checked first, so a range that breaches both exits at the stop.
pub fn exit_reached(order: &Order, low: f64, high: f64) -> Option<ExitReason> {
    match order.side() {
        OrderSide::Buy => {
            if low <= order.stop_loss {
                Some(ExitReason::StopLoss)
            } else if high >= order.take_profit {
                Some(ExitReason::TakeProfit)
            } else {
                None
            }
        }
        OrderSide::Sell => {
            if high >= order.stop_loss {
                Some(ExitReason::StopLoss)
            } else if low <= order.take_profit {
                Some(ExitReason::TakeProfit)
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderId, OrderStatus};

    fn pending(kind: OrderKind, strike: f64) -> Order {
        Order {
            id: OrderId(0),
            kind,
            open_price: strike,
            stop_loss: 0.0,
            take_profit: 10.0,
            open_time: None,
            close_time: None,
            close_price: None,
            status: OrderStatus::Pending,
        }
    }

    #[test]
    fn market_buy_needs_bracketing_levels() {
        assert!(check_request(OrderKind::Buy, 1.1, 0.0, 1.095, 1.11, None).is_ok());
        assert!(check_request(OrderKind::Buy, 1.1, 0.0, 1.105, 1.11, None).is_err());
        assert!(check_request(OrderKind::Buy, 1.1, 0.0, 1.095, 1.09, None).is_err());
        // spread pushes the levels out
        assert!(check_request(OrderKind::Buy, 1.1, 0.01, 1.095, 1.12, None).is_err());
    }

    #[test]
    fn market_sell_mirrors_buy() {
        assert!(check_request(OrderKind::Sell, 1.1, 0.0, 1.11, 1.09, None).is_ok());
        assert!(check_request(OrderKind::Sell, 1.1, 0.0, 1.09, 1.11, None).is_err());
    }

    #[test]
    fn pending_kinds_check_strike_side() {
        // limit buys wait below price, stop buys above
        assert!(check_request(OrderKind::BuyLimit, 1.1, 0.0, 1.08, 1.10, Some(1.09)).is_ok());
        assert!(check_request(OrderKind::BuyLimit, 1.08, 0.0, 1.08, 1.10, Some(1.09)).is_err());
        assert!(check_request(OrderKind::BuyStop, 1.08, 0.0, 1.08, 1.10, Some(1.09)).is_ok());
        assert!(check_request(OrderKind::BuyStop, 1.1, 0.0, 1.08, 1.10, Some(1.09)).is_err());
        // limit sells wait above price, stop sells below
        assert!(check_request(OrderKind::SellLimit, 1.08, 0.0, 1.10, 1.08, Some(1.09)).is_ok());
        assert!(check_request(OrderKind::SellStop, 1.1, 0.0, 1.10, 1.08, Some(1.09)).is_ok());
        assert!(check_request(OrderKind::SellStop, 1.08, 0.0, 1.10, 1.08, Some(1.09)).is_err());
    }

    #[test]
    fn pending_kind_without_strike_rejected() {
        assert!(check_request(OrderKind::BuyLimit, 1.1, 0.0, 1.0, 1.2, None).is_err());
    }

    #[test]
    fn non_finite_levels_rejected() {
        assert!(check_request(OrderKind::Buy, 1.1, 0.0, f64::NAN, 1.2, None).is_err());
    }

    #[test]
    fn strike_trigger_directions() {
        let buy_limit = pending(OrderKind::BuyLimit, 1.09);
        assert!(!strike_reached(&buy_limit, 1.0901, 1.0901, 0.0));
        assert!(strike_reached(&buy_limit, 1.09, 1.09, 0.0));
        assert!(!strike_reached(&buy_limit, 1.0895, 1.0895, 0.001));

        let buy_stop = pending(OrderKind::BuyStop, 1.09);
        assert!(strike_reached(&buy_stop, 1.095, 1.095, 0.0));
        assert!(!strike_reached(&buy_stop, 1.085, 1.085, 0.0));

        let sell_limit = pending(OrderKind::SellLimit, 1.09);
        assert!(strike_reached(&sell_limit, 1.091, 1.091, 0.0));

        let sell_stop = pending(OrderKind::SellStop, 1.09);
        assert!(strike_reached(&sell_stop, 1.089, 1.089, 0.0));
        assert!(!strike_reached(&sell_stop, 1.091, 1.091, 0.0));
    }

    #[test]
    fn exit_prefers_stop_loss() {
        let mut order = pending(OrderKind::Buy, 1.1);
        order.stop_loss = 1.095;
        order.take_profit = 1.11;
        order.status = OrderStatus::Active;
        assert_eq!(exit_reached(&order, 1.09, 1.12), Some(ExitReason::StopLoss));
        assert_eq!(exit_reached(&order, 1.11, 1.11), Some(ExitReason::TakeProfit));
        assert_eq!(exit_reached(&order, 1.1, 1.1), None);
    }
}
