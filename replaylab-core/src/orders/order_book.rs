use super::validity::{check_request, exit_reached, strike_reached, ExitReason};
use crate::domain::{Order, OrderAuditEntry, OrderId, OrderKind, OrderStatus};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderError {
    #[error("order request disregarded ({kind:?}): {reason}")]
    InvalidRequest { kind: OrderKind, reason: String },

    #[error("order {0} not found")]
    NotFound(OrderId),

    #[error("order {0} is already {1:?}")]
    AlreadyFinal(OrderId, OrderStatus),
}

/// How price triggers are evaluated each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerPolicy {
    /// Compare against the latest price sample only; exits fill at that price.
    #[default]
    LastPrice,
    /// Compare against the current candle's high/low; exits fill at the breached level.
    IntrabarRange,
}

/// What a trader asks for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderRequest {
    pub kind: OrderKind,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Strike price for pending kinds, ignored for market kinds.
    pub strike: Option<f64>,
}

impl OrderRequest {
    pub fn market(kind: OrderKind, stop_loss: f64, take_profit: f64) -> Self {
        Self {
            kind,
            stop_loss,
            take_profit,
            strike: None,
        }
    }

    pub fn pending(kind: OrderKind, strike: f64, stop_loss: f64, take_profit: f64) -> Self {
        Self {
            kind,
            stop_loss,
            take_profit,
            strike: Some(strike),
        }
    }
}

/// Price sample an order book is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub time: NaiveDateTime,
    pub price: f64,
    pub low: f64,
    pub high: f64,
}

impl Quote {
    /// A single price with no range.
    pub fn at(time: NaiveDateTime, price: f64) -> Self {
        Self {
            time,
            price,
            low: price,
            high: price,
        }
    }

    pub fn with_range(mut self, low: f64, high: f64) -> Self {
        self.low = low.min(self.price);
        self.high = high.max(self.price);
        self
    }
}

/// OrderBook: one trader's orders and their lifecycle.
///
/// Orders live in an arena indexed by their dense id and are never removed;
/// only their status moves. Callers get copies, never references into the
/// arena that outlive a call.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    orders: Vec<Order>,
    spread: f64,
    audit: Vec<OrderAuditEntry>,
}

impl OrderBook {
    pub fn new(spread: f64) -> Self {
        Self {
            orders: Vec::new(),
            spread,
            audit: Vec::new(),
        }
    }

    pub fn spread(&self) -> f64 {
        self.spread
    }

    /// Validate and place an order at `quote`.
    ///
    /// Market kinds open Active at price plus spread (buys) or minus spread
    /// (sells). Pending kinds rest at their strike.
    pub fn try_create(&mut self, request: OrderRequest, quote: &Quote) -> Result<Order, OrderError> {
        check_request(
            request.kind,
            quote.price,
            self.spread,
            request.stop_loss,
            request.take_profit,
            request.strike,
        )
        .map_err(|reason| OrderError::InvalidRequest {
            kind: request.kind,
            reason,
        })?;

        // pending kinds always carry a strike past check_request
        let (open_price, status) = match request.strike.filter(|_| !request.kind.is_market()) {
            Some(strike) => (strike, OrderStatus::Pending),
            None => (
                quote.price + self.spread * request.kind.side().sign(),
                OrderStatus::Active,
            ),
        };

        let id = OrderId(self.orders.len() as u64);
        let order = Order {
            id,
            kind: request.kind,
            open_price,
            stop_loss: request.stop_loss,
            take_profit: request.take_profit,
            open_time: Some(quote.time),
            close_time: None,
            close_price: None,
            status,
        };
        self.orders.push(order.clone());
        self.record(id, quote.time, OrderStatus::Unset, status, "created");
        Ok(order)
    }

    /// Close an order by hand.
    ///
    /// Pending orders become Deleted (close price = strike); active ones
    /// close at the quote price. Final or unknown orders are left untouched.
    pub fn close(&mut self, id: OrderId, quote: &Quote) -> Result<Order, OrderError> {
        let order = self
            .orders
            .get_mut(id.index())
            .ok_or(OrderError::NotFound(id))?;

        let from = order.status;
        let (to, close_price) = match from {
            OrderStatus::Pending => (OrderStatus::Deleted, order.open_price),
            OrderStatus::Active => (OrderStatus::Closed, quote.price),
            OrderStatus::Closed | OrderStatus::Deleted | OrderStatus::Unset => {
                return Err(OrderError::AlreadyFinal(id, from));
            }
        };
        order.status = to;
        order.close_price = Some(close_price);
        order.close_time = Some(quote.time);
        let snapshot = order.clone();
        self.record(id, quote.time, from, to, "closed by trader");
        Ok(snapshot)
    }

    /// Advance every live order against `quote`. Returns the number of transitions.
    ///
    /// Active orders are checked first, so an order filled on this quote is
    /// only exposed to its exits from the next quote on.
    pub fn update(&mut self, quote: &Quote, policy: TriggerPolicy) -> usize {
        let (low, high) = match policy {
            TriggerPolicy::LastPrice => (quote.price, quote.price),
            TriggerPolicy::IntrabarRange => (quote.low, quote.high),
        };
        let mut transitions = Vec::new();

        for order in self.orders.iter_mut().filter(|o| o.status == OrderStatus::Active) {
            if let Some(reason) = exit_reached(order, low, high) {
                let close_price = match (policy, reason) {
                    (TriggerPolicy::LastPrice, _) => quote.price,
                    (TriggerPolicy::IntrabarRange, ExitReason::StopLoss) => order.stop_loss,
                    (TriggerPolicy::IntrabarRange, ExitReason::TakeProfit) => order.take_profit,
                };
                order.status = OrderStatus::Closed;
                order.close_price = Some(close_price);
                order.close_time = Some(quote.time);
                transitions.push((order.id, OrderStatus::Active, OrderStatus::Closed, reason.as_str()));
            }
        }

        let pending: Vec<usize> = self
            .orders
            .iter()
            .enumerate()
            .filter(|(_, o)| o.status == OrderStatus::Pending)
            .map(|(i, _)| i)
            .collect();
        for i in pending {
            let order = &mut self.orders[i];
            if strike_reached(order, low, high, self.spread) {
                order.status = OrderStatus::Active;
                order.open_time = Some(quote.time);
                transitions.push((order.id, OrderStatus::Pending, OrderStatus::Active, "strike reached"));
            }
        }

        let count = transitions.len();
        for (id, from, to, reason) in transitions {
            tracing::debug!(order = %id, ?from, ?to, reason, "order transition");
            self.record(id, quote.time, from, to, reason);
        }
        count
    }

    fn record(
        &mut self,
        order_id: OrderId,
        time: NaiveDateTime,
        from_status: OrderStatus,
        to_status: OrderStatus,
        reason: &str,
    ) {
        self.audit.push(OrderAuditEntry {
            order_id,
            time,
            from_status,
            to_status,
            reason: reason.to_string(),
        });
    }

    // ── Queries ──

    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(id.index())
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn pending_orders(&self) -> impl Iterator<Item = &Order> {
        self.with_status(OrderStatus::Pending)
    }

    pub fn active_orders(&self) -> impl Iterator<Item = &Order> {
        self.with_status(OrderStatus::Active)
    }

    pub fn closed_orders(&self) -> impl Iterator<Item = &Order> {
        self.with_status(OrderStatus::Closed)
    }

    fn with_status(&self, status: OrderStatus) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(move |o| o.status == status)
    }

    /// The order whose latest activation or close happened last.
    pub fn last_order(&self) -> Option<&Order> {
        self.orders
            .iter()
            .filter(|o| matches!(o.status, OrderStatus::Active | OrderStatus::Closed))
            .max_by(|a, b| {
                a.last_activity()
                    .cmp(&b.last_activity())
                    .then_with(|| a.id.cmp(&b.id))
            })
    }

    /// Orders sorted by activity (see `Order::activity_cmp`).
    pub fn by_activity(&self) -> Vec<&Order> {
        let mut sorted: Vec<&Order> = self.orders.iter().collect();
        sorted.sort_by(|a, b| match a.activity_cmp(b) {
            Ordering::Equal => a.id.cmp(&b.id),
            other => other,
        });
        sorted
    }

    pub fn audit_trail(&self) -> &[OrderAuditEntry] {
        &self.audit
    }

    /// Sum of signed profit over closed orders.
    pub fn realized_profit(&self) -> f64 {
        self.orders.iter().filter_map(Order::profit).sum()
    }

    /// Sum of signed unrealized profit over active orders at `price`.
    pub fn floating_profit(&self, price: f64) -> f64 {
        self.active_orders()
            .filter_map(|o| o.floating_profit(price))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(10, minute, 0)
            .unwrap()
    }

    fn q(minute: u32, price: f64) -> Quote {
        Quote::at(at(minute), price)
    }

    #[test]
    fn market_buy_closes_at_take_profit_price() {
        let mut book = OrderBook::new(0.0);
        let order = book
            .try_create(OrderRequest::market(OrderKind::Buy, 1.0950, 1.1100), &q(0, 1.1000))
            .unwrap();
        assert_eq!(order.status, OrderStatus::Active);
        assert_eq!(order.open_price, 1.1000);

        for (minute, price) in [(0, 1.1000), (1, 1.1050)] {
            book.update(&q(minute, price), TriggerPolicy::LastPrice);
            assert_eq!(book.get(order.id).unwrap().status, OrderStatus::Active);
        }
        assert_eq!(book.update(&q(2, 1.1101), TriggerPolicy::LastPrice), 1);

        let closed = book.get(order.id).unwrap();
        assert_eq!(closed.status, OrderStatus::Closed);
        assert_eq!(closed.close_price, Some(1.1101));
        assert_eq!(closed.close_time, Some(at(2)));
    }

    #[test]
    fn market_open_price_includes_spread() {
        let mut book = OrderBook::new(0.0002);
        let buy = book
            .try_create(OrderRequest::market(OrderKind::Buy, 1.09, 1.11), &q(0, 1.1))
            .unwrap();
        let sell = book
            .try_create(OrderRequest::market(OrderKind::Sell, 1.11, 1.09), &q(0, 1.1))
            .unwrap();
        assert!((buy.open_price - 1.1002).abs() < 1e-12);
        assert!((sell.open_price - 1.0998).abs() < 1e-12);
    }

    #[test]
    fn invalid_request_is_rejected_without_side_effects() {
        let mut book = OrderBook::new(0.0);
        let err = book
            .try_create(OrderRequest::market(OrderKind::Buy, 1.2, 1.3), &q(0, 1.1))
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidRequest { .. }));
        assert!(book.is_empty());
        assert!(book.audit_trail().is_empty());
    }

    #[test]
    fn buy_limit_waits_for_strike() {
        let mut book = OrderBook::new(0.0);
        let order = book
            .try_create(
                OrderRequest::pending(OrderKind::BuyLimit, 1.0900, 1.0800, 1.1000),
                &q(0, 1.1000),
            )
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);

        book.update(&q(1, 1.0950), TriggerPolicy::LastPrice);
        book.update(&q(2, 1.0901), TriggerPolicy::LastPrice);
        assert_eq!(book.get(order.id).unwrap().status, OrderStatus::Pending);

        book.update(&q(3, 1.0899), TriggerPolicy::LastPrice);
        let filled = book.get(order.id).unwrap();
        assert_eq!(filled.status, OrderStatus::Active);
        assert_eq!(filled.open_time, Some(at(3)));
        assert_eq!(filled.open_price, 1.0900);
    }

    #[test]
    fn filled_order_not_exited_on_the_filling_quote() {
        let mut book = OrderBook::new(0.0);
        // the fill quote is already past take-profit
        let order = book
            .try_create(
                OrderRequest::pending(OrderKind::BuyStop, 1.1000, 1.0950, 1.1100),
                &q(0, 1.0900),
            )
            .unwrap();
        book.update(&q(1, 1.1200), TriggerPolicy::LastPrice);
        assert_eq!(book.get(order.id).unwrap().status, OrderStatus::Active);
        book.update(&q(2, 1.1200), TriggerPolicy::LastPrice);
        assert_eq!(book.get(order.id).unwrap().status, OrderStatus::Closed);
    }

    #[test]
    fn closing_pending_deletes_it() {
        let mut book = OrderBook::new(0.0);
        let order = book
            .try_create(
                OrderRequest::pending(OrderKind::SellLimit, 1.2, 1.3, 1.1),
                &q(0, 1.15),
            )
            .unwrap();
        let closed = book.close(order.id, &q(1, 1.16)).unwrap();
        assert_eq!(closed.status, OrderStatus::Deleted);
        assert_eq!(closed.close_price, Some(1.2));
        assert_eq!(closed.profit(), None);
    }

    #[test]
    fn closing_twice_reports_and_does_not_mutate() {
        let mut book = OrderBook::new(0.0);
        let order = book
            .try_create(OrderRequest::market(OrderKind::Sell, 1.2, 1.0), &q(0, 1.1))
            .unwrap();
        let closed = book.close(order.id, &q(1, 1.05)).unwrap();
        assert_eq!(closed.close_price, Some(1.05));

        let err = book.close(order.id, &q(2, 1.0)).unwrap_err();
        assert_eq!(err, OrderError::AlreadyFinal(order.id, OrderStatus::Closed));
        assert_eq!(book.get(order.id).unwrap().close_price, Some(1.05));
        assert_eq!(book.close(OrderId(99), &q(2, 1.0)).unwrap_err(), OrderError::NotFound(OrderId(99)));
    }

    #[test]
    fn realized_profit_is_signed_by_side() {
        let mut book = OrderBook::new(0.0);
        let buy = book
            .try_create(OrderRequest::market(OrderKind::Buy, 1.0, 2.0), &q(0, 1.5))
            .unwrap();
        let sell = book
            .try_create(OrderRequest::market(OrderKind::Sell, 2.0, 1.0), &q(0, 1.5))
            .unwrap();
        book.close(buy.id, &q(1, 1.6)).unwrap();
        book.close(sell.id, &q(1, 1.6)).unwrap();
        assert!((book.realized_profit() - 0.0).abs() < 1e-12);
        assert!((book.get(buy.id).unwrap().profit().unwrap() - 0.1).abs() < 1e-12);
        assert!((book.get(sell.id).unwrap().profit().unwrap() + 0.1).abs() < 1e-12);
    }

    #[test]
    fn intrabar_range_exits_at_breached_level() {
        let mut book = OrderBook::new(0.0);
        let order = book
            .try_create(OrderRequest::market(OrderKind::Buy, 1.0950, 1.1100), &q(0, 1.1))
            .unwrap();
        let quote = q(1, 1.1000).with_range(1.0900, 1.1200);
        book.update(&quote, TriggerPolicy::IntrabarRange);
        let closed = book.get(order.id).unwrap();
        assert_eq!(closed.status, OrderStatus::Closed);
        assert_eq!(closed.close_price, Some(1.0950));
    }

    #[test]
    fn last_order_tracks_latest_activity() {
        let mut book = OrderBook::new(0.0);
        let first = book
            .try_create(OrderRequest::market(OrderKind::Buy, 1.0, 2.0), &q(0, 1.5))
            .unwrap();
        let second = book
            .try_create(OrderRequest::market(OrderKind::Buy, 1.0, 2.0), &q(1, 1.5))
            .unwrap();
        assert_eq!(book.last_order().unwrap().id, second.id);
        book.close(first.id, &q(5, 1.5)).unwrap();
        assert_eq!(book.last_order().unwrap().id, first.id);
    }

    #[test]
    fn audit_trail_records_every_transition() {
        let mut book = OrderBook::new(0.0);
        let order = book
            .try_create(
                OrderRequest::pending(OrderKind::BuyLimit, 1.09, 1.08, 1.10),
                &q(0, 1.1),
            )
            .unwrap();
        book.update(&q(1, 1.089), TriggerPolicy::LastPrice);
        book.update(&q(2, 1.10), TriggerPolicy::LastPrice);
        let statuses: Vec<_> = book
            .audit_trail()
            .iter()
            .map(|e| (e.order_id, e.from_status, e.to_status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                (order.id, OrderStatus::Unset, OrderStatus::Pending),
                (order.id, OrderStatus::Pending, OrderStatus::Active),
                (order.id, OrderStatus::Active, OrderStatus::Closed),
            ]
        );
    }

    #[test]
    fn by_activity_puts_active_orders_last() {
        let mut book = OrderBook::new(0.0);
        let market = || OrderRequest::market(OrderKind::Buy, 1.0, 1.2);
        // id 0 fills late, so it sorts after the earlier market fill
        book.try_create(OrderRequest::pending(OrderKind::BuyLimit, 1.05, 0.9, 1.3), &q(0, 1.10))
            .unwrap();
        book.try_create(market(), &q(1, 1.10)).unwrap();
        let two = book.try_create(market(), &q(2, 1.10)).unwrap();
        let three = book.try_create(market(), &q(3, 1.10)).unwrap();
        book.try_create(OrderRequest::pending(OrderKind::BuyLimit, 1.00, 0.9, 1.3), &q(3, 1.10))
            .unwrap();
        let five = book.try_create(market(), &q(4, 1.10)).unwrap();
        book.close(three.id, &q(4, 1.10)).unwrap();
        book.close(two.id, &q(5, 1.10)).unwrap();
        book.close(five.id, &q(5, 1.10)).unwrap();
        assert_eq!(book.update(&q(6, 1.04), TriggerPolicy::LastPrice), 1);

        let order: Vec<usize> = book.by_activity().iter().map(|o| o.id.index()).collect();
        // pending, closed by close time (ties by id), then active by open time
        assert_eq!(order, vec![4, 3, 2, 5, 1, 0]);
    }
}
