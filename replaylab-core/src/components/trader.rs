//! Trader trait and the context a trader acts through.

use super::history::History;
use super::indicator::IndicatorView;
use crate::domain::{Order, OrderId, OrderKind};
use crate::orders::{OrderBook, OrderError, OrderRequest, Quote};
use chrono::NaiveDateTime;

/// Trait for traders: stateful strategies that open and close orders.
///
/// Pending orders and exits are advanced by the engine before `calculate`
/// runs, so the context always reflects the current price.
pub trait Trader: Send {
    /// Optional warm-up over the look-back window. Cannot place orders.
    fn initialize(&mut self, history: &History<'_>, indicators: &IndicatorView<'_>) {
        let _ = (history, indicators);
    }

    fn calculate(&mut self, ctx: &mut TraderContext<'_>);
}

/// Everything a trader may see or do during one frame.
pub struct TraderContext<'a> {
    name: &'a str,
    history: History<'a>,
    indicators: IndicatorView<'a>,
    book: &'a mut OrderBook,
    quote: Quote,
}

impl<'a> TraderContext<'a> {
    pub fn new(
        name: &'a str,
        history: History<'a>,
        indicators: IndicatorView<'a>,
        book: &'a mut OrderBook,
        quote: Quote,
    ) -> Self {
        Self {
            name,
            history,
            indicators,
            book,
            quote,
        }
    }

    pub fn history(&self) -> &History<'a> {
        &self.history
    }

    pub fn indicators(&self) -> &IndicatorView<'a> {
        &self.indicators
    }

    pub fn price(&self) -> f64 {
        self.quote.price
    }

    pub fn time(&self) -> NaiveDateTime {
        self.quote.time
    }

    pub fn spread(&self) -> f64 {
        self.book.spread()
    }

    /// Place an order. Invalid requests are logged and disregarded: the
    /// returned placeholder has `OrderStatus::Unset` and an unassigned id.
    pub fn create_order(
        &mut self,
        kind: OrderKind,
        stop_loss: f64,
        take_profit: f64,
        strike: Option<f64>,
    ) -> Order {
        let request = OrderRequest {
            kind,
            stop_loss,
            take_profit,
            strike,
        };
        match self.book.try_create(request, &self.quote) {
            Ok(order) => {
                tracing::info!(trader = self.name, order = %order.id, ?kind, price = order.open_price, "order placed");
                order
            }
            Err(e) => {
                tracing::warn!(trader = self.name, price = self.quote.price, "{e}");
                Order::disregarded(kind, stop_loss, take_profit)
            }
        }
    }

    /// Close or delete an order at the current price.
    pub fn close_order(&mut self, id: OrderId) -> Result<Order, OrderError> {
        self.book.close(id, &self.quote).map_err(|e| {
            tracing::warn!(trader = self.name, "{e}");
            e
        })
    }

    pub fn order(&self, id: OrderId) -> Option<&Order> {
        self.book.get(id)
    }

    pub fn orders(&self) -> &[Order] {
        self.book.orders()
    }

    pub fn pending_orders(&self) -> impl Iterator<Item = &Order> {
        self.book.pending_orders()
    }

    pub fn active_orders(&self) -> impl Iterator<Item = &Order> {
        self.book.active_orders()
    }

    pub fn closed_orders(&self) -> impl Iterator<Item = &Order> {
        self.book.closed_orders()
    }

    pub fn last_order(&self) -> Option<&Order> {
        self.book.last_order()
    }
}
