//! Order types and the order lifecycle states.

use super::ids::OrderId;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// What kind of order. Limit and stop kinds carry a strike price and start Pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    Buy,
    Sell,
    BuyLimit,
    SellLimit,
    BuyStop,
    SellStop,
}

/// Direction of exposure an order opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// +1 for buys, -1 for sells.
    pub fn sign(self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }
}

impl OrderKind {
    pub fn side(self) -> OrderSide {
        match self {
            OrderKind::Buy | OrderKind::BuyLimit | OrderKind::BuyStop => OrderSide::Buy,
            OrderKind::Sell | OrderKind::SellLimit | OrderKind::SellStop => OrderSide::Sell,
        }
    }

    /// Market kinds fill at creation; the rest wait for their strike price.
    pub fn is_market(self) -> bool {
        matches!(self, OrderKind::Buy | OrderKind::Sell)
    }

    pub fn group(self) -> OrderGroup {
        match self {
            OrderKind::Buy => OrderGroup::MarketBuy,
            OrderKind::Sell => OrderGroup::MarketSell,
            OrderKind::BuyLimit | OrderKind::BuyStop => OrderGroup::PendingBuy,
            OrderKind::SellLimit | OrderKind::SellStop => OrderGroup::PendingSell,
        }
    }
}

/// Display grouping of order kinds (one curve set per group).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderGroup {
    MarketBuy,
    MarketSell,
    PendingBuy,
    PendingSell,
}

impl OrderGroup {
    pub const ALL: [OrderGroup; 4] = [
        OrderGroup::MarketBuy,
        OrderGroup::MarketSell,
        OrderGroup::PendingBuy,
        OrderGroup::PendingSell,
    ];
}

/// Order lifecycle states.
///
/// `Unset` only appears on placeholders handed back for disregarded requests;
/// no order inside a book is ever `Unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Unset,
    /// Waiting for price to reach the strike.
    Pending,
    /// Filled, exposed to stop-loss / take-profit.
    Active,
    /// Exited at `close_price`.
    Closed,
    /// Pending order withdrawn before it ever filled.
    Deleted,
}

impl OrderStatus {
    /// Closed and Deleted accept no further transitions.
    pub fn is_final(self) -> bool {
        matches!(self, OrderStatus::Closed | OrderStatus::Deleted)
    }
}

/// A single order. Snapshots of this struct are what traders get back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub kind: OrderKind,
    /// Fill price for market kinds, strike price for pending kinds.
    pub open_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Creation time while Pending, fill time once Active.
    pub open_time: Option<NaiveDateTime>,
    pub close_time: Option<NaiveDateTime>,
    pub close_price: Option<f64>,
    pub status: OrderStatus,
}

impl Order {
    /// Placeholder handed back when an order request is disregarded.
    pub fn disregarded(kind: OrderKind, stop_loss: f64, take_profit: f64) -> Self {
        Self {
            id: OrderId::UNASSIGNED,
            kind,
            open_price: f64::NAN,
            stop_loss,
            take_profit,
            open_time: None,
            close_time: None,
            close_price: None,
            status: OrderStatus::Unset,
        }
    }

    /// Whether this order actually entered a book.
    pub fn is_placed(&self) -> bool {
        self.status != OrderStatus::Unset
    }

    pub fn side(&self) -> OrderSide {
        self.kind.side()
    }

    /// Signed profit of a closed order, per unit.
    pub fn profit(&self) -> Option<f64> {
        match (self.status, self.close_price) {
            (OrderStatus::Closed, Some(close)) => {
                Some((close - self.open_price) * self.side().sign())
            }
            _ => None,
        }
    }

    /// Signed unrealized profit of an active order at `price`.
    pub fn floating_profit(&self, price: f64) -> Option<f64> {
        match self.status {
            OrderStatus::Active => Some((price - self.open_price) * self.side().sign()),
            _ => None,
        }
    }

    /// Time of the latest state change visible on the order.
    pub fn last_activity(&self) -> Option<NaiveDateTime> {
        match self.status {
            OrderStatus::Closed | OrderStatus::Deleted => self.close_time,
            _ => self.open_time,
        }
    }

    /// Activity ordering: active orders sort after the rest and among
    /// themselves by open time; everything else by close time.
    pub fn activity_cmp(&self, other: &Order) -> Ordering {
        let self_active = self.status == OrderStatus::Active;
        let other_active = other.status == OrderStatus::Active;
        match (self_active, other_active) {
            (true, true) => self.open_time.cmp(&other.open_time),
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            (false, false) => self.close_time.cmp(&other.close_time),
        }
    }
}

/// Audit trail entry for an order state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAuditEntry {
    pub order_id: OrderId,
    pub time: NaiveDateTime,
    pub from_status: OrderStatus,
    pub to_status: OrderStatus,
    pub reason: String,
}
