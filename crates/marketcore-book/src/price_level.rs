//! A single price level in the order book.
//!
//! Orders at the same price are stored in FIFO order (time priority)
//! using a [`VecDeque`].

use std::collections::VecDeque;

use marketcore_types::{Order, OrderId};
use rust_decimal::Decimal;

/// A single price level containing all orders at that price.
///
/// The front of the deque has the highest time priority and is filled
/// first.
#[derive(Debug, Clone)]
pub struct PriceLevel {
    /// Price shared by every order here.
    pub price: Decimal,
    /// Oldest first.
    pub orders: VecDeque<Order>,
}

impl PriceLevel {
    /// An empty level at `price`.
    #[must_use]
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            orders: VecDeque::new(),
        }
    }

    /// Add an order to the back of this level (lowest time priority).
    pub fn push_back(&mut self, order: Order) {
        self.orders.push_back(order);
    }

    /// The order that fills next, without removing it.
    #[must_use]
    pub fn front(&self) -> Option<&Order> {
        self.orders.front()
    }

    /// Total remaining size across all orders at this level.
    #[must_use]
    pub fn total_volume(&self) -> Decimal {
        self.orders.iter().map(|o| o.remaining).sum()
    }

    /// Remaining size of static (non-pegged, non-liquidity) orders.
    #[must_use]
    pub fn static_volume(&self) -> Decimal {
        self.orders
            .iter()
            .filter(|o| o.is_static())
            .map(|o| o.remaining)
            .sum()
    }

    /// Whether a static order rests here, i.e. the level can set a
    /// static best price.
    #[must_use]
    pub fn has_static(&self) -> bool {
        self.orders.iter().any(Order::is_static)
    }

    /// Look up an order at this level by ID.
    #[must_use]
    pub fn get(&self, order_id: &OrderId) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == *order_id)
    }

    /// Mutable lookup; time priority is unaffected.
    pub fn get_mut(&mut self, order_id: &OrderId) -> Option<&mut Order> {
        self.orders.iter_mut().find(|o| o.id == *order_id)
    }

    /// Remove a specific order by ID. Returns the removed order, or `None`.
    pub fn remove_order(&mut self, order_id: &OrderId) -> Option<Order> {
        let pos = self.orders.iter().position(|o| o.id == *order_id)?;
        self.orders.remove(pos)
    }

    /// `true` once the last order has left; the book then drops the level.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Number of resting orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.orders.len()
    }
}
