//! The order book for a single market.
//!
//! Uses `BTreeMap` for price-level ordering:
//! - **Bids** (buys): `BTreeMap<Reverse<Decimal>, PriceLevel>` -- highest price first
//! - **Asks** (sells): `BTreeMap<Decimal, PriceLevel>` -- lowest price first
//!
//! An auxiliary `HashMap<OrderId, (Side, Price)>` enables O(log N)
//! cancellation. The map is only ever used for lookup, never iterated, so
//! it cannot leak hash ordering into the event stream.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use marketcore_types::*;
use rust_decimal::Decimal;

use crate::price_level::PriceLevel;

/// The order book for a single market.
#[derive(Debug)]
pub struct OrderBook {
    /// The market this book belongs to.
    pub market: MarketId,
    /// Buy side: highest price first (`Reverse` key).
    pub(crate) bids: BTreeMap<Reverse<Decimal>, PriceLevel>,
    /// Sell side: lowest price first.
    pub(crate) asks: BTreeMap<Decimal, PriceLevel>,
    /// Fast lookup: `OrderId -> (side, price)`.
    pub(crate) index: HashMap<OrderId, (Side, Decimal)>,
    /// While set, submissions rest without matching.
    pub(crate) auction: bool,
    /// Time-priority counter handed to resting orders.
    next_sequence: u64,
    /// Feeds deterministic trade IDs.
    trade_sequence: u64,
    pub(crate) last_traded_price: Option<Decimal>,
}

impl OrderBook {
    /// Create a new empty order book for the given market.
    #[must_use]
    pub fn new(market: MarketId) -> Self {
        Self {
            market,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            index: HashMap::new(),
            auction: false,
            next_sequence: 0,
            trade_sequence: 0,
            last_traded_price: None,
        }
    }

    /// Switch between auction (collect only) and continuous matching.
    pub fn set_auction(&mut self, auction: bool) {
        self.auction = auction;
    }

    /// Whether the book is collecting orders for an uncrossing.
    #[must_use]
    pub fn in_auction(&self) -> bool {
        self.auction
    }

    // =================================================================
    // Insertion
    // =================================================================

    /// Rest an order at the back of its price level.
    ///
    /// Assigns the order's time-priority sequence. The caller keeps its
    /// copy in sync with the stored one.
    pub fn insert_order(&mut self, order: &mut Order) -> Result<()> {
        if self.index.contains_key(&order.id) {
            return Err(MarketcoreError::DuplicateOrder(order.id));
        }
        if order.order_type == OrderType::Market || order.price <= Decimal::ZERO {
            return Err(MarketcoreError::InvalidOrder {
                reason: format!("order {} cannot rest at price {}", order.id, order.price),
            });
        }
        if order.remaining <= Decimal::ZERO {
            return Err(MarketcoreError::InvalidOrder {
                reason: format!("order {} has nothing left to rest", order.id),
            });
        }

        order.sequence = self.next_sequence;
        self.next_sequence += 1;

        let price = order.price;
        self.index.insert(order.id, (order.side, price));

        match order.side {
            Side::Buy => {
                self.bids
                    .entry(Reverse(price))
                    .or_insert_with(|| PriceLevel::new(price))
                    .push_back(order.clone());
            }
            Side::Sell => {
                self.asks
                    .entry(price)
                    .or_insert_with(|| PriceLevel::new(price))
                    .push_back(order.clone());
            }
        }
        Ok(())
    }

    // =================================================================
    // Cancellation / amendment
    // =================================================================

    /// Remove an order by ID. Returns the removed order untouched; the
    /// caller decides its final status.
    pub fn cancel(&mut self, order_id: &OrderId) -> Result<Order> {
        let (side, price) = self
            .index
            .remove(order_id)
            .ok_or(MarketcoreError::OrderNotFound(*order_id))?;

        let removed = self
            .level_mut(side, price)
            .and_then(|level| level.remove_order(order_id));
        self.drop_level_if_empty(side, price);

        removed.ok_or_else(|| {
            MarketcoreError::InvariantViolation(format!(
                "order {order_id} indexed at {side} {price} but missing from its level"
            ))
        })
    }

    /// Replace a resting order with its amended version.
    ///
    /// Keeps time priority when the price is unchanged and the remaining
    /// size did not grow; otherwise the order moves to the back of its
    /// (possibly new) level. Does not match: callers that move a price
    /// across the spread must resubmit instead.
    pub fn amend(&mut self, mut amended: Order) -> Result<Order> {
        let (side, price) = *self
            .index
            .get(&amended.id)
            .ok_or(MarketcoreError::OrderNotFound(amended.id))?;

        if amended.side != side {
            return Err(MarketcoreError::InvalidAmendment {
                reason: "side cannot change".into(),
            });
        }

        let keeps_priority = amended.price == price
            && self
                .get(&amended.id)
                .is_some_and(|current| amended.remaining <= current.remaining);

        if keeps_priority {
            let slot = self
                .level_mut(side, price)
                .and_then(|level| level.get_mut(&amended.id))
                .ok_or_else(|| {
                    MarketcoreError::InvariantViolation(format!(
                        "order {} indexed but missing from its level",
                        amended.id
                    ))
                })?;
            amended.sequence = slot.sequence;
            *slot = amended.clone();
            return Ok(amended);
        }

        self.cancel(&amended.id)?;
        self.insert_order(&mut amended)?;
        Ok(amended)
    }

    /// Remove every order matching `predicate`, oldest first.
    pub fn remove_where<F>(&mut self, predicate: F) -> Vec<Order>
    where
        F: Fn(&Order) -> bool,
    {
        let mut targets: Vec<(u64, OrderId)> = self
            .iter_orders()
            .filter(|o| predicate(*o))
            .map(|o| (o.sequence, o.id))
            .collect();
        targets.sort_unstable();

        targets
            .into_iter()
            .filter_map(|(_, id)| self.cancel(&id).ok())
            .collect()
    }

    /// Drain all orders from the book, oldest first.
    pub fn drain_all(&mut self) -> Vec<Order> {
        self.index.clear();
        let mut all: Vec<Order> = Vec::with_capacity(self.order_count());
        for level in self.bids.values_mut() {
            all.extend(level.orders.drain(..));
        }
        for level in self.asks.values_mut() {
            all.extend(level.orders.drain(..));
        }
        self.bids.clear();
        self.asks.clear();
        all.sort_by_key(|o| o.sequence);
        all
    }

    // =================================================================
    // Queries
    // =================================================================

    /// Look up a resting order by ID.
    #[must_use]
    pub fn get(&self, order_id: &OrderId) -> Option<&Order> {
        let (side, price) = self.index.get(order_id)?;
        match side {
            Side::Buy => self.bids.get(&Reverse(*price))?.get(order_id),
            Side::Sell => self.asks.get(price)?.get(order_id),
        }
    }

    /// Best (highest) bid price, or `None` if no bids.
    #[must_use]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.keys().next().map(|r| r.0)
    }

    /// Best (lowest) ask price, or `None` if no asks.
    #[must_use]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.keys().next().copied()
    }

    /// Remaining size at the best bid, zero if no bids.
    #[must_use]
    pub fn best_bid_volume(&self) -> Decimal {
        self.bids
            .values()
            .next()
            .map_or(Decimal::ZERO, PriceLevel::total_volume)
    }

    /// Remaining size at the best ask, zero if no asks.
    #[must_use]
    pub fn best_ask_volume(&self) -> Decimal {
        self.asks
            .values()
            .next()
            .map_or(Decimal::ZERO, PriceLevel::total_volume)
    }

    /// Highest bid price carried by at least one static order.
    #[must_use]
    pub fn best_static_bid(&self) -> Option<Decimal> {
        self.bids.values().find(|l| l.has_static()).map(|l| l.price)
    }

    /// Lowest ask price carried by at least one static order.
    #[must_use]
    pub fn best_static_ask(&self) -> Option<Decimal> {
        self.asks.values().find(|l| l.has_static()).map(|l| l.price)
    }

    /// Spread = `best_ask - best_bid`. `None` if either side is empty.
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Mid price = `(best_bid + best_ask) / 2`, unrounded.
    #[must_use]
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    /// Mid of the static best prices, unrounded.
    #[must_use]
    pub fn static_mid_price(&self) -> Option<Decimal> {
        match (self.best_static_bid(), self.best_static_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    /// Total remaining size resting on one side.
    #[must_use]
    pub fn total_volume(&self, side: Side) -> Decimal {
        match side {
            Side::Buy => self.bids.values().map(PriceLevel::total_volume).sum(),
            Side::Sell => self.asks.values().map(PriceLevel::total_volume).sum(),
        }
    }

    /// Price of the most recent trade, continuous or uncrossing.
    #[must_use]
    pub fn last_traded_price(&self) -> Option<Decimal> {
        self.last_traded_price
    }

    /// Total number of orders currently in the book.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.index.len()
    }

    /// Number of distinct bid price levels.
    #[must_use]
    pub fn bid_depth(&self) -> usize {
        self.bids.len()
    }

    /// Number of distinct ask price levels.
    #[must_use]
    pub fn ask_depth(&self) -> usize {
        self.asks.len()
    }

    /// Returns `true` if no orders rest on either side.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Whether `order_id` rests in this book.
    #[must_use]
    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.index.contains_key(order_id)
    }

    // =================================================================
    // Iteration
    // =================================================================

    /// Iterate bid levels from best (highest) to worst.
    pub fn bid_levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.bids.values()
    }

    /// Iterate ask levels from best (lowest) to worst.
    pub fn ask_levels(&self) -> impl Iterator<Item = &PriceLevel> {
        self.asks.values()
    }

    /// Levels of one side, best first.
    pub(crate) fn levels(&self, side: Side) -> Box<dyn Iterator<Item = &PriceLevel> + '_> {
        match side {
            Side::Buy => Box::new(self.bids.values()),
            Side::Sell => Box::new(self.asks.values()),
        }
    }

    /// Every resting order: bids best first, then asks best first.
    pub fn iter_orders(&self) -> impl Iterator<Item = &Order> {
        self.bids
            .values()
            .chain(self.asks.values())
            .flat_map(|level| level.orders.iter())
    }

    // =================================================================
    // Internal helpers
    // =================================================================

    /// The level at `price` on `side`, if any.
    pub(crate) fn level_mut(&mut self, side: Side, price: Decimal) -> Option<&mut PriceLevel> {
        match side {
            Side::Buy => self.bids.get_mut(&Reverse(price)),
            Side::Sell => self.asks.get_mut(&price),
        }
    }

    /// Remove the level at `price` once its last order is gone.
    pub(crate) fn drop_level_if_empty(&mut self, side: Side, price: Decimal) {
        match side {
            Side::Buy => {
                if self.bids.get(&Reverse(price)).is_some_and(PriceLevel::is_empty) {
                    self.bids.remove(&Reverse(price));
                }
            }
            Side::Sell => {
                if self.asks.get(&price).is_some_and(PriceLevel::is_empty) {
                    self.asks.remove(&price);
                }
            }
        }
    }

    /// Reduce a resting order by `size`, removing it once filled.
    /// Returns the order's state after the fill.
    pub(crate) fn fill_resting(
        &mut self,
        order_id: &OrderId,
        size: Decimal,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Order> {
        let (side, price) = *self
            .index
            .get(order_id)
            .ok_or(MarketcoreError::OrderNotFound(*order_id))?;

        let resting = self
            .level_mut(side, price)
            .and_then(|level| level.get_mut(order_id))
            .ok_or_else(|| {
                MarketcoreError::InvariantViolation(format!(
                    "order {order_id} indexed but missing from its level"
                ))
            })?;

        if size > resting.remaining {
            return Err(MarketcoreError::InvariantViolation(format!(
                "fill of {size} exceeds remaining {} on {order_id}",
                resting.remaining
            )));
        }
        resting.remaining -= size;
        resting.updated_at = Some(now);

        if resting.remaining.is_zero() {
            let mut filled = self.cancel(order_id)?;
            filled.status = OrderStatus::Filled;
            return Ok(filled);
        }
        Ok(resting.clone())
    }

    /// Next trade ID from the per-book counter.
    pub(crate) fn next_trade_id(&mut self) -> TradeId {
        let id = TradeId::deterministic(&self.market, self.trade_sequence);
        self.trade_sequence += 1;
        id
    }
}
