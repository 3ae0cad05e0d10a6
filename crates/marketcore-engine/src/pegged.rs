//! Pegged order management.
//!
//! A pegged order is priced at `reference ± offset`, where the reference is
//! the best *static* bid, best static ask or static mid. Whenever one of
//! those moves, the orders pegged to it are repriced in a single batch, in
//! the order they were first submitted.
//!
//! ```text
//!             reference available            reference gone / auction
//!   Parked ─────────────────────────▶ Active ─────────────────────────▶ Parked
//!     │                                 │
//!     └──── funds check fails ──────────┴──────────────────────────────▶ Stopped
//! ```
//!
//! The manager owns the parked orders and an expiry index of its own; the
//! active ones live in the [`OrderBook`]. It never talks to collateral
//! beyond a read-only funds check: callers apply holding transfers from
//! the returned [`RepriceOutcome`].

use std::collections::{BTreeMap, HashMap};
use std::ops::BitOr;

use chrono::{DateTime, Utc};
use marketcore_book::OrderBook;
use marketcore_types::*;
use rust_decimal::Decimal;
use tracing::debug;

use crate::collateral::Collateral;
use crate::expiry::ExpiringOrders;

// =================================================================
// Reference prices
// =================================================================

/// The static reference prices pegged orders are priced from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct References {
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub mid: Option<Decimal>,
}

impl References {
    #[must_use]
    pub fn from_book(book: &OrderBook) -> Self {
        Self {
            best_bid: book.best_static_bid(),
            best_ask: book.best_static_ask(),
            mid: book.static_mid_price(),
        }
    }

    #[must_use]
    pub fn get(&self, reference: PeggedReference) -> Option<Decimal> {
        match reference {
            PeggedReference::BestBid => self.best_bid,
            PeggedReference::BestAsk => self.best_ask,
            PeggedReference::Mid => self.mid,
        }
    }
}

/// Bitmask of references that moved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReferenceChanges(u8);

impl ReferenceChanges {
    pub const NONE: Self = Self(0);
    pub const BEST_BID: Self = Self(1);
    pub const BEST_ASK: Self = Self(1 << 1);
    pub const MID: Self = Self(1 << 2);
    pub const ALL: Self = Self(0b111);

    #[must_use]
    pub fn between(before: &References, after: &References) -> Self {
        let mut bits = 0;
        if before.best_bid != after.best_bid {
            bits |= Self::BEST_BID.0;
        }
        if before.best_ask != after.best_ask {
            bits |= Self::BEST_ASK.0;
        }
        if before.mid != after.mid {
            bits |= Self::MID.0;
        }
        Self(bits)
    }

    #[must_use]
    pub fn contains(self, reference: PeggedReference) -> bool {
        let bit = match reference {
            PeggedReference::BestBid => Self::BEST_BID.0,
            PeggedReference::BestAsk => Self::BEST_ASK.0,
            PeggedReference::Mid => Self::MID.0,
        };
        self.0 & bit != 0
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ReferenceChanges {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Price of a pegged order against `refs`, as `(on_tick, unrounded)`.
///
/// Buys are rounded down to the tick and sells up, so rounding always
/// moves the order away from the spread. `None` when the reference is
/// missing or the price would not be positive.
#[must_use]
pub fn peg_price(
    side: Side,
    peg: &PeggedOrder,
    refs: &References,
    tick_size: Decimal,
) -> Option<(Decimal, Decimal)> {
    let reference = refs.get(peg.reference)?;
    let raw = match side {
        Side::Buy => reference - peg.offset,
        Side::Sell => reference + peg.offset,
    };
    let price = if tick_size > Decimal::ZERO {
        let steps = raw / tick_size;
        let steps = match side {
            Side::Buy => steps.floor(),
            Side::Sell => steps.ceil(),
        };
        steps * tick_size
    } else {
        raw
    };
    (price > Decimal::ZERO).then_some((price, raw))
}

/// Check a peg against the side and tick rules.
pub fn validate_peg(side: Side, peg: &PeggedOrder, tick_size: Decimal) -> Result<()> {
    if !peg.reference.valid_for(side) {
        return Err(MarketcoreError::InvalidPeggedReference {
            side,
            reference: peg.reference,
        });
    }
    if peg.offset < Decimal::ZERO {
        return Err(MarketcoreError::InvalidPeggedOffset {
            offset: peg.offset,
            reason: "offset cannot be negative".into(),
        });
    }
    if peg.reference == PeggedReference::Mid && peg.offset.is_zero() {
        return Err(MarketcoreError::InvalidPeggedOffset {
            offset: peg.offset,
            reason: "offset against the mid must be positive".into(),
        });
    }
    if !is_multiple_of(peg.offset, tick_size) {
        return Err(MarketcoreError::InvalidPeggedOffset {
            offset: peg.offset,
            reason: format!("not a multiple of tick size {tick_size}"),
        });
    }
    Ok(())
}

// =================================================================
// Manager
// =================================================================

/// What a repricing pass did, for the caller to turn into collateral
/// calls and events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepriceOutcome {
    /// Pulled off the book (or left) parked at price zero.
    pub parked: Vec<Order>,
    /// Placed or moved on the book at a new price.
    pub repriced: Vec<Order>,
    /// Stopped after failing the funds check; no longer tracked.
    pub cancelled: Vec<Order>,
}

impl RepriceOutcome {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parked.is_empty() && self.repriced.is_empty() && self.cancelled.is_empty()
    }
}

/// Index of pegged orders in one market.
#[derive(Debug, Default)]
pub struct PeggedOrders {
    /// Insertion sequence → order. Iteration order is repricing order.
    by_sequence: BTreeMap<u64, OrderId>,
    sequences: HashMap<OrderId, u64>,
    next_sequence: u64,
    parked: HashMap<OrderId, Order>,
    expiring: ExpiringOrders,
}

impl PeggedOrders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a pegged order, registering its expiry if it has one.
    pub fn track(&mut self, order: &Order) {
        if self.sequences.contains_key(&order.id) {
            return;
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.by_sequence.insert(sequence, order.id);
        self.sequences.insert(order.id, sequence);
        if let Some(at) = order.expires_at {
            self.expiring.insert(order.id, at);
        }
    }

    /// Stop tracking. Returns the order if it was parked.
    pub fn untrack(&mut self, order_id: &OrderId) -> Option<Order> {
        if let Some(sequence) = self.sequences.remove(order_id) {
            self.by_sequence.remove(&sequence);
        }
        self.expiring.remove(order_id);
        self.parked.remove(order_id)
    }

    /// Re-register the expiry of a tracked order after an amendment.
    pub fn update_expiry(&mut self, order_id: OrderId, expires_at: Option<DateTime<Utc>>) {
        match expires_at {
            Some(at) if self.is_tracked(&order_id) => self.expiring.insert(order_id, at),
            _ => {
                self.expiring.remove(&order_id);
            }
        }
    }

    /// Park a tracked order: price zero, status `Parked`.
    pub fn park(&mut self, mut order: Order, now: DateTime<Utc>) -> Order {
        order.status = OrderStatus::Parked;
        order.price = Decimal::ZERO;
        order.updated_at = Some(now);
        self.track(&order);
        self.parked.insert(order.id, order.clone());
        order
    }

    /// Take an order out of the parked set; it stays tracked.
    pub fn unpark(&mut self, order_id: &OrderId) -> Option<Order> {
        self.parked.remove(order_id)
    }

    #[must_use]
    pub fn get_parked_by_id(&self, order_id: &OrderId) -> Option<&Order> {
        self.parked.get(order_id)
    }

    pub fn get_parked_mut(&mut self, order_id: &OrderId) -> Option<&mut Order> {
        self.parked.get_mut(order_id)
    }

    #[must_use]
    pub fn is_tracked(&self, order_id: &OrderId) -> bool {
        self.sequences.contains_key(order_id)
    }

    #[must_use]
    pub fn is_parked(&self, order_id: &OrderId) -> bool {
        self.parked.contains_key(order_id)
    }

    /// Number of tracked pegged orders, parked or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    #[must_use]
    pub fn parked_len(&self) -> usize {
        self.parked.len()
    }

    /// Tracked ids in submission order.
    #[must_use]
    pub fn ids(&self) -> Vec<OrderId> {
        self.by_sequence.values().copied().collect()
    }

    /// Remove a tracked order from wherever it lives, untracking it.
    pub fn take(&mut self, book: &mut OrderBook, order_id: &OrderId) -> Result<Order> {
        if let Some(parked) = self.untrack(order_id) {
            return Ok(parked);
        }
        book.cancel(order_id)
    }

    /// Park every pegged order still on the book. Returns them in
    /// submission order.
    pub fn enter_auction(&mut self, book: &mut OrderBook, now: DateTime<Utc>) -> Vec<Order> {
        let mut parked = Vec::new();
        for id in self.ids() {
            if self.parked.contains_key(&id) {
                continue;
            }
            if let Ok(order) = book.cancel(&id) {
                parked.push(self.park(order, now));
            }
        }
        if !parked.is_empty() {
            debug!(count = parked.len(), "pegged orders parked for auction");
        }
        parked
    }

    /// Expire every tracked order whose expiry is `<= now`.
    pub fn expire(&mut self, book: &mut OrderBook, now: DateTime<Utc>) -> Vec<Order> {
        let mut expired = Vec::new();
        for id in self.expiring.expire(now) {
            if let Ok(mut order) = self.take(book, &id) {
                order.status = OrderStatus::Expired;
                order.updated_at = Some(now);
                expired.push(order);
            }
        }
        expired
    }

    /// Reprice every order pegged to a reference in `changes`, in
    /// submission order.
    pub fn reprice_all(
        &mut self,
        book: &mut OrderBook,
        changes: ReferenceChanges,
        tick_size: Decimal,
        collateral: &dyn Collateral,
        now: DateTime<Utc>,
    ) -> Result<RepriceOutcome> {
        let mut outcome = RepriceOutcome::default();
        if changes.is_empty() {
            return Ok(outcome);
        }
        let refs = References::from_book(book);
        for id in self.ids() {
            let Some(peg) = self.peg_of(book, &id) else {
                continue;
            };
            if changes.contains(peg.reference) {
                self.reprice(book, &id, &refs, tick_size, collateral, now, &mut outcome)?;
            }
        }
        if !outcome.is_empty() {
            debug!(
                repriced = outcome.repriced.len(),
                parked = outcome.parked.len(),
                cancelled = outcome.cancelled.len(),
                "pegged orders repriced"
            );
        }
        Ok(outcome)
    }

    /// Reprice a single tracked order regardless of what moved.
    pub fn reprice_one(
        &mut self,
        book: &mut OrderBook,
        order_id: &OrderId,
        tick_size: Decimal,
        collateral: &dyn Collateral,
        now: DateTime<Utc>,
    ) -> Result<RepriceOutcome> {
        let refs = References::from_book(book);
        let mut outcome = RepriceOutcome::default();
        self.reprice(book, order_id, &refs, tick_size, collateral, now, &mut outcome)?;
        Ok(outcome)
    }

    fn peg_of(&self, book: &OrderBook, order_id: &OrderId) -> Option<PeggedOrder> {
        self.parked
            .get(order_id)
            .or_else(|| book.get(order_id))
            .and_then(|o| o.pegged)
    }

    #[allow(clippy::too_many_arguments)]
    fn reprice(
        &mut self,
        book: &mut OrderBook,
        order_id: &OrderId,
        refs: &References,
        tick_size: Decimal,
        collateral: &dyn Collateral,
        now: DateTime<Utc>,
        outcome: &mut RepriceOutcome,
    ) -> Result<()> {
        let is_parked = self.parked.contains_key(order_id);
        let current = match self.parked.get(order_id).or_else(|| book.get(order_id)) {
            Some(order) => order.clone(),
            None => {
                return Err(MarketcoreError::InvariantViolation(format!(
                    "pegged order {order_id} is neither parked nor on the book"
                )));
            }
        };
        let Some(peg) = current.pegged else {
            return Ok(());
        };

        let priced = peg_price(current.side, &peg, refs, tick_size).filter(|(price, _)| {
            // A pegged order never rests crossed.
            let opposite = match current.side {
                Side::Buy => book.best_ask(),
                Side::Sell => book.best_bid(),
            };
            opposite.is_none_or(|best| match current.side {
                Side::Buy => *price < best,
                Side::Sell => *price > best,
            })
        });

        let Some((price, original)) = priced else {
            if !is_parked {
                let order = book.cancel(order_id)?;
                outcome.parked.push(self.park(order, now));
            }
            return Ok(());
        };

        if !is_parked && current.price == price {
            return Ok(());
        }

        if collateral
            .check_sufficient_funds(
                &current.id,
                &current.party,
                current.side,
                price,
                current.remaining,
                true,
            )
            .is_err()
        {
            let mut order = self.take(book, order_id)?;
            order.status = OrderStatus::Stopped;
            order.updated_at = Some(now);
            outcome.cancelled.push(order);
            return Ok(());
        }

        let mut order = current;
        order.price = price;
        order.original_price = original;
        order.status = OrderStatus::Active;
        order.updated_at = Some(now);
        let placed = if is_parked {
            self.parked.remove(order_id);
            book.insert_order(&mut order)?;
            order
        } else {
            book.amend(order)?
        };
        debug!(order = %placed.id, price = %placed.price, "pegged order placed");
        outcome.repriced.push(placed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collateral::InMemoryCollateral;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    fn book() -> OrderBook {
        OrderBook::new(MarketId::new("TEST-PERP"))
    }

    fn rest(book: &mut OrderBook, side: Side, price: i64) -> Order {
        let mut order = Order::dummy_limit(side, dec(price), dec(1));
        book.insert_order(&mut order).unwrap();
        order
    }

    fn rich(orders: &[&Order]) -> InMemoryCollateral {
        let mut ledger = InMemoryCollateral::default();
        for order in orders {
            ledger.deposit(&order.party, dec(1_000_000)).unwrap();
        }
        ledger
    }

    fn peg(reference: PeggedReference, offset: i64) -> PeggedOrder {
        PeggedOrder {
            reference,
            offset: dec(offset),
        }
    }

    #[test]
    fn buy_rounds_down_sell_rounds_up() {
        let refs = References {
            best_bid: Some(dec(990)),
            best_ask: Some(dec(1010)),
            mid: Some(Decimal::new(10005, 1)),
        };
        let mid = peg(PeggedReference::Mid, 10);
        assert_eq!(peg_price(Side::Buy, &mid, &refs, dec(10)), Some((dec(990), Decimal::new(9905, 1))));
        assert_eq!(peg_price(Side::Sell, &mid, &refs, dec(10)), Some((dec(1020), Decimal::new(10105, 1))));
        assert_eq!(
            peg_price(Side::Buy, &peg(PeggedReference::BestBid, 10), &refs, Decimal::ONE),
            Some((dec(980), dec(980)))
        );
    }

    #[test]
    fn missing_or_non_positive_reference_parks() {
        let refs = References {
            best_bid: Some(dec(5)),
            ..References::default()
        };
        assert_eq!(peg_price(Side::Sell, &peg(PeggedReference::BestAsk, 1), &refs, Decimal::ONE), None);
        assert_eq!(peg_price(Side::Buy, &peg(PeggedReference::BestBid, 5), &refs, Decimal::ONE), None);
    }

    #[test]
    fn peg_validation() {
        let tick = dec(5);
        assert!(validate_peg(Side::Buy, &peg(PeggedReference::BestBid, 10), tick).is_ok());
        assert!(matches!(
            validate_peg(Side::Buy, &peg(PeggedReference::BestAsk, 10), tick),
            Err(MarketcoreError::InvalidPeggedReference { .. })
        ));
        assert!(matches!(
            validate_peg(Side::Sell, &peg(PeggedReference::Mid, 0), tick),
            Err(MarketcoreError::InvalidPeggedOffset { .. })
        ));
        assert!(matches!(
            validate_peg(Side::Sell, &peg(PeggedReference::BestAsk, 7), tick),
            Err(MarketcoreError::InvalidPeggedOffset { .. })
        ));
        assert!(validate_peg(Side::Sell, &peg(PeggedReference::BestAsk, -5), tick).is_err());
    }

    #[test]
    fn change_mask() {
        let before = References {
            best_bid: Some(dec(990)),
            best_ask: Some(dec(1010)),
            mid: Some(dec(1000)),
        };
        let after = References {
            best_bid: Some(dec(980)),
            mid: Some(dec(995)),
            ..before
        };
        let changes = ReferenceChanges::between(&before, &after);
        assert!(changes.contains(PeggedReference::BestBid));
        assert!(changes.contains(PeggedReference::Mid));
        assert!(!changes.contains(PeggedReference::BestAsk));
        assert!(ReferenceChanges::between(&before, &before).is_empty());
        assert_eq!(
            ReferenceChanges::BEST_BID | ReferenceChanges::BEST_ASK | ReferenceChanges::MID,
            ReferenceChanges::ALL
        );
    }

    #[test]
    fn parked_order_is_placed_when_reference_appears() {
        let mut book = book();
        let mut pegged = PeggedOrders::new();
        let order = Order::dummy_pegged(Side::Buy, PeggedReference::BestBid, dec(10), dec(2));
        let parked = pegged.park(order.clone(), now());
        assert_eq!(parked.status, OrderStatus::Parked);
        assert_eq!(pegged.get_parked_by_id(&order.id).map(|o| o.price), Some(Decimal::ZERO));

        let bid = rest(&mut book, Side::Buy, 990);
        let ledger = rich(&[&order, &bid]);
        let outcome = pegged
            .reprice_all(&mut book, ReferenceChanges::BEST_BID, Decimal::ONE, &ledger, now())
            .unwrap();

        assert_eq!(outcome.repriced.len(), 1);
        assert_eq!(outcome.repriced[0].price, dec(980));
        assert_eq!(outcome.repriced[0].status, OrderStatus::Active);
        assert!(book.contains(&order.id));
        assert_eq!(pegged.parked_len(), 0);
        assert_eq!(pegged.len(), 1);
    }

    #[test]
    fn order_parks_when_reference_vanishes() {
        let mut book = book();
        let mut pegged = PeggedOrders::new();
        let bid = rest(&mut book, Side::Buy, 990);
        let order = Order::dummy_pegged(Side::Buy, PeggedReference::BestBid, dec(10), dec(2));
        pegged.park(order.clone(), now());
        let ledger = rich(&[&order, &bid]);
        pegged
            .reprice_all(&mut book, ReferenceChanges::ALL, Decimal::ONE, &ledger, now())
            .unwrap();
        assert!(book.contains(&order.id));

        book.cancel(&bid.id).unwrap();
        let outcome = pegged
            .reprice_all(&mut book, ReferenceChanges::BEST_BID, Decimal::ONE, &ledger, now())
            .unwrap();
        assert_eq!(outcome.parked.len(), 1);
        assert_eq!(outcome.parked[0].price, Decimal::ZERO);
        assert_eq!(outcome.parked[0].status, OrderStatus::Parked);
        assert!(!book.contains(&order.id));
        assert!(pegged.is_parked(&order.id));
    }

    #[test]
    fn unrelated_reference_change_is_ignored() {
        let mut book = book();
        let mut pegged = PeggedOrders::new();
        let order = Order::dummy_pegged(Side::Sell, PeggedReference::BestAsk, dec(1), dec(1));
        pegged.park(order.clone(), now());
        rest(&mut book, Side::Sell, 1010);
        let ledger = rich(&[&order]);
        let outcome = pegged
            .reprice_all(&mut book, ReferenceChanges::BEST_BID, Decimal::ONE, &ledger, now())
            .unwrap();
        assert!(outcome.is_empty());
        assert!(pegged.is_parked(&order.id));
    }

    #[test]
    fn failed_funds_check_stops_and_untracks() {
        let mut book = book();
        let mut pegged = PeggedOrders::new();
        rest(&mut book, Side::Buy, 990);
        let order = Order::dummy_pegged(Side::Buy, PeggedReference::BestBid, dec(10), dec(2));
        pegged.park(order.clone(), now());
        let broke = InMemoryCollateral::default();

        let outcome = pegged
            .reprice_all(&mut book, ReferenceChanges::ALL, Decimal::ONE, &broke, now())
            .unwrap();
        assert_eq!(outcome.cancelled.len(), 1);
        assert_eq!(outcome.cancelled[0].status, OrderStatus::Stopped);
        assert!(!pegged.is_tracked(&order.id));
        assert!(!book.contains(&order.id));
    }

    #[test]
    fn enter_auction_parks_in_submission_order() {
        let mut book = book();
        let mut pegged = PeggedOrders::new();
        let bid = rest(&mut book, Side::Buy, 990);
        let first = Order::dummy_pegged(Side::Buy, PeggedReference::BestBid, dec(20), dec(1));
        let second = Order::dummy_pegged(Side::Buy, PeggedReference::BestBid, dec(10), dec(1));
        pegged.park(first.clone(), now());
        pegged.park(second.clone(), now());
        let ledger = rich(&[&first, &second, &bid]);
        pegged
            .reprice_all(&mut book, ReferenceChanges::ALL, Decimal::ONE, &ledger, now())
            .unwrap();
        assert_eq!(book.order_count(), 3);

        let parked = pegged.enter_auction(&mut book, now());
        let ids: Vec<OrderId> = parked.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
        assert_eq!(book.order_count(), 1);
        assert_eq!(pegged.parked_len(), 2);
    }

    #[test]
    fn expiry_removes_from_book_and_index() {
        let mut book = book();
        let mut pegged = PeggedOrders::new();
        let bid = rest(&mut book, Side::Buy, 990);
        let mut order = Order::dummy_pegged(Side::Buy, PeggedReference::BestBid, dec(10), dec(1));
        order.time_in_force = TimeInForce::Gtt;
        order.expires_at = Some(now() + chrono::Duration::seconds(10));
        pegged.park(order.clone(), now());
        let ledger = rich(&[&order, &bid]);
        pegged
            .reprice_all(&mut book, ReferenceChanges::ALL, Decimal::ONE, &ledger, now())
            .unwrap();

        assert!(pegged.expire(&mut book, now() + chrono::Duration::seconds(9)).is_empty());
        let expired = pegged.expire(&mut book, now() + chrono::Duration::seconds(10));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].status, OrderStatus::Expired);
        assert!(!book.contains(&order.id));
        assert!(pegged.is_empty());
    }
}
