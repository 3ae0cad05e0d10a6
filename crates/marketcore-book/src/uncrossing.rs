//! Call-auction uncrossing.
//!
//! Every distinct resting price is a candidate. At candidate `p` the
//! matchable volume is `min(Σ bids ≥ p, Σ asks ≤ p)`. Candidates are
//! ranked by a total order:
//!
//! 1. largest matchable volume
//! 2. closest to the last traded price (skipped when nothing has traded)
//! 3. smallest imbalance `|Σ bids ≥ p − Σ asks ≤ p|`
//! 4. lowest price
//!
//! Execution walks bids best-price-first/oldest-first against asks in the
//! same order, all at the single uncrossing price, skipping same-party
//! pairs. Uncrossing trades carry no aggressor.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use marketcore_types::*;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::OrderBook;

/// Aggregated demand and supply at one candidate price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UncrossingCandidate {
    pub price: Decimal,
    /// Σ bid volume at or above `price`.
    pub bid_volume: Decimal,
    /// Σ ask volume at or below `price`.
    pub ask_volume: Decimal,
}

impl UncrossingCandidate {
    #[must_use]
    pub fn volume(&self) -> Decimal {
        self.bid_volume.min(self.ask_volume)
    }

    #[must_use]
    pub fn imbalance(&self) -> Decimal {
        (self.bid_volume - self.ask_volume).abs()
    }
}

/// The price an auction would uncross at right now, and how much would
/// trade there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicativeUncrossing {
    pub price: Decimal,
    pub volume: Decimal,
}

/// Result of executing an uncrossing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UncrossOutcome {
    pub price: Decimal,
    /// Volume actually traded (may be below the indicative volume when
    /// same-party pairs were skipped).
    pub volume: Decimal,
    pub trades: Vec<Trade>,
    /// Final state of every order touched, in first-touch order. Includes
    /// filled orders and any stopped residue.
    pub updated_orders: Vec<Order>,
}

/// Rank `a` against `b`; `Less` means `a` is the better uncrossing price.
fn rank(
    a: &UncrossingCandidate,
    b: &UncrossingCandidate,
    last_traded: Option<Decimal>,
) -> Ordering {
    b.volume()
        .cmp(&a.volume())
        .then_with(|| match last_traded {
            Some(last) => (a.price - last).abs().cmp(&(b.price - last).abs()),
            None => Ordering::Equal,
        })
        .then_with(|| a.imbalance().cmp(&b.imbalance()))
        .then_with(|| a.price.cmp(&b.price))
}

/// Pick the uncrossing price from a set of candidates.
///
/// Returns `None` when no candidate has positive volume. The result does
/// not depend on the order of `candidates`.
#[must_use]
pub fn select_uncrossing(
    candidates: &[UncrossingCandidate],
    last_traded: Option<Decimal>,
) -> Option<IndicativeUncrossing> {
    candidates
        .iter()
        .filter(|c| c.volume() > Decimal::ZERO)
        .min_by(|a, b| rank(a, b, last_traded))
        .map(|c| IndicativeUncrossing {
            price: c.price,
            volume: c.volume(),
        })
}

impl OrderBook {
    /// Cumulative demand/supply at every distinct resting price, ascending.
    #[must_use]
    pub fn uncrossing_candidates(&self) -> Vec<UncrossingCandidate> {
        let prices: BTreeSet<Decimal> = self
            .bid_levels()
            .chain(self.ask_levels())
            .map(|level| level.price)
            .collect();

        prices
            .into_iter()
            .map(|price| UncrossingCandidate {
                price,
                bid_volume: self
                    .bid_levels()
                    .take_while(|l| l.price >= price)
                    .map(crate::PriceLevel::total_volume)
                    .sum(),
                ask_volume: self
                    .ask_levels()
                    .take_while(|l| l.price <= price)
                    .map(crate::PriceLevel::total_volume)
                    .sum(),
            })
            .collect()
    }

    /// The price and volume an uncrossing would produce now, if the book
    /// is crossed at all.
    #[must_use]
    pub fn indicative_uncrossing(&self) -> Option<IndicativeUncrossing> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) if bid >= ask => {}
            _ => return None,
        }
        select_uncrossing(&self.uncrossing_candidates(), self.last_traded_price)
    }

    /// Execute the uncrossing at the indicative price.
    ///
    /// Returns `Ok(None)` when the book is not crossed. Afterwards the book
    /// is never crossed: any same-party residue that still crosses is
    /// stopped, newest order first.
    pub fn uncross(&mut self, now: DateTime<Utc>) -> Result<Option<UncrossOutcome>> {
        let Some(indicative) = self.indicative_uncrossing() else {
            return Ok(None);
        };
        let price = indicative.price;

        let mut bids: Vec<(OrderId, PartyId, Decimal)> = self
            .bid_levels()
            .take_while(|l| l.price >= price)
            .flat_map(|l| l.orders.iter())
            .map(|o| (o.id, o.party, o.remaining))
            .collect();
        let mut asks: Vec<(OrderId, PartyId, Decimal)> = self
            .ask_levels()
            .take_while(|l| l.price <= price)
            .flat_map(|l| l.orders.iter())
            .map(|o| (o.id, o.party, o.remaining))
            .collect();

        let mut trades = Vec::new();
        let mut touched: Vec<OrderId> = Vec::new();
        let mut latest: HashMap<OrderId, Order> = HashMap::new();
        let mut volume = Decimal::ZERO;

        for bid in &mut bids {
            for ask in &mut asks {
                if bid.2.is_zero() {
                    break;
                }
                if ask.2.is_zero() || ask.1 == bid.1 {
                    continue;
                }
                let size = bid.2.min(ask.2);
                bid.2 -= size;
                ask.2 -= size;
                volume += size;

                let buy = self.fill_resting(&bid.0, size, now)?;
                let sell = self.fill_resting(&ask.0, size, now)?;
                let trade = Trade {
                    id: self.next_trade_id(),
                    market: self.market.clone(),
                    price,
                    size,
                    buyer: buy.party,
                    seller: sell.party,
                    buy_order: buy.id,
                    sell_order: sell.id,
                    aggressor: None,
                    trade_type: TradeType::Auction,
                    timestamp: now,
                };
                debug!(trade = %trade.id, price = %price, size = %size, "uncrossing fill");
                trades.push(trade);

                for order in [buy, sell] {
                    if !latest.contains_key(&order.id) {
                        touched.push(order.id);
                    }
                    latest.insert(order.id, order);
                }
            }
        }

        if !trades.is_empty() {
            self.last_traded_price = Some(price);
        }

        for mut stopped in self.stop_crossed_residue() {
            stopped.updated_at = Some(now);
            if !latest.contains_key(&stopped.id) {
                touched.push(stopped.id);
            }
            latest.insert(stopped.id, stopped);
        }

        let updated_orders = touched
            .iter()
            .filter_map(|id| latest.remove(id))
            .collect();

        Ok(Some(UncrossOutcome {
            price,
            volume,
            trades,
            updated_orders,
        }))
    }

    /// While the best bid still meets the best ask, stop the newest order
    /// at either best level.
    fn stop_crossed_residue(&mut self) -> Vec<Order> {
        let mut stopped = Vec::new();
        loop {
            let (Some(bid), Some(ask)) = (self.best_bid(), self.best_ask()) else {
                break;
            };
            if bid < ask {
                break;
            }
            let newest = self
                .bid_levels()
                .take(1)
                .chain(self.ask_levels().take(1))
                .flat_map(|l| l.orders.iter())
                .max_by_key(|o| o.sequence)
                .map(|o| o.id);
            let Some(id) = newest else { break };
            let Ok(mut order) = self.cancel(&id) else { break };
            warn!(order = %order.id, party = %order.party, "stopping crossed same-party residue");
            order.status = OrderStatus::Stopped;
            stopped.push(order);
        }
        stopped
    }
}

#[cfg(test)]
mod tests {
    use marketcore_types::*;
    use rust_decimal::Decimal;

    use super::*;

    fn book_in_auction() -> OrderBook {
        let mut book = OrderBook::new(MarketId::new("TEST-PERP"));
        book.set_auction(true);
        book
    }

    fn rest(book: &mut OrderBook, side: Side, price: i64, size: i64) -> Order {
        let mut order = Order::dummy_limit(side, Decimal::new(price, 0), Decimal::new(size, 0));
        book.submit(&mut order, DateTime::<Utc>::UNIX_EPOCH).unwrap();
        order
    }

    fn candidate(price: i64, bids: i64, asks: i64) -> UncrossingCandidate {
        UncrossingCandidate {
            price: Decimal::new(price, 0),
            bid_volume: Decimal::new(bids, 0),
            ask_volume: Decimal::new(asks, 0),
        }
    }

    #[test]
    fn empty_book_has_no_uncrossing() {
        let book = book_in_auction();
        assert_eq!(book.indicative_uncrossing(), None);
    }

    #[test]
    fn uncrossed_book_has_no_uncrossing() {
        let mut book = book_in_auction();
        rest(&mut book, Side::Buy, 99, 1);
        rest(&mut book, Side::Sell, 101, 1);
        assert_eq!(book.indicative_uncrossing(), None);
    }

    #[test]
    fn maximises_volume() {
        let mut book = book_in_auction();
        rest(&mut book, Side::Buy, 102, 5);
        rest(&mut book, Side::Buy, 100, 5);
        rest(&mut book, Side::Sell, 99, 3);
        rest(&mut book, Side::Sell, 101, 6);

        // 99: min(10, 3)=3; 100: min(10, 3)=3; 101: min(5, 9)=5; 102: min(5, 9)=5
        let indicative = book.indicative_uncrossing().unwrap();
        assert_eq!(indicative.volume, Decimal::new(5, 0));
        // 101 and 102 tie on volume and imbalance, lowest price wins
        assert_eq!(indicative.price, Decimal::new(101, 0));
    }

    #[test]
    fn tie_breaks_towards_last_traded_price() {
        let candidates = [candidate(100, 5, 5), candidate(104, 5, 5)];
        let near_high = select_uncrossing(&candidates, Some(Decimal::new(103, 0))).unwrap();
        assert_eq!(near_high.price, Decimal::new(104, 0));
        let no_reference = select_uncrossing(&candidates, None).unwrap();
        assert_eq!(no_reference.price, Decimal::new(100, 0));
    }

    #[test]
    fn tie_breaks_towards_smaller_imbalance() {
        let candidates = [candidate(100, 9, 5), candidate(101, 5, 6)];
        let picked = select_uncrossing(&candidates, None).unwrap();
        assert_eq!(picked.price, Decimal::new(101, 0));
    }

    #[test]
    fn zero_volume_candidates_are_ignored() {
        let candidates = [candidate(100, 0, 5), candidate(101, 5, 0)];
        assert_eq!(select_uncrossing(&candidates, None), None);
    }

    #[test]
    fn uncross_executes_at_single_price_oldest_first() {
        let mut book = book_in_auction();
        let old_bid = rest(&mut book, Side::Buy, 105, 2);
        let new_bid = rest(&mut book, Side::Buy, 105, 2);
        rest(&mut book, Side::Sell, 100, 3);

        let outcome = book.uncross(DateTime::<Utc>::UNIX_EPOCH).unwrap().unwrap();
        assert_eq!(outcome.volume, Decimal::new(3, 0));
        assert!(outcome.trades.iter().all(|t| t.price == outcome.price));
        assert!(outcome.trades.iter().all(|t| t.aggressor.is_none()));
        assert!(outcome.trades.iter().all(|t| t.trade_type == TradeType::Auction));
        assert_eq!(outcome.trades[0].buy_order, old_bid.id);
        assert_eq!(outcome.trades[0].size, Decimal::new(2, 0));

        let remaining = book.get(&new_bid.id).unwrap();
        assert_eq!(remaining.remaining, Decimal::ONE);
        assert!(book.best_ask().is_none());
        assert_eq!(book.last_traded_price(), Some(outcome.price));
    }

    #[test]
    fn uncross_reports_touched_orders() {
        let mut book = book_in_auction();
        let bid = rest(&mut book, Side::Buy, 101, 1);
        let ask = rest(&mut book, Side::Sell, 100, 1);
        let outcome = book.uncross(DateTime::<Utc>::UNIX_EPOCH).unwrap().unwrap();

        let ids: Vec<OrderId> = outcome.updated_orders.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![bid.id, ask.id]);
        assert!(outcome
            .updated_orders
            .iter()
            .all(|o| o.status == OrderStatus::Filled));
        assert!(book.is_empty());
    }

    #[test]
    fn uncross_skips_same_party_and_stops_residue() {
        let party = PartyId::new();
        let mut book = book_in_auction();
        let mut bid =
            Order::dummy_limit_for_party(party, Side::Buy, Decimal::new(101, 0), Decimal::ONE);
        book.submit(&mut bid, DateTime::<Utc>::UNIX_EPOCH).unwrap();
        let mut ask =
            Order::dummy_limit_for_party(party, Side::Sell, Decimal::new(100, 0), Decimal::ONE);
        book.submit(&mut ask, DateTime::<Utc>::UNIX_EPOCH).unwrap();

        let outcome = book.uncross(DateTime::<Utc>::UNIX_EPOCH).unwrap().unwrap();
        assert!(outcome.trades.is_empty());
        assert_eq!(outcome.updated_orders.len(), 1);
        assert_eq!(outcome.updated_orders[0].id, ask.id);
        assert_eq!(outcome.updated_orders[0].status, OrderStatus::Stopped);
        assert!(book.contains(&bid.id));
    }

    #[test]
    fn uncross_on_uncrossed_book_is_noop() {
        let mut book = book_in_auction();
        rest(&mut book, Side::Buy, 99, 1);
        rest(&mut book, Side::Sell, 100, 1);
        assert!(book.uncross(DateTime::<Utc>::UNIX_EPOCH).unwrap().is_none());
        assert_eq!(book.order_count(), 2);
    }
}
