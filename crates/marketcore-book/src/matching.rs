//! Continuous price-time matching.
//!
//! An incoming order walks the opposite side from the best price outward;
//! within a level resting orders are consumed oldest-first and every fill
//! trades at the resting order's price.
//!
//! ```text
//! plan_match(&Order) -> MatchPlan          (no side effects)
//! submit(&mut Order, now) -> OrderConfirmation
//! ```
//!
//! ## Wash trades
//!
//! A resting order owned by the aggressor's party is skipped and the
//! aggressor continues with the next resting order. Skipped volume never
//! counts towards a fill-or-kill check, and a persistent remainder that
//! would rest crossed against its own order is stopped instead.

use chrono::{DateTime, Utc};
use marketcore_types::*;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::OrderBook;

/// One prospective fill against a resting order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fill {
    pub resting_order: OrderId,
    pub resting_party: PartyId,
    pub price: Decimal,
    pub size: Decimal,
}

/// Everything an order would do against the current book.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchPlan {
    pub fills: Vec<Fill>,
    /// Sum of all fill sizes.
    pub volume: Decimal,
    /// At least one crossing resting order belonged to the same party.
    pub wash_skipped: bool,
}

impl MatchPlan {
    /// Distinct trade prices in fill order.
    #[must_use]
    pub fn prices(&self) -> Vec<Decimal> {
        let mut prices: Vec<Decimal> = Vec::new();
        for fill in &self.fills {
            if prices.last() != Some(&fill.price) {
                prices.push(fill.price);
            }
        }
        prices
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fills.is_empty()
    }
}

impl OrderBook {
    /// Preview the fills `order` would produce, without touching the book.
    #[must_use]
    pub fn plan_match(&self, order: &Order) -> MatchPlan {
        let mut plan = MatchPlan::default();
        let mut remaining = order.remaining;

        'levels: for level in self.levels(order.side.opposite()) {
            if remaining.is_zero() || !order.crosses(level.price) {
                break;
            }
            for resting in &level.orders {
                if remaining.is_zero() {
                    break 'levels;
                }
                if resting.party == order.party {
                    plan.wash_skipped = true;
                    continue;
                }
                let size = remaining.min(resting.remaining);
                plan.fills.push(Fill {
                    resting_order: resting.id,
                    resting_party: resting.party,
                    price: level.price,
                    size,
                });
                plan.volume += size;
                remaining -= size;
            }
        }
        plan
    }

    /// Submit an order to the book.
    ///
    /// During an auction the order simply rests. In continuous mode it is
    /// matched and its status finalised:
    ///
    /// | outcome | status |
    /// |---|---|
    /// | fully filled | `Filled` |
    /// | FOK short of full size | `Stopped`, no trades |
    /// | IOC / market with fills | `PartiallyFilled` |
    /// | IOC / market without fills | `Stopped` |
    /// | persistent remainder | `Active` (rests) |
    /// | persistent remainder crossed by own order | `Stopped` |
    pub fn submit(&mut self, order: &mut Order, now: DateTime<Utc>) -> Result<OrderConfirmation> {
        if self.contains(&order.id) {
            return Err(MarketcoreError::DuplicateOrder(order.id));
        }
        if order.remaining <= Decimal::ZERO || order.remaining > order.size {
            return Err(MarketcoreError::InvalidOrder {
                reason: format!(
                    "remaining {} outside (0, {}]",
                    order.remaining, order.size
                ),
            });
        }

        if self.auction {
            self.insert_order(order)?;
            order.status = OrderStatus::Active;
            return Ok(OrderConfirmation::without_trades(order.clone()));
        }

        let plan = self.plan_match(order);

        if order.time_in_force == TimeInForce::Fok && plan.volume < order.remaining {
            if plan.wash_skipped {
                warn!(
                    order = %order.id,
                    party = %order.party,
                    "FOK stopped: fillable volume excludes own resting orders"
                );
            }
            order.status = OrderStatus::Stopped;
            order.updated_at = Some(now);
            return Ok(OrderConfirmation::without_trades(order.clone()));
        }

        let mut trades = Vec::with_capacity(plan.fills.len());
        let mut passive = Vec::with_capacity(plan.fills.len());
        for fill in &plan.fills {
            let resting = self.fill_resting(&fill.resting_order, fill.size, now)?;
            order.remaining -= fill.size;

            let trade = self.make_trade(order, &resting, fill.price, fill.size, now);
            debug!(
                trade = %trade.id,
                price = %trade.price,
                size = %trade.size,
                aggressor = %order.side,
                "continuous fill"
            );
            trades.push(trade);
            passive.push(resting);
        }
        if let Some(last) = plan.fills.last() {
            self.last_traded_price = Some(last.price);
            order.updated_at = Some(now);
        }

        if order.remaining.is_zero() {
            order.status = OrderStatus::Filled;
        } else if order.is_persistent() {
            let crossed = match order.side {
                Side::Buy => self.best_ask(),
                Side::Sell => self.best_bid(),
            }
            .is_some_and(|best| order.crosses(best));

            if crossed {
                warn!(
                    order = %order.id,
                    party = %order.party,
                    remaining = %order.remaining,
                    "remainder would cross own resting order, stopping"
                );
                order.status = OrderStatus::Stopped;
                order.updated_at = Some(now);
            } else {
                self.insert_order(order)?;
                order.status = OrderStatus::Active;
            }
        } else {
            order.status = if trades.is_empty() {
                OrderStatus::Stopped
            } else {
                OrderStatus::PartiallyFilled
            };
            order.updated_at = Some(now);
        }

        Ok(OrderConfirmation {
            order: order.clone(),
            trades,
            passive_orders_affected: passive,
        })
    }

    fn make_trade(
        &mut self,
        aggressor: &Order,
        resting: &Order,
        price: Decimal,
        size: Decimal,
        now: DateTime<Utc>,
    ) -> Trade {
        let (buy, sell) = match aggressor.side {
            Side::Buy => (aggressor, resting),
            Side::Sell => (resting, aggressor),
        };
        Trade {
            id: self.next_trade_id(),
            market: self.market.clone(),
            price,
            size,
            buyer: buy.party,
            seller: sell.party,
            buy_order: buy.id,
            sell_order: sell.id,
            aggressor: Some(aggressor.side),
            trade_type: TradeType::Default,
            timestamp: now,
        }
    }
}
