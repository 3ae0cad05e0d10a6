//! Order submission.
//!
//! ```text
//! state check → validate → funds check → pegged pricing / park
//!   → auction: rest
//!   → continuous: preview fills → price monitoring → match
//!       → holdings → expiry → reprice pegged → liquidity checks → market data
//! ```

use marketcore_types::*;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::Market;
use crate::pegged::References;

impl Market {
    /// Submit a new order.
    ///
    /// Validation and funding failures emit the order with status
    /// `Rejected` before the error is returned.
    pub fn submit_order(&mut self, submission: OrderSubmission) -> Result<OrderConfirmation> {
        self.guard()?;
        let result = self.submit_order_inner(&submission);
        self.fatal_check(result)
    }

    fn submit_order_inner(&mut self, submission: &OrderSubmission) -> Result<OrderConfirmation> {
        self.require_trading()?;
        let order = Order::from_submission(submission, self.config.id.clone(), self.now);
        if let Err(err) = self.validate_submission(submission) {
            return Err(self.reject_order(order, err));
        }
        if order.is_pegged() {
            return self.submit_pegged(order);
        }
        if let Err(err) = self.check_funds(&order, order.price) {
            return Err(self.reject_order(order, err));
        }
        self.place_order(order)
    }

    /// Put a validated, funded, non-parked order into play.
    pub(super) fn place_order(&mut self, order: Order) -> Result<OrderConfirmation> {
        if self.auction.in_auction() {
            self.rest_in_auction(order)
        } else {
            self.submit_continuous(order)
        }
    }

    // =================================================================
    // Validation
    // =================================================================

    fn validate_submission(&self, submission: &OrderSubmission) -> Result<()> {
        if self.book.contains(&submission.id) || self.pegged.is_tracked(&submission.id) {
            return Err(MarketcoreError::DuplicateOrder(submission.id));
        }
        if submission.size <= Decimal::ZERO {
            return Err(MarketcoreError::InvalidOrder {
                reason: format!("size must be positive, got {}", submission.size),
            });
        }

        match (submission.order_type, submission.pegged) {
            (OrderType::Market, Some(_)) => {
                return Err(MarketcoreError::InvalidOrder {
                    reason: "market orders cannot be pegged".into(),
                });
            }
            (OrderType::Market, None) => {
                if submission.price.is_some() {
                    return Err(MarketcoreError::InvalidOrder {
                        reason: "market orders carry no price".into(),
                    });
                }
                if !matches!(submission.time_in_force, TimeInForce::Ioc | TimeInForce::Fok) {
                    return Err(MarketcoreError::InvalidOrder {
                        reason: format!(
                            "market orders must be IOC or FOK, got {}",
                            submission.time_in_force
                        ),
                    });
                }
            }
            (OrderType::Limit, Some(peg)) => {
                if submission.price.is_some() {
                    return Err(MarketcoreError::InvalidOrder {
                        reason: "pegged orders are priced from their reference".into(),
                    });
                }
                if !matches!(submission.time_in_force, TimeInForce::Gtc | TimeInForce::Gtt) {
                    return Err(MarketcoreError::InvalidOrder {
                        reason: format!(
                            "pegged orders must be GTC or GTT, got {}",
                            submission.time_in_force
                        ),
                    });
                }
                crate::pegged::validate_peg(submission.side, &peg, self.config.tick_size)?;
            }
            (OrderType::Limit, None) => {
                let price = submission.price.ok_or_else(|| MarketcoreError::InvalidOrder {
                    reason: "limit orders need a price".into(),
                })?;
                self.validate_price(price)?;
            }
        }

        self.validate_time_in_force(submission.time_in_force)?;
        Self::validate_expiry(submission.time_in_force, submission.expires_at, self.now)
    }

    pub(super) fn validate_price(&self, price: Decimal) -> Result<()> {
        if price <= Decimal::ZERO {
            return Err(MarketcoreError::InvalidOrder {
                reason: format!("price must be positive, got {price}"),
            });
        }
        if !self.config.is_tick_multiple(price) {
            return Err(MarketcoreError::InvalidTickSize {
                price,
                tick_size: self.config.tick_size,
            });
        }
        Ok(())
    }

    pub(super) fn validate_time_in_force(&self, time_in_force: TimeInForce) -> Result<()> {
        let mode = self.auction.mode();
        let allowed = if self.auction.in_auction() {
            time_in_force.allowed_in_auction()
        } else {
            time_in_force.allowed_in_continuous()
        };
        if !allowed {
            return Err(MarketcoreError::TimeInForceNotAllowed {
                time_in_force,
                mode,
            });
        }
        Ok(())
    }

    pub(super) fn validate_expiry(
        time_in_force: TimeInForce,
        expires_at: Option<chrono::DateTime<chrono::Utc>>,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        match (time_in_force, expires_at) {
            (TimeInForce::Gtt, None) => Err(MarketcoreError::InvalidExpiration {
                reason: "GTT orders need an expiry".into(),
            }),
            (TimeInForce::Gtt, Some(at)) if at <= now => Err(MarketcoreError::InvalidExpiration {
                reason: format!("expiry {at} is not after {now}"),
            }),
            (TimeInForce::Gtt, Some(_)) | (_, None) => Ok(()),
            (other, Some(_)) => Err(MarketcoreError::InvalidExpiration {
                reason: format!("{other} orders cannot carry an expiry"),
            }),
        }
    }

    /// Funds check at `price`; market orders are checked at the best
    /// opposite price and skip the check on an empty opposite side. A
    /// resting order's current holding counts towards the requirement.
    pub(super) fn check_funds(&self, order: &Order, price: Decimal) -> Result<()> {
        let price = match order.order_type {
            OrderType::Limit => Some(price),
            OrderType::Market => match order.side {
                Side::Buy => self.book.best_ask(),
                Side::Sell => self.book.best_bid(),
            },
        };
        match price {
            Some(price) => self.collateral.check_sufficient_funds(
                &order.id,
                &order.party,
                order.side,
                price,
                order.remaining,
                order.is_pegged(),
            ),
            None => Ok(()),
        }
    }

    /// Emit `order` as rejected and hand back the error.
    pub(super) fn reject_order(&mut self, mut order: Order, err: MarketcoreError) -> MarketcoreError {
        warn!(
            market = %self.config.id,
            order = %order.id,
            party = %order.party,
            error = %err,
            "order rejected"
        );
        order.status = OrderStatus::Rejected;
        order.updated_at = Some(self.now);
        self.emit_order(&order);
        err
    }

    // =================================================================
    // Placement
    // =================================================================

    /// Rest an order during an auction.
    pub(super) fn rest_in_auction(&mut self, mut order: Order) -> Result<OrderConfirmation> {
        if let Err(err) = self.hold_order(&order) {
            return Err(self.reject_order(order, err));
        }
        let confirmation = self.book.submit(&mut order, self.now)?;
        self.register_expiry(&order);
        debug!(order = %order.id, price = %order.price, "order rests in auction");
        self.emit_order(&confirmation.order);
        self.emit_market_data();
        Ok(confirmation)
    }

    /// Match an order in continuous trading.
    pub(super) fn submit_continuous(&mut self, mut order: Order) -> Result<OrderConfirmation> {
        let plan = self.book.plan_match(&order);
        if !plan.is_empty() {
            if let Some(extension) = self.price_monitor.check_prices(&plan.prices(), self.now) {
                self.start_price_auction(extension)?;
                if matches!(order.time_in_force, TimeInForce::Gtc | TimeInForce::Gtt)
                    && order.order_type == OrderType::Limit
                {
                    if order.is_pegged() {
                        let parked = self.pegged.park(order, self.now);
                        self.emit_order(&parked);
                        self.emit_market_data();
                        return Ok(OrderConfirmation::without_trades(parked));
                    }
                    return self.rest_in_auction(order);
                }
                return Err(self.reject_order(order, MarketcoreError::NonPersistentOrderOutOfBounds));
            }
        }

        let before = References::from_book(&self.book);
        let mut confirmation = self.book.submit(&mut order, self.now)?;
        let redeploy = self.settle_fills(&mut confirmation)?;

        self.emit_order(&confirmation.order);
        for trade in &confirmation.trades {
            self.emit(Event::Trade(trade.clone()));
        }
        for passive in &confirmation.passive_orders_affected {
            self.emit_order(passive);
        }

        self.on_book_changed(&before, &redeploy)?;
        self.check_liquidity()?;
        self.emit_market_data();
        Ok(confirmation)
    }

    /// Bring holdings and indices in line with a continuous match.
    /// Returns liquidity providers whose orders were used up.
    fn settle_fills(&mut self, confirmation: &mut OrderConfirmation) -> Result<Vec<PartyId>> {
        let aggressor = &mut confirmation.order;
        if aggressor.status == OrderStatus::Active {
            if let Err(err) = self.hold_order(aggressor) {
                warn!(order = %aggressor.id, error = %err, "cannot hold margin for resting remainder, stopping");
                self.book.cancel(&aggressor.id)?;
                aggressor.status = OrderStatus::Stopped;
                aggressor.updated_at = Some(self.now);
                self.release_order(aggressor)?;
            } else if aggressor.is_pegged() {
                self.pegged.track(aggressor);
            } else {
                self.register_expiry(aggressor);
            }
        } else {
            self.release_order(aggressor)?;
        }

        let mut redeploy = Vec::new();
        for passive in &confirmation.passive_orders_affected {
            if passive.is_filled() {
                self.release_order(passive)?;
                if passive.is_liquidity_order() && !redeploy.contains(&passive.party) {
                    redeploy.push(passive.party);
                }
            } else {
                self.hold_order(passive)?;
            }
        }

        if let Some(last) = confirmation.trades.last() {
            for trade in &confirmation.trades {
                self.price_monitor.record_price(trade.price, self.now);
            }
            self.mark_price = Some(last.price);
        }
        Ok(redeploy)
    }

    fn register_expiry(&mut self, order: &Order) {
        if order.is_pegged() {
            return;
        }
        if let Some(at) = order.expires_at {
            self.expiring.insert(order.id, at);
        }
    }
}
