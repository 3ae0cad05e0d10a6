//! Amendment and cancellation of resting and parked orders.

use marketcore_types::*;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::Market;
use crate::pegged::{References, validate_peg};

impl Market {
    // =================================================================
    // Amend
    // =================================================================

    /// Amend price, size, expiry, time in force or peg of an order.
    ///
    /// A rejected amendment leaves the order untouched and re-emits it.
    /// Clearing the peg replaces the order with a plain limit order under
    /// a derived id.
    pub fn amend_order(&mut self, amendment: OrderAmendment) -> Result<OrderConfirmation> {
        self.guard()?;
        let result = self.amend_order_inner(&amendment);
        self.fatal_check(result)
    }

    fn amend_order_inner(&mut self, amendment: &OrderAmendment) -> Result<OrderConfirmation> {
        self.require_trading()?;
        if !amendment.has_changes() {
            return Err(MarketcoreError::InvalidAmendment {
                reason: "no changes requested".into(),
            });
        }
        let current = self
            .get_order(&amendment.order_id)
            .cloned()
            .ok_or(MarketcoreError::OrderNotFound(amendment.order_id))?;
        if current.party != amendment.party {
            return Err(MarketcoreError::PartyMismatch {
                order: current.id,
                party: amendment.party,
            });
        }
        if current.is_liquidity_order() {
            return Err(MarketcoreError::CannotModifyLiquidityOrder);
        }

        let amended = match self.validate_amendment(&current, amendment) {
            Ok(amended) => amended,
            Err(err) => return Err(self.reject_amendment(&current, err)),
        };

        if amendment.clear_peg {
            self.convert_to_limit(&current, amended)
        } else if self.pegged.is_parked(&current.id) {
            self.amend_parked(amended, amendment.changes_peg())
        } else if current.is_pegged() {
            self.amend_pegged(&current, amended, amendment.changes_peg())
        } else {
            self.amend_limit(&current, amended)
        }
    }

    /// Build the amended order, or explain why the amendment is refused.
    fn validate_amendment(&self, current: &Order, amendment: &OrderAmendment) -> Result<Order> {
        if current.is_pegged() {
            if amendment.price.is_some() && !amendment.clear_peg {
                return Err(MarketcoreError::CannotAmendPeggedOrderPrice);
            }
        } else if amendment.changes_peg() || amendment.clear_peg {
            return Err(MarketcoreError::CannotAmendPegOnNonPeggedOrder);
        }
        if amendment.clear_peg && amendment.changes_peg() {
            return Err(MarketcoreError::InvalidAmendment {
                reason: "cannot change and clear a peg at once".into(),
            });
        }

        let mut amended = current.clone();

        if amendment.clear_peg {
            if amendment.price.is_none() {
                return Err(MarketcoreError::InvalidAmendment {
                    reason: "clearing a peg needs a limit price".into(),
                });
            }
            amended.pegged = None;
        }
        if let Some(price) = amendment.price {
            self.validate_price(price)?;
            amended.price = price;
            amended.original_price = price;
        }

        if let Some(delta) = amendment.size_delta {
            amended.size += delta;
            amended.remaining += delta;
            if amended.remaining <= Decimal::ZERO {
                return Err(MarketcoreError::InvalidAmendment {
                    reason: format!(
                        "size change {delta} leaves {} remaining",
                        amended.remaining
                    ),
                });
            }
        }

        if let Some(to) = amendment.time_in_force {
            let from = current.time_in_force;
            let allowed = to == from
                || matches!(
                    (from, to),
                    (TimeInForce::Gtc, TimeInForce::Gtt) | (TimeInForce::Gtt, TimeInForce::Gtc)
                );
            if !allowed {
                return Err(MarketcoreError::CannotAmendTimeInForce { from, to });
            }
            amended.time_in_force = to;
        }
        amended.expires_at = match (amended.time_in_force, amendment.expires_at) {
            (TimeInForce::Gtt, requested) => requested.or(current.expires_at),
            (_, requested) => requested,
        };
        if amendment.expires_at.is_some() || amendment.time_in_force.is_some() {
            Self::validate_expiry(amended.time_in_force, amended.expires_at, self.now)?;
        }

        if let Some(mut peg) = amended.pegged {
            if let Some(reference) = amendment.pegged_reference {
                peg.reference = reference;
            }
            if let Some(offset) = amendment.pegged_offset {
                peg.offset = offset;
            }
            if amendment.changes_peg() {
                validate_peg(amended.side, &peg, self.config.tick_size)?;
            }
            amended.pegged = Some(peg);
        }

        amended.version += 1;
        amended.updated_at = Some(self.now);
        Ok(amended)
    }

    fn reject_amendment(&mut self, current: &Order, err: MarketcoreError) -> MarketcoreError {
        warn!(
            market = %self.config.id,
            order = %current.id,
            error = %err,
            "amendment rejected"
        );
        self.emit_order(current);
        err
    }

    /// Cancel-replace a pegged order with a plain limit order.
    fn convert_to_limit(&mut self, current: &Order, amended: Order) -> Result<OrderConfirmation> {
        let replacement = Order {
            id: OrderId::derived(&current.id, amended.version),
            status: OrderStatus::Active,
            sequence: 0,
            created_at: self.now,
            updated_at: None,
            version: 1,
            ..amended
        };
        if self.book.contains(&replacement.id) {
            let err = MarketcoreError::DuplicateOrder(replacement.id);
            return Err(self.reject_amendment(current, err));
        }
        if let Err(err) = self.validate_time_in_force(replacement.time_in_force) {
            return Err(self.reject_amendment(current, err));
        }
        // The replacement inherits the margin the pegged order holds.
        if let Err(err) = self.collateral.check_sufficient_funds(
            &current.id,
            &replacement.party,
            replacement.side,
            replacement.price,
            replacement.remaining,
            false,
        ) {
            return Err(self.reject_amendment(current, err));
        }

        let mut old = self.pegged.take(&mut self.book, &current.id)?;
        old.status = OrderStatus::Cancelled;
        old.updated_at = Some(self.now);
        self.release_order(&old)?;
        self.emit_order(&old);
        info!(
            market = %self.config.id,
            from = %old.id,
            to = %replacement.id,
            price = %replacement.price,
            "pegged order converted to limit order"
        );
        self.place_order(replacement)
    }

    /// Parked orders have no price and hold no margin: update in place and
    /// try to price them again.
    fn amend_parked(&mut self, amended: Order, peg_changed: bool) -> Result<OrderConfirmation> {
        if let Some(slot) = self.pegged.get_parked_mut(&amended.id) {
            *slot = amended.clone();
        }
        self.pegged.update_expiry(amended.id, amended.expires_at);
        self.emit_order(&amended);

        if peg_changed && !self.auction.in_auction() {
            let outcome = self.pegged.reprice_one(
                &mut self.book,
                &amended.id,
                self.config.tick_size,
                &*self.collateral,
                self.now,
            )?;
            self.apply_reprice(outcome)?;
        }
        self.emit_market_data();
        let order = self.get_order(&amended.id).cloned().unwrap_or(amended);
        Ok(OrderConfirmation::without_trades(order))
    }

    /// Pegged order on the book: size, expiry and peg changes. A new peg
    /// is priced straight away.
    fn amend_pegged(
        &mut self,
        current: &Order,
        amended: Order,
        peg_changed: bool,
    ) -> Result<OrderConfirmation> {
        if let Err(err) = self.hold_order(&amended) {
            return Err(self.reject_amendment(current, err));
        }
        let amended = self.book.amend(amended)?;
        self.pegged.update_expiry(amended.id, amended.expires_at);
        self.emit_order(&amended);

        if peg_changed {
            let outcome = self.pegged.reprice_one(
                &mut self.book,
                &amended.id,
                self.config.tick_size,
                &*self.collateral,
                self.now,
            )?;
            self.apply_reprice(outcome)?;
        }
        self.emit_market_data();
        let order = self.get_order(&amended.id).cloned().unwrap_or(amended);
        Ok(OrderConfirmation::without_trades(order))
    }

    /// Plain limit order. A new price that crosses the spread in
    /// continuous trading is matched like a fresh aggressor.
    fn amend_limit(&mut self, current: &Order, mut amended: Order) -> Result<OrderConfirmation> {
        let before = References::from_book(&self.book);

        let opposite = match amended.side {
            Side::Buy => self.book.best_ask(),
            Side::Sell => self.book.best_bid(),
        };
        let crosses =
            !self.auction.in_auction() && opposite.is_some_and(|best| amended.crosses(best));

        if crosses {
            if let Err(err) = self.check_funds(&amended, amended.price) {
                return Err(self.reject_amendment(current, err));
            }
            debug!(order = %amended.id, price = %amended.price, "amended price crosses, matching");
            self.book.cancel(&amended.id)?;
            self.expiring.remove(&amended.id);
            amended.sequence = 0;
            let (id, party, side) = (amended.id, amended.party, amended.side);
            let result = self.submit_continuous(amended);
            if result.is_err() {
                // The order left the book; nothing rests under the old holding.
                self.collateral.release_from_holding_account(&id, &party, side)?;
            }
            return result;
        }

        if let Err(err) = self.hold_order(&amended) {
            return Err(self.reject_amendment(current, err));
        }
        let amended = self.book.amend(amended)?;
        match amended.expires_at {
            Some(at) => self.expiring.insert(amended.id, at),
            None => {
                self.expiring.remove(&amended.id);
            }
        }
        self.emit_order(&amended);

        self.on_book_changed(&before, &[])?;
        self.check_liquidity()?;
        self.emit_market_data();
        Ok(OrderConfirmation::without_trades(amended))
    }

    // =================================================================
    // Cancel
    // =================================================================

    /// Cancel one of `party`'s orders, resting or parked.
    pub fn cancel_order(&mut self, order_id: &OrderId, party: &PartyId) -> Result<Order> {
        self.guard()?;
        let result = self.cancel_order_inner(order_id, party);
        self.fatal_check(result)
    }

    fn cancel_order_inner(&mut self, order_id: &OrderId, party: &PartyId) -> Result<Order> {
        self.require_trading()?;
        let current = self
            .get_order(order_id)
            .ok_or(MarketcoreError::OrderNotFound(*order_id))?;
        if current.party != *party {
            return Err(MarketcoreError::PartyMismatch {
                order: *order_id,
                party: *party,
            });
        }
        if current.is_liquidity_order() {
            return Err(MarketcoreError::CannotModifyLiquidityOrder);
        }

        let before = References::from_book(&self.book);
        let order = self.remove_cancelled(order_id)?;
        self.on_book_changed(&before, &[])?;
        self.check_liquidity()?;
        self.emit_market_data();
        Ok(order)
    }

    /// Cancel every non-liquidity order `party` has in this market, book
    /// orders first (oldest first), then parked orders.
    pub fn cancel_all_orders(&mut self, party: &PartyId) -> Result<Vec<Order>> {
        self.guard()?;
        let result = self.cancel_all_inner(party);
        self.fatal_check(result)
    }

    fn cancel_all_inner(&mut self, party: &PartyId) -> Result<Vec<Order>> {
        self.require_trading()?;
        let mut on_book: Vec<(u64, OrderId)> = self
            .book
            .iter_orders()
            .filter(|o| o.party == *party && !o.is_liquidity_order())
            .map(|o| (o.sequence, o.id))
            .collect();
        on_book.sort_unstable();
        let parked = self.pegged.ids().into_iter().filter(|id| {
            self.pegged
                .get_parked_by_id(id)
                .is_some_and(|o| o.party == *party)
        });
        let targets: Vec<OrderId> = on_book.into_iter().map(|(_, id)| id).chain(parked).collect();

        if targets.is_empty() {
            return Ok(Vec::new());
        }
        let before = References::from_book(&self.book);
        let mut cancelled = Vec::with_capacity(targets.len());
        for id in &targets {
            cancelled.push(self.remove_cancelled(id)?);
        }
        info!(market = %self.config.id, party = %party, count = cancelled.len(), "orders cancelled");
        self.on_book_changed(&before, &[])?;
        self.check_liquidity()?;
        self.emit_market_data();
        Ok(cancelled)
    }

    /// Take an order off the book or out of the parked set, mark it
    /// cancelled, release it and report it.
    fn remove_cancelled(&mut self, order_id: &OrderId) -> Result<Order> {
        let mut order = if self.pegged.is_tracked(order_id) {
            self.pegged.take(&mut self.book, order_id)?
        } else {
            self.book.cancel(order_id)?
        };
        order.status = OrderStatus::Cancelled;
        order.updated_at = Some(self.now);
        self.release_order(&order)?;
        self.emit_order(&order);
        Ok(order)
    }
}
