//! Pegged orders inside the market: submission, repricing after book
//! changes, and tick-size updates.

use marketcore_types::*;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::Market;
use crate::pegged::{ReferenceChanges, References, RepriceOutcome, peg_price};

impl Market {
    /// Price a validated pegged order and submit it, or park it when no
    /// price can be computed (auction, missing reference).
    pub(super) fn submit_pegged(&mut self, mut order: Order) -> Result<OrderConfirmation> {
        let peg = order.pegged.ok_or_else(|| {
            MarketcoreError::Internal(format!("order {} has no peg", order.id))
        })?;
        let priced = if self.auction.in_auction() {
            None
        } else {
            let refs = References::from_book(&self.book);
            peg_price(order.side, &peg, &refs, self.config.tick_size)
        };

        let Some((price, original)) = priced else {
            let parked = self.pegged.park(order, self.now);
            debug!(order = %parked.id, reference = %peg.reference, "pegged order parked on entry");
            self.emit_order(&parked);
            self.emit_market_data();
            return Ok(OrderConfirmation::without_trades(parked));
        };

        order.price = price;
        order.original_price = original;
        if let Err(err) = self.check_funds(&order, price) {
            return Err(self.reject_order(order, err));
        }
        self.submit_continuous(order)
    }

    /// After the book changed in continuous trading: reprice pegged orders
    /// whose reference moved and refresh liquidity orders. Providers in
    /// `redeploy` are refreshed even when no reference moved.
    pub(super) fn on_book_changed(&mut self, before: &References, redeploy: &[PartyId]) -> Result<()> {
        if self.auction.in_auction() {
            return Ok(());
        }
        let after = References::from_book(&self.book);
        let changes = ReferenceChanges::between(before, &after);
        if changes.is_empty() {
            if !redeploy.is_empty() {
                self.refresh_liquidity(redeploy)?;
            }
            return Ok(());
        }
        self.reprice_pegged(changes)?;
        let parties = self.liquidity.parties();
        self.refresh_liquidity(&parties)
    }

    pub(super) fn reprice_pegged(&mut self, changes: ReferenceChanges) -> Result<()> {
        let outcome = self.pegged.reprice_all(
            &mut self.book,
            changes,
            self.config.tick_size,
            &*self.collateral,
            self.now,
        )?;
        self.apply_reprice(outcome)
    }

    /// Turn a repricing outcome into collateral calls and events.
    pub(super) fn apply_reprice(&mut self, outcome: RepriceOutcome) -> Result<()> {
        let RepriceOutcome {
            parked,
            repriced,
            cancelled,
        } = outcome;

        for order in &parked {
            self.collateral
                .release_from_holding_account(&order.id, &order.party, order.side)?;
            self.emit_order(order);
        }
        for order in &cancelled {
            warn!(order = %order.id, party = %order.party, "pegged order stopped on reprice: insufficient funds");
            self.release_order(order)?;
            self.emit_order(order);
        }
        for mut order in repriced {
            if let Err(err) = self.hold_order(&order) {
                warn!(order = %order.id, error = %err, "pegged order stopped: cannot hold margin at new price");
                self.book.cancel(&order.id)?;
                order.status = OrderStatus::Stopped;
                order.updated_at = Some(self.now);
                self.release_order(&order)?;
            }
            self.emit_order(&order);
        }
        Ok(())
    }

    /// Change the tick size. Pegged orders whose offset is no longer a
    /// multiple of it are cancelled; the rest are repriced. Other resting
    /// orders are left alone.
    pub fn update_tick_size(&mut self, tick_size: Decimal) -> Result<()> {
        self.guard()?;
        if self.state.is_final() {
            return Err(self.invalid_transition("update tick size"));
        }
        if tick_size <= Decimal::ZERO {
            return Err(MarketcoreError::InvalidOrder {
                reason: format!("tick size must be positive, got {tick_size}"),
            });
        }
        let result = self.update_tick_size_inner(tick_size);
        self.fatal_check(result)
    }

    fn update_tick_size_inner(&mut self, tick_size: Decimal) -> Result<()> {
        info!(market = %self.config.id, from = %self.config.tick_size, to = %tick_size, "tick size updated");
        self.config.tick_size = tick_size;

        for id in self.pegged.ids() {
            let off_tick = self
                .get_order(&id)
                .and_then(|o| o.pegged)
                .is_some_and(|peg| !is_multiple_of(peg.offset, tick_size));
            if !off_tick {
                continue;
            }
            let mut order = self.pegged.take(&mut self.book, &id)?;
            order.status = OrderStatus::Cancelled;
            order.updated_at = Some(self.now);
            self.release_order(&order)?;
            self.emit_order(&order);
        }

        if !self.auction.in_auction() && self.state != MarketState::Proposed {
            self.reprice_pegged(ReferenceChanges::ALL)?;
            let parties = self.liquidity.parties();
            self.refresh_liquidity(&parties)?;
        }
        self.emit_market_data();
        Ok(())
    }
}
