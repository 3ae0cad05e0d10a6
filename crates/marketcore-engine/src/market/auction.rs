//! Trading-mode transitions: entering, extending and leaving auctions, and
//! the liquidity checks that can start one.

use chrono::Duration;
use marketcore_types::*;
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::Market;
use crate::pegged::ReferenceChanges;

impl Market {
    // =================================================================
    // Entering
    // =================================================================

    pub(super) fn start_price_auction(&mut self, extension: Duration) -> Result<()> {
        self.auction.start_price(self.now, extension);
        info!(
            market = %self.config.id,
            end = ?self.auction.end(),
            "price monitoring auction started"
        );
        self.on_auction_entered()
    }

    pub(super) fn start_liquidity_auction(&mut self, trigger: AuctionTrigger) -> Result<()> {
        self.auction.start_liquidity(self.now, trigger);
        info!(
            market = %self.config.id,
            trigger = %trigger,
            supplied = %self.liquidity.supplied_stake(),
            "liquidity auction started"
        );
        self.on_auction_entered()
    }

    /// Side effects of leaving continuous trading: pegged orders parked,
    /// liquidity orders withdrawn, GFN orders cancelled.
    fn on_auction_entered(&mut self) -> Result<()> {
        self.state = MarketState::Suspended;
        self.book.set_auction(true);
        self.emit_state();
        self.emit(Event::Auction(self.auction.to_event(&self.config.id, self.now, false)));

        for order in self.pegged.enter_auction(&mut self.book, self.now) {
            self.collateral
                .release_from_holding_account(&order.id, &order.party, order.side)?;
            self.emit_order(&order);
        }

        self.withdraw_liquidity()?;

        for mut order in self
            .book
            .remove_where(|o| o.time_in_force == TimeInForce::Gfn)
        {
            order.status = OrderStatus::Cancelled;
            order.updated_at = Some(self.now);
            self.release_order(&order)?;
            self.emit_order(&order);
        }

        self.emit_market_data();
        Ok(())
    }

    // =================================================================
    // Leaving
    // =================================================================

    /// Called on every tick while in an auction.
    pub(super) fn try_leave_auction(&mut self) -> Result<()> {
        if !self.auction.can_leave(self.now) {
            return Ok(());
        }
        let indicative = self.book.indicative_uncrossing();
        let fallback = Duration::seconds(self.config.auction.extension_secs);

        let Some(indicative) = indicative else {
            if self.auction.is_opening() {
                info!(market = %self.config.id, "no uncrossing price, extending opening auction");
                self.extend_auction(AuctionTrigger::Opening, fallback);
                return Ok(());
            }
            return self.leave_if_liquid(Decimal::ZERO);
        };

        if let Some(extension) = self.price_monitor.check_uncrossing_price(indicative.price) {
            if self.auction.is_opening() {
                self.auction.convert_to_price(self.now, extension);
                self.state = MarketState::Suspended;
                info!(
                    market = %self.config.id,
                    price = %indicative.price,
                    end = ?self.auction.end(),
                    "opening auction uncrossing price out of bounds, now a price auction"
                );
                self.emit_state();
                self.emit(Event::Auction(self.auction.to_event(&self.config.id, self.now, false)));
                self.emit_market_data();
            } else {
                info!(market = %self.config.id, price = %indicative.price, "uncrossing price out of bounds");
                self.extend_auction(AuctionTrigger::Price, extension);
            }
            return Ok(());
        }

        self.leave_if_liquid(indicative.volume)
    }

    /// Leave unless liquidity would immediately put the market back into
    /// an auction.
    fn leave_if_liquid(&mut self, uncrossing_volume: Decimal) -> Result<()> {
        let fallback = Duration::seconds(self.config.auction.extension_secs);
        let target = self.current_target_stake();
        if self.liquidity.is_insufficient(target) {
            info!(
                market = %self.config.id,
                supplied = %self.liquidity.supplied_stake(),
                target = %target,
                "supplied stake below target, extending auction"
            );
            self.extend_auction(AuctionTrigger::LiquidityTargetNotMet, fallback);
            return Ok(());
        }
        if self.liquidity.has_provisions()
            && (self.book.total_volume(Side::Buy) <= uncrossing_volume
                || self.book.total_volume(Side::Sell) <= uncrossing_volume)
        {
            info!(market = %self.config.id, "a side would be empty after uncrossing, extending auction");
            self.extend_auction(AuctionTrigger::UnableToDeployLpOrders, fallback);
            return Ok(());
        }
        self.leave_auction()
    }

    /// Push the auction end out, emitting only when something changed.
    fn extend_auction(&mut self, trigger: AuctionTrigger, extension: Duration) {
        let before = (self.auction.end(), self.auction.extension_trigger());
        self.auction.extend(trigger, self.now, extension);
        if before != (self.auction.end(), self.auction.extension_trigger()) {
            self.emit(Event::Auction(self.auction.to_event(&self.config.id, self.now, false)));
            self.emit_market_data();
        }
    }

    /// Uncross and resume continuous trading.
    fn leave_auction(&mut self) -> Result<()> {
        let leaving = self.auction.to_event(&self.config.id, self.now, true);
        self.book.set_auction(false);

        let mut uncrossing_price = None;
        if let Some(outcome) = self.book.uncross(self.now)? {
            info!(
                market = %self.config.id,
                price = %outcome.price,
                volume = %outcome.volume,
                trades = outcome.trades.len(),
                "auction uncrossed"
            );
            for order in &outcome.updated_orders {
                if order.status.is_terminal() {
                    self.release_order(order)?;
                } else {
                    self.hold_order(order)?;
                }
            }
            for trade in &outcome.trades {
                self.emit(Event::Trade(trade.clone()));
            }
            for order in &outcome.updated_orders {
                self.emit_order(order);
            }
            if !outcome.trades.is_empty() {
                self.mark_price = Some(outcome.price);
                uncrossing_price = Some(outcome.price);
            }
        }

        for mut order in self
            .book
            .remove_where(|o| o.time_in_force == TimeInForce::Gfa)
        {
            order.status = OrderStatus::Cancelled;
            order.updated_at = Some(self.now);
            self.release_order(&order)?;
            self.emit_order(&order);
        }

        self.price_monitor.reset(uncrossing_price, self.now);
        if let Some(price) = uncrossing_price {
            self.price_monitor.record_price(price, self.now);
        }

        self.auction.leave();
        self.state = MarketState::Active;
        info!(market = %self.config.id, "continuous trading resumed");
        self.emit_state();
        self.emit(Event::Auction(leaving));

        self.reprice_pegged(ReferenceChanges::ALL)?;
        let parties = self.liquidity.parties();
        self.refresh_liquidity(&parties)?;
        self.emit_market_data();
        self.check_liquidity()
    }

    // =================================================================
    // Liquidity monitoring
    // =================================================================

    /// In continuous trading, start a liquidity auction when the supplied
    /// stake is short of target or providers cannot quote both sides.
    pub(super) fn check_liquidity(&mut self) -> Result<()> {
        if self.state != MarketState::Active || self.auction.in_auction() {
            return Ok(());
        }
        let target = self.current_target_stake();
        if self.liquidity.is_insufficient(target) {
            warn!(
                market = %self.config.id,
                supplied = %self.liquidity.supplied_stake(),
                target = %target,
                "supplied stake below target"
            );
            return self.start_liquidity_auction(AuctionTrigger::LiquidityTargetNotMet);
        }
        if self.liquidity.has_provisions()
            && (self.book.best_static_bid().is_none() || self.book.best_static_ask().is_none())
        {
            warn!(market = %self.config.id, "liquidity orders cannot be deployed on an empty side");
            return self.start_liquidity_auction(AuctionTrigger::UnableToDeployLpOrders);
        }
        Ok(())
    }
}
