//! The per-market orchestrator.
//!
//! A [`Market`] exclusively owns everything one market needs: the order
//! book, the pegged-order index, the GTT expiry index, auction state, price
//! and liquidity monitoring, and its collaborators. Every command runs to
//! completion through `&mut self`; time only moves on [`Market::on_tick`].
//!
//! ```text
//! Proposed ─enact─▶ Pending ──leave opening──▶ Active ⇄ Suspended
//!     │               │                          │         │
//!     └──reject───────┴──▶ Rejected              └──terminate──▶ TradingTerminated ─▶ Settled ─▶ Closed
//! ```
//!
//! Every state change is reported as an [`Event`], appended in processing
//! order and folded into a running SHA-256 root so replicas can compare a
//! single digest.

mod amend;
mod auction;
mod liquidity;
mod pegged;
mod submit;

use chrono::{DateTime, Duration, Utc};
use marketcore_book::{OrderBook, chain_event_root};
use marketcore_types::*;
use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::auction::AuctionState;
use crate::collateral::Collateral;
use crate::expiry::ExpiringOrders;
use crate::liquidity::LiquidityEngine;
use crate::pegged::PeggedOrders;
use crate::price_monitor::PriceMonitor;
use crate::risk::{FixedFactorRangeModel, FixedTargetStake, PriceRangeModel, TargetStakeModel};

/// External services a market calls synchronously.
pub struct Collaborators {
    pub collateral: Box<dyn Collateral>,
    pub price_range: Box<dyn PriceRangeModel>,
    pub target_stake: Box<dyn TargetStakeModel>,
}

impl Collaborators {
    /// `collateral` with a ±10% price range and no target stake.
    pub fn new(collateral: impl Collateral + 'static) -> Self {
        Self {
            collateral: Box::new(collateral),
            price_range: Box::new(FixedFactorRangeModel::default()),
            target_stake: Box::new(FixedTargetStake::default()),
        }
    }

    #[must_use]
    pub fn with_price_range(mut self, model: impl PriceRangeModel + 'static) -> Self {
        self.price_range = Box::new(model);
        self
    }

    #[must_use]
    pub fn with_target_stake(mut self, model: impl TargetStakeModel + 'static) -> Self {
        self.target_stake = Box::new(model);
        self
    }
}

pub struct Market {
    config: MarketConfig,
    state: MarketState,
    now: DateTime<Utc>,
    book: OrderBook,
    pegged: PeggedOrders,
    /// GTT expiry for non-pegged orders; pegged ones expire via `pegged`.
    expiring: ExpiringOrders,
    auction: AuctionState,
    price_monitor: PriceMonitor,
    liquidity: LiquidityEngine,
    collateral: Box<dyn Collateral>,
    target_stake: Box<dyn TargetStakeModel>,
    events: Vec<Event>,
    event_root: [u8; 32],
    event_count: u64,
    halted: bool,
    /// Settlement data received before trading terminated.
    settlement_price: Option<Decimal>,
    mark_price: Option<Decimal>,
}

impl std::fmt::Debug for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Market")
            .field("id", &self.config.id)
            .field("state", &self.state)
            .field("mode", &self.auction.mode())
            .field("now", &self.now)
            .field("orders", &self.book.order_count())
            .field("halted", &self.halted)
            .finish_non_exhaustive()
    }
}

impl Market {
    /// A new market in state `Proposed`.
    pub fn new(config: MarketConfig, collaborators: Collaborators, now: DateTime<Utc>) -> Self {
        let Collaborators {
            collateral,
            price_range,
            target_stake,
        } = collaborators;
        Self {
            book: OrderBook::new(config.id.clone()),
            pegged: PeggedOrders::new(),
            expiring: ExpiringOrders::new(),
            auction: AuctionState::new(Duration::seconds(config.auction.minimum_duration_secs)),
            price_monitor: PriceMonitor::new(config.price_monitoring.clone(), price_range, now),
            liquidity: LiquidityEngine::new(config.id.clone(), config.liquidity.clone()),
            collateral,
            target_stake,
            state: MarketState::Proposed,
            now,
            events: Vec::new(),
            event_root: [0u8; 32],
            event_count: 0,
            halted: false,
            settlement_price: None,
            mark_price: None,
            config,
        }
    }

    // =================================================================
    // Queries
    // =================================================================

    #[must_use]
    pub fn id(&self) -> &MarketId {
        &self.config.id
    }

    #[must_use]
    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> MarketState {
        self.state
    }

    #[must_use]
    pub fn trading_mode(&self) -> TradingMode {
        self.auction.mode()
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    #[must_use]
    pub fn auction_end(&self) -> Option<DateTime<Utc>> {
        self.auction.end()
    }

    /// A resting or parked order.
    #[must_use]
    pub fn get_order(&self, order_id: &OrderId) -> Option<&Order> {
        self.book
            .get(order_id)
            .or_else(|| self.pegged.get_parked_by_id(order_id))
    }

    /// Orders on the book (parked orders excluded).
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.book.order_count()
    }

    /// Tracked pegged orders, parked or not.
    #[must_use]
    pub fn pegged_count(&self) -> usize {
        self.pegged.len()
    }

    #[must_use]
    pub fn parked_count(&self) -> usize {
        self.pegged.parked_len()
    }

    #[must_use]
    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    #[must_use]
    pub fn liquidity_provision(&self, party: &PartyId) -> Option<&LiquidityProvision> {
        self.liquidity.get(party)
    }

    /// Settlement price buffered ahead of trading termination.
    #[must_use]
    pub fn pending_settlement_price(&self) -> Option<Decimal> {
        self.settlement_price
    }

    /// Drain the events emitted since the last call.
    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Running root over every event ever emitted.
    #[must_use]
    pub fn event_root(&self) -> [u8; 32] {
        self.event_root
    }

    #[must_use]
    pub fn event_root_hex(&self) -> String {
        hex::encode(self.event_root)
    }

    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    #[must_use]
    pub fn market_data(&self) -> MarketData {
        let indicative = if self.auction.in_auction() {
            self.book.indicative_uncrossing()
        } else {
            None
        };
        MarketData {
            market: self.config.id.clone(),
            timestamp: self.now,
            state: self.state,
            trading_mode: self.auction.mode(),
            trigger: self.auction.trigger(),
            extension_trigger: self.auction.extension_trigger(),
            auction_start: self.auction.begin(),
            auction_end: self.auction.end(),
            best_bid: self.book.best_bid(),
            best_bid_volume: self.book.best_bid_volume(),
            best_ask: self.book.best_ask(),
            best_ask_volume: self.book.best_ask_volume(),
            best_static_bid: self.book.best_static_bid(),
            best_static_ask: self.book.best_static_ask(),
            mid_price: self.book.mid_price(),
            static_mid_price: self.book.static_mid_price(),
            last_traded_price: self.book.last_traded_price(),
            mark_price: self.mark_price,
            indicative_price: indicative.map(|i| i.price),
            indicative_volume: indicative.map_or(Decimal::ZERO, |i| i.volume),
            price_monitoring_bounds: self.price_monitor.bounds().to_vec(),
            target_stake: self.current_target_stake(),
            supplied_stake: self.liquidity.supplied_stake(),
        }
    }

    // =================================================================
    // Lifecycle
    // =================================================================

    /// Proposed → Pending (opening auction) or straight to Active.
    pub fn enact(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.guard()?;
        if self.state != MarketState::Proposed {
            return Err(self.invalid_transition("enact"));
        }
        self.advance_clock(now);
        match self.config.opening_auction_duration_secs {
            Some(secs) => {
                self.state = MarketState::Pending;
                self.auction.start_opening(self.now, Duration::seconds(secs));
                self.book.set_auction(true);
                info!(market = %self.config.id, end = ?self.auction.end(), "market enacted into opening auction");
                self.emit_state();
                self.emit(Event::Auction(self.auction.to_event(&self.config.id, self.now, false)));
            }
            None => {
                self.state = MarketState::Active;
                self.auction.start_continuous();
                info!(market = %self.config.id, "market enacted into continuous trading");
                self.emit_state();
            }
        }
        self.emit_market_data();
        Ok(())
    }

    /// Advance time: expire orders, refresh price bounds, and try to leave
    /// an auction whose time is up. Ticks that go backwards are ignored.
    pub fn on_tick(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.guard()?;
        if now < self.now {
            warn!(market = %self.config.id, now = %now, current = %self.now, "ignoring tick from the past");
            return Ok(());
        }
        self.now = now;
        if self.state.is_final() || self.state == MarketState::Proposed {
            return Ok(());
        }
        let result = self.tick();
        self.fatal_check(result)
    }

    fn tick(&mut self) -> Result<()> {
        self.expire_orders()?;
        self.price_monitor.on_time_update(self.now);
        if self.auction.in_auction() {
            self.try_leave_auction()
        } else {
            self.check_liquidity()
        }
    }

    /// Oracle signal: stop trading. All orders and commitments are
    /// cancelled; buffered settlement data is applied immediately.
    pub fn on_trading_terminated(&mut self) -> Result<()> {
        self.guard()?;
        if !matches!(
            self.state,
            MarketState::Pending | MarketState::Active | MarketState::Suspended
        ) {
            return Err(self.invalid_transition("terminate trading"));
        }
        let result = self.wind_down(MarketState::TradingTerminated);
        self.fatal_check(result)?;
        info!(market = %self.config.id, "trading terminated");
        if let Some(price) = self.settlement_price.take() {
            self.settle(price);
        }
        self.emit_market_data();
        Ok(())
    }

    /// Oracle signal: final settlement price. Buffered until trading has
    /// terminated.
    pub fn on_settlement_data(&mut self, price: Decimal) -> Result<()> {
        self.guard()?;
        match self.state {
            MarketState::TradingTerminated => {
                self.settle(price);
                self.emit_market_data();
                Ok(())
            }
            MarketState::Proposed
            | MarketState::Pending
            | MarketState::Active
            | MarketState::Suspended => {
                info!(market = %self.config.id, price = %price, "settlement data buffered until termination");
                self.settlement_price = Some(price);
                Ok(())
            }
            MarketState::Settled | MarketState::Closed | MarketState::Rejected => {
                Err(self.invalid_transition("settle"))
            }
        }
    }

    /// Settled → Closed.
    pub fn close(&mut self) -> Result<()> {
        self.guard()?;
        if self.state != MarketState::Settled {
            return Err(self.invalid_transition("close"));
        }
        self.state = MarketState::Closed;
        info!(market = %self.config.id, "market closed");
        self.emit_state();
        Ok(())
    }

    /// Proposed/Pending → Rejected.
    pub fn reject(&mut self) -> Result<()> {
        self.guard()?;
        if !matches!(self.state, MarketState::Proposed | MarketState::Pending) {
            return Err(self.invalid_transition("reject"));
        }
        let result = self.wind_down(MarketState::Rejected);
        self.fatal_check(result)?;
        info!(market = %self.config.id, "market rejected");
        self.emit_market_data();
        Ok(())
    }

    fn settle(&mut self, price: Decimal) {
        self.mark_price = Some(price);
        self.state = MarketState::Settled;
        info!(market = %self.config.id, price = %price, "market settled");
        self.emit_state();
    }

    /// Cancel every order and commitment and move to a final state.
    fn wind_down(&mut self, state: MarketState) -> Result<()> {
        for mut order in self.book.drain_all() {
            order.status = OrderStatus::Cancelled;
            order.updated_at = Some(self.now);
            self.release_order(&order)?;
            self.emit_order(&order);
        }
        for id in self.pegged.ids() {
            if let Some(mut order) = self.pegged.untrack(&id) {
                order.status = OrderStatus::Cancelled;
                order.updated_at = Some(self.now);
                self.emit_order(&order);
            }
        }
        self.expiring = ExpiringOrders::new();

        for party in self.liquidity.parties() {
            self.liquidity.take_deployed(&party);
            if let Some(mut provision) = self.liquidity.remove(&party) {
                self.collateral
                    .release_commitment(&party, provision.commitment_amount)?;
                provision.status = LiquidityProvisionStatus::Cancelled;
                provision.updated_at = Some(self.now);
                provision.version += 1;
                self.emit(Event::LiquidityProvision(provision));
            }
        }

        self.auction.stop();
        self.book.set_auction(false);
        self.state = state;
        self.emit_state();
        Ok(())
    }

    // =================================================================
    // Shared helpers
    // =================================================================

    fn guard(&self) -> Result<()> {
        if self.halted {
            return Err(MarketcoreError::MarketHalted);
        }
        Ok(())
    }

    /// Halt on fatal errors; pass everything through unchanged.
    fn fatal_check<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if err.is_fatal() {
                self.halted = true;
                error!(market = %self.config.id, error = %err, "market halted");
            }
        }
        result
    }

    fn advance_clock(&mut self, now: DateTime<Utc>) {
        if now > self.now {
            self.now = now;
        }
    }

    fn invalid_transition(&self, action: &str) -> MarketcoreError {
        warn!(market = %self.config.id, state = %self.state, action, "invalid lifecycle transition");
        MarketcoreError::InvalidTransition {
            from: self.state,
            action: action.to_string(),
        }
    }

    fn require_trading(&self) -> Result<()> {
        if !self.state.accepts_orders() {
            return Err(MarketcoreError::MarketNotTrading(self.state));
        }
        Ok(())
    }

    fn current_target_stake(&self) -> Decimal {
        let reference = self.mark_price.or(self.price_monitor.reference_price());
        self.target_stake.target_stake(self.now, reference)
    }

    fn emit(&mut self, event: Event) {
        match chain_event_root(&self.event_root, &event) {
            Ok(root) => self.event_root = root,
            Err(err) => {
                self.halted = true;
                error!(market = %self.config.id, error = %err, "event hashing failed, market halted");
            }
        }
        self.event_count += 1;
        self.events.push(event);
    }

    fn emit_order(&mut self, order: &Order) {
        self.emit(Event::Order(order.clone()));
    }

    fn emit_state(&mut self) {
        self.emit(Event::MarketState(MarketStateChange {
            market: self.config.id.clone(),
            state: self.state,
            trading_mode: self.auction.mode(),
            timestamp: self.now,
        }));
    }

    fn emit_market_data(&mut self) {
        let data = self.market_data();
        self.emit(Event::MarketData(Box::new(data)));
    }

    /// Lock margin for an order that now rests.
    fn hold_order(&mut self, order: &Order) -> Result<()> {
        if order.is_liquidity_order() {
            return Ok(());
        }
        self.collateral.transfer_to_holding_account(order)
    }

    /// Forget an order that left the book for good: drop it from every
    /// index and return its margin.
    fn release_order(&mut self, order: &Order) -> Result<()> {
        self.expiring.remove(&order.id);
        if order.is_liquidity_order() {
            self.liquidity.forget_order(&order.party, &order.id);
            return Ok(());
        }
        if order.is_pegged() {
            self.pegged.untrack(&order.id);
        }
        self.collateral
            .release_from_holding_account(&order.id, &order.party, order.side)
    }

    /// Expire GTT orders due at `now`.
    fn expire_orders(&mut self) -> Result<()> {
        let before = crate::pegged::References::from_book(&self.book);
        let mut changed = false;

        for id in self.expiring.expire(self.now) {
            let mut order = self.book.cancel(&id).map_err(|_| {
                MarketcoreError::InvariantViolation(format!(
                    "expiring order {id} is not on the book"
                ))
            })?;
            order.status = OrderStatus::Expired;
            order.updated_at = Some(self.now);
            self.release_order(&order)?;
            self.emit_order(&order);
            changed = true;
        }

        let expired = self.pegged.expire(&mut self.book, self.now);
        if !expired.is_empty() {
            for order in &expired {
                self.release_order(order)?;
            }
            self.emit(Event::ExpiredOrders(ExpiredOrders {
                market: self.config.id.clone(),
                order_ids: expired.iter().map(|o| o.id).collect(),
            }));
            changed = true;
        }

        if changed {
            self.on_book_changed(&before, &[])?;
            self.check_liquidity()?;
            self.emit_market_data();
        }
        Ok(())
    }
}
