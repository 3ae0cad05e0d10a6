//! Auction bookkeeping.
//!
//! [`AuctionState`] records which trading mode the market is in and, while
//! an auction runs, why it started, when it began and when it may end.
//! It decides nothing about *whether* to leave; it only answers whether
//! enough time has passed.
//!
//! ```text
//! Continuous ──start_price / start_liquidity──▶ MonitoringAuction
//!      ▲                                              │
//!      └────────────────── leave ─────────────────────┘
//! NoTrading ──start_opening──▶ OpeningAuction ──leave──▶ Continuous
//! ```

use chrono::{DateTime, Duration, Utc};
use marketcore_types::{AuctionEvent, AuctionTrigger, MarketId, TradingMode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionState {
    mode: TradingMode,
    trigger: AuctionTrigger,
    extension_trigger: Option<AuctionTrigger>,
    begin: Option<DateTime<Utc>>,
    /// `None` during an auction means the end is indefinite.
    end: Option<DateTime<Utc>>,
    minimum_duration: Duration,
}

impl AuctionState {
    #[must_use]
    pub fn new(minimum_duration: Duration) -> Self {
        Self {
            mode: TradingMode::NoTrading,
            trigger: AuctionTrigger::Unspecified,
            extension_trigger: None,
            begin: None,
            end: None,
            minimum_duration,
        }
    }

    // =================================================================
    // Queries
    // =================================================================

    #[must_use]
    pub fn mode(&self) -> TradingMode {
        self.mode
    }

    #[must_use]
    pub fn in_auction(&self) -> bool {
        self.mode.is_auction()
    }

    #[must_use]
    pub fn is_opening(&self) -> bool {
        self.mode == TradingMode::OpeningAuction
    }

    #[must_use]
    pub fn trigger(&self) -> AuctionTrigger {
        self.trigger
    }

    #[must_use]
    pub fn extension_trigger(&self) -> Option<AuctionTrigger> {
        self.extension_trigger
    }

    #[must_use]
    pub fn begin(&self) -> Option<DateTime<Utc>> {
        self.begin
    }

    #[must_use]
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    /// Whether the auction was started by a liquidity condition.
    #[must_use]
    pub fn is_liquidity_auction(&self) -> bool {
        matches!(
            self.trigger,
            AuctionTrigger::LiquidityTargetNotMet | AuctionTrigger::UnableToDeployLpOrders
        )
    }

    /// Time-wise, may the auction end at `now`?
    ///
    /// With a fixed end, `now` must have reached it; with an indefinite
    /// end, the minimum duration must have elapsed. Either way the
    /// minimum duration applies.
    #[must_use]
    pub fn can_leave(&self, now: DateTime<Utc>) -> bool {
        let Some(begin) = self.begin else {
            return false;
        };
        if !self.in_auction() || now < begin + self.minimum_duration {
            return false;
        }
        self.end.is_none_or(|end| now >= end)
    }

    // =================================================================
    // Transitions
    // =================================================================

    /// Start continuous trading without an auction.
    pub fn start_continuous(&mut self) {
        *self = Self::new(self.minimum_duration);
        self.mode = TradingMode::Continuous;
    }

    pub fn start_opening(&mut self, now: DateTime<Utc>, duration: Duration) {
        self.start(TradingMode::OpeningAuction, AuctionTrigger::Opening, now, Some(now + duration));
    }

    pub fn start_price(&mut self, now: DateTime<Utc>, extension: Duration) {
        self.start(TradingMode::MonitoringAuction, AuctionTrigger::Price, now, Some(now + extension));
    }

    /// Liquidity auctions have no fixed end.
    pub fn start_liquidity(&mut self, now: DateTime<Utc>, trigger: AuctionTrigger) {
        self.start(TradingMode::MonitoringAuction, trigger, now, None);
    }

    fn start(
        &mut self,
        mode: TradingMode,
        trigger: AuctionTrigger,
        now: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) {
        self.mode = mode;
        self.trigger = trigger;
        self.extension_trigger = None;
        self.begin = Some(now);
        self.end = end;
    }

    /// Push the end out to at least `now + extension`. Never moves the end
    /// earlier; an indefinite end stays indefinite.
    pub fn extend(&mut self, trigger: AuctionTrigger, now: DateTime<Utc>, extension: Duration) {
        self.extension_trigger = Some(trigger);
        self.end = self.end.map(|end| end.max(now + extension));
    }

    /// An opening auction whose uncrossing price breached the bounds
    /// becomes a price-monitoring auction.
    pub fn convert_to_price(&mut self, now: DateTime<Utc>, extension: Duration) {
        self.mode = TradingMode::MonitoringAuction;
        self.trigger = AuctionTrigger::Price;
        self.extension_trigger = None;
        self.end = Some(self.end.map_or(now + extension, |end| end.max(now + extension)));
    }

    /// End the auction and return to continuous trading.
    pub fn leave(&mut self) {
        self.start_continuous();
    }

    /// Stop trading altogether.
    pub fn stop(&mut self) {
        *self = Self::new(self.minimum_duration);
    }

    /// Event describing the current auction. Call before [`Self::leave`]
    /// with `leave = true` to describe the auction being left.
    #[must_use]
    pub fn to_event(&self, market: &MarketId, now: DateTime<Utc>, leave: bool) -> AuctionEvent {
        AuctionEvent {
            market: market.clone(),
            opening_auction: self.is_opening(),
            leave,
            start: self.begin.unwrap_or(now),
            end: if leave { Some(now) } else { self.end },
            trigger: self.trigger,
            extension_trigger: self.extension_trigger,
        }
    }
}
