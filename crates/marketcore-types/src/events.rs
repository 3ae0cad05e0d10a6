//! Events emitted by the market engine.
//!
//! Every state change produces at least one [`Event`], appended in
//! processing order. Replaying the same command stream must reproduce the
//! exact same event sequence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    AuctionTrigger, LiquidityProvision, MarketData, MarketId, MarketState, Order, OrderId, Trade,
    TradingMode,
};

/// Auction lifecycle notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionEvent {
    pub market: MarketId,
    pub opening_auction: bool,
    /// `true` when the auction has just ended.
    pub leave: bool,
    pub start: DateTime<Utc>,
    /// `None` while the end is indefinite.
    pub end: Option<DateTime<Utc>>,
    pub trigger: AuctionTrigger,
    pub extension_trigger: Option<AuctionTrigger>,
}

/// Batched expiry of pegged orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiredOrders {
    pub market: MarketId,
    pub order_ids: Vec<OrderId>,
}

/// Market lifecycle change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketStateChange {
    pub market: MarketId,
    pub state: MarketState,
    pub trading_mode: TradingMode,
    pub timestamp: DateTime<Utc>,
}

/// Everything the engine tells the outside world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Order(Order),
    Trade(Trade),
    MarketData(Box<MarketData>),
    ExpiredOrders(ExpiredOrders),
    Auction(AuctionEvent),
    LiquidityProvision(LiquidityProvision),
    MarketState(MarketStateChange),
}

impl Event {
    /// Short tag, handy in logs and test assertions.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Order(_) => "order",
            Self::Trade(_) => "trade",
            Self::MarketData(_) => "market_data",
            Self::ExpiredOrders(_) => "expired_orders",
            Self::Auction(_) => "auction",
            Self::LiquidityProvision(_) => "liquidity_provision",
            Self::MarketState(_) => "market_state",
        }
    }
}
