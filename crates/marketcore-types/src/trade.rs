//! Trade types produced by the order book.
//!
//! A [`Trade`] is the immutable record of a fill between a buy and a sell
//! order, either from continuous matching (with an aggressor) or from an
//! auction uncrossing (without one).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{MarketId, OrderId, PartyId, Side, TradeId};

/// How a trade came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeType {
    /// Continuous price-time matching.
    Default,
    /// Auction uncrossing at a single price.
    Auction,
}

/// A single fill between two orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Deterministic identifier (market + trade sequence).
    pub id: TradeId,
    pub market: MarketId,
    pub price: Decimal,
    pub size: Decimal,
    pub buyer: PartyId,
    pub seller: PartyId,
    pub buy_order: OrderId,
    pub sell_order: OrderId,
    /// Side of the incoming order; `None` for auction trades.
    pub aggressor: Option<Side>,
    pub trade_type: TradeType,
    pub timestamp: DateTime<Utc>,
}

impl Trade {
    /// Returns price × size.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.price * self.size
    }
}

impl std::fmt::Display for Trade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Trade[{}] {} {} @ {}",
            self.id, self.market, self.size, self.price,
        )
    }
}
