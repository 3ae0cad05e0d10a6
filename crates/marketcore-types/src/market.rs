//! Market lifecycle and trading-mode types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::MarketId;

/// Lifecycle state of a market.
///
/// ```text
/// Proposed → Pending → Active ⇄ Suspended → TradingTerminated → Settled → Closed
///     └────────┴──→ Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketState {
    /// Created but not yet enacted.
    Proposed,
    /// Enacted; in the opening auction.
    Pending,
    /// Continuous trading.
    Active,
    /// In a monitoring (price or liquidity) auction.
    Suspended,
    TradingTerminated,
    Settled,
    Closed,
    Rejected,
}

impl MarketState {
    /// Whether order commands are accepted in this state.
    #[must_use]
    pub fn accepts_orders(self) -> bool {
        matches!(self, Self::Pending | Self::Active | Self::Suspended)
    }

    /// States that ignore time ticks.
    #[must_use]
    pub fn is_final(self) -> bool {
        matches!(
            self,
            Self::TradingTerminated | Self::Settled | Self::Closed | Self::Rejected
        )
    }
}

impl std::fmt::Display for MarketState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Proposed => write!(f, "PROPOSED"),
            Self::Pending => write!(f, "PENDING"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Suspended => write!(f, "SUSPENDED"),
            Self::TradingTerminated => write!(f, "TRADING_TERMINATED"),
            Self::Settled => write!(f, "SETTLED"),
            Self::Closed => write!(f, "CLOSED"),
            Self::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// How incoming orders are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradingMode {
    Continuous,
    OpeningAuction,
    MonitoringAuction,
    NoTrading,
}

impl TradingMode {
    #[must_use]
    pub fn is_auction(self) -> bool {
        matches!(self, Self::OpeningAuction | Self::MonitoringAuction)
    }
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Continuous => write!(f, "CONTINUOUS"),
            Self::OpeningAuction => write!(f, "OPENING_AUCTION"),
            Self::MonitoringAuction => write!(f, "MONITORING_AUCTION"),
            Self::NoTrading => write!(f, "NO_TRADING"),
        }
    }
}

/// Why an auction started or was extended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuctionTrigger {
    Unspecified,
    Opening,
    Price,
    LiquidityTargetNotMet,
    UnableToDeployLpOrders,
}

impl std::fmt::Display for AuctionTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unspecified => write!(f, "UNSPECIFIED"),
            Self::Opening => write!(f, "OPENING"),
            Self::Price => write!(f, "PRICE"),
            Self::LiquidityTargetNotMet => write!(f, "LIQUIDITY_TARGET_NOT_MET"),
            Self::UnableToDeployLpOrders => write!(f, "UNABLE_TO_DEPLOY_LP_ORDERS"),
        }
    }
}

/// A price-monitoring trigger: the horizon over which the price range is
/// computed, the probability level, and how long an auction it causes
/// lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceMonitoringTrigger {
    pub horizon_secs: i64,
    pub probability: Decimal,
    pub auction_extension_secs: i64,
}

/// Current valid band of one trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceMonitoringBounds {
    pub trigger: PriceMonitoringTrigger,
    pub min_valid_price: Decimal,
    pub max_valid_price: Decimal,
    pub reference_price: Decimal,
    /// `false` once the trigger fired in the current auction.
    pub active: bool,
}

impl PriceMonitoringBounds {
    #[must_use]
    pub fn contains(&self, price: Decimal) -> bool {
        price >= self.min_valid_price && price <= self.max_valid_price
    }
}

/// Snapshot of a market's public state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketData {
    pub market: MarketId,
    pub timestamp: DateTime<Utc>,
    pub state: MarketState,
    pub trading_mode: TradingMode,
    pub trigger: AuctionTrigger,
    pub extension_trigger: Option<AuctionTrigger>,
    pub auction_start: Option<DateTime<Utc>>,
    pub auction_end: Option<DateTime<Utc>>,
    pub best_bid: Option<Decimal>,
    pub best_bid_volume: Decimal,
    pub best_ask: Option<Decimal>,
    pub best_ask_volume: Decimal,
    pub best_static_bid: Option<Decimal>,
    pub best_static_ask: Option<Decimal>,
    pub mid_price: Option<Decimal>,
    pub static_mid_price: Option<Decimal>,
    pub last_traded_price: Option<Decimal>,
    pub mark_price: Option<Decimal>,
    pub indicative_price: Option<Decimal>,
    pub indicative_volume: Decimal,
    pub price_monitoring_bounds: Vec<PriceMonitoringBounds>,
    pub target_stake: Decimal,
    pub supplied_stake: Decimal,
}
