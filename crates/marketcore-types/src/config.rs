//! Per-market configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{MarketId, PriceMonitoringTrigger, constants};

/// Auction timing parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionConfig {
    /// Minimum time an auction lasts before it may be left.
    pub minimum_duration_secs: i64,
    /// Extension applied when leaving fails for lack of an uncrossing
    /// price or of liquidity.
    pub extension_secs: i64,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            minimum_duration_secs: constants::DEFAULT_MIN_AUCTION_SECS,
            extension_secs: constants::DEFAULT_AUCTION_EXTENSION_SECS,
        }
    }
}

/// Price-monitoring parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceMonitoringSettings {
    pub triggers: Vec<PriceMonitoringTrigger>,
    /// Bounds are recomputed from the latest traded price at this interval.
    pub update_frequency_secs: i64,
    /// Optional reference price used to seed the bounds at creation.
    pub initial_reference_price: Option<Decimal>,
}

impl Default for PriceMonitoringSettings {
    fn default() -> Self {
        Self {
            triggers: Vec::new(),
            update_frequency_secs: constants::DEFAULT_PRICE_MONITORING_UPDATE_SECS,
            initial_reference_price: None,
        }
    }
}

/// Liquidity monitoring parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityConfig {
    /// Supplied stake below `target × triggering_ratio` starts an auction.
    pub triggering_ratio: Decimal,
    /// Converts committed stake into the notional an LP must quote.
    pub stake_to_ccy_volume: Decimal,
}

impl Default for LiquidityConfig {
    fn default() -> Self {
        Self {
            triggering_ratio: Decimal::new(constants::DEFAULT_TRIGGERING_RATIO_PCT, 2),
            stake_to_ccy_volume: Decimal::new(constants::DEFAULT_STAKE_TO_CCY_VOLUME, 0),
        }
    }
}

/// Configuration of a single market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    pub id: MarketId,
    /// Minimum price increment; every price must be a multiple.
    pub tick_size: Decimal,
    /// Length of the opening auction; `None` opens straight into
    /// continuous trading.
    pub opening_auction_duration_secs: Option<i64>,
    pub auction: AuctionConfig,
    pub price_monitoring: PriceMonitoringSettings,
    pub liquidity: LiquidityConfig,
}

impl MarketConfig {
    /// A market with default parameters and the standard opening auction.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: MarketId::new(id),
            tick_size: Decimal::new(constants::DEFAULT_TICK_SIZE, 0),
            opening_auction_duration_secs: Some(constants::DEFAULT_OPENING_AUCTION_SECS),
            auction: AuctionConfig::default(),
            price_monitoring: PriceMonitoringSettings::default(),
            liquidity: LiquidityConfig::default(),
        }
    }

    /// A market that opens directly in continuous trading.
    #[must_use]
    pub fn continuous(id: impl Into<String>) -> Self {
        Self {
            opening_auction_duration_secs: None,
            ..Self::new(id)
        }
    }

    #[must_use]
    pub fn with_tick_size(mut self, tick_size: Decimal) -> Self {
        self.tick_size = tick_size;
        self
    }

    #[must_use]
    pub fn with_opening_auction(mut self, secs: i64) -> Self {
        self.opening_auction_duration_secs = Some(secs);
        self
    }

    #[must_use]
    pub fn with_price_monitoring(mut self, settings: PriceMonitoringSettings) -> Self {
        self.price_monitoring = settings;
        self
    }

    /// Whether `price` is an exact multiple of the tick size.
    #[must_use]
    pub fn is_tick_multiple(&self, price: Decimal) -> bool {
        is_multiple_of(price, self.tick_size)
    }
}

/// `value` is an exact multiple of `step` (a non-positive step accepts
/// everything).
#[must_use]
pub fn is_multiple_of(value: Decimal, step: Decimal) -> bool {
    if step <= Decimal::ZERO {
        return true;
    }
    (value % step).is_zero()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_market_has_opening_auction() {
        let cfg = MarketConfig::new("BTC-PERP");
        assert_eq!(cfg.id.as_str(), "BTC-PERP");
        assert_eq!(cfg.opening_auction_duration_secs, Some(60));
        assert_eq!(cfg.tick_size, Decimal::ONE);
        assert_eq!(cfg.liquidity.triggering_ratio, Decimal::new(7, 1));
    }

    #[test]
    fn continuous_market_skips_opening() {
        let cfg = MarketConfig::continuous("BTC-PERP");
        assert!(cfg.opening_auction_duration_secs.is_none());
    }

    #[test]
    fn tick_multiples() {
        let cfg = MarketConfig::continuous("BTC-PERP").with_tick_size(Decimal::new(100, 0));
        assert!(cfg.is_tick_multiple(Decimal::new(1100, 0)));
        assert!(!cfg.is_tick_multiple(Decimal::new(1050, 0)));
        assert!(cfg.is_tick_multiple(Decimal::ZERO));
        assert!(is_multiple_of(Decimal::new(5, 1), Decimal::new(1, 1)));
    }

    #[test]
    fn market_config_serde_roundtrip() {
        let cfg = MarketConfig::new("ETH-PERP");
        let json = serde_json::to_string(&cfg).unwrap();
        let back: MarketConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
