//! System-wide constants for the marketcore engine.

/// Default tick size numerator (`1`, i.e. whole price units).
pub const DEFAULT_TICK_SIZE: i64 = 1;

/// Default opening auction length in seconds.
pub const DEFAULT_OPENING_AUCTION_SECS: i64 = 60;

/// Minimum time any auction lasts before it may be left, in seconds.
pub const DEFAULT_MIN_AUCTION_SECS: i64 = 1;

/// Extension applied when an auction cannot be left for lack of an
/// uncrossing price or liquidity, in seconds.
pub const DEFAULT_AUCTION_EXTENSION_SECS: i64 = 1;

/// Default interval between price-monitoring bound refreshes, in seconds.
pub const DEFAULT_PRICE_MONITORING_UPDATE_SECS: i64 = 60;

/// Seconds in a year for horizon → year-fraction conversion (365.25 days).
pub const SECONDS_PER_YEAR: i64 = 31_557_600;

/// Default liquidity triggering ratio, in hundredths (`0.7`).
pub const DEFAULT_TRIGGERING_RATIO_PCT: i64 = 70;

/// Default stake-to-volume conversion factor.
pub const DEFAULT_STAKE_TO_CCY_VOLUME: i64 = 1;

/// Engine name.
pub const ENGINE_NAME: &str = "marketcore";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
