//! # marketcore-book
//!
//! **Deterministic limit order book for a single market.**
//!
//! The book is a pure in-memory structure: it knows nothing about
//! collateral, price monitoring or trading-mode transitions. It offers:
//!
//! - **Continuous matching**: price-time priority, wash trades skipped,
//!   FOK all-or-nothing, IOC/market remainders dropped
//! - **Call-auction uncrossing**: volume-maximising clearing price with a
//!   total tie-break order, executed oldest-first at a single price
//! - **Reference prices**: best and best *static* bid/ask (pegged and
//!   liquidity orders excluded) for pegged-order repricing
//! - **Determinism hashing**: a root over the emitted event stream for
//!   cross-node comparison

pub mod determinism;
pub mod matching;
pub mod orderbook;
pub mod price_level;
pub mod uncrossing;

pub use determinism::{chain_event_root, compute_event_root, event_root_hex, verify_event_root};
pub use matching::{Fill, MatchPlan};
pub use orderbook::OrderBook;
pub use price_level::PriceLevel;
pub use uncrossing::{IndicativeUncrossing, UncrossOutcome, UncrossingCandidate, select_uncrossing};
