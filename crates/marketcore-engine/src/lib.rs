//! # marketcore-engine
//!
//! **Per-market orchestration on top of [`marketcore_book`].**
//!
//! A [`Market`] drives one order book through its lifecycle and trading
//! modes:
//!
//! - **Auctions**: opening, price-monitoring and liquidity auctions, with
//!   extension rules and uncrossing on exit ([`AuctionState`])
//! - **Pegged orders**: priced from the static best bid/ask/mid, parked
//!   when they cannot be priced, repriced when a reference moves
//!   ([`PeggedOrders`])
//! - **Price monitoring**: per-horizon bands that turn a breaching trade
//!   into a price auction ([`PriceMonitor`])
//! - **Liquidity commitments**: bonded stake deployed as pegged orders,
//!   with target-stake monitoring ([`LiquidityEngine`])
//! - **GTT expiry** by tick-driven time ([`ExpiringOrders`])
//!
//! Collateral and risk models are injected as trait objects
//! ([`Collateral`], [`PriceRangeModel`], [`TargetStakeModel`]) and called
//! synchronously. Every effect is reported as a
//! [`marketcore_types::Event`]; replaying the same commands yields the
//! same events and the same event root.
//!
//! ```text
//! command ─▶ Market ─▶ OrderBook ─▶ trades
//!              │  ├─▶ PriceMonitor ──breach──▶ AuctionState
//!              │  ├─▶ PeggedOrders / LiquidityEngine ─▶ OrderBook
//!              │  └─▶ Collateral
//!              └─▶ events ─▶ running event root
//! ```

pub mod auction;
pub mod collateral;
pub mod expiry;
pub mod liquidity;
pub mod market;
pub mod pegged;
pub mod price_monitor;
pub mod risk;

pub use auction::AuctionState;
pub use collateral::{Account, Collateral, InMemoryCollateral};
pub use expiry::ExpiringOrders;
pub use liquidity::LiquidityEngine;
pub use market::{Collaborators, Market};
pub use pegged::{
    PeggedOrders, ReferenceChanges, References, RepriceOutcome, peg_price, validate_peg,
};
pub use price_monitor::{PriceMonitor, year_fraction};
pub use risk::{FixedFactorRangeModel, FixedTargetStake, PriceRangeModel, TargetStakeModel};
