//! # marketcore-types
//!
//! Shared types, errors, and configuration for the **marketcore** market engine.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`OrderId`], [`PartyId`], [`TradeId`], [`MarketId`], [`LiquidityProvisionId`]
//! - **Order model**: [`Order`], [`Side`], [`OrderType`], [`TimeInForce`], [`OrderStatus`], [`PeggedOrder`]
//! - **Commands**: [`OrderSubmission`], [`OrderAmendment`], [`LiquidityProvisionSubmission`]
//! - **Trade model**: [`Trade`]
//! - **Market model**: [`MarketState`], [`TradingMode`], [`AuctionTrigger`], [`MarketData`]
//! - **Events**: [`Event`] and its payloads
//! - **Configuration**: [`MarketConfig`], [`AuctionConfig`], [`PriceMonitoringSettings`], [`LiquidityConfig`]
//! - **Errors**: [`MarketcoreError`] with `MC_ERR_` prefix codes
//! - **Constants**: system-wide defaults

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod ids;
pub mod liquidity;
pub mod market;
pub mod order;
pub mod trade;

// Re-export all primary types at crate root for ergonomic imports:
//   use marketcore_types::{Order, Side, Trade, Event, ...};

pub use config::*;
pub use error::*;
pub use events::*;
pub use ids::*;
pub use liquidity::*;
pub use market::*;
pub use order::*;
pub use trade::*;

// Constants are accessed via `marketcore_types::constants::FOO`
// (not re-exported to avoid name collisions).
