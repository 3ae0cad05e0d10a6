//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use marketcore_engine::{Collaborators, InMemoryCollateral, Market};
use marketcore_types::*;
use rust_decimal::Decimal;

pub fn dec(n: i64) -> Decimal {
    Decimal::new(n, 0)
}

/// `secs` after the epoch.
pub fn t(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(secs)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn party(n: u8) -> PartyId {
    PartyId::from_bytes([n; 16])
}

/// Order id with `n` in the low bytes; stable across runs.
pub fn order_id(n: u64) -> OrderId {
    let mut bytes = [0u8; 16];
    bytes[8..].copy_from_slice(&n.to_be_bytes());
    OrderId::from_bytes(bytes)
}

/// Collateral with `parties` 1..=n funded generously.
pub fn funded_collateral(parties: u8) -> InMemoryCollateral {
    let mut collateral = InMemoryCollateral::default();
    for n in 1..=parties {
        collateral
            .deposit(&party(n), dec(10_000_000))
            .expect("deposit");
    }
    collateral
}

/// A market with ten funded parties, enacted at `t(0)`: continuous or in
/// its opening auction depending on `config`.
pub fn enacted(config: MarketConfig) -> Market {
    init_tracing();
    let mut market = Market::new(config, Collaborators::new(funded_collateral(10)), t(0));
    market.enact(t(0)).expect("enact");
    market.take_events();
    market
}

pub fn buy(market: &mut Market, who: u8, price: i64, size: i64) -> Result<OrderConfirmation> {
    market.submit_order(OrderSubmission::limit(party(who), Side::Buy, dec(price), dec(size)))
}

pub fn sell(market: &mut Market, who: u8, price: i64, size: i64) -> Result<OrderConfirmation> {
    market.submit_order(OrderSubmission::limit(party(who), Side::Sell, dec(price), dec(size)))
}

pub fn orders_in(events: &[Event]) -> Vec<&Order> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Order(o) => Some(o),
            _ => None,
        })
        .collect()
}

pub fn trades_in(events: &[Event]) -> Vec<&Trade> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Trade(t) => Some(t),
            _ => None,
        })
        .collect()
}

pub fn auctions_in(events: &[Event]) -> Vec<&AuctionEvent> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Auction(a) => Some(a),
            _ => None,
        })
        .collect()
}
