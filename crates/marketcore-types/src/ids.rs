//! Identifiers used throughout marketcore.
//!
//! Entity IDs supplied by callers use UUIDv7. IDs that the engine itself
//! creates (trades, liquidity orders, cancel-replace orders) are derived
//! from SHA-256 over domain-separated inputs so that every node replaying
//! the same command stream produces the same identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Hash `domain || parts...` and take the first 16 bytes as a UUID.
fn derived_uuid(domain: &[u8], parts: &[&[u8]]) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    let hash = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash[..16]);
    Uuid::from_bytes(bytes)
}

// ---------------------------------------------------------------------------
// OrderId
// ---------------------------------------------------------------------------

/// Unique order identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct OrderId(pub Uuid);

impl OrderId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Deterministic child id, e.g. the replacement order created when a
    /// pegged order is converted into a plain limit order.
    #[must_use]
    pub fn derived(parent: &OrderId, version: u64) -> Self {
        Self(derived_uuid(
            b"marketcore:order_id:v1:",
            &[parent.0.as_bytes(), &version.to_le_bytes()],
        ))
    }

    /// Deterministic id of the `index`-th order deployed for a liquidity
    /// provision at the given deployment round.
    #[must_use]
    pub fn for_liquidity(lp: &LiquidityProvisionId, round: u64, index: u64) -> Self {
        Self(derived_uuid(
            b"marketcore:lp_order_id:v1:",
            &[lp.0.as_bytes(), &round.to_le_bytes(), &index.to_le_bytes()],
        ))
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// PartyId
// ---------------------------------------------------------------------------

/// Unique identifier for a trading party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PartyId(pub Uuid);

impl PartyId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for PartyId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "party:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// MarketId
// ---------------------------------------------------------------------------

/// Identifier of a market (e.g. `"BTC-PERP"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct MarketId(pub String);

impl MarketId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// TradeId
// ---------------------------------------------------------------------------

/// Trade identifier. Always derived, never random.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TradeId(pub Uuid);

impl TradeId {
    /// Deterministic `TradeId` from the market and its trade sequence.
    ///
    /// Every node generates the **exact same** `TradeId` for the same fill.
    #[must_use]
    pub fn deterministic(market: &MarketId, sequence: u64) -> Self {
        Self(derived_uuid(
            b"marketcore:trade_id:v1:",
            &[market.0.as_bytes(), &sequence.to_le_bytes()],
        ))
    }
}

impl fmt::Display for TradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// LiquidityProvisionId
// ---------------------------------------------------------------------------

/// Identifier of a liquidity commitment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct LiquidityProvisionId(pub Uuid);

impl LiquidityProvisionId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }
}

impl Default for LiquidityProvisionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LiquidityProvisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lp:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_id_uniqueness() {
        let a = OrderId::new();
        let b = OrderId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn trade_id_deterministic() {
        let market = MarketId::new("BTC-PERP");
        let a = TradeId::deterministic(&market, 0);
        let b = TradeId::deterministic(&market, 0);
        assert_eq!(a, b);
        let c = TradeId::deterministic(&market, 1);
        assert_ne!(a, c);
        let d = TradeId::deterministic(&MarketId::new("ETH-PERP"), 0);
        assert_ne!(a, d);
    }

    #[test]
    fn derived_order_ids_are_stable() {
        let parent = OrderId::from_bytes([7; 16]);
        assert_eq!(OrderId::derived(&parent, 1), OrderId::derived(&parent, 1));
        assert_ne!(OrderId::derived(&parent, 1), OrderId::derived(&parent, 2));
    }

    #[test]
    fn liquidity_order_ids_depend_on_round_and_index() {
        let lp = LiquidityProvisionId::from_bytes([9; 16]);
        let a = OrderId::for_liquidity(&lp, 0, 0);
        assert_eq!(a, OrderId::for_liquidity(&lp, 0, 0));
        assert_ne!(a, OrderId::for_liquidity(&lp, 0, 1));
        assert_ne!(a, OrderId::for_liquidity(&lp, 1, 0));
    }

    #[test]
    fn serde_roundtrips() {
        let oid = OrderId::new();
        let json = serde_json::to_string(&oid).unwrap();
        let back: OrderId = serde_json::from_str(&json).unwrap();
        assert_eq!(oid, back);

        let market = MarketId::new("BTC-PERP");
        let json = serde_json::to_string(&market).unwrap();
        let back: MarketId = serde_json::from_str(&json).unwrap();
        assert_eq!(market, back);
    }
}
