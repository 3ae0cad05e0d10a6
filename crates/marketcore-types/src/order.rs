//! Order types for the marketcore engine.
//!
//! An [`Order`] is created from an [`OrderSubmission`] command, mutated by
//! amendments, matching, expiry and auction transitions, and leaves the
//! book once it reaches a terminal [`OrderStatus`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{LiquidityProvisionId, MarketId, OrderId, PartyId, Trade};

/// Which side of the book this order is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// The type of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Limit => write!(f, "LIMIT"),
            Self::Market => write!(f, "MARKET"),
        }
    }
}

/// How long an order stays eligible for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good-til-cancelled.
    Gtc,
    /// Good-til-time; requires `expires_at`.
    Gtt,
    /// Good-for-auction; cancelled when the auction ends.
    Gfa,
    /// Good-for-normal; cancelled when an auction starts.
    Gfn,
    /// Immediate-or-cancel.
    Ioc,
    /// Fill-or-kill.
    Fok,
}

impl TimeInForce {
    /// Whether an unfilled remainder may rest on the book.
    #[must_use]
    pub fn is_persistent(self) -> bool {
        match self {
            Self::Gtc | Self::Gtt | Self::Gfa | Self::Gfn => true,
            Self::Ioc | Self::Fok => false,
        }
    }

    /// Whether orders with this TIF are accepted while an auction runs.
    #[must_use]
    pub fn allowed_in_auction(self) -> bool {
        match self {
            Self::Gtc | Self::Gtt | Self::Gfa => true,
            Self::Gfn | Self::Ioc | Self::Fok => false,
        }
    }

    /// Whether orders with this TIF are accepted in continuous trading.
    #[must_use]
    pub fn allowed_in_continuous(self) -> bool {
        !matches!(self, Self::Gfa)
    }
}

impl std::fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gtc => write!(f, "GTC"),
            Self::Gtt => write!(f, "GTT"),
            Self::Gfa => write!(f, "GFA"),
            Self::Gfn => write!(f, "GFN"),
            Self::Ioc => write!(f, "IOC"),
            Self::Fok => write!(f, "FOK"),
        }
    }
}

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderStatus {
    Active,
    Parked,
    Filled,
    PartiallyFilled,
    Cancelled,
    Expired,
    Stopped,
    Rejected,
}

impl OrderStatus {
    /// Terminal statuses never return to the book.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Active | Self::Parked)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Parked => write!(f, "PARKED"),
            Self::Filled => write!(f, "FILLED"),
            Self::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Stopped => write!(f, "STOPPED"),
            Self::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// The book price a pegged order tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum PeggedReference {
    BestBid,
    BestAsk,
    Mid,
}

impl PeggedReference {
    /// Buys may peg to the bid or mid, sells to the ask or mid.
    #[must_use]
    pub fn valid_for(self, side: Side) -> bool {
        matches!(
            (side, self),
            (Side::Buy, Self::BestBid | Self::Mid) | (Side::Sell, Self::BestAsk | Self::Mid)
        )
    }
}

impl std::fmt::Display for PeggedReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BestBid => write!(f, "BEST_BID"),
            Self::BestAsk => write!(f, "BEST_ASK"),
            Self::Mid => write!(f, "MID"),
        }
    }
}

/// Pegging instructions. The offset always moves the price away from the
/// spread: below the reference for buys, above it for sells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeggedOrder {
    pub reference: PeggedReference,
    pub offset: Decimal,
}

/// Core order struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub market: MarketId,
    pub party: PartyId,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub status: OrderStatus,
    /// Price on the book. Zero while parked and for market orders.
    pub price: Decimal,
    /// The unrounded price: the submitted limit, or `reference ± offset`
    /// for pegged orders before tick rounding.
    pub original_price: Decimal,
    pub size: Decimal,
    pub remaining: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub pegged: Option<PeggedOrder>,
    /// Set on orders deployed on behalf of a liquidity commitment.
    pub liquidity_provision: Option<LiquidityProvisionId>,
    /// Time priority within a price level; reassigned on re-insertion.
    pub sequence: u64,
    pub version: u64,
}

impl Order {
    /// Build a fresh order from a submission command.
    #[must_use]
    pub fn from_submission(
        submission: &OrderSubmission,
        market: MarketId,
        now: DateTime<Utc>,
    ) -> Self {
        let price = submission.price.unwrap_or(Decimal::ZERO);
        Self {
            id: submission.id,
            market,
            party: submission.party,
            side: submission.side,
            order_type: submission.order_type,
            time_in_force: submission.time_in_force,
            status: OrderStatus::Active,
            price,
            original_price: price,
            size: submission.size,
            remaining: submission.size,
            created_at: now,
            updated_at: None,
            expires_at: submission.expires_at,
            pegged: submission.pegged,
            liquidity_provision: None,
            sequence: 0,
            version: 1,
        }
    }

    #[must_use]
    pub fn is_pegged(&self) -> bool {
        self.pegged.is_some()
    }

    #[must_use]
    pub fn is_liquidity_order(&self) -> bool {
        self.liquidity_provision.is_some()
    }

    /// Static orders define the reference prices pegged orders track.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.pegged.is_none() && self.liquidity_provision.is_none()
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.order_type == OrderType::Limit && self.time_in_force.is_persistent()
    }

    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.remaining.is_zero()
    }

    #[must_use]
    pub fn filled(&self) -> Decimal {
        self.size - self.remaining
    }

    /// Whether this order would trade against a resting order at `price`.
    #[must_use]
    pub fn crosses(&self, price: Decimal) -> bool {
        match (self.order_type, self.side) {
            (OrderType::Market, _) => true,
            (OrderType::Limit, Side::Buy) => self.price >= price,
            (OrderType::Limit, Side::Sell) => self.price <= price,
        }
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Order {
    pub fn dummy_limit(side: Side, price: Decimal, size: Decimal) -> Self {
        Self::dummy_limit_for_party(PartyId::new(), side, price, size)
    }

    pub fn dummy_limit_for_party(party: PartyId, side: Side, price: Decimal, size: Decimal) -> Self {
        Self {
            id: OrderId::new(),
            market: MarketId::new("TEST-PERP"),
            party,
            side,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            status: OrderStatus::Active,
            price,
            original_price: price,
            size,
            remaining: size,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
            updated_at: None,
            expires_at: None,
            pegged: None,
            liquidity_provision: None,
            sequence: 0,
            version: 1,
        }
    }

    pub fn dummy_pegged(side: Side, reference: PeggedReference, offset: Decimal, size: Decimal) -> Self {
        let mut order = Self::dummy_limit(side, Decimal::ZERO, size);
        order.pegged = Some(PeggedOrder { reference, offset });
        order
    }
}

/// Command: submit a new order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSubmission {
    pub id: OrderId,
    pub party: PartyId,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    /// Required for non-pegged limit orders, absent otherwise.
    pub price: Option<Decimal>,
    pub size: Decimal,
    pub expires_at: Option<DateTime<Utc>>,
    pub pegged: Option<PeggedOrder>,
}

impl OrderSubmission {
    /// A GTC limit order.
    #[must_use]
    pub fn limit(party: PartyId, side: Side, price: Decimal, size: Decimal) -> Self {
        Self {
            id: OrderId::new(),
            party,
            side,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            price: Some(price),
            size,
            expires_at: None,
            pegged: None,
        }
    }

    /// A market order; `time_in_force` must be IOC or FOK.
    #[must_use]
    pub fn market(party: PartyId, side: Side, size: Decimal, time_in_force: TimeInForce) -> Self {
        Self {
            id: OrderId::new(),
            party,
            side,
            order_type: OrderType::Market,
            time_in_force,
            price: None,
            size,
            expires_at: None,
            pegged: None,
        }
    }

    /// A GTC pegged limit order.
    #[must_use]
    pub fn pegged(
        party: PartyId,
        side: Side,
        reference: PeggedReference,
        offset: Decimal,
        size: Decimal,
    ) -> Self {
        Self {
            id: OrderId::new(),
            party,
            side,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            price: None,
            size,
            expires_at: None,
            pegged: Some(PeggedOrder { reference, offset }),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: OrderId) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub fn with_time_in_force(mut self, time_in_force: TimeInForce) -> Self {
        self.time_in_force = time_in_force;
        self
    }

    #[must_use]
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.time_in_force = TimeInForce::Gtt;
        self.expires_at = Some(expires_at);
        self
    }
}

/// Command: amend a resting or parked order.
///
/// Every field except the identity is optional; at least one change must
/// be requested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAmendment {
    pub order_id: OrderId,
    pub party: PartyId,
    pub price: Option<Decimal>,
    /// Signed change applied to both `size` and `remaining`.
    pub size_delta: Option<Decimal>,
    pub expires_at: Option<DateTime<Utc>>,
    pub time_in_force: Option<TimeInForce>,
    pub pegged_reference: Option<PeggedReference>,
    pub pegged_offset: Option<Decimal>,
    /// Convert a pegged order into a plain limit order at `price`.
    pub clear_peg: bool,
}

impl OrderAmendment {
    #[must_use]
    pub fn new(order_id: OrderId, party: PartyId) -> Self {
        Self {
            order_id,
            party,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.price.is_some()
            || self.size_delta.is_some_and(|d| !d.is_zero())
            || self.expires_at.is_some()
            || self.time_in_force.is_some()
            || self.pegged_reference.is_some()
            || self.pegged_offset.is_some()
            || self.clear_peg
    }

    #[must_use]
    pub fn changes_peg(&self) -> bool {
        self.pegged_reference.is_some() || self.pegged_offset.is_some()
    }
}

/// Outcome of a submission or amendment that reached the book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    pub order: Order,
    pub trades: Vec<Trade>,
    /// Resting orders touched by the trades, in fill order.
    pub passive_orders_affected: Vec<Order>,
}

impl OrderConfirmation {
    #[must_use]
    pub fn without_trades(order: Order) -> Self {
        Self {
            order,
            trades: Vec::new(),
            passive_orders_affected: Vec::new(),
        }
    }
}
