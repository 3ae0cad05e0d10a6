//! Liquidity commitments.
//!
//! A provider bonds a commitment and describes, per side, a shape of pegged
//! orders. While the market trades continuously the engine keeps one order
//! per shape entry on the book for each provider; the notional of a side
//! is split across its entries by proportion:
//!
//! ```text
//! size = ceil(commitment × stake_to_ccy_volume × proportion / Σ proportions / price)
//! ```
//!
//! Supplied stake is the sum of all live commitments. When it falls below
//! `target × triggering_ratio` the market goes into a liquidity auction.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use marketcore_types::*;
use rust_decimal::Decimal;
use tracing::debug;

use crate::pegged::{References, peg_price, validate_peg};

#[derive(Debug)]
pub struct LiquidityEngine {
    market: MarketId,
    config: LiquidityConfig,
    provisions: BTreeMap<PartyId, LiquidityProvision>,
    /// Orders currently on the book for each provider, in shape order.
    deployed: BTreeMap<PartyId, Vec<OrderId>>,
    /// Bumped on every deployment so order ids never repeat.
    round: u64,
}

impl LiquidityEngine {
    #[must_use]
    pub fn new(market: MarketId, config: LiquidityConfig) -> Self {
        Self {
            market,
            config,
            provisions: BTreeMap::new(),
            deployed: BTreeMap::new(),
            round: 0,
        }
    }

    // =================================================================
    // Validation
    // =================================================================

    pub fn validate(submission: &LiquidityProvisionSubmission, tick_size: Decimal) -> Result<()> {
        let invalid = |reason: &str| MarketcoreError::InvalidLiquidityProvision {
            reason: reason.to_string(),
        };
        if submission.commitment_amount <= Decimal::ZERO {
            return Err(invalid("commitment amount must be positive"));
        }
        if submission.fee < Decimal::ZERO || submission.fee > Decimal::ONE {
            return Err(invalid("fee must be within [0, 1]"));
        }
        if submission.buys.is_empty() || submission.sells.is_empty() {
            return Err(invalid("both sides need at least one shape entry"));
        }
        for (side, shape) in submission
            .buys
            .iter()
            .map(|s| (Side::Buy, s))
            .chain(submission.sells.iter().map(|s| (Side::Sell, s)))
        {
            if shape.proportion == 0 {
                return Err(invalid("shape proportions must be positive"));
            }
            let peg = PeggedOrder {
                reference: shape.reference,
                offset: shape.offset,
            };
            validate_peg(side, &peg, tick_size).map_err(|e| {
                MarketcoreError::InvalidLiquidityProvision {
                    reason: e.to_string(),
                }
            })?;
        }
        Ok(())
    }

    // =================================================================
    // Provisions
    // =================================================================

    #[must_use]
    pub fn get(&self, party: &PartyId) -> Option<&LiquidityProvision> {
        self.provisions.get(party)
    }

    pub fn insert(&mut self, provision: LiquidityProvision) {
        self.provisions.insert(provision.party, provision);
    }

    pub fn remove(&mut self, party: &PartyId) -> Option<LiquidityProvision> {
        self.provisions.remove(party)
    }

    /// Providers in party order.
    #[must_use]
    pub fn parties(&self) -> Vec<PartyId> {
        self.provisions.keys().copied().collect()
    }

    #[must_use]
    pub fn has_provisions(&self) -> bool {
        !self.provisions.is_empty()
    }

    /// Set the status of a provision, returning it when the status changed.
    pub fn set_status(
        &mut self,
        party: &PartyId,
        status: LiquidityProvisionStatus,
        now: DateTime<Utc>,
    ) -> Option<LiquidityProvision> {
        let provision = self.provisions.get_mut(party)?;
        if provision.status == status {
            return None;
        }
        provision.status = status;
        provision.updated_at = Some(now);
        provision.version += 1;
        Some(provision.clone())
    }

    // =================================================================
    // Stake
    // =================================================================

    #[must_use]
    pub fn supplied_stake(&self) -> Decimal {
        self.provisions
            .values()
            .filter(|p| !p.is_cancelled())
            .map(|p| p.commitment_amount)
            .sum()
    }

    /// Stake below which the market must not trade continuously.
    #[must_use]
    pub fn required_stake(&self, target: Decimal) -> Decimal {
        target * self.config.triggering_ratio
    }

    #[must_use]
    pub fn is_insufficient(&self, target: Decimal) -> bool {
        target > Decimal::ZERO && self.supplied_stake() < self.required_stake(target)
    }

    /// Would replacing `party`'s commitment with `commitment` leave the
    /// market short of stake?
    #[must_use]
    pub fn would_be_insufficient(&self, party: &PartyId, commitment: Decimal, target: Decimal) -> bool {
        let current = self.get(party).map_or(Decimal::ZERO, |p| p.commitment_amount);
        let supplied = self.supplied_stake() - current + commitment;
        target > Decimal::ZERO && supplied < self.required_stake(target)
    }

    // =================================================================
    // Deployment
    // =================================================================

    /// Forget and return the orders deployed for `party`.
    pub fn take_deployed(&mut self, party: &PartyId) -> Vec<OrderId> {
        self.deployed.remove(party).unwrap_or_default()
    }

    pub fn set_deployed(&mut self, party: PartyId, orders: Vec<OrderId>) {
        if orders.is_empty() {
            self.deployed.remove(&party);
        } else {
            self.deployed.insert(party, orders);
        }
    }

    /// Drop a single order from its provider's deployed set, e.g. once
    /// it has been filled.
    pub fn forget_order(&mut self, party: &PartyId, order_id: &OrderId) {
        if let Some(orders) = self.deployed.get_mut(party) {
            orders.retain(|id| id != order_id);
        }
    }

    /// Orders `party`'s shape would place against `refs`. Entries whose
    /// reference is missing are skipped.
    pub fn build_orders(
        &mut self,
        party: &PartyId,
        refs: &References,
        tick_size: Decimal,
        now: DateTime<Utc>,
    ) -> Vec<Order> {
        let Some(provision) = self.provisions.get(party) else {
            return Vec::new();
        };
        let round = self.round;
        self.round += 1;

        let notional = provision.commitment_amount * self.config.stake_to_ccy_volume;
        let mut orders = Vec::new();
        let mut index = 0u64;
        for (side, shapes) in [(Side::Buy, &provision.buys), (Side::Sell, &provision.sells)] {
            let total: u32 = shapes.iter().map(|s| s.proportion).sum();
            for shape in shapes {
                let id = OrderId::for_liquidity(&provision.id, round, index);
                index += 1;
                let peg = PeggedOrder {
                    reference: shape.reference,
                    offset: shape.offset,
                };
                let Some((price, original)) = peg_price(side, &peg, refs, tick_size) else {
                    continue;
                };
                let size = (notional * Decimal::from(shape.proportion)
                    / Decimal::from(total)
                    / price)
                    .ceil();
                if size <= Decimal::ZERO {
                    continue;
                }
                orders.push(Order {
                    id,
                    market: self.market.clone(),
                    party: *party,
                    side,
                    order_type: OrderType::Limit,
                    time_in_force: TimeInForce::Gtc,
                    status: OrderStatus::Active,
                    price,
                    original_price: original,
                    size,
                    remaining: size,
                    created_at: now,
                    updated_at: None,
                    expires_at: None,
                    pegged: Some(peg),
                    liquidity_provision: Some(provision.id),
                    sequence: 0,
                    version: 1,
                });
            }
        }
        debug!(party = %party, round, orders = orders.len(), "liquidity orders built");
        orders
    }
}
