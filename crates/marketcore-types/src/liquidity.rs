//! Liquidity commitment types.
//!
//! A liquidity provider bonds a commitment amount and describes, per side,
//! a shape of pegged orders the engine keeps deployed on its behalf.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{LiquidityProvisionId, MarketId, PartyId, PeggedReference};

/// One entry of a liquidity shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LiquidityOrderShape {
    pub reference: PeggedReference,
    /// Relative weight of this entry within its side.
    pub proportion: u32,
    pub offset: Decimal,
}

/// Command: create or amend a liquidity commitment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityProvisionSubmission {
    pub id: LiquidityProvisionId,
    pub party: PartyId,
    pub commitment_amount: Decimal,
    /// Proposed liquidity fee, in `[0, 1]`.
    pub fee: Decimal,
    pub buys: Vec<LiquidityOrderShape>,
    pub sells: Vec<LiquidityOrderShape>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiquidityProvisionStatus {
    /// Orders are on the book.
    Active,
    /// Commitment retained, orders withdrawn (auction or missing reference).
    Undeployed,
    Cancelled,
}

impl std::fmt::Display for LiquidityProvisionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Undeployed => write!(f, "UNDEPLOYED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// A party's liquidity commitment in one market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityProvision {
    pub id: LiquidityProvisionId,
    pub market: MarketId,
    pub party: PartyId,
    pub commitment_amount: Decimal,
    pub fee: Decimal,
    pub buys: Vec<LiquidityOrderShape>,
    pub sells: Vec<LiquidityOrderShape>,
    pub status: LiquidityProvisionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: u64,
}

impl LiquidityProvision {
    #[must_use]
    pub fn from_submission(
        submission: &LiquidityProvisionSubmission,
        market: MarketId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: submission.id,
            market,
            party: submission.party,
            commitment_amount: submission.commitment_amount,
            fee: submission.fee,
            buys: submission.buys.clone(),
            sells: submission.sells.clone(),
            status: LiquidityProvisionStatus::Undeployed,
            created_at: now,
            updated_at: None,
            version: 1,
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.status == LiquidityProvisionStatus::Cancelled
    }
}
