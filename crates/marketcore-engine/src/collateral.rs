//! Collateral seam.
//!
//! The market never moves money itself. It asks a [`Collateral`]
//! implementation whether a party can fund an order, and tells it when an
//! order starts or stops resting so margin can be held or released.
//!
//! [`InMemoryCollateral`] is a per-party ledger with two buckets per
//! account plus a commitment bond:
//! - **Available**: free margin
//! - **Held**: locked by resting orders (one holding per order)
//! - **Bonded**: locked by a liquidity commitment
//!
//! The holding for an order is `price × remaining × margin_factor`.
//! Re-transferring an order that already has a holding replaces it, so
//! partial fills and repricing keep the holding in step with the book.

use std::collections::HashMap;

use marketcore_types::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Margin and bond operations the market relies on. Calls are synchronous
/// and complete before the next step of the same command.
pub trait Collateral {
    /// Can `party` fund `size` at `price`? Pegged orders are checked at
    /// their computed price. Margin already held for `order_id` counts
    /// towards the requirement, so a resting order is only checked for the
    /// difference.
    fn check_sufficient_funds(
        &self,
        order_id: &OrderId,
        party: &PartyId,
        side: Side,
        price: Decimal,
        size: Decimal,
        is_pegged: bool,
    ) -> Result<()>;

    /// Lock margin for a resting order.
    fn transfer_to_holding_account(&mut self, order: &Order) -> Result<()>;

    /// Return an order's margin. Unknown orders are a no-op.
    fn release_from_holding_account(
        &mut self,
        order_id: &OrderId,
        party: &PartyId,
        side: Side,
    ) -> Result<()>;

    /// Lock a liquidity commitment.
    fn bond_commitment(&mut self, party: &PartyId, amount: Decimal) -> Result<()>;

    /// Return (part of) a liquidity commitment.
    fn release_commitment(&mut self, party: &PartyId, amount: Decimal) -> Result<()>;
}

/// Balances of one party.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub available: Decimal,
    pub held: Decimal,
    pub bonded: Decimal,
}

impl Account {
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.available + self.held + self.bonded
    }
}

/// In-memory collateral ledger.
#[derive(Debug)]
pub struct InMemoryCollateral {
    margin_factor: Decimal,
    accounts: HashMap<PartyId, Account>,
    /// `OrderId -> (party, amount held)`
    holdings: HashMap<OrderId, (PartyId, Decimal)>,
}

impl Default for InMemoryCollateral {
    fn default() -> Self {
        Self::new(Decimal::ONE)
    }
}

impl InMemoryCollateral {
    #[must_use]
    pub fn new(margin_factor: Decimal) -> Self {
        Self {
            margin_factor,
            accounts: HashMap::new(),
            holdings: HashMap::new(),
        }
    }

    /// Credit free margin.
    pub fn deposit(&mut self, party: &PartyId, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(MarketcoreError::CollateralTransfer {
                reason: "deposit amount must be positive".into(),
            });
        }
        self.accounts.entry(*party).or_default().available += amount;
        Ok(())
    }

    /// Balances of `party`, zero if never seen.
    #[must_use]
    pub fn account(&self, party: &PartyId) -> Account {
        self.accounts.get(party).cloned().unwrap_or_default()
    }

    /// Margin currently held for `order_id`.
    #[must_use]
    pub fn holding(&self, order_id: &OrderId) -> Option<Decimal> {
        self.holdings.get(order_id).map(|(_, amount)| *amount)
    }

    #[must_use]
    pub fn holding_count(&self) -> usize {
        self.holdings.len()
    }

    fn requirement(&self, price: Decimal, size: Decimal) -> Decimal {
        price * size * self.margin_factor
    }

    fn return_holding(&mut self, order_id: &OrderId) {
        if let Some((party, amount)) = self.holdings.remove(order_id) {
            let account = self.accounts.entry(party).or_default();
            account.held -= amount;
            account.available += amount;
        }
    }
}

impl Collateral for InMemoryCollateral {
    fn check_sufficient_funds(
        &self,
        order_id: &OrderId,
        party: &PartyId,
        _side: Side,
        price: Decimal,
        size: Decimal,
        _is_pegged: bool,
    ) -> Result<()> {
        let required = self.requirement(price, size);
        let held = match self.holdings.get(order_id) {
            Some((owner, amount)) if owner == party => *amount,
            _ => Decimal::ZERO,
        };
        let available = self.account(party).available + held;
        if available < required {
            return Err(MarketcoreError::InsufficientFunds {
                party: *party,
                required,
                available,
            });
        }
        Ok(())
    }

    fn transfer_to_holding_account(&mut self, order: &Order) -> Result<()> {
        let required = self.requirement(order.price, order.remaining);
        let previous = self.holding(&order.id).unwrap_or_default();
        let available = self.account(&order.party).available + previous;
        if available < required {
            return Err(MarketcoreError::InsufficientFunds {
                party: order.party,
                required,
                available,
            });
        }

        self.return_holding(&order.id);
        let account = self.accounts.entry(order.party).or_default();
        account.available -= required;
        account.held += required;
        self.holdings.insert(order.id, (order.party, required));
        Ok(())
    }

    fn release_from_holding_account(
        &mut self,
        order_id: &OrderId,
        party: &PartyId,
        _side: Side,
    ) -> Result<()> {
        if let Some((owner, _)) = self.holdings.get(order_id) {
            if owner != party {
                return Err(MarketcoreError::CollateralTransfer {
                    reason: format!("holding for {order_id} belongs to {owner}, not {party}"),
                });
            }
        }
        self.return_holding(order_id);
        Ok(())
    }

    fn bond_commitment(&mut self, party: &PartyId, amount: Decimal) -> Result<()> {
        let account = self.accounts.entry(*party).or_default();
        if account.available < amount {
            return Err(MarketcoreError::InsufficientFunds {
                party: *party,
                required: amount,
                available: account.available,
            });
        }
        account.available -= amount;
        account.bonded += amount;
        Ok(())
    }

    fn release_commitment(&mut self, party: &PartyId, amount: Decimal) -> Result<()> {
        let account = self.accounts.entry(*party).or_default();
        if account.bonded < amount {
            return Err(MarketcoreError::CollateralTransfer {
                reason: format!("cannot release {amount}, only {} bonded", account.bonded),
            });
        }
        account.bonded -= amount;
        account.available += amount;
        Ok(())
    }
}
