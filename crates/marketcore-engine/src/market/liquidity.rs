//! Liquidity provision commands and the deployment of provider orders.

use marketcore_types::*;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::Market;
use crate::liquidity::LiquidityEngine;
use crate::pegged::References;

impl Market {
    // =================================================================
    // Commands
    // =================================================================

    /// Bond a new commitment for `submission.party`.
    pub fn submit_liquidity_provision(
        &mut self,
        submission: LiquidityProvisionSubmission,
    ) -> Result<LiquidityProvision> {
        self.guard()?;
        let result = self.submit_liquidity_inner(&submission);
        self.fatal_check(result)
    }

    fn submit_liquidity_inner(
        &mut self,
        submission: &LiquidityProvisionSubmission,
    ) -> Result<LiquidityProvision> {
        self.require_trading()?;
        if self.liquidity.get(&submission.party).is_some() {
            return Err(MarketcoreError::InvalidLiquidityProvision {
                reason: format!("party {} already has a commitment", submission.party),
            });
        }
        LiquidityEngine::validate(submission, self.config.tick_size)?;
        self.collateral
            .bond_commitment(&submission.party, submission.commitment_amount)?;

        let provision =
            LiquidityProvision::from_submission(submission, self.config.id.clone(), self.now);
        info!(
            market = %self.config.id,
            party = %provision.party,
            commitment = %provision.commitment_amount,
            "liquidity commitment accepted"
        );
        self.liquidity.insert(provision.clone());
        self.emit(Event::LiquidityProvision(provision));

        if !self.auction.in_auction() {
            self.refresh_liquidity(&[submission.party])?;
        }
        self.check_liquidity()?;
        self.emit_market_data();
        self.liquidity
            .get(&submission.party)
            .cloned()
            .ok_or(MarketcoreError::LiquidityProvisionNotFound(submission.party))
    }

    /// Replace the commitment and shape of an existing provision.
    pub fn amend_liquidity_provision(
        &mut self,
        submission: LiquidityProvisionSubmission,
    ) -> Result<LiquidityProvision> {
        self.guard()?;
        let result = self.amend_liquidity_inner(&submission);
        self.fatal_check(result)
    }

    fn amend_liquidity_inner(
        &mut self,
        submission: &LiquidityProvisionSubmission,
    ) -> Result<LiquidityProvision> {
        self.require_trading()?;
        let party = submission.party;
        let current = self
            .liquidity
            .get(&party)
            .map(|p| p.commitment_amount)
            .ok_or(MarketcoreError::LiquidityProvisionNotFound(party))?;
        LiquidityEngine::validate(submission, self.config.tick_size)?;

        if !self.auction.in_auction() {
            let target = self.current_target_stake();
            if self
                .liquidity
                .would_be_insufficient(&party, submission.commitment_amount, target)
            {
                let supplied =
                    self.liquidity.supplied_stake() - current + submission.commitment_amount;
                return Err(MarketcoreError::CommitmentBelowTarget {
                    supplied,
                    required: self.liquidity.required_stake(target),
                });
            }
        }

        let delta = submission.commitment_amount - current;
        if delta > Decimal::ZERO {
            self.collateral.bond_commitment(&party, delta)?;
        } else if delta < Decimal::ZERO {
            self.collateral.release_commitment(&party, -delta)?;
        }

        let now = self.now;
        let amended = {
            let provision = self
                .liquidity
                .remove(&party)
                .ok_or(MarketcoreError::LiquidityProvisionNotFound(party))?;
            LiquidityProvision {
                commitment_amount: submission.commitment_amount,
                fee: submission.fee,
                buys: submission.buys.clone(),
                sells: submission.sells.clone(),
                updated_at: Some(now),
                version: provision.version + 1,
                ..provision
            }
        };
        info!(
            market = %self.config.id,
            party = %party,
            from = %current,
            to = %amended.commitment_amount,
            "liquidity commitment amended"
        );
        self.liquidity.insert(amended.clone());
        self.emit(Event::LiquidityProvision(amended));

        if !self.auction.in_auction() {
            self.refresh_liquidity(&[party])?;
        }
        self.check_liquidity()?;
        self.emit_market_data();
        self.liquidity
            .get(&party)
            .cloned()
            .ok_or(MarketcoreError::LiquidityProvisionNotFound(party))
    }

    /// Withdraw a provision and its orders, returning the bond.
    pub fn cancel_liquidity_provision(&mut self, party: &PartyId) -> Result<LiquidityProvision> {
        self.guard()?;
        let result = self.cancel_liquidity_inner(party);
        self.fatal_check(result)
    }

    fn cancel_liquidity_inner(&mut self, party: &PartyId) -> Result<LiquidityProvision> {
        self.require_trading()?;
        if self.liquidity.get(party).is_none() {
            return Err(MarketcoreError::LiquidityProvisionNotFound(*party));
        }
        if !self.auction.in_auction() {
            let target = self.current_target_stake();
            if self.liquidity.would_be_insufficient(party, Decimal::ZERO, target) {
                let supplied = self.liquidity.supplied_stake()
                    - self.liquidity.get(party).map_or(Decimal::ZERO, |p| p.commitment_amount);
                return Err(MarketcoreError::CommitmentBelowTarget {
                    supplied,
                    required: self.liquidity.required_stake(target),
                });
            }
        }

        let before = References::from_book(&self.book);
        self.withdraw_party(party)?;
        let mut provision = self
            .liquidity
            .remove(party)
            .ok_or(MarketcoreError::LiquidityProvisionNotFound(*party))?;
        self.collateral
            .release_commitment(party, provision.commitment_amount)?;
        provision.status = LiquidityProvisionStatus::Cancelled;
        provision.updated_at = Some(self.now);
        provision.version += 1;
        info!(market = %self.config.id, party = %party, "liquidity commitment cancelled");
        self.emit(Event::LiquidityProvision(provision.clone()));

        self.on_book_changed(&before, &[])?;
        self.check_liquidity()?;
        self.emit_market_data();
        Ok(provision)
    }

    // =================================================================
    // Deployment
    // =================================================================

    /// Redeploy the orders of `parties` against the current book. No-op
    /// during auctions.
    pub(super) fn refresh_liquidity(&mut self, parties: &[PartyId]) -> Result<()> {
        if self.auction.in_auction() {
            return Ok(());
        }
        for party in parties {
            self.withdraw_party(party)?;

            let refs = References::from_book(&self.book);
            let orders = self
                .liquidity
                .build_orders(party, &refs, self.config.tick_size, self.now);
            let best_bid = self.book.best_bid();
            let best_ask = self.book.best_ask();

            let mut deployed = Vec::new();
            for mut order in orders {
                let crosses = match order.side {
                    Side::Buy => best_ask.is_some_and(|ask| order.price >= ask),
                    Side::Sell => best_bid.is_some_and(|bid| order.price <= bid),
                };
                if crosses {
                    debug!(party = %party, price = %order.price, "liquidity order would cross, skipped");
                    continue;
                }
                self.book.insert_order(&mut order)?;
                deployed.push(order.id);
                self.emit_order(&order);
            }

            let status = if deployed.is_empty() {
                LiquidityProvisionStatus::Undeployed
            } else {
                LiquidityProvisionStatus::Active
            };
            if deployed.is_empty() {
                warn!(market = %self.config.id, party = %party, "no liquidity orders could be deployed");
            }
            self.liquidity.set_deployed(*party, deployed);
            if let Some(changed) = self.liquidity.set_status(party, status, self.now) {
                self.emit(Event::LiquidityProvision(changed));
            }
        }
        Ok(())
    }

    /// Pull every provider's orders off the book and mark the provisions
    /// undeployed.
    pub(super) fn withdraw_liquidity(&mut self) -> Result<()> {
        for party in self.liquidity.parties() {
            self.withdraw_party(&party)?;
            if let Some(changed) =
                self.liquidity
                    .set_status(&party, LiquidityProvisionStatus::Undeployed, self.now)
            {
                self.emit(Event::LiquidityProvision(changed));
            }
        }
        Ok(())
    }

    /// Cancel the orders currently deployed for `party`.
    fn withdraw_party(&mut self, party: &PartyId) -> Result<()> {
        for id in self.liquidity.take_deployed(party) {
            let mut order = match self.book.cancel(&id) {
                Ok(order) => order,
                // Filled orders have already left the book.
                Err(MarketcoreError::OrderNotFound(_)) => continue,
                Err(err) => return Err(err),
            };
            order.status = OrderStatus::Cancelled;
            order.updated_at = Some(self.now);
            self.emit_order(&order);
        }
        Ok(())
    }
}
