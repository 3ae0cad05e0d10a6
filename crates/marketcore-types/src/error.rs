//! Error types for the marketcore engine.
//!
//! All errors use the `MC_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Order validation errors
//! - 2xx: Amendment errors
//! - 3xx: Funding errors
//! - 4xx: Market state errors
//! - 5xx: Matching errors
//! - 6xx: Liquidity commitment errors
//! - 9xx: Fatal / internal errors

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{MarketState, OrderId, PartyId, PeggedReference, Side, TimeInForce, TradingMode};

/// Central error enum for all marketcore operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarketcoreError {
    // =================================================================
    // Order Validation Errors (1xx)
    // =================================================================
    /// The requested order is neither on the book nor parked.
    #[error("MC_ERR_100: Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The order failed validation (missing fields, bad values, etc.).
    #[error("MC_ERR_101: Invalid order: {reason}")]
    InvalidOrder { reason: String },

    /// An order with this ID already exists.
    #[error("MC_ERR_102: Order already exists: {0}")]
    DuplicateOrder(OrderId),

    /// The price is not a multiple of the market tick size.
    #[error("MC_ERR_103: Price {price} is not a multiple of tick size {tick_size}")]
    InvalidTickSize { price: Decimal, tick_size: Decimal },

    /// A pegged order references a price on the wrong side of the book.
    #[error("MC_ERR_104: {side} order cannot be pegged to {reference}")]
    InvalidPeggedReference {
        side: Side,
        reference: PeggedReference,
    },

    /// The peg offset is negative, off-tick, or zero against the mid.
    #[error("MC_ERR_105: Invalid peg offset {offset}: {reason}")]
    InvalidPeggedOffset { offset: Decimal, reason: String },

    /// GTT without a future expiry, or an expiry on a non-GTT order.
    #[error("MC_ERR_106: Invalid expiration: {reason}")]
    InvalidExpiration { reason: String },

    /// The time in force is not accepted in the current trading mode.
    #[error("MC_ERR_107: {time_in_force} orders are not accepted during {mode}")]
    TimeInForceNotAllowed {
        time_in_force: TimeInForce,
        mode: TradingMode,
    },

    /// The command's party does not own the order.
    #[error("MC_ERR_108: Order {order} does not belong to {party}")]
    PartyMismatch { order: OrderId, party: PartyId },

    // =================================================================
    // Amendment Errors (2xx)
    // =================================================================
    /// Pegged order prices follow their reference and cannot be set.
    #[error("MC_ERR_200: Cannot amend the price of a pegged order")]
    CannotAmendPeggedOrderPrice,

    /// Peg details were supplied for a plain limit order.
    #[error("MC_ERR_201: Cannot amend peg details of a non-pegged order")]
    CannotAmendPegOnNonPeggedOrder,

    /// GFA/GFN, IOC and FOK cannot be amended into or out of.
    #[error("MC_ERR_202: Cannot amend time in force from {from} to {to}")]
    CannotAmendTimeInForce { from: TimeInForce, to: TimeInForce },

    /// The amendment is malformed or empty.
    #[error("MC_ERR_203: Invalid amendment: {reason}")]
    InvalidAmendment { reason: String },

    /// Liquidity orders are managed through their commitment only.
    #[error("MC_ERR_204: Liquidity orders cannot be amended or cancelled directly")]
    CannotModifyLiquidityOrder,

    // =================================================================
    // Funding Errors (3xx)
    // =================================================================
    /// The party cannot fund the order.
    #[error("MC_ERR_300: Insufficient funds for {party}: need {required}, have {available}")]
    InsufficientFunds {
        party: PartyId,
        required: Decimal,
        available: Decimal,
    },

    /// A holding-account or bond transfer failed.
    #[error("MC_ERR_301: Collateral transfer failed: {reason}")]
    CollateralTransfer { reason: String },

    // =================================================================
    // Market State Errors (4xx)
    // =================================================================
    /// The market does not accept this command in its current state.
    #[error("MC_ERR_400: Market is not trading (state {0})")]
    MarketNotTrading(MarketState),

    /// The requested lifecycle transition is not valid from this state.
    #[error("MC_ERR_401: Cannot {action} while market is {from}")]
    InvalidTransition { from: MarketState, action: String },

    /// The market stopped after a fatal invariant violation.
    #[error("MC_ERR_402: Market halted")]
    MarketHalted,

    // =================================================================
    // Matching Errors (5xx)
    // =================================================================
    /// A non-persistent order would have traded outside the price bounds.
    #[error("MC_ERR_500: Non-persistent order would trade outside price monitoring bounds")]
    NonPersistentOrderOutOfBounds,

    // =================================================================
    // Liquidity Errors (6xx)
    // =================================================================
    /// The liquidity commitment failed validation.
    #[error("MC_ERR_600: Invalid liquidity provision: {reason}")]
    InvalidLiquidityProvision { reason: String },

    /// The party has no commitment in this market.
    #[error("MC_ERR_601: No liquidity provision for {0}")]
    LiquidityProvisionNotFound(PartyId),

    /// Removing the stake would leave the market below its target.
    #[error("MC_ERR_602: Commitment change would drop supplied stake {supplied} below {required}")]
    CommitmentBelowTarget { supplied: Decimal, required: Decimal },

    // =================================================================
    // Fatal / Internal (9xx)
    // =================================================================
    /// Internal state is inconsistent; the market halts.
    #[error("MC_ERR_900: Invariant violation: {0}")]
    InvariantViolation(String),

    /// Unexpected internal error.
    #[error("MC_ERR_901: Internal error: {0}")]
    Internal(String),
}

impl MarketcoreError {
    /// Errors after which the market must stop processing.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvariantViolation(_))
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, MarketcoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_contains_prefix() {
        let err = MarketcoreError::OrderNotFound(OrderId::new());
        let msg = format!("{err}");
        assert!(msg.starts_with("MC_ERR_100"), "Got: {msg}");
    }

    #[test]
    fn tick_size_display() {
        let err = MarketcoreError::InvalidTickSize {
            price: Decimal::new(1050, 0),
            tick_size: Decimal::new(100, 0),
        };
        let msg = format!("{err}");
        assert!(msg.contains("MC_ERR_103"));
        assert!(msg.contains("1050"));
        assert!(msg.contains("100"));
    }

    #[test]
    fn tif_display_names_mode() {
        let err = MarketcoreError::TimeInForceNotAllowed {
            time_in_force: TimeInForce::Gfa,
            mode: TradingMode::Continuous,
        };
        let msg = format!("{err}");
        assert!(msg.contains("GFA"));
        assert!(msg.contains("CONTINUOUS"));
    }

    #[test]
    fn only_invariant_violations_are_fatal() {
        assert!(MarketcoreError::InvariantViolation("x".into()).is_fatal());
        assert!(!MarketcoreError::MarketHalted.is_fatal());
        assert!(!MarketcoreError::CannotAmendPeggedOrderPrice.is_fatal());
    }

    #[test]
    fn all_errors_have_mc_err_prefix() {
        let errors: Vec<Box<dyn std::error::Error>> = vec![
            Box::new(MarketcoreError::MarketHalted),
            Box::new(MarketcoreError::CannotAmendPeggedOrderPrice),
            Box::new(MarketcoreError::NonPersistentOrderOutOfBounds),
            Box::new(MarketcoreError::Internal("test".into())),
            Box::new(MarketcoreError::MarketNotTrading(MarketState::Closed)),
        ];
        for err in errors {
            let msg = format!("{err}");
            assert!(
                msg.starts_with("MC_ERR_"),
                "Error missing MC_ERR_ prefix: {msg}"
            );
        }
    }
}
