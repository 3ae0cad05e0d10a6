//! Risk-model seams: price ranges for price monitoring and the target
//! stake for liquidity monitoring.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Produces the valid price band around a reference price.
pub trait PriceRangeModel {
    /// `(min, max)` valid prices for `price` over a horizon expressed as a
    /// fraction of a year, at confidence `probability`.
    fn price_range(
        &self,
        price: Decimal,
        year_fraction: Decimal,
        probability: Decimal,
    ) -> (Decimal, Decimal);
}

/// Band of `price × (1 − down)` to `price × (1 + up)`, independent of the
/// horizon and probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedFactorRangeModel {
    pub down: Decimal,
    pub up: Decimal,
}

impl FixedFactorRangeModel {
    #[must_use]
    pub fn new(down: Decimal, up: Decimal) -> Self {
        Self { down, up }
    }
}

impl Default for FixedFactorRangeModel {
    /// ±10%.
    fn default() -> Self {
        Self::new(Decimal::new(1, 1), Decimal::new(1, 1))
    }
}

impl PriceRangeModel for FixedFactorRangeModel {
    fn price_range(
        &self,
        price: Decimal,
        _year_fraction: Decimal,
        _probability: Decimal,
    ) -> (Decimal, Decimal) {
        (
            price * (Decimal::ONE - self.down),
            price * (Decimal::ONE + self.up),
        )
    }
}

/// Stake the market wants committed by liquidity providers.
pub trait TargetStakeModel {
    fn target_stake(&self, now: DateTime<Utc>, reference_price: Option<Decimal>) -> Decimal;
}

/// A constant target. Zero disables liquidity-target auctions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedTargetStake(pub Decimal);

impl TargetStakeModel for FixedTargetStake {
    fn target_stake(&self, _now: DateTime<Utc>, _reference_price: Option<Decimal>) -> Decimal {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_factor_band() {
        let model = FixedFactorRangeModel::new(Decimal::new(5, 2), Decimal::new(10, 2));
        let (min, max) = model.price_range(Decimal::new(1000, 0), Decimal::ONE, Decimal::ONE);
        assert_eq!(min, Decimal::new(950, 0));
        assert_eq!(max, Decimal::new(1100, 0));
    }

    #[test]
    fn fixed_target_ignores_inputs() {
        let model = FixedTargetStake(Decimal::new(500, 0));
        assert_eq!(
            model.target_stake(DateTime::<Utc>::UNIX_EPOCH, None),
            Decimal::new(500, 0)
        );
        assert_eq!(
            FixedTargetStake::default().target_stake(DateTime::<Utc>::UNIX_EPOCH, Some(Decimal::ONE)),
            Decimal::ZERO
        );
    }
}
