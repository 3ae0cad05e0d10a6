//! Price monitoring.
//!
//! Every configured [`PriceMonitoringTrigger`] keeps an independent
//! `[min, max]` band computed by a [`PriceRangeModel`] from a reference
//! price. A prospective trade price outside an *active* band fires that
//! trigger: the trigger goes inactive and contributes its extension. When
//! several triggers fire at once the longest extension wins.
//!
//! Bands stay frozen while any trigger is fired. Before an auction ends its
//! uncrossing price is re-checked against every band, fired or not, and
//! only a reset after a successful uncrossing re-arms them.
//!
//! Without a reference price nothing is out of bounds. The first recorded
//! price becomes the reference; afterwards the bands are refreshed from
//! the latest traded price every `update_frequency_secs`, and reset from
//! the uncrossing price whenever an auction ends.

use chrono::{DateTime, Duration, Utc};
use marketcore_types::{
    PriceMonitoringBounds, PriceMonitoringSettings, PriceMonitoringTrigger, constants,
};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::risk::PriceRangeModel;

pub struct PriceMonitor {
    settings: PriceMonitoringSettings,
    model: Box<dyn PriceRangeModel>,
    /// One entry per trigger, in configuration order. Empty until a
    /// reference price is known.
    bounds: Vec<PriceMonitoringBounds>,
    reference: Option<Decimal>,
    last_price: Option<Decimal>,
    last_update: Option<DateTime<Utc>>,
}

impl std::fmt::Debug for PriceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceMonitor")
            .field("bounds", &self.bounds)
            .field("reference", &self.reference)
            .field("last_price", &self.last_price)
            .finish_non_exhaustive()
    }
}

/// Horizon in seconds as a fraction of a year.
#[must_use]
pub fn year_fraction(horizon_secs: i64) -> Decimal {
    Decimal::from(horizon_secs) / Decimal::from(constants::SECONDS_PER_YEAR)
}

impl PriceMonitor {
    /// Create a monitor, seeding the bands when the settings carry an
    /// initial reference price.
    #[must_use]
    pub fn new(
        settings: PriceMonitoringSettings,
        model: Box<dyn PriceRangeModel>,
        now: DateTime<Utc>,
    ) -> Self {
        let initial = settings.initial_reference_price;
        let mut monitor = Self {
            settings,
            model,
            bounds: Vec::new(),
            reference: None,
            last_price: None,
            last_update: None,
        };
        if let Some(reference) = initial {
            monitor.update_bounds(reference, now);
        }
        monitor
    }

    #[must_use]
    pub fn bounds(&self) -> &[PriceMonitoringBounds] {
        &self.bounds
    }

    #[must_use]
    pub fn reference_price(&self) -> Option<Decimal> {
        self.reference
    }

    /// Recompute every band from `reference`; all triggers become active.
    pub fn update_bounds(&mut self, reference: Decimal, now: DateTime<Utc>) {
        self.bounds = self
            .settings
            .triggers
            .iter()
            .map(|trigger| {
                let (min, max) = self.model.price_range(
                    reference,
                    year_fraction(trigger.horizon_secs),
                    trigger.probability,
                );
                PriceMonitoringBounds {
                    trigger: *trigger,
                    min_valid_price: min,
                    max_valid_price: max,
                    reference_price: reference,
                    active: true,
                }
            })
            .collect();
        self.reference = Some(reference);
        self.last_update = Some(now);
        debug!(reference = %reference, triggers = self.bounds.len(), "price bounds updated");
    }

    /// Reset after an auction: bands from `reference` when given,
    /// otherwise from the current reference, all triggers active again.
    pub fn reset(&mut self, reference: Option<Decimal>, now: DateTime<Utc>) {
        if let Some(reference) = reference.or(self.reference) {
            self.update_bounds(reference, now);
        }
    }

    /// Note a traded price. The first one ever seeds the bands.
    pub fn record_price(&mut self, price: Decimal, now: DateTime<Utc>) {
        self.last_price = Some(price);
        if self.reference.is_none() {
            self.update_bounds(price, now);
        }
    }

    /// Periodic refresh from the latest traded price. Skipped while any
    /// trigger is spent, i.e. during a price auction.
    pub fn on_time_update(&mut self, now: DateTime<Utc>) {
        let (Some(last_update), Some(price)) = (self.last_update, self.last_price) else {
            return;
        };
        if self.bounds.iter().any(|b| !b.active) {
            return;
        }
        if now - last_update >= Duration::seconds(self.settings.update_frequency_secs) {
            self.update_bounds(price, now);
        }
    }

    /// The first active trigger whose band excludes `price`, without
    /// firing it.
    pub fn check_bounds(
        &mut self,
        price: Decimal,
        now: DateTime<Utc>,
    ) -> Option<PriceMonitoringTrigger> {
        self.on_time_update(now);
        self.bounds
            .iter()
            .find(|b| b.active && !b.contains(price))
            .map(|b| b.trigger)
    }

    /// Check a set of prospective prices. Every active trigger violated by
    /// any of them fires (goes inactive); returns the longest extension
    /// among the fired triggers.
    pub fn check_prices(&mut self, prices: &[Decimal], now: DateTime<Utc>) -> Option<Duration> {
        self.on_time_update(now);
        let mut extension: Option<i64> = None;
        for bound in &mut self.bounds {
            if !bound.active {
                continue;
            }
            if let Some(price) = prices.iter().find(|p| !bound.contains(**p)) {
                bound.active = false;
                let secs = bound.trigger.auction_extension_secs;
                extension = Some(extension.map_or(secs, |e| e.max(secs)));
                info!(
                    price = %price,
                    min = %bound.min_valid_price,
                    max = %bound.max_valid_price,
                    horizon = bound.trigger.horizon_secs,
                    extension = secs,
                    "price monitoring trigger fired"
                );
            }
        }
        extension.map(Duration::seconds)
    }

    /// Re-check an auction's uncrossing price against every band, fired
    /// or not. Excluding bands are marked fired; returns the longest
    /// extension among them.
    pub fn check_uncrossing_price(&mut self, price: Decimal) -> Option<Duration> {
        let mut extension: Option<i64> = None;
        for bound in &mut self.bounds {
            if bound.contains(price) {
                continue;
            }
            bound.active = false;
            let secs = bound.trigger.auction_extension_secs;
            extension = Some(extension.map_or(secs, |e| e.max(secs)));
            info!(
                price = %price,
                min = %bound.min_valid_price,
                max = %bound.max_valid_price,
                horizon = bound.trigger.horizon_secs,
                extension = secs,
                "uncrossing price outside bounds"
            );
        }
        extension.map(Duration::seconds)
    }

    /// Whether any trigger could still fire.
    #[must_use]
    pub fn has_active_triggers(&self) -> bool {
        self.bounds.iter().any(|b| b.active)
    }
}
