//! Integration test: auctions
//!
//! Opening auction → uncrossing → continuous, extensions, and
//! price-monitoring auctions triggered from both modes.

mod common;

use common::*;
use marketcore_engine::{Collaborators, Market, PriceRangeModel, year_fraction};
use marketcore_types::*;
use rust_decimal::Decimal;

/// Valid prices are always `[590, 611]`.
struct NarrowBand;

impl PriceRangeModel for NarrowBand {
    fn price_range(&self, _price: Decimal, _yf: Decimal, _p: Decimal) -> (Decimal, Decimal) {
        (dec(590), dec(611))
    }
}

fn monitored(config: MarketConfig) -> Market {
    init_tracing();
    let settings = PriceMonitoringSettings {
        triggers: vec![PriceMonitoringTrigger {
            horizon_secs: 60,
            probability: Decimal::new(95, 2),
            auction_extension_secs: 30,
        }],
        update_frequency_secs: 60,
        initial_reference_price: Some(dec(600)),
    };
    let collaborators = Collaborators::new(funded_collateral(10)).with_price_range(NarrowBand);
    let mut market = Market::new(config.with_price_monitoring(settings), collaborators, t(0));
    market.enact(t(0)).unwrap();
    market.take_events();
    market
}

#[test]
fn opening_auction_uncrosses_into_continuous() {
    let mut m = enacted(MarketConfig::new("BTC-PERP").with_opening_auction(10));
    assert_eq!(m.state(), MarketState::Pending);
    assert_eq!(m.trading_mode(), TradingMode::OpeningAuction);

    let bid = buy(&mut m, 1, 1000, 5).unwrap();
    let ask = sell(&mut m, 2, 1000, 5).unwrap();
    assert!(bid.trades.is_empty() && ask.trades.is_empty());
    assert_eq!(m.order_count(), 2);

    let data = m.market_data();
    assert_eq!(data.indicative_price, Some(dec(1000)));
    assert_eq!(data.indicative_volume, dec(5));

    m.on_tick(t(5)).unwrap();
    assert_eq!(m.state(), MarketState::Pending);

    m.take_events();
    m.on_tick(t(10)).unwrap();
    assert_eq!(m.state(), MarketState::Active);
    assert_eq!(m.trading_mode(), TradingMode::Continuous);
    assert_eq!(m.order_count(), 0);

    let events = m.take_events();
    let trades = trades_in(&events);
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].price, dec(1000));
    assert_eq!(trades[0].trade_type, TradeType::Auction);
    assert_eq!(trades[0].aggressor, None);

    let leaving = auctions_in(&events);
    assert_eq!(leaving.len(), 1);
    assert!(leaving[0].leave);
    assert!(leaving[0].opening_auction);
    assert_eq!(m.market_data().mark_price, Some(dec(1000)));
}

#[test]
fn auction_rejects_non_persistent_time_in_force() {
    let mut m = enacted(MarketConfig::new("BTC-PERP").with_opening_auction(10));
    for tif in [TimeInForce::Ioc, TimeInForce::Fok, TimeInForce::Gfn] {
        let sub = OrderSubmission::limit(party(1), Side::Buy, dec(1000), dec(1))
            .with_time_in_force(tif);
        assert!(matches!(
            m.submit_order(sub),
            Err(MarketcoreError::TimeInForceNotAllowed { .. })
        ));
    }
    let gfa = OrderSubmission::limit(party(1), Side::Buy, dec(1000), dec(1))
        .with_time_in_force(TimeInForce::Gfa);
    assert!(m.submit_order(gfa).is_ok());
}

#[test]
fn gfa_orders_cancelled_when_auction_ends() {
    let mut m = enacted(MarketConfig::new("BTC-PERP").with_opening_auction(10));
    buy(&mut m, 1, 1000, 1).unwrap();
    sell(&mut m, 2, 1000, 1).unwrap();
    let gfa = OrderSubmission::limit(party(3), Side::Buy, dec(900), dec(1))
        .with_time_in_force(TimeInForce::Gfa);
    let gfa = m.submit_order(gfa).unwrap();
    m.take_events();

    m.on_tick(t(10)).unwrap();
    assert_eq!(m.trading_mode(), TradingMode::Continuous);
    assert!(m.get_order(&gfa.order.id).is_none());
    let events = m.take_events();
    assert!(
        orders_in(&events)
            .iter()
            .any(|o| o.id == gfa.order.id && o.status == OrderStatus::Cancelled)
    );
}

#[test]
fn opening_auction_without_uncrossing_price_extends() {
    let mut m = enacted(MarketConfig::new("BTC-PERP").with_opening_auction(10));
    buy(&mut m, 1, 990, 1).unwrap();
    sell(&mut m, 2, 1010, 1).unwrap();
    m.take_events();

    let mut ends = Vec::new();
    for secs in 10..16 {
        m.on_tick(t(secs)).unwrap();
        assert_eq!(m.state(), MarketState::Pending);
        ends.extend(auctions_in(&m.take_events()).iter().filter_map(|a| a.end));
    }
    assert_eq!(m.auction_end(), Some(t(16)));
    assert_eq!(
        m.market_data().extension_trigger,
        Some(AuctionTrigger::Opening)
    );
    assert!(!ends.is_empty());
    assert!(ends.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn opening_price_out_of_bounds_becomes_price_auction() {
    let mut m = monitored(MarketConfig::new("BTC-PERP").with_opening_auction(10));
    let bid = buy(&mut m, 1, 650, 1).unwrap().order.id;
    let ask = sell(&mut m, 2, 650, 1).unwrap().order.id;

    m.on_tick(t(10)).unwrap();
    assert_eq!(m.state(), MarketState::Suspended);
    assert_eq!(m.trading_mode(), TradingMode::MonitoringAuction);
    assert_eq!(m.market_data().trigger, AuctionTrigger::Price);
    assert_eq!(m.auction_end(), Some(t(40)));
    assert_eq!(m.order_count(), 2);
    m.take_events();

    // Still outside [590, 611] when the auction is due to end.
    m.on_tick(t(40)).unwrap();
    assert_eq!(m.state(), MarketState::Suspended);
    assert_eq!(m.auction_end(), Some(t(70)));
    assert!(trades_in(&m.take_events()).is_empty());
    assert_eq!(m.market_data().mark_price, None);

    // Only an in-bounds uncrossing price lets the market open.
    m.cancel_order(&bid, &party(1)).unwrap();
    m.cancel_order(&ask, &party(2)).unwrap();
    buy(&mut m, 3, 600, 1).unwrap();
    sell(&mut m, 4, 600, 1).unwrap();
    m.on_tick(t(70)).unwrap();
    assert_eq!(m.state(), MarketState::Active);
    assert_eq!(m.trading_mode(), TradingMode::Continuous);
    assert_eq!(m.market_data().mark_price, Some(dec(600)));
}

#[test]
fn trade_within_bounds_stays_continuous() {
    let mut m = monitored(MarketConfig::continuous("BTC-PERP"));
    sell(&mut m, 1, 600, 1).unwrap();
    let conf = buy(&mut m, 2, 600, 1).unwrap();
    assert_eq!(conf.trades.len(), 1);
    assert_eq!(m.trading_mode(), TradingMode::Continuous);
}

#[test]
fn breach_in_continuous_starts_price_auction() {
    let mut m = monitored(MarketConfig::continuous("BTC-PERP"));
    sell(&mut m, 1, 650, 1).unwrap();
    m.take_events();

    let conf = buy(&mut m, 2, 650, 1).unwrap();
    assert!(conf.trades.is_empty());
    assert_eq!(conf.order.status, OrderStatus::Active);
    assert_eq!(m.state(), MarketState::Suspended);
    assert_eq!(m.trading_mode(), TradingMode::MonitoringAuction);
    assert_eq!(m.auction_end(), Some(t(30)));
    assert_eq!(m.order_count(), 2);

    let events = m.take_events();
    let started = auctions_in(&events);
    assert_eq!(started.len(), 1);
    assert!(!started[0].leave);
    assert_eq!(started[0].trigger, AuctionTrigger::Price);

    m.on_tick(t(29)).unwrap();
    assert_eq!(m.state(), MarketState::Suspended);

    // 650 is still out of bounds: extend rather than trade.
    m.on_tick(t(30)).unwrap();
    assert_eq!(m.state(), MarketState::Suspended);
    assert_eq!(m.auction_end(), Some(t(60)));
    assert_eq!(m.market_data().extension_trigger, Some(AuctionTrigger::Price));
    let events = m.take_events();
    assert!(trades_in(&events).is_empty());
    assert!(auctions_in(&events).iter().all(|a| !a.leave));

    let mut ends = vec![t(30)];
    for secs in [60, 90, 120] {
        m.on_tick(t(secs)).unwrap();
        assert_eq!(m.state(), MarketState::Suspended);
        ends.extend(m.auction_end());
    }
    assert!(ends.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn breaching_ioc_is_rejected() {
    let mut m = monitored(MarketConfig::continuous("BTC-PERP"));
    sell(&mut m, 1, 650, 1).unwrap();
    m.take_events();

    let ioc = OrderSubmission::limit(party(2), Side::Buy, dec(650), dec(1))
        .with_time_in_force(TimeInForce::Ioc);
    assert!(matches!(
        m.submit_order(ioc),
        Err(MarketcoreError::NonPersistentOrderOutOfBounds)
    ));
    assert_eq!(m.trading_mode(), TradingMode::MonitoringAuction);
    let events = m.take_events();
    assert!(
        orders_in(&events)
            .iter()
            .any(|o| o.status == OrderStatus::Rejected)
    );
}

/// `[590, 611]` up to a one-minute horizon, `[500, 700]` beyond.
struct TieredBands;

impl PriceRangeModel for TieredBands {
    fn price_range(&self, _price: Decimal, yf: Decimal, _p: Decimal) -> (Decimal, Decimal) {
        if yf <= year_fraction(60) {
            (dec(590), dec(611))
        } else {
            (dec(500), dec(700))
        }
    }
}

/// Two triggers: one-minute horizon extending 30s, five-minute horizon
/// extending 90s.
fn two_triggers() -> Market {
    init_tracing();
    let trigger = |horizon_secs, auction_extension_secs| PriceMonitoringTrigger {
        horizon_secs,
        probability: Decimal::new(95, 2),
        auction_extension_secs,
    };
    let settings = PriceMonitoringSettings {
        triggers: vec![trigger(60, 30), trigger(300, 90)],
        update_frequency_secs: 60,
        initial_reference_price: Some(dec(600)),
    };
    let collaborators = Collaborators::new(funded_collateral(10)).with_price_range(TieredBands);
    let config = MarketConfig::continuous("BTC-PERP").with_price_monitoring(settings);
    let mut market = Market::new(config, collaborators, t(0));
    market.enact(t(0)).unwrap();
    market.take_events();
    market
}

#[test]
fn simultaneous_breaches_take_the_longest_extension() {
    let mut m = two_triggers();
    sell(&mut m, 1, 720, 1).unwrap();
    buy(&mut m, 2, 720, 1).unwrap();
    assert_eq!(m.state(), MarketState::Suspended);
    assert_eq!(m.auction_end(), Some(t(90)));
}

#[test]
fn second_breach_in_the_same_auction_extends_to_the_later_end() {
    let mut m = two_triggers();
    let ask = sell(&mut m, 1, 650, 1).unwrap().order.id;
    let bid = buy(&mut m, 2, 650, 1).unwrap().order.id;
    // Only the one-minute band is breached.
    assert_eq!(m.auction_end(), Some(t(30)));

    m.cancel_order(&ask, &party(1)).unwrap();
    m.cancel_order(&bid, &party(2)).unwrap();
    sell(&mut m, 3, 720, 1).unwrap();
    buy(&mut m, 4, 720, 1).unwrap();

    // 720 is outside both bands: max(30s, 90s) from now.
    m.on_tick(t(30)).unwrap();
    assert_eq!(m.state(), MarketState::Suspended);
    assert_eq!(m.auction_end(), Some(t(120)));
}

#[test]
fn gfn_orders_cancelled_when_auction_starts() {
    let mut m = monitored(MarketConfig::continuous("BTC-PERP"));
    let gfn = OrderSubmission::limit(party(3), Side::Buy, dec(595), dec(1))
        .with_time_in_force(TimeInForce::Gfn);
    let gfn = m.submit_order(gfn).unwrap().order.id;
    let gtc = buy(&mut m, 4, 596, 1).unwrap().order.id;
    sell(&mut m, 1, 650, 1).unwrap();
    m.take_events();

    buy(&mut m, 2, 650, 1).unwrap();
    assert_eq!(m.state(), MarketState::Suspended);
    assert!(m.get_order(&gfn).is_none());
    assert!(m.get_order(&gtc).is_some());
    let events = m.take_events();
    assert!(
        orders_in(&events)
            .iter()
            .any(|o| o.id == gfn && o.status == OrderStatus::Cancelled)
    );
}

#[test]
fn auction_only_time_in_force_cannot_be_amended_away() {
    let mut m = enacted(MarketConfig::new("BTC-PERP").with_opening_auction(10));
    let gfa = OrderSubmission::limit(party(1), Side::Buy, dec(1000), dec(1))
        .with_time_in_force(TimeInForce::Gfa);
    let gfa = m.submit_order(gfa).unwrap().order.id;
    let to_gtc = OrderAmendment {
        time_in_force: Some(TimeInForce::Gtc),
        ..OrderAmendment::new(gfa, party(1))
    };
    assert!(matches!(
        m.amend_order(to_gtc),
        Err(MarketcoreError::CannotAmendTimeInForce {
            from: TimeInForce::Gfa,
            to: TimeInForce::Gtc
        })
    ));

    let mut m = enacted(MarketConfig::continuous("BTC-PERP"));
    let gfn = OrderSubmission::limit(party(1), Side::Buy, dec(1000), dec(1))
        .with_time_in_force(TimeInForce::Gfn);
    let gfn = m.submit_order(gfn).unwrap().order.id;
    let to_gtt = OrderAmendment {
        time_in_force: Some(TimeInForce::Gtt),
        expires_at: Some(t(50)),
        ..OrderAmendment::new(gfn, party(1))
    };
    assert!(matches!(
        m.amend_order(to_gtt),
        Err(MarketcoreError::CannotAmendTimeInForce { .. })
    ));
    assert_eq!(
        m.get_order(&gfn).map(|o| o.time_in_force),
        Some(TimeInForce::Gfn)
    );
}
