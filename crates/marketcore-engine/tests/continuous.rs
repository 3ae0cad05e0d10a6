//! Integration test: continuous trading
//!
//! Submission, validation, matching and GTT expiry on a market that opens
//! straight into continuous trading.

mod common;

use common::*;
use marketcore_types::*;

fn market() -> marketcore_engine::Market {
    enacted(MarketConfig::continuous("BTC-PERP"))
}

#[test]
fn crossing_orders_trade_at_resting_price() {
    let mut m = market();
    let resting = sell(&mut m, 1, 1000, 5).unwrap();
    assert_eq!(resting.order.status, OrderStatus::Active);
    m.take_events();

    let conf = buy(&mut m, 2, 1000, 5).unwrap();
    assert_eq!(conf.trades.len(), 1);
    let trade = &conf.trades[0];
    assert_eq!(trade.price, dec(1000));
    assert_eq!(trade.size, dec(5));
    assert_eq!(trade.buyer, party(2));
    assert_eq!(trade.seller, party(1));
    assert_eq!(trade.aggressor, Some(Side::Buy));
    assert_eq!(conf.order.status, OrderStatus::Filled);
    assert_eq!(conf.passive_orders_affected[0].status, OrderStatus::Filled);
    assert_eq!(m.order_count(), 0);

    // Aggressor, then trades, then passive orders, then market data.
    let events = m.take_events();
    let kinds: Vec<&str> = events.iter().map(Event::kind).collect();
    assert_eq!(&kinds[..3], &["order", "trade", "order"]);
    assert_eq!(kinds.last(), Some(&"market_data"));
}

#[test]
fn partial_fill_leaves_remainder_resting() {
    let mut m = market();
    sell(&mut m, 1, 1000, 3).unwrap();
    let conf = buy(&mut m, 2, 1005, 5).unwrap();

    assert_eq!(conf.trades.len(), 1);
    assert_eq!(conf.order.status, OrderStatus::Active);
    assert_eq!(conf.order.remaining, dec(2));
    assert_eq!(m.book().best_bid(), Some(dec(1005)));
    assert_eq!(m.book().best_ask(), None);
    assert_eq!(m.market_data().last_traded_price, Some(dec(1000)));
}

#[test]
fn time_priority_within_a_level() {
    let mut m = market();
    let first = sell(&mut m, 1, 1000, 2).unwrap();
    let second = sell(&mut m, 2, 1000, 2).unwrap();

    let conf = buy(&mut m, 3, 1000, 3).unwrap();
    assert_eq!(conf.trades.len(), 2);
    assert_eq!(conf.trades[0].sell_order, first.order.id);
    assert_eq!(conf.trades[0].size, dec(2));
    assert_eq!(conf.trades[1].sell_order, second.order.id);
    assert_eq!(conf.trades[1].size, dec(1));
    assert_eq!(m.get_order(&second.order.id).map(|o| o.remaining), Some(dec(1)));
}

#[test]
fn price_off_tick_is_rejected() {
    let mut m = enacted(MarketConfig::continuous("BTC-PERP").with_tick_size(dec(100)));

    let err = buy(&mut m, 1, 1050, 1).unwrap_err();
    assert!(matches!(err, MarketcoreError::InvalidTickSize { .. }));
    let events = m.take_events();
    let rejected = orders_in(&events);
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].status, OrderStatus::Rejected);
    assert_eq!(m.order_count(), 0);

    let ok = buy(&mut m, 1, 1100, 1).unwrap();
    assert_eq!(ok.order.status, OrderStatus::Active);
    assert_eq!(m.order_count(), 1);
}

#[test]
fn submission_validation() {
    let mut m = market();

    let zero = OrderSubmission::limit(party(1), Side::Buy, dec(1000), dec(0));
    assert!(matches!(
        m.submit_order(zero),
        Err(MarketcoreError::InvalidOrder { .. })
    ));

    let mut priced_market = OrderSubmission::market(party(1), Side::Buy, dec(1), TimeInForce::Ioc);
    priced_market.price = Some(dec(1000));
    assert!(m.submit_order(priced_market).is_err());

    let gtc_market = OrderSubmission::market(party(1), Side::Buy, dec(1), TimeInForce::Gtc);
    assert!(m.submit_order(gtc_market).is_err());

    let gfa = OrderSubmission::limit(party(1), Side::Buy, dec(1000), dec(1))
        .with_time_in_force(TimeInForce::Gfa);
    assert!(matches!(
        m.submit_order(gfa),
        Err(MarketcoreError::TimeInForceNotAllowed { .. })
    ));

    let gtt_past = OrderSubmission::limit(party(1), Side::Buy, dec(1000), dec(1)).with_expiry(t(0));
    assert!(matches!(
        m.submit_order(gtt_past),
        Err(MarketcoreError::InvalidExpiration { .. })
    ));

    let first = buy(&mut m, 1, 1000, 1).unwrap();
    let duplicate =
        OrderSubmission::limit(party(1), Side::Buy, dec(1000), dec(1)).with_id(first.order.id);
    assert!(matches!(
        m.submit_order(duplicate),
        Err(MarketcoreError::DuplicateOrder(_))
    ));
}

#[test]
fn insufficient_funds_rejects() {
    let mut m = market();
    // Party 42 never deposited.
    let err = buy(&mut m, 42, 1000, 1).unwrap_err();
    assert!(matches!(err, MarketcoreError::InsufficientFunds { .. }));
    let events = m.take_events();
    assert_eq!(orders_in(&events)[0].status, OrderStatus::Rejected);
}

#[test]
fn fok_is_all_or_nothing() {
    let mut m = market();
    sell(&mut m, 1, 1000, 3).unwrap();
    sell(&mut m, 2, 1010, 2).unwrap();

    let fok = OrderSubmission::limit(party(3), Side::Buy, dec(1010), dec(10))
        .with_time_in_force(TimeInForce::Fok);
    let conf = m.submit_order(fok).unwrap();
    assert_eq!(conf.order.status, OrderStatus::Stopped);
    assert!(conf.trades.is_empty());
    assert_eq!(m.order_count(), 2);

    let fok = OrderSubmission::limit(party(3), Side::Buy, dec(1010), dec(5))
        .with_time_in_force(TimeInForce::Fok);
    let conf = m.submit_order(fok).unwrap();
    assert_eq!(conf.order.status, OrderStatus::Filled);
    assert_eq!(conf.trades.len(), 2);
    assert_eq!(m.order_count(), 0);
}

#[test]
fn ioc_and_market_orders_never_rest() {
    let mut m = market();
    sell(&mut m, 1, 1000, 2).unwrap();

    let ioc = OrderSubmission::limit(party(2), Side::Buy, dec(1000), dec(5))
        .with_time_in_force(TimeInForce::Ioc);
    let conf = m.submit_order(ioc).unwrap();
    assert_eq!(conf.order.status, OrderStatus::PartiallyFilled);
    assert_eq!(conf.order.remaining, dec(3));
    assert_eq!(m.order_count(), 0);

    let market_order = OrderSubmission::market(party(2), Side::Buy, dec(1), TimeInForce::Ioc);
    let conf = m.submit_order(market_order).unwrap();
    assert_eq!(conf.order.status, OrderStatus::Stopped);
    assert!(conf.trades.is_empty());
}

#[test]
fn own_orders_never_trade() {
    let mut m = market();
    sell(&mut m, 1, 1000, 5).unwrap();
    let conf = buy(&mut m, 1, 1000, 5).unwrap();

    assert!(conf.trades.is_empty());
    assert_eq!(conf.order.status, OrderStatus::Stopped);
    assert_eq!(m.order_count(), 1);
    assert_eq!(m.book().best_bid(), None);
}

#[test]
fn gtt_orders_expire_on_tick() {
    let mut m = market();
    let gtt = OrderSubmission::limit(party(1), Side::Buy, dec(990), dec(1)).with_expiry(t(5));
    let conf = m.submit_order(gtt).unwrap();
    buy(&mut m, 2, 980, 1).unwrap();
    m.take_events();

    m.on_tick(t(4)).unwrap();
    assert!(m.get_order(&conf.order.id).is_some());

    m.on_tick(t(5)).unwrap();
    assert!(m.get_order(&conf.order.id).is_none());
    let events = m.take_events();
    let expired = orders_in(&events);
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].id, conf.order.id);
    assert_eq!(expired[0].status, OrderStatus::Expired);
    assert_eq!(m.book().best_bid(), Some(dec(980)));
}

#[test]
fn ticks_from_the_past_are_ignored() {
    let mut m = market();
    m.on_tick(t(10)).unwrap();
    m.on_tick(t(3)).unwrap();
    assert_eq!(m.now(), t(10));
}

#[test]
fn cancel_checks_ownership() {
    let mut m = market();
    let conf = buy(&mut m, 1, 1000, 1).unwrap();

    assert!(matches!(
        m.cancel_order(&conf.order.id, &party(2)),
        Err(MarketcoreError::PartyMismatch { .. })
    ));
    let cancelled = m.cancel_order(&conf.order.id, &party(1)).unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert!(matches!(
        m.cancel_order(&conf.order.id, &party(1)),
        Err(MarketcoreError::OrderNotFound(_))
    ));
}

#[test]
fn cancel_all_orders_of_a_party() {
    let mut m = market();
    buy(&mut m, 1, 990, 1).unwrap();
    buy(&mut m, 1, 980, 1).unwrap();
    sell(&mut m, 1, 1010, 1).unwrap();
    buy(&mut m, 2, 970, 1).unwrap();

    let cancelled = m.cancel_all_orders(&party(1)).unwrap();
    assert_eq!(cancelled.len(), 3);
    assert!(cancelled.iter().all(|o| o.status == OrderStatus::Cancelled));
    assert_eq!(m.order_count(), 1);
    assert!(m.cancel_all_orders(&party(1)).unwrap().is_empty());
}
