//! Expiry index for GTT orders.
//!
//! Orders are keyed by `(expires_at, sequence)` so that orders expiring at
//! the same instant come out in the order they were registered.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use marketcore_types::OrderId;

#[derive(Debug, Default)]
pub struct ExpiringOrders {
    queue: BTreeSet<(DateTime<Utc>, u64, OrderId)>,
    index: HashMap<OrderId, (DateTime<Utc>, u64)>,
    next_sequence: u64,
}

impl ExpiringOrders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `order_id` to expire at `at`, replacing any earlier entry.
    pub fn insert(&mut self, order_id: OrderId, at: DateTime<Utc>) {
        self.remove(&order_id);
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.queue.insert((at, sequence, order_id));
        self.index.insert(order_id, (at, sequence));
    }

    /// Returns whether the order was registered.
    pub fn remove(&mut self, order_id: &OrderId) -> bool {
        match self.index.remove(order_id) {
            Some((at, sequence)) => self.queue.remove(&(at, sequence, *order_id)),
            None => false,
        }
    }

    /// Remove and return every order with `expires_at <= now`, earliest
    /// first.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<OrderId> {
        let mut expired = Vec::new();
        while let Some(&(at, sequence, id)) = self.queue.first() {
            if at > now {
                break;
            }
            self.queue.remove(&(at, sequence, id));
            self.index.remove(&id);
            expired.push(id);
        }
        expired
    }

    #[must_use]
    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.index.contains_key(order_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(secs)
    }

    fn id(n: u8) -> OrderId {
        OrderId::from_bytes([n; 16])
    }

    #[test]
    fn expires_in_time_then_registration_order() {
        let mut expiring = ExpiringOrders::new();
        expiring.insert(id(3), t(20));
        expiring.insert(id(1), t(10));
        expiring.insert(id(2), t(10));

        assert!(expiring.expire(t(9)).is_empty());
        assert_eq!(expiring.expire(t(10)), vec![id(1), id(2)]);
        assert_eq!(expiring.len(), 1);
        assert_eq!(expiring.expire(t(100)), vec![id(3)]);
        assert!(expiring.is_empty());
    }

    #[test]
    fn reinsert_moves_entry() {
        let mut expiring = ExpiringOrders::new();
        expiring.insert(id(1), t(10));
        expiring.insert(id(1), t(30));
        assert_eq!(expiring.len(), 1);
        assert!(expiring.expire(t(20)).is_empty());
        assert_eq!(expiring.expire(t(30)), vec![id(1)]);
    }

    #[test]
    fn removed_orders_never_expire() {
        let mut expiring = ExpiringOrders::new();
        expiring.insert(id(1), t(10));
        assert!(expiring.remove(&id(1)));
        assert!(!expiring.remove(&id(1)));
        assert!(!expiring.contains(&id(1)));
        assert!(expiring.expire(t(10)).is_empty());
    }
}
