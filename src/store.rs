//! Client-side order snapshot.
//!
//! The store is the single owner of the last fetched order list. Every fetch
//! takes a [`FetchTicket`] before its request is issued, and a response is
//! only applied when its ticket is newer than the one behind the current
//! snapshot. Overlapping fetches therefore cannot regress the view, no matter
//! in which order they complete. Snapshots are replaced wholesale and never
//! patched in place.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::filter::{self, Tab};
use crate::orders::{Order, OrderId};
use crate::stats::{self, OrderStats};

/// Immutable view of the service's order list at one point in time.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Orders in the order the service returned them.
    pub orders: Arc<Vec<Order>>,
    /// Ticket of the fetch that produced `orders`; 0 before the first load.
    pub seq: u64,
    pub fetched_at: Option<DateTime<Utc>>,
    /// Failed polls since the last applied fetch.
    pub consecutive_failures: u32,
}

impl Snapshot {
    /// False until the first successful fetch lands.
    pub fn is_loaded(&self) -> bool {
        self.fetched_at.is_some()
    }

    pub fn stats(&self) -> OrderStats {
        stats::compute(&self.orders)
    }

    pub fn visible(&self, tab: Tab) -> Vec<&Order> {
        filter::visible_orders(&self.orders, tab)
    }

    pub fn get(&self, id: &OrderId) -> Option<&Order> {
        self.orders.iter().find(|o| &o.id == id)
    }
}

/// Sequence number reserved for one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

impl FetchTicket {
    pub fn seq(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// A newer fetch already landed; the response was discarded.
    Stale,
}

pub struct OrderStore {
    next_seq: AtomicU64,
    cell: watch::Sender<Arc<Snapshot>>,
}

impl Default for OrderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderStore {
    pub fn new() -> Self {
        let (cell, _) = watch::channel(Arc::new(Snapshot::default()));
        Self {
            next_seq: AtomicU64::new(0),
            cell,
        }
    }

    /// Reserve the next sequence number. Call before issuing the request.
    pub fn begin_fetch(&self) -> FetchTicket {
        FetchTicket(self.next_seq.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Replace the snapshot with `orders` unless a newer fetch already won.
    pub fn apply(&self, ticket: FetchTicket, orders: Vec<Order>) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::Stale;
        self.cell.send_if_modified(|current| {
            if ticket.0 <= current.seq {
                return false;
            }
            *current = Arc::new(Snapshot {
                orders: Arc::new(orders),
                seq: ticket.0,
                fetched_at: Some(Utc::now()),
                consecutive_failures: 0,
            });
            outcome = ApplyOutcome::Applied;
            true
        });
        outcome
    }

    /// Note a failed fetch. The orders are left as they are; only the failure
    /// counter moves, and only if no newer fetch has landed since.
    pub fn record_failure(&self, ticket: FetchTicket) -> u32 {
        let mut failures = 0;
        self.cell.send_if_modified(|current| {
            failures = current.consecutive_failures;
            if ticket.0 <= current.seq {
                return false;
            }
            let mut next = Snapshot::clone(&**current);
            next.consecutive_failures = next.consecutive_failures.saturating_add(1);
            failures = next.consecutive_failures;
            *current = Arc::new(next);
            true
        });
        failures
    }

    pub fn current(&self) -> Arc<Snapshot> {
        self.cell.borrow().clone()
    }

    /// Receiver that wakes whenever the snapshot is replaced.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.cell.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::OrderStatus;

    fn order(id: &str) -> Order {
        Order::new(id, "97011", 10, OrderStatus::Active)
    }

    #[test]
    fn test_store_starts_unloaded() {
        let store = OrderStore::new();
        let snap = store.current();
        assert!(!snap.is_loaded());
        assert!(snap.orders.is_empty());
        assert_eq!(snap.seq, 0);
    }

    #[test]
    fn test_newer_fetch_replaces_snapshot() {
        let store = OrderStore::new();
        let t1 = store.begin_fetch();
        let t2 = store.begin_fetch();
        assert!(t2 > t1);

        assert_eq!(store.apply(t1, vec![order("1")]), ApplyOutcome::Applied);
        assert_eq!(store.apply(t2, vec![order("1"), order("2")]), ApplyOutcome::Applied);
        let snap = store.current();
        assert!(snap.is_loaded());
        assert_eq!(snap.orders.len(), 2);
        assert_eq!(snap.seq, t2.seq());
    }

    #[test]
    fn test_older_response_landing_late_is_discarded() {
        let store = OrderStore::new();
        let slow = store.begin_fetch();
        let fast = store.begin_fetch();

        assert_eq!(store.apply(fast, vec![order("2")]), ApplyOutcome::Applied);
        assert_eq!(store.apply(slow, vec![order("1")]), ApplyOutcome::Stale);

        let snap = store.current();
        assert_eq!(snap.orders.len(), 1);
        assert_eq!(snap.orders[0].id.as_str(), "2");
    }

    #[test]
    fn test_failure_keeps_orders_and_counts() {
        let store = OrderStore::new();
        let t1 = store.begin_fetch();
        store.apply(t1, vec![order("1")]);

        assert_eq!(store.record_failure(store.begin_fetch()), 1);
        assert_eq!(store.record_failure(store.begin_fetch()), 2);
        let snap = store.current();
        assert_eq!(snap.orders.len(), 1);
        assert_eq!(snap.consecutive_failures, 2);

        store.apply(store.begin_fetch(), vec![]);
        assert_eq!(store.current().consecutive_failures, 0);
    }

    #[test]
    fn test_failure_older_than_snapshot_is_ignored() {
        let store = OrderStore::new();
        let old = store.begin_fetch();
        let new = store.begin_fetch();
        store.apply(new, vec![order("1")]);

        assert_eq!(store.record_failure(old), 0);
        assert_eq!(store.current().consecutive_failures, 0);
    }

    #[test]
    fn test_subscribers_see_replacements() {
        let store = OrderStore::new();
        let mut rx = store.subscribe();
        assert!(!rx.has_changed().unwrap());

        store.apply(store.begin_fetch(), vec![order("7")]);
        assert!(rx.has_changed().unwrap());
        let snap = rx.borrow_and_update().clone();
        assert!(snap.get(&OrderId::new("7")).is_some());

        let stale = FetchTicket(0);
        store.apply(stale, vec![]);
        assert!(!rx.has_changed().unwrap());
    }
}
