//! Header statistics derived from the full, unfiltered snapshot.

use serde::Serialize;

use crate::orders::{Order, OrderStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrderStats {
    /// Every order in the snapshot, whatever its status.
    pub total: usize,
    pub active: usize,
    /// Sum of amounts over orders that were not cancelled.
    pub revenue: u64,
}

/// Compute stats over `orders`. Callers pass the whole snapshot, never a
/// tab-filtered view.
pub fn compute(orders: &[Order]) -> OrderStats {
    orders.iter().fold(
        OrderStats {
            total: orders.len(),
            ..OrderStats::default()
        },
        |mut acc, order| {
            match order.status {
                OrderStatus::Active => {
                    acc.active += 1;
                    acc.revenue = acc.revenue.saturating_add(order.amount);
                }
                OrderStatus::Completed => {
                    acc.revenue = acc.revenue.saturating_add(order.amount);
                }
                OrderStatus::Cancelled => {}
            }
            acc
        },
    )
}
