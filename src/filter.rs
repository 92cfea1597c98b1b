//! Tab filtering for the staff-facing order list.

use std::fmt;
use std::str::FromStr;

use crate::orders::{CustomerKind, Order, OrderStatus};

/// Tab selected above the order grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tab {
    #[default]
    All,
    Member,
    NonMember,
}

impl Tab {
    pub const ALL_TABS: [Tab; 3] = [Tab::All, Tab::Member, Tab::NonMember];

    pub fn label(self) -> &'static str {
        match self {
            Tab::All => "ALL",
            Tab::Member => "MEMBER",
            Tab::NonMember => "NON-MEMBER",
        }
    }

    fn admits(self, order: &Order) -> bool {
        match self {
            Tab::All => true,
            Tab::Member => order.customer.kind() == CustomerKind::Member,
            Tab::NonMember => order.customer.kind() == CustomerKind::Guest,
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Tab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALL" => Ok(Tab::All),
            "MEMBER" | "MEMBERS" => Ok(Tab::Member),
            "NON-MEMBER" | "NONMEMBER" | "GUEST" | "GUESTS" => Ok(Tab::NonMember),
            other => Err(format!("Unknown tab: {other}")),
        }
    }
}

/// Orders shown under `tab`, in snapshot order. Completed orders are archived
/// out of every tab; cancelled ones stay visible.
pub fn visible_orders(orders: &[Order], tab: Tab) -> Vec<&Order> {
    orders
        .iter()
        .filter(|o| o.status != OrderStatus::Completed)
        .filter(|o| tab.admits(o))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Order> {
        vec![
            Order::new("1", "97011", 100, OrderStatus::Active),
            Order::new("2", "Guest-1234", 50, OrderStatus::Cancelled),
            Order::new("3", "NON-MEMBER", 200, OrderStatus::Completed),
            Order::new("4", "NON-MEMBER", 80, OrderStatus::Active),
            Order::new("5", "77452", 30, OrderStatus::Completed),
            Order::new("6", "", 10, OrderStatus::Active),
        ]
    }

    fn ids(orders: &[&Order]) -> Vec<String> {
        orders.iter().map(|o| o.id.to_string()).collect()
    }

    #[test]
    fn test_all_tab_drops_completed_and_keeps_order() {
        let orders = sample();
        assert_eq!(ids(&visible_orders(&orders, Tab::All)), ["1", "2", "4", "6"]);
    }

    #[test]
    fn test_member_and_guest_tabs() {
        let orders = sample();
        assert_eq!(ids(&visible_orders(&orders, Tab::Member)), ["1", "6"]);
        assert_eq!(ids(&visible_orders(&orders, Tab::NonMember)), ["2", "4"]);
    }

    #[test]
    fn test_tabs_partition_the_all_tab() {
        let orders = sample();
        let all = ids(&visible_orders(&orders, Tab::All));
        let members = ids(&visible_orders(&orders, Tab::Member));
        let guests = ids(&visible_orders(&orders, Tab::NonMember));

        assert!(members.iter().all(|id| !guests.contains(id)));
        let mut union: Vec<String> = members.into_iter().chain(guests).collect();
        union.sort();
        let mut expected = all;
        expected.sort();
        assert_eq!(union, expected);
    }

    #[test]
    fn test_no_tab_shows_completed_orders() {
        let orders = sample();
        for tab in Tab::ALL_TABS {
            assert!(visible_orders(&orders, tab)
                .iter()
                .all(|o| o.status != OrderStatus::Completed));
        }
    }

    #[test]
    fn test_tab_from_str() {
        assert_eq!("member".parse::<Tab>(), Ok(Tab::Member));
        assert_eq!("NON-MEMBER".parse::<Tab>(), Ok(Tab::NonMember));
        assert_eq!("guest".parse::<Tab>(), Ok(Tab::NonMember));
        assert!("vip".parse::<Tab>().is_err());
    }
}
