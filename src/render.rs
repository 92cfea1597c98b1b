//! Plain-text rendering of the dashboard for the console front-end.

use crate::filter::Tab;
use crate::orders::{Customer, Member, Order, OrderId, OrderStatus};
use crate::store::Snapshot;

pub const TITLE: &str = "Counter Dashboard";
const RULE: &str = "----------------------------------------";

/// Header line: title, live indicator and global stats.
pub fn render_header(snapshot: &Snapshot) -> String {
    let live = if snapshot.consecutive_failures == 0 && snapshot.is_loaded() {
        "● Live".to_string()
    } else if snapshot.consecutive_failures > 0 {
        format!("○ Stale ({} failed polls)", snapshot.consecutive_failures)
    } else {
        "○ Connecting".to_string()
    };
    let stats = snapshot.stats();
    format!(
        "{TITLE}   {live}\nTotal Orders: {}   Active: {}   Revenue: ₹{}\n",
        stats.total, stats.active, stats.revenue
    )
}

pub fn render_tabs(selected: Tab) -> String {
    let labels: Vec<String> = Tab::ALL_TABS
        .iter()
        .map(|t| {
            if *t == selected {
                format!("[{}]", t.label())
            } else {
                format!(" {} ", t.label())
            }
        })
        .collect();
    format!("{}\n", labels.join(" "))
}

/// One order card. `completing` replaces the done hint while a completion
/// request is in flight.
pub fn render_card(order: &Order, completing: bool) -> String {
    let badge = match order.customer {
        Customer::Member(_) => "MEMBER",
        Customer::Guest(_) => "GUEST",
    };
    let time = order
        .time
        .map(|t| t.format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string());
    let cancelled = if order.status == OrderStatus::Cancelled {
        "   ✖ CANCELLED"
    } else {
        ""
    };

    let mut out = format!(
        "{badge:<7} {time}   ID: {}{cancelled}\n",
        order.customer.display_id()
    );
    if let Some(items) = &order.items {
        out.push_str(&format!("  {items}\n"));
    }
    out.push_str(&format!("  Amount: ₹{}\n", order.amount));
    out.push_str(&format!("  Type:   {}\n", order.order_type.as_str()));
    if let Some(date) = &order.delivery_date {
        out.push_str(&format!("  Date:   {date}\n"));
    }
    out.push_str(&format!("  Status: {}\n", order.status.as_str()));
    if order.status == OrderStatus::Active {
        if completing {
            out.push_str("  completing...\n");
        } else {
            out.push_str(&format!("  > done {}\n", order.id));
        }
    }
    out
}

/// Full screen: header, tabs and the cards visible under `tab`.
pub fn render_dashboard(
    snapshot: &Snapshot,
    tab: Tab,
    is_completing: impl Fn(&OrderId) -> bool,
) -> String {
    let mut out = render_header(snapshot);
    out.push_str(&render_tabs(tab));
    out.push_str(RULE);
    out.push('\n');

    if !snapshot.is_loaded() {
        out.push_str("Loading orders...\n");
        return out;
    }

    let visible = snapshot.visible(tab);
    if visible.is_empty() {
        out.push_str("No orders found in this category.\n");
        return out;
    }
    for order in visible {
        out.push_str(&render_card(order, is_completing(&order.id)));
        out.push_str(RULE);
        out.push('\n');
    }
    out
}

pub fn render_members(members: &[Member]) -> String {
    if members.is_empty() {
        return "No members registered.\n".to_string();
    }
    members
        .iter()
        .map(|m| {
            format!(
                "{:<10} {:<24} {} coins\n",
                m.member_id,
                m.name.as_deref().unwrap_or("-"),
                m.coins
            )
        })
        .collect()
}
