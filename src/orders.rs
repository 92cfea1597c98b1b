//! Order model as delivered by the order service.
//!
//! Wire records are decoded once into [`Order`]; the member/guest split is
//! resolved at that point into [`Customer`] so render and filter code never
//! re-inspect the raw `member_id` string.

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentinel `member_id` the dashboard submits for walk-in customers.
pub const NON_MEMBER: &str = "NON-MEMBER";
/// Prefix the service gives to the generated token of a guest order.
pub const GUEST_PREFIX: &str = "Guest-";

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// JSON scalar that may arrive as either a number or a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Number(serde_json::Number),
    Text(String),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Number(n) => n.to_string(),
            Scalar::Text(s) => s,
        }
    }
}

/// Opaque, service-assigned order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for OrderId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Scalar::deserialize(deserializer).map(|s| OrderId(s.into_text()))
    }
}

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Active,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Active => "Active",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

/// Fulfillment mode chosen when the order is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OrderType {
    #[default]
    Immediate,
    Takeaway,
    #[serde(rename = "Pre-order")]
    PreOrder,
}

impl OrderType {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderType::Immediate => "Immediate",
            OrderType::Takeaway => "Takeaway",
            OrderType::PreOrder => "Pre-order",
        }
    }

    /// Only immediate orders are served on the spot; the others may carry a
    /// delivery date.
    pub fn is_immediate(self) -> bool {
        matches!(self, OrderType::Immediate)
    }
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "immediate" | "dine-in" | "dinein" => Ok(OrderType::Immediate),
            "takeaway" | "take-away" => Ok(OrderType::Takeaway),
            "pre-order" | "preorder" => Ok(OrderType::PreOrder),
            other => Err(format!("Unknown order type: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CustomerKind {
    Member,
    Guest,
}

/// Exact, case-sensitive classification of a raw `member_id`.
///
/// Anything that is not the `NON-MEMBER` sentinel or a `Guest-` token is a
/// member, including the empty string.
pub fn classify(member_id: &str) -> CustomerKind {
    if member_id == NON_MEMBER || member_id.starts_with(GUEST_PREFIX) {
        CustomerKind::Guest
    } else {
        CustomerKind::Member
    }
}

/// Who an order belongs to, resolved once when the order is decoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Customer {
    /// Member identifier as entered at the counter.
    Member(String),
    /// Guest display token: the part after the first `-` of a `Guest-<token>`
    /// value, or the literal sentinel for `NON-MEMBER`.
    Guest(String),
}

impl Customer {
    pub fn from_member_id(member_id: &str) -> Self {
        match classify(member_id) {
            CustomerKind::Member => Customer::Member(member_id.to_string()),
            CustomerKind::Guest => {
                let token = match member_id.split_once('-') {
                    Some((_, rest)) if member_id.starts_with(GUEST_PREFIX) => rest,
                    _ => member_id,
                };
                Customer::Guest(token.to_string())
            }
        }
    }

    pub fn kind(&self) -> CustomerKind {
        match self {
            Customer::Member(_) => CustomerKind::Member,
            Customer::Guest(_) => CustomerKind::Guest,
        }
    }

    pub fn is_guest(&self) -> bool {
        self.kind() == CustomerKind::Guest
    }

    /// Identifier shown on the order card.
    pub fn display_id(&self) -> &str {
        match self {
            Customer::Member(id) | Customer::Guest(id) => id,
        }
    }
}

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// One order as last reported by the service. Snapshots hold these by value
/// and never mutate them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "WireOrder")]
pub struct Order {
    pub id: OrderId,
    pub member_id: String,
    pub customer: Customer,
    pub amount: u64,
    pub items: Option<String>,
    pub order_type: OrderType,
    pub delivery_date: Option<String>,
    pub status: OrderStatus,
    pub time: Option<NaiveDateTime>,
}

impl Order {
    /// Minimal order with the given identity, amount and status.
    pub fn new(id: impl Into<String>, member_id: &str, amount: u64, status: OrderStatus) -> Self {
        Self {
            id: OrderId::new(id),
            member_id: member_id.to_string(),
            customer: Customer::from_member_id(member_id),
            amount,
            items: None,
            order_type: OrderType::Immediate,
            delivery_date: None,
            status,
            time: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == OrderStatus::Active
    }
}

#[derive(Deserialize)]
struct WireOrder {
    id: OrderId,
    #[serde(default, deserialize_with = "text_or_empty")]
    member_id: String,
    #[serde(default)]
    amount: Option<u64>,
    #[serde(default)]
    items: Option<String>,
    #[serde(rename = "type", default)]
    order_type: OrderType,
    #[serde(default, alias = "delivery_date_str")]
    delivery_date: Option<String>,
    status: OrderStatus,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    time: Option<NaiveDateTime>,
}

impl From<WireOrder> for Order {
    fn from(w: WireOrder) -> Self {
        let customer = Customer::from_member_id(&w.member_id);
        Self {
            id: w.id,
            member_id: w.member_id,
            customer,
            amount: w.amount.unwrap_or(0),
            items: w.items.filter(|s| !s.is_empty()),
            order_type: w.order_type,
            delivery_date: w.delivery_date.filter(|s| !s.is_empty()),
            status: w.status,
            time: w.time,
        }
    }
}

fn text_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<Scalar>::deserialize(deserializer)?
        .map(Scalar::into_text)
        .unwrap_or_default())
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<NaiveDateTime>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.and_then(|raw| parse_timestamp(&raw)))
}

/// Parse the timestamp formats the service emits: ISO-8601 (with or without
/// offset) and the SQLite `YYYY-MM-DD HH:MM:SS.ffffff` form.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

// ---------------------------------------------------------------------------
// Members and requests
// ---------------------------------------------------------------------------

/// A registered member and their coin balance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Member {
    #[serde(deserialize_with = "text_or_empty")]
    pub member_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub coins: i64,
}

/// Body of `POST /place-order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaceOrderRequest {
    pub member_id: String,
    pub amount: u64,
    pub items: String,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_date: Option<String>,
}
