//! In-process order service.
//!
//! Mirrors the order service's behaviour closely enough to run the dashboard
//! without a backend (demo mode) and to drive the synchronizer and controller
//! in tests: seeded members with coin balances, balance checks on member
//! orders, `Guest-NNNN` tokens for walk-ins, newest-first listing.

use chrono::Local;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::api::OrderService;
use crate::error::ApiError;
use crate::orders::{Member, Order, OrderId, OrderStatus, PlaceOrderRequest, GUEST_PREFIX};

const OFFLINE_URL: &str = "memory://orders";

/// Count of requests that reached the service, per endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestCounts {
    pub list_orders: usize,
    pub place_order: usize,
    pub complete_order: usize,
}

#[derive(Default)]
struct MemoryState {
    orders: Vec<Order>,
    members: BTreeMap<String, Member>,
    next_id: u64,
}

#[derive(Default)]
pub struct MemoryOrderService {
    state: Mutex<MemoryState>,
    offline: AtomicBool,
    list_delay_ms: AtomicUsize,
    list_calls: AtomicUsize,
    place_calls: AtomicUsize,
    complete_calls: AtomicUsize,
}

impl MemoryOrderService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Service preloaded with the two demo members.
    pub fn with_demo_members() -> Self {
        let svc = Self::new();
        svc.add_member("97011", "Demo Member", 1500);
        svc.add_member("77452", "Demo Member 2", 1500);
        svc
    }

    pub fn add_member(&self, member_id: &str, name: &str, coins: i64) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.members.insert(
            member_id.to_string(),
            Member {
                member_id: member_id.to_string(),
                name: Some(name.to_string()),
                coins,
            },
        );
    }

    pub fn member_coins(&self, member_id: &str) -> Option<i64> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.members.get(member_id).map(|m| m.coins)
    }

    /// Make every subsequent request fail as if the service were down.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Delay applied to each `list_orders` call.
    pub fn set_list_delay(&self, delay: Duration) {
        self.list_delay_ms
            .store(delay.as_millis() as usize, Ordering::SeqCst);
    }

    pub fn request_counts(&self) -> RequestCounts {
        RequestCounts {
            list_orders: self.list_calls.load(Ordering::SeqCst),
            place_order: self.place_calls.load(Ordering::SeqCst),
            complete_order: self.complete_calls.load(Ordering::SeqCst),
        }
    }

    /// Cancel an active order, refunding a member's coins. The HTTP service
    /// has no cancel endpoint; orders are cancelled through the ordering bot.
    #[cfg(test)]
    pub fn cancel_order(&self, id: &OrderId) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let (member_id, amount) = match state.orders.iter_mut().find(|o| &o.id == id) {
            Some(order) if order.status == OrderStatus::Active => {
                order.status = OrderStatus::Cancelled;
                (order.member_id.clone(), order.amount)
            }
            _ => return Err(rejected("Failed to cancel order")),
        };
        if let Some(member) = state.members.get_mut(&member_id) {
            let refund = i64::try_from(amount).unwrap_or(i64::MAX);
            member.coins = member.coins.saturating_add(refund);
        }
        info!(order_id = %id, refund = amount, "order cancelled");
        Ok(())
    }

    fn check_online(&self) -> Result<(), ApiError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ApiError::Unreachable(OFFLINE_URL.to_string()));
        }
        Ok(())
    }
}

fn rejected(detail: &str) -> ApiError {
    ApiError::Status {
        status: 400,
        detail: detail.to_string(),
    }
}

fn guest_token() -> u32 {
    1000 + (Uuid::new_v4().as_u128() % 9000) as u32
}

fn order_json(order: &Order) -> Value {
    serde_json::json!({
        "id": order.id,
        "member_id": order.member_id,
        "amount": order.amount,
        "items": order.items,
        "type": order.order_type,
        "time": order.time.map(|t| t.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()),
        "delivery_date": order.delivery_date,
        "status": order.status,
    })
}

impl OrderService for MemoryOrderService {
    async fn list_orders(&self) -> Result<Vec<Order>, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.list_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        self.check_online()?;
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.orders.iter().rev().cloned().collect())
    }

    async fn place_order(&self, request: &PlaceOrderRequest) -> Result<Value, ApiError> {
        self.place_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let is_member =
            !request.member_id.is_empty() && request.member_id.to_lowercase() != "non-member";

        let member_id = if is_member {
            let balance = state
                .members
                .get(&request.member_id)
                .map(|m| m.coins)
                .unwrap_or(0);
            let remaining = i64::try_from(request.amount)
                .ok()
                .and_then(|amount| balance.checked_sub(amount))
                .filter(|left| *left >= 0);
            let Some(remaining) = remaining else {
                debug!(member_id = %request.member_id, balance, amount = request.amount, "insufficient balance");
                return Err(rejected("Insufficient member balance"));
            };
            if let Some(member) = state.members.get_mut(&request.member_id) {
                member.coins = remaining;
            }
            request.member_id.clone()
        } else {
            format!("{GUEST_PREFIX}{}", guest_token())
        };

        state.next_id += 1;
        let mut order = Order::new(
            state.next_id.to_string(),
            &member_id,
            request.amount,
            OrderStatus::Active,
        );
        order.items = Some(request.items.clone());
        order.order_type = request.order_type;
        order.delivery_date = request.delivery_date.clone();
        order.time = Some(Local::now().naive_local());

        let body = serde_json::json!({ "status": "Order Placed", "order": order_json(&order) });
        info!(order_id = %order.id, member_id = %order.member_id, amount = order.amount, "order placed");
        state.orders.push(order);
        Ok(body)
    }

    async fn complete_order(&self, id: &OrderId) -> Result<(), ApiError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match state.orders.iter_mut().find(|o| &o.id == id) {
            Some(order) => match order.status {
                OrderStatus::Active => {
                    order.status = OrderStatus::Completed;
                    Ok(())
                }
                OrderStatus::Completed => Ok(()),
                OrderStatus::Cancelled => Err(rejected("Order is cancelled")),
            },
            None => Err(rejected("Failed to complete order")),
        }
    }

    async fn list_members(&self) -> Result<Vec<Member>, ApiError> {
        self.check_online()?;
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.members.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::{CustomerKind, OrderType, NON_MEMBER};

    fn request(member_id: &str, amount: u64) -> PlaceOrderRequest {
        PlaceOrderRequest {
            member_id: member_id.into(),
            amount,
            items: "2x Salad".into(),
            order_type: OrderType::Takeaway,
            delivery_date: None,
        }
    }

    #[tokio::test]
    async fn test_member_order_deducts_coins() {
        let svc = MemoryOrderService::with_demo_members();
        let body = svc.place_order(&request("97011", 400)).await.unwrap();
        assert_eq!(body["status"], "Order Placed");
        assert_eq!(body["order"]["member_id"], "97011");
        assert_eq!(svc.member_coins("97011"), Some(1100));
    }

    #[tokio::test]
    async fn test_member_order_rejected_on_insufficient_balance() {
        let svc = MemoryOrderService::with_demo_members();
        let err = svc.place_order(&request("97011", 5000)).await.unwrap_err();
        assert_eq!(err, rejected("Insufficient member balance"));
        // Unknown members have no balance at all.
        assert!(svc.place_order(&request("12345", 1)).await.is_err());
        assert!(svc.list_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_guest_order_gets_guest_token() {
        let svc = MemoryOrderService::new();
        svc.place_order(&request(NON_MEMBER, 80)).await.unwrap();
        let orders = svc.list_orders().await.unwrap();
        assert_eq!(orders.len(), 1);
        assert!(orders[0].member_id.starts_with("Guest-"));
        assert_eq!(orders[0].customer.kind(), CustomerKind::Guest);
        let token: u32 = orders[0].customer.display_id().parse().unwrap();
        assert!((1000..10000).contains(&token));
    }

    #[tokio::test]
    async fn test_listing_is_newest_first_and_complete_is_idempotent() {
        let svc = MemoryOrderService::new();
        svc.place_order(&request(NON_MEMBER, 1)).await.unwrap();
        svc.place_order(&request(NON_MEMBER, 2)).await.unwrap();
        let orders = svc.list_orders().await.unwrap();
        assert_eq!(orders[0].id.as_str(), "2");

        let id = OrderId::new("1");
        svc.complete_order(&id).await.unwrap();
        svc.complete_order(&id).await.unwrap();
        assert!(svc.complete_order(&OrderId::new("99")).await.is_err());
        assert_eq!(svc.request_counts().complete_order, 3);
    }

    #[tokio::test]
    async fn test_cancel_refunds_member() {
        let svc = MemoryOrderService::with_demo_members();
        svc.place_order(&request("77452", 500)).await.unwrap();
        svc.cancel_order(&OrderId::new("1")).unwrap();
        assert_eq!(svc.member_coins("77452"), Some(1500));
        let orders = svc.list_orders().await.unwrap();
        assert_eq!(orders[0].status, OrderStatus::Cancelled);
        assert!(svc.cancel_order(&OrderId::new("1")).is_err());
    }

    #[tokio::test]
    async fn test_oversized_member_amount_is_rejected() {
        let svc = MemoryOrderService::with_demo_members();
        for amount in [u64::MAX, i64::MAX as u64 + 1, 1501] {
            let err = svc.place_order(&request("97011", amount)).await.unwrap_err();
            assert_eq!(err, rejected("Insufficient member balance"), "amount {amount}");
        }
        assert_eq!(svc.member_coins("97011"), Some(1500));

        // Spending the exact balance is allowed.
        svc.place_order(&request("97011", 1500)).await.unwrap();
        assert_eq!(svc.member_coins("97011"), Some(0));
    }

    #[tokio::test]
    async fn test_cancelled_order_cannot_be_completed() {
        let svc = MemoryOrderService::with_demo_members();
        svc.place_order(&request("97011", 300)).await.unwrap();
        let id = OrderId::new("1");
        svc.cancel_order(&id).unwrap();

        let err = svc.complete_order(&id).await.unwrap_err();
        assert_eq!(err, rejected("Order is cancelled"));
        let orders = svc.list_orders().await.unwrap();
        assert_eq!(orders[0].status, OrderStatus::Cancelled);
        assert_eq!(svc.member_coins("97011"), Some(1500));
    }

    #[tokio::test]
    async fn test_offline_service_fails_every_call() {
        let svc = MemoryOrderService::new();
        svc.set_offline(true);
        assert!(matches!(
            svc.list_orders().await,
            Err(ApiError::Unreachable(_))
        ));
        assert!(svc.place_order(&request(NON_MEMBER, 1)).await.is_err());
        svc.set_offline(false);
        assert!(svc.list_orders().await.is_ok());
    }
}
