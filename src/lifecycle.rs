//! Order lifecycle commands: place and complete.
//!
//! Commands round-trip through the order service and then force one
//! out-of-band fetch. The local snapshot is never edited directly, so a
//! command that succeeds but is followed by a failed fetch leaves the view
//! stale rather than wrong.

use serde_json::Value;
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::{info, warn};

use crate::api::OrderService;
use crate::error::{DashboardError, ValidationError};
use crate::orders::{OrderId, OrderType, PlaceOrderRequest, NON_MEMBER};
use crate::sync::Synchronizer;

/// Notice shown when the service refuses or never receives a new order.
pub const PLACE_ORDER_FAILED: &str = "Failed to place order. Check ID or Balance.";

// ---------------------------------------------------------------------------
// Draft validation
// ---------------------------------------------------------------------------

/// New-order form contents, exactly as entered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderDraft {
    pub is_member: bool,
    pub member_id: String,
    /// Raw amount text; parsed on submit.
    pub amount: String,
    pub items: String,
    pub order_type: OrderType,
    pub delivery_date: Option<String>,
}

impl OrderDraft {
    /// Validate the draft and build the request body. Runs before any I/O.
    pub fn to_request(&self) -> Result<PlaceOrderRequest, ValidationError> {
        let member_id = if self.is_member {
            let id = self.member_id.trim();
            if id.is_empty() {
                return Err(ValidationError::MissingMemberId);
            }
            id.to_string()
        } else {
            NON_MEMBER.to_string()
        };

        let items = self.items.trim();
        if items.is_empty() {
            return Err(ValidationError::MissingItems);
        }

        let amount = parse_amount(&self.amount)?;

        // Only scheduled orders carry a date.
        let delivery_date = if self.order_type.is_immediate() {
            None
        } else {
            self.delivery_date
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string)
        };

        Ok(PlaceOrderRequest {
            member_id,
            amount,
            items: items.to_string(),
            order_type: self.order_type,
            delivery_date,
        })
    }
}

/// Parse a whole, positive rupee amount.
pub fn parse_amount(raw: &str) -> Result<u64, ValidationError> {
    match raw.trim().parse::<u64>() {
        Ok(amount) if amount > 0 => Ok(amount),
        _ => Err(ValidationError::InvalidAmount(raw.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct OrderController<S> {
    sync: Synchronizer<S>,
    completing: Mutex<HashSet<OrderId>>,
}

/// Marks an order as having a completion request in flight until dropped.
struct CompletionGuard<'a> {
    completing: &'a Mutex<HashSet<OrderId>>,
    id: OrderId,
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        let mut set = self.completing.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.id);
    }
}

impl<S: OrderService> OrderController<S> {
    pub fn new(sync: Synchronizer<S>) -> Self {
        Self {
            sync,
            completing: Mutex::new(HashSet::new()),
        }
    }

    pub fn synchronizer(&self) -> &Synchronizer<S> {
        &self.sync
    }

    /// Place a new order. `Ok` means the form can close; on `Err` the caller
    /// keeps the draft so staff can correct and resubmit.
    ///
    /// Returns the id the service assigned, when it reports one.
    pub async fn create(&self, draft: &OrderDraft) -> Result<Option<OrderId>, DashboardError> {
        let request = draft.to_request()?;

        let body = match self.sync.service().place_order(&request).await {
            Ok(body) => body,
            Err(e) => {
                warn!(
                    member_id = %request.member_id,
                    amount = request.amount,
                    error = %e,
                    "Order placement failed"
                );
                return Err(DashboardError::CommandFailure {
                    notice: PLACE_ORDER_FAILED.to_string(),
                    source: e,
                });
            }
        };

        let order_id = placed_order_id(&body);
        info!(
            order_id = ?order_id.as_ref().map(OrderId::as_str),
            member_id = %request.member_id,
            amount = request.amount,
            order_type = request.order_type.as_str(),
            "Order placed"
        );

        // The refresh is best effort; a failure is already logged by the
        // synchronizer and the next tick will retry.
        let _ = self.sync.sync_once().await;
        Ok(order_id)
    }

    /// Mark an order completed, then refresh so it leaves the visible list.
    ///
    /// Only orders the snapshot shows as Active are sent to the service.
    /// Before the first successful fetch there is nothing to check against and
    /// the request goes through.
    pub async fn complete(&self, id: &OrderId) -> Result<(), DashboardError> {
        self.check_completable(id)?;
        let _guard = self.begin_completion(id)?;

        if let Err(e) = self.sync.service().complete_order(id).await {
            warn!(order_id = %id, error = %e, "Order completion failed");
            return Err(DashboardError::CommandFailure {
                notice: format!("Error completing order {id}"),
                source: e,
            });
        }
        info!(order_id = %id, "Order completed");

        let _ = self.sync.sync_once().await;
        Ok(())
    }

    /// Whether a completion request for `id` is still awaiting the service.
    pub fn is_completing(&self, id: &OrderId) -> bool {
        let set = self.completing.lock().unwrap_or_else(|e| e.into_inner());
        set.contains(id)
    }

    fn check_completable(&self, id: &OrderId) -> Result<(), DashboardError> {
        let snapshot = self.sync.store().current();
        match snapshot.get(id) {
            Some(order) if !order.is_active() => Err(DashboardError::NotActive(id.to_string())),
            None if snapshot.is_loaded() => Err(DashboardError::UnknownOrder(id.to_string())),
            _ => Ok(()),
        }
    }

    fn begin_completion(&self, id: &OrderId) -> Result<CompletionGuard<'_>, DashboardError> {
        let mut set = self.completing.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(id.clone()) {
            return Err(DashboardError::CompletionInFlight(id.to_string()));
        }
        Ok(CompletionGuard {
            completing: &self.completing,
            id: id.clone(),
        })
    }
}

fn placed_order_id(body: &Value) -> Option<OrderId> {
    body.get("order")
        .and_then(|o| o.get("id"))
        .filter(|id| !id.is_null())
        .and_then(|id| serde_json::from_value(id.clone()).ok())
}
