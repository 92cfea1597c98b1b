//! New-order form and completion commands.

use crate::api::OrderService;
use crate::commands::Prompter;
use crate::error::DashboardError;
use crate::lifecycle::{OrderController, OrderDraft};
use crate::orders::{OrderId, OrderType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormOutcome {
    Placed(Option<OrderId>),
    Cancelled,
}

/// Ask for one field. An empty answer keeps `current`; `-` clears it.
async fn ask_field<P: Prompter>(prompter: &mut P, label: &str, current: &str) -> Option<String> {
    let prompt = if current.is_empty() {
        format!("{label}: ")
    } else {
        format!("{label} [{current}]: ")
    };
    let answer = prompter.ask(&prompt).await?;
    let answer = answer.trim();
    Some(match answer {
        "" => current.to_string(),
        "-" => String::new(),
        other => other.to_string(),
    })
}

/// Walk the form fields, pre-filled from `draft`. `None` when input closes.
pub async fn edit_draft<P: Prompter>(prompter: &mut P, draft: &mut OrderDraft) -> Option<()> {
    let hint = if draft.is_member { "Y/n" } else { "y/N" };
    let answer = prompter.ask(&format!("Is member? [{hint}]: ")).await?;
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => draft.is_member = true,
        "n" | "no" => draft.is_member = false,
        _ => {}
    }

    if draft.is_member {
        draft.member_id = ask_field(prompter, "Member ID", &draft.member_id).await?;
    }
    draft.items = ask_field(prompter, "Items", &draft.items).await?;
    draft.amount = ask_field(prompter, "Amount (₹)", &draft.amount).await?;

    loop {
        let raw = ask_field(
            prompter,
            "Type (Immediate/Takeaway/Pre-order)",
            draft.order_type.as_str(),
        )
        .await?;
        match raw.parse::<OrderType>() {
            Ok(order_type) => {
                draft.order_type = order_type;
                break;
            }
            Err(e) => prompter.say(&e),
        }
    }

    if !draft.order_type.is_immediate() {
        let current = draft.delivery_date.clone().unwrap_or_default();
        let date = ask_field(prompter, "Delivery date (optional)", &current).await?;
        draft.delivery_date = (!date.is_empty()).then_some(date);
    }
    Some(())
}

/// Fill in and submit a new order. A rejected draft is kept so staff can
/// edit it, retry as is, or cancel.
pub async fn place_order_flow<S: OrderService, P: Prompter>(
    controller: &OrderController<S>,
    prompter: &mut P,
) -> FormOutcome {
    prompter.say("New Order (Staff)");
    let mut draft = OrderDraft::default();
    if edit_draft(prompter, &mut draft).await.is_none() {
        return FormOutcome::Cancelled;
    }

    loop {
        match controller.create(&draft).await {
            Ok(id) => {
                let message = match &id {
                    Some(id) => format!("Order {id} placed."),
                    None => "Order placed.".to_string(),
                };
                prompter.say(&message);
                return FormOutcome::Placed(id);
            }
            Err(DashboardError::CommandFailure { notice, source }) => {
                prompter.say(&format!("{notice} ({source})"))
            }
            Err(e) => prompter.say(&e.notice()),
        }

        let Some(choice) = prompter.ask("[e]dit, [r]etry or [c]ancel? ").await else {
            return FormOutcome::Cancelled;
        };
        match choice.trim().to_ascii_lowercase().as_str() {
            "c" | "cancel" => {
                prompter.say("Order discarded.");
                return FormOutcome::Cancelled;
            }
            "r" | "retry" => {}
            _ => {
                if edit_draft(prompter, &mut draft).await.is_none() {
                    return FormOutcome::Cancelled;
                }
            }
        }
    }
}

/// Complete an order. On failure returns the notice to show staff.
pub async fn complete_order<S: OrderService>(
    controller: &OrderController<S>,
    id: &OrderId,
) -> Result<(), String> {
    controller.complete(id).await.map_err(|e| e.notice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::tests::ScriptedPrompter;
    use crate::filter::Tab;
    use crate::lifecycle::PLACE_ORDER_FAILED;
    use crate::memory_service::MemoryOrderService;
    use crate::orders::OrderStatus;
    use crate::store::OrderStore;
    use crate::sync::Synchronizer;
    use std::sync::Arc;

    fn setup() -> (Arc<MemoryOrderService>, Arc<OrderStore>, OrderController<MemoryOrderService>) {
        let service = Arc::new(MemoryOrderService::with_demo_members());
        let store = Arc::new(OrderStore::new());
        let sync = Synchronizer::new(Arc::clone(&service), Arc::clone(&store));
        (service, store, OrderController::new(sync))
    }

    #[tokio::test]
    async fn test_guest_order_form() {
        let (_service, store, controller) = setup();
        let mut prompter = ScriptedPrompter::new(&["", "Masala Dosa", "80", "takeaway", "2026-11-02"]);

        let outcome = place_order_flow(&controller, &mut prompter).await;
        let FormOutcome::Placed(Some(id)) = outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        let snap = store.current();
        let order = snap.get(&id).unwrap();
        assert!(order.member_id.starts_with("Guest-"));
        assert_eq!(order.order_type, OrderType::Takeaway);
        assert_eq!(order.delivery_date.as_deref(), Some("2026-11-02"));
        assert!(prompter.said.iter().any(|s| s.ends_with("placed.")));
    }

    #[tokio::test]
    async fn test_rejected_order_keeps_draft_for_edit() {
        let (service, store, controller) = setup();
        let mut prompter = ScriptedPrompter::new(&[
            // first pass: member with too little balance
            "y", "77452", "Feast", "99999", "",
            // edit: keep member, id and items, lower the amount, keep type
            "e", "", "", "", "300", "",
        ]);

        let outcome = place_order_flow(&controller, &mut prompter).await;
        assert!(matches!(outcome, FormOutcome::Placed(Some(_))));
        assert!(prompter.said.iter().any(|s| s.starts_with(PLACE_ORDER_FAILED)));
        // The edit pass showed the previously entered values.
        assert!(prompter.prompts.iter().any(|p| p == "Member ID [77452]: "));
        assert!(prompter.prompts.iter().any(|p| p == "Amount (₹) [99999]: "));

        assert_eq!(service.member_coins("77452"), Some(1200));
        let snap = store.current();
        assert_eq!(snap.visible(Tab::Member).len(), 1);
        assert_eq!(snap.stats().revenue, 300);
    }

    #[tokio::test]
    async fn test_invalid_amount_then_cancel() {
        let (service, store, controller) = setup();
        let mut prompter = ScriptedPrompter::new(&["n", "Tea", "ten", "", "c"]);

        let outcome = place_order_flow(&controller, &mut prompter).await;
        assert_eq!(outcome, FormOutcome::Cancelled);
        assert!(prompter.said.iter().any(|s| s.starts_with("Amount must be")));
        assert_eq!(service.request_counts().place_order, 0);
        assert!(!store.current().is_loaded());
    }

    #[tokio::test]
    async fn test_unknown_type_is_asked_again() {
        let (_service, _store, controller) = setup();
        let mut prompter = ScriptedPrompter::new(&["n", "Tea", "20", "delivery", "pre-order", ""]);

        let outcome = place_order_flow(&controller, &mut prompter).await;
        assert!(matches!(outcome, FormOutcome::Placed(_)));
        assert!(prompter.said.iter().any(|s| s == "Unknown order type: delivery"));
    }

    #[tokio::test]
    async fn test_closed_input_cancels_form() {
        let (service, _store, controller) = setup();
        let mut prompter = ScriptedPrompter::new(&["n", "Tea"]);
        assert_eq!(
            place_order_flow(&controller, &mut prompter).await,
            FormOutcome::Cancelled
        );
        assert_eq!(service.request_counts().place_order, 0);
    }

    #[tokio::test]
    async fn test_complete_order_notices() {
        let (service, store, controller) = setup();
        let mut prompter = ScriptedPrompter::new(&["", "Idli", "45", ""]);
        let FormOutcome::Placed(Some(id)) = place_order_flow(&controller, &mut prompter).await
        else {
            panic!("order not placed");
        };

        service.set_offline(true);
        assert_eq!(
            complete_order(&controller, &id).await,
            Err(format!("Error completing order {id}"))
        );

        service.set_offline(false);
        assert_eq!(complete_order(&controller, &id).await, Ok(()));
        assert_eq!(
            store.current().get(&id).map(|o| o.status),
            Some(OrderStatus::Completed)
        );
        assert_eq!(
            complete_order(&controller, &id).await,
            Err(format!("Order {id} is not active"))
        );
        assert_eq!(
            complete_order(&controller, &OrderId::new("404")).await,
            Err("Order 404 not found".to_string())
        );
    }
}
