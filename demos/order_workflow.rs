//! Order Workflow
//!
//! This demo drives an order through a declarative FSM and dispatches the
//! intents the executor returns.
//!
//! Key concepts:
//! - States, transitions, conditions and actions defined as data
//! - Blocked transitions (unmet conditions) vs. fired transitions
//! - Intents routed to collaborators by target
//! - Wildcard cancellation from any state
//! - Snapshot and restore of the execution state
//!
//! Run with: cargo run --example order_workflow

use onex_engine::fsm::{
    available_triggers, execute_transition, get_initial_state, FsmBuilder, FsmSnapshot, FsmState,
    FsmSubcontract, FsmTransition, Intent, TransitionAction, TransitionCondition,
};
use serde_json::json;

fn order_fsm() -> FsmSubcontract {
    FsmBuilder::new("order")
        .state(FsmState::new("draft").exit_action("lock_cart"))
        .state(FsmState::new("paid").entry_action("send_receipt"))
        .state(FsmState::new("shipped").entry_action("notify_carrier"))
        .state(FsmState::new("delivered").terminal())
        .state(FsmState::new("cancelled").terminal().state_type("error"))
        .initial("draft")
        .error_state("cancelled")
        .persistence(true)
        .transition(
            FsmTransition::new("pay", "draft", "paid", "payment_received")
                .condition(TransitionCondition::new("has_items", "cart.items min_length 1"))
                .condition(TransitionCondition::new("positive_total", "cart.total > 0"))
                .action(TransitionAction::new("capture_payment", 1).critical().timeout_ms(5000)),
        )
        .transition(
            FsmTransition::new("ship", "paid", "shipped", "label_printed")
                .condition(TransitionCondition::new("address", "shipping.address"))
                .condition(
                    TransitionCondition::new("express", "shipping.express == true").optional(),
                ),
        )
        .transition(FsmTransition::new("deliver", "shipped", "delivered", "scanned"))
        .transition(FsmTransition::new("cancel", "*", "cancelled", "cancel").priority(10))
        .build()
        .expect("order FSM is well formed")
}

fn dispatch(intents: &[Intent]) {
    for intent in intents {
        println!("  [{}] {} {}", intent.target(), intent.intent_type(), intent.payload());
    }
}

fn main() {
    println!("=== Order Workflow ===\n");

    let fsm = order_fsm();
    let mut state = get_initial_state(&fsm).with_context(json!({
        "cart": {"items": [], "total": 0},
        "shipping": {}
    }));

    println!("Triggers from draft: {:?}\n", available_triggers(&fsm, "draft"));

    println!("Step 1: pay with an empty cart");
    let result = execute_transition(&fsm, &state.current_state, "payment_received", &state.context)
        .expect("trigger is defined");
    println!("  success: {} ({:?})", result.success, result.error);
    dispatch(&result.intents);
    println!();

    state.context = json!({
        "cart": {"items": ["book", "pen"], "total": 24.5},
        "shipping": {"address": "1 Main St"}
    });

    for trigger in ["payment_received", "label_printed"] {
        println!("Fire '{trigger}' from '{}'", state.current_state);
        let result = execute_transition(&fsm, &state.current_state, trigger, &state.context)
            .expect("trigger is defined");
        dispatch(&result.intents);
        state.apply(&result);
        println!();
    }

    let snapshot = FsmSnapshot::capture(&fsm, &state);
    let json = snapshot.to_json().expect("snapshot serializes");
    println!("Snapshot taken in '{}' ({} bytes)\n", state.current_state, json.len());

    println!("Cancel via wildcard transition");
    let result = execute_transition(&fsm, &state.current_state, "cancel", &state.context)
        .expect("wildcard matches");
    dispatch(&result.intents);
    state.apply(&result);
    println!(
        "  now '{}', terminal: {}, history: {:?}\n",
        state.current_state,
        fsm.is_terminal(&state.current_state),
        state.history
    );

    let restored = FsmSnapshot::from_json(&json)
        .and_then(|s| s.restore(&fsm))
        .expect("snapshot restores");
    println!("Restored to '{}' with history {:?}", restored.current_state, restored.history);
}
