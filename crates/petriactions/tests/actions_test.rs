use petriactions::{ConditionAction, DelayAction};
use petricore::Token;
use petriruntime::{ActionRegistry, RuntimeController};
use serde_json::json;
use std::time::Duration;

#[test]
fn register_all_covers_builtins() {
    let mut registry = ActionRegistry::new();
    petriactions::register_all(&mut registry);

    for name in ["noop", "delay", "condition", "fail", "error"] {
        assert!(registry.contains(name), "missing builtin: {name}");
    }
}

#[test]
fn delay_action_holds_a_token_across_ticks() {
    let controller = RuntimeController::new();
    controller
        .load_config_str(
            r#"{
                "actions": [{"id": "delay"}],
                "places": [
                    {"id": "entry", "type": "entrypoint"},
                    {"id": "pause", "type": "action", "params": {"action_id": "delay"}},
                    {"id": "done", "type": "exit_logger"}
                ],
                "transitions": [
                    {"from": ["entry"], "to": ["pause"]},
                    {"from": ["pause::success"], "to": ["done"]}
                ]
            }"#,
        )
        .unwrap();
    controller.register_action(
        "delay",
        DelayAction::new(Duration::from_millis(50)).into_invoker(),
    );

    controller.inject_token("entry", Token::new());
    controller.tick(); // entry -> pause, action armed
    controller.tick(); // first invocation sets the deadline

    assert_eq!(controller.exit_count("done"), Some(0));
    assert_eq!(controller.stats().active_tokens, 1);

    std::thread::sleep(Duration::from_millis(60));
    controller.tick(); // delay elapsed, routed to success
    controller.tick(); // success -> done

    assert_eq!(controller.exit_count("done"), Some(1));
    assert_eq!(controller.stats().active_tokens, 0);
}

#[test]
fn condition_action_branches_a_workflow() {
    let controller = RuntimeController::new();
    controller
        .load_config_str(
            r#"{
                "actions": [{"id": "is_charged"}],
                "places": [
                    {"id": "entry", "type": "entrypoint"},
                    {"id": "check", "type": "action", "params": {"action_id": "is_charged"}},
                    {"id": "dispatch", "type": "exit_logger"},
                    {"id": "recharge", "type": "exit_logger"}
                ],
                "transitions": [
                    {"from": ["check::success"], "to": ["dispatch"]},
                    {"from": ["check::failure"], "to": ["recharge"]},
                    {"from": ["entry"], "to": ["check"]}
                ]
            }"#,
        )
        .unwrap();
    controller.register_action(
        "is_charged",
        ConditionAction::check_greater_than("charge", 20.0).into_invoker(),
    );

    let mut charged = Token::new();
    charged.set_data("charge", json!(80));
    let mut drained = Token::new();
    drained.set_data("charge", json!(10));
    controller.inject_token("entry", charged);
    controller.inject_token("entry", drained);

    for _ in 0..5 {
        controller.tick();
    }

    assert_eq!(controller.exit_count("dispatch"), Some(1));
    assert_eq!(controller.exit_count("recharge"), Some(1));
    assert_eq!(controller.stats().active_tokens, 0);
}

#[test]
fn fail_and_error_probes_route_to_their_subqueues() {
    let controller = RuntimeController::new();
    controller
        .load_config_str(
            r#"{
                "actions": [{"id": "fail"}, {"id": "error"}],
                "places": [
                    {"id": "entry_f", "type": "entrypoint"},
                    {"id": "entry_e", "type": "entrypoint"},
                    {"id": "failing", "type": "action", "params": {"action_id": "fail"}},
                    {"id": "erroring", "type": "action",
                     "params": {"action_id": "error", "retries": 0}},
                    {"id": "failed", "type": "exit_logger"},
                    {"id": "errored", "type": "exit_logger"}
                ],
                "transitions": [
                    {"from": ["entry_f"], "to": ["failing"]},
                    {"from": ["entry_e"], "to": ["erroring"]},
                    {"from": ["failing::failure"], "to": ["failed"]},
                    {"from": ["erroring::error"], "to": ["errored"]}
                ]
            }"#,
        )
        .unwrap();
    let mut registry = ActionRegistry::new();
    petriactions::register_all(&mut registry);
    for name in ["fail", "error"] {
        controller.register_action(name, registry.get(name).unwrap());
    }

    controller.inject_token("entry_f", Token::new());
    controller.inject_token("entry_e", Token::new());

    for _ in 0..4 {
        controller.tick();
    }

    assert_eq!(controller.exit_count("failed"), Some(1));
    assert_eq!(controller.exit_count("errored"), Some(1));
}
