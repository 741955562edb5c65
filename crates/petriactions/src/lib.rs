//! Standard action library
//!
//! Built-in actions for common workflow steps: delays, condition checks,
//! and the no-op / fail / error probes used to exercise result routing.

mod condition;
mod delay;
mod probe;

pub use condition::ConditionAction;
pub use delay::DelayAction;
pub use probe::{ErrorAction, FailAction, NoOpAction};

use petriruntime::{ActionInvoker, ActionRegistry};

/// The built-in actions under their registered names.
pub fn builtins() -> Vec<(&'static str, ActionInvoker)> {
    vec![
        ("noop", NoOpAction.into_invoker()),
        ("delay", DelayAction::default().into_invoker()),
        ("condition", ConditionAction::default().into_invoker()),
        ("fail", FailAction::default().into_invoker()),
        ("error", ErrorAction::default().into_invoker()),
    ]
}

/// Register every built-in action with a registry.
pub fn register_all(registry: &mut ActionRegistry) {
    for (name, invoker) in builtins() {
        registry.register(name, invoker);
    }
}
