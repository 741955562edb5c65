use crate::ActionInvoker;
use petricore::{ActionResult, Token};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of named action invokers, shared by the action places of a
/// controller.
///
/// Registries are per-controller; there is no process-wide instance.
/// Registering a name that already exists replaces the previous invoker.
#[derive(Default)]
pub struct ActionRegistry {
    invokers: HashMap<String, ActionInvoker>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an invoker under `name`, replacing any previous binding.
    pub fn register(&mut self, name: impl Into<String>, invoker: ActionInvoker) {
        let name = name.into();
        tracing::info!(action = %name, "registering action");
        self.invokers.insert(name, invoker);
    }

    /// Convenience for actor-less actions: wrap a plain token function.
    pub fn register_fn(
        &mut self,
        name: impl Into<String>,
        f: impl Fn(&mut Token) -> ActionResult + Send + Sync + 'static,
    ) {
        self.register(name, Arc::new(move |_actor, token| f(token)));
    }

    pub fn get(&self, name: &str) -> Option<ActionInvoker> {
        self.invokers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.invokers.contains_key(name)
    }

    /// Registered action names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.invokers.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.invokers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.invokers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_lookup() {
        let mut registry = ActionRegistry::new();
        assert!(registry.is_empty());

        registry.register_fn("noop", |_token| ActionResult::success());
        assert!(registry.contains("noop"));
        assert!(!registry.contains("other"));
        assert_eq!(registry.names(), vec!["noop".to_string()]);

        let invoker = registry.get("noop").unwrap();
        let mut token = Token::new();
        assert!(invoker(None, &mut token).is_success());
    }

    #[test]
    fn rebinding_replaces() {
        let mut registry = ActionRegistry::new();
        registry.register_fn("probe", |_token| ActionResult::success());
        registry.register_fn("probe", |_token| ActionResult::failure());
        assert_eq!(registry.len(), 1);

        let invoker = registry.get("probe").unwrap();
        let mut token = Token::new();
        assert!(invoker(None, &mut token).is_failure());
    }
}
