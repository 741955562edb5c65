use petricore::{ActionResult, Token};
use petriruntime::ActionInvoker;
use serde_json::Value;
use std::sync::Arc;

type Predicate = Box<dyn Fn(&Token) -> bool + Send + Sync>;

/// Action that checks a boolean condition against the token.
///
/// Returns `Success` when the condition holds, `Failure` otherwise. Useful
/// as a decision point: wire `::success` and `::failure` to different
/// branches of the workflow. Without a predicate, the token's `condition`
/// data key is checked for truthiness.
#[derive(Default)]
pub struct ConditionAction {
    predicate: Option<Predicate>,
}

impl ConditionAction {
    pub fn new(predicate: impl Fn(&Token) -> bool + Send + Sync + 'static) -> Self {
        Self {
            predicate: Some(Box::new(predicate)),
        }
    }

    /// Condition that checks a data key for truthiness.
    pub fn check_data_key(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(move |token| token.get_data(&key).map(is_truthy).unwrap_or(false))
    }

    /// Condition that checks a data key against an expected value.
    pub fn check_equals(key: impl Into<String>, expected: Value) -> Self {
        let key = key.into();
        Self::new(move |token| token.get_data(&key) == Some(&expected))
    }

    /// Condition that checks a data key exists.
    pub fn check_exists(key: impl Into<String>) -> Self {
        let key = key.into();
        Self::new(move |token| token.has_data(&key))
    }

    /// Condition that checks a numeric data key is greater than `value`.
    pub fn check_greater_than(key: impl Into<String>, value: f64) -> Self {
        let key = key.into();
        Self::new(move |token| {
            token
                .get_data(&key)
                .and_then(Value::as_f64)
                .map(|n| n > value)
                .unwrap_or(false)
        })
    }

    /// Condition that checks a numeric data key is less than `value`.
    pub fn check_less_than(key: impl Into<String>, value: f64) -> Self {
        let key = key.into();
        Self::new(move |token| {
            token
                .get_data(&key)
                .and_then(Value::as_f64)
                .map(|n| n < value)
                .unwrap_or(false)
        })
    }

    pub fn execute(&self, token: &mut Token) -> ActionResult {
        let holds = match &self.predicate {
            Some(predicate) => predicate(token),
            None => token.get_data("condition").map(is_truthy).unwrap_or(false),
        };
        if holds {
            ActionResult::success()
        } else {
            ActionResult::failure_with("condition not met")
        }
    }

    pub fn into_invoker(self) -> ActionInvoker {
        Arc::new(move |_actor, token| self.execute(token))
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
