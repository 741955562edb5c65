use petricore::{ActionResult, Token};
use petriruntime::ActionInvoker;
use std::sync::Arc;

/// Action that always succeeds.
pub struct NoOpAction;

impl NoOpAction {
    pub fn execute(&self, _token: &mut Token) -> ActionResult {
        ActionResult::success()
    }

    pub fn into_invoker(self) -> ActionInvoker {
        Arc::new(move |_actor, token| self.execute(token))
    }
}

/// Action that always fails.
pub struct FailAction {
    message: String,
}

impl FailAction {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn execute(&self, _token: &mut Token) -> ActionResult {
        ActionResult::failure_with(self.message.clone())
    }

    pub fn into_invoker(self) -> ActionInvoker {
        Arc::new(move |_actor, token| self.execute(token))
    }
}

impl Default for FailAction {
    fn default() -> Self {
        Self::new("intentional failure")
    }
}

/// Action that always errors.
pub struct ErrorAction {
    message: String,
}

impl ErrorAction {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn execute(&self, _token: &mut Token) -> ActionResult {
        ActionResult::error_message(self.message.clone())
    }

    pub fn into_invoker(self) -> ActionInvoker {
        Arc::new(move |_actor, token| self.execute(token))
    }
}

impl Default for ErrorAction {
    fn default() -> Self {
        Self::new("intentional error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_results() {
        let mut token = Token::new();
        assert!(NoOpAction.execute(&mut token).is_success());
        assert_eq!(
            FailAction::new("nope").execute(&mut token).failure_message(),
            Some("nope")
        );
        assert!(ErrorAction::default().execute(&mut token).is_error());
    }
}
