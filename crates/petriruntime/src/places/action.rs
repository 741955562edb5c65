use crate::places::{CompletionRouter, PlaceBehavior, RoutedCompletion};
use crate::{ActionExecutor, ActionInvoker, ActionState, RetryPolicy};
use petricore::{Place, Subqueue, Token};
use std::any::Any;
use std::time::Instant;

/// Place that executes a named action on entering tokens.
///
/// Entering tokens move into an [`crate::ActionContext`] on the executor;
/// when the context reaches a terminal state its callback routes the token
/// to a sub-queue by state: `Completed` to `success`, `Failed` to
/// `failure`, everything else (`Error`, `TimedOut`, `Cancelled`) to
/// `error`. With no invoker bound, tokens go straight to `error`.
pub struct ActionBehavior {
    place_id: String,
    action_name: String,
    policy: RetryPolicy,
    invoker: Option<ActionInvoker>,
    router: CompletionRouter,
}

impl ActionBehavior {
    pub fn new(
        place: &mut Place,
        action_name: impl Into<String>,
        policy: RetryPolicy,
        router: CompletionRouter,
    ) -> Self {
        place.enable_subqueues();
        Self {
            place_id: place.id().to_string(),
            action_name: action_name.into(),
            policy,
            invoker: None,
            router,
        }
    }

    pub fn action_name(&self) -> &str {
        &self.action_name
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn has_invoker(&self) -> bool {
        self.invoker.is_some()
    }

    /// Bind (or rebind) the invoker executed for entering tokens.
    pub fn set_invoker(&mut self, invoker: ActionInvoker) {
        self.invoker = Some(invoker);
    }

    fn subqueue_for(state: ActionState) -> Subqueue {
        match state {
            ActionState::Completed => Subqueue::Success,
            ActionState::Failed => Subqueue::Failure,
            _ => Subqueue::Error,
        }
    }
}

impl PlaceBehavior for ActionBehavior {
    fn on_token_enter(&mut self, place: &mut Place, token: Token, executor: &mut ActionExecutor) {
        let Some(invoker) = self.invoker.clone() else {
            tracing::warn!(
                place = %self.place_id,
                action = %self.action_name,
                "no invoker bound, token routed to error"
            );
            place.sub_mut(Subqueue::Error).push(token);
            return;
        };

        let router = self.router.clone();
        let place_id = self.place_id.clone();
        executor.start_action(
            &self.action_name,
            token,
            None,
            invoker,
            self.policy,
            Some(Box::new(move |completion| {
                router.push(RoutedCompletion {
                    place_id,
                    sub: Self::subqueue_for(completion.state),
                    action_name: completion.action_name,
                    state: completion.state,
                    token: completion.token,
                });
            })),
        );
    }

    // Progress happens in the executor poll.
    fn tick(&mut self, _place: &mut Place, _now: Instant, _epoch: u64) {}

    fn type_name(&self) -> &'static str {
        "ActionBehavior"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use petricore::ActionResult;
    use std::sync::Arc;

    fn setup() -> (Place, ActionExecutor, CompletionRouter, ActionBehavior) {
        let mut place = Place::new("act");
        let router = CompletionRouter::new();
        let behavior = ActionBehavior::new(
            &mut place,
            "probe",
            RetryPolicy::no_retry(),
            router.clone(),
        );
        (place, ActionExecutor::new(), router, behavior)
    }

    fn drain_into(place: &mut Place, router: &CompletionRouter) {
        for routed in router.drain() {
            place.sub_mut(routed.sub).push(routed.token);
        }
    }

    #[test]
    fn missing_invoker_routes_to_error() {
        let (mut place, mut executor, _router, mut behavior) = setup();
        assert!(!behavior.has_invoker());
        behavior.on_token_enter(&mut place, Token::new(), &mut executor);
        assert_eq!(place.sub(Subqueue::Error).len(), 1);
        assert_eq!(executor.in_flight_count(), 0);
    }

    #[test]
    fn success_routes_to_success_subqueue() {
        let (mut place, mut executor, router, mut behavior) = setup();
        behavior.set_invoker(Arc::new(|_actor, _token| ActionResult::success()));

        behavior.on_token_enter(&mut place, Token::new(), &mut executor);
        assert_eq!(executor.in_flight_count(), 1);
        assert_eq!(place.token_count(), 0);

        executor.poll();
        drain_into(&mut place, &router);
        assert_eq!(place.sub(Subqueue::Success).len(), 1);
        assert_eq!(executor.in_flight_count(), 0);
    }

    #[test]
    fn failure_and_error_route_separately() {
        let (mut place, mut executor, router, mut behavior) = setup();

        behavior.set_invoker(Arc::new(|_actor, _token| ActionResult::failure_with("no")));
        behavior.on_token_enter(&mut place, Token::new(), &mut executor);

        behavior.set_invoker(Arc::new(|_actor, _token| {
            ActionResult::error_message("boom")
        }));
        behavior.on_token_enter(&mut place, Token::new(), &mut executor);

        executor.poll();
        drain_into(&mut place, &router);
        assert_eq!(place.sub(Subqueue::Failure).len(), 1);
        assert_eq!(place.sub(Subqueue::Error).len(), 1);
    }

    #[test]
    fn cancelled_routes_to_error() {
        let (mut place, mut executor, router, mut behavior) = setup();
        behavior.set_invoker(Arc::new(|_actor, _token| ActionResult::in_progress()));

        behavior.on_token_enter(&mut place, Token::new(), &mut executor);
        executor.poll();
        executor.cancel_all();
        executor.poll();

        drain_into(&mut place, &router);
        assert_eq!(place.sub(Subqueue::Error).len(), 1);
    }
}
