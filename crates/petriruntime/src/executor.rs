use crate::{ActionCallback, ActionContext, ActionId, ActionState, RetryPolicy};
use petricore::{ActionResult, Actor, Token};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// Function invoked to execute an action against a token.
///
/// The actor is optional; stateless actions ignore it. Invokers are called
/// inline during [`ActionExecutor::poll`] and may be called again on later
/// polls when they return `InProgress`, so they must not retain references
/// to the token across calls.
pub type ActionInvoker = Arc<dyn Fn(Option<&dyn Actor>, &mut Token) -> ActionResult + Send + Sync>;

struct InFlightAction {
    context: ActionContext,
    actor: Option<Arc<dyn Actor>>,
    invoker: ActionInvoker,
}

/// Pool of in-flight action contexts, driven cooperatively by `poll`.
///
/// `poll` is the only progress point: it advances every context's state
/// machine, calls invokers inline, and fires completion callbacks on the
/// calling thread as finished contexts are removed. Long-running invokers
/// block the tick; they are expected to return `InProgress` and stash
/// resume state inside the token.
pub struct ActionExecutor {
    in_flight: HashMap<ActionId, InFlightAction>,
    next_id: ActionId,
}

impl ActionExecutor {
    pub fn new() -> Self {
        Self {
            in_flight: HashMap::new(),
            next_id: 1,
        }
    }

    /// Start executing an action. The token moves into the context until
    /// the completion callback hands it back.
    pub fn start_action(
        &mut self,
        action_name: impl Into<String>,
        token: Token,
        actor: Option<Arc<dyn Actor>>,
        invoker: ActionInvoker,
        policy: RetryPolicy,
        callback: Option<ActionCallback>,
    ) -> ActionId {
        let id = self.next_id;
        self.next_id += 1;
        let context = ActionContext::new(id, action_name, token, policy, callback);
        self.in_flight.insert(
            id,
            InFlightAction {
                context,
                actor,
                invoker,
            },
        );
        id
    }

    /// Advance every in-flight action, then remove those that reached a
    /// final state, invoking each completion callback exactly once.
    pub fn poll(&mut self) {
        let now = Instant::now();

        let mut finished = Vec::new();
        for (id, action) in self.in_flight.iter_mut() {
            Self::process(&mut action.context, action.actor.as_deref(), &action.invoker, now);
            if action.context.is_final() {
                finished.push(*id);
            }
        }

        // Callbacks fire in start order for determinism.
        finished.sort_unstable();
        for id in finished {
            if let Some(action) = self.in_flight.remove(&id) {
                action.context.invoke_callback();
            }
        }
    }

    fn process(
        ctx: &mut ActionContext,
        actor: Option<&dyn Actor>,
        invoker: &ActionInvoker,
        now: Instant,
    ) {
        match ctx.state() {
            ActionState::Pending => {
                if ctx.attempt_count() == 0 || ctx.is_ready_for_retry(now) {
                    ctx.start(now);
                    Self::invoke(ctx, actor, invoker, now);
                }
            }
            ActionState::Running => {
                if ctx.is_timed_out(now) {
                    ctx.time_out(now);
                    if ctx.can_retry() {
                        ctx.schedule_retry(now);
                    } else {
                        ctx.mark_timed_out();
                    }
                } else {
                    Self::invoke(ctx, actor, invoker, now);
                }
            }
            // Terminal states make no further progress.
            _ => {}
        }
    }

    fn invoke(ctx: &mut ActionContext, actor: Option<&dyn Actor>, invoker: &ActionInvoker, now: Instant) {
        let name = ctx.action_name().to_string();
        let result = {
            let token = ctx.token_mut();
            catch_unwind(AssertUnwindSafe(|| invoker(actor, token)))
        };
        let result = result.unwrap_or_else(|payload| {
            let message = if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else {
                format!("action '{name}' panicked")
            };
            tracing::error!(action = %name, %message, "invoker panicked");
            ActionResult::error_message(message)
        });

        ctx.update(result);
        if matches!(ctx.state(), ActionState::Failed | ActionState::Error) && ctx.can_retry() {
            tracing::debug!(
                action = %name,
                attempt = ctx.attempt_count(),
                "scheduling retry"
            );
            ctx.schedule_retry(now);
        }
    }

    /// Request cancellation; observed at the next `poll`, which fires the
    /// callback with the last result.
    pub fn cancel(&mut self, id: ActionId) {
        if let Some(action) = self.in_flight.get_mut(&id) {
            action.context.cancel();
        }
    }

    pub fn cancel_all(&mut self) {
        for action in self.in_flight.values_mut() {
            action.context.cancel();
        }
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn has_in_flight(&self) -> bool {
        !self.in_flight.is_empty()
    }

    /// State of an in-flight action, if still tracked.
    pub fn action_state(&self, id: ActionId) -> Option<ActionState> {
        self.in_flight.get(&id).map(|a| a.context.state())
    }
}

impl Default for ActionExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ActionCompletion;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn invoker_returning(
        calls: Arc<AtomicU32>,
        result: impl Fn() -> ActionResult + Send + Sync + 'static,
    ) -> ActionInvoker {
        Arc::new(move |_actor, _token| {
            calls.fetch_add(1, Ordering::SeqCst);
            result()
        })
    }

    fn collect_completions() -> (Arc<Mutex<Vec<ActionCompletion>>>, ActionCallback) {
        let store = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&store);
        let callback: ActionCallback = Box::new(move |completion| {
            sink.lock().unwrap().push(completion);
        });
        (store, callback)
    }

    #[test]
    fn success_completes_in_one_poll() {
        let mut executor = ActionExecutor::new();
        let calls = Arc::new(AtomicU32::new(0));
        let (completions, callback) = collect_completions();

        executor.start_action(
            "ok",
            Token::new(),
            None,
            invoker_returning(Arc::clone(&calls), ActionResult::success),
            RetryPolicy::no_retry(),
            Some(callback),
        );
        assert_eq!(executor.in_flight_count(), 1);

        executor.poll();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(executor.in_flight_count(), 0);

        let done = completions.lock().unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].state, ActionState::Completed);
        assert!(done[0].result.is_success());
    }

    #[test]
    fn in_progress_spans_polls() {
        let mut executor = ActionExecutor::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_invoker = Arc::clone(&calls);
        let invoker: ActionInvoker = Arc::new(move |_actor, _token| {
            if calls_in_invoker.fetch_add(1, Ordering::SeqCst) < 2 {
                ActionResult::in_progress()
            } else {
                ActionResult::success()
            }
        });
        let (completions, callback) = collect_completions();

        executor.start_action(
            "long",
            Token::new(),
            None,
            invoker,
            RetryPolicy::no_retry(),
            Some(callback),
        );

        executor.poll();
        executor.poll();
        assert_eq!(executor.in_flight_count(), 1);
        executor.poll();
        assert_eq!(executor.in_flight_count(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(completions.lock().unwrap()[0].state, ActionState::Completed);
    }

    #[test]
    fn retry_bound_is_max_retries_plus_one() {
        let mut executor = ActionExecutor::new();
        let calls = Arc::new(AtomicU32::new(0));
        let (completions, callback) = collect_completions();

        executor.start_action(
            "flaky",
            Token::new(),
            None,
            invoker_returning(Arc::clone(&calls), || ActionResult::error_message("boom")),
            RetryPolicy::immediate(2),
            Some(callback),
        );

        for _ in 0..10 {
            executor.poll();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(executor.in_flight_count(), 0);

        let done = completions.lock().unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].state, ActionState::Error);
        assert!(done[0].result.is_error());
    }

    #[test]
    fn failure_without_retry_policy_is_final() {
        let mut executor = ActionExecutor::new();
        let calls = Arc::new(AtomicU32::new(0));
        let (completions, callback) = collect_completions();

        executor.start_action(
            "reject",
            Token::new(),
            None,
            invoker_returning(Arc::clone(&calls), || ActionResult::failure_with("no")),
            RetryPolicy::default(),
            Some(callback),
        );

        executor.poll();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let done = completions.lock().unwrap();
        assert_eq!(done[0].state, ActionState::Failed);
        assert_eq!(done[0].result.failure_message(), Some("no"));
    }

    #[test]
    fn timeout_terminates_hung_action() {
        let mut executor = ActionExecutor::new();
        let mut policy = RetryPolicy::no_retry();
        policy.timeout = Duration::from_millis(20);
        let (completions, callback) = collect_completions();

        executor.start_action(
            "hang",
            Token::new(),
            None,
            Arc::new(|_actor, _token| ActionResult::in_progress()),
            policy,
            Some(callback),
        );

        executor.poll();
        assert_eq!(executor.in_flight_count(), 1);
        std::thread::sleep(Duration::from_millis(30));
        executor.poll();
        assert_eq!(executor.in_flight_count(), 0);

        let done = completions.lock().unwrap();
        assert_eq!(done[0].state, ActionState::TimedOut);
        assert!(done[0].result.is_error());
    }

    #[test]
    fn cancel_observed_at_next_poll() {
        let mut executor = ActionExecutor::new();
        let calls = Arc::new(AtomicU32::new(0));
        let (completions, callback) = collect_completions();

        let id = executor.start_action(
            "task",
            Token::new(),
            None,
            invoker_returning(Arc::clone(&calls), ActionResult::in_progress),
            RetryPolicy::default(),
            Some(callback),
        );

        executor.poll();
        executor.cancel(id);
        assert_eq!(executor.action_state(id), Some(ActionState::Cancelled));

        executor.poll();
        assert_eq!(executor.in_flight_count(), 0);
        assert_eq!(completions.lock().unwrap()[0].state, ActionState::Cancelled);
        // the invoker is not called again after cancellation
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_all_flushes_every_action() {
        let mut executor = ActionExecutor::new();
        for _ in 0..3 {
            executor.start_action(
                "task",
                Token::new(),
                None,
                Arc::new(|_actor, _token| ActionResult::in_progress()),
                RetryPolicy::default(),
                None,
            );
        }
        executor.cancel_all();
        executor.poll();
        assert!(!executor.has_in_flight());
    }

    #[test]
    fn panicking_invoker_becomes_error_result() {
        let mut executor = ActionExecutor::new();
        let (completions, callback) = collect_completions();

        executor.start_action(
            "bomb",
            Token::new(),
            None,
            Arc::new(|_actor, _token| panic!("wire tripped")),
            RetryPolicy::no_retry(),
            Some(callback),
        );

        executor.poll();
        let done = completions.lock().unwrap();
        assert_eq!(done[0].state, ActionState::Error);
        let err = done[0].result.error_value().unwrap();
        assert!(err.to_string().contains("wire tripped"));
    }

    #[test]
    fn invoker_mutations_survive_into_completion() {
        let mut executor = ActionExecutor::new();
        let (completions, callback) = collect_completions();

        executor.start_action(
            "stamp",
            Token::new(),
            None,
            Arc::new(|_actor, token: &mut Token| {
                token.set_data("stamped", true);
                ActionResult::success()
            }),
            RetryPolicy::no_retry(),
            Some(callback),
        );

        executor.poll();
        let done = completions.lock().unwrap();
        assert_eq!(done[0].token.get_data("stamped"), Some(&serde_json::json!(true)));
    }
}
