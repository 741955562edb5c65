use crate::RetryPolicy;
use petricore::{ActionResult, EngineError, Token};
use std::time::Instant;

/// Identifier of an in-flight action, unique per executor.
pub type ActionId = u64;

/// State of an in-flight action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionState {
    /// Waiting to start (first attempt or a scheduled retry).
    Pending,
    /// Currently executing.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with failure.
    Failed,
    /// Finished with an error.
    Error,
    /// Exceeded the per-attempt timeout with no retry budget left.
    TimedOut,
    /// Manually cancelled.
    Cancelled,
}

impl ActionState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ActionState::Pending | ActionState::Running)
    }
}

/// Everything handed to a completion callback: the terminal state, the last
/// result, and the token the action owned.
pub struct ActionCompletion {
    pub id: ActionId,
    pub action_name: String,
    pub state: ActionState,
    pub result: ActionResult,
    pub token: Token,
}

/// Callback invoked exactly once when an action reaches a final state.
pub type ActionCallback = Box<dyn FnOnce(ActionCompletion) + Send>;

/// Per-invocation execution state: the owned token, attempt counters, and
/// the retry/timeout bookkeeping.
pub struct ActionContext {
    id: ActionId,
    action_name: String,
    token: Token,
    policy: RetryPolicy,
    callback: Option<ActionCallback>,
    state: ActionState,
    last_result: ActionResult,
    attempt_count: u32,
    started_at: Option<Instant>,
    retry_at: Option<Instant>,
}

impl ActionContext {
    pub fn new(
        id: ActionId,
        action_name: impl Into<String>,
        token: Token,
        policy: RetryPolicy,
        callback: Option<ActionCallback>,
    ) -> Self {
        Self {
            id,
            action_name: action_name.into(),
            token,
            policy,
            callback,
            state: ActionState::Pending,
            last_result: ActionResult::default(),
            attempt_count: 0,
            started_at: None,
            retry_at: None,
        }
    }

    pub fn id(&self) -> ActionId {
        self.id
    }

    pub fn action_name(&self) -> &str {
        &self.action_name
    }

    pub fn state(&self) -> ActionState {
        self.state
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn token_mut(&mut self) -> &mut Token {
        &mut self.token
    }

    pub fn last_result(&self) -> &ActionResult {
        &self.last_result
    }

    /// Whether the running attempt has exceeded the per-attempt timeout.
    pub fn is_timed_out(&self, now: Instant) -> bool {
        if self.state != ActionState::Running {
            return false;
        }
        match self.started_at {
            Some(started) => now.duration_since(started) >= self.policy.timeout,
            None => false,
        }
    }

    /// Whether another attempt is authorised by the policy. Total attempts
    /// are capped at `max_retries + 1`.
    pub fn can_retry(&self) -> bool {
        if self.attempt_count >= self.policy.max_retries + 1 {
            return false;
        }
        match self.state {
            ActionState::Error => self.policy.retry_on_error,
            ActionState::Failed => self.policy.retry_on_failure,
            _ => false,
        }
    }

    /// Begin an attempt: record the start instant and bump the counter.
    pub fn start(&mut self, now: Instant) {
        self.state = ActionState::Running;
        self.started_at = Some(now);
        self.attempt_count += 1;
    }

    /// Fold an invoker result into the state machine.
    pub fn update(&mut self, result: ActionResult) {
        self.state = match result {
            ActionResult::Success => ActionState::Completed,
            ActionResult::Failure(_) => ActionState::Failed,
            ActionResult::Error(_) => ActionState::Error,
            // Still running; poll again later.
            ActionResult::InProgress => self.state,
        };
        self.last_result = result;
    }

    /// Record a timed-out attempt: the last result becomes a timeout error,
    /// and the state moves to `Error` so the retry policy can judge it.
    pub fn time_out(&mut self, now: Instant) {
        let elapsed = self
            .started_at
            .map(|s| now.duration_since(s))
            .unwrap_or(self.policy.timeout);
        self.last_result = ActionResult::Error(EngineError::timeout(
            format!("action '{}' timed out", self.action_name),
            elapsed,
        ));
        self.state = ActionState::Error;
    }

    /// Mark timed-out with no retry budget left.
    pub fn mark_timed_out(&mut self) {
        self.state = ActionState::TimedOut;
    }

    /// Schedule the next attempt after the policy's retry delay.
    pub fn schedule_retry(&mut self, now: Instant) {
        self.state = ActionState::Pending;
        self.retry_at = Some(now + self.policy.retry_delay);
    }

    /// Whether a scheduled retry's delay has passed.
    pub fn is_ready_for_retry(&self, now: Instant) -> bool {
        self.state == ActionState::Pending && self.retry_at.map(|at| now >= at).unwrap_or(false)
    }

    pub fn cancel(&mut self) {
        self.state = ActionState::Cancelled;
    }

    /// True when the context will make no further progress and should be
    /// removed after its callback fires.
    pub fn is_final(&self) -> bool {
        match self.state {
            ActionState::Completed | ActionState::TimedOut | ActionState::Cancelled => true,
            ActionState::Failed | ActionState::Error => !self.can_retry(),
            ActionState::Pending | ActionState::Running => false,
        }
    }

    /// Consume the context, invoking the completion callback if one was
    /// set. Taking the callback out makes a second invocation impossible.
    pub fn invoke_callback(mut self) {
        if let Some(callback) = self.callback.take() {
            callback(ActionCompletion {
                id: self.id,
                action_name: self.action_name,
                state: self.state,
                result: self.last_result,
                token: self.token,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn initial_state() {
        let ctx = ActionContext::new(1, "probe", Token::new(), RetryPolicy::default(), None);
        assert_eq!(ctx.id(), 1);
        assert_eq!(ctx.action_name(), "probe");
        assert_eq!(ctx.state(), ActionState::Pending);
        assert_eq!(ctx.attempt_count(), 0);
        assert!(!ctx.is_final());
    }

    #[test]
    fn result_folding() {
        let mut ctx = ActionContext::new(1, "probe", Token::new(), RetryPolicy::no_retry(), None);
        let now = Instant::now();
        ctx.start(now);
        assert_eq!(ctx.state(), ActionState::Running);
        assert_eq!(ctx.attempt_count(), 1);

        ctx.update(ActionResult::in_progress());
        assert_eq!(ctx.state(), ActionState::Running);

        ctx.update(ActionResult::success());
        assert_eq!(ctx.state(), ActionState::Completed);
        assert!(ctx.is_final());
    }

    #[test]
    fn retry_budget_counts_attempts() {
        let mut ctx = ActionContext::new(1, "flaky", Token::new(), RetryPolicy::immediate(2), None);
        let now = Instant::now();

        for attempt in 1..=3 {
            ctx.start(now);
            ctx.update(ActionResult::error_message("boom"));
            assert_eq!(ctx.attempt_count(), attempt);
            if attempt < 3 {
                assert!(ctx.can_retry());
                ctx.schedule_retry(now);
                assert!(ctx.is_ready_for_retry(now));
            }
        }
        // max_retries = 2 means at most 3 attempts
        assert!(!ctx.can_retry());
        assert!(ctx.is_final());
    }

    #[test]
    fn failure_only_retried_when_policy_allows() {
        let mut policy = RetryPolicy::immediate(3);
        policy.retry_on_failure = false;
        let mut ctx = ActionContext::new(1, "a", Token::new(), policy, None);
        ctx.start(Instant::now());
        ctx.update(ActionResult::failure());
        assert!(!ctx.can_retry());
        assert!(ctx.is_final());
    }

    #[test]
    fn retry_delay_gates_readiness() {
        let mut policy = RetryPolicy::immediate(1);
        policy.retry_delay = Duration::from_secs(60);
        let mut ctx = ActionContext::new(1, "slow", Token::new(), policy, None);
        let now = Instant::now();
        ctx.start(now);
        ctx.update(ActionResult::error_message("boom"));
        ctx.schedule_retry(now);
        assert!(!ctx.is_ready_for_retry(now));
        assert!(ctx.is_ready_for_retry(now + Duration::from_secs(61)));
    }

    #[test]
    fn timeout_detection() {
        let mut policy = RetryPolicy::no_retry();
        policy.timeout = Duration::from_millis(50);
        let mut ctx = ActionContext::new(1, "hang", Token::new(), policy, None);
        let now = Instant::now();
        ctx.start(now);
        assert!(!ctx.is_timed_out(now));
        assert!(ctx.is_timed_out(now + Duration::from_millis(50)));

        ctx.time_out(now + Duration::from_millis(50));
        assert_eq!(ctx.state(), ActionState::Error);
        assert!(ctx.last_result().is_error());
        assert!(!ctx.can_retry());
        ctx.mark_timed_out();
        assert_eq!(ctx.state(), ActionState::TimedOut);
    }

    #[test]
    fn callback_fires_exactly_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in_cb = Arc::clone(&calls);
        let callback: ActionCallback = Box::new(move |completion| {
            calls_in_cb.fetch_add(1, Ordering::SeqCst);
            assert_eq!(completion.id, 7);
            assert_eq!(completion.state, ActionState::Completed);
        });

        let mut ctx =
            ActionContext::new(7, "once", Token::new(), RetryPolicy::no_retry(), Some(callback));
        ctx.start(Instant::now());
        ctx.update(ActionResult::success());
        ctx.invoke_callback();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
