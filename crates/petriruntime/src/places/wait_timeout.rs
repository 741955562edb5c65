use crate::places::PlaceBehavior;
use crate::ActionExecutor;
use petricore::{Place, Subqueue, Token, TokenId};
use std::any::Any;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Predicate deciding whether a waiting token may proceed.
pub type WaitCondition = Box<dyn Fn(&Token) -> bool + Send>;

/// Callback run against a token whose wait timed out, before it moves to
/// the `failure` sub-queue.
pub type TimeoutCallback = Box<dyn FnMut(&mut Token) + Send>;

/// Place holding tokens until a condition is met or a deadline passes.
///
/// Waiting tokens live in the `main` sub-queue. Each tick, a token whose
/// condition holds moves to `success`; one whose deadline has passed moves
/// to `failure`. Tokens consumed out of `main` by a transition between
/// ticks are forgotten silently.
pub struct WaitTimeoutBehavior {
    timeout: Duration,
    timeout_tag: Option<String>,
    condition: Option<WaitCondition>,
    timeout_callback: Option<TimeoutCallback>,
    deadlines: HashMap<TokenId, Instant>,
}

impl WaitTimeoutBehavior {
    pub fn new(place: &mut Place, timeout: Duration, timeout_tag: Option<String>) -> Self {
        place.enable_subqueues();
        Self {
            timeout,
            timeout_tag,
            condition: None,
            timeout_callback: None,
            deadlines: HashMap::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_condition(&mut self, condition: WaitCondition) {
        self.condition = Some(condition);
    }

    pub fn set_timeout_callback(&mut self, callback: TimeoutCallback) {
        self.timeout_callback = Some(callback);
    }

    /// Number of tokens currently waiting.
    pub fn waiting_count(&self) -> usize {
        self.deadlines.len()
    }
}

impl PlaceBehavior for WaitTimeoutBehavior {
    fn on_token_enter(&mut self, place: &mut Place, token: Token, _executor: &mut ActionExecutor) {
        let deadline = Instant::now() + self.timeout;
        let id = place.sub_mut(Subqueue::Main).push(token);
        self.deadlines.insert(id, deadline);
    }

    fn tick(&mut self, place: &mut Place, now: Instant, _epoch: u64) {
        let waiting: Vec<(TokenId, Instant)> =
            self.deadlines.iter().map(|(id, at)| (*id, *at)).collect();

        for (id, deadline) in waiting {
            let Some(token) = place.sub(Subqueue::Main).get(id) else {
                // Consumed by a transition between ticks.
                self.deadlines.remove(&id);
                continue;
            };

            let satisfied = self.condition.as_ref().map(|c| c(token)).unwrap_or(false);
            if satisfied {
                place.move_token(id, Some(Subqueue::Main), Some(Subqueue::Success));
                self.deadlines.remove(&id);
                continue;
            }

            if now >= deadline {
                if let Some(mut token) = place.sub_mut(Subqueue::Main).remove(id) {
                    tracing::debug!(
                        place = place.id(),
                        on_timeout = self.timeout_tag.as_deref().unwrap_or(""),
                        "wait timed out"
                    );
                    if let Some(callback) = &mut self.timeout_callback {
                        callback(&mut token);
                    }
                    place.sub_mut(Subqueue::Failure).push(token);
                }
                self.deadlines.remove(&id);
            }
        }
    }

    fn type_name(&self) -> &'static str {
        "WaitTimeoutBehavior"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
