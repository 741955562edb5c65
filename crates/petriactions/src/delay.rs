use petricore::{ActionResult, Token};
use petriruntime::ActionInvoker;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const DEADLINE_KEY: &str = "_delay_deadline_ms";

/// Action that holds a token for a duration.
///
/// Returns `InProgress` until the delay has elapsed, then `Success`. The
/// deadline is stored in the token's data (epoch milliseconds) so the
/// action stays stateless across polls. Tokens may override the default
/// with a `delay_ms` data value.
pub struct DelayAction {
    default_delay: Duration,
}

impl DelayAction {
    pub fn new(default_delay: Duration) -> Self {
        Self { default_delay }
    }

    pub fn default_delay(&self) -> Duration {
        self.default_delay
    }

    pub fn execute(&self, token: &mut Token) -> ActionResult {
        let now_ms = chrono::Utc::now().timestamp_millis();

        match token.get_data(DEADLINE_KEY).and_then(|v| v.as_i64()) {
            None => {
                let delay_ms = token
                    .get_data("delay_ms")
                    .and_then(|v| v.as_i64())
                    .unwrap_or(self.default_delay.as_millis() as i64);
                token.set_data(DEADLINE_KEY, json!(now_ms + delay_ms));
                ActionResult::in_progress()
            }
            Some(deadline) if now_ms >= deadline => {
                // Clear the marker so the token can be delayed again.
                if let Some(map) = token.data_mut().as_object_mut() {
                    map.remove(DEADLINE_KEY);
                }
                ActionResult::success()
            }
            Some(_) => ActionResult::in_progress(),
        }
    }

    pub fn into_invoker(self) -> ActionInvoker {
        Arc::new(move |_actor, token| self.execute(token))
    }
}

impl Default for DelayAction {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
