use crate::places::PlaceBehavior;
use crate::ActionExecutor;
use petricore::{Place, Token};
use std::any::Any;
use std::time::Instant;

/// Callback invoked with each token leaving the net through an exit place.
pub type ExitLoggerFn = Box<dyn FnMut(&str, &Token) + Send>;

/// Terminal place that logs and destroys tokens.
#[derive(Default)]
pub struct ExitLoggerBehavior {
    logger: Option<ExitLoggerFn>,
    exit_count: u64,
}

impl ExitLoggerBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_logger(&mut self, logger: ExitLoggerFn) {
        self.logger = Some(logger);
    }

    /// Count of tokens destroyed by this place.
    pub fn exit_count(&self) -> u64 {
        self.exit_count
    }

    fn consume(&mut self, place_id: &str, token: Token) {
        self.exit_count += 1;
        tracing::debug!(place = place_id, exits = self.exit_count, "token exited");
        if let Some(logger) = &mut self.logger {
            logger(place_id, &token);
        }
        // Token is dropped here, leaving the net.
    }
}

impl PlaceBehavior for ExitLoggerBehavior {
    fn on_token_enter(&mut self, place: &mut Place, token: Token, _executor: &mut ActionExecutor) {
        self.consume(place.id(), token);
    }

    /// Drain tokens that reached the queue without passing through
    /// `on_token_enter`.
    fn tick(&mut self, place: &mut Place, _now: Instant, _epoch: u64) {
        let place_id = place.id().to_string();
        while let Some((_, token)) = place.remove_token() {
            self.consume(&place_id, token);
        }
    }

    fn type_name(&self) -> &'static str {
        "ExitLoggerBehavior"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
