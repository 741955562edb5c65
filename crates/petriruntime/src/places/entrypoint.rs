use crate::places::PlaceBehavior;
use crate::ActionExecutor;
use petricore::{Place, Token, TokenId};
use std::any::Any;
use std::time::Instant;

/// Predicate run against tokens offered to an entrypoint.
pub type TokenValidator = Box<dyn Fn(&Token) -> bool + Send>;

/// Place accepting external token injection.
///
/// Entrypoints are the starting points of a workflow: external systems
/// inject tokens here to trigger processing. The graph-level contract is
/// that no transition feeds an entrypoint.
#[derive(Default)]
pub struct EntrypointBehavior {
    validator: Option<TokenValidator>,
    injected_count: u64,
}

impl EntrypointBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a validator for incoming tokens. Rejected tokens are dropped.
    pub fn set_validator(&mut self, validator: TokenValidator) {
        self.validator = Some(validator);
    }

    /// Inject a token from an external source.
    ///
    /// Returns the token id, or `None` when the validator rejects the token
    /// (the token is dropped) or the place is at capacity.
    pub fn inject(&mut self, place: &mut Place, token: Token) -> Option<TokenId> {
        if let Some(validator) = &self.validator {
            if !validator(&token) {
                tracing::debug!(place = place.id(), "token rejected by validator");
                return None;
            }
        }

        match place.add_token(token) {
            Ok(id) => {
                self.injected_count += 1;
                Some(id)
            }
            Err(err) => {
                tracing::warn!(place = place.id(), %err, "injection refused");
                None
            }
        }
    }

    /// Count of tokens accepted through `inject`.
    pub fn injected_count(&self) -> u64 {
        self.injected_count
    }
}

impl PlaceBehavior for EntrypointBehavior {
    fn on_token_enter(&mut self, place: &mut Place, token: Token, _executor: &mut ActionExecutor) {
        // Tokens enter via inject(); an inbound arc violates the graph
        // contract, but the token is kept rather than lost.
        tracing::warn!(place = place.id(), "transition delivered a token to an entrypoint");
        place.tokens_mut().push(token);
    }

    fn tick(&mut self, _place: &mut Place, _now: Instant, _epoch: u64) {}

    fn type_name(&self) -> &'static str {
        "EntrypointBehavior"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
