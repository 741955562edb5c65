//! Specialised place behaviours
//!
//! Every place in a net has a behaviour bound to it. Behaviours add policy
//! on top of basic token storage: entrypoints accept external injection,
//! action places dispatch tokens to the executor and route results into
//! sub-queues, wait places hold tokens against a deadline, exit places log
//! and destroy. The controller delivers transition arrivals through
//! `on_token_enter` and drives periodic work through `tick`.

mod action;
mod entrypoint;
mod exit_logger;
mod plain;
mod resource_pool;
mod wait_timeout;

pub use action::ActionBehavior;
pub use entrypoint::{EntrypointBehavior, TokenValidator};
pub use exit_logger::{ExitLoggerBehavior, ExitLoggerFn};
pub use plain::PlainBehavior;
pub use resource_pool::ResourcePoolBehavior;
pub use wait_timeout::{TimeoutCallback, WaitCondition, WaitTimeoutBehavior};

use crate::{ActionExecutor, ActionState};
use petricore::{Place, Subqueue, Token};
use std::any::Any;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Policy attached to a place.
///
/// The behaviour and its place are separate owners: the controller owns the
/// net (and thus the places) and hands `&mut Place` into each hook. Tokens
/// delivered to `on_token_enter` are owned by the hook; a behaviour that
/// wants them to stay in the place must put them back.
pub trait PlaceBehavior: Send {
    /// Called for each token delivered to the place's default queue by a
    /// fired transition. Sub-queue arrivals bypass this hook.
    fn on_token_enter(&mut self, place: &mut Place, token: Token, executor: &mut ActionExecutor);

    /// Called once per tick for timeouts, condition checks, and
    /// housekeeping.
    fn tick(&mut self, place: &mut Place, now: Instant, epoch: u64);

    fn type_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A completed action's token on its way to a sub-queue.
pub struct RoutedCompletion {
    pub place_id: String,
    pub sub: Subqueue,
    pub action_name: String,
    pub state: ActionState,
    pub token: Token,
}

/// Shared channel between action completion callbacks and the controller.
///
/// Callbacks fire inside `ActionExecutor::poll` and cannot reach the net,
/// so they push routed tokens here; the controller drains the router into
/// the destination sub-queues immediately after polling, within the same
/// tick.
#[derive(Clone, Default)]
pub struct CompletionRouter {
    queue: Arc<Mutex<VecDeque<RoutedCompletion>>>,
}

impl CompletionRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, routed: RoutedCompletion) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(routed);
        }
    }

    pub fn drain(&self) -> Vec<RoutedCompletion> {
        match self.queue.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
