//! Behavior-net execution runtime
//!
//! This crate drives [`petricore`] nets: it owns the action executor with
//! its retry and timeout state machines, the specialised place behaviours,
//! the action registry, the configuration model, and the controller that
//! ties them together into deterministic ticks.

mod config;
mod context;
mod controller;
mod executor;
pub mod places;
mod registry;
mod retry;

pub use config::{
    ActionConfig, ActionPlaceParams, ActorConfig, ConfigReport, EntrypointParams, NetConfig,
    OutputArcConfig, ParamSpec, PlaceConfig, PlaceTypeTag, ResourcePoolParams, TransitionConfig,
    WaitWithTimeoutParams,
};
pub use context::{ActionCallback, ActionCompletion, ActionContext, ActionId, ActionState};
pub use controller::{RuntimeController, RuntimeState, RuntimeStats};
pub use executor::{ActionExecutor, ActionInvoker};
pub use registry::ActionRegistry;
pub use retry::RetryPolicy;
