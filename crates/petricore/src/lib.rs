//! Core abstractions for the petriflow engine
//!
//! This crate provides the net data model that all other components depend
//! on: tokens and their typed actors, the lockable FIFO token queue, places
//! with their named sub-queues, and the bipartite net with its enabling and
//! firing rules. It has no runtime loop of its own.

mod error;
mod net;
mod place;
mod queue;
mod result;
mod token;

pub use error::{EngineError, ErrorClass};
pub use net::{Arc, ArcDirection, FireOutcome, Net, Transition};
pub use place::{Place, PlaceRef, Subqueue};
pub use queue::{TokenId, TokenQueue};
pub use result::{ActionResult, ResultStatus};
pub use token::{Actor, Token};

/// Result type for core operations
pub type Result<T> = std::result::Result<T, EngineError>;
