use std::time::Duration;
use thiserror::Error;

/// Abstract error classes forming the "is-a" hierarchy.
///
/// Replaces exception-inheritance matching: every [`EngineError`] projects
/// onto a class, and classes chain to a parent. A `Timeout` therefore
/// matches `Network`, `Runtime`, and `Timeout` itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Runtime,
    Network,
    Timeout,
    Connection,
    Resource,
    ActorNotFound,
    ResourceUnavailable,
    ResourceExhausted,
    Action,
    ActionCancelled,
    RetriesExhausted,
    Validation,
    Config,
}

impl ErrorClass {
    /// Parent class in the hierarchy, or `None` for roots.
    pub fn parent(self) -> Option<ErrorClass> {
        match self {
            ErrorClass::Runtime => None,
            ErrorClass::Network => Some(ErrorClass::Runtime),
            ErrorClass::Timeout => Some(ErrorClass::Network),
            ErrorClass::Connection => Some(ErrorClass::Network),
            ErrorClass::Resource => Some(ErrorClass::Runtime),
            ErrorClass::ActorNotFound => Some(ErrorClass::Resource),
            ErrorClass::ResourceUnavailable => Some(ErrorClass::Resource),
            ErrorClass::ResourceExhausted => Some(ErrorClass::Resource),
            ErrorClass::Action => Some(ErrorClass::Runtime),
            ErrorClass::ActionCancelled => Some(ErrorClass::Action),
            ErrorClass::RetriesExhausted => Some(ErrorClass::Action),
            ErrorClass::Validation => None,
            ErrorClass::Config => Some(ErrorClass::Validation),
        }
    }

    /// Whether this class is `other` or a descendant of it.
    pub fn is_a(self, other: ErrorClass) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class == other {
                return true;
            }
            current = class.parent();
        }
        false
    }
}

/// Structured errors raised by the engine and by action invokers.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("actor not found: {0}")]
    ActorNotFound(String),

    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("place at capacity: {0}")]
    ResourceExhausted(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("connection error to {endpoint}: {message}")]
    Connection { endpoint: String, message: String },

    #[error("timed out after {elapsed:?}: {message}")]
    Timeout { message: String, elapsed: Duration },

    #[error("action cancelled: {0}")]
    ActionCancelled(String),

    #[error("{action} failed after {attempts} attempts")]
    RetriesExhausted { action: String, attempts: u32 },

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl EngineError {
    /// The most specific class this error belongs to.
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::Config(_) => ErrorClass::Config,
            EngineError::ActorNotFound(_) => ErrorClass::ActorNotFound,
            EngineError::ResourceUnavailable(_) => ErrorClass::ResourceUnavailable,
            EngineError::ResourceExhausted(_) => ErrorClass::ResourceExhausted,
            EngineError::Network(_) => ErrorClass::Network,
            EngineError::Connection { .. } => ErrorClass::Connection,
            EngineError::Timeout { .. } => ErrorClass::Timeout,
            EngineError::ActionCancelled(_) => ErrorClass::ActionCancelled,
            EngineError::RetriesExhausted { .. } => ErrorClass::RetriesExhausted,
            EngineError::Runtime(_) => ErrorClass::Runtime,
        }
    }

    /// Subtype matching: true when the error's class is `class` or one of
    /// its descendants.
    pub fn is_a(&self, class: ErrorClass) -> bool {
        self.class().is_a(class)
    }

    pub fn timeout(message: impl Into<String>, elapsed: Duration) -> Self {
        EngineError::Timeout {
            message: message.into(),
            elapsed,
        }
    }
}
