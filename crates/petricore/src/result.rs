use crate::EngineError;

/// Status discriminant of an [`ActionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStatus {
    Success,
    Failure,
    InProgress,
    Error,
}

/// Result of one action invocation.
///
/// Invokers return `success()`, `failure()`, `in_progress()`, or
/// `error(..)`. Errors carry the structured taxonomy type, enabling
/// class-based filtering downstream.
#[derive(Debug, Clone)]
pub enum ActionResult {
    Success,
    Failure(Option<String>),
    InProgress,
    Error(EngineError),
}

impl ActionResult {
    pub fn success() -> Self {
        ActionResult::Success
    }

    pub fn failure() -> Self {
        ActionResult::Failure(None)
    }

    pub fn failure_with(message: impl Into<String>) -> Self {
        ActionResult::Failure(Some(message.into()))
    }

    pub fn in_progress() -> Self {
        ActionResult::InProgress
    }

    pub fn error(error: EngineError) -> Self {
        ActionResult::Error(error)
    }

    /// Error result from a bare message, classified as a generic runtime
    /// error.
    pub fn error_message(message: impl Into<String>) -> Self {
        ActionResult::Error(EngineError::Runtime(message.into()))
    }

    pub fn status(&self) -> ResultStatus {
        match self {
            ActionResult::Success => ResultStatus::Success,
            ActionResult::Failure(_) => ResultStatus::Failure,
            ActionResult::InProgress => ResultStatus::InProgress,
            ActionResult::Error(_) => ResultStatus::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ActionResult::Success)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ActionResult::Failure(_))
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, ActionResult::InProgress)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ActionResult::Error(_))
    }

    /// Everything except `InProgress` is terminal.
    pub fn is_terminal(&self) -> bool {
        !self.is_in_progress()
    }

    pub fn error_value(&self) -> Option<&EngineError> {
        match self {
            ActionResult::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn failure_message(&self) -> Option<&str> {
        match self {
            ActionResult::Failure(msg) => msg.as_deref(),
            _ => None,
        }
    }
}

impl Default for ActionResult {
    fn default() -> Self {
        ActionResult::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorClass;
    use std::time::Duration;

    #[test]
    fn status_and_terminality() {
        assert_eq!(ActionResult::success().status(), ResultStatus::Success);
        assert_eq!(ActionResult::failure().status(), ResultStatus::Failure);
        assert_eq!(ActionResult::in_progress().status(), ResultStatus::InProgress);
        assert!(ActionResult::success().is_terminal());
        assert!(ActionResult::failure().is_terminal());
        assert!(ActionResult::error_message("boom").is_terminal());
        assert!(!ActionResult::in_progress().is_terminal());
    }

    #[test]
    fn failure_message_carried() {
        let result = ActionResult::failure_with("no stock");
        assert_eq!(result.failure_message(), Some("no stock"));
        assert_eq!(ActionResult::failure().failure_message(), None);
    }

    #[test]
    fn error_payload_supports_class_matching() {
        let result = ActionResult::error(EngineError::timeout("slow", Duration::from_secs(1)));
        let err = result.error_value().unwrap();
        assert!(err.is_a(ErrorClass::Network));

        assert!(ActionResult::success().error_value().is_none());
    }
}
