use crate::foundation::error::MovingImagesError;

/// Syntax or evaluation failure in an equation string; `at` is a byte offset into it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("equation error at byte {at}: {reason}")]
pub(crate) struct EquationError {
    pub(crate) at: usize,
    pub(crate) reason: String,
}

impl EquationError {
    pub(crate) fn new(at: usize, reason: impl Into<String>) -> Self {
        Self {
            at,
            reason: reason.into(),
        }
    }
}

impl From<EquationError> for MovingImagesError {
    fn from(e: EquationError) -> Self {
        MovingImagesError::invalid_parameter(e.to_string())
    }
}
