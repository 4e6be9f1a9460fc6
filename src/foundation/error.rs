use crate::reply::ErrorCode;

/// Convenience result type used across movingimages.
pub type MovingImagesResult<T> = Result<T, MovingImagesError>;

/// Top-level error taxonomy used by the command engine.
///
/// Every variant maps onto exactly one stable [`ErrorCode`] so the dispatcher can turn any
/// internal failure into a reply without losing its class.
#[derive(thiserror::Error, Debug)]
pub enum MovingImagesError {
    /// Unknown verb, or a command that is not a JSON object.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// A required field is missing or has the wrong shape.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The property key does not apply to this object or its current state.
    #[error("invalid property: {0}")]
    InvalidProperty(String),

    /// The collaborator (codec, exporter, backend) rejected a structurally valid request.
    #[error("operation failed: {0}")]
    OperationFailed(String),

    /// A path substitution or `$variable` has no binding in the context.
    #[error("missing variable: {0}")]
    MissingVariable(String),

    /// Unknown object type in a create command or selector.
    #[error("invalid object type: {0}")]
    InvalidObjectType(String),

    /// The selector does not resolve to a live object.
    #[error("invalid receiver object: {0}")]
    InvalidReceiver(String),

    /// No image with this identifier in the context's image collection.
    #[error("invalid image identifier: {0}")]
    InvalidImageIdentifier(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MovingImagesError {
    /// Build a [`MovingImagesError::InvalidCommand`] value.
    pub fn invalid_command(msg: impl Into<String>) -> Self {
        Self::InvalidCommand(msg.into())
    }

    /// Build a [`MovingImagesError::InvalidParameter`] value.
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Build a [`MovingImagesError::InvalidProperty`] value.
    pub fn invalid_property(msg: impl Into<String>) -> Self {
        Self::InvalidProperty(msg.into())
    }

    /// Build a [`MovingImagesError::OperationFailed`] value.
    pub fn operation_failed(msg: impl Into<String>) -> Self {
        Self::OperationFailed(msg.into())
    }

    /// Build a [`MovingImagesError::MissingVariable`] value.
    pub fn missing_variable(msg: impl Into<String>) -> Self {
        Self::MissingVariable(msg.into())
    }

    /// Build a [`MovingImagesError::InvalidObjectType`] value.
    pub fn invalid_object_type(msg: impl Into<String>) -> Self {
        Self::InvalidObjectType(msg.into())
    }

    /// Build a [`MovingImagesError::InvalidReceiver`] value.
    pub fn invalid_receiver(msg: impl Into<String>) -> Self {
        Self::InvalidReceiver(msg.into())
    }

    /// Build a [`MovingImagesError::InvalidImageIdentifier`] value.
    pub fn invalid_image_identifier(msg: impl Into<String>) -> Self {
        Self::InvalidImageIdentifier(msg.into())
    }

    /// Stable reply code for this error class.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidCommand(_) => ErrorCode::InvalidCommand,
            Self::InvalidParameter(_) => ErrorCode::InvalidParameter,
            Self::InvalidProperty(_) => ErrorCode::InvalidProperty,
            Self::OperationFailed(_) | Self::Other(_) => ErrorCode::OperationFailed,
            Self::MissingVariable(_) => ErrorCode::MissingVariable,
            Self::InvalidObjectType(_) => ErrorCode::InvalidObjectType,
            Self::InvalidReceiver(_) => ErrorCode::InvalidReceiverObject,
            Self::InvalidImageIdentifier(_) => ErrorCode::InvalidImageIdentifier,
        }
    }
}

impl From<serde_json::Error> for MovingImagesError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidParameter(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
