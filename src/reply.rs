//! Structured results returned by every command and batch.

use serde_json::{Map, Value};

use crate::foundation::error::MovingImagesError;

/// Stable numeric reply codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Success.
    NoError,
    /// Unknown verb, or a command that is not a JSON object.
    InvalidCommand,
    /// A required field is missing or malformed.
    InvalidParameter,
    /// The property key does not apply to the object or its current state.
    InvalidProperty,
    /// A collaborator rejected a structurally valid request.
    OperationFailed,
    /// Unbound variable or path substitution.
    MissingVariable,
    /// Unknown object type.
    InvalidObjectType,
    /// The selector does not resolve to a live object.
    InvalidReceiverObject,
    /// No image with that identifier in the collection.
    InvalidImageIdentifier,
}

impl ErrorCode {
    /// Wire value of the code.
    pub fn as_u32(self) -> u32 {
        match self {
            Self::NoError => 0,
            Self::InvalidCommand => 240,
            Self::InvalidParameter => 241,
            Self::InvalidProperty => 242,
            Self::OperationFailed => 243,
            Self::MissingVariable => 244,
            Self::InvalidObjectType => 245,
            Self::InvalidReceiverObject => 246,
            Self::InvalidImageIdentifier => 247,
        }
    }

    /// Inverse of [`ErrorCode::as_u32`].
    pub fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            0 => Self::NoError,
            240 => Self::InvalidCommand,
            241 => Self::InvalidParameter,
            242 => Self::InvalidProperty,
            243 => Self::OperationFailed,
            244 => Self::MissingVariable,
            245 => Self::InvalidObjectType,
            246 => Self::InvalidReceiverObject,
            247 => Self::InvalidImageIdentifier,
            _ => return None,
        })
    }
}

/// Result of a command: a code plus optional string, numeric and dictionary values.
///
/// On failure the string value carries a diagnostic meant for humans only.
#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
    code: ErrorCode,
    string: Option<String>,
    number: Option<f64>,
    dictionary: Option<Map<String, Value>>,
}

impl Default for Reply {
    fn default() -> Self {
        Self::ok()
    }
}

impl Reply {
    /// Success without a value.
    pub fn ok() -> Self {
        Self {
            code: ErrorCode::NoError,
            string: None,
            number: None,
            dictionary: None,
        }
    }

    /// Failure with a diagnostic message.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            string: Some(message.into()),
            number: None,
            dictionary: None,
        }
    }

    /// Success carrying a string.
    pub fn string(s: impl Into<String>) -> Self {
        Self {
            string: Some(s.into()),
            ..Self::ok()
        }
    }

    /// Success carrying a number and its textual form.
    pub fn number(n: f64) -> Self {
        Self {
            string: Some(format_number(n)),
            number: Some(n),
            ..Self::ok()
        }
    }

    /// `"YES"`/`"NO"` with 1/0.
    pub fn boolean(b: bool) -> Self {
        Self {
            string: Some(if b { "YES" } else { "NO" }.to_string()),
            number: Some(if b { 1.0 } else { 0.0 }),
            ..Self::ok()
        }
    }

    /// Success carrying a dictionary.
    pub fn dictionary(map: Map<String, Value>) -> Self {
        Self {
            dictionary: Some(map),
            ..Self::ok()
        }
    }

    /// Attach a numeric value.
    pub fn with_number(mut self, n: f64) -> Self {
        self.number = Some(n);
        self
    }

    /// Attach a string value.
    pub fn with_string(mut self, s: impl Into<String>) -> Self {
        self.string = Some(s.into());
        self
    }

    /// Attach a dictionary value.
    pub fn with_dictionary(mut self, map: Map<String, Value>) -> Self {
        self.dictionary = Some(map);
        self
    }

    /// Reply code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Whether the code is [`ErrorCode::NoError`].
    pub fn is_ok(&self) -> bool {
        self.code == ErrorCode::NoError
    }

    /// String value, if any.
    pub fn string_value(&self) -> Option<&str> {
        self.string.as_deref()
    }

    /// Numeric value, if any.
    pub fn number_value(&self) -> Option<f64> {
        self.number
    }

    /// Dictionary value, if any.
    pub fn dictionary_value(&self) -> Option<&Map<String, Value>> {
        self.dictionary.as_ref()
    }

    /// Render as `{"error": code, "stringvalue"?, "numericvalue"?, "dictionaryvalue"?}`.
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("error".to_string(), Value::from(self.code.as_u32()));
        if let Some(s) = &self.string {
            out.insert("stringvalue".to_string(), Value::from(s.clone()));
        }
        if let Some(n) = self.number {
            out.insert("numericvalue".to_string(), Value::from(n));
        }
        if let Some(d) = &self.dictionary {
            out.insert("dictionaryvalue".to_string(), Value::Object(d.clone()));
        }
        Value::Object(out)
    }
}

impl From<MovingImagesError> for Reply {
    fn from(e: MovingImagesError) -> Self {
        Self::error(e.code(), e.to_string())
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
#[path = "../tests/unit/reply.rs"]
mod tests;
