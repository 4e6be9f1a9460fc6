use serde_json::{Map, Value, json};

use crate::foundation::core::{Affine, AffineJson, Size, SizeJson};
use crate::foundation::error::{MovingImagesError, MovingImagesResult};
use crate::foundation::time::{MediaTime, TimeRange};
use crate::reply::Reply;

/// How structured property values are returned (`getdatatype`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum DataType {
    #[default]
    JsonString,
    DictionaryObject,
}

impl DataType {
    pub(crate) fn parse(s: Option<&str>) -> MovingImagesResult<Self> {
        match s {
            None | Some("jsonstring") => Ok(Self::JsonString),
            Some("dictionaryobject") => Ok(Self::DictionaryObject),
            Some(other) => Err(MovingImagesError::invalid_parameter(format!(
                "unknown getdatatype '{other}'"
            ))),
        }
    }
}

/// A typed property value before it is shaped into a reply.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum PropertyValue {
    Str(String),
    Number(f64),
    Bool(bool),
    Time(MediaTime),
    Range(TimeRange),
    Size(Size),
    Transform(Affine),
    Dict(Map<String, Value>),
    List(Vec<Value>),
}

impl PropertyValue {
    pub(crate) fn str(s: impl Into<String>) -> Self {
        Self::Str(s.into())
    }

    pub(crate) fn int(n: impl Into<i64>) -> Self {
        Self::Number(n.into() as f64)
    }

    /// Value as it appears inside a `getproperties` dictionary.
    pub(crate) fn to_json(&self) -> Value {
        match self {
            Self::Str(s) => Value::String(s.clone()),
            Self::Number(n) => number_json(*n),
            Self::Bool(b) => Value::Bool(*b),
            Self::Time(t) => json!(t),
            Self::Range(r) => json!(r),
            Self::Size(s) => {
                let SizeJson { width, height } = SizeJson::from(*s);
                json!({"width": number_json(width), "height": number_json(height)})
            }
            Self::Transform(a) => {
                let m = AffineJson::from(*a);
                json!({
                    "m11": number_json(m.m11),
                    "m12": number_json(m.m12),
                    "m21": number_json(m.m21),
                    "m22": number_json(m.m22),
                    "tX": number_json(m.tx),
                    "tY": number_json(m.ty),
                })
            }
            Self::Dict(m) => Value::Object(m.clone()),
            Self::List(l) => Value::Array(l.clone()),
        }
    }

    pub(crate) fn into_reply(self, data_type: DataType) -> Reply {
        match self {
            Self::Str(s) => Reply::string(s),
            Self::Number(n) => Reply::number(n),
            Self::Bool(b) => Reply::boolean(b),
            Self::Dict(m) => {
                let text = Value::Object(m.clone()).to_string();
                Reply::dictionary(m).with_string(text)
            }
            Self::List(l) => Reply::string(Value::Array(l).to_string()),
            structured => {
                let seconds = match &structured {
                    Self::Time(t) => Some(t.seconds()),
                    _ => None,
                };
                let value = structured.to_json();
                let reply = match (data_type, value) {
                    (DataType::DictionaryObject, Value::Object(m)) => Reply::dictionary(m),
                    (_, v) => Reply::string(v.to_string()),
                };
                match seconds {
                    Some(s) => reply.with_number(s),
                    None => reply,
                }
            }
        }
    }
}

/// Integers without a fractional part serialize as JSON integers.
pub(crate) fn number_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/protocol/property.rs"]
mod tests;
