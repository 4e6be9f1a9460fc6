use serde_json::{Map, Value};

use crate::expression;
use crate::foundation::core::{Affine, AffineJson, Color, Point, Rect, Size};
use crate::foundation::error::{MovingImagesError, MovingImagesResult};
use crate::foundation::time::{MediaTime, PREFERRED_TIMESCALE, TimeRange};
use crate::variables::Variables;

/// Typed view over one JSON object of a command.
///
/// Numeric fields may be JSON numbers or equation strings such as `"$width * 0.5"`. With no
/// variables attached (validation mode) equations are only syntax checked and read as `0`.
#[derive(Clone, Copy)]
pub(crate) struct Fields<'a> {
    map: &'a Map<String, Value>,
    vars: Option<&'a Variables>,
}

impl<'a> Fields<'a> {
    pub(crate) fn new(v: &'a Value, vars: Option<&'a Variables>) -> MovingImagesResult<Self> {
        match v {
            Value::Object(map) => Ok(Self { map, vars }),
            other => Err(MovingImagesError::invalid_parameter(format!(
                "expected a dictionary, got {}",
                type_name(other)
            ))),
        }
    }

    /// Same variables, another object.
    pub(crate) fn with(&self, v: &'a Value) -> MovingImagesResult<Self> {
        Self::new(v, self.vars)
    }

    pub(crate) fn vars(&self) -> Option<&'a Variables> {
        self.vars
    }

    pub(crate) fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    pub(crate) fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn required(&self, key: &str) -> MovingImagesResult<&'a Value> {
        self.get(key)
            .ok_or_else(|| MovingImagesError::invalid_parameter(format!("missing '{key}'")))
    }

    pub(crate) fn nested(&self, key: &str) -> MovingImagesResult<Self> {
        self.with(self.required(key)?)
            .map_err(|e| MovingImagesError::invalid_parameter(format!("'{key}': {e}")))
    }

    pub(crate) fn opt_nested(&self, key: &str) -> MovingImagesResult<Option<Self>> {
        self.get(key).map(|_| self.nested(key)).transpose()
    }

    pub(crate) fn str(&self, key: &str) -> MovingImagesResult<&'a str> {
        match self.required(key)? {
            Value::String(s) => Ok(s),
            other => Err(MovingImagesError::invalid_parameter(format!(
                "'{key}' must be a string, got {}",
                type_name(other)
            ))),
        }
    }

    pub(crate) fn opt_str(&self, key: &str) -> MovingImagesResult<Option<&'a str>> {
        self.get(key).map(|_| self.str(key)).transpose()
    }

    pub(crate) fn f64(&self, key: &str) -> MovingImagesResult<f64> {
        self.number(self.required(key)?)
            .map_err(|e| prefix_key(key, e))
    }

    pub(crate) fn opt_f64(&self, key: &str) -> MovingImagesResult<Option<f64>> {
        self.get(key).map(|_| self.f64(key)).transpose()
    }

    pub(crate) fn u64(&self, key: &str) -> MovingImagesResult<u64> {
        let v = self.f64(key)?;
        if !v.is_finite() || v < 0.0 || v.fract() != 0.0 {
            return Err(MovingImagesError::invalid_parameter(format!(
                "'{key}' must be a non-negative integer, got {v}"
            )));
        }
        Ok(v as u64)
    }

    pub(crate) fn opt_u64(&self, key: &str) -> MovingImagesResult<Option<u64>> {
        self.get(key).map(|_| self.u64(key)).transpose()
    }

    pub(crate) fn opt_bool(&self, key: &str) -> MovingImagesResult<Option<bool>> {
        let Some(v) = self.get(key) else {
            return Ok(None);
        };
        match v {
            Value::Bool(b) => Ok(Some(*b)),
            Value::String(s) if s.eq_ignore_ascii_case("yes") || s == "true" => Ok(Some(true)),
            Value::String(s) if s.eq_ignore_ascii_case("no") || s == "false" => Ok(Some(false)),
            other => Ok(Some(self.number(other).map_err(|e| prefix_key(key, e))? != 0.0)),
        }
    }

    pub(crate) fn bool_or(&self, key: &str, default: bool) -> MovingImagesResult<bool> {
        Ok(self.opt_bool(key)?.unwrap_or(default))
    }

    pub(crate) fn array(&self, key: &str) -> MovingImagesResult<&'a [Value]> {
        match self.required(key)? {
            Value::Array(a) => Ok(a),
            other => Err(MovingImagesError::invalid_parameter(format!(
                "'{key}' must be an array, got {}",
                type_name(other)
            ))),
        }
    }

    pub(crate) fn opt_array(&self, key: &str) -> MovingImagesResult<&'a [Value]> {
        match self.get(key) {
            None => Ok(&[]),
            Some(_) => self.array(key),
        }
    }

    /// Number or equation string.
    pub(crate) fn number(&self, v: &Value) -> MovingImagesResult<f64> {
        match v {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| MovingImagesError::invalid_parameter("number out of range")),
            Value::String(src) => match self.vars {
                Some(vars) => expression::evaluate(src, |name| vars.number(name)),
                None => {
                    expression::compile::compile_source(src)?;
                    Ok(0.0)
                }
            },
            other => Err(MovingImagesError::invalid_parameter(format!(
                "expected a number, got {}",
                type_name(other)
            ))),
        }
    }

    pub(crate) fn point(&self, key: &str) -> MovingImagesResult<Point> {
        let p = self.nested(key)?;
        Ok(Point::new(p.f64("x")?, p.f64("y")?))
    }

    pub(crate) fn opt_point(&self, key: &str) -> MovingImagesResult<Option<Point>> {
        self.get(key).map(|_| self.point(key)).transpose()
    }

    pub(crate) fn size(&self, key: &str) -> MovingImagesResult<Size> {
        let s = self.nested(key)?;
        Ok(Size::new(s.f64("width")?, s.f64("height")?))
    }

    /// `{origin: {x, y}, size: {width, height}}`; negative sizes are normalized.
    pub(crate) fn rect(&self, key: &str) -> MovingImagesResult<Rect> {
        let r = self.nested(key)?;
        let origin = r.point("origin")?;
        let size = r.size("size")?;
        Ok(Rect::from_origin_size(origin, size).abs())
    }

    pub(crate) fn opt_rect(&self, key: &str) -> MovingImagesResult<Option<Rect>> {
        self.get(key).map(|_| self.rect(key)).transpose()
    }

    pub(crate) fn color(&self, key: &str) -> MovingImagesResult<Color> {
        let c = self.nested(key)?;
        Ok(Color::new(
            c.f64("red")?,
            c.f64("green")?,
            c.f64("blue")?,
            c.opt_f64("alpha")?.unwrap_or(1.0),
        ))
    }

    pub(crate) fn opt_color(&self, key: &str) -> MovingImagesResult<Option<Color>> {
        self.get(key).map(|_| self.color(key)).transpose()
    }

    /// A time in the full `{flags, value, timescale, epoch}` shape or as `{"time": seconds}`.
    pub(crate) fn time(&self, key: &str) -> MovingImagesResult<MediaTime> {
        let t = self.nested(key)?;
        t.as_time().map_err(|e| prefix_key(key, e))
    }

    pub(crate) fn opt_time(&self, key: &str) -> MovingImagesResult<Option<MediaTime>> {
        self.get(key).map(|_| self.time(key)).transpose()
    }

    /// Read this object itself as a time.
    pub(crate) fn as_time(&self) -> MovingImagesResult<MediaTime> {
        if self.has("time") {
            return Ok(MediaTime::from_seconds(self.f64("time")?, PREFERRED_TIMESCALE));
        }
        let value = self.f64("value")?;
        let timescale = self.f64("timescale")?;
        if value.fract() != 0.0 || timescale.fract() != 0.0 || timescale < 0.0 {
            return Err(MovingImagesError::invalid_parameter(
                "time value and timescale must be integers",
            ));
        }
        Ok(MediaTime {
            flags: self
                .opt_u64("flags")?
                .map_or(MediaTime::FLAG_VALID, |f| f as u32),
            value: value as i64,
            timescale: timescale as i32,
            epoch: self.opt_f64("epoch")?.unwrap_or(0.0) as i64,
        })
    }

    pub(crate) fn time_range(&self, key: &str) -> MovingImagesResult<TimeRange> {
        let r = self.nested(key)?;
        Ok(TimeRange::new(r.time("start")?, r.time("duration")?))
    }

    pub(crate) fn opt_time_range(&self, key: &str) -> MovingImagesResult<Option<TimeRange>> {
        self.get(key).map(|_| self.time_range(key)).transpose()
    }

    /// `contexttransformation` steps or an `affinetransform` dictionary; identity when absent.
    pub(crate) fn transform(&self) -> MovingImagesResult<Affine> {
        if self.has("contexttransformation") {
            return transformation_steps(self, self.array("contexttransformation")?);
        }
        if let Some(a) = self.opt_nested("affinetransform")? {
            return a.as_affine();
        }
        Ok(Affine::IDENTITY)
    }

    /// Read this object itself as `{m11, m12, m21, m22, tX, tY}`.
    pub(crate) fn as_affine(&self) -> MovingImagesResult<Affine> {
        Ok(Affine::from(AffineJson {
            m11: self.f64("m11")?,
            m12: self.f64("m12")?,
            m21: self.f64("m21")?,
            m22: self.f64("m22")?,
            tx: self.f64("tX")?,
            ty: self.f64("tY")?,
        }))
    }

    /// A value that is either a transformation step list or an affine dictionary.
    pub(crate) fn transform_value(&self, v: &'a Value) -> MovingImagesResult<Affine> {
        match v {
            Value::Array(steps) => transformation_steps(self, steps),
            Value::Object(_) => self.with(v)?.as_affine(),
            other => Err(MovingImagesError::invalid_parameter(format!(
                "expected a transformation, got {}",
                type_name(other)
            ))),
        }
    }
}

/// Concatenate steps so the first listed applies outermost, like successive CTM edits.
fn transformation_steps(f: &Fields<'_>, steps: &[Value]) -> MovingImagesResult<Affine> {
    let mut out = Affine::IDENTITY;
    for step in steps {
        let s = f.with(step)?;
        let m = match s.str("transformationtype")? {
            "translate" => {
                let t = s.nested("translation")?;
                Affine::translate((t.f64("x")?, t.f64("y")?))
            }
            "scale" => {
                let k = s.nested("scale")?;
                Affine::scale_non_uniform(k.f64("x")?, k.f64("y")?)
            }
            "rotate" => Affine::rotate(s.f64("rotation")?),
            other => {
                return Err(MovingImagesError::invalid_parameter(format!(
                    "unknown transformationtype '{other}'"
                )));
            }
        };
        out *= m;
    }
    Ok(out)
}

fn prefix_key(key: &str, e: MovingImagesError) -> MovingImagesError {
    match e {
        MovingImagesError::InvalidParameter(m) => {
            MovingImagesError::invalid_parameter(format!("'{key}': {m}"))
        }
        other => other,
    }
}

pub(crate) fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a dictionary",
    }
}

#[cfg(test)]
#[path = "../../tests/unit/protocol/values.rs"]
mod tests;
