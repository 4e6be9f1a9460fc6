use std::cmp::Ordering;

use crate::foundation::error::{MovingImagesError, MovingImagesResult};
use crate::foundation::math::{div_round_i128, gcd_i64};

/// Timescale used when a time is given in seconds (`{"time": 1.5}`).
pub const PREFERRED_TIMESCALE: i32 = 6000;

/// Rational media time with the fixed wire shape `{flags, value, timescale, epoch}`.
///
/// `seconds = value / timescale`. The same instant may be expressed at different
/// timescales, so equality of the struct is structural; use [`MediaTime::cmp_time`] to
/// compare instants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub struct MediaTime {
    /// Bit set of the `FLAG_*` constants.
    pub flags: u32,
    /// Numerator.
    pub value: i64,
    /// Denominator, ticks per second.
    pub timescale: i32,
    /// Epoch, carried through unchanged.
    pub epoch: i64,
}

impl MediaTime {
    /// The time is valid.
    pub const FLAG_VALID: u32 = 1;
    /// The value was rounded when converted from another timescale.
    pub const FLAG_HAS_BEEN_ROUNDED: u32 = 2;
    /// Positive infinity.
    pub const FLAG_POSITIVE_INFINITY: u32 = 4;
    /// Negative infinity.
    pub const FLAG_NEGATIVE_INFINITY: u32 = 8;
    /// Indefinite (unknown) time.
    pub const FLAG_INDEFINITE: u32 = 16;

    /// Valid time `value / timescale`.
    pub fn new(value: i64, timescale: i32) -> Self {
        Self {
            flags: Self::FLAG_VALID,
            value,
            timescale,
            epoch: 0,
        }
    }

    /// Zero in timescale 1, the duration of an empty composition.
    pub fn zero() -> Self {
        Self::new(0, 1)
    }

    /// The all-zero, invalid time.
    pub fn invalid() -> Self {
        Self {
            flags: 0,
            value: 0,
            timescale: 0,
            epoch: 0,
        }
    }

    /// Convert seconds at `timescale`, rounding to nearest.
    pub fn from_seconds(seconds: f64, timescale: i32) -> Self {
        Self::new((seconds * f64::from(timescale)).round() as i64, timescale)
    }

    /// Whether the valid flag is set and the timescale is positive.
    pub fn is_valid(&self) -> bool {
        self.flags & Self::FLAG_VALID != 0 && self.timescale > 0
    }

    /// Whether this is a finite valid time.
    pub fn is_numeric(&self) -> bool {
        self.is_valid()
            && self.flags
                & (Self::FLAG_POSITIVE_INFINITY
                    | Self::FLAG_NEGATIVE_INFINITY
                    | Self::FLAG_INDEFINITE)
                == 0
    }

    /// Value in seconds; `0.0` for invalid times.
    pub fn seconds(&self) -> f64 {
        if !self.is_numeric() {
            return 0.0;
        }
        self.value as f64 / f64::from(self.timescale)
    }

    /// Re-express at `timescale`, rounding to nearest.
    pub fn convert_scale(&self, timescale: i32) -> Self {
        if !self.is_numeric() || timescale <= 0 || timescale == self.timescale {
            return *self;
        }
        let num = i128::from(self.value) * i128::from(timescale);
        let den = i128::from(self.timescale);
        let value = div_round_i128(num, den);
        let mut t = Self {
            flags: self.flags,
            value: value as i64,
            timescale,
            epoch: self.epoch,
        };
        if num % den != 0 {
            t.flags |= Self::FLAG_HAS_BEEN_ROUNDED;
        }
        t
    }

    /// Order two instants regardless of timescale. Invalid times order first.
    pub fn cmp_time(&self, other: &Self) -> Ordering {
        match (self.is_numeric(), other.is_numeric()) {
            (false, false) => return Ordering::Equal,
            (false, true) => return Ordering::Less,
            (true, false) => return Ordering::Greater,
            (true, true) => {}
        }
        let a = i128::from(self.value) * i128::from(other.timescale);
        let b = i128::from(other.value) * i128::from(self.timescale);
        a.cmp(&b)
    }

    /// Sum of two times, at a common timescale.
    pub fn add(&self, other: &Self) -> Self {
        if !self.is_numeric() {
            return *other;
        }
        if !other.is_numeric() {
            return *self;
        }
        let ts = common_timescale(self.timescale, other.timescale);
        let a = self.convert_scale(ts);
        let b = other.convert_scale(ts);
        Self {
            flags: (a.flags | b.flags) & (Self::FLAG_VALID | Self::FLAG_HAS_BEEN_ROUNDED),
            value: a.value.saturating_add(b.value),
            timescale: ts,
            epoch: self.epoch,
        }
    }

    /// Difference `self - other`, at a common timescale.
    pub fn sub(&self, other: &Self) -> Self {
        self.add(&Self {
            value: other.value.saturating_neg(),
            ..*other
        })
    }

    /// Later of two instants.
    pub fn max(self, other: Self) -> Self {
        if self.cmp_time(&other) == Ordering::Less {
            other
        } else {
            self
        }
    }

    /// Earlier of two instants.
    pub fn min(self, other: Self) -> Self {
        if self.cmp_time(&other) == Ordering::Greater {
            other
        } else {
            self
        }
    }

    /// Parse a JSON time: the full shape or `{"time": seconds}`.
    pub fn from_json(value: &serde_json::Value) -> MovingImagesResult<Self> {
        serde_json::from_value(value.clone())
            .map_err(|e| MovingImagesError::invalid_parameter(format!("time value: {e}")))
    }

    /// Compact JSON string in wire order.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl Default for MediaTime {
    fn default() -> Self {
        Self::invalid()
    }
}

fn common_timescale(a: i32, b: i32) -> i32 {
    if a == b {
        return a;
    }
    let g = gcd_i64(i64::from(a), i64::from(b)).max(1);
    let lcm = i64::from(a) / g * i64::from(b);
    i32::try_from(lcm).unwrap_or(a.max(b))
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum MediaTimeWire {
    Full {
        #[serde(default = "valid_flag")]
        flags: u32,
        value: i64,
        timescale: i32,
        #[serde(default)]
        epoch: i64,
    },
    Seconds {
        time: f64,
    },
}

fn valid_flag() -> u32 {
    MediaTime::FLAG_VALID
}

impl<'de> serde::Deserialize<'de> for MediaTime {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Ok(match MediaTimeWire::deserialize(d)? {
            MediaTimeWire::Full {
                flags,
                value,
                timescale,
                epoch,
            } => Self {
                flags,
                value,
                timescale,
                epoch,
            },
            MediaTimeWire::Seconds { time } => Self::from_seconds(time, PREFERRED_TIMESCALE),
        })
    }
}

/// Half-open time interval `[start, start + duration)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TimeRange {
    /// First instant.
    pub start: MediaTime,
    /// Length.
    pub duration: MediaTime,
}

impl TimeRange {
    /// Range from a start and a duration.
    pub fn new(start: MediaTime, duration: MediaTime) -> Self {
        Self { start, duration }
    }

    /// The all-invalid range.
    pub fn invalid() -> Self {
        Self {
            start: MediaTime::invalid(),
            duration: MediaTime::invalid(),
        }
    }

    /// Exclusive end.
    pub fn end(&self) -> MediaTime {
        self.start.add(&self.duration)
    }

    /// Whether `t` falls inside the range.
    pub fn contains(&self, t: &MediaTime) -> bool {
        self.start.cmp_time(t) != Ordering::Greater && t.cmp_time(&self.end()) == Ordering::Less
    }

    /// Whether the duration is zero or invalid.
    pub fn is_empty(&self) -> bool {
        !self.duration.is_numeric() || self.duration.value <= 0
    }

    /// Compact JSON string in wire order.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/time.rs"]
mod tests;
