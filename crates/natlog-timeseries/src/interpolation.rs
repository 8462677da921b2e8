//! Natlog Interpolation
//!
//! Strategies filling bins that received no raw points. Each strategy sees
//! the whole ordered column of reduced values at once.
//!
//! - `none`: absent bins stay absent
//! - `zero`: absent bins take the datatype's zero value
//! - `previous`: absent bins repeat the last present value
//! - `linear`: interior gaps are interpolated in time between neighbors
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::datatype::Datatype;
use crate::value::{ArrayData, ArrayValue, Value};
use chrono::{DateTime, Utc};
use natlog_common::{NatlogError, Result};
use std::fmt;
use std::str::FromStr;

/// Signature shared by all interpolation strategies.
pub type InterpolationFn = fn(Vec<Option<Value>>, &Datatype, &[DateTime<Utc>]) -> Vec<Option<Value>>;

// =============================================================================
// Interpolation
// =============================================================================

/// Known interpolation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interpolation {
    None,
    Zero,
    Previous,
    Linear,
}

impl Interpolation {
    pub const ALL: [Interpolation; 4] = [
        Interpolation::None,
        Interpolation::Zero,
        Interpolation::Previous,
        Interpolation::Linear,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Interpolation::None => "none",
            Interpolation::Zero => "zero",
            Interpolation::Previous => "previous",
            Interpolation::Linear => "linear",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.name() == name)
    }

    /// The strategy function for this interpolation.
    pub fn function(self) -> InterpolationFn {
        match self {
            Interpolation::None => none,
            Interpolation::Zero => zero,
            Interpolation::Previous => previous,
            Interpolation::Linear => linear,
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Interpolation {
    type Err = NatlogError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
            .ok_or_else(|| NatlogError::Selector(format!("unknown interpolation {:?}", s)))
    }
}

// =============================================================================
// Strategies
// =============================================================================

pub fn none(values: Vec<Option<Value>>, _: &Datatype, _: &[DateTime<Utc>]) -> Vec<Option<Value>> {
    values
}

pub fn zero(values: Vec<Option<Value>>, datatype: &Datatype, _: &[DateTime<Utc>]) -> Vec<Option<Value>> {
    values
        .into_iter()
        .map(|v| v.or_else(|| Some(datatype.zero_value())))
        .collect()
}

pub fn previous(values: Vec<Option<Value>>, _: &Datatype, _: &[DateTime<Utc>]) -> Vec<Option<Value>> {
    let mut last: Option<Value> = None;
    values
        .into_iter()
        .map(|v| {
            if v.is_some() {
                last = v;
            }
            last.clone()
        })
        .collect()
}

/// Interpolate interior gaps between the nearest present neighbors.
///
/// Leading gaps stay absent and trailing gaps repeat the last present value.
/// Integer data is truncated toward zero; blobs take the earlier neighbor.
pub fn linear(mut values: Vec<Option<Value>>, _: &Datatype, centers: &[DateTime<Utc>]) -> Vec<Option<Value>> {
    let present: Vec<usize> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.as_ref().map(|_| i))
        .collect();

    for pair in present.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b - a < 2 {
            continue;
        }
        let (Some(left), Some(right)) = (values[a].clone(), values[b].clone()) else {
            continue;
        };

        let span = nanos_between(centers, a, b);
        for i in a + 1..b {
            let fraction = if span > 0.0 {
                nanos_between(centers, a, i) / span
            } else {
                0.0
            };
            values[i] = Some(lerp(&left, &right, fraction));
        }
    }

    if let Some(&tail) = present.last() {
        let fill = values[tail].clone();
        for slot in values.iter_mut().skip(tail + 1) {
            *slot = fill.clone();
        }
    }

    values
}

// =============================================================================
// Helpers
// =============================================================================

fn nanos_between(centers: &[DateTime<Utc>], from: usize, to: usize) -> f64 {
    match (centers.get(from), centers.get(to)) {
        (Some(a), Some(b)) => (*b - *a)
            .num_nanoseconds()
            .map_or_else(|| (*b - *a).num_milliseconds() as f64 * 1e6, |n| n as f64),
        _ => (to - from) as f64,
    }
}

fn mix(a: f64, b: f64, fraction: f64) -> f64 {
    a + (b - a) * fraction
}

fn lerp(left: &Value, right: &Value, fraction: f64) -> Value {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Value::Int(mix(*a as f64, *b as f64, fraction).trunc() as i64),
        (Value::Array(a), Value::Array(b)) if a.shape() == b.shape() => {
            let data = match (a.data(), b.data()) {
                (ArrayData::Int(x), ArrayData::Int(y)) => ArrayData::Int(
                    x.iter()
                        .zip(y)
                        .map(|(p, q)| mix(*p as f64, *q as f64, fraction).trunc() as i64)
                        .collect(),
                ),
                (x, y) => ArrayData::Float(
                    x.to_f64()
                        .into_iter()
                        .zip(y.to_f64())
                        .map(|(p, q)| mix(p, q, fraction))
                        .collect(),
                ),
            };
            ArrayValue::new(a.shape().to_vec(), data)
                .map(Value::Array)
                .unwrap_or_else(|_| left.clone())
        }
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => Value::Float(mix(x, y, fraction)),
            _ => left.clone(),
        },
    }
}

// =============================================================================
// Tests
// =============================================================================
