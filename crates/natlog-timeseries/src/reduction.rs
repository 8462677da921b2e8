//! Natlog Reduction
//!
//! Strategies collapsing the raw points of one bin into a single value.
//! Reductions are only ever applied to non-empty bins.
//!
//! - `closest`: the point nearest the bin center; the earliest wins a tie
//! - `sum`, `min`, `max`: elementwise, integral data stays integral
//! - `mean`: elementwise, always floating point
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::value::{ArrayData, ArrayValue, Value};
use chrono::{DateTime, Utc};
use natlog_common::{NatlogError, Result};
use std::fmt;
use std::str::FromStr;

/// Signature shared by all reduction strategies.
pub type ReductionFn = fn(&[DateTime<Utc>], &[Value], DateTime<Utc>) -> Result<Value>;

// =============================================================================
// Reduction
// =============================================================================

/// Known reduction strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reduction {
    Closest,
    Sum,
    Mean,
    Min,
    Max,
}

impl Reduction {
    pub const ALL: [Reduction; 5] = [
        Reduction::Closest,
        Reduction::Sum,
        Reduction::Mean,
        Reduction::Min,
        Reduction::Max,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Reduction::Closest => "closest",
            Reduction::Sum => "sum",
            Reduction::Mean => "mean",
            Reduction::Min => "min",
            Reduction::Max => "max",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.name() == name)
    }

    /// The strategy function for this reduction.
    pub fn function(self) -> ReductionFn {
        match self {
            Reduction::Closest => closest,
            Reduction::Sum => sum,
            Reduction::Mean => mean,
            Reduction::Min => min,
            Reduction::Max => max,
        }
    }

    /// Whether the reduction can be applied to blob values.
    pub fn supports_blobs(self) -> bool {
        matches!(self, Reduction::Closest)
    }
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Reduction {
    type Err = NatlogError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
            .ok_or_else(|| NatlogError::Selector(format!("unknown reduction {:?}", s)))
    }
}

// =============================================================================
// Strategies
// =============================================================================

/// Value whose timestamp is nearest `center`.
pub fn closest(timestamps: &[DateTime<Utc>], values: &[Value], center: DateTime<Utc>) -> Result<Value> {
    timestamps
        .iter()
        .zip(values)
        .min_by_key(|(t, _)| (**t - center).abs())
        .map(|(_, v)| v.clone())
        .ok_or_else(empty_bin)
}

pub fn sum(_: &[DateTime<Utc>], values: &[Value], _: DateTime<Utc>) -> Result<Value> {
    fold(values, "sum", i64::wrapping_add, |a, b| a + b)
}

pub fn min(_: &[DateTime<Utc>], values: &[Value], _: DateTime<Utc>) -> Result<Value> {
    fold(values, "min", i64::min, f64::min)
}

pub fn max(_: &[DateTime<Utc>], values: &[Value], _: DateTime<Utc>) -> Result<Value> {
    fold(values, "max", i64::max, f64::max)
}

pub fn mean(_: &[DateTime<Utc>], values: &[Value], _: DateTime<Utc>) -> Result<Value> {
    let count = values.len() as f64;
    let widened: Vec<Value> = values.iter().map(widen).collect();
    match fold(&widened, "mean", i64::wrapping_add, |a, b| a + b)? {
        Value::Float(total) => Ok(Value::Float(total / count)),
        Value::Array(total) => {
            let averaged = total.data().to_f64().into_iter().map(|x| x / count).collect();
            ArrayValue::new(total.shape().to_vec(), ArrayData::Float(averaged)).map(Value::Array)
        }
        other => Ok(other),
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn empty_bin() -> NatlogError {
    NatlogError::InvalidQuery("reduction over an empty bin".to_string())
}

fn widen(value: &Value) -> Value {
    match value {
        Value::Int(i) => Value::Float(*i as f64),
        Value::Array(a) => Value::Array(a.to_float()),
        other => other.clone(),
    }
}

/// Elementwise fold of homogeneous values.
fn fold(
    values: &[Value],
    name: &str,
    int_op: fn(i64, i64) -> i64,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value> {
    let (first, rest) = values.split_first().ok_or_else(empty_bin)?;
    let mismatch = || NatlogError::Type(format!("{} over mixed value kinds", name));

    match first {
        Value::Int(init) => rest.iter().try_fold(Value::Int(*init), |acc, v| match (acc, v) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(int_op(a, *b))),
            _ => Err(mismatch()),
        }),
        Value::Float(init) => rest.iter().try_fold(Value::Float(*init), |acc, v| match (acc, v) {
            (Value::Float(a), Value::Float(b)) => Ok(Value::Float(float_op(a, *b))),
            _ => Err(mismatch()),
        }),
        Value::Array(init) => {
            let mut acc = init.data().clone();
            for value in rest {
                let array = value
                    .as_array()
                    .filter(|a| a.shape() == init.shape())
                    .ok_or_else(mismatch)?;
                match (&mut acc, array.data()) {
                    (ArrayData::Int(a), ArrayData::Int(b)) => {
                        a.iter_mut().zip(b).for_each(|(x, y)| *x = int_op(*x, *y));
                    }
                    (ArrayData::Float(a), ArrayData::Float(b)) => {
                        a.iter_mut().zip(b).for_each(|(x, y)| *x = float_op(*x, *y));
                    }
                    _ => return Err(mismatch()),
                }
            }
            ArrayValue::new(init.shape().to_vec(), acc).map(Value::Array)
        }
        Value::Blob(_) => Err(NatlogError::Type(format!("{} is undefined for blobs", name))),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::{Duration, TimeZone};

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2013, 8, 26, 0, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|&v| Value::Int(v)).collect()
    }

    fn int_array(data: Vec<i64>) -> Value {
        Value::Array(ArrayValue::new(vec![2], ArrayData::Int(data)).expect("array"))
    }

    #[test]
    fn test_lookup_by_name() {
        for reduction in Reduction::ALL {
            assert_eq!(reduction.name().parse::<Reduction>().expect("known"), reduction);
        }
        let err = "median".parse::<Reduction>().expect_err("unknown reduction");
        assert!(matches!(err, NatlogError::Selector(_)));
    }

    #[test]
    fn test_closest() {
        let times = [at(0), at(10), at(20)];
        let values = ints(&[1, 2, 3]);
        assert_eq!(closest(&times, &values, at(12)).expect("closest"), Value::Int(2));
        assert_eq!(closest(&times, &values, at(100)).expect("closest"), Value::Int(3));
    }

    #[test]
    fn test_closest_tie_prefers_earliest() {
        let times = [at(0), at(10)];
        let values = ints(&[7, 8]);
        assert_eq!(closest(&times, &values, at(5)).expect("closest"), Value::Int(7));
    }

    #[test]
    fn test_closest_blob() {
        let times = [at(0), at(10)];
        let values = vec![Value::Blob(Bytes::from_static(b"a")), Value::Blob(Bytes::from_static(b"b"))];
        assert_eq!(
            closest(&times, &values, at(9)).expect("closest"),
            Value::Blob(Bytes::from_static(b"b"))
        );
    }

    #[test]
    fn test_scalar_aggregates() {
        let times = [at(0), at(1), at(2)];
        let values = ints(&[3, -1, 10]);
        assert_eq!(sum(&times, &values, at(1)).expect("sum"), Value::Int(12));
        assert_eq!(min(&times, &values, at(1)).expect("min"), Value::Int(-1));
        assert_eq!(max(&times, &values, at(1)).expect("max"), Value::Int(10));
        assert_eq!(mean(&times, &values, at(1)).expect("mean"), Value::Float(4.0));

        let floats = vec![Value::Float(1.5), Value::Float(2.5)];
        assert_eq!(sum(&times[..2], &floats, at(1)).expect("sum"), Value::Float(4.0));
        assert_eq!(mean(&times[..2], &floats, at(1)).expect("mean"), Value::Float(2.0));
    }

    #[test]
    fn test_elementwise_arrays() {
        let times = [at(0), at(1)];
        let values = vec![int_array(vec![1, 5]), int_array(vec![4, 2])];

        assert_eq!(sum(&times, &values, at(0)).expect("sum"), int_array(vec![5, 7]));
        assert_eq!(min(&times, &values, at(0)).expect("min"), int_array(vec![1, 2]));
        assert_eq!(max(&times, &values, at(0)).expect("max"), int_array(vec![4, 5]));

        let averaged = mean(&times, &values, at(0)).expect("mean");
        let array = averaged.as_array().expect("array");
        assert_eq!(array.data(), &ArrayData::Float(vec![2.5, 3.5]));
    }

    #[test]
    fn test_aggregates_reject_blobs() {
        let values = vec![Value::Blob(Bytes::from_static(b"a"))];
        assert!(sum(&[at(0)], &values, at(0)).is_err());
        assert!(!Reduction::Sum.supports_blobs());
        assert!(Reduction::Closest.supports_blobs());
    }
}
