//! Natlog Values
//!
//! Values on both sides of the datatype boundary: [`RawValue`] is what
//! callers hand in (and what leaves the core in transport form), [`Value`]
//! is the canonical, coerced representation the store and query engine
//! work with.
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use bytes::Bytes;
use natlog_common::{NatlogError, Result};
use serde::ser::{Serialize, SerializeSeq, Serializer};

// =============================================================================
// Raw Value
// =============================================================================

/// An uncoerced value: plain numbers, numeric text, nested lists, or bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<RawValue>),
    Bytes(Bytes),
}

impl RawValue {
    pub fn bytes(data: impl Into<Bytes>) -> Self {
        RawValue::Bytes(data.into())
    }

    /// Inferred shape of a nested list; `[]` for a leaf, `None` if ragged.
    pub fn shape(&self) -> Option<Vec<usize>> {
        match self {
            RawValue::List(items) => {
                let mut shape = vec![items.len()];
                let mut children = items.iter().map(RawValue::shape);
                if let Some(first) = children.next() {
                    let first = first?;
                    for child in children {
                        if child? != first {
                            return None;
                        }
                    }
                    shape.extend(first);
                }
                Some(shape)
            }
            _ => Some(Vec::new()),
        }
    }

    /// Leaves of a nested list in row-major order.
    pub(crate) fn flatten(&self) -> Vec<&RawValue> {
        let mut leaves = Vec::new();
        let mut stack = vec![self];
        while let Some(value) = stack.pop() {
            match value {
                RawValue::List(items) => stack.extend(items.iter().rev()),
                leaf => leaves.push(leaf),
            }
        }
        leaves
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            RawValue::Int(_) => "integer",
            RawValue::Float(_) => "float",
            RawValue::Text(_) => "text",
            RawValue::List(_) => "list",
            RawValue::Bytes(_) => "bytes",
        }
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Int(value)
    }
}

impl From<i32> for RawValue {
    fn from(value: i32) -> Self {
        RawValue::Int(value as i64)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Float(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<Bytes> for RawValue {
    fn from(value: Bytes) -> Self {
        RawValue::Bytes(value)
    }
}

impl<T: Into<RawValue>> From<Vec<T>> for RawValue {
    fn from(values: Vec<T>) -> Self {
        RawValue::List(values.into_iter().map(Into::into).collect())
    }
}

impl TryFrom<serde_json::Value> for RawValue {
    type Error = NatlogError;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        use serde_json::Value as Json;

        match value {
            Json::Bool(b) => Ok(RawValue::Int(b as i64)),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(RawValue::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(RawValue::Float(f))
                } else {
                    Err(NatlogError::Type(format!("number {} is out of range", n)))
                }
            }
            Json::String(s) => Ok(RawValue::Text(s)),
            Json::Array(items) => items
                .into_iter()
                .map(RawValue::try_from)
                .collect::<Result<Vec<_>>>()
                .map(RawValue::List),
            Json::Null => Err(NatlogError::Type("null is not a value".to_string())),
            Json::Object(_) => Err(NatlogError::Type("objects are not values".to_string())),
        }
    }
}

impl Serialize for RawValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            RawValue::Int(i) => serializer.serialize_i64(*i),
            // JSON has no NaN or infinity; "NaN", "inf" and "-inf" parse back.
            RawValue::Float(f) if !f.is_finite() => serializer.serialize_str(&f.to_string()),
            RawValue::Float(f) => serializer.serialize_f64(*f),
            RawValue::Text(s) => serializer.serialize_str(s),
            RawValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            RawValue::Bytes(b) => serializer.serialize_bytes(b),
        }
    }
}

// =============================================================================
// Canonical Value
// =============================================================================

/// A value coerced to a series' datatype.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Array(ArrayValue),
    Blob(Bytes),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Plain numbers, nested lists, or raw bytes for the API boundary.
    pub fn to_raw(&self) -> RawValue {
        match self {
            Value::Int(i) => RawValue::Int(*i),
            Value::Float(f) => RawValue::Float(*f),
            Value::Array(a) => a.to_nested(),
            Value::Blob(b) => RawValue::Bytes(b.clone()),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

// =============================================================================
// Array Value
// =============================================================================

/// Flat element storage of an array value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    Int(Vec<i64>),
    Float(Vec<f64>),
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Int(v) => v.len(),
            ArrayData::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Elements widened to floating point.
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            ArrayData::Int(v) => v.iter().map(|&x| x as f64).collect(),
            ArrayData::Float(v) => v.clone(),
        }
    }
}

/// A fixed-shape, row-major array.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayValue {
    shape: Vec<usize>,
    data: ArrayData,
}

impl ArrayValue {
    /// Build an array, checking the element count against the shape.
    pub fn new(shape: Vec<usize>, data: ArrayData) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if shape.is_empty() || data.len() != expected {
            return Err(NatlogError::Type(format!(
                "{} elements do not fill shape {:?}",
                data.len(),
                shape
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn zeros(shape: &[usize], float: bool) -> Self {
        let len = shape.iter().product();
        let data = if float {
            ArrayData::Float(vec![0.0; len])
        } else {
            ArrayData::Int(vec![0; len])
        };
        Self {
            shape: shape.to_vec(),
            data,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    /// The same array with elements widened to floating point.
    pub fn to_float(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            data: ArrayData::Float(self.data.to_f64()),
        }
    }

    /// Nested lists following the array's shape.
    pub fn to_nested(&self) -> RawValue {
        let leaves: Vec<RawValue> = match &self.data {
            ArrayData::Int(v) => v.iter().map(|&x| RawValue::Int(x)).collect(),
            ArrayData::Float(v) => v.iter().map(|&x| RawValue::Float(x)).collect(),
        };
        nest(&self.shape, &mut leaves.into_iter())
    }
}

fn nest(shape: &[usize], leaves: &mut impl Iterator<Item = RawValue>) -> RawValue {
    match shape.split_first() {
        Some((&dim, rest)) if !rest.is_empty() => {
            RawValue::List((0..dim).map(|_| nest(rest, leaves)).collect())
        }
        Some((&dim, _)) => RawValue::List(leaves.take(dim).collect()),
        None => RawValue::List(Vec::new()),
    }
}

// =============================================================================
// Tests
// =============================================================================
