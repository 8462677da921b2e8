//! Natlog Datatype
//!
//! Series datatypes: fixed-width scalars, fixed-shape arrays of a scalar
//! base, and MIME-typed blobs. A datatype validates and coerces incoming
//! values, supplies the zero value used by gap filling, and routes points
//! to their storage partition.
//!
//! Descriptor grammar:
//! - `int8` .. `int64`, `float32`, `float64`
//! - `float64[2, 3]` (array, positive dimensions)
//! - `blob:image/png`
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::value::{ArrayData, ArrayValue, RawValue, Value};
use bytes::Bytes;
use natlog_common::{NatlogError, Result};
use natlog_storage::Category;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Scalar Type
// =============================================================================

/// Element type of a scalar or array datatype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl ScalarType {
    pub const ALL: [ScalarType; 6] = [
        ScalarType::Int8,
        ScalarType::Int16,
        ScalarType::Int32,
        ScalarType::Int64,
        ScalarType::Float32,
        ScalarType::Float64,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Int8 => "int8",
            ScalarType::Int16 => "int16",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Float32 => "float32",
            ScalarType::Float64 => "float64",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn is_int(self) -> bool {
        !self.is_float()
    }

    pub fn is_float(self) -> bool {
        matches!(self, ScalarType::Float32 | ScalarType::Float64)
    }

    fn int_range(self) -> (i64, i64) {
        match self {
            ScalarType::Int8 => (i8::MIN as i64, i8::MAX as i64),
            ScalarType::Int16 => (i16::MIN as i64, i16::MAX as i64),
            ScalarType::Int32 => (i32::MIN as i64, i32::MAX as i64),
            _ => (i64::MIN, i64::MAX),
        }
    }

    fn coerce_int(self, raw: &RawValue) -> Result<i64> {
        let value = match raw {
            RawValue::Int(i) => *i,
            RawValue::Float(f) => truncate(*f)?,
            RawValue::Text(s) => {
                let s = s.trim();
                match s.parse::<i64>() {
                    Ok(i) => i,
                    Err(_) => truncate(parse_float(s)?)?,
                }
            }
            other => {
                return Err(NatlogError::Type(format!(
                    "cannot convert {} to {}",
                    other.kind(),
                    self.name()
                )))
            }
        };

        let (min, max) = self.int_range();
        if value < min || value > max {
            return Err(NatlogError::Type(format!(
                "{} is out of range for {}",
                value,
                self.name()
            )));
        }
        Ok(value)
    }

    fn coerce_float(self, raw: &RawValue) -> Result<f64> {
        let value = match raw {
            RawValue::Int(i) => *i as f64,
            RawValue::Float(f) => *f,
            RawValue::Text(s) => parse_float(s.trim())?,
            other => {
                return Err(NatlogError::Type(format!(
                    "cannot convert {} to {}",
                    other.kind(),
                    self.name()
                )))
            }
        };

        Ok(match self {
            ScalarType::Float32 => value as f32 as f64,
            _ => value,
        })
    }
}

fn truncate(value: f64) -> Result<i64> {
    let truncated = value.trunc();
    if !truncated.is_finite() || truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(NatlogError::Type(format!("{} cannot be stored as an integer", value)));
    }
    Ok(truncated as i64)
}

fn parse_float(text: &str) -> Result<f64> {
    text.parse::<f64>()
        .map_err(|_| NatlogError::Type(format!("{:?} is not a number", text)))
}

// =============================================================================
// Datatype
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Kind {
    Scalar(ScalarType),
    Array { base: ScalarType, shape: Vec<usize> },
    Blob { mimetype: String },
}

/// An immutable, validated series datatype.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Datatype(Kind);

impl Datatype {
    /// Build a datatype from its parts.
    ///
    /// `shape` and `mimetype` are mutually exclusive; a blob requires a
    /// mimetype and a scalar base must not carry one.
    pub fn new(base: &str, shape: Option<Vec<usize>>, mimetype: Option<String>) -> Result<Self> {
        if shape.is_some() && mimetype.is_some() {
            return Err(NatlogError::Type(
                "a datatype cannot have both a shape and a mimetype".to_string(),
            ));
        }

        if base == "blob" {
            return match mimetype {
                Some(mimetype) if !mimetype.is_empty() => Ok(Self::blob(mimetype)),
                Some(_) => Err(NatlogError::Type("blob mimetype is empty".to_string())),
                None => Err(NatlogError::Type("blob datatype requires a mimetype".to_string())),
            };
        }

        let scalar = ScalarType::from_name(base)
            .ok_or_else(|| NatlogError::Type(format!("unknown base type {:?}", base)))?;
        if mimetype.is_some() {
            return Err(NatlogError::Type(format!("{} cannot have a mimetype", base)));
        }

        match shape {
            Some(shape) => Self::array(scalar, shape),
            None => Ok(Self::scalar(scalar)),
        }
    }

    pub fn scalar(base: ScalarType) -> Self {
        Datatype(Kind::Scalar(base))
    }

    pub fn array(base: ScalarType, shape: Vec<usize>) -> Result<Self> {
        if shape.is_empty() {
            return Err(NatlogError::Type("array shape must not be empty".to_string()));
        }
        if shape.contains(&0) {
            return Err(NatlogError::Type(format!(
                "array dimensions must be positive, got {:?}",
                shape
            )));
        }
        Ok(Datatype(Kind::Array { base, shape }))
    }

    pub fn blob(mimetype: impl Into<String>) -> Self {
        Datatype(Kind::Blob {
            mimetype: mimetype.into(),
        })
    }

    /// Parse a type descriptor.
    pub fn parse(descriptor: &str) -> Result<Self> {
        if let Some((base, mimetype)) = descriptor.split_once(':') {
            if base != "blob" {
                return Err(NatlogError::Type(format!(
                    "{:?}: only blob types carry a mimetype",
                    descriptor
                )));
            }
            return Self::new(base, None, Some(mimetype.to_string()));
        }

        if let Some((base, dims)) = descriptor.split_once('[') {
            let dims = dims.strip_suffix(']').ok_or_else(|| {
                NatlogError::Type(format!("{:?}: unterminated shape", descriptor))
            })?;
            let shape = dims
                .split(',')
                .map(|d| {
                    d.trim().parse::<usize>().map_err(|_| {
                        NatlogError::Type(format!("{:?}: invalid dimension {:?}", descriptor, d))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            return Self::new(base, Some(shape), None);
        }

        Self::new(descriptor, None, None)
    }

    // -------------------------------------------------------------------------
    // Predicates
    // -------------------------------------------------------------------------

    pub fn is_scalar(&self) -> bool {
        matches!(self.0, Kind::Scalar(_))
    }

    pub fn is_int_scalar(&self) -> bool {
        matches!(self.0, Kind::Scalar(t) if t.is_int())
    }

    pub fn is_float_scalar(&self) -> bool {
        matches!(self.0, Kind::Scalar(t) if t.is_float())
    }

    pub fn is_array(&self) -> bool {
        matches!(self.0, Kind::Array { .. })
    }

    pub fn is_blob(&self) -> bool {
        matches!(self.0, Kind::Blob { .. })
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Element type, or `None` for blobs.
    pub fn base(&self) -> Option<ScalarType> {
        match &self.0 {
            Kind::Scalar(t) | Kind::Array { base: t, .. } => Some(*t),
            Kind::Blob { .. } => None,
        }
    }

    pub fn shape(&self) -> Option<&[usize]> {
        match &self.0 {
            Kind::Array { shape, .. } => Some(shape),
            _ => None,
        }
    }

    pub fn mimetype(&self) -> Option<&str> {
        match &self.0 {
            Kind::Blob { mimetype } => Some(mimetype),
            _ => None,
        }
    }

    /// Storage partition for points of this type.
    pub fn category(&self) -> Category {
        match &self.0 {
            Kind::Scalar(t) if t.is_int() => Category::Int,
            Kind::Scalar(_) => Category::Float,
            Kind::Array { .. } => Category::Array,
            Kind::Blob { .. } => Category::Blob,
        }
    }

    // -------------------------------------------------------------------------
    // Values
    // -------------------------------------------------------------------------

    /// Whether a nested-list value has exactly the declared array shape.
    ///
    /// Always false for non-array types.
    pub fn check_shape(&self, value: &RawValue) -> bool {
        match &self.0 {
            Kind::Array { shape, .. } => value.shape().as_deref() == Some(shape.as_slice()),
            _ => false,
        }
    }

    /// Convert a raw value to this type's canonical representation.
    pub fn coerce(&self, value: &RawValue) -> Result<Value> {
        match &self.0 {
            Kind::Scalar(t) if t.is_int() => t.coerce_int(value).map(Value::Int),
            Kind::Scalar(t) => t.coerce_float(value).map(Value::Float),
            Kind::Array { base, shape } => {
                let actual = value
                    .shape()
                    .ok_or_else(|| NatlogError::Type("array value is ragged".to_string()))?;
                if actual != *shape {
                    return Err(NatlogError::Type(format!(
                        "{}: value has shape {:?}",
                        self, actual
                    )));
                }

                let leaves = value.flatten();
                let data = if base.is_int() {
                    ArrayData::Int(
                        leaves
                            .into_iter()
                            .map(|leaf| base.coerce_int(leaf))
                            .collect::<Result<_>>()?,
                    )
                } else {
                    ArrayData::Float(
                        leaves
                            .into_iter()
                            .map(|leaf| base.coerce_float(leaf))
                            .collect::<Result<_>>()?,
                    )
                };
                ArrayValue::new(shape.clone(), data).map(Value::Array)
            }
            Kind::Blob { .. } => match value {
                RawValue::Bytes(b) => Ok(Value::Blob(b.clone())),
                RawValue::Text(s) => Ok(Value::Blob(Bytes::from(s.clone().into_bytes()))),
                RawValue::List(items) => items
                    .iter()
                    .map(|item| match item {
                        RawValue::Int(i) => u8::try_from(*i)
                            .map_err(|_| NatlogError::Type(format!("{} is not a byte", i))),
                        other => Err(NatlogError::Type(format!(
                            "cannot convert {} to a byte",
                            other.kind()
                        ))),
                    })
                    .collect::<Result<Vec<u8>>>()
                    .map(|bytes| Value::Blob(Bytes::from(bytes))),
                other => Err(NatlogError::Type(format!(
                    "cannot convert {} to {}",
                    other.kind(),
                    self
                ))),
            },
        }
    }

    /// The empty value of this type.
    pub fn zero_value(&self) -> Value {
        match &self.0 {
            Kind::Scalar(t) if t.is_int() => Value::Int(0),
            Kind::Scalar(_) => Value::Float(0.0),
            Kind::Array { base, shape } => Value::Array(ArrayValue::zeros(shape, base.is_float())),
            Kind::Blob { .. } => Value::Blob(Bytes::new()),
        }
    }

    /// Convert a coerced value to plain numbers, nested lists, or bytes.
    pub fn to_transport(&self, value: &Value) -> RawValue {
        value.to_raw()
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Kind::Scalar(t) => write!(f, "{}", t.name()),
            Kind::Array { base, shape } => {
                let dims: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
                write!(f, "{}[{}]", base.name(), dims.join(", "))
            }
            Kind::Blob { mimetype } => write!(f, "blob:{}", mimetype),
        }
    }
}

impl FromStr for Datatype {
    type Err = NatlogError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(descriptor: &str) -> Datatype {
        Datatype::parse(descriptor).expect("descriptor should parse")
    }

    #[test]
    fn test_parse_scalars() {
        for t in ScalarType::ALL {
            let dt = parse(t.name());
            assert!(dt.is_scalar());
            assert_eq!(dt.base(), Some(t));
            assert_eq!(dt.to_string(), t.name());
        }
        assert!(parse("int16").is_int_scalar());
        assert!(parse("float32").is_float_scalar());
    }

    #[test]
    fn test_parse_arrays() {
        let dt = parse("int8[10]");
        assert!(dt.is_array());
        assert_eq!(dt.shape(), Some(&[10][..]));

        let dt = parse("float64[ 2 ,3 ]");
        assert_eq!(dt.shape(), Some(&[2, 3][..]));
        assert_eq!(dt.to_string(), "float64[2, 3]");
        assert_eq!(parse(&dt.to_string()), dt);
    }

    #[test]
    fn test_parse_blobs() {
        let dt = parse("blob:image/png");
        assert!(dt.is_blob());
        assert_eq!(dt.mimetype(), Some("image/png"));
        assert_eq!(dt.to_string(), "blob:image/png");

        let dt = parse("blob:text/plain;charset=utf-8");
        assert_eq!(dt.mimetype(), Some("text/plain;charset=utf-8"));
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "",
            "int",
            "uint8",
            "blob",
            "blob:",
            "int8:foo",
            "int8[]",
            "int8[10",
            "int8[[10]",
            "int8[10,foo]",
            "int8[10,]",
            "int8[0]",
            "int8[-1]",
            "blob[10]",
        ] {
            let err = Datatype::parse(bad).expect_err(bad);
            assert!(matches!(err, NatlogError::Type(_)), "{}", bad);
        }
    }

    #[test]
    fn test_constructor_exclusivity() {
        assert!(Datatype::new("int8", Some(vec![2]), Some("a/b".into())).is_err());
        assert!(Datatype::new("int8", None, Some("a/b".into())).is_err());
        assert!(Datatype::new("blob", None, None).is_err());
        assert!(Datatype::new("blob", None, Some("a/b".into())).is_ok());
    }

    #[test]
    fn test_predicates_exclusive() {
        for descriptor in ["int32", "float64", "int8[3]", "float32[2, 2]", "blob:a/b"] {
            let dt = parse(descriptor);
            let kinds = [dt.is_scalar(), dt.is_array(), dt.is_blob()];
            assert_eq!(kinds.iter().filter(|k| **k).count(), 1, "{}", descriptor);
        }
    }

    #[test]
    fn test_category_routing() {
        assert_eq!(parse("int64").category(), Category::Int);
        assert_eq!(parse("float32").category(), Category::Float);
        assert_eq!(parse("int8[4]").category(), Category::Array);
        assert_eq!(parse("blob:a/b").category(), Category::Blob);
    }

    #[test]
    fn test_check_shape() {
        let dt = parse("int32[2, 3]");
        assert!(dt.check_shape(&RawValue::from(vec![vec![1, 2, 3], vec![4, 5, 6]])));
        assert!(!dt.check_shape(&RawValue::from(vec![1, 2, 3, 4, 5, 6])));
        assert!(!parse("int32").check_shape(&RawValue::Int(1)));
    }

    #[test]
    fn test_coerce_ints() {
        let dt = parse("int8");
        assert_eq!(dt.coerce(&RawValue::Int(12)).expect("int"), Value::Int(12));
        assert_eq!(dt.coerce(&RawValue::Float(-3.9)).expect("float"), Value::Int(-3));
        assert_eq!(dt.coerce(&"12".into()).expect("text"), Value::Int(12));
        assert_eq!(dt.coerce(&" 7.5 ".into()).expect("text float"), Value::Int(7));

        assert!(dt.coerce(&RawValue::Int(128)).is_err());
        assert!(dt.coerce(&"abc".into()).is_err());
        assert!(dt.coerce(&RawValue::from(vec![1])).is_err());
        assert!(parse("int64").coerce(&RawValue::Float(f64::NAN)).is_err());
    }

    #[test]
    fn test_coerce_floats() {
        let dt = parse("float64");
        assert_eq!(dt.coerce(&RawValue::Int(3)).expect("int"), Value::Float(3.0));
        assert_eq!(dt.coerce(&"2.5".into()).expect("text"), Value::Float(2.5));
        assert!(dt.coerce(&RawValue::bytes(&b"1"[..])).is_err());

        let dt = parse("float32");
        assert_eq!(dt.coerce(&RawValue::Float(0.1)).expect("f32"), Value::Float(0.1f32 as f64));
    }

    #[test]
    fn test_coerce_arrays() {
        let dt = parse("int16[2, 2]");
        let value = dt
            .coerce(&RawValue::from(vec![vec![1.5, 2.0], vec![3.0, -4.2]]))
            .expect("array coerces");
        let array = value.as_array().expect("array value");
        assert_eq!(array.data(), &ArrayData::Int(vec![1, 2, 3, -4]));

        assert!(dt.coerce(&RawValue::from(vec![1, 2, 3, 4])).is_err());
        assert!(dt.coerce(&RawValue::from(vec![vec![1, 2], vec![3, 70000]])).is_err());
        assert!(dt
            .coerce(&RawValue::List(vec![RawValue::from(vec![1, 2]), RawValue::from(vec![3])]))
            .is_err());
    }

    #[test]
    fn test_coerce_blobs() {
        let dt = parse("blob:application/octet-stream");
        assert_eq!(
            dt.coerce(&RawValue::bytes(&b"\x00\xff"[..])).expect("bytes"),
            Value::Blob(Bytes::from_static(b"\x00\xff"))
        );
        assert_eq!(
            dt.coerce(&RawValue::from(vec![104, 105])).expect("byte list"),
            Value::Blob(Bytes::from_static(b"hi"))
        );
        assert_eq!(
            dt.coerce(&"hi".into()).expect("text"),
            Value::Blob(Bytes::from_static(b"hi"))
        );
        assert!(dt.coerce(&RawValue::from(vec![256])).is_err());
        assert!(dt.coerce(&RawValue::Int(5)).is_err());
    }

    #[test]
    fn test_zero_values() {
        assert_eq!(parse("int32").zero_value(), Value::Int(0));
        assert_eq!(parse("float32").zero_value(), Value::Float(0.0));
        assert_eq!(
            parse("float64[2]").zero_value(),
            Value::Array(ArrayValue::zeros(&[2], true))
        );
        assert_eq!(parse("blob:a/b").zero_value(), Value::Blob(Bytes::new()));
    }

    #[test]
    fn test_transport_round_trip() {
        let cases: Vec<(&str, RawValue)> = vec![
            ("int32", RawValue::Int(-17)),
            ("float64", RawValue::Float(2.25)),
            ("int8[2, 2]", RawValue::from(vec![vec![1, 2], vec![3, 4]])),
            ("float64[3]", RawValue::from(vec![0.5, 1.5, 2.5])),
            ("blob:a/b", RawValue::bytes(&b"payload"[..])),
        ];
        for (descriptor, raw) in cases {
            let dt = parse(descriptor);
            let value = dt.coerce(&raw).expect("coerces");
            assert_eq!(dt.to_transport(&value), raw, "{}", descriptor);
        }
    }
}
