//! Natlog Codec
//!
//! Payload encoding of coerced values inside partition records.
//!
//! - int: i64 LE
//! - float: f64 LE
//! - array: rank(1) | dims(4 each) | element kind(1) | elements(8 each)
//! - blob: raw bytes
//!
//! @version 0.1.0
//! @author AutomataNexus Development Team

use crate::datatype::Datatype;
use crate::value::{ArrayData, ArrayValue, Value};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use natlog_common::{NatlogError, Result};
use natlog_storage::Category;

const ELEMENT_INT: u8 = 0;
const ELEMENT_FLOAT: u8 = 1;

/// Encode a value for storage.
pub fn encode(value: &Value) -> Result<Bytes> {
    match value {
        Value::Int(i) => Ok(Bytes::copy_from_slice(&i.to_le_bytes())),
        Value::Float(f) => Ok(Bytes::copy_from_slice(&f.to_le_bytes())),
        Value::Blob(b) => Ok(b.clone()),
        Value::Array(array) => {
            let rank = u8::try_from(array.shape().len())
                .map_err(|_| NatlogError::Storage("array rank too large".to_string()))?;
            let mut buf = BytesMut::with_capacity(2 + 4 * rank as usize + 8 * array.data().len());
            buf.put_u8(rank);
            for &dim in array.shape() {
                let dim = u32::try_from(dim)
                    .map_err(|_| NatlogError::Storage("array dimension too large".to_string()))?;
                buf.put_u32_le(dim);
            }
            match array.data() {
                ArrayData::Int(v) => {
                    buf.put_u8(ELEMENT_INT);
                    v.iter().for_each(|x| buf.put_i64_le(*x));
                }
                ArrayData::Float(v) => {
                    buf.put_u8(ELEMENT_FLOAT);
                    v.iter().for_each(|x| buf.put_f64_le(*x));
                }
            }
            Ok(buf.freeze())
        }
    }
}

/// Decode a stored payload of a series with the given datatype.
pub fn decode(datatype: &Datatype, payload: &Bytes) -> Result<Value> {
    match datatype.category() {
        Category::Int => Ok(Value::Int(fixed(payload)?.get_i64_le())),
        Category::Float => Ok(Value::Float(fixed(payload)?.get_f64_le())),
        Category::Blob => Ok(Value::Blob(payload.clone())),
        Category::Array => decode_array(payload),
    }
}

fn fixed(payload: &[u8]) -> Result<&[u8]> {
    if payload.len() != 8 {
        return Err(NatlogError::Corruption(format!(
            "scalar payload of {} bytes",
            payload.len()
        )));
    }
    Ok(payload)
}

fn decode_array(payload: &[u8]) -> Result<Value> {
    let truncated = || NatlogError::Corruption("array payload truncated".to_string());

    let mut buf = payload;
    if buf.remaining() < 1 {
        return Err(truncated());
    }
    let rank = buf.get_u8() as usize;
    if buf.remaining() < 4 * rank + 1 {
        return Err(truncated());
    }
    let shape: Vec<usize> = (0..rank).map(|_| buf.get_u32_le() as usize).collect();
    let kind = buf.get_u8();

    let len: usize = shape.iter().product();
    if buf.remaining() != len.saturating_mul(8) {
        return Err(truncated());
    }

    let data = match kind {
        ELEMENT_INT => ArrayData::Int((0..len).map(|_| buf.get_i64_le()).collect()),
        ELEMENT_FLOAT => ArrayData::Float((0..len).map(|_| buf.get_f64_le()).collect()),
        other => {
            return Err(NatlogError::Corruption(format!(
                "unknown array element kind {}",
                other
            )))
        }
    };

    ArrayValue::new(shape, data)
        .map(Value::Array)
        .map_err(|e| NatlogError::Corruption(e.to_string()))
}

// =============================================================================
// Tests
// =============================================================================
