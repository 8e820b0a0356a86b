//! Decodes one [`FieldDescriptor`] against a raw byte buffer.
//!
//! Only fields whose path has a payload are decoded (see
//! [`Path::has_payload`](crate::path::Path::has_payload)): elements of
//! zero-sized and flexible arrays have no backing bytes, and of every union
//! only the first declared member is read. The union rule is a fixed policy;
//! it says nothing about which member is live at run time.

use std::fmt;

use crate::{
    bits::{read_bytes_at, read_int_at, read_uint_at},
    errors::ReadError,
    field::{FieldDescriptor, FieldKind},
    types::Enumerator,
};

/// A decoded field value. Borrowed parts point into the descriptor or the
/// buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Pointer { pretty: &'a str, address: u128 },
    /// Raw bytes of a character array. Text decoding is left to the caller.
    Bytes(&'a [u8]),
    Enumerator(&'a str),
    /// Enum value with no matching enumerator.
    UnknownEnumerator { pretty: &'a str, value: i128 },
    Int(i128),
    UInt(u128),
    /// binary16, widened without loss.
    Float16(f32),
    Float32(f32),
    Float64(f64),
    /// Float of a width with no IEEE-754 interchange format here.
    UnsupportedFloat { bitsize: u64, bits: u128 },
    Bool(bool),
    /// Boolean storage holding something other than 0 or 1.
    InvalidBool(i128),
}

/// Decodes `field` from `data`. Returns `Ok(None)` for fields without payload.
pub fn decode<'a>(field: &'a FieldDescriptor, data: &'a [u8]) -> Result<Option<Value<'a>>, ReadError> {
    if !field.has_payload() {
        return Ok(None);
    }

    decode_unchecked(field, data).map(Some)
}

/// Decodes `field` from `data` even when its path has no payload.
pub fn decode_unchecked<'a>(
    field: &'a FieldDescriptor,
    data: &'a [u8],
) -> Result<Value<'a>, ReadError> {
    let (bitpos, bitsize) = (field.bitpos, field.bitsize);

    match &field.kind {
        FieldKind::Ptr(_) => Ok(Value::Pointer {
            pretty: &field.pretty,
            address: read_uint_at(data, bitpos, bitsize)?,
        }),
        FieldKind::String(_) => Ok(Value::Bytes(read_bytes_at(data, bitpos, bitsize)?)),
        FieldKind::Enum { signed, members } => {
            let value = read_integer(data, bitpos, bitsize, *signed)?;
            Ok(match find_enumerator(members, value, bitsize, *signed) {
                Some(name) => Value::Enumerator(name),
                None => Value::UnknownEnumerator {
                    pretty: &field.pretty,
                    value,
                },
            })
        }
        FieldKind::Integer { signed: true } => Ok(Value::Int(read_int_at(data, bitpos, bitsize)?)),
        FieldKind::Integer { signed: false } => {
            Ok(Value::UInt(read_uint_at(data, bitpos, bitsize)?))
        }
        FieldKind::Float => {
            let bits = read_uint_at(data, bitpos, bitsize)?;
            Ok(match bitsize {
                16 => Value::Float16(f16_to_f32(bits as u16)),
                32 => Value::Float32(f32::from_bits(bits as u32)),
                64 => Value::Float64(f64::from_bits(bits as u64)),
                _ => Value::UnsupportedFloat { bitsize, bits },
            })
        }
        FieldKind::Boolean { signed } => {
            let value = read_integer(data, bitpos, bitsize, *signed)?;
            Ok(match value {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                // A signed one-bit field stores true as all ones.
                -1 if bitsize == 1 => Value::Bool(true),
                other => Value::InvalidBool(other),
            })
        }
    }
}

fn read_integer(data: &[u8], bitpos: u64, bitsize: u64, signed: bool) -> Result<i128, ReadError> {
    if signed {
        read_int_at(data, bitpos, bitsize)
    } else {
        Ok(read_uint_at(data, bitpos, bitsize)? as i128)
    }
}

/// Unsigned storage also matches enumerators declared as negative values of
/// the same bit pattern (`-1` for an all-ones field).
fn find_enumerator(members: &[Enumerator], value: i128, bitsize: u64, signed: bool) -> Option<&str> {
    let mask = if bitsize >= 128 {
        u128::MAX
    } else {
        (1u128 << bitsize) - 1
    };

    members
        .iter()
        .find(|member| {
            member.value == value
                || (!signed && member.value < 0 && (member.value as u128 & mask) as i128 == value)
        })
        .map(|member| member.name.as_str())
}

/// Widens an IEEE-754 binary16 bit pattern to `f32`.
fn f16_to_f32(bits: u16) -> f32 {
    let sign = ((bits >> 15) as u32) << 31;
    let exponent = ((bits >> 10) & 0x1f) as u32;
    let fraction = (bits & 0x3ff) as u32;

    match exponent {
        0 => {
            // Zero or subnormal: fraction * 2^-24, exact in f32.
            let magnitude = fraction as f32 * f32::powi(2.0, -24);
            if sign != 0 { -magnitude } else { magnitude }
        }
        0x1f => f32::from_bits(sign | 0x7f80_0000 | (fraction << 13)),
        _ => f32::from_bits(sign | ((exponent + 112) << 23) | (fraction << 13)),
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Pointer { pretty, address } => write!(f, "({pretty}){address:#x}"),
            Value::Bytes(bytes) => write!(f, "b\"{}\"", bytes.escape_ascii()),
            Value::Enumerator(name) => f.write_str(name),
            Value::UnknownEnumerator { pretty, value } => write!(f, "({pretty}){value}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            // Narrow floats print at double precision, always with a point.
            Value::Float16(v) | Value::Float32(v) => write!(f, "{:?}", f64::from(*v)),
            Value::Float64(v) => write!(f, "{v:?}"),
            Value::UnsupportedFloat { bitsize, bits } => write!(f, "f{bitsize}({bits:#x})"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::InvalidBool(v) if *v < 0 => write!(f, "bool(-{:#x})", v.unsigned_abs()),
            Value::InvalidBool(v) => write!(f, "bool({v:#x})"),
        }
    }
}
