//! Low-level bit read utilities for byte slices.
//!
//! The buffer is treated as one little-endian bit stream: bit 0 is the low
//! bit of the first byte, bit 8 the low bit of the second byte, and so on.
//! Multi-byte integers are assembled least significant byte first. This is a
//! fixed property of the reader, not a reflection of the host platform.

use crate::errors::ReadError;

/// Widest integer a single read can produce.
pub const MAX_INT_BITS: u64 = 128;

fn check_bounds(data: &[u8], bitpos: u64, bitsize: u64) -> Result<(), ReadError> {
    let out_of_bounds = bitpos
        .checked_add(bitsize)
        .map_or(true, |end| end > data.len() as u64 * 8);

    if out_of_bounds {
        return Err(ReadError::OutOfBounds {
            bitpos,
            bitsize,
            len: data.len(),
        });
    }

    Ok(())
}

/// Reads `bitsize` bits starting at `bitpos` as an unsigned value (max 128 bits).
pub fn read_uint_at(data: &[u8], bitpos: u64, bitsize: u64) -> Result<u128, ReadError> {
    if bitsize > MAX_INT_BITS {
        return Err(ReadError::TooManyBitsRead(bitsize));
    }
    check_bounds(data, bitpos, bitsize)?;

    let first = bitpos / 8;
    let end = (bitpos + bitsize).div_ceil(8);
    let mut acc = 0u128;

    for byte_index in first..end {
        let mut byte = data[byte_index as usize] as u128;
        let bit = byte_index * 8;

        // Drop the low bits that precede the window in the first byte.
        let shift = if bit < bitpos {
            byte >>= bitpos - bit;
            0
        } else {
            bit - bitpos
        };

        let remaining = bitpos + bitsize - bit.max(bitpos);
        if remaining < 8 {
            byte &= (1 << remaining) - 1;
        }

        acc |= byte << shift;
    }

    if bitsize < MAX_INT_BITS && acc >> bitsize != 0 {
        return Err(ReadError::ValueOutOfRange(bitsize));
    }

    Ok(acc)
}

/// Reads `bitsize` bits starting at `bitpos` and sign-extends from the top bit
/// of the window.
pub fn read_int_at(data: &[u8], bitpos: u64, bitsize: u64) -> Result<i128, ReadError> {
    let raw = read_uint_at(data, bitpos, bitsize)?;
    Ok(sign_extend(raw, bitsize))
}

/// Returns the bytes covered by `[bitpos, bitpos + bitsize)`. Both ends must be
/// byte aligned; an empty range yields an empty slice.
pub fn read_bytes_at(data: &[u8], bitpos: u64, bitsize: u64) -> Result<&[u8], ReadError> {
    if bitpos % 8 != 0 || bitsize % 8 != 0 {
        return Err(ReadError::Misaligned { bitpos, bitsize });
    }
    check_bounds(data, bitpos, bitsize)?;

    let begin = (bitpos / 8) as usize;
    let len = (bitsize / 8) as usize;
    Ok(&data[begin..begin + len])
}

/// Sign-extends the low `bits` of `value` to a full `i128`.
pub fn sign_extend(value: u128, bits: u64) -> i128 {
    if bits == 0 {
        return 0;
    }
    if bits >= MAX_INT_BITS {
        return value as i128;
    }

    let shift = MAX_INT_BITS - bits;
    ((value << shift) as i128) >> shift
}
