//! Fixed-point(1e9) value transform.
//!
//! Payload doubles travel as signed 64-bit nano-units: the value is
//! scaled by 1e9 and rounded, keeping the sign. Within the representable
//! range the two transforms are exact inverses at 1e-9 resolution.

use tsn_common::consts::{FIXED_POINT_LIMIT, FIXED_POINT_SCALE};

use crate::error::CodecError;

/// Convert a value to its nano-unit wire representation.
///
/// # Errors
///
/// `CodecError::Overflow` if the value is not finite or its magnitude
/// exceeds `i64::MAX * 1e-9`.
pub fn to_fixed(value: f64) -> Result<i64, CodecError> {
    if !value.is_finite() || value.abs() > FIXED_POINT_LIMIT {
        return Err(CodecError::Overflow(value));
    }
    Ok((value * FIXED_POINT_SCALE).round() as i64)
}

/// Convert a nano-unit wire value back to user units.
#[inline]
pub fn from_fixed(raw: i64) -> f64 {
    raw as f64 / FIXED_POINT_SCALE
}
