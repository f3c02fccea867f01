//! Load-cell calibration: computing and persisting the scale factor.
//!
//! Calibration mode records a zero reading with an empty pan, then a
//! reading with a reference mass. The factor is the raw-count slope
//! between the two. It is stored in flash as 4 little-endian bytes so
//! it survives deep sleep and power loss.

use crate::error::{Error, Result};

/// Serialized size of a calibration record.
pub const RECORD_SIZE: usize = 4;

/// Raw counts per gram from a zero and a loaded reading.
pub fn scale_factor(zero_raw: i32, loaded_raw: i32, reference_grams: f32) -> Result<f32> {
    if !(reference_grams.is_finite() && reference_grams > 0.0) {
        return Err(Error::Storage);
    }
    let delta = loaded_raw as f32 - zero_raw as f32;
    validate(delta / reference_grams)
}

/// Accept only factors that can be divided by.
pub fn validate(factor: f32) -> Result<f32> {
    if factor.is_finite() && factor != 0.0 {
        Ok(factor)
    } else {
        Err(Error::Storage)
    }
}

pub fn encode(factor: f32) -> [u8; RECORD_SIZE] {
    factor.to_le_bytes()
}

pub fn decode(bytes: &[u8]) -> Result<f32> {
    let raw: [u8; RECORD_SIZE] = bytes
        .get(..RECORD_SIZE)
        .and_then(|b| b.try_into().ok())
        .ok_or(Error::Storage)?;
    validate(f32::from_le_bytes(raw))
}
