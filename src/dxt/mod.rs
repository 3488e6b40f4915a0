//! DXT1/3/5 (BC1/BC2/BC3) block-to-RGBA decoding.
//!
//! Pure and stateless: every block decodes independently of every other,
//! unlike the LZX side's per-stream decoder state.

mod block;
mod image;

use std::fmt;

pub use image::{to_rgba, to_rgba_raw};

/// Historical bitmask values accepted by [`to_rgba_raw`], matching the
/// `squish` crate's own public constants.
pub const DXT1_MASK: u32 = 1;
pub const DXT3_MASK: u32 = 2;
pub const DXT5_MASK: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DxtVariant {
    Dxt1,
    Dxt3,
    Dxt5,
}

impl DxtVariant {
    /// Bytes occupied by one 4x4 block: 8 for DXT1, 16 for DXT3/5.
    fn block_size(self) -> usize {
        match self {
            DxtVariant::Dxt1 => 8,
            DxtVariant::Dxt3 | DxtVariant::Dxt5 => 16,
        }
    }

    fn from_mask(version: u32) -> Result<Self, DxtError> {
        match version {
            DXT1_MASK => Ok(DxtVariant::Dxt1),
            DXT3_MASK => Ok(DxtVariant::Dxt3),
            DXT5_MASK => Ok(DxtVariant::Dxt5),
            _ => Err(DxtError::InvalidVersionMask),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DxtError {
    /// `width` or `height` is zero or not a multiple of 4.
    InvalidDimensions,
    /// `version` did not have exactly one of the DXT1/3/5 bits set.
    InvalidVersionMask,
}

impl fmt::Display for DxtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            DxtError::InvalidDimensions => "width and height must be non-zero multiples of 4",
            DxtError::InvalidVersionMask => "version mask must select exactly one of DXT1/3/5",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for DxtError {}
