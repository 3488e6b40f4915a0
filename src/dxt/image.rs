//! Tile loop over a whole image: walks 4x4 blocks in row-major order and
//! writes into a `width * height * 4` RGBA8888 buffer.

use super::block::decode_block;
use super::{DxtError, DxtVariant};

/// Decodes a whole DXT1/3/5 image to RGBA8888.
///
/// `width` and `height` must be non-zero multiples of 4; `in_bytes` must
/// contain exactly the number of blocks that implies.
pub fn to_rgba(
    variant: DxtVariant,
    width: u32,
    height: u32,
    in_bytes: &[u8],
) -> Result<Vec<u8>, DxtError> {
    if width == 0 || height == 0 || width % 4 != 0 || height % 4 != 0 {
        return Err(DxtError::InvalidDimensions);
    }

    let width = width as usize;
    let height = height as usize;
    let blocks_x = width / 4;
    let blocks_y = height / 4;
    let block_size = variant.block_size();
    let expected_len = blocks_x * blocks_y * block_size;
    if in_bytes.len() < expected_len {
        return Err(DxtError::InvalidDimensions);
    }

    log::debug!("decoding {blocks_x}x{blocks_y} blocks of {variant:?}");

    let mut out = vec![0u8; width * height * 4];
    for by in 0..blocks_y {
        for bx in 0..blocks_x {
            let block_index = by * blocks_x + bx;
            let start = block_index * block_size;
            let data = &in_bytes[start..start + block_size];
            decode_block(variant, data, &mut out, width, bx * 4, by * 4);
        }
    }
    Ok(out)
}

/// [`to_rgba`] over the historical bitmask `version` parameter: exactly
/// one of [`super::DXT1_MASK`], [`super::DXT3_MASK`], or
/// [`super::DXT5_MASK`] must be set.
pub fn to_rgba_raw(version: u32, width: u32, height: u32, in_bytes: &[u8]) -> Result<Vec<u8>, DxtError> {
    let variant = DxtVariant::from_mask(version)?;
    to_rgba(variant, width, height, in_bytes)
}
