//! Codec cores for XNB content blobs: LZX frame decompression and DXT
//! (S3TC/BC1/BC2/BC3) block decoding.
//!
//! Both codecs are pure transforms over borrowed byte slices. Neither
//! touches a file, a socket, or an environment variable, and neither
//! knows anything about the host language that eventually calls into it
//! — that glue lives outside this crate.

pub mod dxt;
pub mod lzx;

pub use dxt::{to_rgba, to_rgba_raw, DxtError, DxtVariant};
pub use lzx::{decompress, LzxDecoder, LzxError};
