//! LZX frame decompression: sliding-window LZ77 plus canonical Huffman,
//! with an aligned-offset block variant, a three-entry most-recently-used
//! offset cache, and an Intel E8 call-translation post-pass.

mod bitreader;
mod block;
mod frame;
mod huffman;
mod tables;
mod window;

use std::fmt;

use huffman::HuffmanTable;
use window::Window;

pub use frame::decompress;

/// Failure modes for a single frame decode. All are fatal: the decoder
/// instance should not be reused for the stream that triggered one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LzxError {
    /// Block-type header field was not VERBATIM, ALIGNED or UNCOMPRESSED.
    InvalidBlockType,
    /// A Huffman code set was over-subscribed (and not degenerate).
    OverSubscribedCode,
    /// A block's run would write past the end of the history window.
    WindowOverflow,
    /// An UNCOMPRESSED block would read past the supplied input.
    InputExhausted,
    /// The bit reader finished a block more than 2 bytes past the
    /// expected boundary, or with fewer than 16 bits of lookahead.
    PostBlockBitDrift,
    /// A frame finished without producing the requested output length.
    ShortOutput,
}

impl fmt::Display for LzxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            LzxError::InvalidBlockType => "invalid LZX block type",
            LzxError::OverSubscribedCode => "over-subscribed Huffman code",
            LzxError::WindowOverflow => "match run overflows history window",
            LzxError::InputExhausted => "uncompressed block read past input",
            LzxError::PostBlockBitDrift => "bit reader drifted past block boundary",
            LzxError::ShortOutput => "frame produced less output than requested",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for LzxError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockType {
    Invalid,
    Verbatim,
    Aligned,
    Uncompressed,
}

impl BlockType {
    fn from_bits(v: u32) -> Self {
        match v {
            1 => BlockType::Verbatim,
            2 => BlockType::Aligned,
            3 => BlockType::Uncompressed,
            _ => BlockType::Invalid,
        }
    }
}

/// A stateful LZX decoder: window, decode tables and MRU offset cache
/// persist across frames of the same stream. Construct one per archive;
/// frames must be decoded in order.
pub struct LzxDecoder {
    window: Window,
    r0: u32,
    r1: u32,
    r2: u32,
    main_elements: usize,
    header_read: bool,
    block_type: BlockType,
    block_length: u32,
    block_remaining: u32,
    frames_read: u32,
    intel_filesize: i32,
    intel_curpos: i32,
    intel_started: bool,
    pretree: HuffmanTable,
    maintree: HuffmanTable,
    length_tree: HuffmanTable,
    aligned: HuffmanTable,
}

impl LzxDecoder {
    /// `window_order` is the base-2 log of the history window size (`W`
    /// in spec terms); XNB streams use 15.
    pub fn new(window_order: u8) -> Self {
        log::debug!("constructing LzxDecoder with window_order={window_order}");
        Self {
            window: Window::new(window_order),
            r0: 1,
            r1: 1,
            r2: 1,
            main_elements: tables::main_elements(window_order),
            header_read: false,
            block_type: BlockType::Invalid,
            block_length: 0,
            block_remaining: 0,
            frames_read: 0,
            intel_filesize: 0,
            intel_curpos: 0,
            intel_started: false,
            pretree: HuffmanTable::new(tables::PRETREE_NUM_ELEMENTS, tables::PRETREE_TABLEBITS),
            maintree: HuffmanTable::new(tables::MAINTREE_MAXSYMBOLS, tables::MAINTREE_TABLEBITS),
            length_tree: HuffmanTable::new(tables::LENGTH_MAXSYMBOLS, tables::LENGTH_TABLEBITS),
            aligned: HuffmanTable::new(tables::ALIGNED_NUM_ELEMENTS, tables::ALIGNED_TABLEBITS),
        }
    }
}
