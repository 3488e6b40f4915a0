//! Chunk framing and the Intel E8 call-translation post-pass.
//!
//! XNB packs a compressed LZX stream as a sequence of chunks, each
//! decoding to at most one 0x8000-byte frame. A chunk header is either
//! the short form (2 bytes: compressed block size, frame size implied
//! as 0x8000) or, when the first byte is 0xFF, the long form (5 bytes:
//! an explicit frame size and block size, for the final undersized
//! chunk of a stream).

use super::{LzxDecoder, LzxError};

/// Decompresses a full LZX byte stream framed as XNB chunks, producing
/// exactly `out_len` bytes of output.
pub fn decompress(out_len: u32, in_bytes: &[u8]) -> Result<Vec<u8>, LzxError> {
    let mut decoder = LzxDecoder::new(15);
    let mut out = Vec::with_capacity(out_len as usize);
    let mut pos = 0usize;

    while pos < in_bytes.len() && (out.len() as u32) < out_len {
        let (frame_size, block_size, header_len) = read_chunk_header(&in_bytes[pos..])?;
        if frame_size == 0 || block_size == 0 {
            break;
        }
        pos += header_len;

        let end = pos
            .checked_add(block_size as usize)
            .ok_or(LzxError::InputExhausted)?;
        let block = in_bytes.get(pos..end).ok_or(LzxError::InputExhausted)?;

        let mut frame_out = decoder.decompress_frame(block, frame_size)?;
        decoder.apply_e8_translation(&mut frame_out);
        out.extend_from_slice(&frame_out);
        pos = end;
    }

    out.truncate(out_len as usize);
    if out.len() < out_len as usize {
        return Err(LzxError::ShortOutput);
    }
    Ok(out)
}

/// Parses one chunk header, returning `(frame_size, block_size, header_len)`.
fn read_chunk_header(bytes: &[u8]) -> Result<(u32, u32, usize), LzxError> {
    let b0 = *bytes.first().ok_or(LzxError::InputExhausted)?;
    if b0 == 0xFF {
        let b = bytes.get(0..5).ok_or(LzxError::InputExhausted)?;
        let frame_size = ((b[1] as u32) << 8) | b[2] as u32;
        let block_size = ((b[3] as u32) << 8) | b[4] as u32;
        Ok((frame_size, block_size, 5))
    } else {
        let b = bytes.get(0..2).ok_or(LzxError::InputExhausted)?;
        let block_size = ((b[0] as u32) << 8) | b[1] as u32;
        Ok((0x8000, block_size, 2))
    }
}

impl LzxDecoder {
    /// Rewrites the relative-call targets a frame's E8 opcodes point at,
    /// translating them back to absolute file offsets the way the
    /// compressor's pre-pass had translated them away. Limited to the
    /// first 32768 frames of a stream, and a no-op while `intel_filesize`
    /// is unset since there is then nothing to translate against.
    fn apply_e8_translation(&mut self, out: &mut [u8]) {
        let allowed = self.frames_read < 32768;
        self.frames_read += 1;
        let out_len = out.len() as i32;

        if allowed && self.intel_filesize != 0 && self.intel_started && out_len > 10 {
            let mut pos: usize = 0;
            while (pos as i32) <= out_len - 11 {
                if out[pos] == 0xE8 {
                    // The file offset of the byte right after this opcode's
                    // 4-byte operand, not the frame's starting offset.
                    let current = self.intel_curpos + pos as i32;
                    let abs = i32::from_le_bytes(out[pos + 1..pos + 5].try_into().unwrap());
                    if abs >= -current && abs < self.intel_filesize {
                        let rel = if abs >= 0 {
                            abs.wrapping_sub(current)
                        } else {
                            abs.wrapping_add(self.intel_filesize)
                        };
                        out[pos + 1..pos + 5].copy_from_slice(&rel.to_le_bytes());
                    }
                    pos += 5;
                } else {
                    pos += 1;
                }
            }
        }

        self.intel_curpos += out_len;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_chunk_header_implies_full_frame_size() {
        let bytes = [0x00, 0x30];
        let (frame_size, block_size, header_len) = read_chunk_header(&bytes).unwrap();
        assert_eq!(frame_size, 0x8000);
        assert_eq!(block_size, 0x30);
        assert_eq!(header_len, 2);
    }

    #[test]
    fn long_chunk_header_carries_explicit_frame_size() {
        let bytes = [0xFF, 0x00, 0x04, 0x00, 0x30];
        let (frame_size, block_size, header_len) = read_chunk_header(&bytes).unwrap();
        assert_eq!(frame_size, 4);
        assert_eq!(block_size, 0x30);
        assert_eq!(header_len, 5);
    }

    #[test]
    fn single_uncompressed_block_round_trips() {
        let in_bytes = [
            0, 48, 64, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 87, 88, 89, 90,
        ];
        let mut decoder = LzxDecoder::new(15);
        let out = decoder.decompress_frame(&in_bytes, 4).unwrap();
        assert_eq!(out, b"WXYZ");
    }

    #[test]
    fn two_uncompressed_blocks_with_odd_padding_round_trip() {
        let in_bytes = [
            0, 48, 48, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 97, 98, 99, 170, 0, 96, 64, 0, 1, 0,
            0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 100, 101,
        ];
        let mut decoder = LzxDecoder::new(15);
        let out = decoder.decompress_frame(&in_bytes, 5).unwrap();
        assert_eq!(out, b"abcde");
    }

    #[test]
    fn verbatim_block_decodes_all_256_literals() {
        #[rustfmt::skip]
        let in_bytes: [u8; 384] = [
            0x00, 0x10, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x10, 0x08, 0x20, 0x18, 0x30, 0x28, 0x40, 0x38, 0x50, 0x48, 0x60, 0x58, 0x70, 0x68, 0x80, 0x78,
            0x90, 0x88, 0xA0, 0x98, 0xB0, 0xA8, 0xC0, 0xB8, 0xD0, 0xC8, 0xE0, 0xD8, 0xF0, 0xE8, 0x01, 0xF9,
            0x11, 0x09, 0x21, 0x19, 0x31, 0x29, 0x41, 0x39, 0x51, 0x49, 0x61, 0x59, 0x71, 0x69, 0x81, 0x79,
            0x91, 0x89, 0xA1, 0x99, 0xB1, 0xA9, 0xC1, 0xB9, 0xD1, 0xC9, 0xE1, 0xD9, 0xF1, 0xE9, 0x02, 0xFA,
            0x12, 0x0A, 0x22, 0x1A, 0x32, 0x2A, 0x42, 0x3A, 0x52, 0x4A, 0x62, 0x5A, 0x72, 0x6A, 0x82, 0x7A,
            0x92, 0x8A, 0xA2, 0x9A, 0xB2, 0xAA, 0xC2, 0xBA, 0xD2, 0xCA, 0xE2, 0xDA, 0xF2, 0xEA, 0x03, 0xFB,
            0x13, 0x0B, 0x23, 0x1B, 0x33, 0x2B, 0x43, 0x3B, 0x53, 0x4B, 0x63, 0x5B, 0x73, 0x6B, 0x83, 0x7B,
            0x93, 0x8B, 0xA3, 0x9B, 0xB3, 0xAB, 0xC3, 0xBB, 0xD3, 0xCB, 0xE3, 0xDB, 0xF3, 0xEB, 0x04, 0xFC,
            0x14, 0x0C, 0x24, 0x1C, 0x34, 0x2C, 0x44, 0x3C, 0x54, 0x4C, 0x64, 0x5C, 0x74, 0x6C, 0x84, 0x7C,
            0x94, 0x8C, 0xA4, 0x9C, 0xB4, 0xAC, 0xC4, 0xBC, 0xD4, 0xCC, 0xE4, 0xDC, 0xF4, 0xEC, 0x05, 0xFD,
            0x15, 0x0D, 0x25, 0x1D, 0x35, 0x2D, 0x45, 0x3D, 0x55, 0x4D, 0x65, 0x5D, 0x75, 0x6D, 0x85, 0x7D,
            0x95, 0x8D, 0xA5, 0x9D, 0xB5, 0xAD, 0xC5, 0xBD, 0xD5, 0xCD, 0xE5, 0xDD, 0xF5, 0xED, 0x06, 0xFE,
            0x16, 0x0E, 0x26, 0x1E, 0x36, 0x2E, 0x46, 0x3E, 0x56, 0x4E, 0x66, 0x5E, 0x76, 0x6E, 0x86, 0x7E,
            0x96, 0x8E, 0xA6, 0x9E, 0xB6, 0xAE, 0xC6, 0xBE, 0xD6, 0xCE, 0xE6, 0xDE, 0xF6, 0xEE, 0x07, 0xFF,
            0x17, 0x0F, 0x27, 0x1F, 0x37, 0x2F, 0x47, 0x3F, 0x57, 0x4F, 0x67, 0x5F, 0x77, 0x6F, 0x87, 0x7F,
            0x97, 0x8F, 0xA7, 0x9F, 0xB7, 0xAF, 0xC7, 0xBF, 0xD7, 0xCF, 0xE7, 0xDF, 0xF7, 0xEF, 0x00, 0xF8,
        ];
        let mut decoder = LzxDecoder::new(15);
        let out = decoder.decompress_frame(&in_bytes, 256).unwrap();
        let expected: Vec<u8> = (0..=255u8).collect();
        assert_eq!(out, expected);
    }

    #[test]
    fn verbatim_block_reuses_r0_offset_for_match() {
        #[rustfmt::skip]
        let in_bytes: [u8; 128] = [
            0x00, 0x10, 0x81, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
        ];
        let mut decoder = LzxDecoder::new(15);
        let out = decoder.decompress_frame(&in_bytes, 8).unwrap();
        assert_eq!(out, [0xABu8; 8]);
    }

    #[test]
    fn e8_translation_rewrites_call_target_to_relative() {
        let mut decoder = LzxDecoder::new(15);
        decoder.intel_filesize = 0x10000;
        decoder.intel_curpos = 0x0100;
        decoder.intel_started = true;
        decoder.frames_read = 0;

        let mut buf = vec![0u8; 16];
        buf[0] = 0xE8;
        buf[1..5].copy_from_slice(&0x10i32.to_le_bytes());
        decoder.apply_e8_translation(&mut buf);

        assert_eq!(&buf[1..5], &[0x10, 0xFF, 0xFF, 0xFF]);
        assert_eq!(decoder.intel_curpos, 0x0100 + 16);
    }

    #[test]
    fn e8_translation_uses_running_pointer_not_frame_start() {
        // Two back-to-back E8 opcodes away from the start of the buffer;
        // each must be translated against its own file offset
        // (`intel_curpos + pos`), not the frame's starting offset.
        let mut decoder = LzxDecoder::new(15);
        decoder.intel_filesize = 0x10000;
        decoder.intel_curpos = 0;
        decoder.intel_started = true;
        decoder.frames_read = 0;

        let mut buf = vec![0x64u8; 162];
        buf[146] = 0xE8;
        buf[147..151].copy_from_slice(&0x7Bi32.to_le_bytes());
        buf[151] = 0xE8;
        buf[152..156].copy_from_slice(&0x7Bi32.to_le_bytes());
        decoder.apply_e8_translation(&mut buf);

        assert_eq!(&buf[147..151], &[0xE9, 0xFF, 0xFF, 0xFF]);
        assert_eq!(&buf[152..156], &[0xE4, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn e8_translation_is_noop_without_intel_filesize() {
        let mut decoder = LzxDecoder::new(15);
        let mut buf = vec![0u8; 16];
        buf[0] = 0xE8;
        buf[1..5].copy_from_slice(&0x10i32.to_le_bytes());
        let before = buf.clone();
        decoder.apply_e8_translation(&mut buf);
        assert_eq!(buf, before);
    }

    #[test]
    fn e8_translation_stops_after_32768_frames() {
        let mut decoder = LzxDecoder::new(15);
        decoder.intel_filesize = 0x10000;
        decoder.intel_started = true;
        decoder.frames_read = 32768;

        let mut buf = vec![0u8; 16];
        buf[0] = 0xE8;
        buf[1..5].copy_from_slice(&0x10i32.to_le_bytes());
        let before = buf.clone();
        decoder.apply_e8_translation(&mut buf);
        assert_eq!(buf, before);
    }
}
