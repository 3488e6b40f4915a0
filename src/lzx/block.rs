//! Per-frame block loop: header parse, VERBATIM / ALIGNED / UNCOMPRESSED
//! dispatch, and the literal/match decode inner loop.

use super::bitreader::BitReader;
use super::tables;
use super::{BlockType, LzxDecoder, LzxError};

#[derive(Clone, Copy)]
enum LenTarget {
    Main,
    Length,
}

impl LzxDecoder {
    /// Indexes into the full length buffer, including its safety pad:
    /// `ReadLengths` run codes can legitimately write past `last` into
    /// the pad before the enclosing loop notices `x >= last`.
    fn len_at(&self, target: LenTarget, x: usize) -> u8 {
        match target {
            LenTarget::Main => self.maintree.lengths_padded()[x],
            LenTarget::Length => self.length_tree.lengths_padded()[x],
        }
    }

    fn set_len_at(&mut self, target: LenTarget, x: usize, v: u8) {
        match target {
            LenTarget::Main => self.maintree.lengths_mut_padded()[x] = v,
            LenTarget::Length => self.length_tree.lengths_mut_padded()[x] = v,
        }
    }

    /// Decodes a run of code lengths `[first, last)` as deltas against
    /// their previous values, modulo 17 (`ReadLengths`).
    fn read_lengths(
        &mut self,
        reader: &mut BitReader,
        target: LenTarget,
        first: usize,
        last: usize,
    ) -> Result<(), LzxError> {
        for x in 0..tables::PRETREE_NUM_ELEMENTS {
            self.pretree.lengths_mut()[x] = reader.read(4) as u8;
        }
        self.pretree.build()?;

        let mut x = first;
        while x < last {
            let z = self.pretree.decode_symbol(reader);
            match z {
                17 => {
                    let mut run = reader.read(4) + 4;
                    while run > 0 {
                        self.set_len_at(target, x, 0);
                        x += 1;
                        run -= 1;
                    }
                }
                18 => {
                    let mut run = reader.read(5) + 20;
                    while run > 0 {
                        self.set_len_at(target, x, 0);
                        x += 1;
                        run -= 1;
                    }
                }
                19 => {
                    let mut run = reader.read(1) + 4;
                    let z2 = self.pretree.decode_symbol(reader);
                    let prev = self.len_at(target, x) as i32;
                    let delta = (prev - z2 as i32).rem_euclid(17) as u8;
                    while run > 0 {
                        self.set_len_at(target, x, delta);
                        x += 1;
                        run -= 1;
                    }
                }
                _ => {
                    let prev = self.len_at(target, x) as i32;
                    let delta = (prev - z as i32).rem_euclid(17) as u8;
                    self.set_len_at(target, x, delta);
                    x += 1;
                }
            }
        }
        Ok(())
    }

    /// Parses the header of a new block, primed when `block_remaining`
    /// has just reached zero.
    fn start_block(&mut self, reader: &mut BitReader) -> Result<(), LzxError> {
        if self.block_type == BlockType::Uncompressed {
            if self.block_length % 2 == 1 {
                reader.skip_bytes(1);
            }
            reader.init();
        }

        self.block_type = BlockType::from_bits(reader.read(3));
        let hi = reader.read(16);
        let lo = reader.read(8);
        self.block_length = (hi << 8) | lo;
        self.block_remaining = self.block_length;

        match self.block_type {
            BlockType::Aligned => {
                for i in 0..tables::ALIGNED_NUM_ELEMENTS {
                    self.aligned.lengths_mut()[i] = reader.read(3) as u8;
                }
                self.aligned.build()?;
                self.read_main_and_length_trees(reader)
            }
            BlockType::Verbatim => self.read_main_and_length_trees(reader),
            BlockType::Uncompressed => {
                self.intel_started = true;
                reader.ensure(16);
                if reader.bits_left() > 16 {
                    reader.rewind_bytes(2);
                }
                self.r0 = reader.read_u32_le();
                self.r1 = reader.read_u32_le();
                self.r2 = reader.read_u32_le();
                Ok(())
            }
            BlockType::Invalid => Err(LzxError::InvalidBlockType),
        }
    }

    fn read_main_and_length_trees(&mut self, reader: &mut BitReader) -> Result<(), LzxError> {
        self.read_lengths(reader, LenTarget::Main, 0, 256)?;
        self.read_lengths(reader, LenTarget::Main, 256, self.main_elements)?;
        self.maintree.build()?;
        if self.maintree.lengths()[0xE8] != 0 {
            self.intel_started = true;
        }

        self.read_lengths(reader, LenTarget::Length, 0, tables::NUM_SECONDARY_LENGTHS)?;
        self.length_tree.build()
    }

    /// Resolves a main-tree match's offset, updating R0/R1/R2 in place
    /// (slot 0 reads R0 without touching the cache; slot 1 and 2 swap
    /// R0 with R1/R2 respectively; slot >= 3 pushes a fresh offset in).
    fn resolve_offset(&mut self, slot: u32, aligned: bool, reader: &mut BitReader) -> u32 {
        if slot > 2 {
            let offset = if aligned {
                let extra = tables::EXTRA_BITS[slot as usize] as u32;
                let mut offset = tables::POSITION_BASE[slot as usize] - 2;
                if extra > 3 {
                    offset += reader.read(extra - 3) << 3;
                    offset += self.aligned.decode_symbol(reader);
                } else if extra == 3 {
                    offset += self.aligned.decode_symbol(reader);
                } else if extra > 0 {
                    offset += reader.read(extra);
                } else {
                    offset = 1;
                }
                offset
            } else if slot == 3 {
                1
            } else {
                let extra = tables::EXTRA_BITS[slot as usize] as u32;
                let verbatim = reader.read(extra);
                tables::POSITION_BASE[slot as usize] - 2 + verbatim
            };
            self.r2 = self.r1;
            self.r1 = self.r0;
            self.r0 = offset;
            offset
        } else if slot == 0 {
            self.r0
        } else if slot == 1 {
            let offset = self.r1;
            self.r1 = self.r0;
            self.r0 = offset;
            offset
        } else {
            let offset = self.r2;
            self.r2 = self.r0;
            self.r0 = offset;
            offset
        }
    }

    /// VERBATIM / ALIGNED decode loop: literals and matches share the
    /// main-tree symbol space; the two block types differ only in how a
    /// match's offset above slot 2 is resolved.
    fn decode_run(&mut self, reader: &mut BitReader, aligned: bool, this_run: usize) -> Result<(), LzxError> {
        let mut remaining: i64 = this_run as i64;
        while remaining > 0 {
            let main_element = self.maintree.decode_symbol(reader);
            if (main_element as usize) < tables::NUM_CHARS {
                self.window.put_literal(main_element as u8);
                remaining -= 1;
                continue;
            }

            let element = main_element - tables::NUM_CHARS as u32;
            let mut match_length = element & tables::NUM_PRIMARY_LENGTHS;
            if match_length == tables::NUM_PRIMARY_LENGTHS {
                match_length += self.length_tree.decode_symbol(reader);
            }
            match_length += tables::MIN_MATCH;

            let slot = element >> 3;
            let offset = self.resolve_offset(slot, aligned, reader);

            remaining -= match_length as i64;
            self.window.copy_match(offset as usize, match_length as usize);
        }
        Ok(())
    }

    fn copy_uncompressed(&mut self, reader: &mut BitReader, this_run: usize) -> Result<(), LzxError> {
        let bytes = reader.read_raw(this_run).ok_or(LzxError::InputExhausted)?;
        self.window.put_raw(bytes);
        Ok(())
    }

    /// Decodes one frame of at most `out_len` bytes from `in_bytes`
    /// (`LzxDecoder::Decompress` in the original source).
    pub(super) fn decompress_frame(&mut self, in_bytes: &[u8], out_len: u32) -> Result<Vec<u8>, LzxError> {
        let mut reader = BitReader::new(in_bytes);
        let in_len = in_bytes.len();

        if !self.header_read {
            if reader.read(1) != 0 {
                // Two 16-bit Intel filesize fields; parsed to stay
                // byte-aligned with the rest of the stream, not stored.
                reader.read(16);
                reader.read(16);
            }
            self.header_read = true;
        }

        let mut togo = out_len;
        while togo > 0 {
            if self.block_remaining == 0 {
                self.start_block(&mut reader)?;
            }

            if reader.byte_pos() > in_len
                && (reader.byte_pos() > in_len + 2 || reader.bits_left() < 16)
            {
                return Err(LzxError::PostBlockBitDrift);
            }

            while self.block_remaining > 0 && togo > 0 {
                let this_run = self.block_remaining.min(togo);
                togo -= this_run;
                self.block_remaining -= this_run;

                self.window.wrap_posn();
                if self.window.posn() + this_run as usize > self.window.size() {
                    return Err(LzxError::WindowOverflow);
                }

                match self.block_type {
                    BlockType::Verbatim => self.decode_run(&mut reader, false, this_run as usize)?,
                    BlockType::Aligned => self.decode_run(&mut reader, true, this_run as usize)?,
                    BlockType::Uncompressed => self.copy_uncompressed(&mut reader, this_run as usize)?,
                    BlockType::Invalid => return Err(LzxError::InvalidBlockType),
                }
            }
        }

        if togo != 0 {
            return Err(LzxError::ShortOutput);
        }

        log::trace!("frame decoded: out_len={out_len} frames_read={}", self.frames_read);
        Ok(self.window.tail(out_len as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_lengths_zero_run_overshoot_does_not_panic() {
        // A degenerate pretree that always decodes symbol 18 (a zero-run
        // of at least 20) against the LENGTH tree's `last = 249` with
        // `max_symbols = 250`: the final run pushes the write cursor to
        // 260, eleven past `last`, which must land in the safety pad
        // rather than panic.
        #[rustfmt::skip]
        let in_bytes: [u8; 36] = [
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        let mut decoder = LzxDecoder::new(15);
        let mut reader = BitReader::new(&in_bytes);
        let result = decoder.read_lengths(&mut reader, LenTarget::Length, 0, tables::NUM_SECONDARY_LENGTHS);
        assert!(result.is_ok());
    }
}
