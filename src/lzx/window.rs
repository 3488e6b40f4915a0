//! Circular LZX history buffer.
//!
//! Pre-filled with `0xDC` rather than zero: reads of untouched window
//! regions — which should never happen on well-formed input — come back
//! as a conspicuous non-zero marker instead of silently looking like
//! valid decoded data.

const FILL_BYTE: u8 = 0xDC;

pub struct Window {
    buf: Vec<u8>,
    size: usize,
    posn: usize,
}

impl Window {
    pub fn new(window_order: u8) -> Self {
        let size = 1usize << window_order;
        Self { buf: vec![FILL_BYTE; size], size, posn: 0 }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn posn(&self) -> usize {
        self.posn
    }

    pub fn set_posn(&mut self, posn: usize) {
        self.posn = posn;
    }

    /// Masks `posn` into range, as the block decoder does at the top of
    /// every run (`window_posn &= window_size - 1`).
    pub fn wrap_posn(&mut self) {
        self.posn &= self.size - 1;
    }

    pub fn put_literal(&mut self, byte: u8) {
        self.buf[self.posn] = byte;
        self.posn += 1;
    }

    /// Copies `len` raw bytes from `src` at the write cursor, advancing
    /// it (UNCOMPRESSED block body).
    pub fn put_raw(&mut self, src: &[u8]) {
        let end = self.posn + src.len();
        self.buf[self.posn..end].copy_from_slice(src);
        self.posn = end;
    }

    /// Copies a match of `len` bytes from `offset` bytes behind the write
    /// cursor to the write cursor, handling history wraparound. If the
    /// source window straddles the buffer end, the copy is split into a
    /// pre-wrap tail and a post-wrap head starting at index 0.
    pub fn copy_match(&mut self, offset: usize, mut len: usize) {
        let mut dest = self.posn;
        self.posn += len;

        let mut src = if dest >= offset {
            dest - offset
        } else {
            let wrapped_src = dest + self.size - offset;
            let pre_wrap = offset - dest;
            if pre_wrap < len {
                len -= pre_wrap;
                let mut remaining = pre_wrap;
                let mut s = wrapped_src;
                let mut d = dest;
                while remaining > 0 {
                    self.buf[d] = self.buf[s];
                    d += 1;
                    s += 1;
                    remaining -= 1;
                }
                dest = d;
                0
            } else {
                wrapped_src
            }
        };

        while len > 0 {
            self.buf[dest] = self.buf[src];
            dest += 1;
            src += 1;
            len -= 1;
        }
    }

    /// Extracts the last `out_len` bytes written, wrapping around the
    /// buffer end if the write cursor sits at (or has wrapped past) the
    /// start.
    pub fn tail(&self, out_len: usize) -> Vec<u8> {
        let start = if self.posn == 0 { self.size } else { self.posn } - out_len;
        self.buf[start..start + out_len].to_vec()
    }
}
