//! Fixed-capacity byte ring that keeps the tail of a stream.
//!
//! The script's stderr is copied in here so a noisy child cannot grow our
//! memory; only the last `capacity` bytes survive.

use std::io::{self, Write};

pub const DEFAULT_CAPACITY: usize = 2048;

#[derive(Debug, Clone)]
pub struct CircularErrorLog {
    buf: Box<[u8]>,
    /// Next write position; also the oldest byte once the ring has wrapped.
    pos: usize,
    full: bool,
}

impl Default for CircularErrorLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl CircularErrorLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity.max(1)].into_boxed_slice(),
            pos: 0,
            full: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of bytes currently retained.
    pub fn len(&self) -> usize {
        if self.full {
            self.buf.len()
        } else {
            self.pos
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store one byte, overwriting the oldest once full.
    pub fn push(&mut self, byte: u8) {
        self.buf[self.pos] = byte;
        self.pos += 1;
        if self.pos == self.buf.len() {
            self.pos = 0;
            self.full = true;
        }
    }

    /// Retained bytes, oldest first.
    pub fn bytes(&self) -> Vec<u8> {
        if self.full {
            let (newer, older) = self.buf.split_at(self.pos);
            let mut out = Vec::with_capacity(self.buf.len());
            out.extend_from_slice(older);
            out.extend_from_slice(newer);
            out
        } else {
            self.buf[..self.pos].to_vec()
        }
    }

    /// Retained bytes decoded as text, one line per `\n`-separated segment.
    pub fn render(&self) -> String {
        let bytes = self.bytes();
        String::from_utf8_lossy(&bytes)
            .lines()
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Write for CircularErrorLog {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        for &b in data {
            self.push(b);
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
