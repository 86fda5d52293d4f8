//! Scratch space for an in-progress `ESC [ x` sequence

const CAPACITY: usize = 3;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EscapeAccumulator {
    bytes: [u8; CAPACITY],
    len: usize,
}

impl EscapeAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new sequence with `first` as its only byte
    pub fn start(&mut self, first: u8) {
        self.reset();
        self.push(first);
    }

    /// Append a byte; bytes beyond the third are dropped
    pub fn push(&mut self, byte: u8) {
        if self.len < CAPACITY {
            self.bytes[self.len] = byte;
            self.len += 1;
        }
    }

    pub fn reset(&mut self) {
        self.len = 0;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
