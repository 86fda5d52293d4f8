//! The editable, not-yet-submitted command line

/// Bytes typed since the last submission.
///
/// Stored as raw bytes because input arrives one byte at a time and a
/// multi-byte character may be split across reads.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LineBuffer {
    bytes: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    /// Remove the last character, returning `false` if the line was empty.
    ///
    /// A trailing UTF-8 sequence is removed as a whole so the erase stays in
    /// step with the single column the terminal shows for it.
    pub fn pop_char(&mut self) -> bool {
        let Some(last) = self.bytes.pop() else {
            return false;
        };

        if is_continuation(last) {
            while let Some(&byte) = self.bytes.last() {
                if is_continuation(byte) {
                    self.bytes.pop();
                    continue;
                }
                if byte >= 0xC0 {
                    self.bytes.pop();
                }
                break;
            }
        }

        true
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// Overwrite the whole line, e.g. with a recalled history entry
    pub fn replace(&mut self, bytes: &[u8]) {
        self.bytes.clear();
        self.bytes.extend_from_slice(bytes);
    }

    /// Hand the line over and leave the buffer empty
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pop_on_empty_is_noop() {
        let mut line = LineBuffer::new();
        assert!(!line.pop_char());
        assert!(line.is_empty());
    }

    #[test]
    fn test_pop_removes_whole_utf8_character() {
        let mut line = LineBuffer::new();
        for byte in "hé".bytes() {
            line.push(byte);
        }
        assert_eq!(line.len(), 3);

        assert!(line.pop_char());
        assert_eq!(line.as_bytes(), b"h");
    }

    #[test]
    fn test_replace_and_take() {
        let mut line = LineBuffer::new();
        line.push(b'x');
        line.replace(b"pwd");
        assert_eq!(line.as_bytes(), b"pwd");

        assert_eq!(line.take(), b"pwd".to_vec());
        assert!(line.is_empty());
    }

    #[derive(Debug, Clone)]
    enum Key {
        Char(u8),
        Backspace,
    }

    fn key() -> impl Strategy<Value = Key> {
        prop_oneof![
            (0x20u8..0x7F).prop_map(Key::Char),
            Just(Key::Backspace),
        ]
    }

    proptest! {
        #[test]
        fn prop_backspace_removes_exactly_one_preceding_char(keys in prop::collection::vec(key(), 0..64)) {
            let mut line = LineBuffer::new();
            let mut model: Vec<u8> = Vec::new();

            for key in keys {
                match key {
                    Key::Char(c) => {
                        line.push(c);
                        model.push(c);
                    }
                    Key::Backspace => {
                        let removed = line.pop_char();
                        prop_assert_eq!(removed, model.pop().is_some());
                    }
                }
            }

            prop_assert_eq!(line.as_bytes(), model.as_slice());
        }
    }
}
