//! Submitted command history with a browse cursor

/// Append-only list of submitted lines, kept as the raw bytes typed.
///
/// The cursor lives in `0..=len`; `cursor == len` means the user is editing
/// live input rather than browsing.
#[derive(Debug, Default, Clone)]
pub struct History {
    entries: Vec<Vec<u8>>,
    cursor: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command and park the cursor after it. Empty lines are ignored.
    pub fn push(&mut self, entry: Vec<u8>) -> bool {
        if entry.is_empty() {
            return false;
        }
        self.entries.push(entry);
        self.cursor = self.entries.len();
        true
    }

    /// Step towards older entries, stopping at the first one
    pub fn up(&mut self) -> usize {
        self.cursor = self.cursor.saturating_sub(1);
        self.cursor
    }

    /// Step towards newer entries, stopping at live input
    pub fn down(&mut self) -> usize {
        if self.cursor < self.entries.len() {
            self.cursor += 1;
        }
        self.cursor
    }

    /// Entry under the cursor, `None` while on live input
    pub fn current(&self) -> Option<&[u8]> {
        self.entries.get(self.cursor).map(Vec::as_slice)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn entries(&self) -> &[Vec<u8>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<Vec<u8>>> FromIterator<S> for History {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut history = History::new();
        for entry in iter {
            history.push(entry.into());
        }
        history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_push_resets_cursor_to_len() {
        let mut history: History = ["ls", "pwd"].into_iter().collect();
        history.up();
        history.up();
        assert_eq!(history.cursor(), 0);

        assert!(history.push(b"date".to_vec()));
        assert_eq!(history.cursor(), 3);
        assert_eq!(history.current(), None);
    }

    #[test]
    fn test_empty_entries_are_not_recorded() {
        let mut history = History::new();
        assert!(!history.push(Vec::new()));
        assert!(history.is_empty());
    }

    #[test]
    fn test_duplicates_are_kept() {
        let history: History = ["ls", "ls"].into_iter().collect();
        assert_eq!(history.entries(), [b"ls".to_vec(), b"ls".to_vec()]);
    }

    #[test]
    fn test_current_is_none_on_live_input() {
        let mut history: History = ["ls"].into_iter().collect();
        assert_eq!(history.current(), None);
        history.up();
        assert_eq!(history.current(), Some(&b"ls"[..]));
    }

    #[test]
    fn test_non_utf8_entry_is_kept_verbatim() {
        let mut history = History::new();
        history.push(b"caf\xe9".to_vec());
        history.up();
        assert_eq!(history.current(), Some(&b"caf\xe9"[..]));
    }

    proptest! {
        #[test]
        fn prop_navigation_stays_in_bounds(len in 0usize..8, moves in prop::collection::vec(any::<bool>(), 0..40)) {
            let mut history: History = (0..len).map(|i| format!("cmd{i}")).collect();

            for up in moves {
                let before = history.cursor();
                let after = if up { history.up() } else { history.down() };
                if up {
                    prop_assert_eq!(after, before.saturating_sub(1));
                } else {
                    prop_assert_eq!(after, (before + 1).min(len));
                }
                prop_assert!(history.cursor() <= history.len());
            }
        }
    }
}
