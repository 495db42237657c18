//! Byte-offset <-> code-point-offset conversion.
//!
//! The specification measures every `Entity`/`Shard` span in Unicode code
//! points, but `regex` (and plain Rust string slicing) works in bytes. This
//! module builds a one-time index per input string so stages can convert
//! between the two without repeatedly walking the string.

/// Maps byte offsets to code-point offsets for one source string.
pub struct CodePointIndex {
    /// `byte_to_char[b]` is the code-point index of the char starting at
    /// byte `b`, for every char-boundary byte offset `b` (including the
    /// one-past-the-end offset).
    boundaries: Vec<usize>,
}

impl CodePointIndex {
    pub fn new(text: &str) -> Self {
        let mut boundaries = Vec::with_capacity(text.len() + 1);
        for (char_idx, (byte_idx, _)) in text.char_indices().enumerate() {
            let _ = char_idx;
            boundaries.push(byte_idx);
        }
        boundaries.push(text.len());
        Self { boundaries }
    }

    /// Convert a byte offset (must fall on a char boundary) to a code-point
    /// offset.
    pub fn byte_to_char(&self, byte_offset: usize) -> usize {
        match self.boundaries.binary_search(&byte_offset) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        }
    }

    /// Convert a code-point offset back to a byte offset.
    pub fn char_to_byte(&self, char_offset: usize) -> usize {
        *self
            .boundaries
            .get(char_offset)
            .unwrap_or_else(|| self.boundaries.last().unwrap())
    }

    pub fn char_len(&self) -> usize {
        self.boundaries.len().saturating_sub(1)
    }
}

/// Slice `text` by code-point offsets `[start, end)`.
pub fn slice_by_chars(text: &str, start: usize, end: usize) -> &str {
    let idx = CodePointIndex::new(text);
    let b_start = idx.char_to_byte(start);
    let b_end = idx.char_to_byte(end);
    &text[b_start..b_end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_round_trips() {
        let text = "hello world";
        let idx = CodePointIndex::new(text);
        assert_eq!(idx.char_len(), text.len());
        for b in 0..=text.len() {
            if text.is_char_boundary(b) {
                let c = idx.byte_to_char(b);
                assert_eq!(idx.char_to_byte(c), b);
            }
        }
    }

    #[test]
    fn multibyte_offsets_differ_from_bytes() {
        // "café" has 4 code points but 5 bytes (é is 2 bytes in UTF-8).
        let text = "café bar";
        let idx = CodePointIndex::new(text);
        assert_eq!(idx.char_len(), text.chars().count());
        // byte offset of 'b' in "bar" is 6 (c-a-f-é(2 bytes)-space), char offset is 5.
        let byte_of_b = text.find('b').unwrap();
        assert_eq!(idx.byte_to_char(byte_of_b), 5);
        assert_eq!(slice_by_chars(text, 5, 8), "bar");
    }
}
