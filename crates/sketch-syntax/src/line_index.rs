//! Offset to line/column conversion.
//!
//! Columns are counted in UTF-16 code units, which is what LSP clients use
//! by default.

use text_size::{TextRange, TextSize};

/// A zero-based line and UTF-16 column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LineCol {
    /// Zero-based line.
    pub line: u32,
    /// Zero-based column in UTF-16 code units.
    pub col: u32,
}

/// Precomputed line starts for a document.
#[derive(Debug, Clone)]
pub struct LineIndex {
    text: String,
    line_starts: Vec<TextSize>,
}

impl LineIndex {
    /// Builds the index for `text`.
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![TextSize::from(0)];
        for (offset, c) in text.char_indices() {
            if c == '\n' {
                line_starts.push(TextSize::from((offset + 1) as u32));
            }
        }
        Self {
            text: text.to_string(),
            line_starts,
        }
    }

    /// Number of lines (a trailing newline opens an empty last line).
    #[must_use]
    pub fn line_count(&self) -> u32 {
        self.line_starts.len() as u32
    }

    /// Converts a byte offset into a line/column pair. Offsets past the end
    /// clamp to the end of the text.
    #[must_use]
    pub fn line_col(&self, offset: TextSize) -> LineCol {
        let offset = offset.min(TextSize::of(self.text.as_str()));
        let line = self
            .line_starts
            .partition_point(|start| *start <= offset)
            .saturating_sub(1);
        let start = self.line_starts[line];
        let col = self.text[usize::from(start)..usize::from(offset)]
            .chars()
            .map(char::len_utf16)
            .sum::<usize>();
        LineCol {
            line: line as u32,
            col: col as u32,
        }
    }

    /// Converts a line/column pair back into a byte offset. Columns past the
    /// end of the line clamp to the line end; unknown lines return `None`.
    #[must_use]
    pub fn offset(&self, position: LineCol) -> Option<TextSize> {
        let line = self.line_range(position.line)?;
        let mut remaining = position.col as usize;
        let mut offset = line.start();
        for c in self.text[usize::from(line.start())..usize::from(line.end())].chars() {
            if remaining == 0 {
                break;
            }
            remaining = remaining.saturating_sub(c.len_utf16());
            offset += TextSize::of(c);
        }
        Some(offset)
    }

    /// Byte range of a line, excluding its line terminator.
    #[must_use]
    pub fn line_range(&self, line: u32) -> Option<TextRange> {
        let start = *self.line_starts.get(line as usize)?;
        let end = self
            .line_starts
            .get(line as usize + 1)
            .copied()
            .unwrap_or_else(|| TextSize::of(self.text.as_str()));
        let mut text_end = end;
        let slice = &self.text[usize::from(start)..usize::from(end)];
        if slice.ends_with("\r\n") {
            text_end -= TextSize::from(2);
        } else if slice.ends_with('\n') {
            text_end -= TextSize::from(1);
        }
        Some(TextRange::new(start, text_end))
    }

    /// The text of a line, excluding its line terminator.
    #[must_use]
    pub fn line_text(&self, line: u32) -> Option<&str> {
        let range = self.line_range(line)?;
        Some(&self.text[usize::from(range.start())..usize::from(range.end())])
    }

    /// The leading whitespace of a line.
    #[must_use]
    pub fn indentation(&self, line: u32) -> &str {
        let Some(text) = self.line_text(line) else {
            return "";
        };
        let width = text.len() - text.trim_start_matches([' ', '\t']).len();
        &text[..width]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_ascii_positions() {
        let index = LineIndex::new("{\n  \"a\": 1\n}\n");
        let position = index.line_col(TextSize::from(4));
        assert_eq!(position, LineCol { line: 1, col: 2 });
        assert_eq!(index.offset(position), Some(TextSize::from(4)));
        assert_eq!(index.line_count(), 4);
    }

    #[test]
    fn counts_utf16_columns() {
        // 'é' is 2 bytes / 1 unit, '😀' is 4 bytes / 2 units.
        let text = "é😀x";
        let index = LineIndex::new(text);
        let x = TextSize::from(6);
        assert_eq!(index.line_col(x), LineCol { line: 0, col: 3 });
        assert_eq!(index.offset(LineCol { line: 0, col: 3 }), Some(x));
    }

    #[test]
    fn clamps_columns_and_rejects_unknown_lines() {
        let index = LineIndex::new("ab\ncd");
        assert_eq!(
            index.offset(LineCol { line: 0, col: 99 }),
            Some(TextSize::from(2))
        );
        assert_eq!(index.offset(LineCol { line: 5, col: 0 }), None);
    }

    #[test]
    fn line_text_strips_crlf() {
        let index = LineIndex::new("  one\r\n\ttwo");
        assert_eq!(index.line_text(0), Some("  one"));
        assert_eq!(index.indentation(0), "  ");
        assert_eq!(index.indentation(1), "\t");
    }
}
