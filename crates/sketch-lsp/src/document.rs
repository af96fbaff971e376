//! Typed snapshot of a project document.

use sketch_syntax::{parse, LineCol, LineIndex, Member, Parse, TextRange, TextSize, Value};
use tower_lsp::lsp_types::{Position, Range};

pub const VERSION: &str = "version";
pub const CLI_VERSION: &str = "cliVersion";
pub const PORT: &str = "port";
pub const BOARD: &str = "board";
pub const BOARD_NAME: &str = "boardName";
pub const ALIAS: &str = "alias";

/// A top-level property with its source ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySymbol {
    pub name: String,
    /// String contents, `None` for missing or non-string values.
    pub value: Option<String>,
    pub key_range: TextRange,
    /// Range of the value, or of the key when the value is missing.
    pub value_range: TextRange,
    pub range: TextRange,
}

impl PropertySymbol {
    fn from_member(member: &Member) -> Self {
        let value = member.value.as_ref();
        Self {
            name: member.key.clone(),
            value: value.and_then(Value::as_str).map(str::to_string),
            key_range: member.key_range,
            value_range: value.map_or(member.key_range, |value| value.range),
            range: member.range,
        }
    }

    pub fn text(&self) -> &str {
        self.value.as_deref().unwrap_or_default()
    }
}

/// Immutable snapshot taken for one validation pass.
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    text: String,
    line_index: LineIndex,
    parse: Parse,
    pub schema_version: Option<PropertySymbol>,
    pub toolchain_version: Option<PropertySymbol>,
    pub port: Option<PropertySymbol>,
    pub board_id: Option<PropertySymbol>,
    pub board_name: Option<PropertySymbol>,
    pub alias: Option<PropertySymbol>,
}

impl ConfigDocument {
    pub fn new(text: &str) -> Self {
        let parse = parse(text);
        let property = |name: &str| {
            parse
                .root()
                .and_then(|root| root.member(name))
                .map(PropertySymbol::from_member)
        };
        let schema_version = property(VERSION);
        let toolchain_version = property(CLI_VERSION);
        let port = property(PORT);
        let board_id = property(BOARD);
        let board_name = property(BOARD_NAME);
        let alias = property(ALIAS);

        Self {
            text: text.to_string(),
            line_index: LineIndex::new(text),
            parse,
            schema_version,
            toolchain_version,
            port,
            board_id,
            board_name,
            alias,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parse(&self) -> &Parse {
        &self.parse
    }

    pub fn root(&self) -> Option<&Value> {
        self.parse.root()
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    /// Looks a top-level property up by name.
    pub fn property(&self, name: &str) -> Option<&PropertySymbol> {
        [
            &self.schema_version,
            &self.toolchain_version,
            &self.port,
            &self.board_id,
            &self.board_name,
            &self.alias,
        ]
        .into_iter()
        .flatten()
        .find(|symbol| symbol.name == name)
    }

    pub fn range(&self, range: TextRange) -> Range {
        to_range(&self.line_index, range)
    }

    pub fn offset(&self, position: Position) -> Option<TextSize> {
        to_offset(&self.line_index, position)
    }
}

pub fn to_position(index: &LineIndex, offset: TextSize) -> Position {
    let LineCol { line, col } = index.line_col(offset);
    Position::new(line, col)
}

pub fn to_range(index: &LineIndex, range: TextRange) -> Range {
    Range::new(
        to_position(index, range.start()),
        to_position(index, range.end()),
    )
}

pub fn to_offset(index: &LineIndex, position: Position) -> Option<TextSize> {
    index.offset(LineCol {
        line: position.line,
        col: position.character,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = r#"{
  "version": "0.0.1",
  "cliVersion": "0.35.3",
  "port": "COM3",
  "board": "arduino:avr:uno"
}"#;

    #[test]
    fn extracts_properties_with_ranges() {
        let document = ConfigDocument::new(SOURCE);

        let board = document.board_id.as_ref().expect("board");
        assert_eq!(board.text(), "arduino:avr:uno");
        assert_eq!(
            document.range(board.value_range),
            Range::new(Position::new(4, 11), Position::new(4, 28))
        );
        assert_eq!(
            document.range(board.key_range),
            Range::new(Position::new(4, 2), Position::new(4, 9))
        );
        assert!(document.board_name.is_none());
        assert_eq!(
            document.property(PORT).map(PropertySymbol::text),
            Some("COM3")
        );
    }

    #[test]
    fn non_string_values_have_no_text() {
        let document = ConfigDocument::new(r#"{ "port": 3 }"#);
        let port = document.port.as_ref().expect("port");
        assert_eq!(port.value, None);
        assert_eq!(port.text(), "");
        assert_eq!(port.value_range, TextRange::new(10.into(), 11.into()));
    }

    #[test]
    fn missing_value_falls_back_to_key_range() {
        let document = ConfigDocument::new(r#"{ "port": }"#);
        let port = document.port.as_ref().expect("port");
        assert_eq!(port.value_range, port.key_range);
        assert!(!document.parse().ok());
    }

    #[test]
    fn positions_round_trip() {
        let document = ConfigDocument::new(SOURCE);
        let position = Position::new(3, 10);
        let offset = document.offset(position).expect("offset");
        assert_eq!(to_position(document.line_index(), offset), position);
    }
}
