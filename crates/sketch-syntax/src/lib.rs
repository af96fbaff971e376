//! `sketch-syntax` - Lexer, parser, and line index for sketch project documents.
//!
//! Project documents are JSON with comments. This crate provides the
//! low-level syntactic analysis the language server builds on:
//!
//! - **Lexer**: Tokenizes source text into a stream of tokens
//! - **Parser**: Builds a value tree where every node keeps its byte range
//! - **Line index**: Converts byte offsets to editor line/column positions
//!
//! # Design Principles
//!
//! - **Error-tolerant**: Parsing continues after errors, producing a partial tree
//! - **Range-accurate**: Keys, values, and whole members keep their own ranges so
//!   diagnostics and edits can target exactly the text they are about
//! - **Lenient**: Comments and trailing commas are accepted silently
//!
//! # Example
//!
//! ```
//! use sketch_syntax::parse;
//!
//! let parsed = parse(r#"{ "board": "arduino:avr:uno" }"#);
//! assert!(parsed.ok());
//!
//! let root = parsed.root().unwrap();
//! let board = root.member("board").unwrap();
//! assert_eq!(board.value.as_ref().and_then(|v| v.as_str()), Some("arduino:avr:uno"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

pub mod lexer;
pub mod line_index;
pub mod parser;

pub use lexer::{lex, Lexer, Token, TokenKind};
pub use line_index::{LineCol, LineIndex};
pub use parser::{parse, Member, Parse, SyntaxError, Value, ValueKind};
pub use text_size::{TextRange, TextSize};
