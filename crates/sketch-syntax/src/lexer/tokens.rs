//! Token definitions for project documents.
//!
//! The token set is JSON plus line and block comments. Bare words that are
//! not `true`, `false`, or `null` lex as [`TokenKind::Ident`] so the parser
//! can report them precisely instead of one error per character.

use logos::Logos;

fn lex_block_comment(lex: &mut logos::Lexer<TokenKind>) -> bool {
    let bytes = lex.remainder().as_bytes();
    let mut i = 0usize;

    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            lex.bump(i + 2);
            return true;
        }
        i += 1;
    }

    lex.bump(bytes.len());
    false
}

fn lex_string(lex: &mut logos::Lexer<TokenKind>) -> bool {
    let bytes = lex.remainder().as_bytes();
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                lex.bump(i + 1);
                return true;
            }
            b'\\' => i += 2,
            b'\n' => break,
            _ => i += 1,
        }
    }

    lex.bump(i.min(bytes.len()));
    false
}

/// All token kinds in a project document.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u16)]
pub enum TokenKind {
    // =========================================================================
    // TRIVIA
    // =========================================================================
    /// Whitespace (spaces, tabs, newlines)
    #[regex(r"[ \t\r\n\f]+")]
    Whitespace,

    /// Single-line comment: // ...
    #[regex(r"//[^\r\n]*", allow_greedy = true)]
    LineComment,

    /// Block comment: /* ... */ (not nested).
    #[token("/*", lex_block_comment)]
    BlockComment,

    // =========================================================================
    // PUNCTUATION
    // =========================================================================
    /// `{`
    #[token("{")]
    LBrace,

    /// `}`
    #[token("}")]
    RBrace,

    /// `[`
    #[token("[")]
    LBracket,

    /// `]`
    #[token("]")]
    RBracket,

    /// `:`
    #[token(":")]
    Colon,

    /// `,`
    #[token(",")]
    Comma,

    // =========================================================================
    // LITERALS
    // =========================================================================
    /// Double-quoted string with JSON escapes.
    #[token("\"", lex_string)]
    String,

    /// JSON number.
    #[regex(r"-?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?")]
    Number,

    /// `true`
    #[token("true")]
    True,

    /// `false`
    #[token("false")]
    False,

    /// `null`
    #[token("null")]
    Null,

    /// Bare word that is not a JSON keyword.
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Ident,

    // =========================================================================
    // SPECIAL
    // =========================================================================
    /// Unrecognized input, including unterminated strings and comments.
    Error,
}

impl TokenKind {
    /// Returns `true` if this token carries no meaning for the parser.
    #[must_use]
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            Self::Whitespace | Self::LineComment | Self::BlockComment
        )
    }
}
