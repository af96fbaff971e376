//! Diagnostic codes and the diagnostic factory.
//!
//! Every code has exactly one row in [`CODE_TABLE`]: severity comes from the
//! code prefix, the row supplies message, tags, help link and fix builder.

mod data;

pub use data::{
    DiagnosticData, Payload, PropertyFix, SchemaFix, SchemaViolation, ToolFailure, ToolchainFix,
};

use tower_lsp::lsp_types::{
    CodeDescription, Diagnostic, DiagnosticSeverity, DiagnosticTag, NumberOrString, Position,
    Range, Url,
};

use crate::code_actions::{self, FixBuilder};

/// Source name reported on every diagnostic.
pub const DIAGNOSTIC_SOURCE: &str = "sketch-lsp";

const UNKNOWN_MESSAGE: &str = "Unknown error.";
const RELEASES_HELP: &str = "https://github.com/arduino/arduino-cli/releases";

/// Sentinel range for diagnostics about the whole document or project.
pub const NO_RANGE: Range = Range {
    start: Position {
        line: 0,
        character: 0,
    },
    end: Position {
        line: 0,
        character: 0,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticCode {
    InvalidCliVersion,
    InvalidBoard,
    InvalidPlatform,
    PlatformNotInstalled,
    PortRequired,
    InvalidContent,
    FileNotFound,
    ToolchainNotInstalled,
    PlatformNotLatest,
    BoardNameMismatch,
    BoardNameMissing,
    InvalidProject,
    ToolchainUnavailable,
}

/// One row of the code table.
pub struct CodeRow {
    pub code: DiagnosticCode,
    pub id: &'static str,
    pub message: &'static str,
    pub tags: &'static [DiagnosticTag],
    pub help: Option<&'static str>,
    pub fix: Option<FixBuilder>,
}

pub static CODE_TABLE: &[CodeRow] = &[
    CodeRow {
        code: DiagnosticCode::InvalidCliVersion,
        id: "E001",
        message: "Invalid CLI version.",
        tags: &[DiagnosticTag::DEPRECATED],
        help: Some(RELEASES_HELP),
        fix: Some(code_actions::replace_with_value),
    },
    CodeRow {
        code: DiagnosticCode::InvalidBoard,
        id: "E002",
        message: "Invalid board (FQBN).",
        tags: &[],
        help: None,
        fix: None,
    },
    CodeRow {
        code: DiagnosticCode::InvalidPlatform,
        id: "E003",
        message: "Invalid platform version.",
        tags: &[],
        help: None,
        fix: None,
    },
    CodeRow {
        code: DiagnosticCode::PlatformNotInstalled,
        id: "E031",
        message: "Platform not installed.",
        tags: &[],
        help: None,
        fix: None,
    },
    CodeRow {
        code: DiagnosticCode::PortRequired,
        id: "E004",
        message: "Port required.",
        tags: &[],
        help: None,
        fix: Some(code_actions::select_port),
    },
    CodeRow {
        code: DiagnosticCode::InvalidContent,
        id: "E005",
        message: "Invalid content.",
        tags: &[],
        help: None,
        fix: Some(code_actions::repair_content),
    },
    CodeRow {
        code: DiagnosticCode::FileNotFound,
        id: "E006",
        message: "File not found.",
        tags: &[],
        help: None,
        fix: None,
    },
    CodeRow {
        code: DiagnosticCode::ToolchainNotInstalled,
        id: "E007",
        message: "Toolchain not installed.",
        tags: &[],
        help: None,
        fix: Some(code_actions::install_toolchain),
    },
    CodeRow {
        code: DiagnosticCode::PlatformNotLatest,
        id: "I001",
        message: "Version in use is not the latest available.",
        tags: &[],
        help: None,
        fix: None,
    },
    CodeRow {
        code: DiagnosticCode::BoardNameMismatch,
        id: "I002",
        message: "Board name does not match the board (FQBN) name.",
        tags: &[],
        help: None,
        fix: Some(code_actions::replace_with_value),
    },
    CodeRow {
        code: DiagnosticCode::BoardNameMissing,
        id: "I003",
        message: "Board name is not informed.",
        tags: &[],
        help: None,
        fix: Some(code_actions::insert_board_name),
    },
    CodeRow {
        code: DiagnosticCode::InvalidProject,
        id: "I004",
        message: "Invalid project.",
        tags: &[],
        help: None,
        fix: None,
    },
    CodeRow {
        code: DiagnosticCode::ToolchainUnavailable,
        id: "I099",
        message: "Unable to verify with the toolchain.",
        tags: &[],
        help: None,
        fix: None,
    },
];

impl DiagnosticCode {
    #[cfg(test)]
    pub const ALL: [DiagnosticCode; 13] = [
        DiagnosticCode::InvalidCliVersion,
        DiagnosticCode::InvalidBoard,
        DiagnosticCode::InvalidPlatform,
        DiagnosticCode::PlatformNotInstalled,
        DiagnosticCode::PortRequired,
        DiagnosticCode::InvalidContent,
        DiagnosticCode::FileNotFound,
        DiagnosticCode::ToolchainNotInstalled,
        DiagnosticCode::PlatformNotLatest,
        DiagnosticCode::BoardNameMismatch,
        DiagnosticCode::BoardNameMissing,
        DiagnosticCode::InvalidProject,
        DiagnosticCode::ToolchainUnavailable,
    ];

    /// Looks a wire code (`"E001"`) up in the table.
    pub fn parse(id: &str) -> Option<Self> {
        CODE_TABLE.iter().find(|row| row.id == id).map(|row| row.code)
    }

    /// Reads the code off a diagnostic, `None` for foreign codes.
    pub fn of(diagnostic: &Diagnostic) -> Option<Self> {
        match diagnostic.code.as_ref()? {
            NumberOrString::String(id) => Self::parse(id),
            NumberOrString::Number(_) => None,
        }
    }

    pub fn row(self) -> &'static CodeRow {
        // ALL and CODE_TABLE share an order.
        &CODE_TABLE[self as usize]
    }

    pub fn id(self) -> &'static str {
        self.row().id
    }

    pub fn severity(self) -> DiagnosticSeverity {
        severity_for(self.id()).unwrap_or(DiagnosticSeverity::ERROR)
    }
}

/// Severity from the first letter of a code.
pub fn severity_for(id: &str) -> Option<DiagnosticSeverity> {
    match id.chars().next()? {
        'E' => Some(DiagnosticSeverity::ERROR),
        'W' => Some(DiagnosticSeverity::WARNING),
        'I' => Some(DiagnosticSeverity::INFORMATION),
        'H' => Some(DiagnosticSeverity::HINT),
        _ => None,
    }
}

/// Message for a wire code; unmapped codes get the generic message.
pub fn message_for(id: &str) -> &'static str {
    DiagnosticCode::parse(id).map_or(UNKNOWN_MESSAGE, |code| code.row().message)
}

/// Builds a diagnostic for `code`. `detail` is appended to the row message.
pub fn build(
    code: DiagnosticCode,
    range: Range,
    detail: Option<&str>,
    data: DiagnosticData,
) -> Diagnostic {
    let row = code.row();
    let message = match detail {
        Some(detail) if !detail.is_empty() => format!("{} {detail}", row.message),
        _ => row.message.to_string(),
    };
    Diagnostic {
        range,
        severity: Some(code.severity()),
        code: Some(NumberOrString::String(row.id.to_string())),
        code_description: row
            .help
            .and_then(|href| Url::parse(href).ok())
            .map(|href| CodeDescription { href }),
        source: Some(DIAGNOSTIC_SOURCE.to_string()),
        message,
        related_information: None,
        tags: (!row.tags.is_empty()).then(|| row.tags.to_vec()),
        data: data.to_value(),
    }
}
