//! Quick fixes for sketch-lsp diagnostics.
//!
//! Builders are pure in the document text and the diagnostic's data. The code
//! table in [`crate::diagnostics`] decides which builder serves which code.

use serde_json::{json, Value as Json};
use sketch_syntax::{parse, LineIndex, TextSize, ValueKind};
use std::collections::HashMap;
use tower_lsp::lsp_types::{
    CodeAction, CodeActionKind, CodeActionOrCommand, Command, Diagnostic, NumberOrString, Range,
    TextEdit, Url, WorkspaceEdit,
};
use tracing::debug;

use crate::diagnostics::{self, DiagnosticCode, DiagnosticData};
use crate::document::{to_position, BOARD_NAME};
use crate::validation::pointer_segments;

pub const SELECT_PORT_COMMAND: &str = "sketch.selectPort";
pub const INSTALL_CLI_COMMAND: &str = "sketch.installCli";

/// Builds the fix for one diagnostic, `None` when the data does not allow one.
pub type FixBuilder =
    fn(&FixContext<'_>, &Diagnostic, &DiagnosticData) -> Option<CodeActionOrCommand>;

/// The document a fix applies to.
pub struct FixContext<'a> {
    pub uri: &'a Url,
    pub text: &'a str,
    pub line_index: LineIndex,
}

impl<'a> FixContext<'a> {
    pub fn new(uri: &'a Url, text: &'a str) -> Self {
        Self {
            uri,
            text,
            line_index: LineIndex::new(text),
        }
    }
}

/// Collects quick fixes for `diagnostics`. Unknown codes are skipped.
pub fn code_actions(uri: &Url, text: &str, diagnostics: &[Diagnostic]) -> Vec<CodeActionOrCommand> {
    let context = FixContext::new(uri, text);
    let mut actions = Vec::new();
    for diagnostic in diagnostics {
        let Some(code) = DiagnosticCode::of(diagnostic) else {
            let id = match &diagnostic.code {
                Some(NumberOrString::String(id)) => id.clone(),
                Some(NumberOrString::Number(id)) => id.to_string(),
                None => String::new(),
            };
            debug!("no quick fix for `{id}`: {}", diagnostics::message_for(&id));
            continue;
        };
        let Some(fix) = code.row().fix else {
            continue;
        };
        let Some(data) = DiagnosticData::from_value(diagnostic.data.as_ref()) else {
            debug!("{} diagnostic without repair data", code.id());
            continue;
        };
        actions.extend(fix(&context, diagnostic, &data));
    }
    actions
}

/// Replaces the diagnostic range with the quoted `data.value`.
pub fn replace_with_value(
    context: &FixContext<'_>,
    diagnostic: &Diagnostic,
    data: &DiagnosticData,
) -> Option<CodeActionOrCommand> {
    let fix = data.property()?;
    if fix.value.is_empty() {
        return None;
    }
    let edit = TextEdit::new(diagnostic.range, json_text(&json!(fix.value)));
    Some(quickfix(
        format!("Change {} to \"{}\"", fix.name, fix.value),
        diagnostic,
        context.uri,
        edit,
    ))
}

/// Inserts a `boardName` member after the matched property's value.
pub fn insert_board_name(
    context: &FixContext<'_>,
    diagnostic: &Diagnostic,
    data: &DiagnosticData,
) -> Option<CodeActionOrCommand> {
    let fix = data.property()?;
    let indent = context.line_index.indentation(diagnostic.range.start.line);
    let new_text = format!(
        ",\n{indent}{}: {}",
        json_text(&json!(BOARD_NAME)),
        json_text(&json!(fix.value))
    );
    let at = diagnostic.range.end;
    Some(quickfix(
        format!("Add {BOARD_NAME} \"{}\"", fix.value),
        diagnostic,
        context.uri,
        TextEdit::new(Range::new(at, at), new_text),
    ))
}

pub fn select_port(
    context: &FixContext<'_>,
    diagnostic: &Diagnostic,
    _data: &DiagnosticData,
) -> Option<CodeActionOrCommand> {
    Some(command_action(
        "Select a port",
        diagnostic,
        SELECT_PORT_COMMAND,
        vec![json!(context.uri)],
    ))
}

pub fn install_toolchain(
    _context: &FixContext<'_>,
    diagnostic: &Diagnostic,
    data: &DiagnosticData,
) -> Option<CodeActionOrCommand> {
    let version = &data.toolchain()?.version;
    Some(command_action(
        &format!("Install toolchain {version}"),
        diagnostic,
        INSTALL_CLI_COMMAND,
        vec![json!(version)],
    ))
}

/// Missing properties are inserted with the schema suggestion; any other
/// violation has its value replaced by the suggestion.
pub fn repair_content(
    context: &FixContext<'_>,
    diagnostic: &Diagnostic,
    data: &DiagnosticData,
) -> Option<CodeActionOrCommand> {
    let violation = data.schema()?;
    if violation.keyword == "required" {
        let property = violation.property.as_deref()?;
        let value = violation.suggestion.clone().unwrap_or_else(|| json!(""));
        let edit = insert_property(context, &violation.path, property, &value)?;
        return Some(quickfix(
            format!("Add missing property \"{property}\""),
            diagnostic,
            context.uri,
            edit,
        ));
    }

    let suggestion = violation.suggestion.as_ref()?;
    let new_text = json_text(suggestion);
    Some(quickfix(
        format!("Replace with {new_text}"),
        diagnostic,
        context.uri,
        TextEdit::new(diagnostic.range, new_text),
    ))
}

fn insert_property(
    context: &FixContext<'_>,
    pointer: &str,
    property: &str,
    value: &Json,
) -> Option<TextEdit> {
    let parse = parse(context.text);
    let segments = pointer_segments(pointer);
    let object = parse
        .root()?
        .lookup(segments.iter().map(String::as_str))?;
    let ValueKind::Object(members) = &object.kind else {
        return None;
    };
    let member = format!("{}: {}", json_text(&json!(property)), json_text(value));

    let (offset, new_text) = match members.first() {
        Some(first) => {
            let start = to_position(&context.line_index, first.range.start());
            let indent = context.line_index.indentation(start.line);
            let object_line = to_position(&context.line_index, object.range.start()).line;
            let separator = if start.line == object_line {
                " ".to_string()
            } else {
                format!("\n{indent}")
            };
            (first.range.start(), format!("{member},{separator}"))
        }
        None => (object.range.start() + TextSize::from(1), member),
    };
    let position = to_position(&context.line_index, offset);
    Some(TextEdit::new(Range::new(position, position), new_text))
}

fn json_text(value: &Json) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

fn quickfix(title: String, diagnostic: &Diagnostic, uri: &Url, edit: TextEdit) -> CodeActionOrCommand {
    let mut changes = HashMap::new();
    changes.insert(uri.clone(), vec![edit]);
    CodeActionOrCommand::CodeAction(CodeAction {
        title,
        kind: Some(CodeActionKind::QUICKFIX),
        diagnostics: Some(vec![diagnostic.clone()]),
        edit: Some(WorkspaceEdit {
            changes: Some(changes),
            document_changes: None,
            change_annotations: None,
        }),
        is_preferred: Some(true),
        ..Default::default()
    })
}

fn command_action(
    title: &str,
    diagnostic: &Diagnostic,
    command: &str,
    arguments: Vec<Json>,
) -> CodeActionOrCommand {
    CodeActionOrCommand::CodeAction(CodeAction {
        title: title.to_string(),
        kind: Some(CodeActionKind::QUICKFIX),
        diagnostics: Some(vec![diagnostic.clone()]),
        command: Some(Command {
            title: title.to_string(),
            command: command.to_string(),
            arguments: Some(arguments),
        }),
        ..Default::default()
    })
}
