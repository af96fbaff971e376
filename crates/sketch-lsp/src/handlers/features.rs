//! Code actions and completion.

use tower_lsp::lsp_types::*;
use tracing::warn;

use crate::code_actions::code_actions;
use crate::completion::{board_items, completion_site, release_items, CompletionTarget};
use crate::diagnostics::DIAGNOSTIC_SOURCE;
use crate::document::ConfigDocument;
use crate::state::ServerState;

pub fn code_action(state: &ServerState, params: CodeActionParams) -> Option<CodeActionResponse> {
    let uri = &params.text_document.uri;
    let doc = state.get_document(uri)?;
    let target_range = params.range;
    let diagnostics: Vec<Diagnostic> = params
        .context
        .diagnostics
        .into_iter()
        .filter(|diag| diag.source.as_deref() == Some(DIAGNOSTIC_SOURCE))
        .filter(|diag| ranges_intersect(diag.range, target_range))
        .collect();

    let actions = code_actions(uri, &doc.content, &diagnostics);
    (!actions.is_empty()).then_some(actions)
}

pub async fn completion(state: &ServerState, params: CompletionParams) -> Option<CompletionResponse> {
    let uri = &params.text_document_position.text_document.uri;
    let position = params.text_document_position.position;
    let doc = state.get_document(uri)?;
    let session = state.session_for_uri(uri)?;
    if !session.settings.is_project_document(uri) {
        return None;
    }

    let document = ConfigDocument::new(&doc.content);
    let site = completion_site(&document, position)?;
    let items = match site.target {
        CompletionTarget::ToolchainVersion => match session.catalogue.releases().await {
            Ok(releases) => release_items(&releases, site.range),
            Err(err) => {
                warn!("Release completion unavailable: {err}");
                return None;
            }
        },
        CompletionTarget::Board => match session.catalogue.platforms().await {
            Ok(platforms) => board_items(&platforms, site.range),
            Err(err) => {
                warn!("Board completion unavailable: {err}");
                return None;
            }
        },
    };
    Some(CompletionResponse::Array(items))
}

fn position_leq(a: Position, b: Position) -> bool {
    (a.line, a.character) <= (b.line, b.character)
}

fn ranges_intersect(a: Range, b: Range) -> bool {
    position_leq(a.start, b.end) && position_leq(b.start, a.end)
}
