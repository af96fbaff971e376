//! Document synchronization handlers.

use sketch_syntax::LineIndex;
use std::sync::Arc;
use tower_lsp::lsp_types::*;
use tower_lsp::Client;
use tracing::{info, warn};

use crate::document::to_offset;
use crate::state::ServerState;

use super::diagnostics::{is_project_document, spawn_validation};

pub async fn did_open(client: &Client, state: &Arc<ServerState>, params: DidOpenTextDocumentParams) {
    let uri = params.text_document.uri;
    let version = params.text_document.version;

    info!("Document opened: {}", uri);
    state.open_document(uri.clone(), version, params.text_document.text);

    if is_project_document(state, &uri) {
        spawn_validation(client, state, uri, version);
    }
}

pub async fn did_change(
    client: &Client,
    state: &Arc<ServerState>,
    params: DidChangeTextDocumentParams,
) {
    let uri = params.text_document.uri;
    let version = params.text_document.version;

    if params.content_changes.is_empty() {
        return;
    }

    let Some(doc) = state.get_document(&uri) else {
        warn!("Received change for unknown document: {}", uri);
        return;
    };

    let Some(updated) = apply_content_changes(&doc.content, &params.content_changes) else {
        warn!("Failed to apply changes for {}", uri);
        return;
    };

    state.update_document(&uri, version, updated);

    if is_project_document(state, &uri) {
        spawn_validation(client, state, uri, version);
    }
}

pub async fn did_close(client: &Client, state: &Arc<ServerState>, params: DidCloseTextDocumentParams) {
    let uri = params.text_document.uri;
    info!("Document closed: {}", uri);

    state.close_document(&uri);
    client.publish_diagnostics(uri, vec![], None).await;
}

fn apply_content_changes(
    content: &str,
    changes: &[TextDocumentContentChangeEvent],
) -> Option<String> {
    let mut updated = content.to_string();
    for change in changes {
        let Some(range) = change.range else {
            updated = change.text.clone();
            continue;
        };
        let index = LineIndex::new(&updated);
        let start = usize::from(to_offset(&index, range.start)?);
        let end = usize::from(to_offset(&index, range.end)?);
        if start > end {
            return None;
        }
        updated.replace_range(start..end, &change.text);
    }
    Some(updated)
}
