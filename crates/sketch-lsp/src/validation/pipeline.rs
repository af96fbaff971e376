//! One validation pass per `(uri, version)`.

use tower_lsp::lsp_types::{Diagnostic, Url};
use tracing::debug;

use super::{semantic, Anchor, Subject};
use crate::document::ConfigDocument;
use crate::external::EnvironmentNotice;
use crate::state::ServerState;

/// Where validation results go.
#[tower_lsp::async_trait]
pub trait Publisher: Send + Sync {
    /// Replaces the full diagnostic set of `uri`.
    async fn publish(&self, uri: Url, diagnostics: Vec<Diagnostic>, version: i32);

    async fn notify(&self, notice: EnvironmentNotice);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassPhase {
    Received,
    SchemaChecking,
    SchemaFailed,
    SemanticChecking,
    Published,
    /// Superseded by a newer version or the document was closed.
    Dropped,
}

struct Pass<'a> {
    uri: &'a Url,
    version: i32,
    phase: PassPhase,
}

impl Pass<'_> {
    fn enter(&mut self, phase: PassPhase) {
        debug!(
            "{} v{}: {:?} -> {:?}",
            self.uri, self.version, self.phase, phase
        );
        self.phase = phase;
    }
}

/// Runs a pass for `version` of `uri` and returns the phase it ended in.
pub async fn run(
    state: &ServerState,
    publisher: &dyn Publisher,
    uri: &Url,
    version: i32,
) -> PassPhase {
    let mut pass = Pass {
        uri,
        version,
        phase: PassPhase::Received,
    };

    let Some(snapshot) = state
        .get_document(uri)
        .filter(|document| document.version == version)
    else {
        pass.enter(PassPhase::Dropped);
        return pass.phase;
    };
    let Some(session) = state.session_for_uri(uri) else {
        pass.enter(PassPhase::Dropped);
        return pass.phase;
    };

    let document = ConfigDocument::new(&snapshot.content);
    let source = uri.to_string();
    let subject = Subject::new(&document, &source, Anchor::Property);

    pass.enter(PassPhase::SchemaChecking);
    let schema_diagnostics = state.schema().validate(&subject);

    let (diagnostics, notices) = if schema_diagnostics.is_empty() {
        pass.enter(PassPhase::SemanticChecking);
        let outcome = semantic::validate(&subject, &session.catalogue, &session.settings).await;
        (outcome.diagnostics, outcome.notices)
    } else {
        pass.enter(PassPhase::SchemaFailed);
        (schema_diagnostics, Vec::new())
    };

    if !state.is_current(uri, version) {
        pass.enter(PassPhase::Dropped);
        return pass.phase;
    }

    publisher.publish(uri.clone(), diagnostics, version).await;
    pass.enter(PassPhase::Published);

    for notice in notices {
        if state.is_notice_dismissed(&notice.version) {
            debug!("notice for {} dismissed", notice.version);
            continue;
        }
        publisher.notify(notice).await;
    }
    pass.phase
}
