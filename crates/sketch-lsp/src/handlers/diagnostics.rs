//! Diagnostics publishing.

use std::sync::Arc;
use tower_lsp::lsp_types::{Diagnostic, Url};
use tower_lsp::Client;
use tracing::debug;

use crate::external::EnvironmentNotice;
use crate::state::{ServerState, WorkspaceSession};
use crate::validation::{run_pass, Publisher};

use super::workspace::show_environment_notice;

/// Publishes to the editor. Notices are raised on their own task so a
/// pending message request never holds up the pass.
pub(crate) struct ClientPublisher {
    client: Client,
    state: Arc<ServerState>,
    session: Option<Arc<WorkspaceSession>>,
}

impl ClientPublisher {
    pub(crate) fn new(client: Client, state: Arc<ServerState>, uri: &Url) -> Self {
        let session = state.session_for_uri(uri);
        Self {
            client,
            state,
            session,
        }
    }
}

#[tower_lsp::async_trait]
impl Publisher for ClientPublisher {
    async fn publish(&self, uri: Url, diagnostics: Vec<Diagnostic>, version: i32) {
        self.client
            .publish_diagnostics(uri, diagnostics, Some(version))
            .await;
    }

    async fn notify(&self, notice: EnvironmentNotice) {
        let client = self.client.clone();
        let state = Arc::clone(&self.state);
        let page = self
            .session
            .as_ref()
            .map(|session| session.settings.release_page(&notice.version));
        tokio::spawn(async move {
            show_environment_notice(&client, &state, notice, page).await;
        });
    }
}

/// Validates `version` of `uri` in the background.
pub(crate) fn spawn_validation(client: &Client, state: &Arc<ServerState>, uri: Url, version: i32) {
    let publisher = ClientPublisher::new(client.clone(), Arc::clone(state), &uri);
    let state = Arc::clone(state);
    tokio::spawn(async move {
        let phase = run_pass(&state, &publisher, &uri, version).await;
        debug!("validation of {uri} v{version} ended {phase:?}");
    });
}

/// True when `uri` is a project document of its workspace.
pub(crate) fn is_project_document(state: &ServerState, uri: &Url) -> bool {
    state
        .session_for_uri(uri)
        .is_some_and(|session| session.settings.is_project_document(uri))
}
