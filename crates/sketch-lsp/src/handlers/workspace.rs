//! Settings reloads and environment notices.

use std::collections::HashMap;
use std::sync::Arc;
use tower_lsp::lsp_types::{
    DidChangeConfigurationParams, MessageActionItem, MessageType, ShowDocumentParams, Url,
};
use tower_lsp::Client;
use tracing::{info, warn};

use crate::document::ConfigDocument;
use crate::external::EnvironmentNotice;
use crate::state::ServerState;

use super::diagnostics::{is_project_document, spawn_validation};

const OPEN_RELEASE_PAGE: &str = "Open release page";
const DONT_ASK_AGAIN: &str = "Don't ask again";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoticeChoice {
    OpenReleasePage,
    DontAskAgain,
    Ignore,
}

fn notice_choice(item: Option<&MessageActionItem>) -> NoticeChoice {
    match item.map(|item| item.title.as_str()) {
        Some(OPEN_RELEASE_PAGE) => NoticeChoice::OpenReleasePage,
        Some(DONT_ASK_AGAIN) => NoticeChoice::DontAskAgain,
        _ => NoticeChoice::Ignore,
    }
}

fn action(title: &str) -> MessageActionItem {
    MessageActionItem {
        title: title.to_string(),
        properties: HashMap::new(),
    }
}

/// Asks the user about `notice` unless its version was dismissed.
pub(crate) async fn show_environment_notice(
    client: &Client,
    state: &ServerState,
    notice: EnvironmentNotice,
    release_page: Option<String>,
) {
    if state.is_notice_dismissed(&notice.version) {
        return;
    }
    let actions = vec![action(OPEN_RELEASE_PAGE), action(DONT_ASK_AGAIN)];
    let response = match client
        .show_message_request(notice.typ, notice.message.clone(), Some(actions))
        .await
    {
        Ok(response) => response,
        Err(err) => {
            warn!("Environment notice failed: {err}");
            return;
        }
    };

    match notice_choice(response.as_ref()) {
        NoticeChoice::OpenReleasePage => {
            let Some(uri) = release_page.and_then(|page| Url::parse(&page).ok()) else {
                warn!("No release page for toolchain {}", notice.version);
                return;
            };
            let params = ShowDocumentParams {
                uri,
                external: Some(true),
                take_focus: Some(true),
                selection: None,
            };
            if let Err(err) = client.show_document(params).await {
                warn!("Failed to open release page: {err}");
            }
        }
        NoticeChoice::DontAskAgain => state.dismiss_notice(&notice.version),
        NoticeChoice::Ignore => {}
    }
}

/// Reloads workspace settings and revalidates open project documents.
pub async fn did_change_configuration(
    client: &Client,
    state: &Arc<ServerState>,
    _params: DidChangeConfigurationParams,
) {
    state.reload_settings();
    for doc in state.documents() {
        if is_project_document(state, &doc.uri) {
            spawn_validation(client, state, doc.uri, doc.version);
        }
    }
}

/// Checks the installed toolchain against the project's `cliVersion`, or
/// the latest stable release when there is no project document.
pub async fn startup_check(client: &Client, state: &Arc<ServerState>) {
    let Some(session) = state.primary_session() else {
        return;
    };

    let pinned = session
        .settings
        .project_files()
        .find_map(|path| std::fs::read_to_string(path).ok())
        .and_then(|text| {
            ConfigDocument::new(&text)
                .toolchain_version
                .and_then(|symbol| symbol.value)
        })
        .filter(|version| !version.is_empty());
    let version = match pinned {
        Some(version) => version,
        None => match session.catalogue.latest_release().await {
            Ok(Some(release)) => release.name,
            Ok(None) => return,
            Err(err) => {
                warn!("Startup check skipped: {err}");
                return;
            }
        },
    };

    match session.catalogue.check_environment(&version).await {
        Ok(Some(notice)) => {
            let page = session.settings.release_page(&notice.version);
            show_environment_notice(client, state, notice, Some(page)).await;
        }
        Ok(None) => {
            info!("Toolchain {version} is installed");
            client
                .log_message(MessageType::INFO, format!("Toolchain {version} is installed"))
                .await;
        }
        Err(err) => warn!("Startup check failed: {err}"),
    }
}
