//! Workspace command handlers.

use serde_json::{json, Value};
use std::path::PathBuf;
use tower_lsp::lsp_types::{ExecuteCommandParams, Url};
use tracing::{info, warn};

use crate::state::ServerState;
use crate::validation::check_project;

pub const CHECK_PROJECT_COMMAND: &str = "sketch.checkProject";
pub const CLEAR_CACHE_COMMAND: &str = "sketch.clearCache";

pub async fn execute_command(state: &ServerState, params: ExecuteCommandParams) -> Option<Value> {
    match params.command.as_str() {
        CHECK_PROJECT_COMMAND => {
            let root = project_root(state, params.arguments)?;
            info!("Checking project at {}", root.display());
            let session = state.session_for_root(&root);
            let report =
                check_project(&root, &session.settings, state.schema(), &session.catalogue).await;
            serde_json::to_value(report).ok()
        }
        CLEAR_CACHE_COMMAND => {
            let cleared = state.clear_caches();
            info!("Cleared {cleared} cache(s)");
            Some(json!(true))
        }
        other => {
            warn!("Unknown command: {other}");
            None
        }
    }
}

/// The workspace to check: a path or `file:` URI argument, else the first
/// workspace folder.
fn project_root(state: &ServerState, args: Vec<Value>) -> Option<PathBuf> {
    let Some(arg) = args.into_iter().next() else {
        return state.workspace_roots().into_iter().next();
    };
    let text = arg.as_str()?;
    match Url::parse(text) {
        Ok(uri) if uri.scheme() == "file" => uri.to_file_path().ok(),
        _ => Some(PathBuf::from(text)),
    }
}
