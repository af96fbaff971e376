//! `sketch-lsp` - Language Server Protocol implementation for sketch project
//! configuration documents.
//!
//! This is the main entry point for the sketch language server.

mod cache;
mod code_actions;
mod completion;
mod config;
mod diagnostics;
mod document;
mod external;
mod handlers;
mod state;
#[cfg(test)]
mod test_support;
mod validation;

use anyhow::Context;
use clap::Parser;
use serde_json::Value;
use std::sync::Arc;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};
use tracing::{info, Level};

use crate::external::SystemCollaborators;
use crate::handlers::{CHECK_PROJECT_COMMAND, CLEAR_CACHE_COMMAND};
use crate::state::ServerState;
use crate::validation::SchemaValidator;

#[derive(Debug, Parser)]
#[command(
    name = "sketch-lsp",
    version,
    about = "Language server for sketch project configuration files"
)]
struct Args {
    /// Default log level; `RUST_LOG` directives take precedence.
    #[arg(long, value_name = "LEVEL", default_value_t = Level::INFO)]
    log_level: Level,

    /// Communicate over stdin/stdout (the only transport).
    #[arg(long)]
    stdio: bool,
}

/// The main language server struct.
pub struct SketchLanguageServer {
    /// LSP client for notifications and message requests.
    client: Client,
    /// Server state.
    state: Arc<ServerState>,
}

impl SketchLanguageServer {
    fn new(client: Client, state: Arc<ServerState>) -> Self {
        Self { client, state }
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for SketchLanguageServer {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        info!("Sketch Language Server initializing");

        let mut workspace_folders = Vec::new();
        if let Some(folders) = params.workspace_folders {
            workspace_folders.extend(folders.into_iter().map(|folder| folder.uri));
        } else if let Some(root_uri) = params.root_uri {
            workspace_folders.push(root_uri);
        }

        if !workspace_folders.is_empty() {
            info!("Workspace folders: {:?}", workspace_folders);
            self.state.set_workspace_folders(workspace_folders);
            for root in self.state.workspace_roots() {
                self.state.session_for_root(&root);
            }
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                // Project documents are small; full text on every change
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),

                // Completion for cliVersion and board values
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(vec!["\"".to_string()]),
                    ..Default::default()
                }),

                // Quick fixes for our diagnostics
                code_action_provider: Some(CodeActionProviderCapability::Options(
                    CodeActionOptions {
                        code_action_kinds: Some(vec![CodeActionKind::QUICKFIX]),
                        ..Default::default()
                    },
                )),

                execute_command_provider: Some(ExecuteCommandOptions {
                    commands: vec![
                        CHECK_PROJECT_COMMAND.to_string(),
                        CLEAR_CACHE_COMMAND.to_string(),
                    ],
                    ..Default::default()
                }),

                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "sketch-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _params: InitializedParams) {
        info!("Sketch Language Server initialized");
        self.client
            .log_message(MessageType::INFO, "Sketch Language Server initialized!")
            .await;

        let client = self.client.clone();
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            handlers::startup_check(&client, &state).await;
        });
    }

    async fn shutdown(&self) -> Result<()> {
        info!("Sketch Language Server shutting down");
        Ok(())
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        handlers::did_change_configuration(&self.client, &self.state, params).await;
    }

    // =========================================================================
    // Document Synchronization
    // =========================================================================

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        handlers::did_open(&self.client, &self.state, params).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        handlers::did_change(&self.client, &self.state, params).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        handlers::did_close(&self.client, &self.state, params).await;
    }

    // =========================================================================
    // Language Features
    // =========================================================================

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        Ok(handlers::completion(&self.state, params).await)
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        Ok(handlers::code_action(&self.state, params))
    }

    async fn execute_command(&self, params: ExecuteCommandParams) -> Result<Option<Value>> {
        Ok(handlers::execute_command(&self.state, params).await)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(args.log_level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(stdio = args.stdio, "Starting Sketch Language Server");

    let schema = SchemaValidator::new().context("embedded project schema does not compile")?;
    let state = Arc::new(ServerState::new(
        Arc::new(schema),
        Arc::new(SystemCollaborators),
    ));

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) =
        LspService::new(move |client| SketchLanguageServer::new(client, Arc::clone(&state)));
    Server::new(stdin, stdout, socket).serve(service).await;
    Ok(())
}
