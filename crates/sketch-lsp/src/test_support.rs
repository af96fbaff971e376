//! Test helpers shared across sketch-lsp unit tests.

use parking_lot::Mutex;
use serde_json::json;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tower_lsp::lsp_types::{Diagnostic, Url};
use tower_lsp::{Client, LanguageServer, LspService};

use crate::config::ServerSettings;
use crate::external::{
    Board, Catalogue, Collaborators, EnvironmentNotice, Platform, Release, ReleaseFeed, ToolError,
    Toolchain,
};
use crate::state::ServerState;
use crate::validation::{Publisher, SchemaValidator};

pub(crate) fn test_client() -> Client {
    struct DummyServer;

    #[tower_lsp::async_trait]
    impl LanguageServer for DummyServer {
        async fn initialize(
            &self,
            _: tower_lsp::lsp_types::InitializeParams,
        ) -> tower_lsp::jsonrpc::Result<tower_lsp::lsp_types::InitializeResult> {
            Ok(tower_lsp::lsp_types::InitializeResult::default())
        }

        async fn shutdown(&self) -> tower_lsp::jsonrpc::Result<()> {
            Ok(())
        }
    }

    let captured = Arc::new(Mutex::new(None));
    let captured_clone = Arc::clone(&captured);
    let (_service, socket) = LspService::new(move |client| {
        *captured_clone.lock() = Some(client.clone());
        DummyServer
    });
    drop(socket);

    let client = captured.lock().take().expect("test client");
    client
}

/// Shared call counter that outlives the fake it was taken from.
#[derive(Debug, Clone, Default)]
pub(crate) struct Counter(Arc<AtomicUsize>);

impl Counter {
    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub(crate) struct FakeToolchain {
    installed: Option<String>,
    platforms: Result<Vec<Platform>, String>,
    version_calls: Counter,
    platform_calls: Counter,
}

impl FakeToolchain {
    pub(crate) fn new(installed: Option<&str>, platforms: Vec<Platform>) -> Self {
        Self {
            installed: installed.map(str::to_string),
            platforms: Ok(platforms),
            version_calls: Counter::default(),
            platform_calls: Counter::default(),
        }
    }

    /// Every call fails with `reason` on stderr.
    pub(crate) fn failing(reason: &str) -> Self {
        Self {
            installed: None,
            platforms: Err(reason.to_string()),
            version_calls: Counter::default(),
            platform_calls: Counter::default(),
        }
    }

    pub(crate) fn version_calls(&self) -> usize {
        self.version_calls.get()
    }

    pub(crate) fn platform_calls(&self) -> usize {
        self.platform_calls.get()
    }
}

fn exit_error(command: &str, reason: &str) -> ToolError {
    ToolError::Exit {
        command: format!("arduino-cli {command}"),
        status: "exit status: 1".to_string(),
        stderr: reason.to_string(),
    }
}

#[tower_lsp::async_trait]
impl Toolchain for FakeToolchain {
    async fn current_version(&self) -> Result<Option<String>, ToolError> {
        self.version_calls.bump();
        match &self.platforms {
            Ok(_) => Ok(self.installed.clone()),
            Err(reason) => Err(exit_error("version", reason)),
        }
    }

    async fn platforms(&self) -> Result<Vec<Platform>, ToolError> {
        self.platform_calls.bump();
        match &self.platforms {
            Ok(platforms) => Ok(platforms.clone()),
            Err(reason) => Err(exit_error("core list", reason)),
        }
    }
}

/// Lets a test hold a release fetch open while it edits the document.
#[derive(Debug, Default)]
pub(crate) struct Gate {
    pub(crate) entered: Notify,
    pub(crate) release: Notify,
}

pub(crate) struct FakeReleaseFeed {
    releases: Result<Vec<Release>, String>,
    calls: Counter,
    gate: Option<Arc<Gate>>,
}

impl FakeReleaseFeed {
    pub(crate) fn new(releases: Vec<Release>) -> Self {
        Self {
            releases: Ok(releases),
            calls: Counter::default(),
            gate: None,
        }
    }

    pub(crate) fn failing(reason: &str) -> Self {
        Self {
            releases: Err(reason.to_string()),
            calls: Counter::default(),
            gate: None,
        }
    }

    pub(crate) fn gated(releases: Vec<Release>) -> (Self, Arc<Gate>) {
        let gate = Arc::new(Gate::default());
        let feed = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::new(releases)
        };
        (feed, gate)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.get()
    }

    pub(crate) fn counter(&self) -> Counter {
        self.calls.clone()
    }
}

#[tower_lsp::async_trait]
impl ReleaseFeed for FakeReleaseFeed {
    async fn releases(&self) -> Result<Vec<Release>, ToolError> {
        self.calls.bump();
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        self.releases.clone().map_err(ToolError::Http)
    }
}

pub(crate) struct FakeCollaborators {
    toolchain: Arc<FakeToolchain>,
    feed: Arc<FakeReleaseFeed>,
}

impl Collaborators for FakeCollaborators {
    fn toolchain(&self, _settings: &ServerSettings) -> Arc<dyn Toolchain> {
        self.toolchain.clone()
    }

    fn release_feed(&self, _settings: &ServerSettings) -> Arc<dyn ReleaseFeed> {
        self.feed.clone()
    }
}

/// Records what a validation pass publishes.
#[derive(Default)]
pub(crate) struct RecordingPublisher {
    published: Mutex<Vec<(Url, Vec<Diagnostic>, i32)>>,
    notices: Mutex<Vec<EnvironmentNotice>>,
}

impl RecordingPublisher {
    pub(crate) fn published(&self) -> Vec<(Url, Vec<Diagnostic>, i32)> {
        self.published.lock().clone()
    }

    pub(crate) fn notices(&self) -> Vec<EnvironmentNotice> {
        self.notices.lock().clone()
    }
}

#[tower_lsp::async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, uri: Url, diagnostics: Vec<Diagnostic>, version: i32) {
        self.published.lock().push((uri, diagnostics, version));
    }

    async fn notify(&self, notice: EnvironmentNotice) {
        self.notices.lock().push(notice);
    }
}

pub(crate) fn test_state(toolchain: FakeToolchain, feed: FakeReleaseFeed) -> ServerState {
    let schema = SchemaValidator::new().expect("embedded schema compiles");
    let collaborators = FakeCollaborators {
        toolchain: Arc::new(toolchain),
        feed: Arc::new(feed),
    };
    ServerState::new(Arc::new(schema), Arc::new(collaborators))
}

/// Uncached catalogue over the given collaborators.
pub(crate) fn catalogue(toolchain: Arc<dyn Toolchain>, feed: Arc<dyn ReleaseFeed>) -> Catalogue {
    Catalogue::new(toolchain, feed, None, Duration::from_secs(3600))
}

pub(crate) fn test_settings() -> ServerSettings {
    ServerSettings::from_contents(Path::new("/ws"), None, "")
}

/// A schema-valid project document, one property per line.
pub(crate) fn project_text(
    cli_version: &str,
    board: &str,
    port: &str,
    board_name: Option<&str>,
) -> String {
    let mut text = format!(
        "{{\n  \"version\": \"0.0.1\",\n  \"cliVersion\": {},\n  \"port\": {},\n  \"board\": {}",
        json!(cli_version),
        json!(port),
        json!(board)
    );
    if let Some(name) = board_name {
        text.push_str(&format!(",\n  \"boardName\": {}", json!(name)));
    }
    text.push_str("\n}\n");
    text
}

fn platform(id: &str, installed: &str, latest: &str, name: &str, boards: &[(&str, &str)]) -> Platform {
    Platform {
        id: id.to_string(),
        installed: installed.to_string(),
        latest: latest.to_string(),
        name: name.to_string(),
        boards: boards
            .iter()
            .map(|(name, fqbn)| Board {
                name: (*name).to_string(),
                fqbn: (*fqbn).to_string(),
            })
            .collect(),
    }
}

/// An up-to-date AVR core, an outdated ESP32 core and an uninstalled RP2040.
pub(crate) fn sample_platforms() -> Vec<Platform> {
    vec![
        platform(
            "arduino:avr",
            "1.8.6",
            "1.8.6",
            "Arduino AVR Boards",
            &[
                ("Arduino Uno", "arduino:avr:uno"),
                ("Arduino Mega or Mega 2560", "arduino:avr:mega"),
            ],
        ),
        platform(
            "esp32:esp32",
            "2.0.14",
            "3.0.1",
            "esp32",
            &[("ESP32 Dev Module", "esp32:esp32:esp32")],
        ),
        platform(
            "rp2040:rp2040",
            "",
            "3.9.0",
            "Raspberry Pi RP2040 Boards",
            &[("Raspberry Pi Pico", "rp2040:rp2040:pico")],
        ),
    ]
}

/// Newest first, led by a pre-release.
pub(crate) fn sample_releases() -> Vec<Release> {
    [("1.0.0-rc1", true), ("0.35.3", false), ("0.35.2", false)]
        .into_iter()
        .map(|(name, prerelease)| Release {
            name: name.to_string(),
            tag_name: format!("v{name}"),
            prerelease,
        })
        .collect()
}
