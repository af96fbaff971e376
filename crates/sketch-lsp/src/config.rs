//! Workspace settings for sketch-lsp.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tower_lsp::lsp_types::Url;
use tracing::warn;

pub(crate) const CONFIG_FILES: &[&str] = &["sketch-lsp.toml", ".sketch-lsp.toml"];

pub(crate) const DEFAULT_PROJECT_FILE: &str = "sketch-project.json";
const DEFAULT_CACHE_DIR: &str = ".sketch-lsp/cache";
const DEFAULT_CACHE_TTL_DAYS: u64 = 1;
const DEFAULT_CLI: &str = "arduino-cli";
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_FEED_URL: &str = "https://api.github.com/repos/arduino/arduino-cli/releases";
const DEFAULT_PAGE_URL: &str = "https://github.com/arduino/arduino-cli/releases/tag";
const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Settings loaded from `sketch-lsp.toml`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    /// Root directory for the workspace.
    pub root: PathBuf,
    /// Config file path (if found).
    pub config_path: Option<PathBuf>,
    pub project: ProjectSettings,
    pub cache: CacheSettings,
    pub toolchain: ToolchainSettings,
    pub releases: ReleaseSettings,
    pub ports: PortSettings,
    pub diagnostics: DiagnosticSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSettings {
    /// File names of the project documents the server validates.
    pub config_files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub enabled: bool,
    pub dir: PathBuf,
    pub ttl: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolchainSettings {
    pub cli_path: PathBuf,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseSettings {
    pub feed_url: String,
    /// Offline feed; takes precedence over `feed_url`.
    pub feed_file: Option<PathBuf>,
    pub page_url: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PortSettings {
    /// Accepted port prefixes. Empty accepts any non-empty port.
    pub prefixes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticSettings {
    /// Report missing or mismatched board names (I002/I003).
    pub board_name: bool,
    /// Report platforms with a newer release available (I001).
    pub platform_updates: bool,
}

impl ServerSettings {
    pub fn load(root: &Path) -> Self {
        let config_path = find_config_file(root);
        let Some(path) = config_path.clone() else {
            return ServerSettings::base(root, None);
        };
        let Ok(contents) = std::fs::read_to_string(&path) else {
            warn!("Failed to read sketch-lsp config at {}", path.display());
            return ServerSettings::base(root, config_path);
        };
        ServerSettings::from_contents(root, config_path, &contents)
    }

    pub fn from_contents(root: &Path, config_path: Option<PathBuf>, contents: &str) -> Self {
        let mut settings = ServerSettings::base(root, config_path);
        let parsed: ConfigFile = match toml::from_str(contents) {
            Ok(parsed) => parsed,
            Err(err) => {
                if let Some(path) = &settings.config_path {
                    warn!(
                        "Failed to parse sketch-lsp config at {}: {err}",
                        path.display()
                    );
                } else {
                    warn!("Failed to parse sketch-lsp config: {err}");
                }
                return settings;
            }
        };

        if let Some(config_files) = parsed.project.config_files {
            if config_files.is_empty() {
                warn!("Ignoring empty project.config_files");
            } else {
                settings.project.config_files = config_files;
            }
        }

        let cache = parsed.cache;
        settings.cache.enabled = cache.enabled.unwrap_or(settings.cache.enabled);
        if let Some(dir) = cache.dir {
            settings.cache.dir = resolve_path(root, &dir);
        }
        if let Some(days) = cache.ttl_days {
            settings.cache.ttl = Duration::from_secs(days.saturating_mul(SECS_PER_DAY));
        }

        let toolchain = parsed.toolchain;
        if let Some(cli_path) = toolchain.cli_path {
            settings.toolchain.cli_path = resolve_program(root, &cli_path);
        }
        if let Some(secs) = toolchain.timeout_secs {
            settings.toolchain.timeout = Duration::from_secs(secs.max(1));
        }

        let releases = parsed.releases;
        if let Some(feed_url) = releases.feed_url {
            settings.releases.feed_url = feed_url;
        }
        settings.releases.feed_file = releases
            .feed_file
            .map(|file| resolve_path(root, &file));
        if let Some(page_url) = releases.page_url {
            settings.releases.page_url = page_url.trim_end_matches('/').to_string();
        }

        settings.ports.prefixes = parsed.ports.prefixes;

        let diagnostics = parsed.diagnostics;
        settings.diagnostics.board_name = diagnostics
            .board_name
            .unwrap_or(settings.diagnostics.board_name);
        settings.diagnostics.platform_updates = diagnostics
            .platform_updates
            .unwrap_or(settings.diagnostics.platform_updates);

        settings
    }

    fn base(root: &Path, config_path: Option<PathBuf>) -> Self {
        Self {
            root: root.to_path_buf(),
            config_path,
            project: ProjectSettings {
                config_files: vec![DEFAULT_PROJECT_FILE.to_string()],
            },
            cache: CacheSettings {
                enabled: true,
                dir: root.join(DEFAULT_CACHE_DIR),
                ttl: Duration::from_secs(DEFAULT_CACHE_TTL_DAYS * SECS_PER_DAY),
            },
            toolchain: ToolchainSettings {
                cli_path: PathBuf::from(DEFAULT_CLI),
                timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            },
            releases: ReleaseSettings {
                feed_url: DEFAULT_FEED_URL.to_string(),
                feed_file: None,
                page_url: DEFAULT_PAGE_URL.to_string(),
            },
            ports: PortSettings::default(),
            diagnostics: DiagnosticSettings {
                board_name: true,
                platform_updates: true,
            },
        }
    }

    /// Returns true when `uri` names one of the configured project documents.
    pub fn is_project_document(&self, uri: &Url) -> bool {
        let Some(name) = uri
            .path_segments()
            .and_then(|mut segments| segments.next_back())
        else {
            return false;
        };
        self.project
            .config_files
            .iter()
            .any(|file| Path::new(file).file_name().and_then(|n| n.to_str()) == Some(name))
    }

    /// Candidate project document paths under the workspace root.
    pub fn project_files(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.project
            .config_files
            .iter()
            .map(|file| resolve_path(&self.root, file))
    }

    /// Release page for a toolchain version.
    pub fn release_page(&self, version: &str) -> String {
        format!("{}/{version}", self.releases.page_url)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    project: ProjectSection,
    #[serde(default)]
    cache: CacheSection,
    #[serde(default)]
    toolchain: ToolchainSection,
    #[serde(default)]
    releases: ReleasesSection,
    #[serde(default)]
    ports: PortsSection,
    #[serde(default)]
    diagnostics: DiagnosticSection,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectSection {
    config_files: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct CacheSection {
    enabled: Option<bool>,
    dir: Option<String>,
    ttl_days: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolchainSection {
    cli_path: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ReleasesSection {
    feed_url: Option<String>,
    feed_file: Option<String>,
    page_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PortsSection {
    #[serde(default)]
    prefixes: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DiagnosticSection {
    board_name: Option<bool>,
    platform_updates: Option<bool>,
}

pub(crate) fn find_config_file(root: &Path) -> Option<PathBuf> {
    CONFIG_FILES
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
}

fn resolve_path(root: &Path, entry: &str) -> PathBuf {
    let path = PathBuf::from(entry);
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

/// Bare program names are looked up on `PATH`; anything with a separator is
/// resolved against the workspace root.
fn resolve_program(root: &Path, entry: &str) -> PathBuf {
    let path = PathBuf::from(entry);
    if path.components().count() > 1 {
        resolve_path(root, entry)
    } else {
        path
    }
}
