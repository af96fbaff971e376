//! External collaborators: the toolchain CLI and the release feed.
//!
//! Validation only sees the [`Toolchain`] and [`ReleaseFeed`] traits. The
//! concrete adapters live in the submodules.

mod arduino_cli;
mod catalogue;
mod github;

pub use arduino_cli::ArduinoCli;
pub use catalogue::{latest_stable, Catalogue};
pub use github::GithubReleaseFeed;

use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use tower_lsp::lsp_types::MessageType;

use crate::config::ServerSettings;

/// A vendor package of board definitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub id: String,
    /// Installed version, empty when the platform is not installed.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub installed: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub latest: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default)]
    pub boards: Vec<Board>,
}

impl Platform {
    pub fn is_installed(&self) -> bool {
        !self.installed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub name: String,
    pub fqbn: String,
}

/// A toolchain release published on the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Release {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tag_name: String,
    #[serde(default)]
    pub prerelease: bool,
}

/// Something the user should be asked about, outside the diagnostic list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentNotice {
    pub version: String,
    pub message: String,
    pub typ: MessageType,
}

impl EnvironmentNotice {
    pub fn not_installed(version: &str) -> Self {
        Self {
            version: version.to_string(),
            message: format!("Toolchain version {version} is not installed."),
            typ: MessageType::WARNING,
        }
    }

    pub fn version_mismatch(version: &str, installed: &str) -> Self {
        Self {
            version: version.to_string(),
            message: format!(
                "Project requires toolchain version {version}, but {installed} is installed."
            ),
            typ: MessageType::WARNING,
        }
    }

    /// What to tell the user when the project wants `version` and `installed` is in use.
    pub fn compare(version: &str, installed: Option<&str>) -> Option<Self> {
        match installed {
            Some(installed) if installed == version => None,
            Some(installed) => Some(Self::version_mismatch(version, installed)),
            None => Some(Self::not_installed(version)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("`{program}` is not installed")]
    NotInstalled { program: String },
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` timed out after {secs}s")]
    Timeout { command: String, secs: u64 },
    #[error("`{command}` failed ({status}): {stderr}")]
    Exit {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("unexpected output from {origin}: {message}")]
    Malformed { origin: String, message: String },
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("release feed request failed: {0}")]
    Http(String),
}

/// The external build toolchain.
#[tower_lsp::async_trait]
pub trait Toolchain: Send + Sync {
    /// The installed toolchain version, `None` when it is not installed.
    async fn current_version(&self) -> Result<Option<String>, ToolError>;

    /// Installed and available platforms.
    async fn platforms(&self) -> Result<Vec<Platform>, ToolError>;

}

/// The remote list of toolchain releases, newest first.
#[tower_lsp::async_trait]
pub trait ReleaseFeed: Send + Sync {
    async fn releases(&self) -> Result<Vec<Release>, ToolError>;
}

/// Builds collaborators for a workspace from its settings.
pub trait Collaborators: Send + Sync {
    fn toolchain(&self, settings: &ServerSettings) -> Arc<dyn Toolchain>;
    fn release_feed(&self, settings: &ServerSettings) -> Arc<dyn ReleaseFeed>;
}

/// Spawns the real CLI and talks to the real feed.
#[derive(Debug, Default)]
pub struct SystemCollaborators;

impl Collaborators for SystemCollaborators {
    fn toolchain(&self, settings: &ServerSettings) -> Arc<dyn Toolchain> {
        Arc::new(ArduinoCli::new(
            settings.toolchain.cli_path.clone(),
            settings.toolchain.timeout,
        ))
    }

    fn release_feed(&self, settings: &ServerSettings) -> Arc<dyn ReleaseFeed> {
        let feed = match &settings.releases.feed_file {
            Some(path) => GithubReleaseFeed::from_file(path.clone()),
            None => GithubReleaseFeed::from_url(
                settings.releases.feed_url.clone(),
                settings.toolchain.timeout,
            ),
        };
        Arc::new(feed)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_tolerates_null_names() {
        let release: Release = serde_json::from_str(
            r#"{ "name": null, "tag_name": "v1.0.0", "prerelease": false, "id": 7 }"#,
        )
        .expect("release");
        assert_eq!(release.name, "");
        assert_eq!(release.tag_name, "v1.0.0");
    }
}
