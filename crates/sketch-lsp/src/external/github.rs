//! Release feed backed by the GitHub releases API, or an offline JSON file.

use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use super::{Release, ReleaseFeed, ToolError};

const USER_AGENT: &str = concat!("sketch-lsp/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
enum FeedSource {
    Url { url: String, timeout: Duration },
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct GithubReleaseFeed {
    source: FeedSource,
}

impl GithubReleaseFeed {
    pub fn from_url(url: String, timeout: Duration) -> Self {
        Self {
            source: FeedSource::Url { url, timeout },
        }
    }

    pub fn from_file(path: PathBuf) -> Self {
        Self {
            source: FeedSource::File(path),
        }
    }
}

#[tower_lsp::async_trait]
impl ReleaseFeed for GithubReleaseFeed {
    async fn releases(&self) -> Result<Vec<Release>, ToolError> {
        let body = match &self.source {
            FeedSource::File(path) => {
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| ToolError::Read {
                        path: path.clone(),
                        source,
                    })?
            }
            FeedSource::Url { url, timeout } => {
                let url = url.clone();
                let timeout = *timeout;
                tokio::task::spawn_blocking(move || fetch(&url, timeout))
                    .await
                    .map_err(|err| ToolError::Http(err.to_string()))??
            }
        };
        parse_releases(&body)
    }
}

fn fetch(url: &str, timeout: Duration) -> Result<String, ToolError> {
    debug!("fetching release feed {url}");
    let agent = ureq::AgentBuilder::new().timeout(timeout).build();
    let response = agent
        .get(url)
        .set("User-Agent", USER_AGENT)
        .set("Accept", "application/vnd.github+json")
        .call()
        .map_err(|err| ToolError::Http(err.to_string()))?;
    response
        .into_string()
        .map_err(|err| ToolError::Http(err.to_string()))
}

fn parse_releases(body: &str) -> Result<Vec<Release>, ToolError> {
    serde_json::from_str(body).map_err(|err| ToolError::Malformed {
        origin: "release feed".to_string(),
        message: err.to_string(),
    })
}
