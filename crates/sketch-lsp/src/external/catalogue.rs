//! Cache-backed access to the toolchain and release feed.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{EnvironmentNotice, Platform, Release, ReleaseFeed, ToolError, Toolchain};
use crate::cache::Cache;

const RELEASES_KEY: &str = "releases";
const CORE_LIST_KEY: &str = "core_list";
const CLI_VERSION_KEY: &str = "cli_version";

/// Cached envelope. Failures carry `status: false` and are never persisted.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    data: Option<T>,
}

/// Installed toolchain version as cached; `None` is a cacheable answer.
#[derive(Debug, Serialize, Deserialize)]
struct InstalledVersion {
    version: Option<String>,
}

/// What validation and completion consult for releases and platforms.
pub struct Catalogue {
    toolchain: Arc<dyn Toolchain>,
    feed: Arc<dyn ReleaseFeed>,
    cache: Option<Arc<Cache>>,
    ttl: Duration,
}

impl Catalogue {
    pub fn new(
        toolchain: Arc<dyn Toolchain>,
        feed: Arc<dyn ReleaseFeed>,
        cache: Option<Arc<Cache>>,
        ttl: Duration,
    ) -> Self {
        Self {
            toolchain,
            feed,
            cache,
            ttl,
        }
    }

    pub fn cache(&self) -> Option<&Arc<Cache>> {
        self.cache.as_ref()
    }

    pub async fn releases(&self) -> Result<Vec<Release>, ToolError> {
        self.cached(RELEASES_KEY, || self.feed.releases()).await
    }

    pub async fn platforms(&self) -> Result<Vec<Platform>, ToolError> {
        self.cached(CORE_LIST_KEY, || self.toolchain.platforms()).await
    }

    /// The most recent release that is not a pre-release.
    pub async fn latest_release(&self) -> Result<Option<Release>, ToolError> {
        Ok(latest_stable(&self.releases().await?).cloned())
    }

    /// Compares `version` with the installed toolchain, looked up through the cache.
    pub async fn check_environment(
        &self,
        version: &str,
    ) -> Result<Option<EnvironmentNotice>, ToolError> {
        let installed = self
            .cached(CLI_VERSION_KEY, || async {
                let version = self.toolchain.current_version().await?;
                Ok::<_, ToolError>(InstalledVersion { version })
            })
            .await?;
        Ok(EnvironmentNotice::compare(version, installed.version.as_deref()))
    }

    async fn cached<T, F, Fut>(&self, operation: &str, fetch: F) -> Result<T, ToolError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ToolError>>,
    {
        let Some(cache) = &self.cache else {
            return fetch().await;
        };

        let id = cache.get_id(operation, &[]);
        if let Some(value) = cache.load(&id, self.ttl) {
            match serde_json::from_value::<Envelope<T>>(value) {
                Ok(Envelope {
                    status: true,
                    data: Some(data),
                }) => {
                    debug!("{operation}: served from cache");
                    return Ok(data);
                }
                Ok(_) => debug!("{operation}: cached envelope carries no data"),
                Err(err) => debug!("{operation}: ignoring cached envelope: {err}"),
            }
        }

        let result = fetch().await;
        let envelope = match &result {
            Ok(data) => match serde_json::to_value(data) {
                Ok(data) => json!({ "status": true, "data": data }),
                Err(err) => {
                    warn!("{operation}: result could not be cached: {err}");
                    return result;
                }
            },
            Err(err) => json!({ "status": false, "reason": err.to_string() }),
        };
        if let Err(err) = cache.write(&id, &envelope) {
            warn!("{operation}: failed to write cache entry: {err}");
        }
        result
    }
}

pub fn latest_stable(releases: &[Release]) -> Option<&Release> {
    releases.iter().find(|release| !release.prerelease)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_platforms, sample_releases, FakeReleaseFeed, FakeToolchain};

    fn catalogue_with(
        toolchain: Arc<FakeToolchain>,
        feed: Arc<FakeReleaseFeed>,
        cache: Option<Arc<Cache>>,
    ) -> Catalogue {
        Catalogue::new(toolchain, feed, cache, Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = Arc::new(Cache::new(dir.path()));
        let toolchain = Arc::new(FakeToolchain::new(Some("0.35.3"), sample_platforms()));
        let feed = Arc::new(FakeReleaseFeed::new(sample_releases()));
        let catalogue = catalogue_with(toolchain.clone(), feed.clone(), Some(cache));

        let first = catalogue.releases().await.expect("releases");
        let second = catalogue.releases().await.expect("releases");
        assert_eq!(first, second);
        assert_eq!(feed.calls(), 1);

        catalogue.platforms().await.expect("platforms");
        catalogue.platforms().await.expect("platforms");
        assert_eq!(toolchain.platform_calls(), 1);
    }

    #[tokio::test]
    async fn environment_check_reuses_cached_version() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = Arc::new(Cache::new(dir.path()));
        let toolchain = Arc::new(FakeToolchain::new(Some("0.35.3"), sample_platforms()));
        let feed = Arc::new(FakeReleaseFeed::new(sample_releases()));
        let catalogue = catalogue_with(toolchain.clone(), feed, Some(cache));

        assert_eq!(catalogue.check_environment("0.35.3").await.expect("check"), None);
        let notice = catalogue
            .check_environment("0.34.0")
            .await
            .expect("check")
            .expect("notice");
        assert_eq!(
            notice,
            EnvironmentNotice::version_mismatch("0.34.0", "0.35.3")
        );
        assert_eq!(toolchain.version_calls(), 1);
    }

    #[tokio::test]
    async fn missing_toolchain_is_cached_too() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = Arc::new(Cache::new(dir.path()));
        let toolchain = Arc::new(FakeToolchain::new(None, sample_platforms()));
        let feed = Arc::new(FakeReleaseFeed::new(sample_releases()));
        let catalogue = catalogue_with(toolchain.clone(), feed, Some(cache));

        for _ in 0..2 {
            let notice = catalogue
                .check_environment("0.35.3")
                .await
                .expect("check")
                .expect("notice");
            assert_eq!(notice, EnvironmentNotice::not_installed("0.35.3"));
        }
        assert_eq!(toolchain.version_calls(), 1);
    }

    #[tokio::test]
    async fn failed_version_lookup_is_retried() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = Arc::new(Cache::new(dir.path()));
        let toolchain = Arc::new(FakeToolchain::failing("boom"));
        let feed = Arc::new(FakeReleaseFeed::new(sample_releases()));
        let catalogue = catalogue_with(toolchain.clone(), feed, Some(cache));

        assert!(catalogue.check_environment("0.35.3").await.is_err());
        assert!(catalogue.check_environment("0.35.3").await.is_err());
        assert_eq!(toolchain.version_calls(), 2);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = Arc::new(Cache::new(dir.path()));
        let toolchain = Arc::new(FakeToolchain::new(Some("0.35.3"), sample_platforms()));
        let feed = Arc::new(FakeReleaseFeed::failing("offline"));
        let catalogue = catalogue_with(toolchain, feed.clone(), Some(cache));

        assert!(catalogue.releases().await.is_err());
        assert!(catalogue.releases().await.is_err());
        assert_eq!(feed.calls(), 2);
    }

    #[tokio::test]
    async fn without_cache_every_lookup_fetches() {
        let toolchain = Arc::new(FakeToolchain::new(Some("0.35.3"), sample_platforms()));
        let feed = Arc::new(FakeReleaseFeed::new(sample_releases()));
        let catalogue = catalogue_with(toolchain, feed.clone(), None);

        catalogue.releases().await.expect("releases");
        catalogue.releases().await.expect("releases");
        assert_eq!(feed.calls(), 2);
    }

    #[tokio::test]
    async fn latest_release_skips_prereleases() {
        let toolchain = Arc::new(FakeToolchain::new(Some("0.35.3"), sample_platforms()));
        let feed = Arc::new(FakeReleaseFeed::new(sample_releases()));
        let catalogue = catalogue_with(toolchain, feed, None);

        let latest = catalogue.latest_release().await.expect("releases");
        assert_eq!(latest.map(|release| release.name), Some("0.35.3".to_string()));
    }
}
