//! Server state management.
//!
//! Open documents, per-workspace sessions (settings, cache and catalogue) and
//! the notices the user asked not to see again.

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_lsp::lsp_types::Url;
use tracing::{debug, info, warn};

use crate::cache::Cache;
use crate::config::ServerSettings;
use crate::external::{Catalogue, Collaborators};
use crate::validation::SchemaValidator;

/// A document managed by the server.
#[derive(Debug, Clone)]
pub struct Document {
    /// The document URI.
    pub uri: Url,
    /// The document version.
    pub version: i32,
    /// The document content.
    pub content: String,
}

/// Everything validation needs for one workspace root.
pub struct WorkspaceSession {
    pub root: PathBuf,
    pub settings: ServerSettings,
    pub cache: Option<Arc<Cache>>,
    pub catalogue: Catalogue,
}

impl WorkspaceSession {
    pub fn new(settings: ServerSettings, collaborators: &dyn Collaborators) -> Self {
        let cache = settings
            .cache
            .enabled
            .then(|| Arc::new(Cache::new(settings.cache.dir.clone())));
        let catalogue = Catalogue::new(
            collaborators.toolchain(&settings),
            collaborators.release_feed(&settings),
            cache.clone(),
            settings.cache.ttl,
        );
        Self {
            root: settings.root.clone(),
            settings,
            cache,
            catalogue,
        }
    }
}

/// The main server state.
pub struct ServerState {
    /// Open documents indexed by URI.
    documents: RwLock<FxHashMap<Url, Document>>,
    /// Workspace folders.
    workspace_folders: RwLock<Vec<Url>>,
    /// Sessions per workspace root, created on first use.
    sessions: RwLock<FxHashMap<PathBuf, Arc<WorkspaceSession>>>,
    /// Toolchain versions whose notices were dismissed for this session.
    dismissed_notices: RwLock<FxHashSet<String>>,
    schema: Arc<SchemaValidator>,
    collaborators: Arc<dyn Collaborators>,
}

impl ServerState {
    /// Creates a new server state.
    pub fn new(schema: Arc<SchemaValidator>, collaborators: Arc<dyn Collaborators>) -> Self {
        Self {
            documents: RwLock::new(FxHashMap::default()),
            workspace_folders: RwLock::new(Vec::new()),
            sessions: RwLock::new(FxHashMap::default()),
            dismissed_notices: RwLock::new(FxHashSet::default()),
            schema,
            collaborators,
        }
    }

    pub fn schema(&self) -> &SchemaValidator {
        &self.schema
    }

    /// Stores the workspace folders.
    pub fn set_workspace_folders(&self, folders: Vec<Url>) {
        *self.workspace_folders.write() = folders;
    }

    /// Returns the workspace folder roots that are local paths.
    pub fn workspace_roots(&self) -> Vec<PathBuf> {
        self.workspace_folders
            .read()
            .iter()
            .filter_map(|folder| folder.to_file_path().ok())
            .collect()
    }

    /// Opens a document.
    pub fn open_document(&self, uri: Url, version: i32, content: String) {
        let document = Document {
            uri: uri.clone(),
            version,
            content,
        };
        self.documents.write().insert(uri, document);
    }

    /// Updates a document. Unknown documents are ignored.
    pub fn update_document(&self, uri: &Url, version: i32, content: String) {
        if let Some(doc) = self.documents.write().get_mut(uri) {
            doc.version = version;
            doc.content = content;
        }
    }

    /// Closes a document.
    pub fn close_document(&self, uri: &Url) {
        self.documents.write().remove(uri);
    }

    /// Gets a document by URI.
    pub fn get_document(&self, uri: &Url) -> Option<Document> {
        self.documents.read().get(uri).cloned()
    }

    /// Returns true while `version` is the live version of `uri`.
    pub fn is_current(&self, uri: &Url, version: i32) -> bool {
        self.documents
            .read()
            .get(uri)
            .is_some_and(|doc| doc.version == version)
    }

    /// Returns all open documents.
    pub fn documents(&self) -> Vec<Document> {
        self.documents.read().values().cloned().collect()
    }

    /// Returns the session owning `uri`: the deepest workspace folder that
    /// contains it, else the document's own directory.
    pub fn session_for_uri(&self, uri: &Url) -> Option<Arc<WorkspaceSession>> {
        let path = uri.to_file_path().ok()?;
        let root = self
            .workspace_roots()
            .into_iter()
            .filter(|root| path.starts_with(root))
            .max_by_key(|root| root.components().count())
            .or_else(|| path.parent().map(Path::to_path_buf))?;
        Some(self.session_for_root(&root))
    }

    /// Returns the session for a workspace root, loading its settings once.
    pub fn session_for_root(&self, root: &Path) -> Arc<WorkspaceSession> {
        if let Some(session) = self.sessions.read().get(root) {
            return Arc::clone(session);
        }
        let settings = ServerSettings::load(root);
        let session = Arc::new(WorkspaceSession::new(settings, self.collaborators.as_ref()));
        let mut sessions = self.sessions.write();
        Arc::clone(sessions.entry(root.to_path_buf()).or_insert(session))
    }

    /// The session of the first workspace folder, if any.
    pub fn primary_session(&self) -> Option<Arc<WorkspaceSession>> {
        let root = self.workspace_roots().into_iter().next()?;
        Some(self.session_for_root(&root))
    }

    /// Re-reads settings for every known root. In-flight passes keep the
    /// session they started with.
    pub fn reload_settings(&self) {
        let mut roots: Vec<PathBuf> = self.sessions.read().keys().cloned().collect();
        for root in self.workspace_roots() {
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
        let reloaded: FxHashMap<PathBuf, Arc<WorkspaceSession>> = roots
            .into_iter()
            .map(|root| {
                let settings = ServerSettings::load(&root);
                let session = WorkspaceSession::new(settings, self.collaborators.as_ref());
                (root, Arc::new(session))
            })
            .collect();
        info!("Reloaded settings for {} workspace root(s)", reloaded.len());
        *self.sessions.write() = reloaded;
    }

    /// Clears the cache of every workspace root and known session. Returns
    /// how many caches were cleared.
    pub fn clear_caches(&self) -> usize {
        for root in self.workspace_roots() {
            self.session_for_root(&root);
        }
        let sessions: Vec<_> = self.sessions.read().values().cloned().collect();
        let mut cleared = 0;
        for session in sessions {
            let Some(cache) = &session.cache else {
                continue;
            };
            let ids = cache.known_ids();
            match cache.clear() {
                Ok(()) => {
                    debug!("Cleared {ids} cache id(s) at {}", cache.dir().display());
                    cleared += 1;
                }
                Err(err) => warn!("Failed to clear cache at {}: {err}", cache.dir().display()),
            }
        }
        cleared
    }

    pub fn dismiss_notice(&self, version: &str) {
        self.dismissed_notices.write().insert(version.to_string());
    }

    pub fn is_notice_dismissed(&self, version: &str) -> bool {
        self.dismissed_notices.read().contains(version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_platforms, sample_releases, test_state, FakeReleaseFeed, FakeToolchain};

    fn state() -> ServerState {
        test_state(
            FakeToolchain::new(Some("0.35.3"), sample_platforms()),
            FakeReleaseFeed::new(sample_releases()),
        )
    }

    #[test]
    fn document_versions_track_updates() {
        let state = state();
        let uri = Url::parse("file:///ws/sketch-project.json").expect("uri");
        state.open_document(uri.clone(), 1, "{}".to_string());
        assert!(state.is_current(&uri, 1));

        state.update_document(&uri, 2, "{ }".to_string());
        assert!(!state.is_current(&uri, 1));
        assert_eq!(state.get_document(&uri).map(|doc| doc.content), Some("{ }".to_string()));

        state.close_document(&uri);
        assert!(!state.is_current(&uri, 2));
        assert!(state.documents().is_empty());
    }

    #[test]
    fn sessions_resolve_to_the_deepest_workspace_folder() {
        let outer = tempfile::tempdir().expect("tempdir");
        let inner = outer.path().join("nested");
        std::fs::create_dir_all(&inner).expect("mkdir");
        let state = state();
        state.set_workspace_folders(vec![
            Url::from_directory_path(outer.path()).expect("uri"),
            Url::from_directory_path(&inner).expect("uri"),
        ]);

        let uri = Url::from_file_path(inner.join("sketch-project.json")).expect("uri");
        let session = state.session_for_uri(&uri).expect("session");
        assert_eq!(session.root, inner);
        assert!(Arc::ptr_eq(&session, &state.session_for_root(&inner)));

        let elsewhere = tempfile::tempdir().expect("tempdir");
        let uri = Url::from_file_path(elsewhere.path().join("sketch-project.json")).expect("uri");
        let session = state.session_for_uri(&uri).expect("session");
        assert_eq!(session.root, elsewhere.path());
    }

    #[test]
    fn reload_picks_up_changed_settings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = state();
        let before = state.session_for_root(dir.path());
        assert!(before.cache.is_some());

        std::fs::write(dir.path().join("sketch-lsp.toml"), "[cache]\nenabled = false\n")
            .expect("write config");
        state.reload_settings();
        let after = state.session_for_root(dir.path());
        assert!(after.cache.is_none());
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn dismissed_notices_are_remembered() {
        let state = state();
        assert!(!state.is_notice_dismissed("0.35.3"));
        state.dismiss_notice("0.35.3");
        assert!(state.is_notice_dismissed("0.35.3"));
        assert!(!state.is_notice_dismissed("0.35.2"));
    }
}
