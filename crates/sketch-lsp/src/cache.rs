//! Persistent cache for toolchain and release feed answers.
//!
//! One JSON file per cached operation under the cache directory. Freshness is
//! the file modification time compared against a caller supplied TTL.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache i/o failed: {0}")]
    Io(#[from] io::Error),
    #[error("cache payload could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Identifies one cached operation and the file backing it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheId {
    pub id: String,
    pub path: PathBuf,
}

/// Cache service for one workspace session.
#[derive(Debug)]
pub struct Cache {
    dir: PathBuf,
    ids: Mutex<FxHashMap<String, PathBuf>>,
}

impl Cache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ids: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Derives the id and file path for `operation(args...)`. No disk access.
    pub fn get_id(&self, operation: &str, args: &[&str]) -> CacheId {
        let id = if args.is_empty() {
            operation.to_string()
        } else {
            format!("{operation}_{}", args.join("_"))
        };
        let digest = format!("{:x}", Sha256::digest(id.as_bytes()));
        let path = self.dir.join(format!("{operation}_{digest}.json"));
        self.ids.lock().insert(id.clone(), path.clone());
        CacheId { id, path }
    }

    pub fn load(&self, id: &CacheId, ttl: Duration) -> Option<Value> {
        self.load_at(id, ttl, SystemTime::now())
    }

    /// Like [`Cache::load`], judging freshness against `now`.
    pub fn load_at(&self, id: &CacheId, ttl: Duration, now: SystemTime) -> Option<Value> {
        let written_at = fs::metadata(&id.path).and_then(|meta| meta.modified()).ok()?;
        // A clock that went backwards counts as a fresh entry.
        let age = now.duration_since(written_at).unwrap_or_default();
        if age >= ttl {
            debug!("cache entry {} expired ({}s old)", id.id, age.as_secs());
            return None;
        }
        let contents = fs::read_to_string(&id.path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!("ignoring malformed cache entry {}: {err}", id.path.display());
                None
            }
        }
    }

    /// Persists `payload`. Payloads with `"status": false` are not written and
    /// `Ok(false)` is returned.
    pub fn write(&self, id: &CacheId, payload: &Value) -> Result<bool, CacheError> {
        if payload.get("status") == Some(&Value::Bool(false)) {
            return Ok(false);
        }
        fs::create_dir_all(&self.dir)?;
        let bytes = serde_json::to_vec_pretty(payload)?;
        let mut file = tempfile::NamedTempFile::new_in(&self.dir)?;
        file.write_all(&bytes)?;
        file.persist(&id.path).map_err(|err| CacheError::Io(err.error))?;
        self.ids.lock().insert(id.id.clone(), id.path.clone());
        Ok(true)
    }

    /// Removes every cache file and forgets derived ids.
    pub fn clear(&self) -> Result<(), CacheError> {
        self.ids.lock().clear();
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn known_ids(&self) -> usize {
        self.ids.lock().len()
    }
}
