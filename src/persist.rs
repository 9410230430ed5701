//! Best-effort blob persistence.
//!
//! Every operation degrades to "nothing persisted" on failure: errors are
//! logged and reported as `false`/`None`, never raised to the caller.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Serialize, de::DeserializeOwned};

/// Key the node tree is stored under.
pub const TREE_KEY: &str = "h1b_ai_tree";

/// Key the filter set is stored under.
pub const FILTERS_KEY: &str = "h1b_filters";

/// Scoped key/value storage for opaque blobs.
pub trait BlobStore: Send + Sync {
    fn save(&self, key: &str, blob: &str) -> bool;
    fn load(&self, key: &str) -> Option<String>;
    fn remove(&self, key: &str) -> bool;
}

/// Serialize `value` as JSON and save it. Returns whether the save landed.
pub fn save_json<T: Serialize>(store: &dyn BlobStore, key: &str, value: &T) -> bool {
    match serde_json::to_string(value) {
        Ok(blob) => store.save(key, &blob),
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to encode blob");
            false
        }
    }
}

/// Load and decode a JSON blob. Missing and undecodable blobs both yield `None`.
pub fn load_json<T: DeserializeOwned>(store: &dyn BlobStore, key: &str) -> Option<T> {
    let blob = store.load(key)?;
    match serde_json::from_str(&blob) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "failed to decode stored blob");
            None
        }
    }
}

/// Process-local store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryStore {
    fn save(&self, key: &str, blob: &str) -> bool {
        match self.blobs.lock() {
            Ok(mut blobs) => {
                blobs.insert(key.to_string(), blob.to_string());
                true
            }
            Err(_) => false,
        }
    }

    fn load(&self, key: &str) -> Option<String> {
        self.blobs.lock().ok()?.get(key).cloned()
    }

    fn remove(&self, key: &str) -> bool {
        match self.blobs.lock() {
            Ok(mut blobs) => blobs.remove(key).is_some(),
            Err(_) => false,
        }
    }
}

/// One `<key>.json` file per key inside a state directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// The directory is created lazily on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Option<PathBuf> {
        let safe = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        safe.then(|| self.dir.join(format!("{}.json", key)))
    }
}

impl BlobStore for FileStore {
    fn save(&self, key: &str, blob: &str) -> bool {
        let Some(path) = self.path_for(key) else {
            tracing::warn!(key, "refusing to persist under an unsafe key");
            return false;
        };
        // Write to a sibling file first so a crash never leaves a torn blob.
        let tmp = path.with_extension("json.tmp");
        let result = fs::create_dir_all(&self.dir)
            .and_then(|_| fs::write(&tmp, blob))
            .and_then(|_| fs::rename(&tmp, &path));
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, path = %path.display(), error = %e, "failed to save blob");
                false
            }
        }
    }

    fn load(&self, key: &str) -> Option<String> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(blob) => Some(blob),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(key, path = %path.display(), error = %e, "failed to load blob");
                None
            }
        }
    }

    fn remove(&self, key: &str) -> bool {
        let Some(path) = self.path_for(key) else {
            return false;
        };
        match fs::remove_file(&path) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to remove blob");
                false
            }
        }
    }
}

impl<S: BlobStore + ?Sized> BlobStore for Arc<S> {
    fn save(&self, key: &str, blob: &str) -> bool {
        (**self).save(key, blob)
    }

    fn load(&self, key: &str) -> Option<String> {
        (**self).load(key)
    }

    fn remove(&self, key: &str) -> bool {
        (**self).remove(key)
    }
}
