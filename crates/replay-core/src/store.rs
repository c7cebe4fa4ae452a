//! Content store: where scripts read their inputs from and publish outputs to.
//!
//! Stores are addressed by slash-separated logical paths. A leading `/` is
//! ignored and `..` components are rejected, so a store path can never name
//! anything outside the store.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{ReplayError, Result};

/// Transfer-by-path interface to the persistent datastore.
pub trait ContentStore: Send + Sync {
    /// Whether `path` names a readable file. Directories and invalid paths do
    /// not count.
    fn exists(&self, path: &str) -> bool;

    /// Open `path` for reading.
    fn read(&self, path: &str) -> Result<Box<dyn Read + '_>>;

    /// Create or replace `path` with everything `content` yields.
    fn write(&self, path: &str, content: &mut dyn Read) -> Result<()>;
}

/// Split a logical path into its components, rejecting traversal.
pub fn normalize_store_path(path: &str) -> Result<Vec<&str>> {
    let invalid = |reason: &str| ReplayError::InvalidStorePath {
        path: path.to_string(),
        reason: reason.to_string(),
    };
    let parts: Vec<&str> = path
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();
    if parts.is_empty() {
        return Err(invalid("empty path"));
    }
    if parts.iter().any(|p| *p == "..") {
        return Err(invalid("'..' is not allowed"));
    }
    if parts.iter().any(|p| p.contains('\\')) {
        return Err(invalid("use '/' as the separator"));
    }
    Ok(parts)
}

/// A directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of a logical path.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let parts = normalize_store_path(path)?;
        Ok(parts.iter().fold(self.root.clone(), |acc, p| acc.join(p)))
    }
}

impl ContentStore for LocalStore {
    fn exists(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_file()).unwrap_or(false)
    }

    fn read(&self, path: &str) -> Result<Box<dyn Read + '_>> {
        let full = self.resolve(path)?;
        let file = File::open(&full)
            .map_err(ReplayError::io(format!("Read datastore file {}", full.display())))?;
        Ok(Box::new(file))
    }

    fn write(&self, path: &str, content: &mut dyn Read) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .map_err(ReplayError::io(format!("Create datastore directory {}", parent.display())))?;
        }
        let mut file = File::create(&full)
            .map_err(ReplayError::io(format!("Write datastore file {}", full.display())))?;
        io::copy(content, &mut file)
            .map_err(ReplayError::io(format!("Write datastore file {}", full.display())))?;
        Ok(())
    }
}

/// In-process store keyed by normalized path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `path` with `content`.
    pub fn insert(&self, path: &str, content: impl Into<Vec<u8>>) -> Result<()> {
        let key = normalize_store_path(path)?.join("/");
        self.lock().insert(key, content.into());
        Ok(())
    }

    /// Copy of the content at `path`, if present.
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        let key = normalize_store_path(path).ok()?.join("/");
        self.lock().get(&key).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        // A poisoned map is still a consistent map.
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ContentStore for MemoryStore {
    fn exists(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    fn read(&self, path: &str) -> Result<Box<dyn Read + '_>> {
        match self.get(path) {
            Some(content) => Ok(Box::new(Cursor::new(content))),
            None => {
                normalize_store_path(path)?;
                Err(ReplayError::MissingInput(path.to_string()))
            }
        }
    }

    fn write(&self, path: &str, content: &mut dyn Read) -> Result<()> {
        let mut buf = Vec::new();
        content
            .read_to_end(&mut buf)
            .map_err(ReplayError::io(format!("Read content for {path}")))?;
        self.insert(path, buf)
    }
}
