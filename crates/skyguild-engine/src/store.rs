//! File-backed [`KeyValueStore`].
//!
//! Each key is stored as `<dir>/<key>.json`. Writes go to a temporary
//! sibling first and are renamed into place, so a crash mid-write leaves
//! the previous save intact.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use skyguild_core::persistence::{KeyValueStore, StoreError};
use tracing::debug;

/// A store that keeps one JSON file per key in a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first
    /// write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory saves are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::Unavailable {
                reason: format!("'{key}' is not a valid save key"),
            });
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path(key)?;
        std::fs::create_dir_all(&self.dir)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &path)?;
        debug!(path = %path.display(), bytes = bytes.len(), "save written");
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        let path = self.path(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> FileStore {
        let dir = std::env::temp_dir().join(format!(
            "skyguild-store-{name}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        FileStore::new(dir)
    }

    #[test]
    fn missing_key_reads_as_none() {
        let store = scratch("missing");
        assert!(store.read("skyguild_save").unwrap().is_none());
    }

    #[test]
    fn write_then_read_and_remove() {
        let mut store = scratch("roundtrip");
        store.write("skyguild_save", b"{\"a\":1}").unwrap();
        assert_eq!(
            store.read("skyguild_save").unwrap().as_deref(),
            Some(&b"{\"a\":1}"[..])
        );
        assert!(store.dir().join("skyguild_save.json").exists());
        assert!(!store.dir().join("skyguild_save.json.tmp").exists());

        store.write("skyguild_save", b"{}").unwrap();
        assert_eq!(store.read("skyguild_save").unwrap().as_deref(), Some(&b"{}"[..]));

        store.remove("skyguild_save").unwrap();
        assert!(store.read("skyguild_save").unwrap().is_none());
        // Removing twice is fine.
        store.remove("skyguild_save").unwrap();

        std::fs::remove_dir_all(store.dir()).unwrap();
    }

    #[test]
    fn path_like_keys_are_rejected() {
        let mut store = scratch("keys");
        assert!(matches!(
            store.write("../escape", b"x"),
            Err(StoreError::Unavailable { .. })
        ));
        assert!(store.read("").is_err());
    }
}
