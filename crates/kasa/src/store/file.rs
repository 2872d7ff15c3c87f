//! File-backed credential store.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, trace};

use crate::Result;
use crate::auth::CredentialPair;
use crate::error::StorageError;

use super::{ACCESS_TOKEN_KEY, CredentialStore, REFRESH_TOKEN_KEY, pair_from_values};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// A [`CredentialStore`] persisted as a JSON object of string keys.
///
/// Writes go to a temporary file that is renamed over the original, so a
/// reader sees either the old pair or the new one. An advisory lock on a
/// sidecar `.lock` file serialises writers from separate processes.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

type Values = BTreeMap<String, String>;

impl FileStore {
    /// Create a store backed by the file at `path`.
    ///
    /// Nothing is created until the first `save`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn read_values(&self) -> Result<Values> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Values::new()),
            Err(e) => return Err(self.io_error(e).into()),
        };

        serde_json::from_str(&contents).map_err(|e| {
            StorageError::Corrupt {
                path: self.path.display().to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    fn write_values(&self, values: &Values) -> Result<()> {
        let content = serde_json::to_string_pretty(values).map_err(|e| StorageError::Corrupt {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;

        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, &content).map_err(|e| self.io_error(e))?;

        // Set restrictive permissions (Unix only)
        #[cfg(unix)]
        {
            let mut perms = fs::metadata(&temp_path)
                .map_err(|e| self.io_error(e))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&temp_path, perms).map_err(|e| self.io_error(e))?;
        }

        fs::rename(&temp_path, &self.path).map_err(|e| self.io_error(e))?;
        Ok(())
    }

    /// Run `f` while holding the exclusive writer lock.
    fn locked<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let lock_file: File = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.lock_path())
            .map_err(|e| self.io_error(e))?;

        lock_file.lock_exclusive().map_err(|e| self.io_error(e))?;
        let result = f();
        lock_file.unlock().map_err(|e| self.io_error(e))?;
        result
    }
}

impl CredentialStore for FileStore {
    fn load(&self) -> Result<Option<CredentialPair>> {
        let values = self.read_values()?;
        trace!(path = %self.path.display(), keys = values.len(), "Loaded credential file");
        Ok(pair_from_values(
            values.get(ACCESS_TOKEN_KEY),
            values.get(REFRESH_TOKEN_KEY),
        ))
    }

    fn save(&self, pair: &CredentialPair) -> Result<()> {
        self.locked(|| {
            // A corrupt file is replaced outright rather than merged into.
            let mut values = self.read_values().unwrap_or_default();
            values.insert(ACCESS_TOKEN_KEY.to_string(), pair.access.as_str().to_string());
            values.insert(REFRESH_TOKEN_KEY.to_string(), pair.refresh.as_str().to_string());
            self.write_values(&values)
        })?;
        debug!(path = %self.path.display(), "Saved credentials");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.locked(|| match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e).into()),
        })?;
        debug!(path = %self.path.display(), "Cleared credentials");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> FileStore {
        FileStore::new(dir.path().join("session").join("credentials.json"))
    }

    #[test]
    fn load_without_file_is_empty() {
        let dir = TempDir::new().unwrap();
        assert_eq!(store_in(&dir).load().unwrap(), None);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let pair = CredentialPair::new("access-1", "refresh-1");

        store.save(&pair).unwrap();

        assert_eq!(store.load().unwrap(), Some(pair));
        // A second handle on the same file sees the write immediately.
        assert!(store_in(&dir).load().unwrap().is_some());
    }

    #[test]
    fn file_uses_documented_keys() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(&CredentialPair::new("a", "r")).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["token"], "a");
        assert_eq!(raw["refreshToken"], "r");
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(&CredentialPair::new("a", "r")).unwrap();

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn one_key_alone_is_no_session() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), r#"{"token":"a"}"#).unwrap();

        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "not json").unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::Storage(StorageError::Corrupt { .. })));

        // Saving over a corrupt file recovers it.
        store.save(&CredentialPair::new("a", "r")).unwrap();
        assert!(store.load().unwrap().is_some());
    }

    #[cfg(unix)]
    #[test]
    fn file_is_private() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(&CredentialPair::new("a", "r")).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
