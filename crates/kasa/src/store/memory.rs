//! In-process credential store.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::Result;
use crate::auth::CredentialPair;

use super::{ACCESS_TOKEN_KEY, CredentialStore, REFRESH_TOKEN_KEY, pair_from_values};

/// A [`CredentialStore`] that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `pair`.
    pub fn with_pair(pair: &CredentialPair) -> Self {
        let store = Self::new();
        store.insert(pair);
        store
    }

    /// Set a single raw key, for simulating partially written storage.
    pub fn set_raw(&self, key: &str, value: impl Into<String>) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.into());
    }

    fn insert(&self, pair: &CredentialPair) {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(ACCESS_TOKEN_KEY.to_string(), pair.access.as_str().to_string());
        values.insert(REFRESH_TOKEN_KEY.to_string(), pair.refresh.as_str().to_string());
    }
}

impl CredentialStore for MemoryStore {
    fn load(&self) -> Result<Option<CredentialPair>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(pair_from_values(
            values.get(ACCESS_TOKEN_KEY),
            values.get(REFRESH_TOKEN_KEY),
        ))
    }

    fn save(&self, pair: &CredentialPair) -> Result<()> {
        self.insert(pair);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.remove(ACCESS_TOKEN_KEY);
        values.remove(REFRESH_TOKEN_KEY);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_returns_pair() {
        let store = MemoryStore::new();
        let pair = CredentialPair::new("a1", "r1");
        store.save(&pair).unwrap();
        assert_eq!(store.load().unwrap(), Some(pair));
    }

    #[test]
    fn clear_then_load_is_empty() {
        let store = MemoryStore::with_pair(&CredentialPair::new("a1", "r1"));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.clear().unwrap();
    }

    #[test]
    fn missing_refresh_key_means_no_session() {
        let store = MemoryStore::new();
        store.set_raw(ACCESS_TOKEN_KEY, "a1");
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn save_replaces_both_halves() {
        let store = MemoryStore::with_pair(&CredentialPair::new("a1", "r1"));
        store.save(&CredentialPair::new("a2", "r2")).unwrap();
        let pair = store.load().unwrap().unwrap();
        assert_eq!(pair.access.as_str(), "a2");
        assert_eq!(pair.refresh.as_str(), "r2");
    }
}
