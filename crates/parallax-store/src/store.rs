//! Keyed dataset store with the dirty/loaded handshake

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use parallax_core::{ParallaxError, ParallaxResult, StoreKey};

#[derive(Debug)]
struct Entry {
    bytes: Arc<[u8]>,
    dirty: bool,
    loaded: bool,
}

/// Thread-safe store of `(identifier, key) -> bytes` with dirty tracking
///
/// Payloads live behind `Arc` so the critical section is limited to
/// insert/lookup/flag-toggle; byte copies happen outside the lock. The
/// producer (a remote scripting client, relayed through the hub) marks an
/// entry dirty on every write; the consumer (a renderable) polls
/// [`DataStore::is_dirty`], reads the data, then calls
/// [`DataStore::set_loaded`] so the next poll skips the re-upload.
#[derive(Debug, Default)]
pub struct DataStore {
    entries: Mutex<HashMap<(String, StoreKey), Entry>>,
}

impl DataStore {
    pub fn new() -> Self {
        DataStore::default()
    }

    /// Insert or replace an entry and mark it dirty. No size limit is
    /// enforced here; chunking large transfers is the transport's concern.
    pub fn store(&self, identifier: impl Into<String>, key: StoreKey, bytes: Vec<u8>) {
        let bytes: Arc<[u8]> = bytes.into();
        let mut entries = self.entries.lock();
        entries.insert(
            (identifier.into(), key),
            Entry {
                bytes,
                dirty: true,
                loaded: false,
            },
        );
    }

    /// Fetch the current payload. Absence is a local, recoverable error:
    /// the caller decides whether a missing dataset matters.
    pub fn fetch(&self, identifier: &str, key: StoreKey) -> ParallaxResult<Arc<[u8]>> {
        let entries = self.entries.lock();
        entries
            .get(&(identifier.to_string(), key))
            .map(|entry| Arc::clone(&entry.bytes))
            .ok_or_else(|| ParallaxError::NotFound {
                identifier: identifier.to_string(),
                key,
            })
    }

    /// Has the entry been written since it was last marked loaded?
    pub fn is_dirty(&self, identifier: &str, key: StoreKey) -> bool {
        let entries = self.entries.lock();
        entries
            .get(&(identifier.to_string(), key))
            .map(|entry| entry.dirty)
            .unwrap_or(false)
    }

    /// Consumer acknowledgement: clears dirty, sets loaded
    pub fn set_loaded(&self, identifier: &str, key: StoreKey) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(&(identifier.to_string(), key)) {
            entry.dirty = false;
            entry.loaded = true;
        }
    }

    /// Has the entry ever been consumed?
    pub fn is_loaded(&self, identifier: &str, key: StoreKey) -> bool {
        let entries = self.entries.lock();
        entries
            .get(&(identifier.to_string(), key))
            .map(|entry| entry.loaded)
            .unwrap_or(false)
    }

    /// Identifiers with at least one stored key
    pub fn identifiers(&self) -> Vec<String> {
        let entries = self.entries.lock();
        let mut ids: Vec<String> = entries.keys().map(|(id, _)| id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop everything, for session teardown
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_fetch() {
        let store = DataStore::new();
        store.store("dataset1", StoreKey::Positions, vec![1, 2, 3]);

        let bytes = store.fetch("dataset1", StoreKey::Positions).unwrap();
        assert_eq!(&bytes[..], &[1, 2, 3]);
    }

    #[test]
    fn test_fetch_absent_is_not_found() {
        let store = DataStore::new();
        let err = store.fetch("nope", StoreKey::Colors).unwrap_err();
        assert!(matches!(err, ParallaxError::NotFound { .. }));
    }

    #[test]
    fn test_dirty_loaded_handshake() {
        let store = DataStore::new();
        assert!(!store.is_dirty("dataset1", StoreKey::Positions));

        store.store("dataset1", StoreKey::Positions, vec![1]);
        assert!(store.is_dirty("dataset1", StoreKey::Positions));
        assert!(!store.is_loaded("dataset1", StoreKey::Positions));

        store.set_loaded("dataset1", StoreKey::Positions);
        assert!(!store.is_dirty("dataset1", StoreKey::Positions));
        assert!(store.is_loaded("dataset1", StoreKey::Positions));

        // Next write dirties again
        store.store("dataset1", StoreKey::Positions, vec![2]);
        assert!(store.is_dirty("dataset1", StoreKey::Positions));
    }

    #[test]
    fn test_second_store_replaces_payload() {
        let store = DataStore::new();
        store.store("dataset1", StoreKey::Positions, vec![1, 1, 1]);
        store.store("dataset1", StoreKey::Positions, vec![2, 2]);

        let bytes = store.fetch("dataset1", StoreKey::Positions).unwrap();
        assert_eq!(&bytes[..], &[2, 2]);
    }

    #[test]
    fn test_keys_are_independent() {
        let store = DataStore::new();
        store.store("dataset1", StoreKey::Positions, vec![1]);
        store.store("dataset1", StoreKey::Colors, vec![2]);

        store.set_loaded("dataset1", StoreKey::Positions);
        assert!(!store.is_dirty("dataset1", StoreKey::Positions));
        assert!(store.is_dirty("dataset1", StoreKey::Colors));
    }

    #[test]
    fn test_identifiers_deduped() {
        let store = DataStore::new();
        store.store("b", StoreKey::Positions, vec![]);
        store.store("a", StoreKey::Positions, vec![]);
        store.store("a", StoreKey::Colors, vec![]);

        assert_eq!(store.identifiers(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_concurrent_store_and_fetch() {
        let store = Arc::new(DataStore::new());
        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..100u8 {
                    store.store("dataset1", StoreKey::Positions, vec![i; 16]);
                }
            })
        };

        for _ in 0..100 {
            if let Ok(bytes) = store.fetch("dataset1", StoreKey::Positions) {
                assert_eq!(bytes.len(), 16);
            }
        }
        writer.join().unwrap();
        assert!(store.is_dirty("dataset1", StoreKey::Positions));
    }
}
