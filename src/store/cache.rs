//! The response cache: absolute URL → raw response bytes.
//!
//! No size limit, no expiry, no revalidation — see the open questions this
//! freezes. A single [`std::sync::Mutex`] guards the map; enumeration clones
//! the key list under the lock and releases it immediately, so a slow caller
//! iterating the snapshot never blocks a concurrent insert.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

#[derive(Clone, Default)]
pub struct CacheStore {
    entries: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the raw response bytes stored for `url`, if any.
    pub fn lookup(&self, url: &str) -> Option<Vec<u8>> {
        self.entries.lock().unwrap().get(url).cloned()
    }

    /// Stores `bytes` under `url`, replacing any previous entry whole.
    pub fn insert(&self, url: String, bytes: Vec<u8>) {
        self.entries.lock().unwrap().insert(url, bytes);
    }

    /// Snapshot of every cached URL.
    pub fn enumerate(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn purge(&self) {
        self.entries.lock().unwrap().clear();
    }
}
