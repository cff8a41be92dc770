//! The host denylist: a set of lowercased hostnames the forwarder and
//! tunnel refuse to dial.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

#[derive(Clone, Default)]
pub struct DenylistStore {
    hosts: Arc<Mutex<HashSet<String>>>,
}

impl DenylistStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-insensitive membership check.
    pub fn contains(&self, host: &str) -> bool {
        self.hosts.lock().unwrap().contains(&host.to_lowercase())
    }

    pub fn add(&self, host: &str) {
        self.hosts.lock().unwrap().insert(host.to_lowercase());
    }

    pub fn remove(&self, host: &str) {
        self.hosts.lock().unwrap().remove(&host.to_lowercase());
    }

    /// Snapshot of every blocked hostname.
    pub fn enumerate(&self) -> Vec<String> {
        self.hosts.lock().unwrap().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.hosts.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn purge(&self) {
        self.hosts.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_is_case_insensitive() {
        let deny = DenylistStore::new();
        deny.add("Example.TEST");
        assert!(deny.contains("example.test"));
        assert!(deny.contains("EXAMPLE.test"));
    }

    #[test]
    fn add_then_remove_restores_pre_state() {
        let deny = DenylistStore::new();
        let before = deny.enumerate();

        deny.add("blocked.test");
        assert!(deny.contains("blocked.test"));

        deny.remove("blocked.test");
        let mut after = deny.enumerate();
        after.sort();
        let mut before = before;
        before.sort();
        assert_eq!(before, after);
    }

    #[test]
    fn purge_clears_everything() {
        let deny = DenylistStore::new();
        deny.add("a.test");
        deny.add("b.test");
        deny.purge();
        assert!(deny.enumerate().is_empty());
    }
}
