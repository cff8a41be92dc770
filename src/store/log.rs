//! The append-only audit log.
//!
//! Every entry is immutable once written; the store only ever appends or
//! clears in bulk. Enumeration returns entries oldest-first, matching the
//! order operators read them in.

use std::{
    sync::{Arc, Mutex},
    time::{SystemTime, UNIX_EPOCH},
};

use serde::Serialize;

/// The fixed taxonomy of events the proxy records.
///
/// Serializes to the exact `snake_case` tag used in the admin JSON surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    RequestHttp,
    Fetched,
    FetchedNoCache,
    Forwarded,
    Cached,
    Blocked,
    BlockedConnect,
    Connect,
    Tunnel,
    ErrorBadConnect,
    ErrorConnectUpstream,
    ErrorUpstreamConnect,
    ErrorUpstreamSend,
}

/// (timestamp, client endpoint, target URL, action) — one record per
/// client interaction.
#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub timestamp_ms: u128,
    pub client: String,
    pub url: String,
    pub action: Action,
}

impl LogEvent {
    pub fn new(client: impl Into<String>, url: impl Into<String>, action: Action) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or(0),
            client: client.into(),
            url: url.into(),
            action,
        }
    }
}

#[derive(Clone, Default)]
pub struct LogStore {
    events: Arc<Mutex<Vec<LogEvent>>>,
}

impl LogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, client: impl Into<String>, url: impl Into<String>, action: Action) {
        self.events
            .lock()
            .unwrap()
            .push(LogEvent::new(client, url, action));
    }

    /// Snapshot of every recorded event, oldest first.
    pub fn enumerate(&self) -> Vec<LogEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn purge(&self) {
        self.events.lock().unwrap().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_enumerate_in_append_order() {
        let log = LogStore::new();
        log.append("1.2.3.4:5", "http://a.test/", Action::RequestHttp);
        log.append("1.2.3.4:5", "http://b.test/", Action::Blocked);

        let events = log.enumerate();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, Action::RequestHttp);
        assert_eq!(events[1].url, "http://b.test/");
    }

    #[test]
    fn purge_clears_everything() {
        let log = LogStore::new();
        log.append("1.2.3.4:5", "https://c.test/", Action::Connect);
        log.purge();
        assert_eq!(log.len(), 0);
    }

    #[test]
    fn action_serializes_to_snake_case() {
        assert_eq!(
            serde_json::to_string(&Action::FetchedNoCache).unwrap(),
            "\"fetched_no_cache\""
        );
        assert_eq!(
            serde_json::to_string(&Action::BlockedConnect).unwrap(),
            "\"blocked_connect\""
        );
    }
}
