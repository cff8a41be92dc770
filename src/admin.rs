//! The administrative control surface: JSON-over-HTTP on top of the
//! crate's own request parser and response builder, implementing the
//! operations table in the external-interface contract. Grounded in
//! `api_server.py`'s Flask routes for the operation set and validation
//! rules, and in `jizhuozhi-hermes`'s `admin.rs` for the path-match-and-
//! `serde_json::json!` response style — without pulling in a second HTTP
//! stack.

use std::sync::Mutex;

use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use crate::{
    config::{ProxyConfig, PORT_FALLBACKS},
    http::{read_body, read_header_block, request::parse, response},
    server::Server,
    store::{CacheStore, DenylistStore, LogStore},
};

/// Shared state for the admin surface. `control_lock` serializes `start`
/// and `stop`, per the contract's requirement that mutations of listener
/// state be serialized by the collaborator.
pub struct AdminState {
    server: Server,
    cache: CacheStore,
    denylist: DenylistStore,
    log: LogStore,
    config: ProxyConfig,
    control_lock: tokio::sync::Mutex<()>,
    bound_port: Mutex<Option<u16>>,
}

impl AdminState {
    pub fn new(
        server: Server,
        cache: CacheStore,
        denylist: DenylistStore,
        log: LogStore,
        config: ProxyConfig,
    ) -> Self {
        Self {
            server,
            cache,
            denylist,
            log,
            config,
            control_lock: tokio::sync::Mutex::new(()),
            bound_port: Mutex::new(None),
        }
    }

    async fn start(&self) -> Value {
        let _guard = self.control_lock.lock().await;

        if self.server.is_listening() {
            let port = *self.bound_port.lock().unwrap();
            return json!({"running": true, "port": port, "error": Value::Null});
        }

        if self.server.start(&self.config.host, self.config.port).await {
            *self.bound_port.lock().unwrap() = Some(self.config.port);
            return json!({"running": true, "port": self.config.port, "error": Value::Null});
        }

        for candidate in PORT_FALLBACKS {
            if self.server.start(&self.config.host, candidate).await {
                *self.bound_port.lock().unwrap() = Some(candidate);
                return json!({"running": true, "port": candidate, "error": Value::Null});
            }
        }

        json!({"running": false, "port": Value::Null, "error": "failed to bind any configured or fallback port"})
    }

    async fn stop(&self) -> Value {
        let _guard = self.control_lock.lock().await;
        self.server.stop().await;
        *self.bound_port.lock().unwrap() = None;
        json!({"success": true})
    }

    /// Stops the proxy listener if it is running. Used for shutdown on
    /// `SIGINT`, matching `proxy_server.py`'s `except KeyboardInterrupt:
    /// ps.stop()`.
    pub async fn shutdown(&self) {
        let _guard = self.control_lock.lock().await;
        self.server.stop().await;
        *self.bound_port.lock().unwrap() = None;
    }

    fn status(&self) -> Value {
        json!({
            "running": self.server.is_listening(),
            "active_workers": self.server.active_workers(),
            "cache_size": self.cache.len(),
            "denylist_size": self.denylist.len(),
            "port": *self.bound_port.lock().unwrap(),
        })
    }
}

/// Runs the admin accept loop until the process exits. Each connection is
/// handled to completion, response sent, socket closed — no keep-alive, in
/// keeping with the core's own wire contract.
pub async fn run(state: std::sync::Arc<AdminState>, host: &str, port: u16) -> std::io::Result<()> {
    let listener = TcpListener::bind((host, port)).await?;
    info!(%host, port, "admin surface listening");

    loop {
        let (stream, _addr) = listener.accept().await?;
        let state = std::sync::Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, &state).await {
                warn!(error = %e, "admin connection error");
            }
        });
    }
}

async fn handle_connection(mut stream: TcpStream, state: &AdminState) -> std::io::Result<()> {
    let limits = &state.config.limits;
    let Some(header_block) = read_header_block(&mut stream, limits).await else {
        return Ok(());
    };
    let Some(request) = parse(&header_block) else {
        return Ok(());
    };

    let content_length: usize = request
        .header("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let body = read_body(&mut stream, request.leftover_body.clone(), content_length, limits).await;

    let response = route(state, &request.method, &request.target, &body).await;
    use tokio::io::AsyncWriteExt;
    stream.write_all(&response).await?;
    Ok(())
}

async fn route(state: &AdminState, method: &str, path: &str, body: &[u8]) -> Vec<u8> {
    let (status, value) = match (method, path) {
        ("POST", "/control/start") => (200, state.start().await),
        ("POST", "/control/stop") => (200, state.stop().await),
        ("GET", "/status") => (200, state.status()),
        ("GET", "/logs/view") => (200, json!(state.log.enumerate())),
        ("POST", "/logs/clear") => {
            state.log.purge();
            (200, json!({"success": true}))
        }
        ("GET", "/cache/view") => (200, json!(state.cache.enumerate())),
        ("POST", "/cache/clear") => {
            state.cache.purge();
            (200, json!({"success": true}))
        }
        ("GET", "/filter/view") => (200, json!(state.denylist.enumerate())),
        ("POST", "/filter/add") => domain_mutation(body, |h| state.denylist.add(h)),
        ("POST", "/filter/remove") => domain_mutation(body, |h| state.denylist.remove(h)),
        _ => (404, json!({"error": "not found"})),
    };

    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        _ => "Not Found",
    };
    response::json(status, reason, value.to_string().as_bytes())
}

/// Shared validation for `/filter/add` and `/filter/remove`: both reject an
/// empty or missing `domain` field.
fn domain_mutation(body: &[u8], apply: impl FnOnce(&str)) -> (u16, Value) {
    let domain = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("domain").and_then(Value::as_str).map(str::to_string));

    match domain {
        Some(domain) if !domain.is_empty() => {
            apply(&domain);
            (200, json!({"success": true}))
        }
        _ => (400, json!({"error": "domain required"})),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::ConnLimits;

    fn state() -> AdminState {
        AdminState::new(
            Server::new(
                ConnLimits::default(),
                CacheStore::new(),
                DenylistStore::new(),
                LogStore::new(),
            ),
            CacheStore::new(),
            DenylistStore::new(),
            LogStore::new(),
            ProxyConfig::default(),
        )
    }

    #[tokio::test]
    async fn filter_add_rejects_empty_domain() {
        let state = state();
        let (status, value) = domain_mutation(br#"{"domain":""}"#, |h| state.denylist.add(h));
        assert_eq!(status, 400);
        assert_eq!(value["error"], "domain required");
    }

    #[tokio::test]
    async fn filter_add_then_view_round_trips() {
        let state = state();
        let (status, _) = domain_mutation(br#"{"domain":"blocked.test"}"#, |h| state.denylist.add(h));
        assert_eq!(status, 200);
        assert_eq!(state.denylist.enumerate(), vec!["blocked.test".to_string()]);
    }

    #[tokio::test]
    async fn status_reports_stopped_listener() {
        let state = state();
        let status = state.status();
        assert_eq!(status["running"], false);
        assert_eq!(status["cache_size"], 0);
    }
}
