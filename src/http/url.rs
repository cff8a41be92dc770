//! Absolute-URL reconstruction and decomposition for the forwarder.
//!
//! There is no general URI grammar here — only what the forwarder needs:
//! an absolute request-target is used verbatim, a relative one is composed
//! against the `Host` header, and the result is split into the pieces the
//! dial, the cache key, and the upstream request line each need.

/// `http://host[:port]/path[?query]`, decomposed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUrl {
    /// The exact reconstructed URL string, used as the cache key and log identifier.
    pub full: String,
    /// Hostname only, not lowercased — callers lowercase for denylist checks.
    pub host: String,
    pub port: Option<u16>,
    /// Always non-empty; defaults to `/`.
    pub path: String,
    pub query: Option<String>,
}

impl RequestUrl {
    /// Reconstructs the absolute URL per the dispatch rule: an already
    /// absolute request-target is used as-is, otherwise `http://<Host><target>`.
    pub fn reconstruct(target: &str, host_header: Option<&str>) -> Self {
        if target.starts_with("http://") {
            Self::decompose(target)
        } else {
            let composed = format!("http://{}{}", host_header.unwrap_or(""), target);
            Self::decompose(&composed)
        }
    }

    fn decompose(url: &str) -> Self {
        let rest = url.strip_prefix("http://").unwrap_or(url);
        let (netloc, path_and_query) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };

        let (host, port) = match netloc.rsplit_once(':') {
            Some((h, p)) => (h.to_string(), p.parse::<u16>().ok()),
            None => (netloc.to_string(), None),
        };

        let (path, query) = match path_and_query.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (path_and_query.to_string(), None),
        };
        let path = if path.is_empty() { "/".to_string() } else { path };

        let full = match &query {
            Some(q) => format!("http://{netloc}{path}?{q}"),
            None => format!("http://{netloc}{path}"),
        };

        Self {
            full,
            host,
            port,
            path,
            query,
        }
    }

    /// The request-target `path[?query]` used on the upstream request line.
    pub fn path_with_query(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{q}", self.path),
            None => self.path.clone(),
        }
    }

    /// `host:port` as it appeared, or just `host` when no port was given —
    /// what gets re-sent as the upstream `Host` header.
    pub fn netloc(&self) -> String {
        match self.port {
            Some(p) => format!("{}:{p}", self.host),
            None => self.host.clone(),
        }
    }
}
