//! The taxonomy of anticipated connection failures and the single place
//! that turns one into a wire response plus a log tag.
//!
//! Two failure modes never reach here at all: a failed header read and a
//! malformed start line both end the connection silently, with no
//! response and no log entry, per the propagation policy — there is
//! nothing for this enum to say about them.

use std::io;

use tokio::{io::AsyncWriteExt, net::TcpStream};

use crate::{
    http::response,
    store::{Action, LogStore},
};

/// Every anticipated failure that produces both a synthetic response and a
/// log entry. Each variant maps to exactly one `(status, body, tag)` triple
/// at the single call site in [`respond`].
#[derive(Debug)]
pub(crate) enum ErrorKind {
    /// `CONNECT`'s `host:port` target did not parse.
    BadConnectTarget,
    /// The hostname is denylisted, reached through a plain forwarded request.
    BlockedHttp,
    /// The hostname is denylisted, reached through `CONNECT`.
    BlockedConnect,
    /// The upstream `connect()` failed on the plain-HTTP path.
    UpstreamConnectFailed(#[allow(dead_code)] io::Error),
    /// The upstream `connect()` failed on the `CONNECT` path.
    ConnectUpstreamFailed(#[allow(dead_code)] io::Error),
    /// The request could not be written to the upstream socket.
    UpstreamSendFailed(#[allow(dead_code)] io::Error),
}

impl ErrorKind {
    fn wire(&self) -> (u16, &'static str, &'static [u8]) {
        match self {
            ErrorKind::BadConnectTarget => (400, "Bad Request", response::BAD_CONNECT_BODY),
            ErrorKind::BlockedHttp | ErrorKind::BlockedConnect => {
                (403, "Forbidden", response::ACCESS_DENIED_BODY)
            }
            ErrorKind::UpstreamConnectFailed(_)
            | ErrorKind::ConnectUpstreamFailed(_)
            | ErrorKind::UpstreamSendFailed(_) => (502, "Bad Gateway", response::BAD_GATEWAY_BODY),
        }
    }

    fn tag(&self) -> Action {
        match self {
            ErrorKind::BadConnectTarget => Action::ErrorBadConnect,
            ErrorKind::BlockedHttp => Action::Blocked,
            ErrorKind::BlockedConnect => Action::BlockedConnect,
            ErrorKind::UpstreamConnectFailed(_) => Action::ErrorUpstreamConnect,
            ErrorKind::ConnectUpstreamFailed(_) => Action::ErrorConnectUpstream,
            ErrorKind::UpstreamSendFailed(_) => Action::ErrorUpstreamSend,
        }
    }
}

/// Writes the synthetic response for `kind` to `client` and records the
/// matching log event. Write failures are swallowed: whatever already
/// reached the client stands, and the connection closes either way.
pub(crate) async fn respond(
    client: &mut TcpStream,
    client_addr: &str,
    url: &str,
    kind: ErrorKind,
    log: &LogStore,
) {
    let (status, reason, body) = kind.wire();
    let _ = client.write_all(&response::synthetic(status, reason, body)).await;
    log.append(client_addr, url, kind.tag());
}
