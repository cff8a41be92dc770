//! Per-connection dispatch: bounded header read, parse, then branch into
//! the tunnel or the forwarder. Grounded in `_handle_client` in the
//! reference implementation, which performs exactly this sequence before
//! branching on method.

use tokio::net::TcpStream;

use crate::{
    http::request::{parse, read_header_block},
    limits::ConnLimits,
    proxy::{forwarder, tunnel},
    store::{CacheStore, DenylistStore, LogStore},
};

/// Handles one accepted connection end to end. Closes `client` on return
/// regardless of outcome, by virtue of the caller dropping the stream.
pub async fn handle(
    mut client: TcpStream,
    client_addr: String,
    limits: ConnLimits,
    cache: CacheStore,
    denylist: DenylistStore,
    log: LogStore,
) {
    let Some(header_block) = read_header_block(&mut client, &limits).await else {
        return;
    };

    let Some(request) = parse(&header_block) else {
        return;
    };

    if request.method.eq_ignore_ascii_case("CONNECT") {
        tunnel::tunnel(
            &mut client,
            &client_addr,
            &request.target,
            &limits,
            &denylist,
            &log,
        )
        .await;
    } else {
        forwarder::forward(
            &mut client,
            &client_addr,
            &request,
            &limits,
            &cache,
            &denylist,
            &log,
        )
        .await;
    }
}
