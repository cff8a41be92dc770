//! The plain-HTTP path: policy check, cache check, upstream fetch, cache
//! fill. Grounded directly in `_handle_client`'s non-`CONNECT` branch in the
//! reference implementation this was distilled from.

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};

use crate::{
    errors::{respond, ErrorKind},
    http::{request::ParsedRequest, url::RequestUrl},
    limits::ConnLimits,
    store::{Action, CacheStore, DenylistStore, LogStore},
};

/// Runs the plain-HTTP forward path to completion, writing the final
/// response (synthesized, replayed, or relayed) to `client` and recording
/// exactly one log event before returning.
pub async fn forward(
    client: &mut TcpStream,
    client_addr: &str,
    request: &ParsedRequest,
    limits: &ConnLimits,
    cache: &CacheStore,
    denylist: &DenylistStore,
    log: &LogStore,
) {
    let url = RequestUrl::reconstruct(&request.target, request.header("host"));

    if denylist.contains(&url.host) {
        respond(client, client_addr, &url.full, ErrorKind::BlockedHttp, log).await;
        return;
    }

    if request.method.eq_ignore_ascii_case("GET") {
        if let Some(cached) = cache.lookup(&url.full) {
            let _ = client.write_all(&cached).await;
            log.append(client_addr, &url.full, Action::Cached);
            return;
        }
    }

    let origin_port = url.port.unwrap_or(80);
    let mut upstream = match timeout(
        limits.connect_timeout,
        TcpStream::connect((url.host.as_str(), origin_port)),
    )
    .await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            respond(client, client_addr, &url.full, ErrorKind::UpstreamConnectFailed(e), log).await;
            return;
        }
        Err(_) => {
            let timed_out = std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out");
            respond(client, client_addr, &url.full, ErrorKind::UpstreamConnectFailed(timed_out), log).await;
            return;
        }
    };

    log.append(client_addr, &url.full, Action::RequestHttp);

    let upstream_request = build_upstream_request(request, &url);
    if let Err(e) = upstream.write_all(&upstream_request).await {
        respond(client, client_addr, &url.full, ErrorKind::UpstreamSendFailed(e), log).await;
        return;
    }

    let mut response_data = Vec::new();
    let mut chunk = vec![0u8; limits.relay_chunk_size];
    loop {
        let read = timeout(limits.upstream_read_timeout, upstream.read(&mut chunk)).await;
        match read {
            Ok(Ok(0)) | Err(_) | Ok(Err(_)) => break,
            Ok(Ok(n)) => {
                response_data.extend_from_slice(&chunk[..n]);
                if client.write_all(&chunk[..n]).await.is_err() {
                    break;
                }
            }
        }
    }

    if request.method.eq_ignore_ascii_case("GET") && !response_data.is_empty() {
        cache.insert(url.full.clone(), response_data);
        log.append(client_addr, &url.full, Action::Fetched);
    } else {
        log.append(client_addr, &url.full, Action::Forwarded);
    }
}

/// Builds the upstream request: original headers minus `host`,
/// `connection`, and `proxy-connection`, with a fresh `Host` and
/// `Connection: close` appended, followed by the leftover body bytes.
fn build_upstream_request(request: &ParsedRequest, url: &RequestUrl) -> Vec<u8> {
    let mut head = format!(
        "{} {} {}\r\n",
        request.method,
        url.path_with_query(),
        request.version
    );
    for (name, value) in &request.headers {
        if name.eq_ignore_ascii_case("host")
            || name.eq_ignore_ascii_case("connection")
            || name.eq_ignore_ascii_case("proxy-connection")
        {
            continue;
        }
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    head.push_str("Host: ");
    head.push_str(&url.netloc());
    head.push_str("\r\nConnection: close\r\n\r\n");

    let mut out = head.into_bytes();
    out.extend_from_slice(&request.leftover_body);
    out
}
