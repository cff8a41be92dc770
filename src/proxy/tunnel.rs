//! The `CONNECT` path: policy check, upstream dial, `200` acknowledgement,
//! opaque bidirectional relay. Grounded in `_handle_client`'s `CONNECT`
//! branch and `_relay_bidirectional` in the reference implementation.

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};

use crate::{
    errors::{respond, ErrorKind},
    limits::ConnLimits,
    store::{Action, DenylistStore, LogStore},
};

/// Runs the `CONNECT` tunnel to completion: writes the handshake response
/// (or a synthetic error) to `client`, then — once established — relays raw
/// bytes in both directions until either side closes, errors, or both sides
/// go idle past the tunnel timeout.
pub async fn tunnel(
    client: &mut TcpStream,
    client_addr: &str,
    target: &str,
    limits: &ConnLimits,
    denylist: &DenylistStore,
    log: &LogStore,
) {
    let Some((host, port)) = split_target(target) else {
        respond(client, client_addr, target, ErrorKind::BadConnectTarget, log).await;
        return;
    };

    let display_url = format!("https://{host}/");

    if denylist.contains(&host) {
        respond(client, client_addr, &display_url, ErrorKind::BlockedConnect, log).await;
        return;
    }

    let mut upstream = match timeout(
        limits.connect_timeout,
        TcpStream::connect((host.as_str(), port)),
    )
    .await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            respond(client, client_addr, &display_url, ErrorKind::ConnectUpstreamFailed(e), log).await;
            return;
        }
        Err(_) => {
            let timed_out = std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out");
            respond(client, client_addr, &display_url, ErrorKind::ConnectUpstreamFailed(timed_out), log).await;
            return;
        }
    };

    if client
        .write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n")
        .await
        .is_err()
    {
        return;
    }
    log.append(client_addr, &display_url, Action::Connect);

    relay(client, &mut upstream, limits).await;

    log.append(client_addr, &display_url, Action::Tunnel);
}

/// Splits `host:port` on the first `:`, parsing the port as a decimal
/// integer.
fn split_target(target: &str) -> Option<(String, u16)> {
    let (host, port) = target.split_once(':')?;
    let port = port.parse::<u16>().ok()?;
    Some((host.to_string(), port))
}

/// Readiness-based bidirectional relay over a single task: races a read on
/// each side against a shared idle timeout so a stalled direction never
/// blocks the other.
async fn relay(client: &mut TcpStream, upstream: &mut TcpStream, limits: &ConnLimits) {
    let mut client_buf = vec![0u8; limits.relay_chunk_size];
    let mut upstream_buf = vec![0u8; limits.relay_chunk_size];

    loop {
        let wait = tokio::time::sleep(limits.tunnel_idle_timeout);
        tokio::select! {
            result = client.read(&mut client_buf) => {
                match result {
                    Ok(0) | Err(_) => return,
                    Ok(n) => {
                        if upstream.write_all(&client_buf[..n]).await.is_err() {
                            return;
                        }
                    }
                }
            }
            result = upstream.read(&mut upstream_buf) => {
                match result {
                    Ok(0) | Err(_) => return,
                    Ok(n) => {
                        if client.write_all(&upstream_buf[..n]).await.is_err() {
                            return;
                        }
                    }
                }
            }
            _ = wait => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_host_and_decimal_port() {
        assert_eq!(
            split_target("example.test:443"),
            Some(("example.test".to_string(), 443))
        );
    }

    #[test]
    fn rejects_non_numeric_port() {
        assert_eq!(split_target("example.test:notanumber"), None);
    }

    #[test]
    fn rejects_missing_colon() {
        assert_eq!(split_target("example.test"), None);
    }
}
