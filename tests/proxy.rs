//! End-to-end scenarios against a loopback listener standing in for the
//! origin, exercising the literal scenarios in the testable-properties
//! section this crate was built against.

use std::time::Duration;

use proxy_core::{
    connection,
    store::{CacheStore, DenylistStore, LogStore},
    ConnLimits,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

async fn fake_origin(response: &'static [u8]) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(response).await;
            });
        }
    });
    addr
}

async fn handle_one(
    client: TcpStream,
    cache: CacheStore,
    denylist: DenylistStore,
    log: LogStore,
) {
    connection::handle(
        client,
        "127.0.0.1:9".to_string(),
        ConnLimits::default(),
        cache,
        denylist,
        log,
    )
    .await;
}

async fn connect_loopback_pair() -> (TcpStream, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connect = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
    let (server_side, _) = listener.accept().await.unwrap();
    let client_side = connect.await.unwrap();
    (client_side, server_side)
}

#[tokio::test]
async fn get_roundtrips_to_cache_hit_without_second_dial() {
    let target = format!(
        "http://{}/a",
        fake_origin(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi").await
    );

    let cache = CacheStore::new();
    let denylist = DenylistStore::new();
    let log = LogStore::new();

    let (client_side, server_side) = connect_loopback_pair().await;
    let request = format!("GET {target} HTTP/1.1\r\nHost: x\r\n\r\n");
    let mut client_side = client_side;
    client_side.write_all(request.as_bytes()).await.unwrap();

    let handler = tokio::spawn(handle_one(
        server_side,
        cache.clone(),
        denylist.clone(),
        log.clone(),
    ));

    let mut first_response = Vec::new();
    tokio::time::timeout(Duration::from_secs(2), client_side.read_to_end(&mut first_response))
        .await
        .unwrap()
        .unwrap();
    handler.await.unwrap();

    assert!(String::from_utf8_lossy(&first_response).ends_with("hi"));
    assert_eq!(cache.len(), 1);

    let (client_side, server_side) = connect_loopback_pair().await;
    let mut client_side = client_side;
    client_side.write_all(request.as_bytes()).await.unwrap();
    let handler = tokio::spawn(handle_one(server_side, cache.clone(), denylist.clone(), log.clone()));

    let mut second_response = Vec::new();
    tokio::time::timeout(Duration::from_secs(2), client_side.read_to_end(&mut second_response))
        .await
        .unwrap()
        .unwrap();
    handler.await.unwrap();

    assert_eq!(first_response, second_response);

    let events = log.enumerate();
    let tags: Vec<_> = events.iter().map(|e| format!("{:?}", e.action)).collect();
    assert_eq!(tags, vec!["RequestHttp", "Fetched", "Cached"]);
}

#[tokio::test]
async fn blocked_host_returns_403_without_dialing_origin() {
    let cache = CacheStore::new();
    let denylist = DenylistStore::new();
    denylist.add("blocked.test");
    let log = LogStore::new();

    let (client_side, server_side) = connect_loopback_pair().await;
    let mut client_side = client_side;
    client_side
        .write_all(b"GET http://blocked.test/x HTTP/1.1\r\nHost: blocked.test\r\n\r\n")
        .await
        .unwrap();

    let handler = tokio::spawn(handle_one(server_side, cache, denylist, log.clone()));
    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(2), client_side.read_to_end(&mut response))
        .await
        .unwrap()
        .unwrap();
    handler.await.unwrap();

    let text = String::from_utf8_lossy(&response);
    assert!(text.starts_with("HTTP/1.1 403 Forbidden"));
    assert!(text.ends_with("<h1>Access Denied</h1>"));

    let events = log.enumerate();
    assert_eq!(events.len(), 1);
    assert_eq!(format!("{:?}", events[0].action), "Blocked");
}

#[tokio::test]
async fn bad_connect_target_returns_400() {
    let cache = CacheStore::new();
    let denylist = DenylistStore::new();
    let log = LogStore::new();

    let (client_side, server_side) = connect_loopback_pair().await;
    let mut client_side = client_side;
    client_side
        .write_all(b"CONNECT host:notanumber HTTP/1.1\r\n\r\n")
        .await
        .unwrap();

    let handler = tokio::spawn(handle_one(server_side, cache, denylist, log.clone()));
    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(2), client_side.read_to_end(&mut response))
        .await
        .unwrap()
        .unwrap();
    handler.await.unwrap();

    assert!(String::from_utf8_lossy(&response).starts_with("HTTP/1.1 400 Bad Request"));
    let events = log.enumerate();
    assert_eq!(format!("{:?}", events[0].action), "ErrorBadConnect");
}

#[tokio::test]
async fn connect_tunnel_relays_bytes_after_handshake() {
    let origin_addr = fake_origin(b"tunneled-response").await;
    let cache = CacheStore::new();
    let denylist = DenylistStore::new();
    let log = LogStore::new();

    let (client_side, server_side) = connect_loopback_pair().await;
    let mut client_side = client_side;
    let connect_line = format!("CONNECT {}:{} HTTP/1.1\r\n\r\n", origin_addr.ip(), origin_addr.port());
    client_side.write_all(connect_line.as_bytes()).await.unwrap();

    let handler = tokio::spawn(handle_one(server_side, cache, denylist, log.clone()));

    let mut handshake = [0u8; 39];
    tokio::time::timeout(Duration::from_secs(2), client_side.read_exact(&mut handshake))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&handshake, b"HTTP/1.1 200 Connection Established\r\n\r\n");

    client_side.write_all(b"anything").await.unwrap();
    let mut relayed = vec![0u8; "tunneled-response".len()];
    tokio::time::timeout(Duration::from_secs(2), client_side.read_exact(&mut relayed))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&relayed, b"tunneled-response");

    drop(client_side);
    handler.await.unwrap();

    let events = log.enumerate();
    let tags: Vec<_> = events.iter().map(|e| format!("{:?}", e.action)).collect();
    assert_eq!(tags, vec!["Connect", "Tunnel"]);
}

