use std::{sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;

use proxy_core::{
    config::ProxyConfig,
    server::Server,
    store::{CacheStore, DenylistStore, LogStore},
    ConnLimits,
};

/// Forwarding HTTP proxy with HTTPS tunneling, a response cache, a host
/// denylist, and an audit log, fronted by a JSON admin surface.
#[derive(Parser)]
#[command(name = "proxyd", about = "Forwarding HTTP proxy daemon")]
struct Cli {
    /// Proxy listen host.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Proxy listen port.
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Admin API listen host.
    #[arg(long, default_value = "127.0.0.1")]
    admin_host: String,

    /// Admin API listen port.
    #[arg(long, default_value_t = 8090)]
    admin_port: u16,

    /// Seconds allowed to accumulate a client's header block.
    #[arg(long, default_value_t = 5)]
    header_read_timeout_secs: u64,

    /// Maximum size in bytes of a client's header block.
    #[arg(long, default_value_t = 64 * 1024)]
    max_header_bytes: usize,

    /// Seconds allowed to establish the upstream TCP connection.
    #[arg(long, default_value_t = 10)]
    connect_timeout_secs: u64,

    /// Seconds allowed between chunks while reading the upstream response.
    #[arg(long, default_value_t = 10)]
    upstream_read_timeout_secs: u64,

    /// Seconds a `CONNECT` tunnel may sit idle before it is closed.
    #[arg(long, default_value_t = 15)]
    tunnel_idle_timeout_secs: u64,

    /// Seconds to wait for a single connection worker to finish on shutdown.
    #[arg(long, default_value_t = 2)]
    worker_join_timeout_secs: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    rt.block_on(run(cli))
}

async fn run(cli: Cli) -> Result<()> {
    let defaults = ConnLimits::default();
    let limits = ConnLimits {
        header_read_timeout: Duration::from_secs(cli.header_read_timeout_secs),
        max_header_bytes: cli.max_header_bytes,
        connect_timeout: Duration::from_secs(cli.connect_timeout_secs),
        upstream_read_timeout: Duration::from_secs(cli.upstream_read_timeout_secs),
        tunnel_idle_timeout: Duration::from_secs(cli.tunnel_idle_timeout_secs),
        worker_join_timeout: Duration::from_secs(cli.worker_join_timeout_secs),
        ..defaults
    };

    let config = ProxyConfig {
        host: cli.host,
        port: cli.port,
        admin_host: cli.admin_host,
        admin_port: cli.admin_port,
        limits,
    };

    let cache = CacheStore::new();
    let denylist = DenylistStore::new();
    let log = LogStore::new();
    let server = Server::new(config.limits.clone(), cache.clone(), denylist.clone(), log.clone());

    let admin_host = config.admin_host.clone();
    let admin_port = config.admin_port;
    let state = Arc::new(proxy_core::admin::AdminState::new(
        server, cache, denylist, log, config,
    ));

    tracing::info!(%admin_host, admin_port, "starting admin surface");
    let admin_state = Arc::clone(&state);
    tokio::select! {
        result = proxy_core::admin::run(admin_state, &admin_host, admin_port) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received interrupt, shutting down");
            state.shutdown().await;
        }
    }
    Ok(())
}
