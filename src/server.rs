//! The lifecycle controller: bind, accept loop, shutdown with bounded
//! worker drain. Grounded in `ProxyServer.start`/`stop`/`_accept_loop` in
//! the reference implementation, translated from a thread-per-connection
//! model to one Tokio task per connection; the worker set itself mirrors
//! `spawn_worker`'s register-on-spawn/deregister-on-completion pattern in
//! this crate's teacher.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use socket2::{Domain, Socket, Type};
use tokio::{
    net::TcpListener,
    sync::watch,
    task::JoinHandle,
    time::{timeout, Duration},
};
use tracing::{debug, info, warn};

use crate::{
    connection,
    limits::ConnLimits,
    store::{CacheStore, DenylistStore, LogStore},
};

const ACCEPT_TIMEOUT: Duration = Duration::from_secs(1);
const LISTEN_BACKLOG: i32 = 100;

type WorkerSet = Arc<Mutex<HashMap<u64, JoinHandle<()>>>>;

/// Owns the listening socket and the set of in-flight connection workers.
pub struct Server {
    limits: ConnLimits,
    cache: CacheStore,
    denylist: DenylistStore,
    log: LogStore,
    workers: WorkerSet,
    next_worker_id: AtomicU64,
    shutdown_tx: watch::Sender<bool>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    listening: Mutex<bool>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl Server {
    pub fn new(limits: ConnLimits, cache: CacheStore, denylist: DenylistStore, log: LogStore) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            limits,
            cache,
            denylist,
            log,
            workers: Arc::new(Mutex::new(HashMap::new())),
            next_worker_id: AtomicU64::new(0),
            shutdown_tx,
            accept_task: Mutex::new(None),
            listening: Mutex::new(false),
            local_addr: Mutex::new(None),
        }
    }

    /// Binds `(host, port)` with address reuse, a backlog of 100, and spawns
    /// the accept loop. Returns `false` on bind failure.
    pub async fn start(&self, host: &str, port: u16) -> bool {
        let addr: SocketAddr = match format!("{host}:{port}").parse() {
            Ok(addr) => addr,
            Err(e) => {
                warn!(error = %e, "invalid listen address");
                return false;
            }
        };

        let listener = match bind_reusable(addr) {
            Ok(listener) => listener,
            Err(e) => {
                warn!(error = %e, %addr, "failed to bind listener");
                return false;
            }
        };

        let local_addr = listener.local_addr().ok();
        *self.local_addr.lock().unwrap() = local_addr;
        *self.listening.lock().unwrap() = true;
        let _ = self.shutdown_tx.send(false);
        let shutdown_rx = self.shutdown_tx.subscribe();

        let limits = self.limits.clone();
        let cache = self.cache.clone();
        let denylist = self.denylist.clone();
        let log = self.log.clone();
        let workers = Arc::clone(&self.workers);
        let next_id = AtomicU64::new(self.next_worker_id.load(Ordering::SeqCst));

        let task = tokio::spawn(accept_loop(
            listener, limits, cache, denylist, log, workers, shutdown_rx, next_id,
        ));
        *self.accept_task.lock().unwrap() = Some(task);

        info!(%addr, "listening");
        true
    }

    /// Stops accepting new connections and joins every tracked worker with
    /// a per-worker timeout, returning once every join has completed or
    /// timed out.
    pub async fn stop(&self) {
        *self.listening.lock().unwrap() = false;
        let _ = self.shutdown_tx.send(true);

        let accept_task = self.accept_task.lock().unwrap().take();
        if let Some(task) = accept_task {
            let _ = task.await;
        }

        let handles: Vec<JoinHandle<()>> = {
            let mut workers = self.workers.lock().unwrap();
            workers.drain().map(|(_, handle)| handle).collect()
        };

        for handle in handles {
            if timeout(self.limits.worker_join_timeout, handle).await.is_err() {
                debug!("worker exceeded join timeout; leaking");
            }
        }
    }

    pub fn active_workers(&self) -> usize {
        self.workers.lock().unwrap().len()
    }

    pub fn is_listening(&self) -> bool {
        *self.listening.lock().unwrap()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().unwrap()
    }
}

fn bind_reusable(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
    let socket = Socket::new(domain, Type::STREAM, None)?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    TcpListener::from_std(socket.into())
}

#[allow(clippy::too_many_arguments)]
async fn accept_loop(
    listener: TcpListener,
    limits: ConnLimits,
    cache: CacheStore,
    denylist: DenylistStore,
    log: LogStore,
    workers: WorkerSet,
    mut shutdown_rx: watch::Receiver<bool>,
    next_id: AtomicU64,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let accepted = tokio::select! {
            accepted = timeout(ACCEPT_TIMEOUT, listener.accept()) => accepted,
            _ = shutdown_rx.changed() => break,
        };

        // Both a transient accept() error and an accept-timeout fall through
        // to the next iteration; shutdown is signaled only via `shutdown_rx`.
        let (stream, addr) = match accepted {
            Ok(Ok(pair)) => pair,
            _ => continue,
        };

        let id = next_id.fetch_add(1, Ordering::SeqCst);
        let client_addr = addr.to_string();
        let limits = limits.clone();
        let cache = cache.clone();
        let denylist = denylist.clone();
        let log = log.clone();
        let workers_for_task = Arc::clone(&workers);

        // The task waits on `registered` before doing any real work, so its
        // own deregistration can never run ahead of the `insert` below.
        let (registered_tx, registered_rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _ = registered_rx.await;
            connection::handle(stream, client_addr, limits, cache, denylist, log).await;
            workers_for_task.lock().unwrap().remove(&id);
        });
        workers.lock().unwrap().insert(id, handle);
        let _ = registered_tx.send(());
    }

    workers.lock().unwrap().retain(|_, handle| !handle.is_finished());
}
