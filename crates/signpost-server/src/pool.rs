//! Fixed-size worker pool sharing one listening socket.
//!
//! Workers coordinate at exactly one point: the accept lock, held only while
//! claiming the next connection. Everything else a worker touches lives in
//! its own [`ConnectionHandle`].

use crate::error::PoolError;
use crate::http::{self, HttpSettings};
use signpost_core::{CacheStore, ConnectionHandle, DurableConnector};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

pub type Result<T> = std::result::Result<T, PoolError>;

/// Pause after a failed `accept`, so a persistent error such as running out
/// of descriptors does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// A running set of workers, one per connection handle.
pub struct WorkerPool {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Binds `addr` and starts one worker per handle.
    pub async fn bind<D, C>(
        addr: &str,
        handles: Vec<ConnectionHandle<D, C>>,
        settings: HttpSettings,
    ) -> Result<Self>
    where
        D: DurableConnector,
        C: CacheStore,
    {
        let listener = TcpListener::bind(addr).await?;
        Self::start(listener, handles, settings)
    }

    /// Starts one worker per handle on an already bound listener.
    ///
    /// Handles are opened by the caller, so a store that is down at startup
    /// fails before any worker runs.
    pub fn start<D, C>(
        listener: TcpListener,
        handles: Vec<ConnectionHandle<D, C>>,
        settings: HttpSettings,
    ) -> Result<Self>
    where
        D: DurableConnector,
        C: CacheStore,
    {
        if handles.is_empty() {
            return Err(PoolError::NoWorkers);
        }

        let local_addr = listener.local_addr()?;
        let listener = Arc::new(Mutex::new(listener));
        let (shutdown, signal) = watch::channel(false);

        let workers = handles
            .into_iter()
            .enumerate()
            .map(|(id, handle)| {
                let worker = run_worker(id, listener.clone(), handle, settings, signal.clone());
                tokio::spawn(worker)
            })
            .collect::<Vec<_>>();

        info!(
            %local_addr,
            workers = workers.len(),
            header_read_timeout = ?settings.header_read_timeout,
            "worker pool started"
        );
        Ok(Self {
            local_addr,
            shutdown,
            workers,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stops accepting new connections and waits for every worker to finish
    /// its current request and release its handle.
    pub async fn shutdown(self) -> Result<()> {
        info!("shutting down worker pool");
        // Receivers outlive the send: every worker holds one.
        let _ = self.shutdown.send(true);
        self.join().await
    }

    /// Waits for every worker without asking them to stop.
    pub async fn join(self) -> Result<()> {
        let Self {
            shutdown: _shutdown,
            workers,
            ..
        } = self;

        let mut outcome = Ok(());
        for (id, worker) in workers.into_iter().enumerate() {
            if let Err(e) = worker.await {
                error!(worker = id, error = %e, "worker terminated abnormally");
                if outcome.is_ok() {
                    outcome = Err(PoolError::WorkerPanicked(id));
                }
            }
        }

        info!("worker pool stopped");
        outcome
    }
}

async fn run_worker<D, C>(
    id: usize,
    listener: Arc<Mutex<TcpListener>>,
    handle: ConnectionHandle<D, C>,
    settings: HttpSettings,
    mut shutdown: watch::Receiver<bool>,
) where
    D: DurableConnector,
    C: CacheStore,
{
    debug!(worker = id, "worker started");
    let handle = Arc::new(Mutex::new(handle));
    let app = http::router(handle.clone());

    loop {
        let accepted = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            accepted = accept(&listener) => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                trace!(worker = id, %peer, "accepted connection");
                http::serve_connection(stream, app.clone(), &settings).await;
            }
            Err(e) => {
                warn!(worker = id, error = %e, "failed to accept connection");
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(ACCEPT_BACKOFF) => {}
                }
            }
        }
    }

    debug!(worker = id, "worker draining");
    drop(app);
    match Arc::try_unwrap(handle) {
        Ok(handle) => handle.into_inner().close().await,
        Err(_) => warn!(worker = id, "connection handle still in use, session left open"),
    }
    debug!(worker = id, "worker terminated");
}

/// Claims the next connection. The lock is released when this returns, before
/// the connection is processed.
async fn accept(listener: &Mutex<TcpListener>) -> std::io::Result<(TcpStream, SocketAddr)> {
    let listener = listener.lock().await;
    listener.accept().await
}
