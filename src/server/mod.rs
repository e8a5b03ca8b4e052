//! Transport binder: a bound, listening HTTP server over plaintext or TLS.
//!
//! This layer is intentionally thin - it only handles:
//! - Listener binding (with `SO_REUSEPORT` when a worker pool shares a port)
//! - Connection acceptance and the TLS handshake, when credentials are set
//! - Graceful shutdown with in-flight request draining
//!
//! All request-handling logic is delegated to the supplied
//! [`RequestHandler`](crate::handler::RequestHandler).
//!
//! Readiness and close are explicit single-resolution signals rather than
//! callbacks: [`ServerHandle::ready`] resolves once the accept loop is
//! running, [`ServerHandle::closed`] resolves once the listener is gone and
//! in-flight requests have drained.

pub(crate) mod tls;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnectionBuilder;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, warn};

use crate::constants;
use crate::error::{Error, Result};
use crate::handler::SharedHandler;
use crate::server::tls::TransportCredentials;

/// A bound, listening server that has not started accepting yet.
pub(crate) struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    handler: SharedHandler,
    tls: Option<TlsAcceptor>,
    drain_timeout: Duration,
}

impl Server {
    /// Bind the listen address, preparing the TLS acceptor first when
    /// credentials are given.
    ///
    /// # Errors
    ///
    /// [`Error::Credentials`] if the credential material is malformed,
    /// [`Error::Bind`] if the address cannot be bound. Neither is retried.
    pub(crate) async fn bind(
        handler: SharedHandler,
        addr: SocketAddr,
        credentials: Option<&TransportCredentials>,
        reuse_port: bool,
        drain_timeout: Duration,
    ) -> Result<Self> {
        // Credential failures must surface before the socket opens.
        let tls = credentials.map(TransportCredentials::acceptor).transpose()?;

        let listener = bind_listener(addr, reuse_port).map_err(|e| Error::bind(addr, e))?;
        let local_addr = listener.local_addr().map_err(|e| Error::bind(addr, e))?;

        Ok(Self {
            listener,
            local_addr,
            handler,
            tls,
            drain_timeout,
        })
    }

    /// Start the accept loop and return the handle controlling it.
    pub(crate) fn serve(self) -> ServerHandle {
        let Self {
            listener,
            local_addr,
            handler,
            tls,
            drain_timeout,
        } = self;

        let (ready_tx, ready_rx) = oneshot::channel();
        let (closed_tx, closed_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(accept_loop(
            listener,
            handler,
            tls,
            drain_timeout,
            shutdown_rx,
            ready_tx,
            closed_tx,
        ));

        ServerHandle {
            local_addr,
            shutdown: shutdown_tx,
            ready: Some(ready_rx),
            closed: Some(closed_rx),
            task,
        }
    }
}

/// Handle to a running server.
///
/// Dropping the handle triggers the same graceful shutdown path as
/// [`ServerHandle::trigger_shutdown`].
pub(crate) struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    ready: Option<oneshot::Receiver<()>>,
    closed: Option<oneshot::Receiver<()>>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// The address the listener is actually bound to.
    ///
    /// Differs from the requested address when port 0 was used.
    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Resolves once the accept loop is accepting connections. Single
    /// resolution; later calls return immediately.
    pub(crate) async fn ready(&mut self) {
        if let Some(rx) = self.ready.take() {
            let _ = rx.await;
        }
    }

    /// Stop accepting new connections and begin the drain.
    pub(crate) fn trigger_shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Resolves once the listener is closed and in-flight requests have
    /// drained (bounded by the drain timeout). Single resolution.
    pub(crate) async fn closed(&mut self) {
        if let Some(rx) = self.closed.take() {
            let _ = rx.await;
        }
    }

    /// Run until the accept loop ends (shutdown trigger or signal).
    pub(crate) async fn wait(self) {
        let _ = self.task.await;
    }
}

/// Bind a TCP listener, optionally with `SO_REUSEPORT` so sibling worker
/// processes can share the port and let the kernel distribute accepts.
fn bind_listener(addr: SocketAddr, reuse_port: bool) -> std::io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    if reuse_port {
        socket.set_reuse_port(true)?;
    }
    #[cfg(not(unix))]
    let _ = reuse_port;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(constants::LISTEN_BACKLOG)?;
    TcpListener::from_std(socket.into())
}

/// Decrements the active-request counter even if the request future is
/// dropped mid-flight (client disconnect).
struct ActiveGuard(Arc<AtomicU64>);

impl ActiveGuard {
    fn new(counter: &Arc<AtomicU64>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[allow(clippy::too_many_lines)]
async fn accept_loop(
    listener: TcpListener,
    handler: SharedHandler,
    tls: Option<TlsAcceptor>,
    drain_timeout: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    ready_tx: oneshot::Sender<()>,
    closed_tx: oneshot::Sender<()>,
) {
    let local_addr = listener
        .local_addr()
        .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 0)));
    let active = Arc::new(AtomicU64::new(0));
    let conn_builder = HttpConnectionBuilder::new(TokioExecutor::new());

    // The listener is accepting from the moment `bind_listener` returned;
    // the signal additionally guarantees the loop consuming accepts is live.
    let _ = ready_tx.send(());
    debug!(addr = %local_addr, "accept loop started");

    let mut signals = ShutdownSignals::install();

    loop {
        tokio::select! {
            accept_result = listener.accept() => match accept_result {
                Ok((stream, remote_addr)) => {
                    let handler = Arc::clone(&handler);
                    let active = Arc::clone(&active);
                    let tls = tls.clone();
                    let conn_builder = conn_builder.clone();

                    tokio::spawn(async move {
                        let service = service_fn(move |req| {
                            let guard = ActiveGuard::new(&active);
                            let fut = handler.handle(req);
                            async move {
                                let response = fut.await;
                                drop(guard);
                                Ok::<_, Infallible>(response)
                            }
                        });

                        match tls {
                            Some(acceptor) => match acceptor.accept(stream).await {
                                Ok(tls_stream) => {
                                    if let Err(e) = conn_builder
                                        .serve_connection(TokioIo::new(tls_stream), service)
                                        .await
                                    {
                                        debug!(%remote_addr, error = %e, "connection error");
                                    }
                                },
                                Err(e) => {
                                    debug!(%remote_addr, error = %e, "TLS handshake failed");
                                },
                            },
                            None => {
                                if let Err(e) = conn_builder
                                    .serve_connection(TokioIo::new(stream), service)
                                    .await
                                {
                                    debug!(%remote_addr, error = %e, "connection error");
                                }
                            },
                        }
                    });
                },
                Err(e) => {
                    // Transient accept failures (ECONNABORTED, EMFILE) should
                    // not take the server down.
                    warn!(addr = %local_addr, error = %e, "failed to accept connection");
                },
            },

            _ = shutdown_rx.changed() => {
                debug!(addr = %local_addr, "shutdown triggered");
                break;
            },

            () = signals.recv() => {
                debug!(addr = %local_addr, "shutdown signal received");
                break;
            },
        }
    }

    // Refuse new connections at the OS level from this instant.
    drop(listener);

    let in_flight = active.load(Ordering::SeqCst);
    if in_flight > 0 {
        debug!(addr = %local_addr, in_flight, timeout = ?drain_timeout, "draining in-flight requests");
        let drained = tokio::time::timeout(drain_timeout, async {
            while active.load(Ordering::SeqCst) > 0 {
                tokio::time::sleep(Duration::from_millis(constants::DRAIN_POLL_INTERVAL_MS)).await;
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                addr = %local_addr,
                remaining = active.load(Ordering::SeqCst),
                "drain timeout reached, abandoning remaining requests"
            );
        }
    }

    debug!(addr = %local_addr, "server closed");
    let _ = closed_tx.send(());
}

/// SIGTERM/SIGINT on Unix, Ctrl+C elsewhere. Lets a supervisor's SIGTERM
/// drain a worker through the same path as an explicit close.
pub(crate) struct ShutdownSignals {
    #[cfg(unix)]
    sigterm: Option<tokio::signal::unix::Signal>,
    #[cfg(unix)]
    sigint: Option<tokio::signal::unix::Signal>,
}

impl ShutdownSignals {
    pub(crate) fn install() -> Self {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Self {
                sigterm: signal(SignalKind::terminate())
                    .map_err(|e| warn!(error = %e, "failed to install SIGTERM handler"))
                    .ok(),
                sigint: signal(SignalKind::interrupt())
                    .map_err(|e| warn!(error = %e, "failed to install SIGINT handler"))
                    .ok(),
            }
        }
        #[cfg(not(unix))]
        {
            Self {}
        }
    }

    pub(crate) async fn recv(&mut self) {
        #[cfg(unix)]
        {
            match (&mut self.sigterm, &mut self.sigint) {
                (Some(term), Some(int)) => {
                    tokio::select! {
                        _ = term.recv() => {},
                        _ = int.recv() => {},
                    }
                },
                (Some(term), None) => {
                    term.recv().await;
                },
                (None, Some(int)) => {
                    int.recv().await;
                },
                (None, None) => std::future::pending().await,
            }
        }
        #[cfg(not(unix))]
        {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
