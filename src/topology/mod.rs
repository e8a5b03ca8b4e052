//! Topology controller: single process or a supervised pool of workers.
//!
//! The same code path runs in every process. A requested worker count of 1
//! serves in-process; a higher count makes the calling process the
//! supervisor, which spawns workers re-executing the current binary. Each
//! worker binds the identical port with `SO_REUSEPORT` and the kernel
//! distributes incoming connections across the pool - best effort, not
//! guaranteed uniform.
//!
//! # Examples
//!
//! ```no_run
//! use bytes::Bytes;
//! use http_body_util::Full;
//! use hyper::{body::Incoming, Request, Response};
//! use roost::Topology;
//!
//! async fn handler(_req: Request<Incoming>) -> Response<Full<Bytes>> {
//!     Response::new(Full::new(Bytes::from_static(b"hello")))
//! }
//!
//! # async fn example() -> roost::Result<()> {
//! let handle = Topology::new(3000).workers(4).establish(handler).await?;
//! handle.wait().await;
//! # Ok(())
//! # }
//! ```

pub(crate) mod spawn;
pub(crate) mod supervisor;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::constants;
use crate::error::{Error, Result};
use crate::handle::ProcessHandle;
use crate::handler::{RequestHandler, SharedHandler};
use crate::server::tls::TransportCredentials;
use crate::server::Server;

pub use supervisor::BindFailurePolicy;

/// The role a process plays in the serving topology.
///
/// Resolved exactly once per process at establishment time and threaded
/// through as a value; querying it never forks or mutates anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// One process, no supervision.
    Single,
    /// Spawns and observes workers; serves no requests itself.
    Supervisor,
    /// A spawned process serving requests on the shared port.
    Worker,
}

/// Resolve this process's role from the requested worker count and the
/// worker environment marker. Side-effect free.
fn resolve_role(workers: usize) -> Role {
    if workers <= 1 {
        // A worker count of 1 forces single-process mode regardless of any
        // inherited environment.
        Role::Single
    } else if std::env::var_os(constants::ENV_WORKER).is_some() {
        Role::Worker
    } else {
        Role::Supervisor
    }
}

/// A serving-topology request.
///
/// Consumed by [`Topology::establish`]; not retained afterwards.
#[derive(Debug)]
pub struct Topology {
    host: IpAddr,
    port: u16,
    workers: usize,
    quiet: bool,
    credentials: Option<TransportCredentials>,
    bind_failure_policy: BindFailurePolicy,
    drain_timeout: Duration,
}

impl Topology {
    /// Create a topology request for the given port with defaults: one
    /// worker, all interfaces, plaintext, not quiet.
    #[must_use]
    pub fn new(port: u16) -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port,
            workers: constants::DEFAULT_WORKERS,
            quiet: false,
            credentials: None,
            bind_failure_policy: BindFailurePolicy::default(),
            drain_timeout: Duration::from_secs(constants::DEFAULT_DRAIN_TIMEOUT_SECS),
        }
    }

    /// Set the interface to bind.
    #[must_use]
    pub fn host(mut self, host: impl Into<IpAddr>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the desired worker count. 1 serves in-process; more forks a
    /// supervised pool. 0 is rejected by [`Topology::establish`].
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Suppress the topology lifecycle log lines.
    #[must_use]
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Serve over TLS with the given credentials instead of plaintext.
    #[must_use]
    pub fn credentials(mut self, credentials: TransportCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Supervisor reaction to a worker losing the bind race at startup.
    #[must_use]
    pub fn bind_failure_policy(mut self, policy: BindFailurePolicy) -> Self {
        self.bind_failure_policy = policy;
        self
    }

    /// Time allowed for in-flight requests to finish during close.
    #[must_use]
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Establish the serving topology and return the handle for this
    /// process's role.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidTopology`] for a worker count of 0 (nothing is
    /// started), [`Error::Bind`]/[`Error::Credentials`] if binding fails in
    /// single-process mode, [`Error::SpawnWorker`] if the supervisor cannot
    /// spawn a worker. A worker that fails to bind does not return: it logs
    /// the error and exits with the bind-failure code so the supervisor can
    /// apply its [`BindFailurePolicy`].
    pub async fn establish<H>(self, handler: H) -> Result<ProcessHandle>
    where
        H: RequestHandler,
    {
        if self.workers == 0 {
            return Err(Error::InvalidTopology { count: 0 });
        }

        let handler: SharedHandler = Arc::new(handler);
        let addr = SocketAddr::new(self.host, self.port);
        let role = resolve_role(self.workers);

        match role {
            Role::Single => {
                let server = Server::bind(
                    handler,
                    addr,
                    self.credentials.as_ref(),
                    false,
                    self.drain_timeout,
                )
                .await?;

                let mut server = server.serve();
                server.ready().await;
                if !self.quiet {
                    info!(port = server.local_addr().port(), "listening");
                }
                Ok(ProcessHandle::single(server))
            },

            Role::Supervisor => {
                if !self.quiet {
                    info!(
                        pid = std::process::id(),
                        workers = self.workers,
                        "supervisor started"
                    );
                }

                let children = spawn::spawn_workers(self.workers)?;
                let supervisor =
                    supervisor::spawn(children, self.quiet, self.bind_failure_policy);
                Ok(ProcessHandle::supervisor(supervisor))
            },

            Role::Worker => {
                let server = match Server::bind(
                    handler,
                    addr,
                    self.credentials.as_ref(),
                    true,
                    self.drain_timeout,
                )
                .await
                {
                    Ok(server) => server,
                    Err(err) => {
                        // The supervisor tells a bind race apart from a
                        // crash by this exit code.
                        error!(error = %err, "worker failed to bind shared port");
                        std::process::exit(err.exit_code());
                    },
                };

                let mut server = server.serve();
                server.ready().await;
                if !self.quiet {
                    info!(
                        pid = std::process::id(),
                        port = server.local_addr().port(),
                        "worker listening"
                    );
                }
                Ok(ProcessHandle::worker(server))
            },
        }
    }
}
