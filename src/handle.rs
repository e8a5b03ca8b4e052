//! The uniform, closable handle returned by topology establishment.

use std::net::SocketAddr;

use crate::server::ServerHandle;
use crate::topology::supervisor::SupervisorHandle;
use crate::topology::Role;

/// Handle to "the thing currently serving requests" in this process: a
/// bound server (single-process mode and each worker) or a supervisory role
/// over a pool of children (the supervisor).
///
/// Exactly one of the three roles holds for any instance, fixed at
/// creation. Closing consumes the handle, so a double close is
/// unrepresentable. Dropping the handle without closing shuts the server
/// down without waiting for the drain.
pub struct ProcessHandle {
    inner: HandleInner,
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("role", &self.role())
            .field("local_addr", &self.local_addr())
            .finish()
    }
}

enum HandleInner {
    Single { server: ServerHandle },
    Supervisor { supervisor: SupervisorHandle },
    Worker { server: ServerHandle },
}

impl ProcessHandle {
    pub(crate) fn single(server: ServerHandle) -> Self {
        Self {
            inner: HandleInner::Single { server },
        }
    }

    pub(crate) fn supervisor(supervisor: SupervisorHandle) -> Self {
        Self {
            inner: HandleInner::Supervisor { supervisor },
        }
    }

    pub(crate) fn worker(server: ServerHandle) -> Self {
        Self {
            inner: HandleInner::Worker { server },
        }
    }

    /// The role this process plays in the topology.
    #[must_use]
    pub fn role(&self) -> Role {
        match &self.inner {
            HandleInner::Single { .. } => Role::Single,
            HandleInner::Supervisor { .. } => Role::Supervisor,
            HandleInner::Worker { .. } => Role::Worker,
        }
    }

    /// The bound listen address. `None` for the supervisor, which serves no
    /// requests itself.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.inner {
            HandleInner::Single { server } | HandleInner::Worker { server } => {
                Some(server.local_addr())
            },
            HandleInner::Supervisor { .. } => None,
        }
    }

    /// Close this process's part of the topology.
    ///
    /// - Single: stop accepting, drain in-flight requests, return once the
    ///   server has fully closed. New connection attempts are refused at the
    ///   OS level from the moment the listener is gone.
    /// - Worker: same as single, then the worker process exits with code 0.
    /// - Supervisor: stop every live worker (each drains and exits); the
    ///   supervisor loop then terminates this process with the last
    ///   worker's exit code.
    pub async fn close(self) {
        match self.inner {
            HandleInner::Single { mut server } => {
                server.trigger_shutdown();
                server.closed().await;
            },
            HandleInner::Worker { mut server } => {
                server.trigger_shutdown();
                server.closed().await;
                std::process::exit(0);
            },
            HandleInner::Supervisor { supervisor } => {
                supervisor.shutdown().await;
            },
        }
    }

    /// Run until serving ends: for single-process and worker handles, until
    /// the server shuts down (close, SIGTERM, or SIGINT); for the
    /// supervisor, until the supervisor loop terminates the process.
    pub async fn wait(self) {
        match self.inner {
            HandleInner::Single { server } | HandleInner::Worker { server } => {
                server.wait().await;
            },
            HandleInner::Supervisor { supervisor } => {
                supervisor.wait().await;
            },
        }
    }
}
