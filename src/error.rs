//! Error types for topology establishment.
//!
//! This module provides structured errors for the topology controller and
//! transport binder. Worker death is deliberately absent: a worker exiting is
//! an expected event consumed by the supervisor loop, not an error.

use std::net::SocketAddr;

use crate::constants;

/// Result type for topology operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Topology errors with structured context.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Worker count of zero was requested. Raised before any socket or
    /// process activity.
    #[error("invalid topology: worker count must be at least 1 (got {count})")]
    InvalidTopology { count: usize },

    /// The listen address could not be bound (typically the port is already
    /// in use). Never retried; propagated to the `establish` caller.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Transport credential material was malformed or unreadable. Raised by
    /// the transport binder before the socket is opened.
    #[error("invalid transport credentials: {reason}")]
    Credentials { reason: String },

    /// The supervisor failed to spawn a worker process.
    #[error("failed to spawn worker process: {source}")]
    SpawnWorker {
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn bind(addr: SocketAddr, source: std::io::Error) -> Self {
        Self::Bind { addr, source }
    }

    pub(crate) fn credentials(reason: impl Into<String>) -> Self {
        Self::Credentials {
            reason: reason.into(),
        }
    }

    /// Process exit code for this error.
    ///
    /// Bind-time failures get a dedicated code so a supervisor observing the
    /// exit of a worker can tell a port race from an ordinary crash.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Bind { .. } | Self::Credentials { .. } => constants::BIND_FAILURE_EXIT_CODE,
            _ => 1,
        }
    }
}
