//! Centralized constants for topology defaults and limits.
//!
//! All magic numbers in the crate should be defined here with
//! documented rationale. This enables:
//! - Tuning in one place
//! - Consistent limits across modules
//! - Easy auditing without code search

/// Default port to serve on when none is configured.
pub const DEFAULT_PORT: u16 = 3000;

/// Default worker count (single-process mode).
pub const DEFAULT_WORKERS: usize = 1;

/// Default time allowed for in-flight requests to complete during close (30 seconds).
/// Requests still running after this are abandoned, not interrupted mid-write.
pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 30;

/// Drain polling interval in milliseconds.
pub const DRAIN_POLL_INTERVAL_MS: u64 = 50;

/// Listen backlog for the bound socket.
pub const LISTEN_BACKLOG: i32 = 1024;

/// Environment marker set on spawned worker processes.
///
/// Presence of this variable is what distinguishes the worker role from the
/// supervisor role when the same binary re-enters the topology code path.
pub const ENV_WORKER: &str = "ROOST_WORKER";

/// Environment variable carrying the worker's index within the pool.
pub const ENV_WORKER_INDEX: &str = "ROOST_WORKER_INDEX";

/// Exit code used by a worker that failed to bind its port.
///
/// Distinct from a plain failure exit so the supervisor can apply
/// [`BindFailurePolicy`](crate::topology::BindFailurePolicy). Value follows
/// the sysexits EX_UNAVAILABLE convention.
pub const BIND_FAILURE_EXIT_CODE: i32 = 69;

/// Bound of the worker-exit event channel.
///
/// Exits are consumed promptly by the supervisor loop; the bound only has to
/// cover a burst of simultaneous worker deaths.
pub const EXIT_EVENT_CHANNEL_BOUND: usize = 64;
