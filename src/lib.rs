// =============================================================================
// Lint Configuration
// =============================================================================

// Safety: no unsafe anywhere in this crate
#![deny(unsafe_code)]
// Correctness: must handle all fallible operations
#![deny(unused_must_use)]
// Quality: pedantic but pragmatic
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(rust_2018_idioms)]
#![warn(unreachable_pub)]
// Allowed with documented reasons
#![allow(clippy::missing_errors_doc)] // Error returns self-documenting via type
#![allow(clippy::module_name_repetitions)] // e.g., topology::BindFailurePolicy is clearer
#![allow(clippy::must_use_candidate)] // Not all returned values need annotation
#![allow(clippy::cast_possible_wrap)] // Intentional in pid conversions for signaling

//! Serve one logical HTTP service as a single process or a supervised pool
//! of worker processes sharing one listening port.
//!
//! The topology is chosen by the requested worker count: 1 serves
//! in-process, N > 1 makes the calling process a supervisor that spawns N
//! workers re-executing the same binary. Every worker binds the identical
//! port with `SO_REUSEPORT` and the kernel distributes connections across
//! the pool. Whatever the topology, the caller gets one uniform
//! [`ProcessHandle`] for orderly shutdown.
//!
//! Request handling itself is an opaque collaborator: anything implementing
//! [`RequestHandler`] (plain async functions qualify) can be served, over
//! plaintext or TLS ([`TransportCredentials`]).
//!
//! # Example
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
//! // Four workers sharing port 3000, supervised by this process.
//! let handle = Topology::new(3000).workers(4).establish(handler).await?;
//! handle.wait().await;
//! # Ok(())
//! # }
//! ```

/// Configuration types for the CLI (TOML file loading and validation).
pub mod config;

/// Centralized constants for defaults, limits, and exit codes.
pub mod constants;

mod error;
mod handle;
mod handler;

/// Logging initialization for the binary.
pub mod logging;

mod server;

/// Topology controller and supervision.
pub mod topology;

pub use error::{Error, Result};
pub use handle::ProcessHandle;
pub use handler::{HandlerFuture, RequestHandler};
pub use server::tls::TransportCredentials;
pub use topology::{BindFailurePolicy, Role, Topology};
