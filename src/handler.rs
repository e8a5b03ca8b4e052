//! The request-handler seam.
//!
//! The topology core treats request handling as an opaque collaborator: it
//! never inspects methods, paths, or bodies. Anything that can turn a hyper
//! request into a response can be served, whether single-process or across a
//! worker pool.
//!
//! Handlers are infallible at this seam; failures are encoded as HTTP
//! statuses by the handler itself.
//!
//! # Examples
//!
//! ```no_run
//! use bytes::Bytes;
//! use http_body_util::Full;
//! use hyper::{body::Incoming, Request, Response};
//!
//! async fn hello(_req: Request<Incoming>) -> Response<Full<Bytes>> {
//!     Response::new(Full::new(Bytes::from_static(b"hello")))
//! }
//!
//! # async fn example() -> roost::Result<()> {
//! let handle = roost::Topology::new(3000).establish(hello).await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response};

/// Boxed response future returned by [`RequestHandler::handle`].
pub type HandlerFuture = Pin<Box<dyn Future<Output = Response<Full<Bytes>>> + Send>>;

/// An opaque request handler.
///
/// Implemented automatically for `Fn(Request<Incoming>) -> impl Future`
/// closures, so plain async functions satisfy the contract.
pub trait RequestHandler: Send + Sync + 'static {
    /// Produce a response for one request.
    fn handle(&self, req: Request<Incoming>) -> HandlerFuture;
}

impl<F, Fut> RequestHandler for F
where
    F: Fn(Request<Incoming>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response<Full<Bytes>>> + Send + 'static,
{
    fn handle(&self, req: Request<Incoming>) -> HandlerFuture {
        Box::pin((self)(req))
    }
}

/// Shared, clonable reference to a handler, handed to each connection task.
pub(crate) type SharedHandler = Arc<dyn RequestHandler>;
