//! Common test utilities for integration tests.
//!
//! Provides handlers with known routes, HTTP(S) clients that do not pool
//! connections across assertions, and self-signed credentials for TLS
//! tests.

#![allow(dead_code)] // Each test binary uses its own subset of helpers

use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};

use roost::TransportCredentials;

/// Build a plain-text response.
pub fn text(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}

/// Handler with a small fixed route table:
/// GET `/` and GET `/getTest` and POST `/postTest` respond 200, everything
/// else 404. Methods are significant: GET on `/postTest` is not routed.
pub async fn routed(req: Request<Incoming>) -> Response<Full<Bytes>> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/") => text(StatusCode::OK, "hello"),
        (&Method::GET, "/getTest") | (&Method::POST, "/postTest") => text(StatusCode::OK, "OK"),
        _ => text(StatusCode::NOT_FOUND, "not found"),
    }
}

/// Handler that takes 500ms to respond; long enough to be mid-flight when a
/// test triggers close, short enough to keep the suite fast.
pub async fn slow(_req: Request<Incoming>) -> Response<Full<Bytes>> {
    tokio::time::sleep(Duration::from_millis(500)).await;
    text(StatusCode::OK, "slow done")
}

/// Handler that outlives any reasonable drain timeout.
pub async fn stuck(_req: Request<Incoming>) -> Response<Full<Bytes>> {
    tokio::time::sleep(Duration::from_secs(30)).await;
    text(StatusCode::OK, "finally")
}

/// A client with no pooled connections, so every request opens a fresh
/// socket. Required when asserting connection refusal after close: a pooled
/// keep-alive connection is not a new connection attempt.
pub fn fresh_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .connect_timeout(Duration::from_secs(5))
        .build()
        .expect("client")
}

/// Like [`fresh_client`], but trusting any certificate. The test
/// credentials are self-signed.
pub fn https_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .connect_timeout(Duration::from_secs(5))
        .danger_accept_invalid_certs(true)
        .build()
        .expect("client")
}

/// Self-signed credentials for `localhost`.
pub fn self_signed_credentials() -> TransportCredentials {
    let rcgen::CertifiedKey { cert, key_pair } =
        rcgen::generate_simple_self_signed(vec!["localhost".to_owned()]).expect("self-signed cert");
    TransportCredentials::new(cert.pem(), key_pair.serialize_pem())
}
