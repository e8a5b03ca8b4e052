//! Encrypted-transport tests.
//!
//! Credentials select the transport wrapper; the handler and its responses
//! are identical over plaintext and TLS, and a closed TLS port refuses
//! connections exactly like a plaintext one.

#[path = "common.rs"]
mod common;

use std::net::Ipv4Addr;

use roost::{Error, Topology, TransportCredentials};

#[tokio::test]
async fn tls_serves_the_same_body_as_plaintext() {
    let plain = Topology::new(0)
        .host(Ipv4Addr::LOCALHOST)
        .quiet(true)
        .establish(common::routed)
        .await
        .expect("establish plaintext");
    let plain_addr = plain.local_addr().unwrap();

    let plain_body = common::fresh_client()
        .get(format!("http://{plain_addr}/getTest"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let encrypted = Topology::new(0)
        .host(Ipv4Addr::LOCALHOST)
        .quiet(true)
        .credentials(common::self_signed_credentials())
        .establish(common::routed)
        .await
        .expect("establish TLS");
    let tls_port = encrypted.local_addr().unwrap().port();

    let response = common::https_client()
        .get(format!("https://localhost:{tls_port}/getTest"))
        .send()
        .await
        .expect("TLS request");
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), plain_body);

    encrypted.close().await;

    let err = common::https_client()
        .get(format!("https://localhost:{tls_port}/getTest"))
        .send()
        .await
        .expect_err("closed TLS port must refuse");
    assert!(err.is_connect(), "expected connection refusal, got: {err}");

    plain.close().await;
}

#[tokio::test]
async fn plaintext_client_gets_no_response_from_tls_server() {
    let encrypted = Topology::new(0)
        .host(Ipv4Addr::LOCALHOST)
        .quiet(true)
        .credentials(common::self_signed_credentials())
        .establish(common::routed)
        .await
        .expect("establish TLS");
    let addr = encrypted.local_addr().unwrap();

    // Speaking plain HTTP to the TLS listener fails the handshake; it must
    // not be silently served.
    let result = common::fresh_client()
        .get(format!("http://{addr}/getTest"))
        .send()
        .await;
    assert!(result.is_err());

    encrypted.close().await;
}

#[tokio::test]
async fn malformed_credentials_fail_before_binding() {
    let err = Topology::new(3459)
        .host(Ipv4Addr::LOCALHOST)
        .quiet(true)
        .credentials(TransportCredentials::new("garbage", "garbage"))
        .establish(common::routed)
        .await
        .expect_err("garbage PEM is rejected");
    assert!(matches!(err, Error::Credentials { .. }));

    // The credential failure surfaced before the socket was opened.
    let probe = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 3459)).await;
    assert!(probe.is_ok());
}
