//! Single-process topology tests.
//!
//! A worker count of 1 serves in-process: no supervisor, no children, one
//! bound listener whose close makes the port refuse connections.

#[path = "common.rs"]
mod common;

use std::net::Ipv4Addr;

use roost::{Error, Role, Topology};

#[tokio::test]
async fn serves_then_close_refuses_connections() {
    let handle = Topology::new(3031)
        .host(Ipv4Addr::LOCALHOST)
        .quiet(true)
        .establish(common::routed)
        .await
        .expect("establish");

    assert_eq!(handle.role(), Role::Single);
    let addr = handle.local_addr().expect("single mode has an address");

    let response = common::fresh_client()
        .get(format!("http://{addr}/"))
        .send()
        .await
        .expect("request against live server");
    assert_eq!(response.status(), 200);

    handle.close().await;

    let err = common::fresh_client()
        .get(format!("http://{addr}/"))
        .send()
        .await
        .expect_err("closed port must refuse");
    assert!(err.is_connect(), "expected connection refusal, got: {err}");
}

#[tokio::test]
async fn routes_respect_methods() {
    let handle = Topology::new(3030)
        .host(Ipv4Addr::LOCALHOST)
        .quiet(true)
        .establish(common::routed)
        .await
        .expect("establish");
    let addr = handle.local_addr().unwrap();
    let client = common::fresh_client();

    let response = client
        .get(format!("http://{addr}/getTest"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");

    let response = client
        .post(format!("http://{addr}/postTest"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");

    // GET must not be routed to the POST handler.
    let response = client
        .get(format!("http://{addr}/postTest"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    handle.close().await;
}

#[tokio::test]
async fn ephemeral_port_reports_the_bound_address() {
    let handle = Topology::new(0)
        .host(Ipv4Addr::LOCALHOST)
        .quiet(true)
        .establish(common::routed)
        .await
        .expect("establish");

    let addr = handle.local_addr().unwrap();
    assert_ne!(addr.port(), 0);

    let response = common::fresh_client()
        .get(format!("http://{addr}/"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.text().await.unwrap(), "hello");

    handle.close().await;
}

#[tokio::test]
async fn zero_workers_fails_before_any_socket_opens() {
    let err = Topology::new(3033)
        .host(Ipv4Addr::LOCALHOST)
        .workers(0)
        .establish(common::routed)
        .await
        .expect_err("zero workers is invalid");
    assert!(matches!(err, Error::InvalidTopology { count: 0 }));

    // Nothing was bound: the port is still free for us.
    let probe = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 3033)).await;
    assert!(probe.is_ok(), "no socket may be opened for an invalid topology");
}

#[tokio::test]
async fn occupied_port_is_a_bind_error() {
    let holder = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .unwrap();
    let taken = holder.local_addr().unwrap();

    let err = Topology::new(taken.port())
        .host(Ipv4Addr::LOCALHOST)
        .quiet(true)
        .establish(common::routed)
        .await
        .expect_err("port is taken");
    assert!(matches!(err, Error::Bind { .. }));
}
