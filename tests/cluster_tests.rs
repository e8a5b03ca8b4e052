//! Worker-pool topology tests.
//!
//! These drive the real `roost` binary: the supervisor re-executes its own
//! executable for workers, so pool topologies cannot be established from
//! inside the test harness itself. Cargo builds the binary and exposes it
//! via `CARGO_BIN_EXE_roost`.

#![cfg(unix)]

#[path = "common.rs"]
mod common;

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

fn roost_bin() -> tokio::process::Command {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_roost"))
}

/// Extract the serving pid from the built-in status responder's body
/// (`roost: serving from pid N`).
fn pid_from_body(body: &str) -> Option<u32> {
    body.trim().rsplit(' ').next()?.parse().ok()
}

#[tokio::test]
async fn pool_serves_from_multiple_processes_and_stops_on_sigterm() {
    const PORT: u16 = 3050;

    let mut supervisor = roost_bin()
        .args(["--port", "3050", "--workers", "3"])
        .spawn()
        .expect("spawn supervisor");
    let supervisor_pid = supervisor.id().expect("fresh child has a pid");

    // Workers come up asynchronously; poll until at least two distinct
    // worker pids have answered. Kernel accept distribution is best-effort,
    // so each probe uses a fresh connection.
    let deadline = Instant::now() + Duration::from_secs(20);
    let mut seen_pids: HashSet<u32> = HashSet::new();
    while Instant::now() < deadline && seen_pids.len() < 2 {
        if let Ok(response) = common::fresh_client()
            .get(format!("http://{}:{PORT}/", Ipv4Addr::LOCALHOST))
            .send()
            .await
        {
            if let Ok(body) = response.text().await {
                if let Some(pid) = pid_from_body(&body) {
                    seen_pids.insert(pid);
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    assert!(
        seen_pids.len() >= 2,
        "expected requests to be served by multiple worker processes, saw {seen_pids:?}"
    );
    assert!(
        !seen_pids.contains(&supervisor_pid),
        "the supervisor must not serve requests itself"
    );

    // Stopping the supervisor stops the pool: workers drain, exit 0, and
    // the supervisor exits with the last worker's code.
    kill(Pid::from_raw(supervisor_pid as i32), Signal::SIGTERM).expect("signal supervisor");

    let status = tokio::time::timeout(Duration::from_secs(20), supervisor.wait())
        .await
        .expect("supervisor exits after its workers")
        .expect("wait");
    assert_eq!(status.code(), Some(0));

    let err = common::fresh_client()
        .get(format!("http://{}:{PORT}/", Ipv4Addr::LOCALHOST))
        .send()
        .await
        .expect_err("stopped pool must refuse connections");
    assert!(err.is_connect(), "expected connection refusal, got: {err}");
}

#[tokio::test]
async fn occupied_port_surfaces_the_bind_failure_code() {
    // Hold the port without SO_REUSEPORT so every worker loses the bind.
    let holder = tokio::net::TcpListener::bind((Ipv4Addr::UNSPECIFIED, 3051))
        .await
        .expect("occupy port");

    let mut supervisor = roost_bin()
        .args([
            "--port",
            "3051",
            "--workers",
            "2",
            "--quiet",
            "--abort-on-bind-failure",
        ])
        .spawn()
        .expect("spawn supervisor");

    let status = tokio::time::timeout(Duration::from_secs(20), supervisor.wait())
        .await
        .expect("supervisor exits once its workers failed to bind")
        .expect("wait");
    assert_eq!(
        status.code(),
        Some(roost::constants::BIND_FAILURE_EXIT_CODE),
        "bind-time worker failure must be distinguishable by exit code"
    );

    drop(holder);
}
