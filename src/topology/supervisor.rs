//! Supervisor loop: worker live-set bookkeeping and exit observation.
//!
//! Runs only inside the supervisor process. One task per child awaits its
//! exit and forwards a [`WorkerExit`] event into a channel; a single
//! consumer task processes events strictly sequentially, shrinks the pool,
//! and terminates the supervisor process with the last observed exit code
//! once the pool is empty.
//!
//! There is no restart policy: a dead worker permanently shrinks the pool
//! until the whole system is restarted by an external process manager.

use std::collections::HashSet;
use std::process::ExitStatus;

use serde::Deserialize;
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::constants;
use crate::server::ShutdownSignals;

/// Supervisor reaction to a worker that exits with the bind-failure code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindFailurePolicy {
    /// The pool shrinks and the remaining workers keep serving.
    #[default]
    Shrink,
    /// The remaining workers are stopped and the supervisor exits with the
    /// bind-failure code: a port race at startup fails the whole topology.
    Abort,
}

/// A worker-exit event as observed by the supervisor.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkerExit {
    pub(crate) pid: u32,
    pub(crate) code: Option<i32>,
    pub(crate) signal: Option<i32>,
}

impl WorkerExit {
    fn from_status(pid: u32, status: &ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            pid,
            code: status.code(),
            signal,
        }
    }

    /// Exit code as the pool records it. A signal-killed worker has no code
    /// and counts as 0.
    fn effective_code(&self) -> i32 {
        self.code.unwrap_or(0)
    }
}

/// Pool state after an exit has been recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PoolState {
    Running { remaining: usize },
    Terminated { last_code: i32 },
}

/// The set of live workers, owned solely by the supervisor loop.
///
/// Shrinks monotonically: pids are inserted once at startup and only ever
/// removed. Once empty it never regrows.
#[derive(Debug, Default)]
pub(crate) struct WorkerPool {
    live: HashSet<u32>,
    last_code: i32,
}

impl WorkerPool {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, pid: u32) {
        self.live.insert(pid);
    }

    pub(crate) fn live_pids(&self) -> Vec<u32> {
        self.live.iter().copied().collect()
    }

    /// Record one worker exit. An unknown pid leaves the pool untouched.
    pub(crate) fn record_exit(&mut self, pid: u32, code: i32) -> PoolState {
        if self.live.remove(&pid) {
            self.last_code = code;
        }
        if self.live.is_empty() {
            PoolState::Terminated {
                last_code: self.last_code,
            }
        } else {
            PoolState::Running {
                remaining: self.live.len(),
            }
        }
    }
}

enum SupervisorCommand {
    Shutdown,
}

/// Handle held by the supervisor's [`ProcessHandle`](crate::ProcessHandle).
pub(crate) struct SupervisorHandle {
    cmd_tx: mpsc::Sender<SupervisorCommand>,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    /// Ask the loop to stop every live worker. Each worker drains and exits;
    /// the loop then terminates the supervisor process as usual.
    pub(crate) async fn shutdown(&self) {
        let _ = self.cmd_tx.send(SupervisorCommand::Shutdown).await;
    }

    /// Runs until the supervisor loop ends. In practice the loop exits the
    /// process once the pool empties, so this pends until then.
    pub(crate) async fn wait(self) {
        let _ = self.task.await;
    }
}

/// Start supervising the given children.
pub(crate) fn spawn(children: Vec<Child>, quiet: bool, policy: BindFailurePolicy) -> SupervisorHandle {
    let (exit_tx, exit_rx) = mpsc::channel(constants::EXIT_EVENT_CHANNEL_BOUND);
    let (cmd_tx, cmd_rx) = mpsc::channel(1);

    let mut pool = WorkerPool::new();
    for mut child in children {
        // id() is Some for a freshly spawned, unreaped child.
        let pid = child.id().unwrap_or(0);
        pool.insert(pid);

        let exit_tx = exit_tx.clone();
        tokio::spawn(async move {
            let exit = match child.wait().await {
                Ok(status) => WorkerExit::from_status(pid, &status),
                Err(e) => {
                    warn!(pid, error = %e, "failed to wait for worker");
                    WorkerExit {
                        pid,
                        code: Some(1),
                        signal: None,
                    }
                },
            };
            let _ = exit_tx.send(exit).await;
        });
    }
    drop(exit_tx);

    let task = tokio::spawn(supervise(pool, exit_rx, cmd_rx, quiet, policy));

    SupervisorHandle { cmd_tx, task }
}

/// The control loop proper. Exit events and shutdown commands are handled
/// one at a time on this single task; no other code mutates the pool.
async fn supervise(
    mut pool: WorkerPool,
    mut exit_rx: mpsc::Receiver<WorkerExit>,
    mut cmd_rx: mpsc::Receiver<SupervisorCommand>,
    quiet: bool,
    policy: BindFailurePolicy,
) {
    let mut abort_code: Option<i32> = None;
    let mut signals = ShutdownSignals::install();

    loop {
        tokio::select! {
            Some(cmd) = cmd_rx.recv() => match cmd {
                SupervisorCommand::Shutdown => {
                    if !quiet {
                        info!(workers = pool.live_pids().len(), "stopping worker pool");
                    }
                    signal_workers(&pool.live_pids());
                },
            },

            // A signal to the supervisor stops the pool the same way an
            // explicit close does; each worker drains and exits.
            () = signals.recv() => {
                if !quiet {
                    info!(workers = pool.live_pids().len(), "stopping worker pool");
                }
                signal_workers(&pool.live_pids());
            },

            event = exit_rx.recv() => match event {
                Some(exit) => {
                    if !quiet {
                        info!(
                            pid = exit.pid,
                            code = ?exit.code,
                            signal = ?exit.signal,
                            "worker exited"
                        );
                    }

                    match pool.record_exit(exit.pid, exit.effective_code()) {
                        PoolState::Terminated { last_code } => {
                            let code = abort_code.unwrap_or(last_code);
                            if !quiet {
                                info!(pid = std::process::id(), code, "supervisor terminating");
                            }
                            std::process::exit(code);
                        },
                        PoolState::Running { remaining } => {
                            debug!(remaining, "worker pool shrunk");

                            if policy == BindFailurePolicy::Abort
                                && exit.code == Some(constants::BIND_FAILURE_EXIT_CODE)
                                && abort_code.is_none()
                            {
                                warn!(
                                    pid = exit.pid,
                                    "worker failed to bind, stopping remaining workers"
                                );
                                abort_code = Some(constants::BIND_FAILURE_EXIT_CODE);
                                signal_workers(&pool.live_pids());
                            }
                        },
                    }
                },
                // Every exit sender is gone; nothing left to observe.
                None => break,
            },
        }
    }
}

#[cfg(unix)]
fn signal_workers(pids: &[u32]) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    for &pid in pids {
        if pid == 0 {
            continue;
        }
        match kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            Ok(()) => debug!(pid, "sent SIGTERM to worker"),
            Err(e) => warn!(pid, error = %e, "failed to signal worker"),
        }
    }
}

#[cfg(not(unix))]
fn signal_workers(pids: &[u32]) {
    // No SIGTERM equivalent; workers notice the shutdown when the
    // supervisor exits.
    debug!(workers = pids.len(), "worker signaling is unix-only");
}
