//! Worker process spawning.
//!
//! Workers are new OS processes re-executing the current binary with the
//! same arguments plus the worker environment marker. Each spawned process
//! re-enters the topology code path, observes the marker, and takes the
//! worker role - there is no separate worker executable.

use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::debug;

use crate::constants;
use crate::error::{Error, Result};

/// Spawn `count` worker processes.
///
/// Stdio is inherited so worker logs interleave with the supervisor's.
///
/// # Errors
///
/// Returns [`Error::SpawnWorker`] if the current executable path cannot be
/// determined or a process fails to spawn. Workers spawned before the
/// failure are left running; the caller decides what to do with them.
pub(crate) fn spawn_workers(count: usize) -> Result<Vec<Child>> {
    let current_exe = std::env::current_exe().map_err(|e| Error::SpawnWorker { source: e })?;
    let args: Vec<std::ffi::OsString> = std::env::args_os().skip(1).collect();

    let mut children = Vec::with_capacity(count);
    for index in 0..count {
        let child = Command::new(&current_exe)
            .args(&args)
            .env(constants::ENV_WORKER, "1")
            .env(constants::ENV_WORKER_INDEX, index.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::SpawnWorker { source: e })?;

        debug!(index, pid = child.id(), "spawned worker process");
        children.push(child);
    }

    Ok(children)
}
