use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use sysinfo::{ProcessesToUpdate, System};
use tracing::{debug, info};

use crate::process::errors::ProcessError;
use crate::process::types::Pid;

/// Check if a process with the given PID is currently running
pub fn is_process_running(pid: Pid) -> bool {
    let mut system = System::new();
    let pid_obj = pid.to_sysinfo_pid();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid_obj]), true);
    system.process(pid_obj).is_some()
}

/// Ask a process to exit with SIGTERM.
///
/// Never waits for the process. Its record is removed once the reaper
/// reports the exit.
pub fn terminate_process(pid: Pid) -> Result<(), ProcessError> {
    signal_process(pid, Signal::SIGTERM)
}

pub fn signal_process(pid: Pid, signal: Signal) -> Result<(), ProcessError> {
    match kill(pid.to_nix_pid(), signal) {
        Ok(()) => {
            debug!(
                event = "core.process.signal_sent",
                pid = pid.as_u32(),
                signal = %signal
            );
            Ok(())
        }
        Err(Errno::ESRCH) => Err(ProcessError::NotFound { pid: pid.as_u32() }),
        Err(e) => Err(ProcessError::KillFailed {
            pid: pid.as_u32(),
            message: e.desc().to_string(),
        }),
    }
}

/// Spawn `exec` in its own process group with whitespace-separated `args`.
///
/// The child is not waited on here; the SIGCHLD reaper collects it.
pub fn spawn_detached(exec: &Path, args: &str) -> Result<Pid, ProcessError> {
    let child = Command::new(exec)
        .args(args.split_whitespace())
        .stdin(Stdio::null())
        .process_group(0)
        .spawn()
        .map_err(|e| ProcessError::SpawnFailed {
            path: exec.display().to_string(),
            message: e.to_string(),
        })?;

    let pid = Pid::from_raw(child.id());
    info!(
        event = "core.process.spawn_completed",
        exec = %exec.display(),
        pid = pid.as_u32()
    );
    Ok(pid)
}
