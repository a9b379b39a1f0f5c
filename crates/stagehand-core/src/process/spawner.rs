//! The seam between the application manager and the operating system.

use std::path::Path;

use crate::process::errors::ProcessError;
use crate::process::operations;
use crate::process::types::Pid;

/// Starts and signals client processes.
pub trait Spawner: Send + Sync {
    fn spawn(&self, exec: &Path, args: &str) -> Result<Pid, ProcessError>;

    /// Request termination. Must not wait for the process to exit.
    fn terminate(&self, pid: Pid) -> Result<(), ProcessError>;

    fn is_alive(&self, pid: Pid) -> bool;
}

/// Real processes: `fork`/`exec` in a new process group, SIGTERM to stop.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSpawner;

impl Spawner for SystemSpawner {
    fn spawn(&self, exec: &Path, args: &str) -> Result<Pid, ProcessError> {
        operations::spawn_detached(exec, args)
    }

    fn terminate(&self, pid: Pid) -> Result<(), ProcessError> {
        operations::terminate_process(pid)
    }

    fn is_alive(&self, pid: Pid) -> bool {
        operations::is_process_running(pid)
    }
}
