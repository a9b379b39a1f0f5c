//! The SIGCHLD reaper against real child processes.
//!
//! Kept in its own test binary: the handler reaps every child of the
//! process, which would race `Command::output` elsewhere.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use stagehand_core::process::{
    ExitRecord, Pid, drain_exits, install_child_reaper, spawn_detached, terminate_process,
};

fn wait_for_exit(pid: Pid, seen: &mut Vec<ExitRecord>) -> Option<ExitRecord> {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        seen.extend(drain_exits());
        if let Some(record) = seen.iter().find(|r| r.pid == pid) {
            return Some(*record);
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    None
}

fn bin(name: &str) -> PathBuf {
    which::which(name).unwrap()
}

#[test]
fn test_reaper_reports_normal_and_signalled_exits() {
    install_child_reaper().unwrap();
    // Second install is a no-op.
    install_child_reaper().unwrap();

    let mut seen = Vec::new();

    let clean = spawn_detached(&bin("false"), "").unwrap();
    let record = wait_for_exit(clean, &mut seen).expect("exit of `false` not reaped");
    assert!(!record.abnormal, "a non-zero exit code is not a crash");

    let sleeper = spawn_detached(&bin("sleep"), "30").unwrap();
    terminate_process(sleeper).unwrap();
    let record = wait_for_exit(sleeper, &mut seen).expect("terminated sleep not reaped");
    assert!(record.abnormal);
}
