//! SIGCHLD reaper.
//!
//! The handler runs in signal context, so it only calls `waitpid` and pushes
//! into a fixed-capacity lock-free ring. The main loop drains the ring with
//! [`drain_exits`] and does all the bookkeeping there.
//!
//! The ring is single-producer (the handler, which the kernel never re-enters
//! for the same signal) and single-consumer (the main loop).

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use nix::errno::Errno;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use tracing::{info, warn};

use crate::process::errors::ProcessError;
use crate::process::types::{ExitRecord, Pid};

/// Power of two so that slot lookup is a mask.
pub const RING_CAPACITY: usize = 256;
const MASK: usize = RING_CAPACITY - 1;

pub struct ExitRing {
    slots: [AtomicU64; RING_CAPACITY],
    head: AtomicUsize,
    tail: AtomicUsize,
    dropped: AtomicUsize,
}

impl ExitRing {
    pub const fn new() -> Self {
        Self {
            slots: [const { AtomicU64::new(0) }; RING_CAPACITY],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Producer side. Async-signal-safe: atomics only, no allocation.
    pub fn push(&self, record: ExitRecord) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail.wrapping_sub(head) >= RING_CAPACITY {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        let packed = ((record.pid.as_u32() as u64) << 1) | record.abnormal as u64;
        self.slots[tail & MASK].store(packed, Ordering::Relaxed);
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        true
    }

    /// Consumer side.
    pub fn pop(&self) -> Option<ExitRecord> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        let packed = self.slots[head & MASK].load(Ordering::Relaxed);
        self.head.store(head.wrapping_add(1), Ordering::Release);
        Some(ExitRecord {
            pid: Pid::from_raw((packed >> 1) as u32),
            abnormal: packed & 1 == 1,
        })
    }

    /// Records lost because the ring was full, reset on read.
    pub fn take_dropped(&self) -> usize {
        self.dropped.swap(0, Ordering::Relaxed)
    }
}

impl Default for ExitRing {
    fn default() -> Self {
        Self::new()
    }
}

static EXITS: ExitRing = ExitRing::new();
static INSTALLED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigchld(_: nix::libc::c_int) {
    let saved = Errno::last_raw();
    loop {
        match waitpid(nix::unistd::Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(pid, _)) => {
                EXITS.push(ExitRecord {
                    pid: Pid::from_raw(pid.as_raw() as u32),
                    abnormal: false,
                });
            }
            Ok(WaitStatus::Signaled(pid, _, _)) => {
                EXITS.push(ExitRecord {
                    pid: Pid::from_raw(pid.as_raw() as u32),
                    abnormal: true,
                });
            }
            Ok(WaitStatus::StillAlive) | Err(_) => break,
            Ok(_) => continue,
        }
    }
    Errno::set_raw(saved);
}

/// Install the SIGCHLD handler. Calling it again is a no-op.
pub fn install_child_reaper() -> Result<(), ProcessError> {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return Ok(());
    }

    let action = SigAction::new(
        SigHandler::Handler(on_sigchld),
        SaFlags::SA_RESTART | SaFlags::SA_NOCLDSTOP,
        SigSet::empty(),
    );
    // SAFETY: the handler only touches atomics and async-signal-safe syscalls.
    unsafe { sigaction(Signal::SIGCHLD, &action) }.map_err(|e| {
        INSTALLED.store(false, Ordering::SeqCst);
        ProcessError::SystemError {
            message: format!("sigaction(SIGCHLD) failed: {}", e),
        }
    })?;

    info!(event = "core.process.reaper_installed");
    Ok(())
}

/// Drain every exit recorded since the last call.
pub fn drain_exits() -> Vec<ExitRecord> {
    let mut exits = Vec::new();
    while let Some(record) = EXITS.pop() {
        exits.push(record);
    }
    let dropped = EXITS.take_dropped();
    if dropped > 0 {
        warn!(event = "core.process.reaper_overflow", dropped = dropped);
    }
    exits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pid: u32, abnormal: bool) -> ExitRecord {
        ExitRecord {
            pid: Pid::from_raw(pid),
            abnormal,
        }
    }

    #[test]
    fn test_ring_fifo_order() {
        let ring = ExitRing::new();
        assert!(ring.push(record(10, false)));
        assert!(ring.push(record(11, true)));
        assert_eq!(ring.pop(), Some(record(10, false)));
        assert_eq!(ring.pop(), Some(record(11, true)));
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn test_ring_full_drops_and_counts() {
        let ring = ExitRing::new();
        for pid in 1..=RING_CAPACITY as u32 {
            assert!(ring.push(record(pid, false)));
        }
        assert!(!ring.push(record(9999, false)));
        assert_eq!(ring.take_dropped(), 1);
        assert_eq!(ring.take_dropped(), 0);
        assert_eq!(ring.pop().map(|r| r.pid.as_u32()), Some(1));
    }

    #[test]
    fn test_ring_wraps_around() {
        let ring = ExitRing::new();
        for round in 0..3 * RING_CAPACITY as u32 {
            assert!(ring.push(record(round + 1, round % 2 == 0)));
            let popped = ring.pop().unwrap();
            assert_eq!(popped.pid.as_u32(), round + 1);
            assert_eq!(popped.abnormal, round % 2 == 0);
        }
    }

    #[test]
    fn test_ring_concurrent_producer() {
        let ring = std::sync::Arc::new(ExitRing::new());
        let producer = {
            let ring = ring.clone();
            std::thread::spawn(move || {
                let mut pid = 1;
                while pid <= 1000 {
                    if ring.push(record(pid, false)) {
                        pid += 1;
                    }
                }
            })
        };
        let mut expected = 1;
        while expected <= 1000 {
            if let Some(r) = ring.pop() {
                assert_eq!(r.pid.as_u32(), expected);
                expected += 1;
            }
        }
        producer.join().unwrap();
        // Failed pushes are retried by the producer and counted as drops.
        let _ = ring.take_dropped();
    }
}
