//! Memory pressure policy.
//!
//! Each tick starts from Normal, then the memory fraction and the major-fault
//! delta can each escalate the state. The delta only counts processes that
//! were sampled on the previous tick as well. The caller reschedules the poll timer
//! from [`MemoryMonitor::interval`] after every tick.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::memory::sampler::MemorySampler;
use crate::memory::types::{MemInfo, MemoryState, MemoryThresholds};
use crate::process::Pid;

pub struct MemoryMonitor {
    sampler: Box<dyn MemorySampler>,
    thresholds: MemoryThresholds,
    state: MemoryState,
    last_faults: HashMap<Pid, u64>,
}

impl MemoryMonitor {
    pub fn new(sampler: Box<dyn MemorySampler>, thresholds: MemoryThresholds) -> Self {
        Self {
            sampler,
            thresholds,
            state: MemoryState::Normal,
            last_faults: HashMap::new(),
        }
    }

    pub fn state(&self) -> MemoryState {
        self.state
    }

    pub fn thresholds(&self) -> MemoryThresholds {
        self.thresholds
    }

    pub fn set_thresholds(&mut self, thresholds: MemoryThresholds) {
        self.thresholds = thresholds;
    }

    pub fn interval(&self) -> Duration {
        self.state.poll_interval()
    }

    /// Sample and classify. Returns the state when it is not Normal.
    pub fn tick(&mut self, pids: &[Pid]) -> Option<MemoryState> {
        self.state = MemoryState::Normal;

        match self.sampler.meminfo() {
            Ok(info) => {
                self.state = self.state.max(self.classify_memory(&info));
            }
            Err(e) => {
                warn!(event = "core.memory.sample_failed", error = %e);
            }
        }

        let mut faults = HashMap::with_capacity(pids.len());
        let mut delta = 0u64;
        for pid in pids {
            let Some(count) = self.sampler.page_faults(*pid) else {
                continue;
            };
            if let Some(last) = self.last_faults.get(pid) {
                delta = delta.saturating_add(count.saturating_sub(*last));
            }
            faults.insert(*pid, count);
        }
        self.last_faults = faults;
        self.state = self.state.max(self.classify_faults(delta));

        if self.state == MemoryState::Normal {
            debug!(event = "core.memory.tick_completed", faults_delta = delta);
            return None;
        }
        info!(
            event = "core.memory.state_changed",
            state = self.state.as_str(),
            faults_delta = delta
        );
        Some(self.state)
    }

    fn classify_memory(&self, info: &MemInfo) -> MemoryState {
        let used = info.used_fraction();
        if used >= self.thresholds.mem_critical {
            MemoryState::Critical
        } else if used >= self.thresholds.mem_low {
            MemoryState::Low
        } else {
            MemoryState::Normal
        }
    }

    fn classify_faults(&self, delta: u64) -> MemoryState {
        if delta >= self.thresholds.pg_critical {
            MemoryState::Critical
        } else if delta >= self.thresholds.pg_low {
            MemoryState::Low
        } else {
            MemoryState::Normal
        }
    }
}
