use std::time::Duration;

/// Pressure classification, recomputed from scratch every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum MemoryState {
    #[default]
    Normal,
    Low,
    Critical,
}

impl MemoryState {
    /// Poll interval following a reading in this state.
    pub fn poll_interval(&self) -> Duration {
        match self {
            MemoryState::Normal => Duration::from_millis(4000),
            MemoryState::Low => Duration::from_millis(3000),
            MemoryState::Critical => Duration::from_millis(2000),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryState::Normal => "normal",
            MemoryState::Low => "low",
            MemoryState::Critical => "critical",
        }
    }
}

/// System memory totals in kB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemInfo {
    pub total: u64,
    pub free: u64,
    pub buffers: u64,
    pub cached: u64,
}

impl MemInfo {
    /// `(buffers + cached) / total`, zero when the total is unknown.
    pub fn used_fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.buffers + self.cached) as f64 / self.total as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryThresholds {
    pub mem_low: f64,
    pub mem_critical: f64,
    /// Page-fault deltas per tick.
    pub pg_low: u64,
    pub pg_critical: u64,
}

impl Default for MemoryThresholds {
    fn default() -> Self {
        Self {
            mem_low: 0.75,
            mem_critical: 0.9,
            pg_low: 10,
            pg_critical: 30,
        }
    }
}
