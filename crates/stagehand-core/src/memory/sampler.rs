//! Readers for the kernel memory and per-process fault counters.

use std::path::PathBuf;

use crate::memory::errors::MemoryError;
use crate::memory::types::MemInfo;
use crate::process::Pid;

pub trait MemorySampler: Send {
    fn meminfo(&self) -> Result<MemInfo, MemoryError>;

    /// Cumulative major faults of `pid`, `None` if it is gone.
    fn page_faults(&self, pid: Pid) -> Option<u64>;
}

/// Samples from a procfs mount.
#[derive(Debug, Clone)]
pub struct ProcSampler {
    root: PathBuf,
}

impl ProcSampler {
    pub fn new() -> Self {
        Self::with_root("/proc")
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for ProcSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySampler for ProcSampler {
    fn meminfo(&self) -> Result<MemInfo, MemoryError> {
        let path = self.root.join("meminfo");
        let content = std::fs::read_to_string(&path).map_err(|e| MemoryError::ReadFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        parse_meminfo(&content).ok_or_else(|| MemoryError::Malformed {
            path: path.display().to_string(),
            message: "MemTotal missing".to_string(),
        })
    }

    fn page_faults(&self, pid: Pid) -> Option<u64> {
        let path = self.root.join(pid.to_string()).join("stat");
        let content = std::fs::read_to_string(path).ok()?;
        parse_stat_major_faults(&content)
    }
}

pub fn parse_meminfo(content: &str) -> Option<MemInfo> {
    let mut info = MemInfo::default();
    let mut has_total = false;
    for line in content.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let Some(value) = rest.split_whitespace().next().and_then(|v| v.parse().ok()) else {
            continue;
        };
        match key {
            "MemTotal" => {
                info.total = value;
                has_total = true;
            }
            "MemFree" => info.free = value,
            "Buffers" => info.buffers = value,
            "Cached" => info.cached = value,
            _ => {}
        }
    }
    has_total.then_some(info)
}

/// `majflt` from a `/proc/<pid>/stat` line.
///
/// Minor faults are ordinary page-cache hits and are ignored. The command
/// name may contain spaces and parentheses, so fields are counted from the
/// last `)`.
pub fn parse_stat_major_faults(content: &str) -> Option<u64> {
    let (_, rest) = content.rsplit_once(')')?;
    let fields: Vec<&str> = rest.split_whitespace().collect();
    // rest starts at field 3 (state); majflt is field 12.
    fields.get(9)?.parse().ok()
}
