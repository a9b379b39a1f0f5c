//! Memory pressure sampling and classification.

pub mod errors;
pub mod monitor;
pub mod sampler;
pub mod types;

pub use errors::MemoryError;
pub use monitor::MemoryMonitor;
pub use sampler::{MemorySampler, ProcSampler};
pub use types::{MemInfo, MemoryState, MemoryThresholds};
