pub mod errors;
pub mod operations;
pub mod reaper;
pub mod spawner;
pub mod types;

pub use errors::ProcessError;
pub use operations::{is_process_running, signal_process, spawn_detached, terminate_process};
pub use reaper::{drain_exits, install_child_reaper};
pub use spawner::{Spawner, SystemSpawner};
pub use types::{ExitRecord, Pid};
