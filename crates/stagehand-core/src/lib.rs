//! stagehand-core: Compositor and application lifecycle for embedded shells
//!
//! This library decides which client application is on screen, animates the
//! transitions between applications, and keeps the registry of installed and
//! running applications in step with OS process state and window-server
//! events. It is used by the `stagehand` daemon and its CLI client.
//!
//! # Main Entry Points
//!
//! - [`apps`] - Application registry, spawning and window-event ingestion
//! - [`compositor`] - The orchestrator that owns views, switcher and slots
//! - [`notifications`] - Toast queue with tag replacement
//! - [`memory`] - Memory pressure classification
//! - [`ipc`] - Control socket server and client
//! - [`runtime`] - Main loop and timers

pub mod animation;
pub mod apps;
pub mod compositor;
pub mod config;
pub mod errors;
pub mod events;
pub mod geometry;
pub mod ipc;
pub mod logging;
pub mod memory;
pub mod notifications;
pub mod process;
pub mod runtime;
pub mod switcher;
pub mod view;

// Re-export commonly used types at crate root for convenience
pub use apps::{AppFlags, AppInfo, ApplicationManager, InstanceId, ManagerEvent, StartOutcome};
pub use compositor::{Compositor, CompositorParts, CompositorSettings, CompositorTimer};
pub use config::StageConfig;
pub use errors::{StageError, StageResult, StartupError};
pub use geometry::{Point, Rect, Size};
pub use ipc::{CompositorEvent, IpcClient, IpcServer, Method};
pub use memory::{MemoryMonitor, MemoryState};
pub use notifications::NotificationManager;
pub use process::Pid;
pub use runtime::{EventLoop, LoopEvent};
pub use switcher::SwitcherKind;

// Re-export logging initialization
pub use logging::init_logging;
