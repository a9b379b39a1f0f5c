use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::compositor::window_server::{WindowId, WindowInfo, WindowReconfig};
use crate::process::Pid;

bitflags! {
    /// Behaviour flags declared by an application definition.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AppFlags: u32 {
        const NO_MAINWINDOW = 0x0000_0001;
        const SPLASH_WINDOW = 0x0000_0002;
        const ALLOW_WINDOW_CONFIG = 0x0000_0004;
        const SURFACE_DONTBLOCK = 0x0000_0008;
        const ALLOW_MULTIPLE = 0x0000_0100;
        const NEEDS_CLEAR = 0x0000_0200;
        const NEEDS_BLENDING = 0x0000_0400;
        const AUTO_START = 0x0000_0800;
        const USE_BACK = 0x0000_1000;
        const VIS_NOTIFY = 0x0000_2000;
        const STATUSBAR = 0x0001_0000;
        const OSK = 0x0002_0000;
        const HOME = 0x0004_0000;
        const SYSTEM = 0x0008_0000;
    }
}

bitflags! {
    /// Hardware and service requirements.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DependencyFlags: u32 {
        const GL_3D = 0x1;
        const RC = 0x2;
        const TOUCH = 0x4;
        const NETWORK = 0x8;
    }
}

impl AppFlags {
    /// Parse a comma or space separated `APP_*` token list.
    ///
    /// `APP_NONE` clears everything accumulated so far. Statusbar and home
    /// apps are always system apps. Unknown tokens are ignored.
    pub fn parse_tokens(list: &str) -> Self {
        let mut flags = Self::empty();
        for token in list.split([',', ' ']).filter(|t| !t.is_empty()) {
            match token {
                "APP_NONE" => flags = Self::empty(),
                "APP_NO_MAINWINDOW" => flags |= Self::NO_MAINWINDOW,
                "APP_SPLASH_WINDOW" => flags |= Self::SPLASH_WINDOW,
                "APP_ALLOW_WINDOW_CONFIG" => flags |= Self::ALLOW_WINDOW_CONFIG,
                "APP_SURFACE_DONTBLOCK" => flags |= Self::SURFACE_DONTBLOCK,
                "APP_ALLOW_MULTIPLE" => flags |= Self::ALLOW_MULTIPLE,
                "APP_NEEDS_CLEAR" => flags |= Self::NEEDS_CLEAR,
                "APP_NEEDS_BLENDING" => flags |= Self::NEEDS_BLENDING,
                "APP_AUTO_START" => flags |= Self::AUTO_START,
                "APP_USE_BACK" => flags |= Self::USE_BACK,
                "APP_VIS_NOTIFY" => flags |= Self::VIS_NOTIFY,
                "APP_STATUSBAR" => flags |= Self::STATUSBAR | Self::SYSTEM,
                "APP_OSK" => flags |= Self::OSK,
                "APP_HOME" => flags |= Self::HOME | Self::SYSTEM,
                "APP_SYSTEM" => flags |= Self::SYSTEM,
                _ => {}
            }
        }
        flags
    }
}

impl DependencyFlags {
    /// Parse a `DEP_*` token list. `DEP_NONE` clears, unknown tokens are ignored.
    pub fn parse_tokens(list: &str) -> Self {
        let mut flags = Self::empty();
        for token in list.split([',', ' ']).filter(|t| !t.is_empty()) {
            match token {
                "DEP_NONE" => flags = Self::empty(),
                "DEP_3D" => flags |= Self::GL_3D,
                "DEP_RC" => flags |= Self::RC,
                "DEP_TOUCH" => flags |= Self::TOUCH,
                "DEP_NETWORK" => flags |= Self::NETWORK,
                _ => {}
            }
        }
        flags
    }
}

static NEXT_APP_ID: AtomicU32 = AtomicU32::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppId(u32);

impl AppId {
    /// Allocate the next id from the process-wide counter.
    pub fn next() -> Self {
        Self(NEXT_APP_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(u32);

impl InstanceId {
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Static description of an installable application.
#[derive(Debug, Clone, PartialEq)]
pub struct AppInfo {
    pub id: AppId,
    pub name: String,
    pub author: String,
    pub licence: String,
    pub category: String,
    pub version: i32,
    pub icon: String,
    /// Resolved executable path.
    pub path: PathBuf,
    pub args: String,
    pub flags: AppFlags,
    pub deps: DependencyFlags,
}

impl AppInfo {
    pub fn is_system(&self) -> bool {
        self.flags.contains(AppFlags::SYSTEM)
    }
}

/// Live record for one running process.
#[derive(Debug, Clone)]
pub struct AppInstance {
    pub id: InstanceId,
    pub info: Arc<AppInfo>,
    pub pid: Pid,
    pub windows: Vec<WindowId>,
    pub started: Instant,
    pub last_visible: Option<Instant>,
    /// Bring to front once the first window has content.
    pub show_on_ready: bool,
    /// A termination request has been sent; the record stays until reaped.
    pub stop_requested: bool,
}

impl AppInstance {
    pub fn owns_window(&self, window: WindowId) -> bool {
        self.windows.contains(&window)
    }

    pub fn snapshot(&self) -> InstanceSnapshot {
        InstanceSnapshot {
            id: self.id,
            info: self.info.clone(),
            pid: self.pid,
        }
    }
}

/// Copy of the identifying parts of an instance, safe to hand across the lock.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceSnapshot {
    pub id: InstanceId,
    pub info: Arc<AppInfo>,
    pub pid: Pid,
}

/// Work the manager hands to the main loop.
///
/// Posted from window-server callbacks after the instance lock is released,
/// so the orchestrator does all geometry work outside it.
#[derive(Debug, Clone)]
pub enum ManagerEvent {
    InstanceStarted {
        instance: InstanceSnapshot,
        show: bool,
    },
    /// A start request found a running single-instance app.
    BringToFront { instance: InstanceId },
    WindowAdded {
        instance: InstanceSnapshot,
        window: WindowInfo,
    },
    WindowRemoved {
        instance: InstanceId,
        window: WindowId,
    },
    WindowConfig {
        instance: InstanceId,
        reconfig: WindowReconfig,
    },
    WindowReady {
        instance: InstanceId,
        window: WindowId,
    },
    InstanceExited {
        instance: InstanceSnapshot,
        crashed: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Spawned { instance: InstanceId, pid: Pid },
    AlreadyRunning { instance: InstanceId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_flags_tokens() {
        let flags = AppFlags::parse_tokens("APP_AUTO_START, APP_VIS_NOTIFY,APP_BOGUS");
        assert_eq!(flags, AppFlags::AUTO_START | AppFlags::VIS_NOTIFY);
    }

    #[test]
    fn test_app_none_resets() {
        let flags = AppFlags::parse_tokens("APP_USE_BACK,APP_NONE,APP_OSK");
        assert_eq!(flags, AppFlags::OSK);
    }

    #[test]
    fn test_statusbar_and_home_imply_system() {
        assert!(AppFlags::parse_tokens("APP_STATUSBAR").contains(AppFlags::SYSTEM));
        assert!(AppFlags::parse_tokens("APP_HOME").contains(AppFlags::SYSTEM));
        assert!(!AppFlags::parse_tokens("APP_OSK").contains(AppFlags::SYSTEM));
    }

    #[test]
    fn test_dependency_tokens() {
        let deps = DependencyFlags::parse_tokens("DEP_3D DEP_NETWORK,DEP_WIFI");
        assert_eq!(deps, DependencyFlags::GL_3D | DependencyFlags::NETWORK);
    }

    #[test]
    fn test_app_ids_are_monotonic() {
        let a = AppId::next();
        let b = AppId::next();
        assert!(b > a);
    }
}
