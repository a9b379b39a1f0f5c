//! Fakes shared by the integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use stagehand_core::apps::{AppFlags, AppId, AppInfo, DependencyFlags};
use stagehand_core::compositor::{
    Key, WindowConfigFlags, WindowId, WindowInfo, WindowPlacement, WindowServer,
};
use stagehand_core::geometry::Rect;
use stagehand_core::process::{Pid, ProcessError, Spawner};

/// Hands out fake pids and records terminations.
#[derive(Default)]
pub struct FakeSpawner {
    next: Mutex<u32>,
    pub spawned: Mutex<Vec<PathBuf>>,
    pub terminated: Mutex<Vec<Pid>>,
}

impl Spawner for FakeSpawner {
    fn spawn(&self, exec: &Path, _args: &str) -> Result<Pid, ProcessError> {
        let mut next = self.next.lock().unwrap();
        *next += 1;
        self.spawned.lock().unwrap().push(exec.to_path_buf());
        Ok(Pid::from_raw(30_000 + *next))
    }

    fn terminate(&self, pid: Pid) -> Result<(), ProcessError> {
        self.terminated.lock().unwrap().push(pid);
        Ok(())
    }

    fn is_alive(&self, _pid: Pid) -> bool {
        true
    }
}

/// Records what the compositor pushes to the display.
#[derive(Default)]
pub struct RecordingServer {
    pub configured: Mutex<Vec<(WindowId, WindowConfigFlags, Rect)>>,
    pub presented: Mutex<Vec<(WindowId, WindowPlacement)>>,
    pub keys: Mutex<Vec<(WindowId, Key)>>,
}

impl RecordingServer {
    /// Most recent placement pushed for `window`.
    pub fn last_placement(&self, window: WindowId) -> Option<WindowPlacement> {
        self.presented
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(id, _)| *id == window)
            .map(|(_, p)| *p)
    }
}

impl WindowServer for RecordingServer {
    fn configure_window(&self, window: WindowId, flags: WindowConfigFlags, bounds: Rect) {
        self.configured.lock().unwrap().push((window, flags, bounds));
    }

    fn present(&self, window: WindowId, placement: WindowPlacement) {
        self.presented.lock().unwrap().push((window, placement));
    }

    fn send_key(&self, window: WindowId, key: Key) {
        self.keys.lock().unwrap().push((window, key));
    }

    fn set_layer_opacity(&self, _opacity: u8) {}

    fn set_background_clear(&self, _clear: bool) {}
}

pub fn app(name: &str, flags: AppFlags) -> AppInfo {
    AppInfo {
        id: AppId::next(),
        name: name.to_string(),
        author: String::new(),
        licence: String::new(),
        category: "default".to_string(),
        version: 1,
        icon: String::new(),
        path: PathBuf::from(format!("/opt/apps/{}", name.to_lowercase())),
        args: String::new(),
        flags,
        deps: DependencyFlags::empty(),
    }
}

pub fn window(id: WindowId, pid: Pid, bounds: Rect) -> WindowInfo {
    WindowInfo {
        id,
        pid,
        bounds,
        opacity: 255,
        keep_size: false,
    }
}
