//! Aggregates one instance's windows into a single composited rectangle.

use tracing::{debug, warn};

use crate::apps::AppFlags;
use crate::compositor::window_server::{
    StackRequest, WindowConfigFlags, WindowId, WindowInfo, WindowPlacement, WindowReconfig,
};
use crate::geometry::{Point, Rect, Size};
use crate::view::types::ComposeState;

#[derive(Debug, Clone)]
struct ComposedWindow {
    info: WindowInfo,
    has_content: bool,
}

#[derive(Debug, Clone)]
pub struct AppCompositor {
    no_main_window: bool,
    /// Registration order; the first entry is the main window.
    windows: Vec<ComposedWindow>,
    /// Bottom first.
    stacking: Vec<WindowId>,
    state: ComposeState,
    target: Size,
}

impl AppCompositor {
    pub fn new(flags: AppFlags, target: Size) -> Self {
        Self {
            no_main_window: flags.contains(AppFlags::NO_MAINWINDOW),
            windows: Vec::new(),
            stacking: Vec::new(),
            state: ComposeState::None,
            target,
        }
    }

    pub fn state(&self) -> ComposeState {
        self.state
    }

    pub fn target(&self) -> Size {
        self.target
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    /// First registered window; keys are delivered here.
    pub fn main_window(&self) -> Option<WindowId> {
        self.windows.first().map(|w| w.info.id)
    }

    pub fn contains(&self, window: WindowId) -> bool {
        self.windows.iter().any(|w| w.info.id == window)
    }

    pub fn add_window(&mut self, info: WindowInfo) {
        if self.contains(info.id) {
            warn!(event = "core.view.window_duplicate", window = info.id);
            return;
        }
        self.stacking.push(info.id);
        self.windows.push(ComposedWindow {
            info,
            has_content: false,
        });
    }

    pub fn remove_window(&mut self, window: WindowId) -> bool {
        let before = self.windows.len();
        self.windows.retain(|w| w.info.id != window);
        self.stacking.retain(|id| *id != window);
        before != self.windows.len()
    }

    /// Mark `window` as having rendered. Returns true on the None to Ready
    /// transition.
    pub fn set_content_ready(&mut self, window: WindowId) -> bool {
        let Some(entry) = self.windows.iter_mut().find(|w| w.info.id == window) else {
            return false;
        };
        entry.has_content = true;
        if self.state == ComposeState::None {
            self.state = ComposeState::Ready;
            debug!(event = "core.view.ready", window = window);
            return true;
        }
        false
    }

    pub fn reconfigure(&mut self, reconfig: &WindowReconfig) -> bool {
        let Some(entry) = self.windows.iter_mut().find(|w| w.info.id == reconfig.window) else {
            return false;
        };
        if reconfig.flags.contains(WindowConfigFlags::POSITION) {
            entry.info.bounds.x = reconfig.bounds.x;
            entry.info.bounds.y = reconfig.bounds.y;
        }
        if reconfig.flags.contains(WindowConfigFlags::SIZE) {
            entry.info.bounds.width = reconfig.bounds.width;
            entry.info.bounds.height = reconfig.bounds.height;
        }
        if reconfig.flags.contains(WindowConfigFlags::OPACITY) {
            entry.info.opacity = reconfig.opacity;
        }
        if let Some(request) = reconfig.stacking {
            self.restack(reconfig.window, request);
        }
        true
    }

    fn restack(&mut self, window: WindowId, request: StackRequest) {
        let Some(from) = self.stacking.iter().position(|id| *id == window) else {
            return;
        };
        self.stacking.remove(from);
        match request {
            StackRequest::RaiseToTop => self.stacking.push(window),
            StackRequest::LowerToBottom => self.stacking.insert(0, window),
            StackRequest::Above(sibling) => {
                let index = self
                    .stacking
                    .iter()
                    .position(|id| *id == sibling)
                    .map(|i| i + 1)
                    .unwrap_or(self.stacking.len());
                self.stacking.insert(index, window);
            }
        }
    }

    fn z_of(&self, window: WindowId) -> u32 {
        self.stacking
            .iter()
            .position(|id| *id == window)
            .unwrap_or(0) as u32
    }

    /// Screen placement of every window for a view at `origin` with the
    /// given zoom and opacity.
    pub fn layout(
        &self,
        origin: Point,
        zoom: f32,
        opacity: u8,
        visible: bool,
    ) -> Vec<(WindowId, WindowPlacement)> {
        let Some(main) = self.windows.first() else {
            return Vec::new();
        };

        // Content rectangle in server coordinates and its per-axis scale.
        let (base, sx, sy) = if self.no_main_window {
            let bbox = self
                .windows
                .iter()
                .fold(Rect::default(), |acc, w| acc.united(&w.info.bounds));
            let sx = axis_scale(self.target.width, bbox.width).min(1.0);
            let sy = axis_scale(self.target.height, bbox.height).min(1.0);
            (bbox, sx, sy)
        } else {
            let pref = main.info.bounds;
            (
                pref,
                axis_scale(self.target.width, pref.width),
                axis_scale(self.target.height, pref.height),
            )
        };

        let content_w = base.width as f32 * sx;
        let content_h = base.height as f32 * sy;
        let (sx, sy) = (sx * zoom, sy * zoom);
        // Zoom about the centre of the unzoomed content.
        let left = origin.x as f32 + (content_w - content_w * zoom) / 2.0;
        let top = origin.y as f32 + (content_h - content_h * zoom) / 2.0;

        self.windows
            .iter()
            .map(|w| {
                let b = w.info.bounds;
                let rect = Rect::new(
                    (left + (b.x - base.x) as f32 * sx).round() as i32,
                    (top + (b.y - base.y) as f32 * sy).round() as i32,
                    (b.width as f32 * sx).round() as i32,
                    (b.height as f32 * sy).round() as i32,
                );
                let alpha = (w.info.opacity as u32 * opacity as u32 / 255) as u8;
                (
                    w.info.id,
                    WindowPlacement {
                        rect,
                        opacity: alpha,
                        visible: visible && w.has_content,
                        z: self.z_of(w.info.id),
                    },
                )
            })
            .collect()
    }
}

fn axis_scale(target: i32, size: i32) -> f32 {
    if size <= 0 {
        1.0
    } else {
        target as f32 / size as f32
    }
}
